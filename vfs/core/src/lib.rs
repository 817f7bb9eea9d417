//! Capability-scoped descriptor layer over pluggable filesystem backends.
//!
//! A [`DescriptorTable`] hands out [`Descriptor`]s; each one is bound to an
//! object of some [`Fs`] and can only reach objects beneath it.

pub mod clock;
pub mod context;
pub mod descriptor;
pub mod dir;
pub mod errno;
pub mod flags;
pub mod fs;
pub mod handle;
pub mod ids;
pub mod node;
pub mod ops;
pub mod path_walker;
pub mod registry;
pub mod stat;
pub mod timestamp;

pub use clock::{
    DateTime, MonotonicClock, MonotonicTimer, SystemMonotonicClock, SystemWallClock, WallClock,
};
pub use context::VfsConfig;
pub use descriptor::{Descriptor, ReadDir};
pub use dir::{DirEntry, Dirent, VfsDirEntry, decode_entries, encode_entries};
pub use errno::{Errno, VfsError, VfsResult};
pub use flags::{AtFlags, DescriptorFlags, Mode, OFlags};
pub use fs::Fs;
pub use handle::{OpenDescription, SeekFrom};
pub use ids::{Device, DescriptorHandle, INode, Timestamp};
pub use node::{
    Advice, CreateFile, DescriptorType, FsHandle, FsNode, MkdirOptions, NodeMetadata,
    ReadDirBatch, VfsDirCookie,
};
pub use ops::{ErrnoSet, FsOp};
pub use registry::{DescriptorTable, HandleRegistry};
pub use stat::{DescriptorStat, FdInfo};
pub use timestamp::NewTimestamp;
