//! Descriptor-based virtual filesystem for WASI-style hosts.
//!
//! The descriptor layer lives in [`vfs_core`] and is re-exported here. Each
//! backend stays under its own module: [`mem`] for the in-memory filesystem
//! and, on unix, [`host`] for a directory of the host filesystem.
//!
//! ```
//! use vfs_workspace::{AtFlags, DescriptorFlags, DescriptorTable, Mode, OFlags};
//! use vfs_workspace::mem::{MemFs, MemFsConfig};
//!
//! let fs = MemFs::new(MemFsConfig::default()).unwrap();
//! let table = DescriptorTable::with_defaults();
//! let root = table
//!     .preopen(&fs, DescriptorFlags::READ | DescriptorFlags::WRITE)
//!     .unwrap();
//! root.create_directory_at("logs").unwrap();
//! let file = root
//!     .open_at(AtFlags::empty(), "logs/app.log", OFlags::CREATE, Mode::default())
//!     .unwrap();
//! assert_eq!(file.stat().unwrap().size, 0);
//! ```

pub use vfs_core::*;

pub use vfs_mem as mem;

#[cfg(unix)]
pub use vfs_host as host;

#[cfg(unix)]
pub use vfs_unix as unix;
