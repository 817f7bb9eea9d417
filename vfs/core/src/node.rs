//! Filesystem node interfaces.
//!
//! Backend-facing `FsNode`/`FsHandle` traits. Nodes are addressed by name
//! within their parent directory; path handling lives in the walker.

use crate::dir::VfsDirEntry;
use crate::flags::{DescriptorFlags, Mode};
use crate::ids::{Device, INode, Timestamp};
use crate::timestamp::NewTimestamp;
use crate::{Errno, VfsError, VfsResult};
use async_trait::async_trait;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use smallvec::SmallVec;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Type of the filesystem object a descriptor refers to.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive,
)]
#[repr(u8)]
pub enum DescriptorType {
    #[default]
    Unknown = 0,
    BlockDevice,
    Directory,
    Fifo,
    SymbolicLink,
    RegularFile,
    Socket,
}

impl DescriptorType {
    /// Whether objects of this type expose a byte stream for positional I/O.
    pub fn is_byte_stream(self) -> bool {
        matches!(self, DescriptorType::RegularFile)
    }
}

/// File access pattern advisory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum Advice {
    #[default]
    Normal = 0,
    Sequential,
    Random,
    WillNeed,
    DontNeed,
    NoReuse,
}

/// Backend view of an object's attributes. The device id comes from
/// [`FsNode::device`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeMetadata {
    pub inode: INode,
    pub file_type: DescriptorType,
    pub mode: Mode,
    pub nlink: u64,
    pub size: u64,
    pub atim: Timestamp,
    pub mtim: Timestamp,
    pub ctim: Timestamp,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct CreateFile {
    pub mode: Mode,
    pub exclusive: bool,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct MkdirOptions {
    pub mode: Mode,
}

/// Resume point of a directory listing: the name of the last entry handed
/// out. The next batch starts strictly after it in byte-wise name order.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct VfsDirCookie(pub Vec<u8>);

impl VfsDirCookie {
    pub fn after(name: &[u8]) -> Self {
        Self(name.to_vec())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReadDirBatch {
    pub entries: SmallVec<[VfsDirEntry; 16]>,
    pub next: Option<VfsDirCookie>,
}

pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
}

impl<T> AsAny for T
where
    T: Any,
{
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A filesystem object as seen by its backend.
pub trait FsNode: fmt::Debug + Send + Sync + 'static + AsAny {
    fn inode(&self) -> INode;
    fn file_type(&self) -> DescriptorType;
    fn device(&self) -> Device;

    fn metadata(&self) -> VfsResult<NodeMetadata>;
    fn set_times(&self, atim: NewTimestamp, mtim: NewTimestamp) -> VfsResult<()>;

    fn lookup(&self, name: &[u8]) -> VfsResult<Arc<dyn FsNode>>;
    fn create_file(&self, name: &[u8], opts: CreateFile) -> VfsResult<Arc<dyn FsNode>>;
    fn mkdir(&self, name: &[u8], opts: MkdirOptions) -> VfsResult<Arc<dyn FsNode>>;
    fn unlink(&self, name: &[u8]) -> VfsResult<()>;
    fn rmdir(&self, name: &[u8]) -> VfsResult<()>;
    /// Entries named after `cursor`, at most `max`, in byte-wise name order.
    /// `next` is set while more entries may follow.
    fn read_dir(&self, cursor: Option<VfsDirCookie>, max: usize) -> VfsResult<ReadDirBatch>;

    fn rename(&self, old_name: &[u8], new_parent: &dyn FsNode, new_name: &[u8]) -> VfsResult<()>;

    fn link(&self, _existing: &dyn FsNode, _new_name: &[u8]) -> VfsResult<()> {
        Err(VfsError::new(Errno::NotSup, "fs_node.link"))
    }

    fn symlink(&self, _new_name: &[u8], _target: &[u8]) -> VfsResult<()> {
        Err(VfsError::new(Errno::NotSup, "fs_node.symlink"))
    }

    fn readlink(&self) -> VfsResult<Vec<u8>> {
        Err(VfsError::new(Errno::Inval, "fs_node.readlink"))
    }

    /// Open the byte stream of a regular file with the given access bits.
    fn open(&self, access: DescriptorFlags) -> VfsResult<Arc<dyn FsHandle>>;
}

/// Open byte stream of a regular file.
///
/// Only `write_at` suspends; the rest complete synchronously.
#[async_trait]
pub trait FsHandle: fmt::Debug + Send + Sync + 'static {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> VfsResult<usize>;
    async fn write_at(&self, offset: u64, buf: &[u8]) -> VfsResult<usize>;

    fn metadata(&self) -> VfsResult<NodeMetadata>;
    fn set_len(&self, len: u64) -> VfsResult<()>;
    /// Update timestamps of the open object itself, whatever its current name.
    fn set_times(&self, atim: NewTimestamp, mtim: NewTimestamp) -> VfsResult<()>;

    fn len(&self) -> VfsResult<u64> {
        Ok(self.metadata()?.size)
    }

    fn datasync(&self) -> VfsResult<()>;
    fn sync(&self) -> VfsResult<()>;

    fn advise(&self, _offset: u64, _len: u64, _advice: Advice) -> VfsResult<()> {
        Ok(())
    }
}
