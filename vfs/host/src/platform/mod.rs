use vfs_core::{DescriptorType, Device, INode, Mode, Timestamp};

mod unix;

pub(crate) use unix::*;

#[derive(Debug)]
pub(crate) struct Stat {
    pub dev: Device,
    pub inode: INode,
    pub file_type: DescriptorType,
    pub mode: Mode,
    pub nlink: u64,
    pub size: u64,
    pub atim: Timestamp,
    pub mtim: Timestamp,
    pub ctim: Timestamp,
}

#[derive(Debug)]
pub(crate) struct DirEntryInfo {
    pub name: Vec<u8>,
    pub inode: INode,
    pub file_type: DescriptorType,
}
