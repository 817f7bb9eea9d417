//! Attribute snapshots and their fixed binary layouts.

use crate::errno::{Errno, VfsError, VfsResult};
use crate::flags::DescriptorFlags;
use crate::ids::{Device, INode, Timestamp};
use crate::node::{DescriptorType, NodeMetadata};
use byteorder::{ByteOrder, LittleEndian};

/// Attributes of a filesystem object at the time of the call.
///
/// Laid out as the 64-byte, 8-aligned wire record.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DescriptorStat {
    pub dev: Device,
    pub ino: INode,
    pub file_type: DescriptorType,
    pub nlink: u64,
    /// File length, or target length for symlinks.
    pub size: u64,
    pub atim: Timestamp,
    pub mtim: Timestamp,
    pub ctim: Timestamp,
}

const _: () = assert!(std::mem::size_of::<DescriptorStat>() == DescriptorStat::ENCODED_LEN);
const _: () = assert!(std::mem::align_of::<DescriptorStat>() == 8);

impl DescriptorStat {
    pub const ENCODED_LEN: usize = 64;

    pub fn from_metadata(dev: Device, meta: &NodeMetadata) -> Self {
        Self {
            dev,
            ino: meta.inode,
            file_type: meta.file_type,
            nlink: meta.nlink,
            size: meta.size,
            atim: meta.atim,
            mtim: meta.mtim,
            ctim: meta.ctim,
        }
    }

    pub fn to_le_bytes(&self) -> [u8; Self::ENCODED_LEN] {
        let mut out = [0u8; Self::ENCODED_LEN];
        LittleEndian::write_u64(&mut out[0..8], self.dev);
        LittleEndian::write_u64(&mut out[8..16], self.ino);
        out[16] = self.file_type.into();
        LittleEndian::write_u64(&mut out[24..32], self.nlink);
        LittleEndian::write_u64(&mut out[32..40], self.size);
        LittleEndian::write_u64(&mut out[40..48], self.atim);
        LittleEndian::write_u64(&mut out[48..56], self.mtim);
        LittleEndian::write_u64(&mut out[56..64], self.ctim);
        out
    }

    pub fn from_le_bytes(bytes: &[u8; Self::ENCODED_LEN]) -> VfsResult<Self> {
        let file_type = DescriptorType::try_from(bytes[16])
            .map_err(|_| VfsError::new(Errno::Inval, "stat.decode.type"))?;
        Ok(Self {
            dev: LittleEndian::read_u64(&bytes[0..8]),
            ino: LittleEndian::read_u64(&bytes[8..16]),
            file_type,
            nlink: LittleEndian::read_u64(&bytes[24..32]),
            size: LittleEndian::read_u64(&bytes[32..40]),
            atim: LittleEndian::read_u64(&bytes[40..48]),
            mtim: LittleEndian::read_u64(&bytes[48..56]),
            ctim: LittleEndian::read_u64(&bytes[56..64]),
        })
    }
}

/// Type and flags of a descriptor, fetched together.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FdInfo {
    pub file_type: DescriptorType,
    pub flags: DescriptorFlags,
}

const _: () = assert!(std::mem::size_of::<FdInfo>() == 2);

impl FdInfo {
    pub fn to_le_bytes(&self) -> [u8; 2] {
        [self.file_type.into(), self.flags.bits()]
    }

    pub fn from_le_bytes(bytes: [u8; 2]) -> VfsResult<Self> {
        let file_type = DescriptorType::try_from(bytes[0])
            .map_err(|_| VfsError::new(Errno::Inval, "fdinfo.decode.type"))?;
        Ok(Self {
            file_type,
            flags: DescriptorFlags::from_raw(bytes[1])?,
        })
    }
}
