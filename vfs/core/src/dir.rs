//! Directory entry types and the `Dirent` + name stream framing.

use crate::errno::{Errno, VfsError, VfsResult};
use crate::ids::INode;
use crate::node::DescriptorType;
use byteorder::{ByteOrder, LittleEndian};

/// Entry as produced by a backend's `read_dir`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VfsDirEntry {
    pub name: Vec<u8>,
    pub inode: INode,
    pub file_type: DescriptorType,
}

/// Fixed-size header of one serialized directory entry.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dirent {
    pub ino: INode,
    /// Byte length of the name that follows the header.
    pub name_len: u32,
    pub file_type: DescriptorType,
}

const _: () = assert!(std::mem::size_of::<Dirent>() == Dirent::ENCODED_LEN);
const _: () = assert!(std::mem::align_of::<Dirent>() == 8);

impl Dirent {
    pub const ENCODED_LEN: usize = 16;

    pub fn for_name(ino: INode, name: &[u8], file_type: DescriptorType) -> VfsResult<Self> {
        let name_len = u32::try_from(name.len())
            .map_err(|_| VfsError::new(Errno::NameTooLong, "dirent.name_len"))?;
        Ok(Self {
            ino,
            name_len,
            file_type,
        })
    }

    pub fn to_le_bytes(&self) -> [u8; Self::ENCODED_LEN] {
        let mut out = [0u8; Self::ENCODED_LEN];
        LittleEndian::write_u64(&mut out[0..8], self.ino);
        LittleEndian::write_u32(&mut out[8..12], self.name_len);
        out[12] = self.file_type.into();
        out
    }

    pub fn from_le_bytes(bytes: &[u8; Self::ENCODED_LEN]) -> VfsResult<Self> {
        let file_type = DescriptorType::try_from(bytes[12])
            .map_err(|_| VfsError::new(Errno::Inval, "dirent.decode.type"))?;
        Ok(Self {
            ino: LittleEndian::read_u64(&bytes[0..8]),
            name_len: LittleEndian::read_u32(&bytes[8..12]),
            file_type,
        })
    }

    /// Size of the header plus name.
    pub fn record_len(&self) -> usize {
        Self::ENCODED_LEN + self.name_len as usize
    }
}

/// One item of a directory stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntry {
    pub dirent: Dirent,
    pub name: Vec<u8>,
}

impl DirEntry {
    pub fn from_vfs(entry: VfsDirEntry) -> VfsResult<Self> {
        let dirent = Dirent::for_name(entry.inode, &entry.name, entry.file_type)?;
        Ok(Self {
            dirent,
            name: entry.name,
        })
    }

    pub fn record_len(&self) -> usize {
        self.dirent.record_len()
    }

    /// Append the header and name to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.dirent.to_le_bytes());
        out.extend_from_slice(&self.name);
    }
}

/// Serialize entries back to back.
pub fn encode_entries<'a>(entries: impl IntoIterator<Item = &'a DirEntry>) -> Vec<u8> {
    let mut out = Vec::new();
    for entry in entries {
        entry.encode_into(&mut out);
    }
    out
}

/// Parse a buffer of `Dirent` + name records.
///
/// A truncated header or a `name_len` running past the end of the buffer is
/// rejected rather than trusted.
pub fn decode_entries(mut buf: &[u8]) -> VfsResult<Vec<DirEntry>> {
    let mut entries = Vec::new();
    while !buf.is_empty() {
        let Some((header, rest)) = buf.split_first_chunk::<{ Dirent::ENCODED_LEN }>() else {
            return Err(VfsError::new(Errno::Inval, "dirent.decode.header"));
        };
        let dirent = Dirent::from_le_bytes(header)?;
        let name_len = dirent.name_len as usize;
        if rest.len() < name_len {
            return Err(VfsError::new(Errno::Inval, "dirent.decode.name_len"));
        }
        let (name, rest) = rest.split_at(name_len);
        entries.push(DirEntry {
            dirent,
            name: name.to_vec(),
        });
        buf = rest;
    }
    Ok(entries)
}
