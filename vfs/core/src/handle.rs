//! Open file descriptions: the state behind one descriptor handle.

use crate::dir::{DirEntry, VfsDirEntry};
use crate::flags::DescriptorFlags;
use crate::ids::{Device, INode};
use crate::node::{Advice, DescriptorType, FsHandle, FsNode, NodeMetadata, VfsDirCookie};
use crate::stat::DescriptorStat;
use crate::timestamp::NewTimestamp;
use crate::{Errno, VfsError, VfsResult};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

/// Cursor movement request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeekFrom {
    Set(u64),
    Cur(i64),
    End(i64),
}

impl SeekFrom {
    /// Decode the `(mode, offset)` wire pair. For `Cur` and `End` the
    /// unsigned offset carries a two's-complement signed delta.
    pub fn from_raw(mode: u8, offset: u64) -> VfsResult<Self> {
        match mode {
            0 => Ok(SeekFrom::Set(offset)),
            1 => Ok(SeekFrom::Cur(offset as i64)),
            2 => Ok(SeekFrom::End(offset as i64)),
            _ => Err(VfsError::new(Errno::Inval, "seek.mode")),
        }
    }
}

#[derive(Debug, Default)]
struct DirStream {
    next: Option<VfsDirCookie>,
    pending: VecDeque<VfsDirEntry>,
    exhausted: bool,
}

impl DirStream {
    fn fill(&mut self, node: &dyn FsNode, batch: usize) -> VfsResult<()> {
        while self.pending.is_empty() && !self.exhausted {
            let fetched = node.read_dir(self.next.take(), batch)?;
            self.exhausted = fetched.next.is_none();
            self.next = fetched.next;
            self.pending.extend(fetched.entries);
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct OpenDescription {
    node: Arc<dyn FsNode>,
    file: Option<Arc<dyn FsHandle>>,
    device: Device,
    inode: INode,
    file_type: DescriptorType,
    flags: AtomicU8,
    offset: AtomicU64,
    io_lock: Mutex<()>,
    dir_stream: Mutex<DirStream>,
}

impl OpenDescription {
    pub fn new(
        node: Arc<dyn FsNode>,
        file: Option<Arc<dyn FsHandle>>,
        flags: DescriptorFlags,
    ) -> Self {
        Self {
            device: node.device(),
            inode: node.inode(),
            file_type: node.file_type(),
            node,
            file,
            flags: AtomicU8::new(flags.bits()),
            offset: AtomicU64::new(0),
            io_lock: Mutex::new(()),
            dir_stream: Mutex::new(DirStream::default()),
        }
    }

    pub fn node(&self) -> &Arc<dyn FsNode> {
        &self.node
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn inode(&self) -> INode {
        self.inode
    }

    pub fn file_type(&self) -> DescriptorType {
        self.file_type
    }

    pub fn flags(&self) -> DescriptorFlags {
        DescriptorFlags::from_bits_truncate(self.flags.load(Ordering::Acquire))
    }

    /// Replace the status bits. Access bits are fixed at open.
    pub fn set_flags(&self, flags: DescriptorFlags) -> VfsResult<()> {
        let current = self.flags();
        if flags.access() != current.access() {
            return Err(VfsError::new(Errno::Perm, "handle.set_flags.access"));
        }
        self.flags
            .store((current.access() | flags.status()).bits(), Ordering::Release);
        Ok(())
    }

    pub(crate) fn directory(&self, context: &'static str) -> VfsResult<&Arc<dyn FsNode>> {
        if self.file_type != DescriptorType::Directory {
            return Err(VfsError::new(Errno::NotDir, context));
        }
        Ok(&self.node)
    }

    pub(crate) fn require_access(
        &self,
        access: DescriptorFlags,
        context: &'static str,
    ) -> VfsResult<()> {
        if self.flags().contains(access) {
            Ok(())
        } else {
            Err(VfsError::new(Errno::BadF, context))
        }
    }

    fn byte_stream(&self, context: &'static str) -> VfsResult<&Arc<dyn FsHandle>> {
        if self.file_type == DescriptorType::Directory {
            return Err(VfsError::new(Errno::IsDir, context));
        }
        self.file
            .as_ref()
            .ok_or_else(|| VfsError::new(Errno::Inval, context))
    }

    pub fn pread(&self, len: u32, offset: u64) -> VfsResult<Vec<u8>> {
        self.require_access(DescriptorFlags::READ, "handle.pread")?;
        let file = self.byte_stream("handle.pread")?;
        let available = file.len()?.saturating_sub(offset);
        let want = available.min(u64::from(len)) as usize;
        let mut buf = vec![0u8; want];
        let mut filled = 0;
        while filled < want {
            let read = file.read_at(offset + filled as u64, &mut buf[filled..])?;
            if read == 0 {
                break;
            }
            filled += read;
        }
        buf.truncate(filled);
        Ok(buf)
    }

    pub async fn pwrite(&self, buf: &[u8], offset: u64) -> VfsResult<u32> {
        self.require_access(DescriptorFlags::WRITE, "handle.pwrite")?;
        let file = self.byte_stream("handle.pwrite")?;
        let len = u32::try_from(buf.len())
            .map_err(|_| VfsError::new(Errno::Inval, "handle.pwrite.len"))?;
        offset
            .checked_add(u64::from(len))
            .ok_or_else(|| VfsError::new(Errno::FBig, "handle.pwrite.offset"))?;
        let written = file.write_at(offset, buf).await?;
        Ok(written as u32)
    }

    pub fn seek(&self, from: SeekFrom) -> VfsResult<u64> {
        let file = self.byte_stream("handle.seek")?;

        let _guard = self.io_lock.lock();
        let current = self.offset.load(Ordering::Acquire);
        let new = match from {
            SeekFrom::Set(offset) => offset,
            SeekFrom::Cur(delta) => apply_delta(current, delta)?,
            SeekFrom::End(delta) => apply_delta(file.len()?, delta)?,
        };
        self.offset.store(new, Ordering::Release);
        Ok(new)
    }

    pub fn tell(&self) -> VfsResult<u64> {
        self.byte_stream("handle.tell")?;
        Ok(self.offset.load(Ordering::Acquire))
    }

    pub fn metadata(&self) -> VfsResult<NodeMetadata> {
        match &self.file {
            Some(file) => file.metadata(),
            None => self.node.metadata(),
        }
    }

    pub fn stat(&self) -> VfsResult<DescriptorStat> {
        Ok(DescriptorStat::from_metadata(self.device, &self.metadata()?))
    }

    /// Type of the object as the backend sees it now.
    pub fn live_type(&self) -> VfsResult<DescriptorType> {
        let meta = self.metadata().map_err(|err| match err.errno() {
            Errno::NoEnt => VfsError::new(Errno::Stale, "handle.type.vanished"),
            _ => err,
        })?;
        if meta.file_type != self.file_type || meta.inode != self.inode {
            return Err(VfsError::new(Errno::Stale, "handle.type.replaced"));
        }
        Ok(meta.file_type)
    }

    pub fn set_size(&self, size: u64) -> VfsResult<()> {
        self.require_access(DescriptorFlags::WRITE, "handle.set_size")?;
        self.byte_stream("handle.set_size")?.set_len(size)
    }

    pub fn set_times(&self, atim: NewTimestamp, mtim: NewTimestamp) -> VfsResult<()> {
        match &self.file {
            Some(file) => file.set_times(atim, mtim),
            None => self.node.set_times(atim, mtim),
        }
    }

    pub fn fadvise(&self, offset: u64, len: u32, advice: Advice) -> VfsResult<()> {
        self.byte_stream("handle.fadvise")?
            .advise(offset, u64::from(len), advice)
    }

    pub fn datasync(&self) -> VfsResult<()> {
        match &self.file {
            Some(file) => file.datasync(),
            None => Ok(()),
        }
    }

    pub fn sync(&self) -> VfsResult<()> {
        match &self.file {
            Some(file) => file.sync(),
            None => Ok(()),
        }
    }

    pub(crate) fn rewind_dir(&self) {
        *self.dir_stream.lock() = DirStream::default();
    }

    /// Pop the next entry of the directory stream.
    pub(crate) fn next_dir_entry(&self, batch: usize) -> VfsResult<Option<DirEntry>> {
        let node = self.directory("handle.readdir")?;
        let mut stream = self.dir_stream.lock();
        stream.fill(node.as_ref(), batch)?;
        stream.pending.pop_front().map(DirEntry::from_vfs).transpose()
    }

    /// Copy whole `Dirent` + name records into `buf`. Entries that do not fit
    /// stay queued for the next call.
    pub(crate) fn read_dir_into(&self, buf: &mut [u8], batch: usize) -> VfsResult<usize> {
        let node = self.directory("handle.read_dir_into")?;
        let mut stream = self.dir_stream.lock();
        let mut written = 0;
        loop {
            stream.fill(node.as_ref(), batch)?;
            let Some(front) = stream.pending.front() else {
                break;
            };
            let entry = DirEntry::from_vfs(front.clone())?;
            let end = written + entry.record_len();
            if end > buf.len() {
                if written == 0 {
                    return Err(VfsError::new(Errno::Inval, "handle.read_dir_into.small"));
                }
                break;
            }
            buf[written..written + crate::dir::Dirent::ENCODED_LEN]
                .copy_from_slice(&entry.dirent.to_le_bytes());
            buf[written + crate::dir::Dirent::ENCODED_LEN..end].copy_from_slice(&entry.name);
            written = end;
            stream.pending.pop_front();
        }
        Ok(written)
    }
}

fn apply_delta(base: u64, delta: i64) -> VfsResult<u64> {
    if delta >= 0 {
        base.checked_add(delta as u64)
            .ok_or_else(|| VfsError::new(Errno::Overflow, "handle.seek.overflow"))
    } else {
        base.checked_sub(delta.unsigned_abs())
            .ok_or_else(|| VfsError::new(Errno::Inval, "handle.seek.negative"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_seek_offsets_are_signed_for_relative_modes() {
        assert_eq!(SeekFrom::from_raw(0, u64::MAX).expect("set"), SeekFrom::Set(u64::MAX));
        assert_eq!(SeekFrom::from_raw(1, (-4i64) as u64).expect("cur"), SeekFrom::Cur(-4));
        assert_eq!(SeekFrom::from_raw(2, 3).expect("end"), SeekFrom::End(3));
        assert_eq!(SeekFrom::from_raw(3, 0).unwrap_err().errno(), Errno::Inval);
    }

    #[test]
    fn delta_bounds() {
        assert_eq!(apply_delta(10, -10).expect("zero"), 0);
        assert_eq!(apply_delta(10, -11).unwrap_err().errno(), Errno::Inval);
        assert_eq!(apply_delta(u64::MAX, 1).unwrap_err().errno(), Errno::Overflow);
        assert_eq!(apply_delta(5, i64::MIN).unwrap_err().errno(), Errno::Inval);
    }
}
