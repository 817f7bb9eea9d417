use std::sync::Arc;

use async_trait::async_trait;
use vfs_core::{Errno, FsHandle, FsNode, NewTimestamp, NodeMetadata, VfsError, VfsResult};

use crate::node::{Content, MemNode};

/// Open byte stream of a [`MemNode`] regular file.
#[derive(Debug)]
pub struct MemHandle {
    node: Arc<MemNode>,
}

impl MemHandle {
    pub(crate) fn new(node: Arc<MemNode>) -> Self {
        Self { node }
    }

    /// Resize file data to `new_len`, charging or refunding the instance's
    /// byte budget.
    fn resize(&self, data: &mut Vec<u8>, new_len: u64, context: &'static str) -> VfsResult<()> {
        let old_len = data.len() as u64;
        let new_size =
            usize::try_from(new_len).map_err(|_| VfsError::new(Errno::FBig, context))?;
        if new_len > old_len {
            self.node.fs.usage.reserve_bytes(new_len - old_len)?;
        } else {
            self.node.fs.usage.release_bytes(old_len - new_len);
        }
        data.resize(new_size, 0);
        Ok(())
    }
}

#[async_trait]
impl FsHandle for MemHandle {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> VfsResult<usize> {
        let now = self.node.fs.now();
        let mut state = self.node.state.write();
        let Content::File(data) = &state.content else {
            return Err(VfsError::new(Errno::Inval, "mem.read_at.not_file"));
        };
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(data.len());
        let read = buf.len().min(data.len() - start);
        buf[..read].copy_from_slice(&data[start..start + read]);
        state.atim = now;
        Ok(read)
    }

    async fn write_at(&self, offset: u64, buf: &[u8]) -> VfsResult<usize> {
        let end = offset
            .checked_add(buf.len() as u64)
            .ok_or_else(|| VfsError::new(Errno::FBig, "mem.write_at.offset"))?;
        let now = self.node.fs.now();
        let mut state = self.node.state.write();
        let Content::File(data) = &mut state.content else {
            return Err(VfsError::new(Errno::Inval, "mem.write_at.not_file"));
        };
        if end > data.len() as u64 {
            self.resize(data, end, "mem.write_at.grow")?;
        }
        let start = offset as usize;
        data[start..start + buf.len()].copy_from_slice(buf);
        state.touch_modified(now);
        Ok(buf.len())
    }

    fn metadata(&self) -> VfsResult<NodeMetadata> {
        self.node.metadata()
    }

    fn set_len(&self, len: u64) -> VfsResult<()> {
        let now = self.node.fs.now();
        let mut state = self.node.state.write();
        let Content::File(data) = &mut state.content else {
            return Err(VfsError::new(Errno::Inval, "mem.set_len.not_file"));
        };
        self.resize(data, len, "mem.set_len")?;
        state.touch_modified(now);
        Ok(())
    }

    fn set_times(&self, atim: NewTimestamp, mtim: NewTimestamp) -> VfsResult<()> {
        self.node.set_times(atim, mtim)
    }

    fn len(&self) -> VfsResult<u64> {
        match &self.node.state.read().content {
            Content::File(data) => Ok(data.len() as u64),
            _ => Err(VfsError::new(Errno::Inval, "mem.len.not_file")),
        }
    }

    fn datasync(&self) -> VfsResult<()> {
        Ok(())
    }

    fn sync(&self) -> VfsResult<()> {
        Ok(())
    }
}
