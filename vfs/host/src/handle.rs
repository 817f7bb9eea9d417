use std::fs::File;
use std::os::unix::fs::FileExt;
use std::os::unix::io::AsRawFd;
use std::sync::Arc;

use async_trait::async_trait;
use vfs_core::{Advice, Errno, FsHandle, NewTimestamp, NodeMetadata, VfsError, VfsResult};

use crate::platform;

#[derive(Debug)]
pub struct HostHandle {
    file: Arc<File>,
    read_only: bool,
}

impl HostHandle {
    pub(crate) fn new(file: File, read_only: bool) -> Self {
        Self {
            file: Arc::new(file),
            read_only,
        }
    }
}

#[async_trait]
impl FsHandle for HostHandle {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> VfsResult<usize> {
        crate::io_result("host.handle.read_at", self.file.read_at(buf, offset))
    }

    async fn write_at(&self, offset: u64, buf: &[u8]) -> VfsResult<usize> {
        let file = self.file.clone();
        let data = buf.to_vec();
        let written = tokio::task::spawn_blocking(move || {
            file.write_all_at(&data, offset).map(|()| data.len())
        })
        .await
        .map_err(|err| VfsError::with_source(Errno::IO, "host.handle.write_at.join", err))?;
        crate::io_result("host.handle.write_at", written)
    }

    fn metadata(&self) -> VfsResult<NodeMetadata> {
        let stat = crate::io_result("host.handle.stat", platform::stat_fd(self.file.as_raw_fd()))?;
        Ok(crate::node::metadata_from_stat(&stat))
    }

    fn set_len(&self, len: u64) -> VfsResult<()> {
        crate::io_result("host.handle.set_len", self.file.set_len(len))
    }

    fn set_times(&self, atim: NewTimestamp, mtim: NewTimestamp) -> VfsResult<()> {
        if self.read_only {
            return Err(crate::readonly_error("host.handle.set_times.read_only"));
        }
        crate::io_result(
            "host.handle.set_times",
            platform::futimens(self.file.as_raw_fd(), atim, mtim),
        )
    }

    fn len(&self) -> VfsResult<u64> {
        let meta = crate::io_result("host.handle.meta", self.file.metadata())?;
        Ok(meta.len())
    }

    fn datasync(&self) -> VfsResult<()> {
        crate::io_result("host.handle.datasync", self.file.sync_data())
    }

    fn sync(&self) -> VfsResult<()> {
        crate::io_result("host.handle.sync", self.file.sync_all())
    }

    fn advise(&self, offset: u64, len: u64, advice: Advice) -> VfsResult<()> {
        crate::io_result(
            "host.handle.advise",
            platform::fadvise(&self.file, offset, len, advice),
        )
    }
}
