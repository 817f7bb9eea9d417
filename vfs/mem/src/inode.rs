//! Per-instance inode numbering and space accounting.

use std::sync::atomic::{AtomicU64, Ordering};
use vfs_core::{Errno, INode, VfsError, VfsResult};

#[derive(Debug)]
pub(crate) struct Usage {
    max_bytes: Option<u64>,
    max_inodes: Option<u64>,
    next_inode: AtomicU64,
    inodes: AtomicU64,
    bytes: AtomicU64,
}

impl Usage {
    pub(crate) fn new(max_bytes: Option<u64>, max_inodes: Option<u64>) -> Self {
        Self {
            max_bytes,
            max_inodes,
            next_inode: AtomicU64::new(1),
            inodes: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
        }
    }

    pub(crate) fn alloc_inode(&self) -> VfsResult<INode> {
        reserve(&self.inodes, 1, self.max_inodes)
            .map_err(|_| VfsError::new(Errno::NoSpc, "mem.inode.limit"))?;
        Ok(self.next_inode.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn release_inode(&self) {
        self.inodes.fetch_sub(1, Ordering::AcqRel);
    }

    pub(crate) fn reserve_bytes(&self, len: u64) -> VfsResult<()> {
        reserve(&self.bytes, len, self.max_bytes)
            .map(|_| ())
            .map_err(|_| VfsError::new(Errno::NoSpc, "mem.bytes.limit"))
    }

    pub(crate) fn release_bytes(&self, len: u64) {
        if len > 0 {
            self.bytes.fetch_sub(len, Ordering::AcqRel);
        }
    }

    pub(crate) fn bytes_used(&self) -> u64 {
        self.bytes.load(Ordering::Acquire)
    }

    pub(crate) fn inodes_used(&self) -> u64 {
        self.inodes.load(Ordering::Acquire)
    }
}

fn reserve(counter: &AtomicU64, amount: u64, limit: Option<u64>) -> Result<u64, u64> {
    counter.fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
        let next = current.checked_add(amount)?;
        match limit {
            Some(limit) if next > limit => None,
            _ => Some(next),
        }
    })
}
