use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use vfs_core::{Device, Fs, FsNode, SystemWallClock, Timestamp, VfsResult, WallClock};

use crate::config::MemFsConfig;
use crate::inode::Usage;
use crate::node::MemNode;

static NEXT_DEVICE: AtomicU64 = AtomicU64::new(1);

pub(crate) struct MemFsInner {
    pub(crate) config: MemFsConfig,
    pub(crate) device: Device,
    pub(crate) usage: Usage,
    /// Held for the whole of a rename, so the tree shape is fixed while
    /// directory locks are taken.
    pub(crate) rename_lock: Mutex<()>,
    clock: Arc<dyn WallClock>,
}

impl fmt::Debug for MemFsInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemFsInner")
            .field("device", &self.device)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl MemFsInner {
    pub(crate) fn now(&self) -> Timestamp {
        self.clock.now().as_nanos()
    }
}

/// In-memory filesystem instance. Every instance is its own device.
#[derive(Debug)]
pub struct MemFs {
    inner: Arc<MemFsInner>,
    root: Arc<MemNode>,
}

impl MemFs {
    pub fn new(config: MemFsConfig) -> VfsResult<Self> {
        Self::with_clock(config, Arc::new(SystemWallClock))
    }

    pub fn with_clock(config: MemFsConfig, clock: Arc<dyn WallClock>) -> VfsResult<Self> {
        let usage = Usage::new(config.max_bytes, config.max_inodes);
        let inner = Arc::new(MemFsInner {
            config,
            device: NEXT_DEVICE.fetch_add(1, Ordering::Relaxed),
            usage,
            rename_lock: Mutex::new(()),
            clock,
        });
        let root = MemNode::new_root(&inner)?;
        tracing::debug!(device = inner.device, "mem fs created");
        Ok(Self { inner, root })
    }

    pub fn config(&self) -> &MemFsConfig {
        &self.inner.config
    }

    /// File data bytes currently held.
    pub fn bytes_used(&self) -> u64 {
        self.inner.usage.bytes_used()
    }

    /// Live inodes, root included.
    pub fn inodes_used(&self) -> u64 {
        self.inner.usage.inodes_used()
    }
}

impl Fs for MemFs {
    fn provider_name(&self) -> &'static str {
        "mem"
    }

    fn device(&self) -> Device {
        self.inner.device
    }

    fn root(&self) -> Arc<dyn FsNode> {
        self.root.clone()
    }
}
