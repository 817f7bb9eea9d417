use std::sync::Arc;

use vfs_core::{Device, Fs, FsNode, VfsResult};

use crate::config::HostFsConfig;
use crate::node::{HostDir, HostNode, HostNodeKind, Locator};
use crate::platform;

#[derive(Debug)]
pub(crate) struct HostFsInner {
    pub(crate) config: HostFsConfig,
    pub(crate) device: Device,
}

/// A host directory mounted as a filesystem.
#[derive(Debug)]
pub struct HostFs {
    inner: Arc<HostFsInner>,
    root: Arc<HostNode>,
}

impl HostFs {
    pub fn new(config: HostFsConfig) -> VfsResult<Self> {
        config.validate()?;
        let dir = crate::io_result("host.fs.open_root", platform::open_root_dir(&config.root))?;
        let stat = crate::io_result("host.fs.stat_root", platform::stat_fd(dir.as_raw_fd()))?;
        tracing::debug!(root = %config.root.display(), device = stat.dev, "host fs opened");
        let inner = Arc::new(HostFsInner {
            config,
            device: stat.dev,
        });
        let root = Arc::new(HostNode {
            fs: inner.clone(),
            inode: stat.inode,
            kind: HostNodeKind::Dir(Arc::new(HostDir {
                dir,
                locator: Locator::root(),
            })),
        });
        Ok(Self { inner, root })
    }

    pub fn config(&self) -> &HostFsConfig {
        &self.inner.config
    }
}

impl Fs for HostFs {
    fn provider_name(&self) -> &'static str {
        "host"
    }

    fn device(&self) -> Device {
        self.inner.device
    }

    fn root(&self) -> Arc<dyn FsNode> {
        self.root.clone()
    }
}
