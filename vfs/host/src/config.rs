use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use vfs_core::{Errno, VfsError, VfsResult};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostFsConfig {
    /// Host directory exposed as the filesystem root.
    pub root: PathBuf,
    /// Reject every mutation with `RoFS`.
    #[serde(default)]
    pub read_only: bool,
}

impl HostFsConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            read_only: false,
        }
    }

    pub fn from_toml_str(input: &str) -> VfsResult<Self> {
        let config: HostFsConfig = toml::from_str(input)
            .map_err(|err| VfsError::with_source(Errno::Inval, "host.config.parse", err))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> VfsResult<()> {
        let meta = crate::io_result("host.config.root", std::fs::metadata(&self.root))?;
        if !meta.is_dir() {
            return Err(VfsError::new(Errno::NotDir, "host.config.root_not_dir"));
        }
        Ok(())
    }
}
