use serde::{Deserialize, Serialize};
use vfs_core::{Errno, VfsError, VfsResult};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemFsConfig {
    /// Optional max bytes allowed for all file data in this FS instance.
    pub max_bytes: Option<u64>,
    /// Optional max inode count allowed in this FS instance, root included.
    pub max_inodes: Option<u64>,
}

impl MemFsConfig {
    pub fn from_toml_str(input: &str) -> VfsResult<Self> {
        toml::from_str(input)
            .map_err(|err| VfsError::with_source(Errno::Inval, "mem.config.parse", err))
    }
}
