use crate::{Errno, VfsError, VfsResult};
use serde::{Deserialize, Serialize};

/// Limits applied by the descriptor layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VfsConfig {
    pub max_symlinks: u16,
    pub max_path_len: usize,
    pub max_name_len: usize,
    /// Live descriptors per table before `open_at` fails with `MFile`.
    pub max_open_handles: usize,
    /// Entries fetched from a backend per `read_dir` call.
    pub readdir_batch: usize,
}

impl Default for VfsConfig {
    fn default() -> Self {
        Self {
            max_symlinks: 40,
            max_path_len: 4096,
            max_name_len: 255,
            max_open_handles: 1024,
            readdir_batch: 32,
        }
    }
}

impl VfsConfig {
    pub fn from_toml_str(input: &str) -> VfsResult<Self> {
        let config: VfsConfig = toml::from_str(input)
            .map_err(|err| VfsError::with_source(Errno::Inval, "config.parse", err))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> VfsResult<()> {
        if self.max_path_len == 0 || self.max_name_len == 0 {
            return Err(VfsError::new(Errno::Inval, "config.path_limits"));
        }
        if self.max_open_handles == 0 {
            return Err(VfsError::new(Errno::Inval, "config.max_open_handles"));
        }
        if self.readdir_batch == 0 {
            return Err(VfsError::new(Errno::Inval, "config.readdir_batch"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = VfsConfig::from_toml_str("max_symlinks = 8\nreaddir_batch = 4\n")
            .expect("parse config");
        assert_eq!(config.max_symlinks, 8);
        assert_eq!(config.readdir_batch, 4);
        assert_eq!(config.max_name_len, 255);
        assert_eq!(config.max_open_handles, 1024);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = VfsConfig::from_toml_str("max_open_handles = 0").unwrap_err();
        assert_eq!(err.errno(), Errno::Inval);
        let err = VfsConfig::from_toml_str("max_symlinks = \"many\"").unwrap_err();
        assert_eq!(err.context(), "config.parse");
    }
}
