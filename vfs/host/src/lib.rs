//! Host directory backend built on `*at` syscalls.

#![cfg(unix)]

mod config;
mod fs;
mod handle;
mod node;
mod platform;

pub use config::HostFsConfig;
pub use fs::HostFs;
pub use handle::HostHandle;
pub use node::HostNode;

use vfs_core::{Errno, VfsError, VfsResult};

pub(crate) fn map_io_error(context: &'static str, err: std::io::Error) -> VfsError {
    let errno = vfs_unix::io_error_to_errno(&err);
    VfsError::with_source(errno, context, err)
}

pub(crate) fn io_result<T>(context: &'static str, result: std::io::Result<T>) -> VfsResult<T> {
    result.map_err(|err| map_io_error(context, err))
}

pub(crate) fn readonly_error(context: &'static str) -> VfsError {
    VfsError::new(Errno::RoFS, context)
}
