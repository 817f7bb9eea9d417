//! Host (unix) translations for `vfs-core` types.

#![cfg(unix)]

mod errno;
mod open_flags;

pub use errno::{errno_from_raw_os_error, io_error_to_errno};
pub use open_flags::{
    advice_to_libc, descriptor_type_from_st_mode, mode_from_permissions, mode_to_permissions,
    open_flags_to_libc,
};

#[cfg(test)]
mod tests {
    mod errno;
    mod open_flags;
}
