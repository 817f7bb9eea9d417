//! Single-byte flag sets used by descriptor operations.

use crate::errno::{Errno, VfsError, VfsResult};
use bitflags::bitflags;

bitflags! {
    /// Per-descriptor access and status flags.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct DescriptorFlags: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const APPEND = 1 << 2;
        const DSYNC = 1 << 3;
        const NONBLOCK = 1 << 4;
        const RSYNC = 1 << 5;
        const SYNC = 1 << 6;
    }
}

bitflags! {
    /// Path resolution flags.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct AtFlags: u8 {
        const SYMLINK_FOLLOW = 1 << 0;
    }
}

bitflags! {
    /// Open-time creation flags for `open_at`.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct OFlags: u8 {
        const CREATE = 1 << 0;
        const DIRECTORY = 1 << 1;
        const EXCL = 1 << 2;
        const TRUNC = 1 << 3;
    }
}

bitflags! {
    /// Permission bits of a filesystem object.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Mode: u8 {
        const READABLE = 1 << 0;
        const WRITEABLE = 1 << 1;
        const EXECUTABLE = 1 << 2;
    }
}

impl Default for Mode {
    fn default() -> Self {
        Mode::READABLE | Mode::WRITEABLE
    }
}

impl DescriptorFlags {
    pub const ACCESS: DescriptorFlags = DescriptorFlags::READ.union(DescriptorFlags::WRITE);

    pub fn access(self) -> DescriptorFlags {
        self & Self::ACCESS
    }

    pub fn status(self) -> DescriptorFlags {
        self - Self::ACCESS
    }
}

impl Mode {
    /// Descriptor access requested by an `open_at` mode.
    pub fn requested_access(self) -> DescriptorFlags {
        let mut access = DescriptorFlags::empty();
        if self.contains(Mode::READABLE) {
            access |= DescriptorFlags::READ;
        }
        if self.contains(Mode::WRITEABLE) {
            access |= DescriptorFlags::WRITE;
        }
        access
    }
}

macro_rules! impl_from_raw {
    ($($ty:ident => $context:literal),* $(,)?) => {
        $(
            impl $ty {
                /// Decode a wire byte, rejecting unknown bits.
                pub fn from_raw(raw: u8) -> VfsResult<Self> {
                    Self::from_bits(raw).ok_or_else(|| VfsError::new(Errno::Inval, $context))
                }
            }
        )*
    };
}

impl_from_raw! {
    DescriptorFlags => "flags.descriptor",
    AtFlags => "flags.at",
    OFlags => "flags.open",
    Mode => "flags.mode",
}
