//! Core identifier types.

use core::fmt;
use core::num::NonZeroU32;

/// Opaque descriptor handle issued by a [`crate::DescriptorTable`].
///
/// `0` is reserved for "unset/invalid". Use [`DescriptorHandle::new`] to
/// construct values from a raw wire value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct DescriptorHandle(NonZeroU32);

impl DescriptorHandle {
    /// Create a handle from a raw value (must be non-zero).
    #[inline]
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    /// Get the raw handle value.
    #[inline]
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for DescriptorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the device (filesystem instance) holding an object.
pub type Device = u64;

/// Object serial number, unique within one [`Device`].
pub type INode = u64;

/// Nanosecond timestamp.
pub type Timestamp = u64;
