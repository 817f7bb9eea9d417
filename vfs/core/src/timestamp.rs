//! Timestamp mutation argument.

use crate::errno::{Errno, VfsError, VfsResult};
use crate::ids::Timestamp;

/// Value to apply to one timestamp field in `set_times`/`set_times_at`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum NewTimestamp {
    #[default]
    NoChange,
    /// Current time of the filesystem's wall clock at apply time.
    Now,
    Timestamp(Timestamp),
}

impl NewTimestamp {
    pub const ENCODED_LEN: usize = 16;

    /// Decode the `(kind, value)` wire pair. `value` is ignored unless
    /// `kind` is 2.
    pub fn from_raw(kind: u8, value: u64) -> VfsResult<Self> {
        match kind {
            0 => Ok(NewTimestamp::NoChange),
            1 => Ok(NewTimestamp::Now),
            2 => Ok(NewTimestamp::Timestamp(value)),
            _ => Err(VfsError::new(Errno::Inval, "timestamp.kind")),
        }
    }

    pub fn to_le_bytes(self) -> [u8; Self::ENCODED_LEN] {
        let (kind, value) = match self {
            NewTimestamp::NoChange => (0u8, 0u64),
            NewTimestamp::Now => (1, 0),
            NewTimestamp::Timestamp(value) => (2, value),
        };
        let mut out = [0u8; Self::ENCODED_LEN];
        out[0] = kind;
        out[8..].copy_from_slice(&value.to_le_bytes());
        out
    }

    pub fn from_le_bytes(bytes: &[u8; Self::ENCODED_LEN]) -> VfsResult<Self> {
        let mut value = [0u8; 8];
        value.copy_from_slice(&bytes[8..]);
        Self::from_raw(bytes[0], u64::from_le_bytes(value))
    }

    /// Resolve against a clock reading. `None` means leave the field as is.
    pub fn resolve(self, now: impl FnOnce() -> Timestamp) -> Option<Timestamp> {
        match self {
            NewTimestamp::NoChange => None,
            NewTimestamp::Now => Some(now()),
            NewTimestamp::Timestamp(value) => Some(value),
        }
    }

    pub fn is_change(self) -> bool {
        !matches!(self, NewTimestamp::NoChange)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_form() {
        let bytes = NewTimestamp::Timestamp(0x0102_0304).to_le_bytes();
        assert_eq!(bytes[0], 2);
        assert_eq!(&bytes[1..8], &[0; 7]);
        assert_eq!(&bytes[8..12], &[4, 3, 2, 1]);
        assert_eq!(
            NewTimestamp::from_le_bytes(&bytes).expect("decode"),
            NewTimestamp::Timestamp(0x0102_0304)
        );
        assert_eq!(NewTimestamp::from_raw(1, 99).expect("now"), NewTimestamp::Now);
        assert_eq!(NewTimestamp::from_raw(3, 0).unwrap_err().errno(), Errno::Inval);
    }

    #[test]
    fn resolve_only_reads_clock_for_now() {
        assert_eq!(NewTimestamp::NoChange.resolve(|| panic!("clock read")), None);
        assert_eq!(NewTimestamp::Timestamp(5).resolve(|| panic!("clock read")), Some(5));
        assert_eq!(NewTimestamp::Now.resolve(|| 42), Some(42));
    }
}
