//! Per-operation error contracts.
//!
//! Each descriptor operation may only surface the codes listed in its
//! [`ErrnoSet`]. Anything else coming out of a backend is reported as `IO`.

use crate::errno::{Errno, VfsResult};
use std::fmt;

/// Bitset over [`Errno`] discriminants.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ErrnoSet(u128);

impl ErrnoSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn of(codes: &[Errno]) -> Self {
        let mut bits = 0u128;
        let mut i = 0;
        while i < codes.len() {
            bits |= 1u128 << (codes[i] as u8);
            i += 1;
        }
        Self(bits)
    }

    pub const fn union(self, other: ErrnoSet) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, errno: Errno) -> bool {
        self.0 & (1u128 << (errno as u8)) != 0
    }

    pub fn iter(self) -> impl Iterator<Item = Errno> {
        (0..Errno::COUNT as u8)
            .filter_map(|raw| Errno::try_from(raw).ok())
            .filter(move |errno| self.contains(*errno))
    }
}

impl fmt::Debug for ErrnoSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(Errno::name)).finish()
    }
}

const BASE: ErrnoSet = ErrnoSet::of(&[
    Errno::BadF,
    Errno::IO,
    Errno::Intr,
    Errno::NoMem,
    Errno::NotSup,
    Errno::Stale,
]);

const PATH: ErrnoSet = BASE.union(ErrnoSet::of(&[
    Errno::Access,
    Errno::Perm,
    Errno::NoEnt,
    Errno::NotDir,
    Errno::Loop,
    Errno::NameTooLong,
    Errno::Inval,
]));

const CREATE: ErrnoSet = ErrnoSet::of(&[Errno::Exist, Errno::NoSpc, Errno::DQuote, Errno::RoFS]);

/// Descriptor operations with a documented error subset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FsOp {
    Pread,
    Pwrite,
    Seek,
    Tell,
    Readdir,
    Stat,
    Fadvise,
    Datasync,
    Sync,
    Flags,
    SetFlags,
    SetSize,
    SetTimes,
    Type,
    Info,
    OpenAt,
    StatAt,
    SetTimesAt,
    LinkAt,
    CreateDirectoryAt,
    ReadLinkAt,
    SymlinkAt,
    UnlinkFileAt,
    RemoveDirectoryAt,
    RenameAt,
}

impl FsOp {
    pub fn name(self) -> &'static str {
        match self {
            FsOp::Pread => "pread",
            FsOp::Pwrite => "pwrite",
            FsOp::Seek => "seek",
            FsOp::Tell => "tell",
            FsOp::Readdir => "readdir",
            FsOp::Stat => "stat",
            FsOp::Fadvise => "fadvise",
            FsOp::Datasync => "datasync",
            FsOp::Sync => "sync",
            FsOp::Flags => "flags",
            FsOp::SetFlags => "set_flags",
            FsOp::SetSize => "set_size",
            FsOp::SetTimes => "set_times",
            FsOp::Type => "type",
            FsOp::Info => "info",
            FsOp::OpenAt => "open_at",
            FsOp::StatAt => "stat_at",
            FsOp::SetTimesAt => "set_times_at",
            FsOp::LinkAt => "link_at",
            FsOp::CreateDirectoryAt => "create_directory_at",
            FsOp::ReadLinkAt => "read_link_at",
            FsOp::SymlinkAt => "symlink_at",
            FsOp::UnlinkFileAt => "unlink_file_at",
            FsOp::RemoveDirectoryAt => "remove_directory_at",
            FsOp::RenameAt => "rename_at",
        }
    }

    /// Codes this operation may return.
    pub fn allowed(self) -> ErrnoSet {
        let extra = match self {
            FsOp::Pread => ErrnoSet::of(&[Errno::IsDir, Errno::Inval, Errno::Overflow, Errno::Again]),
            FsOp::Pwrite => ErrnoSet::of(&[
                Errno::IsDir,
                Errno::Inval,
                Errno::FBig,
                Errno::NoSpc,
                Errno::DQuote,
                Errno::Again,
                Errno::Pipe,
                Errno::RoFS,
                Errno::Perm,
            ]),
            FsOp::Seek => ErrnoSet::of(&[Errno::IsDir, Errno::Inval, Errno::Overflow, Errno::SPipe]),
            FsOp::Tell => ErrnoSet::of(&[Errno::IsDir, Errno::Inval, Errno::SPipe]),
            FsOp::Readdir => ErrnoSet::of(&[Errno::NotDir, Errno::Inval, Errno::NoEnt, Errno::Access]),
            FsOp::Stat | FsOp::Info => ErrnoSet::of(&[Errno::Overflow, Errno::Access]),
            FsOp::Fadvise => ErrnoSet::of(&[Errno::IsDir, Errno::Inval, Errno::SPipe]),
            FsOp::Datasync | FsOp::Sync => {
                ErrnoSet::of(&[Errno::Inval, Errno::RoFS, Errno::NoSpc, Errno::DQuote])
            }
            FsOp::Flags | FsOp::Type => ErrnoSet::empty(),
            FsOp::SetFlags => ErrnoSet::of(&[Errno::Inval, Errno::Perm]),
            FsOp::SetSize => ErrnoSet::of(&[
                Errno::IsDir,
                Errno::Inval,
                Errno::FBig,
                Errno::Perm,
                Errno::RoFS,
                Errno::TxtBsy,
                Errno::NoSpc,
            ]),
            FsOp::SetTimes => {
                ErrnoSet::of(&[Errno::Inval, Errno::Perm, Errno::Access, Errno::RoFS])
            }
            FsOp::OpenAt => PATH.union(CREATE).union(ErrnoSet::of(&[
                Errno::IsDir,
                Errno::MFile,
                Errno::NFile,
                Errno::TxtBsy,
                Errno::FBig,
                Errno::Overflow,
                Errno::NxIO,
                Errno::Again,
                Errno::Busy,
            ])),
            FsOp::StatAt | FsOp::ReadLinkAt => PATH.union(ErrnoSet::of(&[Errno::Overflow])),
            FsOp::SetTimesAt => PATH.union(ErrnoSet::of(&[Errno::RoFS])),
            FsOp::LinkAt => PATH.union(CREATE).union(ErrnoSet::of(&[Errno::XDev])),
            FsOp::CreateDirectoryAt | FsOp::SymlinkAt => PATH.union(CREATE),
            FsOp::UnlinkFileAt => PATH.union(ErrnoSet::of(&[
                Errno::IsDir,
                Errno::Busy,
                Errno::RoFS,
                Errno::TxtBsy,
            ])),
            FsOp::RemoveDirectoryAt => PATH.union(ErrnoSet::of(&[
                Errno::NotEmpty,
                Errno::Exist,
                Errno::Busy,
                Errno::RoFS,
            ])),
            FsOp::RenameAt => PATH.union(CREATE).union(ErrnoSet::of(&[
                Errno::NotEmpty,
                Errno::IsDir,
                Errno::XDev,
                Errno::Busy,
            ])),
        };
        BASE.union(extra)
    }

    /// Clamp a result's error code to [`FsOp::allowed`].
    pub fn restrict<T>(self, result: VfsResult<T>) -> VfsResult<T> {
        match result {
            Ok(value) => Ok(value),
            Err(err) if self.allowed().contains(err.errno()) => Err(err),
            Err(err) => {
                tracing::warn!(
                    op = self.name(),
                    errno = err.errno().name(),
                    context = err.context(),
                    "error code outside operation contract, reporting io"
                );
                Err(err.remap(Errno::IO))
            }
        }
    }
}
