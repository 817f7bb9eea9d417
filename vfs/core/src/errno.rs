//! Closed error taxonomy and the error value threaded through every operation.
//!
//! `Errno` is the wire-visible code set. Its discriminants are the positions
//! in the POSIX-derived table and never change. `VfsError` adds a static
//! call-site context and an optional source error for diagnostics.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;
use thiserror::Error;

#[derive(
    Error, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, TryFromPrimitive, IntoPrimitive,
)]
#[repr(u8)]
pub enum Errno {
    #[error("argument list too long")]
    TooBig = 0,
    #[error("permission denied")]
    Access,
    #[error("address in use")]
    AddrInUse,
    #[error("address not available")]
    AddrNotAvail,
    #[error("address family not supported")]
    AfNoSupport,
    #[error("resource unavailable, try again")]
    Again,
    #[error("connection already in progress")]
    Already,
    #[error("bad file descriptor")]
    BadF,
    #[error("bad message")]
    BadMsg,
    #[error("device or resource busy")]
    Busy,
    #[error("operation canceled")]
    Canceled,
    #[error("no child processes")]
    Child,
    #[error("connection aborted")]
    ConnAborted,
    #[error("connection refused")]
    ConnRefused,
    #[error("connection reset")]
    ConnReset,
    #[error("resource deadlock would occur")]
    DeadLk,
    #[error("destination address required")]
    DestAddrReq,
    #[error("disk quota exceeded")]
    DQuote,
    #[error("file exists")]
    Exist,
    #[error("bad address")]
    Fault,
    #[error("file too large")]
    FBig,
    #[error("host is unreachable")]
    HostUnreach,
    #[error("identifier removed")]
    Idrm,
    #[error("operation in progress")]
    InProgress,
    #[error("interrupted function")]
    Intr,
    #[error("invalid argument")]
    Inval,
    #[error("i/o error")]
    IO,
    #[error("socket is connected")]
    IsConn,
    #[error("is a directory")]
    IsDir,
    #[error("too many levels of symbolic links")]
    Loop,
    #[error("too many open files")]
    MFile,
    #[error("message too large")]
    MsgSize,
    #[error("multihop attempted")]
    MultiHop,
    #[error("filename too long")]
    NameTooLong,
    #[error("network is down")]
    NetDown,
    #[error("connection aborted by network")]
    NetReset,
    #[error("network unreachable")]
    NetUnreach,
    #[error("too many files open in system")]
    NFile,
    #[error("no buffer space available")]
    NoBufs,
    #[error("no such device")]
    NoDev,
    #[error("no such file or directory")]
    NoEnt,
    #[error("executable file format error")]
    NoExec,
    #[error("no locks available")]
    NoLck,
    #[error("link has been severed")]
    NoLink,
    #[error("not enough space")]
    NoMem,
    #[error("no message of the desired type")]
    NoMsg,
    #[error("protocol not available")]
    NoProtoOpt,
    #[error("no space left on device")]
    NoSpc,
    #[error("function not supported")]
    NoSys,
    #[error("not a directory")]
    NotDir,
    #[error("directory not empty")]
    NotEmpty,
    #[error("state not recoverable")]
    NotRecoverable,
    #[error("not supported")]
    NotSup,
    #[error("inappropriate i/o control operation")]
    NoTTY,
    #[error("no such device or address")]
    NxIO,
    #[error("value too large to be stored in data type")]
    Overflow,
    #[error("previous owner died")]
    OwnerDead,
    #[error("operation not permitted")]
    Perm,
    #[error("broken pipe")]
    Pipe,
    #[error("result too large")]
    Range,
    #[error("read-only file system")]
    RoFS,
    #[error("invalid seek")]
    SPipe,
    #[error("no such process")]
    Srch,
    #[error("stale file handle")]
    Stale,
    #[error("connection timed out")]
    TimedOut,
    #[error("text file busy")]
    TxtBsy,
    #[error("cross-device link")]
    XDev,
}

impl Errno {
    /// Number of codes in the closed set.
    pub const COUNT: usize = 67;

    /// Stable name for logs and telemetry.
    pub fn name(self) -> &'static str {
        match self {
            Errno::TooBig => "too_big",
            Errno::Access => "access",
            Errno::AddrInUse => "addr_in_use",
            Errno::AddrNotAvail => "addr_not_avail",
            Errno::AfNoSupport => "af_no_support",
            Errno::Again => "again",
            Errno::Already => "already",
            Errno::BadF => "bad_f",
            Errno::BadMsg => "bad_msg",
            Errno::Busy => "busy",
            Errno::Canceled => "canceled",
            Errno::Child => "child",
            Errno::ConnAborted => "conn_aborted",
            Errno::ConnRefused => "conn_refused",
            Errno::ConnReset => "conn_reset",
            Errno::DeadLk => "dead_lk",
            Errno::DestAddrReq => "dest_addr_req",
            Errno::DQuote => "d_quote",
            Errno::Exist => "exist",
            Errno::Fault => "fault",
            Errno::FBig => "f_big",
            Errno::HostUnreach => "host_unreach",
            Errno::Idrm => "idrm",
            Errno::InProgress => "in_progress",
            Errno::Intr => "intr",
            Errno::Inval => "inval",
            Errno::IO => "io",
            Errno::IsConn => "is_conn",
            Errno::IsDir => "is_dir",
            Errno::Loop => "loop",
            Errno::MFile => "m_file",
            Errno::MsgSize => "msg_size",
            Errno::MultiHop => "multi_hop",
            Errno::NameTooLong => "name_too_long",
            Errno::NetDown => "net_down",
            Errno::NetReset => "net_reset",
            Errno::NetUnreach => "net_unreach",
            Errno::NFile => "n_file",
            Errno::NoBufs => "no_bufs",
            Errno::NoDev => "no_dev",
            Errno::NoEnt => "no_ent",
            Errno::NoExec => "no_exec",
            Errno::NoLck => "no_lck",
            Errno::NoLink => "no_link",
            Errno::NoMem => "no_mem",
            Errno::NoMsg => "no_msg",
            Errno::NoProtoOpt => "no_proto_opt",
            Errno::NoSpc => "no_spc",
            Errno::NoSys => "no_sys",
            Errno::NotDir => "not_dir",
            Errno::NotEmpty => "not_empty",
            Errno::NotRecoverable => "not_recoverable",
            Errno::NotSup => "not_sup",
            Errno::NoTTY => "no_tty",
            Errno::NxIO => "nx_io",
            Errno::Overflow => "overflow",
            Errno::OwnerDead => "owner_dead",
            Errno::Perm => "perm",
            Errno::Pipe => "pipe",
            Errno::Range => "range",
            Errno::RoFS => "ro_fs",
            Errno::SPipe => "s_pipe",
            Errno::Srch => "srch",
            Errno::Stale => "stale",
            Errno::TimedOut => "timed_out",
            Errno::TxtBsy => "txt_bsy",
            Errno::XDev => "x_dev",
        }
    }
}

type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error returned by every fallible VFS operation.
#[derive(Error)]
#[error("{context}: {errno}")]
pub struct VfsError {
    errno: Errno,
    context: &'static str,
    #[source]
    source: Option<BoxedSource>,
}

impl VfsError {
    pub fn new(errno: Errno, context: &'static str) -> Self {
        Self {
            errno,
            context,
            source: None,
        }
    }

    pub fn with_source(
        errno: Errno,
        context: &'static str,
        source: impl Into<BoxedSource>,
    ) -> Self {
        Self {
            errno,
            context,
            source: Some(source.into()),
        }
    }

    pub fn errno(&self) -> Errno {
        self.errno
    }

    pub fn context(&self) -> &'static str {
        self.context
    }

    /// Replace the code, keeping context and source.
    pub(crate) fn remap(mut self, errno: Errno) -> Self {
        self.errno = errno;
        self
    }
}

impl fmt::Debug for VfsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dbg = f.debug_struct("VfsError");
        dbg.field("errno", &self.errno).field("context", &self.context);
        if let Some(source) = &self.source {
            dbg.field("source", source);
        }
        dbg.finish()
    }
}

pub type VfsResult<T> = Result<T, VfsError>;
