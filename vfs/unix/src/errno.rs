//! OS errno → `vfs_core::Errno` translation.
//!
//! Backends built on host syscalls go through this mapping; codes without a
//! counterpart collapse to `IO`.

use std::io;
use vfs_core::Errno;

pub fn io_error_to_errno(err: &io::Error) -> Errno {
    if let Some(raw) = err.raw_os_error() {
        return errno_from_raw_os_error(raw);
    }
    match err.kind() {
        io::ErrorKind::NotFound => Errno::NoEnt,
        io::ErrorKind::PermissionDenied => Errno::Access,
        io::ErrorKind::AlreadyExists => Errno::Exist,
        io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => Errno::Inval,
        io::ErrorKind::Unsupported => Errno::NotSup,
        io::ErrorKind::Interrupted => Errno::Intr,
        io::ErrorKind::WouldBlock => Errno::Again,
        io::ErrorKind::TimedOut => Errno::TimedOut,
        io::ErrorKind::OutOfMemory => Errno::NoMem,
        _ => Errno::IO,
    }
}

pub fn errno_from_raw_os_error(raw: i32) -> Errno {
    match raw {
        libc::E2BIG => Errno::TooBig,
        libc::EACCES => Errno::Access,
        libc::EADDRINUSE => Errno::AddrInUse,
        libc::EADDRNOTAVAIL => Errno::AddrNotAvail,
        libc::EAFNOSUPPORT => Errno::AfNoSupport,
        libc::EAGAIN => Errno::Again,
        libc::EALREADY => Errno::Already,
        libc::EBADF => Errno::BadF,
        libc::EBADMSG => Errno::BadMsg,
        libc::EBUSY => Errno::Busy,
        libc::ECANCELED => Errno::Canceled,
        libc::ECHILD => Errno::Child,
        libc::ECONNABORTED => Errno::ConnAborted,
        libc::ECONNREFUSED => Errno::ConnRefused,
        libc::ECONNRESET => Errno::ConnReset,
        libc::EDEADLK => Errno::DeadLk,
        libc::EDESTADDRREQ => Errno::DestAddrReq,
        libc::EDQUOT => Errno::DQuote,
        libc::EEXIST => Errno::Exist,
        libc::EFAULT => Errno::Fault,
        libc::EFBIG => Errno::FBig,
        libc::EHOSTUNREACH => Errno::HostUnreach,
        libc::EIDRM => Errno::Idrm,
        libc::EINPROGRESS => Errno::InProgress,
        libc::EINTR => Errno::Intr,
        libc::EINVAL => Errno::Inval,
        libc::EIO => Errno::IO,
        libc::EISCONN => Errno::IsConn,
        libc::EISDIR => Errno::IsDir,
        libc::ELOOP => Errno::Loop,
        libc::EMFILE => Errno::MFile,
        libc::EMSGSIZE => Errno::MsgSize,
        libc::EMULTIHOP => Errno::MultiHop,
        libc::ENAMETOOLONG => Errno::NameTooLong,
        libc::ENETDOWN => Errno::NetDown,
        libc::ENETRESET => Errno::NetReset,
        libc::ENETUNREACH => Errno::NetUnreach,
        libc::ENFILE => Errno::NFile,
        libc::ENOBUFS => Errno::NoBufs,
        libc::ENODEV => Errno::NoDev,
        libc::ENOENT => Errno::NoEnt,
        libc::ENOEXEC => Errno::NoExec,
        libc::ENOLCK => Errno::NoLck,
        libc::ENOLINK => Errno::NoLink,
        libc::ENOMEM => Errno::NoMem,
        libc::ENOMSG => Errno::NoMsg,
        libc::ENOPROTOOPT => Errno::NoProtoOpt,
        libc::ENOSPC => Errno::NoSpc,
        libc::ENOSYS => Errno::NoSys,
        libc::ENOTDIR => Errno::NotDir,
        libc::ENOTEMPTY => Errno::NotEmpty,
        libc::ENOTRECOVERABLE => Errno::NotRecoverable,
        libc::ENOTSUP => Errno::NotSup,
        libc::ENOTTY => Errno::NoTTY,
        libc::ENXIO => Errno::NxIO,
        libc::EOVERFLOW => Errno::Overflow,
        libc::EOWNERDEAD => Errno::OwnerDead,
        libc::EPERM => Errno::Perm,
        libc::EPIPE => Errno::Pipe,
        libc::ERANGE => Errno::Range,
        libc::EROFS => Errno::RoFS,
        libc::ESPIPE => Errno::SPipe,
        libc::ESRCH => Errno::Srch,
        libc::ESTALE => Errno::Stale,
        libc::ETIMEDOUT => Errno::TimedOut,
        libc::ETXTBSY => Errno::TxtBsy,
        libc::EXDEV => Errno::XDev,
        // EWOULDBLOCK == EAGAIN and EOPNOTSUPP == ENOTSUP on linux.
        #[allow(unreachable_patterns)]
        libc::EWOULDBLOCK => Errno::Again,
        #[allow(unreachable_patterns)]
        libc::EOPNOTSUPP => Errno::NotSup,
        _ => Errno::IO,
    }
}
