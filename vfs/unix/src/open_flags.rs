//! Descriptor flags, modes and file types ↔ libc values.

use vfs_core::{Advice, DescriptorFlags, DescriptorType, Mode, OFlags};

/// `open(2)` flags for the given access, status and creation bits.
///
/// `O_NOFOLLOW` is always set: symlinks are resolved by the walker, never by
/// the host.
pub fn open_flags_to_libc(flags: DescriptorFlags, oflags: OFlags) -> libc::c_int {
    let mut out = match (
        flags.contains(DescriptorFlags::READ),
        flags.contains(DescriptorFlags::WRITE),
    ) {
        (true, true) => libc::O_RDWR,
        (false, true) => libc::O_WRONLY,
        _ => libc::O_RDONLY,
    };
    out |= libc::O_CLOEXEC | libc::O_NOFOLLOW;

    if oflags.contains(OFlags::CREATE) {
        out |= libc::O_CREAT;
    }
    if oflags.contains(OFlags::EXCL) {
        out |= libc::O_EXCL;
    }
    if oflags.contains(OFlags::TRUNC) {
        out |= libc::O_TRUNC;
    }
    if oflags.contains(OFlags::DIRECTORY) {
        out |= libc::O_DIRECTORY;
    }

    if flags.contains(DescriptorFlags::NONBLOCK) {
        out |= libc::O_NONBLOCK;
    }
    if flags.contains(DescriptorFlags::SYNC) || flags.contains(DescriptorFlags::RSYNC) {
        out |= libc::O_SYNC;
    }
    if flags.contains(DescriptorFlags::DSYNC) {
        out |= libc::O_DSYNC;
    }
    out
}

/// Permission bits granted to everyone for each `Mode` bit.
pub fn mode_to_permissions(mode: Mode) -> libc::mode_t {
    let mut perms = 0;
    if mode.contains(Mode::READABLE) {
        perms |= 0o444;
    }
    if mode.contains(Mode::WRITEABLE) {
        perms |= 0o222;
    }
    if mode.contains(Mode::EXECUTABLE) {
        perms |= 0o111;
    }
    perms
}

/// Owner permission bits of `st_mode` as a `Mode`.
pub fn mode_from_permissions(st_mode: libc::mode_t) -> Mode {
    let mut mode = Mode::empty();
    if st_mode & 0o400 != 0 {
        mode |= Mode::READABLE;
    }
    if st_mode & 0o200 != 0 {
        mode |= Mode::WRITEABLE;
    }
    if st_mode & 0o100 != 0 {
        mode |= Mode::EXECUTABLE;
    }
    mode
}

pub fn descriptor_type_from_st_mode(st_mode: libc::mode_t) -> DescriptorType {
    match st_mode & libc::S_IFMT {
        libc::S_IFREG => DescriptorType::RegularFile,
        libc::S_IFDIR => DescriptorType::Directory,
        libc::S_IFLNK => DescriptorType::SymbolicLink,
        libc::S_IFBLK => DescriptorType::BlockDevice,
        libc::S_IFIFO => DescriptorType::Fifo,
        libc::S_IFSOCK => DescriptorType::Socket,
        _ => DescriptorType::Unknown,
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
pub fn advice_to_libc(advice: Advice) -> libc::c_int {
    match advice {
        Advice::Normal => libc::POSIX_FADV_NORMAL,
        Advice::Sequential => libc::POSIX_FADV_SEQUENTIAL,
        Advice::Random => libc::POSIX_FADV_RANDOM,
        Advice::WillNeed => libc::POSIX_FADV_WILLNEED,
        Advice::DontNeed => libc::POSIX_FADV_DONTNEED,
        Advice::NoReuse => libc::POSIX_FADV_NOREUSE,
    }
}

/// Hosts without `posix_fadvise` have nothing to translate to.
#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub fn advice_to_libc(_advice: Advice) -> libc::c_int {
    0
}
