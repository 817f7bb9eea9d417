use std::ffi::{CStr, CString};
use std::fs::File;
use std::io;
use std::mem;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::path::Path;

use vfs_core::{Advice, DescriptorFlags, Mode, NewTimestamp, OFlags, Timestamp};

use super::{DirEntryInfo, Stat};

const NANOS_PER_SEC: u64 = 1_000_000_000;

#[derive(Debug)]
pub struct DirHandle {
    fd: OwnedFd,
}

impl DirHandle {
    pub fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

fn c_name(name: &[u8]) -> io::Result<CString> {
    CString::new(name).map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "name NUL"))
}

fn check(res: libc::c_int) -> io::Result<()> {
    if res < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

pub fn open_root_dir(path: &Path) -> io::Result<DirHandle> {
    let cstr = c_name(path.as_os_str().as_bytes())?;
    let flags = libc::O_RDONLY | libc::O_DIRECTORY | libc::O_CLOEXEC;
    let fd = unsafe { libc::open(cstr.as_ptr(), flags) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(DirHandle {
        fd: unsafe { OwnedFd::from_raw_fd(fd) },
    })
}

pub fn open_dir_at(parent: &DirHandle, name: &[u8]) -> io::Result<DirHandle> {
    let cstr = c_name(name)?;
    let flags = libc::O_RDONLY | libc::O_DIRECTORY | libc::O_CLOEXEC | libc::O_NOFOLLOW;
    let fd = unsafe { libc::openat(parent.as_raw_fd(), cstr.as_ptr(), flags) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(DirHandle {
        fd: unsafe { OwnedFd::from_raw_fd(fd) },
    })
}

pub fn stat_fd(fd: RawFd) -> io::Result<Stat> {
    let mut st = unsafe { mem::zeroed::<libc::stat>() };
    check(unsafe { libc::fstat(fd, &mut st) })?;
    Ok(stat_from_libc(&st))
}

/// `fstatat` without following a final symlink.
pub fn stat_at(parent: &DirHandle, name: &[u8]) -> io::Result<Stat> {
    let cstr = c_name(name)?;
    let mut st = unsafe { mem::zeroed::<libc::stat>() };
    check(unsafe {
        libc::fstatat(
            parent.as_raw_fd(),
            cstr.as_ptr(),
            &mut st,
            libc::AT_SYMLINK_NOFOLLOW,
        )
    })?;
    Ok(stat_from_libc(&st))
}

pub fn open_file_at(
    parent: &DirHandle,
    name: &[u8],
    access: DescriptorFlags,
    oflags: OFlags,
    mode: Mode,
) -> io::Result<File> {
    let cstr = c_name(name)?;
    let flags = vfs_unix::open_flags_to_libc(access, oflags);
    let perms = vfs_unix::mode_to_permissions(mode);
    let fd = unsafe {
        libc::openat(
            parent.as_raw_fd(),
            cstr.as_ptr(),
            flags,
            libc::c_uint::from(perms),
        )
    };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(unsafe { File::from_raw_fd(fd) })
}

pub fn mkdir_at(parent: &DirHandle, name: &[u8], mode: Mode) -> io::Result<()> {
    let cstr = c_name(name)?;
    let perms = vfs_unix::mode_to_permissions(mode);
    check(unsafe { libc::mkdirat(parent.as_raw_fd(), cstr.as_ptr(), perms) })
}

pub fn unlink_at(parent: &DirHandle, name: &[u8]) -> io::Result<()> {
    let cstr = c_name(name)?;
    check(unsafe { libc::unlinkat(parent.as_raw_fd(), cstr.as_ptr(), 0) })
}

pub fn rmdir_at(parent: &DirHandle, name: &[u8]) -> io::Result<()> {
    let cstr = c_name(name)?;
    check(unsafe { libc::unlinkat(parent.as_raw_fd(), cstr.as_ptr(), libc::AT_REMOVEDIR) })
}

pub fn rename_at(
    old_parent: &DirHandle,
    old_name: &[u8],
    new_parent: &DirHandle,
    new_name: &[u8],
) -> io::Result<()> {
    let old_cstr = c_name(old_name)?;
    let new_cstr = c_name(new_name)?;
    check(unsafe {
        libc::renameat(
            old_parent.as_raw_fd(),
            old_cstr.as_ptr(),
            new_parent.as_raw_fd(),
            new_cstr.as_ptr(),
        )
    })
}

pub fn link_at(
    existing_parent: &DirHandle,
    existing_name: &[u8],
    new_parent: &DirHandle,
    new_name: &[u8],
) -> io::Result<()> {
    let old_cstr = c_name(existing_name)?;
    let new_cstr = c_name(new_name)?;
    check(unsafe {
        libc::linkat(
            existing_parent.as_raw_fd(),
            old_cstr.as_ptr(),
            new_parent.as_raw_fd(),
            new_cstr.as_ptr(),
            0,
        )
    })
}

pub fn symlink_at(parent: &DirHandle, new_name: &[u8], target: &[u8]) -> io::Result<()> {
    let new_cstr = c_name(new_name)?;
    let target_cstr = c_name(target)?;
    check(unsafe { libc::symlinkat(target_cstr.as_ptr(), parent.as_raw_fd(), new_cstr.as_ptr()) })
}

pub fn readlink_at(parent: &DirHandle, name: &[u8]) -> io::Result<Vec<u8>> {
    let cstr = c_name(name)?;
    let mut buf = vec![0u8; 256];
    loop {
        let res = unsafe {
            libc::readlinkat(
                parent.as_raw_fd(),
                cstr.as_ptr(),
                buf.as_mut_ptr() as *mut libc::c_char,
                buf.len(),
            )
        };
        if res < 0 {
            return Err(io::Error::last_os_error());
        }
        let len = res as usize;
        if len < buf.len() {
            buf.truncate(len);
            return Ok(buf);
        }
        buf.resize(buf.len() * 2, 0);
    }
}

/// `utimensat` on an entry, never following a final symlink.
pub fn utimens_at(
    parent: &DirHandle,
    name: &[u8],
    atim: NewTimestamp,
    mtim: NewTimestamp,
) -> io::Result<()> {
    let cstr = c_name(name)?;
    let times = [timespec(atim), timespec(mtim)];
    check(unsafe {
        libc::utimensat(
            parent.as_raw_fd(),
            cstr.as_ptr(),
            times.as_ptr(),
            libc::AT_SYMLINK_NOFOLLOW,
        )
    })
}

pub fn futimens(fd: RawFd, atim: NewTimestamp, mtim: NewTimestamp) -> io::Result<()> {
    let times = [timespec(atim), timespec(mtim)];
    check(unsafe { libc::futimens(fd, times.as_ptr()) })
}

#[cfg(any(target_os = "linux", target_os = "android"))]
pub fn fadvise(file: &File, offset: u64, len: u64, advice: Advice) -> io::Result<()> {
    let res = unsafe {
        libc::posix_fadvise(
            file.as_raw_fd(),
            offset as libc::off_t,
            len as libc::off_t,
            vfs_unix::advice_to_libc(advice),
        )
    };
    if res != 0 {
        return Err(io::Error::from_raw_os_error(res));
    }
    Ok(())
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub fn fadvise(_file: &File, _offset: u64, _len: u64, _advice: Advice) -> io::Result<()> {
    Ok(())
}

/// Names in `dir`, excluding `.` and `..`, in host order.
pub fn read_dir(dir: &DirHandle) -> io::Result<Vec<DirEntryInfo>> {
    let dup_fd = unsafe { libc::dup(dir.as_raw_fd()) };
    if dup_fd < 0 {
        return Err(io::Error::last_os_error());
    }
    let dirp = unsafe { libc::fdopendir(dup_fd) };
    if dirp.is_null() {
        let err = io::Error::last_os_error();
        unsafe { libc::close(dup_fd) };
        return Err(err);
    }
    // The duplicate shares its offset with `dir`.
    unsafe { libc::rewinddir(dirp) };

    let mut entries = Vec::new();
    let result = loop {
        set_errno(0);
        let ent = unsafe { libc::readdir(dirp) };
        if ent.is_null() {
            let err = errno();
            if err == 0 {
                break Ok(());
            }
            break Err(io::Error::from_raw_os_error(err));
        }
        let name = unsafe { CStr::from_ptr((*ent).d_name.as_ptr()) }
            .to_bytes()
            .to_vec();
        if name == b"." || name == b".." {
            continue;
        }
        match stat_at(dir, &name) {
            Ok(stat) => entries.push(DirEntryInfo {
                name,
                inode: stat.inode,
                file_type: stat.file_type,
            }),
            // Removed between readdir and fstatat.
            Err(err) if err.raw_os_error() == Some(libc::ENOENT) => {}
            Err(err) => break Err(err),
        }
    };
    unsafe { libc::closedir(dirp) };
    result.map(|()| entries)
}

fn stat_from_libc(st: &libc::stat) -> Stat {
    let (atim, mtim, ctim) = stat_times(st);
    Stat {
        dev: st.st_dev as u64,
        inode: st.st_ino as u64,
        file_type: vfs_unix::descriptor_type_from_st_mode(st.st_mode),
        mode: vfs_unix::mode_from_permissions(st.st_mode),
        nlink: st.st_nlink as u64,
        size: st.st_size as u64,
        atim,
        mtim,
        ctim,
    }
}

fn nanos(secs: i64, nsec: i64) -> Timestamp {
    if secs < 0 {
        return 0;
    }
    (secs as u64)
        .saturating_mul(NANOS_PER_SEC)
        .saturating_add(nsec as u64)
}

#[cfg(target_os = "macos")]
fn stat_times(st: &libc::stat) -> (Timestamp, Timestamp, Timestamp) {
    (
        nanos(st.st_atime, st.st_atime_nsec),
        nanos(st.st_mtime, st.st_mtime_nsec),
        nanos(st.st_ctime, st.st_ctime_nsec),
    )
}

#[cfg(not(target_os = "macos"))]
fn stat_times(st: &libc::stat) -> (Timestamp, Timestamp, Timestamp) {
    (
        nanos(st.st_atime as i64, st.st_atime_nsec as i64),
        nanos(st.st_mtime as i64, st.st_mtime_nsec as i64),
        nanos(st.st_ctime as i64, st.st_ctime_nsec as i64),
    )
}

fn timespec(value: NewTimestamp) -> libc::timespec {
    match value {
        NewTimestamp::NoChange => libc::timespec {
            tv_sec: 0,
            tv_nsec: libc::UTIME_OMIT,
        },
        NewTimestamp::Now => libc::timespec {
            tv_sec: 0,
            tv_nsec: libc::UTIME_NOW,
        },
        NewTimestamp::Timestamp(value) => libc::timespec {
            tv_sec: (value / NANOS_PER_SEC) as libc::time_t,
            tv_nsec: (value % NANOS_PER_SEC) as _,
        },
    }
}

#[cfg(target_os = "linux")]
fn errno() -> i32 {
    unsafe { *libc::__errno_location() }
}

#[cfg(target_os = "macos")]
fn errno() -> i32 {
    unsafe { *libc::__error() }
}

#[cfg(target_os = "linux")]
fn set_errno(val: i32) {
    unsafe {
        *libc::__errno_location() = val;
    }
}

#[cfg(target_os = "macos")]
fn set_errno(val: i32) {
    unsafe {
        *libc::__error() = val;
    }
}
