//! Linux-specific constants and types for inotify
//!
//! This module contains the inotify ABI constants, the layout of the record
//! header the kernel writes to the channel, and thin wrappers around the
//! inotify system calls.

use std::ffi::CStr;
use std::io;
use std::os::fd::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd};

// Inotify event flags
pub const IN_ACCESS: u32 = 0x00000001;
pub const IN_MODIFY: u32 = 0x00000002;
pub const IN_ATTRIB: u32 = 0x00000004;
pub const IN_CLOSE_WRITE: u32 = 0x00000008;
pub const IN_CLOSE_NOWRITE: u32 = 0x00000010;
pub const IN_OPEN: u32 = 0x00000020;
pub const IN_MOVED_FROM: u32 = 0x00000040;
pub const IN_MOVED_TO: u32 = 0x00000080;
pub const IN_CREATE: u32 = 0x00000100;
pub const IN_DELETE: u32 = 0x00000200;
pub const IN_DELETE_SELF: u32 = 0x00000400;
pub const IN_MOVE_SELF: u32 = 0x00000800;

// Flags set by the kernel on reported events
pub const IN_UNMOUNT: u32 = 0x00002000;
pub const IN_Q_OVERFLOW: u32 = 0x00004000;
pub const IN_IGNORED: u32 = 0x00008000;
pub const IN_ISDIR: u32 = 0x40000000;

// Watch options
pub const IN_ONLYDIR: u32 = 0x01000000;
pub const IN_DONT_FOLLOW: u32 = 0x02000000;
pub const IN_EXCL_UNLINK: u32 = 0x04000000;
pub const IN_MASK_CREATE: u32 = 0x10000000;
pub const IN_MASK_ADD: u32 = 0x20000000;
pub const IN_ONESHOT: u32 = 0x80000000;

pub const IN_ALL_EVENTS: u32 = 0x00000fff;

// Inotify init flags
pub const IN_CLOEXEC: u32 = libc::O_CLOEXEC as u32;
pub const IN_NONBLOCK: u32 = libc::O_NONBLOCK as u32;

/// Longest file name the kernel reports
pub const NAME_MAX: usize = 255;

// Inotify event record header, followed by `len` bytes of name
#[allow(non_camel_case_types)]
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct inotify_event {
    pub wd: i32,
    pub mask: u32,
    pub cookie: u32,
    pub len: u32,
}

/// Size of the fixed record header
pub const EVENT_HEADER_LEN: usize = std::mem::size_of::<inotify_event>();

/// Smallest read the kernel accepts without `EINVAL`
pub const MIN_READ_SIZE: usize = EVENT_HEADER_LEN + NAME_MAX + 1;

/// Create a new inotify channel
pub fn inotify_init(flags: u32) -> io::Result<OwnedFd> {
    let fd = unsafe { libc::inotify_init1(flags as libc::c_int) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

/// Add (or update) a watch, returning the kernel watch descriptor
pub fn inotify_add_watch(fd: BorrowedFd<'_>, path: &CStr, mask: u32) -> io::Result<i32> {
    let wd = unsafe { libc::inotify_add_watch(fd.as_raw_fd(), path.as_ptr(), mask) };
    if wd < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(wd)
}

/// Remove a watch by descriptor
pub fn inotify_rm_watch(fd: BorrowedFd<'_>, wd: i32) -> io::Result<()> {
    let result = unsafe { libc::inotify_rm_watch(fd.as_raw_fd(), wd) };
    if result < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Read raw records from the channel
pub fn read(fd: BorrowedFd<'_>, buf: &mut [u8]) -> io::Result<usize> {
    let result = unsafe {
        libc::read(
            fd.as_raw_fd(),
            buf.as_mut_ptr() as *mut libc::c_void,
            buf.len(),
        )
    };
    if result < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(result as usize)
}

/// Whether a "remove watch" failure means the kernel already dropped it
pub fn is_stale_watch(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::EINVAL)
}
