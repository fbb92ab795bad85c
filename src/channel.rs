//! The kernel capability a [`Watcher`](crate::Watcher) drives.
//!
//! [`Backend`] creates a notification channel; [`Channel`] adds and removes
//! watches and reads raw records once the channel is readable. Releasing the
//! channel is dropping it.

use std::ffi::CStr;
use std::io;
use std::task::{Context, Poll};

use crate::flags::{Flags, InitFlags};
use crate::registry::WatchId;

/// An open notification channel
pub trait Channel {
    /// Add a watch for `path`, returning its kernel descriptor
    fn add_watch(&mut self, path: &CStr, flags: Flags) -> io::Result<WatchId>;

    /// Remove a watch by descriptor
    fn remove_watch(&mut self, wd: WatchId) -> io::Result<()>;

    /// Read raw records into `buf`, waiting until the channel is readable
    fn poll_read(&mut self, cx: &mut Context<'_>, buf: &mut [u8]) -> Poll<io::Result<usize>>;
}

/// Creates notification channels
pub trait Backend {
    type Channel: Channel;

    /// Create a new channel
    fn open(&mut self, flags: InitFlags) -> io::Result<Self::Channel>;
}

#[cfg(feature = "tokio")]
pub use self::inotify::{Inotify, InotifyChannel};

#[cfg(feature = "tokio")]
mod inotify {
    use std::ffi::CStr;
    use std::io;
    use std::os::fd::{AsFd, AsRawFd, OwnedFd, RawFd};
    use std::task::{ready, Context, Poll};

    use log::debug;
    use tokio::io::unix::AsyncFd;
    use tokio::io::Interest;

    use super::{Backend, Channel};
    use crate::flags::{Flags, InitFlags};
    use crate::linux;
    use crate::registry::WatchId;

    /// The Linux inotify backend.
    ///
    /// Channels register with the tokio reactor, so [`Backend::open`] must be
    /// called from within a tokio runtime.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct Inotify;

    impl Backend for Inotify {
        type Channel = InotifyChannel;

        fn open(&mut self, flags: InitFlags) -> io::Result<InotifyChannel> {
            // Readiness-based reads need a non-blocking descriptor.
            let fd = linux::inotify_init((flags | InitFlags::NONBLOCK).bits())?;
            debug!("opened inotify channel fd={}", fd.as_raw_fd());

            Ok(InotifyChannel {
                fd: AsyncFd::with_interest(fd, Interest::READABLE)?,
            })
        }
    }

    /// An inotify instance registered with the tokio reactor
    #[derive(Debug)]
    pub struct InotifyChannel {
        fd: AsyncFd<OwnedFd>,
    }

    impl Channel for InotifyChannel {
        fn add_watch(&mut self, path: &CStr, flags: Flags) -> io::Result<WatchId> {
            linux::inotify_add_watch(self.fd.get_ref().as_fd(), path, flags.encode())
        }

        fn remove_watch(&mut self, wd: WatchId) -> io::Result<()> {
            linux::inotify_rm_watch(self.fd.get_ref().as_fd(), wd)
        }

        fn poll_read(&mut self, cx: &mut Context<'_>, buf: &mut [u8]) -> Poll<io::Result<usize>> {
            loop {
                let mut guard = ready!(self.fd.poll_read_ready(cx))?;
                match guard.try_io(|inner| linux::read(inner.get_ref().as_fd(), &mut *buf)) {
                    Ok(result) => return Poll::Ready(result),
                    Err(_would_block) => continue,
                }
            }
        }
    }

    impl AsRawFd for InotifyChannel {
        fn as_raw_fd(&self) -> RawFd {
            self.fd.as_raw_fd()
        }
    }

    impl Drop for InotifyChannel {
        fn drop(&mut self) {
            debug!("closing inotify channel fd={}", self.fd.as_raw_fd());
        }
    }
}
