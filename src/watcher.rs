use std::collections::VecDeque;
use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use log::{debug, error, trace, warn};

use crate::{
    channel::{Backend, Channel},
    config::{OrphanPolicy, WatcherConfig},
    error::{Result, WatchError},
    event::Event,
    flags::Flags,
    linux,
    raw::{self, RawEvent},
    registry::{PendingWatch, WatchId, WatchRegistry},
};

#[cfg(feature = "tokio")]
use crate::channel::Inotify;

enum State<C> {
    Unopened,
    Open(C),
    Closed,
}

/// Alias-based watches over one notification channel, read as a stream of
/// [`Event`]s.
///
/// Watches may be registered before the channel is opened; they are handed to
/// the kernel by [`open`](Watcher::open). The channel is released by
/// [`close`](Watcher::close) or when the watcher is dropped.
///
/// A watcher has a single owner: watch management and event reads must not
/// be issued concurrently.
pub struct Watcher<B: Backend> {
    backend: B,
    config: WatcherConfig,
    registry: WatchRegistry,
    state: State<B::Channel>,
    /// Bytes read but not yet decoded
    buffer: Vec<u8>,
    /// Records decoded but not yet delivered
    queue: VecDeque<RawEvent>,
    /// Events resolved to their aliases, waiting to be handed out
    ready: VecDeque<Event>,
}

#[cfg(feature = "tokio")]
impl Watcher<Inotify> {
    /// Create a new inotify watcher with the default configuration
    pub fn new() -> Self {
        Self {
            backend: Inotify,
            config: WatcherConfig::default(),
            registry: WatchRegistry::new(),
            state: State::Unopened,
            buffer: Vec::new(),
            queue: VecDeque::new(),
            ready: VecDeque::new(),
        }
    }

    /// Create a new inotify watcher with a custom configuration
    pub fn with_config(config: WatcherConfig) -> Result<Self> {
        Self::with_backend(Inotify, config)
    }
}

#[cfg(feature = "tokio")]
impl Default for Watcher<Inotify> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> Watcher<B> {
    /// Create a watcher over an arbitrary backend
    pub fn with_backend(backend: B, config: WatcherConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            backend,
            config,
            registry: WatchRegistry::new(),
            state: State::Unopened,
            buffer: Vec::new(),
            queue: VecDeque::new(),
            ready: VecDeque::new(),
        })
    }

    /// Watch `path`, using the path itself as alias.
    ///
    /// Returns the alias.
    pub fn watch(&mut self, path: impl AsRef<Path>, flags: Flags) -> Result<String> {
        let path = path.as_ref();
        let alias = path.to_string_lossy().into_owned();
        self.watch_with_alias(alias.clone(), path, flags)?;
        Ok(alias)
    }

    /// Watch `path` under a caller-chosen alias.
    ///
    /// Before [`open`](Watcher::open) the watch is only recorded. Once open,
    /// it is added to the kernel immediately; if the kernel refuses, the alias
    /// is not kept.
    ///
    /// Several aliases may name the same inode. The kernel then keeps one
    /// watch for all of them, and each alias only sees the events it asked
    /// for.
    pub fn watch_with_alias(
        &mut self,
        alias: impl Into<String>,
        path: impl AsRef<Path>,
        flags: Flags,
    ) -> Result<()> {
        if let State::Closed = self.state {
            return Err(WatchError::Closed);
        }
        if !flags.has_events() {
            return Err(WatchError::invalid_flags(format!(
                "{} selects no events",
                flags
            )));
        }

        let pending = PendingWatch {
            alias: alias.into(),
            path: path.as_ref().to_path_buf(),
            flags,
        };
        self.registry
            .add_pending(&pending.alias, &pending.path, pending.flags)?;

        if let State::Open(channel) = &mut self.state {
            setup_watch(channel, &mut self.registry, &pending)?;
        }
        Ok(())
    }

    /// Stop watching an alias.
    ///
    /// A kernel watch that is already gone (one-shot, deleted target) is not
    /// an error. If other aliases share the kernel watch, it stays and its
    /// mask shrinks to what they still ask for.
    ///
    /// The alias is forgotten even when the kernel refuses the removal.
    pub fn unwatch(&mut self, alias: &str) -> Result<()> {
        if let State::Closed = self.state {
            return Err(WatchError::Closed);
        }

        let held = self.registry.watch_id(alias);
        let released = self.registry.remove(alias)?;
        let State::Open(channel) = &mut self.state else {
            return Ok(());
        };

        match (released, held) {
            (Some(wd), _) => match channel.remove_watch(wd) {
                Ok(()) => debug!("removed watch {} (wd={})", alias, wd),
                Err(err) if linux::is_stale_watch(&err) => {
                    debug!("watch {} (wd={}) was already removed by the kernel", alias, wd)
                }
                Err(err) => return Err(WatchError::watch_remove(alias, err)),
            },
            (None, Some(wd)) => narrow_watch(channel, &self.registry, wd),
            (None, None) => {}
        }
        Ok(())
    }

    /// Open the channel and add every pending watch.
    ///
    /// Watches are added in registration order. If one fails, the ones before
    /// it stay active, the failing alias is dropped, the rest stay pending and
    /// the watcher stays open; see [`activate_pending`](Watcher::activate_pending).
    ///
    /// If the channel itself cannot be created the watcher stays unopened and
    /// `open` may be retried.
    pub fn open(&mut self) -> Result<()> {
        match self.state {
            State::Unopened => {}
            State::Open(_) => return Err(WatchError::AlreadyOpen),
            State::Closed => return Err(WatchError::Closed),
        }

        let channel = self
            .backend
            .open(self.config.init_flags)
            .map_err(|source| WatchError::ChannelOpen { source })?;
        self.state = State::Open(channel);
        self.activate_pending()
    }

    /// Add every pending watch to the kernel, stopping at the first failure.
    ///
    /// Aliases whose watch the kernel dropped on its own are pending again and
    /// get re-added here too.
    pub fn activate_pending(&mut self) -> Result<()> {
        let State::Open(channel) = &mut self.state else {
            return Err(WatchError::Closed);
        };

        for pending in self.registry.pending_entries() {
            setup_watch(channel, &mut self.registry, &pending)?;
        }
        Ok(())
    }

    /// Release the channel. Safe to call repeatedly.
    pub fn close(&mut self) {
        if let State::Open(_) = std::mem::replace(&mut self.state, State::Closed) {
            debug!("watcher closed with {} watches", self.registry.len());
        }
        self.buffer.clear();
        self.queue.clear();
        self.ready.clear();
        self.registry.clear_ids();
    }

    /// Wait for the next event.
    ///
    /// Cancel-safe: dropping the future loses no bytes or events.
    pub async fn get_event(&mut self) -> Result<Event> {
        std::future::poll_fn(|cx| self.poll_event(cx)).await
    }

    /// Poll for the next event
    pub fn poll_event(&mut self, cx: &mut Context<'_>) -> Poll<Result<Event>> {
        loop {
            if let Some(event) = self.ready.pop_front() {
                return Poll::Ready(Ok(event));
            }
            if let Some(raw) = self.queue.pop_front() {
                self.dispatch(raw);
                continue;
            }

            let State::Open(channel) = &mut self.state else {
                return Poll::Ready(Err(WatchError::Closed));
            };

            let start = self.buffer.len();
            self.buffer.resize(start + self.config.read_size, 0);
            let read = match channel.poll_read(cx, &mut self.buffer[start..]) {
                Poll::Pending => {
                    self.buffer.truncate(start);
                    return Poll::Pending;
                }
                Poll::Ready(Ok(0)) => Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "notification channel closed",
                )),
                Poll::Ready(result) => result,
            };

            match read {
                Ok(n) => {
                    self.buffer.truncate(start + n);
                    trace!("read {} bytes, {} buffered", n, self.buffer.len());
                }
                Err(err) => {
                    error!("notification channel failed: {}", err);
                    self.close();
                    return Poll::Ready(Err(WatchError::Io(err)));
                }
            }

            let (events, consumed) = raw::decode_all(&self.buffer);
            self.buffer.drain(..consumed);
            self.queue.extend(events);
        }
    }

    /// Turn one record into events for every alias that asked for it
    fn dispatch(&mut self, raw: RawEvent) {
        let flags = raw.flags();
        if flags.contains(Flags::Q_OVERFLOW) {
            warn!("inotify queue overflowed, events were lost");
            self.ready.push_back(Event::from_raw(&raw, String::new()));
            return;
        }

        let holders = self.registry.holders(raw.wd);
        if holders.is_empty() {
            match self.config.orphan_policy {
                OrphanPolicy::Deliver => self.ready.push_back(Event::from_raw(&raw, String::new())),
                OrphanPolicy::Drop => debug!("dropping event for removed watch wd={}", raw.wd),
            }
            return;
        }

        // IGNORED and UNMOUNT carry no event bits and concern every holder.
        let kinds = flags & Flags::ALL_EVENTS;
        for (alias, requested) in holders {
            if kinds.is_empty() || requested.intersects(kinds) {
                self.ready.push_back(Event::from_raw(&raw, alias));
            } else {
                trace!("{} did not ask for {} (wd={})", alias, kinds, raw.wd);
            }
        }

        if flags.contains(Flags::IGNORED) {
            debug!("kernel dropped watch wd={}", raw.wd);
            self.registry.deactivate(raw.wd);
        }
    }

    /// Check if the channel is open
    pub fn is_open(&self) -> bool {
        matches!(self.state, State::Open(_))
    }

    /// Check if the watcher was closed
    pub fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed)
    }

    /// The watch registry
    pub fn registry(&self) -> &WatchRegistry {
        &self.registry
    }

    /// Registered aliases, in registration order
    pub fn aliases(&self) -> Vec<&str> {
        self.registry.aliases()
    }

    /// The watcher configuration
    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }
}

impl<B: Backend> Drop for Watcher<B> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<B> Stream for Watcher<B>
where
    B: Backend + Unpin,
    B::Channel: Unpin,
{
    type Item = Result<Event>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.is_closed() {
            return Poll::Ready(None);
        }
        this.poll_event(cx).map(Some)
    }
}

fn setup_watch<C: Channel>(
    channel: &mut C,
    registry: &mut WatchRegistry,
    pending: &PendingWatch,
) -> Result<()> {
    // Another alias may already watch this inode; widen its mask instead of
    // replacing it.
    let flags = if pending.flags.contains(Flags::MASK_CREATE) {
        pending.flags
    } else {
        pending.flags | Flags::MASK_ADD
    };

    let added = CString::new(pending.path.as_os_str().as_bytes())
        .map_err(|_| WatchError::invalid_path(pending.path.to_string_lossy()))
        .and_then(|path| {
            channel
                .add_watch(&path, flags)
                .map_err(|err| WatchError::watch_setup(&pending.path, err))
        });

    match added {
        Ok(wd) => {
            debug!(
                "added watch {} on {} (wd={}, flags={})",
                pending.alias,
                pending.path.display(),
                wd,
                pending.flags
            );
            registry.activate(&pending.alias, wd)
        }
        Err(err) => {
            let _ = registry.remove(&pending.alias);
            Err(err)
        }
    }
}

/// Shrink the mask of a kernel watch to what its remaining aliases request.
///
/// Events outside an alias's flags are filtered on delivery anyway, so a
/// failure here only leaves the kernel reporting more than needed.
fn narrow_watch<C: Channel>(channel: &mut C, registry: &WatchRegistry, wd: WatchId) {
    let Some((path, flags)) = registry.shared_watch(wd) else {
        return;
    };
    let flags = flags - (Flags::MASK_ADD | Flags::MASK_CREATE);

    let Ok(c_path) = CString::new(path.as_os_str().as_bytes()) else {
        return;
    };
    match channel.add_watch(&c_path, flags) {
        Ok(id) if id == wd => debug!("narrowed watch wd={} to {}", wd, flags),
        Ok(other) => {
            // The path now leads to another inode; undo what we did to it.
            warn!(
                "{} no longer refers to watch wd={} (got wd={})",
                path.display(),
                wd,
                other
            );
            let restored = match registry.shared_watch(other) {
                Some((_, theirs)) => channel
                    .add_watch(&c_path, theirs - (Flags::MASK_ADD | Flags::MASK_CREATE))
                    .map(|_| ()),
                None => channel.remove_watch(other),
            };
            if let Err(err) = restored {
                warn!("failed to restore watch wd={}: {}", other, err);
            }
        }
        Err(err) => warn!("failed to narrow watch wd={}: {}", wd, err),
    }
}
