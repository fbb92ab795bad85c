//! Alias-based asynchronous watches over Linux inotify
//!
//! This crate registers filesystem paths with inotify under caller-chosen
//! aliases and exposes every watch's events as one ordered, asynchronous
//! stream of structured [`Event`]s.
//!
//! # Features
//!
//! - **Deferred registration**: watches can be declared before the channel
//!   is opened and are handed to the kernel on [`Watcher::open`]
//! - **Aliases**: events carry the alias of the watch that produced them
//! - **Faithful transport**: no recursion, debouncing or deduplication; events
//!   arrive in kernel order with rename cookies intact
//! - **Cancel-safe stream**: [`Watcher`] implements `futures::Stream`, and an
//!   abandoned wait loses nothing
//! - **Pluggable channel**: the kernel side sits behind the
//!   [`Backend`]/[`Channel`] traits; the `tokio` feature provides the inotify
//!   implementation
//!
//! # Examples
//!
//! ```no_run
//! use futures::StreamExt;
//! use inotify_watch::{Flags, Watcher};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut watcher = Watcher::new();
//!     watcher.watch_with_alias("tmp", "/tmp", Flags::CREATE | Flags::DELETE)?;
//!     watcher.open()?;
//!
//!     while let Some(event) = watcher.next().await {
//!         let event = event?;
//!         println!("{}: {} {}", event.alias, event.name, event.flags);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod flags;
pub mod linux;
pub mod raw;
pub mod registry;
pub mod event;
pub mod config;
pub mod channel;
pub mod watcher;

pub use error::{WatchError, Result};
pub use flags::{Flags, InitFlags};
pub use raw::RawEvent;
pub use registry::{PendingWatch, WatchId, WatchRegistry};
pub use event::Event;
pub use config::{OrphanPolicy, WatcherConfig};
pub use channel::{Backend, Channel};
#[cfg(feature = "tokio")]
pub use channel::{Inotify, InotifyChannel};
pub use watcher::Watcher;
