use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::registry::WatchId;

/// Result type for watcher operations
pub type Result<T> = std::result::Result<T, WatchError>;

/// Errors that can occur while managing watches or reading events
#[derive(Error, Debug)]
pub enum WatchError {
    /// An alias was registered twice
    #[error("A watch is already registered for alias {alias}")]
    DuplicateAlias { alias: String },

    /// An alias that was never registered (or was already removed)
    #[error("Unknown watch alias: {alias}")]
    UnknownAlias { alias: String },

    /// No active watch carries this kernel watch id
    #[error("No active watch for watch descriptor {wd}")]
    UnknownWatch { wd: WatchId },

    /// The watcher is not open
    #[error("Watcher is closed")]
    Closed,

    /// The watcher was opened twice
    #[error("Watcher is already open")]
    AlreadyOpen,

    /// The kernel refused to add a watch
    #[error("Failed to set up watch on {}: {source}", path.display())]
    WatchSetup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The kernel refused to remove or narrow a watch
    #[error("Failed to remove watch {alias}: {source}")]
    WatchRemove {
        alias: String,
        #[source]
        source: io::Error,
    },

    /// The notification channel could not be created
    #[error("Failed to open notification channel: {source}")]
    ChannelOpen {
        #[source]
        source: io::Error,
    },

    /// The buffer ends before the record it holds
    #[error("Truncated record: need {needed} bytes, {available} available")]
    TruncatedRecord { needed: usize, available: usize },

    /// Path cannot be passed to the kernel
    #[error("Invalid path: {path}")]
    InvalidPath { path: String },

    /// Watch flags the kernel would reject or never report on
    #[error("Invalid flags: {message}")]
    InvalidFlags { message: String },

    /// Invalid watcher configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// The notification channel failed while reading; the stream is over
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl WatchError {
    /// Create a new duplicate alias error
    pub fn duplicate_alias(alias: impl Into<String>) -> Self {
        WatchError::DuplicateAlias {
            alias: alias.into(),
        }
    }

    /// Create a new unknown alias error
    pub fn unknown_alias(alias: impl Into<String>) -> Self {
        WatchError::UnknownAlias {
            alias: alias.into(),
        }
    }

    /// Create a new watch setup error
    pub fn watch_setup(path: impl Into<PathBuf>, source: io::Error) -> Self {
        WatchError::WatchSetup {
            path: path.into(),
            source,
        }
    }

    /// Create a new watch removal error
    pub fn watch_remove(alias: impl Into<String>, source: io::Error) -> Self {
        WatchError::WatchRemove {
            alias: alias.into(),
            source,
        }
    }

    /// Create a new invalid flags error
    pub fn invalid_flags(message: impl Into<String>) -> Self {
        WatchError::InvalidFlags {
            message: message.into(),
        }
    }

    /// Create a new invalid path error
    pub fn invalid_path(path: impl Into<String>) -> Self {
        WatchError::InvalidPath { path: path.into() }
    }

    /// Create a new invalid configuration error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        WatchError::InvalidConfig {
            message: message.into(),
        }
    }

    /// Whether the error comes from calling the watcher out of contract
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            WatchError::DuplicateAlias { .. }
                | WatchError::UnknownAlias { .. }
                | WatchError::Closed
                | WatchError::AlreadyOpen
                | WatchError::InvalidFlags { .. }
        )
    }

    /// Whether the error terminated the event stream
    pub fn is_fatal(&self) -> bool {
        matches!(self, WatchError::Io(_))
    }

    /// The underlying OS error number, if any
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            WatchError::WatchSetup { source, .. }
            | WatchError::WatchRemove { source, .. }
            | WatchError::ChannelOpen { source } => source.raw_os_error(),
            WatchError::Io(err) => err.raw_os_error(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(WatchError::duplicate_alias("a").is_usage_error());
        assert!(WatchError::unknown_alias("a").is_usage_error());
        assert!(WatchError::Closed.is_usage_error());
        assert!(!WatchError::Closed.is_fatal());

        let fatal = WatchError::from(io::Error::from_raw_os_error(libc::EBADF));
        assert!(fatal.is_fatal());
        assert_eq!(fatal.raw_os_error(), Some(libc::EBADF));
    }

    #[test]
    fn test_setup_error_message() {
        let err = WatchError::watch_setup(
            "/nonexistent",
            io::Error::from_raw_os_error(libc::ENOENT),
        );
        assert!(err.to_string().starts_with("Failed to set up watch on /nonexistent"));
        assert_eq!(err.raw_os_error(), Some(libc::ENOENT));
        assert!(!err.is_usage_error());
    }

    #[test]
    fn test_recoverable_os_errors_are_not_fatal() {
        let remove = WatchError::watch_remove("a", io::Error::from_raw_os_error(libc::EIO));
        assert!(!remove.is_fatal());
        assert_eq!(remove.raw_os_error(), Some(libc::EIO));

        let open = WatchError::ChannelOpen {
            source: io::Error::from_raw_os_error(libc::EMFILE),
        };
        assert!(!open.is_fatal());
        assert_eq!(open.raw_os_error(), Some(libc::EMFILE));

        assert!(WatchError::invalid_flags("no events").is_usage_error());
    }
}
