use crate::error::{Result, WatchError};
use crate::flags::InitFlags;
use crate::linux::MIN_READ_SIZE;

/// Default number of bytes requested per read
pub const DEFAULT_READ_SIZE: usize = 4096;

/// What to do with an event whose watch is no longer registered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrphanPolicy {
    /// Hand the event out with an empty alias
    #[default]
    Deliver,
    /// Discard the event
    Drop,
}

/// Settings for a [`Watcher`](crate::Watcher)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatcherConfig {
    /// Flags used when creating the channel
    pub init_flags: InitFlags,
    /// Bytes requested per read
    pub read_size: usize,
    /// Handling of events for removed watches
    pub orphan_policy: OrphanPolicy,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            init_flags: InitFlags::default(),
            read_size: DEFAULT_READ_SIZE,
            orphan_policy: OrphanPolicy::default(),
        }
    }
}

impl WatcherConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the channel creation flags
    pub fn with_init_flags(mut self, flags: InitFlags) -> Self {
        self.init_flags = flags;
        self
    }

    /// Set the number of bytes requested per read
    pub fn with_read_size(mut self, size: usize) -> Self {
        self.read_size = size;
        self
    }

    /// Set the orphan event policy
    pub fn with_orphan_policy(mut self, policy: OrphanPolicy) -> Self {
        self.orphan_policy = policy;
        self
    }

    /// Check the settings against what the kernel accepts
    pub fn validate(&self) -> Result<()> {
        if self.read_size < MIN_READ_SIZE {
            return Err(WatchError::invalid_config(format!(
                "read size {} is below the minimum of {} bytes",
                self.read_size, MIN_READ_SIZE
            )));
        }
        Ok(())
    }
}
