use std::fmt;

use bitflags::bitflags;
use crate::linux::*;

bitflags! {
    /// Flags for inotify channel creation
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct InitFlags: u32 {
        /// Close-on-exec flag
        const CLOEXEC = IN_CLOEXEC;

        /// Non-blocking flag
        const NONBLOCK = IN_NONBLOCK;
    }
}

bitflags! {
    /// Event kinds and watch options, laid out as the kernel ABI defines them
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Flags: u32 {
        // File events
        const ACCESS = IN_ACCESS;
        const MODIFY = IN_MODIFY;
        const ATTRIB = IN_ATTRIB;
        const CLOSE_WRITE = IN_CLOSE_WRITE;
        const CLOSE_NOWRITE = IN_CLOSE_NOWRITE;
        const OPEN = IN_OPEN;
        const MOVED_FROM = IN_MOVED_FROM;
        const MOVED_TO = IN_MOVED_TO;
        const CREATE = IN_CREATE;
        const DELETE = IN_DELETE;
        const DELETE_SELF = IN_DELETE_SELF;
        const MOVE_SELF = IN_MOVE_SELF;

        // Reported by the kernel
        const UNMOUNT = IN_UNMOUNT;
        const Q_OVERFLOW = IN_Q_OVERFLOW;
        const IGNORED = IN_IGNORED;
        const ISDIR = IN_ISDIR;

        // Watch options
        const ONLYDIR = IN_ONLYDIR;
        const DONT_FOLLOW = IN_DONT_FOLLOW;
        const EXCL_UNLINK = IN_EXCL_UNLINK;
        const MASK_CREATE = IN_MASK_CREATE;
        const MASK_ADD = IN_MASK_ADD;
        const ONESHOT = IN_ONESHOT;

        // Convenience combinations
        const CLOSE = Self::CLOSE_WRITE.bits() | Self::CLOSE_NOWRITE.bits();
        const MOVE = Self::MOVED_FROM.bits() | Self::MOVED_TO.bits();
        const ALL_EVENTS = IN_ALL_EVENTS;
    }
}

impl Default for InitFlags {
    fn default() -> Self {
        InitFlags::CLOEXEC | InitFlags::NONBLOCK
    }
}

impl Default for Flags {
    fn default() -> Self {
        Flags::ALL_EVENTS
    }
}

impl Flags {
    /// Decode a raw kernel mask, dropping bits this crate does not name
    pub fn decode(raw: u32) -> Self {
        Flags::from_bits_truncate(raw)
    }

    /// The raw mask handed to the kernel
    pub fn encode(self) -> u32 {
        self.bits()
    }

    /// Names of the single-bit flags contained in this set
    pub fn names(&self) -> Vec<&'static str> {
        self.iter_names().map(|(name, _)| name).collect()
    }

    /// Check if the set contains file events (as opposed to only options)
    pub fn has_events(&self) -> bool {
        self.intersects(Flags::ALL_EVENTS)
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("(none)");
        }
        f.write_str(&self.names().join("|"))
    }
}
