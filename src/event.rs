use std::ffi::OsStr;
use std::fmt;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use crate::flags::Flags;
use crate::raw::RawEvent;

/// A filesystem event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Name of the entry inside a watched directory, decoded lossily; empty
    /// for events on the watched path itself
    pub name: String,
    /// The name exactly as the kernel reported it
    pub raw_name: Vec<u8>,
    /// The event flags
    pub flags: Flags,
    /// Alias of the watch; empty if the watch was removed meanwhile
    pub alias: String,
    /// Links the two halves of a rename; zero otherwise
    pub cookie: u32,
}

impl Event {
    /// Build an event from a kernel record and the alias it resolved to
    pub fn from_raw(raw: &RawEvent, alias: impl Into<String>) -> Self {
        Event {
            name: String::from_utf8_lossy(&raw.name).into_owned(),
            raw_name: raw.name.clone(),
            flags: raw.flags(),
            alias: alias.into(),
            cookie: raw.cookie,
        }
    }

    /// Name as raw platform bytes
    pub fn name_os(&self) -> &OsStr {
        OsStr::from_bytes(&self.raw_name)
    }

    /// Full path of the entry, given the watched path of its alias
    pub fn path(&self, watched: &Path) -> PathBuf {
        if self.raw_name.is_empty() {
            watched.to_path_buf()
        } else {
            watched.join(self.name_os())
        }
    }

    /// Check if the watch was gone by the time the event was read
    pub fn is_orphan(&self) -> bool {
        self.alias.is_empty()
    }

    /// Check if the subject is a directory
    pub fn is_dir(&self) -> bool {
        self.flags.contains(Flags::ISDIR)
    }

    pub fn is_access(&self) -> bool {
        self.flags.contains(Flags::ACCESS)
    }

    pub fn is_modify(&self) -> bool {
        self.flags.contains(Flags::MODIFY)
    }

    pub fn is_attrib(&self) -> bool {
        self.flags.contains(Flags::ATTRIB)
    }

    pub fn is_open(&self) -> bool {
        self.flags.contains(Flags::OPEN)
    }

    pub fn is_close(&self) -> bool {
        self.flags.intersects(Flags::CLOSE)
    }

    pub fn is_create(&self) -> bool {
        self.flags.contains(Flags::CREATE)
    }

    pub fn is_delete(&self) -> bool {
        self.flags.intersects(Flags::DELETE | Flags::DELETE_SELF)
    }

    pub fn is_move(&self) -> bool {
        self.flags.intersects(Flags::MOVE | Flags::MOVE_SELF)
    }

    /// Check if the kernel dropped the watch (explicit removal, one-shot,
    /// deleted target or unmount)
    pub fn is_ignored(&self) -> bool {
        self.flags.contains(Flags::IGNORED)
    }

    /// Check if the kernel queue overflowed and events were lost
    pub fn is_overflow(&self) -> bool {
        self.flags.contains(Flags::Q_OVERFLOW)
    }

    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        if self.is_overflow() {
            "OVERFLOW"
        } else if self.is_create() {
            "CREATE"
        } else if self.is_delete() {
            "DELETE"
        } else if self.is_move() {
            "MOVE"
        } else if self.is_modify() {
            "MODIFY"
        } else if self.is_attrib() {
            "ATTRIB"
        } else if self.is_close() {
            "CLOSE"
        } else if self.is_open() {
            "OPEN"
        } else if self.is_access() {
            "ACCESS"
        } else if self.is_ignored() {
            "IGNORED"
        } else {
            "UNKNOWN"
        }
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        let mut parts = Vec::new();

        if self.is_create() {
            parts.push("create");
        }
        if self.is_delete() {
            parts.push("delete");
        }
        if self.is_move() {
            parts.push("move");
        }
        if self.is_modify() {
            parts.push("modify");
        }
        if self.is_attrib() {
            parts.push("attrib");
        }
        if self.is_open() {
            parts.push("open");
        }
        if self.is_close() {
            parts.push("close");
        }
        if self.is_access() {
            parts.push("access");
        }

        if parts.is_empty() {
            parts.push("unknown");
        }

        format!("{} event", parts.join(", "))
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {:?}: {}", self.alias, self.name, self.flags)?;
        if self.cookie != 0 {
            write!(f, " (cookie {})", self.cookie)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linux::{IN_CREATE, IN_ISDIR, IN_MOVED_TO};

    fn raw(mask: u32, cookie: u32, name: &[u8]) -> RawEvent {
        RawEvent {
            wd: 1,
            mask,
            cookie,
            name: name.to_vec(),
        }
    }

    #[test]
    fn test_from_raw() {
        let event = Event::from_raw(&raw(IN_CREATE | IN_ISDIR, 0, b"sub"), "home");
        assert_eq!(event.name, "sub");
        assert_eq!(event.alias, "home");
        assert!(event.is_create());
        assert!(event.is_dir());
        assert!(!event.is_orphan());
        assert_eq!(event.event_type(), "CREATE");
    }

    #[test]
    fn test_lossy_name() {
        let event = Event::from_raw(&raw(IN_CREATE, 0, b"bad\xffname"), "a");
        assert_eq!(event.name, "bad\u{fffd}name");
        assert_eq!(event.raw_name, b"bad\xffname");
    }

    #[test]
    fn test_non_utf8_path_keeps_bytes() {
        let event = Event::from_raw(&raw(IN_CREATE, 0, b"caf\xe9"), "dir");
        assert_eq!(event.name_os().as_bytes(), b"caf\xe9");

        let path = event.path(Path::new("/srv"));
        assert_eq!(path.as_os_str().as_bytes(), b"/srv/caf\xe9");
        assert_ne!(path, Path::new("/srv").join(&event.name));
    }

    #[test]
    fn test_path() {
        let watched = Path::new("/srv/data");
        let child = Event::from_raw(&raw(IN_CREATE, 0, b"a.txt"), "data");
        let itself = Event::from_raw(&raw(IN_CREATE, 0, b""), "data");
        assert_eq!(child.path(watched), PathBuf::from("/srv/data/a.txt"));
        assert_eq!(itself.path(watched), PathBuf::from("/srv/data"));
    }

    #[test]
    fn test_display_and_description() {
        let event = Event::from_raw(&raw(IN_MOVED_TO, 42, b"b"), "");
        assert!(event.is_orphan());
        assert!(event.is_move());
        assert_eq!(event.to_string(), "[] \"b\": MOVED_TO (cookie 42)");
        assert_eq!(event.description(), "move event");
    }
}
