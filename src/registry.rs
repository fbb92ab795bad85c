//! Alias bookkeeping for watches.
//!
//! Every watch is known by a caller-chosen alias. An entry is *pending* until
//! the kernel hands back a watch descriptor for it, and *active* afterwards.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{Result, WatchError};
use crate::flags::Flags;

/// Kernel-assigned watch descriptor
pub type WatchId = i32;

#[derive(Debug, Clone)]
struct Entry {
    path: PathBuf,
    flags: Flags,
    wd: Option<WatchId>,
    seq: u64,
}

/// A registration waiting for the kernel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWatch {
    pub alias: String,
    pub path: PathBuf,
    pub flags: Flags,
}

/// Bidirectional mapping between aliases and kernel watch descriptors
#[derive(Debug, Default)]
pub struct WatchRegistry {
    entries: HashMap<String, Entry>,
    aliases: HashMap<WatchId, String>,
    next_seq: u64,
}

impl WatchRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending watch
    pub fn add_pending(&mut self, alias: &str, path: &Path, flags: Flags) -> Result<()> {
        if self.entries.contains_key(alias) {
            return Err(WatchError::duplicate_alias(alias));
        }

        self.entries.insert(
            alias.to_string(),
            Entry {
                path: path.to_path_buf(),
                flags,
                wd: None,
                seq: self.next_seq,
            },
        );
        self.next_seq += 1;
        Ok(())
    }

    /// Record the kernel descriptor for an alias
    pub fn activate(&mut self, alias: &str, wd: WatchId) -> Result<()> {
        let entry = self
            .entries
            .get_mut(alias)
            .ok_or_else(|| WatchError::unknown_alias(alias))?;

        if let Some(old) = entry.wd.replace(wd) {
            if old != wd && self.aliases.get(&old).map(String::as_str) == Some(alias) {
                self.aliases.remove(&old);
            }
        }
        // The kernel hands out one descriptor per inode; the latest alias wins.
        self.aliases.insert(wd, alias.to_string());
        Ok(())
    }

    /// Alias of the active watch with descriptor `wd`
    pub fn resolve(&self, wd: WatchId) -> Result<&str> {
        self.aliases
            .get(&wd)
            .map(String::as_str)
            .ok_or(WatchError::UnknownWatch { wd })
    }

    /// Aliases sharing the active descriptor `wd` with their requested flags,
    /// in registration order
    pub fn holders(&self, wd: WatchId) -> Vec<(&str, Flags)> {
        let mut holders: Vec<_> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.wd == Some(wd))
            .collect();
        holders.sort_by_key(|(_, entry)| entry.seq);

        holders
            .into_iter()
            .map(|(alias, entry)| (alias.as_str(), entry.flags))
            .collect()
    }

    /// Path and combined flags of every alias still holding `wd`.
    ///
    /// The kernel keeps a single mask per descriptor; this is the mask it
    /// should carry. The path is the latest holder's.
    pub fn shared_watch(&self, wd: WatchId) -> Option<(PathBuf, Flags)> {
        let latest = self.holder_of(wd)?;
        let path = self.entries.get(&latest)?.path.clone();
        let flags = self
            .holders(wd)
            .into_iter()
            .fold(Flags::empty(), |acc, (_, flags)| acc | flags);
        Some((path, flags))
    }

    /// Drop an alias.
    ///
    /// Returns the descriptor the caller must remove from the kernel, or
    /// `None` if the entry was pending or its descriptor is shared with
    /// another alias.
    pub fn remove(&mut self, alias: &str) -> Result<Option<WatchId>> {
        let entry = self
            .entries
            .remove(alias)
            .ok_or_else(|| WatchError::unknown_alias(alias))?;

        let Some(wd) = entry.wd else {
            return Ok(None);
        };

        match self.holder_of(wd) {
            Some(other) => {
                if self.aliases.get(&wd).map(String::as_str) == Some(alias) {
                    self.aliases.insert(wd, other);
                }
                Ok(None)
            }
            None => {
                self.aliases.remove(&wd);
                Ok(Some(wd))
            }
        }
    }

    /// Forget a descriptor the kernel removed on its own.
    ///
    /// Aliases holding it go back to pending so a later removal needs no
    /// kernel call.
    pub fn deactivate(&mut self, wd: WatchId) -> Option<String> {
        for entry in self.entries.values_mut() {
            if entry.wd == Some(wd) {
                entry.wd = None;
            }
        }
        self.aliases.remove(&wd)
    }

    /// Pending registrations, in registration order
    pub fn pending_entries(&self) -> Vec<PendingWatch> {
        let mut pending: Vec<_> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.wd.is_none())
            .collect();
        pending.sort_by_key(|(_, entry)| entry.seq);

        pending
            .into_iter()
            .map(|(alias, entry)| PendingWatch {
                alias: alias.clone(),
                path: entry.path.clone(),
                flags: entry.flags,
            })
            .collect()
    }

    /// Drop every descriptor, leaving all aliases pending
    pub fn clear_ids(&mut self) {
        for entry in self.entries.values_mut() {
            entry.wd = None;
        }
        self.aliases.clear();
    }

    /// Check if an alias is registered
    pub fn contains(&self, alias: &str) -> bool {
        self.entries.contains_key(alias)
    }

    /// Descriptor of an active alias
    pub fn watch_id(&self, alias: &str) -> Option<WatchId> {
        self.entries.get(alias).and_then(|entry| entry.wd)
    }

    /// Watched path of an alias
    pub fn path_of(&self, alias: &str) -> Option<&Path> {
        self.entries.get(alias).map(|entry| entry.path.as_path())
    }

    /// Requested flags of an alias
    pub fn flags_of(&self, alias: &str) -> Option<Flags> {
        self.entries.get(alias).map(|entry| entry.flags)
    }

    /// Registered aliases, in registration order
    pub fn aliases(&self) -> Vec<&str> {
        let mut aliases: Vec<_> = self.entries.iter().collect();
        aliases.sort_by_key(|(_, entry)| entry.seq);
        aliases.into_iter().map(|(alias, _)| alias.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.entries.values().filter(|entry| entry.wd.is_some()).count()
    }

    pub fn pending_count(&self) -> usize {
        self.len() - self.active_count()
    }

    fn holder_of(&self, wd: WatchId) -> Option<String> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.wd == Some(wd))
            .max_by_key(|(_, entry)| entry.seq)
            .map(|(alias, _)| alias.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(aliases: &[&str]) -> WatchRegistry {
        let mut registry = WatchRegistry::new();
        for alias in aliases {
            registry
                .add_pending(alias, Path::new(&format!("/tmp/{}", alias)), Flags::CREATE)
                .unwrap();
        }
        registry
    }

    #[test]
    fn test_add_pending() {
        let registry = registry_with(&["a", "b"]);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.pending_count(), 2);
        assert_eq!(registry.active_count(), 0);
        assert_eq!(registry.path_of("a"), Some(Path::new("/tmp/a")));
        assert_eq!(registry.flags_of("b"), Some(Flags::CREATE));
    }

    #[test]
    fn test_duplicate_alias_leaves_registry_unchanged() {
        let mut registry = registry_with(&["a"]);
        registry.activate("a", 1).unwrap();

        let err = registry
            .add_pending("a", Path::new("/elsewhere"), Flags::DELETE)
            .unwrap_err();
        assert!(matches!(err, WatchError::DuplicateAlias { ref alias } if alias == "a"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.path_of("a"), Some(Path::new("/tmp/a")));
        assert_eq!(registry.watch_id("a"), Some(1));
    }

    #[test]
    fn test_activate_and_resolve() {
        let mut registry = registry_with(&["a", "b"]);
        registry.activate("a", 4).unwrap();

        assert_eq!(registry.resolve(4).unwrap(), "a");
        assert!(matches!(registry.resolve(5), Err(WatchError::UnknownWatch { wd: 5 })));
        assert_eq!(registry.active_count(), 1);
        assert_eq!(registry.pending_entries().len(), 1);
        assert!(matches!(
            registry.activate("zzz", 9),
            Err(WatchError::UnknownAlias { .. })
        ));
    }

    #[test]
    fn test_pending_entries_in_registration_order() {
        let registry = registry_with(&["c", "a", "b"]);
        let aliases: Vec<_> = registry
            .pending_entries()
            .into_iter()
            .map(|pending| pending.alias)
            .collect();
        assert_eq!(aliases, vec!["c", "a", "b"]);
        assert_eq!(registry.aliases(), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_remove() {
        let mut registry = registry_with(&["a", "b"]);
        registry.activate("a", 1).unwrap();

        assert_eq!(registry.remove("a").unwrap(), Some(1));
        assert_eq!(registry.remove("b").unwrap(), None);
        assert!(registry.resolve(1).is_err());
        assert!(registry.is_empty());
        assert!(matches!(
            registry.remove("a"),
            Err(WatchError::UnknownAlias { .. })
        ));
    }

    #[test]
    fn test_shared_descriptor() {
        let mut registry = registry_with(&["first", "second"]);
        registry.activate("first", 7).unwrap();
        registry.activate("second", 7).unwrap();
        assert_eq!(registry.resolve(7).unwrap(), "second");

        // The kernel watch stays while another alias holds it.
        assert_eq!(registry.remove("second").unwrap(), None);
        assert_eq!(registry.resolve(7).unwrap(), "first");
        assert_eq!(registry.remove("first").unwrap(), Some(7));
    }

    #[test]
    fn test_shared_watch_mask() {
        let mut registry = WatchRegistry::new();
        registry.add_pending("creates", Path::new("/d"), Flags::CREATE).unwrap();
        registry.add_pending("deletes", Path::new("/d/."), Flags::DELETE).unwrap();
        registry.add_pending("other", Path::new("/e"), Flags::MODIFY).unwrap();
        registry.activate("creates", 1).unwrap();
        registry.activate("deletes", 1).unwrap();
        registry.activate("other", 2).unwrap();

        assert_eq!(
            registry.holders(1),
            vec![("creates", Flags::CREATE), ("deletes", Flags::DELETE)]
        );
        assert_eq!(
            registry.shared_watch(1),
            Some((PathBuf::from("/d/."), Flags::CREATE | Flags::DELETE))
        );

        registry.remove("deletes").unwrap();
        assert_eq!(registry.holders(1), vec![("creates", Flags::CREATE)]);
        assert_eq!(
            registry.shared_watch(1),
            Some((PathBuf::from("/d"), Flags::CREATE))
        );
        assert_eq!(registry.shared_watch(3), None);
        assert!(registry.holders(3).is_empty());
    }

    #[test]
    fn test_deactivate() {
        let mut registry = registry_with(&["a"]);
        registry.activate("a", 3).unwrap();

        assert_eq!(registry.deactivate(3).as_deref(), Some("a"));
        assert!(registry.contains("a"));
        assert_eq!(registry.watch_id("a"), None);
        assert_eq!(registry.remove("a").unwrap(), None);
        assert_eq!(registry.deactivate(3), None);
    }

    #[test]
    fn test_clear_ids() {
        let mut registry = registry_with(&["a", "b"]);
        registry.activate("a", 1).unwrap();
        registry.activate("b", 2).unwrap();

        registry.clear_ids();
        assert_eq!(registry.pending_count(), 2);
        assert!(registry.resolve(1).is_err());
    }
}
