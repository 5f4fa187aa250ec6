//! Storage for per-context active themes.

use crate::common::sync::RwLockExt;
use crate::manager::ActiveTheme;
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Concurrent key/value store holding one [`ActiveTheme`] per context.
///
/// The manager only talks to the store through this trait, so callers can
/// inject their own implementation (sharded, per-tenant, instrumented).
/// Every method must be atomic with respect to the others for a given key.
pub trait ThemeStore: Send + Sync + fmt::Debug {
    fn get(&self, context: &str) -> Option<ActiveTheme>;

    /// Insert or replace the entry for `context`.
    fn insert(&self, context: &str, theme: ActiveTheme);

    /// Mutate an existing entry in place and return the updated copy.
    ///
    /// Returns `None`, without creating anything, when there is no entry.
    fn update(&self, context: &str, apply: &mut dyn FnMut(&mut ActiveTheme))
    -> Option<ActiveTheme>;

    fn remove(&self, context: &str) -> Option<ActiveTheme>;

    fn contexts(&self) -> Vec<String>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop expired entries, returning how many were removed.
    fn purge_expired(&self) -> usize;
}

/// Bounds applied by [`InMemoryThemeStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreLimits {
    /// Entries not updated within this window are treated as absent
    pub ttl: Option<Duration>,
    /// Maximum entries; the least recently updated one is evicted first
    pub max_entries: Option<usize>,
}

#[derive(Debug, Clone)]
struct StoredTheme {
    theme: ActiveTheme,
    touched_at: Instant,
    sequence: u64,
}

impl StoredTheme {
    fn is_expired(&self, ttl: Option<Duration>) -> bool {
        ttl.is_some_and(|ttl| self.touched_at.elapsed() >= ttl)
    }
}

/// Default [`ThemeStore`]: a map behind one reader/writer lock with
/// optional TTL and LRU bounds.
#[derive(Debug, Default)]
pub struct InMemoryThemeStore {
    entries: RwLock<HashMap<String, StoredTheme>>,
    limits: StoreLimits,
    sequence: AtomicU64,
}

impl InMemoryThemeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: StoreLimits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    pub fn limits(&self) -> StoreLimits {
        self.limits
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    fn purge_locked(&self, entries: &mut HashMap<String, StoredTheme>) -> usize {
        if self.limits.ttl.is_none() {
            return 0;
        }

        let before = entries.len();
        entries.retain(|_, stored| !stored.is_expired(self.limits.ttl));
        before - entries.len()
    }

    fn evict_to_capacity(&self, entries: &mut HashMap<String, StoredTheme>, incoming: &str) {
        let Some(max_entries) = self.limits.max_entries else {
            return;
        };

        while entries.len() >= max_entries.max(1) && !entries.contains_key(incoming) {
            let oldest = entries
                .iter()
                .min_by_key(|(_, stored)| stored.sequence)
                .map(|(context, _)| context.clone());

            match oldest {
                Some(context) => {
                    log::debug!("Evicting least recently updated theme context '{context}'");
                    entries.remove(&context);
                }
                None => break,
            }
        }
    }
}

impl ThemeStore for InMemoryThemeStore {
    fn get(&self, context: &str) -> Option<ActiveTheme> {
        self.entries
            .read_recover()
            .get(context)
            .filter(|stored| !stored.is_expired(self.limits.ttl))
            .map(|stored| stored.theme.clone())
    }

    fn insert(&self, context: &str, theme: ActiveTheme) {
        let mut entries = self.entries.write_recover();
        let purged = self.purge_locked(&mut entries);
        if purged > 0 {
            log::debug!("Purged {purged} expired theme contexts");
        }
        self.evict_to_capacity(&mut entries, context);

        let stored = StoredTheme {
            theme,
            touched_at: Instant::now(),
            sequence: self.next_sequence(),
        };
        entries.insert(context.to_string(), stored);
    }

    fn update(
        &self,
        context: &str,
        apply: &mut dyn FnMut(&mut ActiveTheme),
    ) -> Option<ActiveTheme> {
        let mut entries = self.entries.write_recover();

        let expired = entries
            .get(context)
            .is_some_and(|stored| stored.is_expired(self.limits.ttl));
        if expired {
            entries.remove(context);
            return None;
        }

        let sequence = self.next_sequence();
        let stored = entries.get_mut(context)?;
        apply(&mut stored.theme);
        stored.touched_at = Instant::now();
        stored.sequence = sequence;
        Some(stored.theme.clone())
    }

    fn remove(&self, context: &str) -> Option<ActiveTheme> {
        self.entries
            .write_recover()
            .remove(context)
            .map(|stored| stored.theme)
    }

    fn contexts(&self) -> Vec<String> {
        let mut contexts: Vec<String> = self
            .entries
            .read_recover()
            .iter()
            .filter(|(_, stored)| !stored.is_expired(self.limits.ttl))
            .map(|(context, _)| context.clone())
            .collect();
        contexts.sort();
        contexts
    }

    fn len(&self) -> usize {
        self.entries
            .read_recover()
            .values()
            .filter(|stored| !stored.is_expired(self.limits.ttl))
            .count()
    }

    fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write_recover();
        self.purge_locked(&mut entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::TokenMap;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn theme(id: &str) -> ActiveTheme {
        ActiveTheme {
            id: id.to_string(),
            tenant: String::new(),
            dark_mode: false,
            resolved_tokens: TokenMap::new(),
            last_updated: Utc::now(),
            context: BTreeMap::new(),
        }
    }

    #[test]
    fn test_insert_replaces_entry() {
        let store = InMemoryThemeStore::new();
        store.insert("s1", theme("blue"));
        store.insert("s1", theme("green"));

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("s1").map(|t| t.id), Some("green".to_string()));
    }

    #[test]
    fn test_update_missing_entry_creates_nothing() {
        let store = InMemoryThemeStore::new();
        let updated = store.update("ghost", &mut |t: &mut ActiveTheme| t.dark_mode = true);

        assert!(updated.is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_update_mutates_in_place() {
        let store = InMemoryThemeStore::new();
        store.insert("s1", theme("blue"));

        let updated = store.update("s1", &mut |t: &mut ActiveTheme| t.dark_mode = !t.dark_mode);
        assert_eq!(updated.map(|t| t.dark_mode), Some(true));
        assert_eq!(store.get("s1").map(|t| t.dark_mode), Some(true));
    }

    #[test]
    fn test_max_entries_evicts_least_recently_updated() {
        let store = InMemoryThemeStore::with_limits(StoreLimits {
            ttl: None,
            max_entries: Some(2),
        });
        store.insert("s1", theme("blue"));
        store.insert("s2", theme("blue"));
        store.update("s1", &mut |t: &mut ActiveTheme| t.dark_mode = true);
        store.insert("s3", theme("blue"));

        assert_eq!(store.contexts(), vec!["s1".to_string(), "s3".to_string()]);
    }

    #[test]
    fn test_replacing_existing_key_at_capacity_evicts_nothing() {
        let store = InMemoryThemeStore::with_limits(StoreLimits {
            ttl: None,
            max_entries: Some(2),
        });
        store.insert("s1", theme("blue"));
        store.insert("s2", theme("blue"));
        store.insert("s1", theme("green"));

        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_ttl_expiry() {
        let store = InMemoryThemeStore::with_limits(StoreLimits {
            ttl: Some(Duration::from_millis(20)),
            max_entries: None,
        });
        store.insert("s1", theme("blue"));
        assert!(store.get("s1").is_some());

        std::thread::sleep(Duration::from_millis(40));
        assert!(store.get("s1").is_none());
        assert!(store.update("s1", &mut |t: &mut ActiveTheme| t.dark_mode = true).is_none());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_store_without_ttl_never_purges() {
        let store = InMemoryThemeStore::new();
        for i in 0..100 {
            store.insert(&format!("s{i}"), theme("blue"));
        }

        assert_eq!(store.purge_expired(), 0);
        assert_eq!(store.len(), 100);
    }

    #[test]
    fn test_purge_expired_counts_removed_entries() {
        let store = InMemoryThemeStore::with_limits(StoreLimits {
            ttl: Some(Duration::from_millis(10)),
            max_entries: None,
        });
        store.insert("s1", theme("blue"));
        store.insert("s2", theme("blue"));
        std::thread::sleep(Duration::from_millis(30));

        assert_eq!(store.purge_expired(), 2);
        assert_eq!(store.purge_expired(), 0);
    }
}
