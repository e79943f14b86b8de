//! Time-bounded cache of the known replacement tags.

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use regex::Regex;
use tracing::debug;

use crate::observability::metrics;
use crate::store::RuleStore;

/// Default staleness window for the tag snapshot.
pub const DEFAULT_TAG_TTL: Duration = Duration::from_secs(300);

/// One known tag with its compiled placeholder pattern.
#[derive(Debug)]
pub struct TagEntry {
    pub name: String,
    pub default_value: String,
    /// Matches the literal placeholder `[name]`, brackets escaped.
    pub pattern: Regex,
}

/// A point-in-time view of all known tags.
#[derive(Debug)]
pub struct TagSnapshot {
    pub entries: Vec<TagEntry>,
    fetched_at: Instant,
}

impl TagSnapshot {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

/// TTL cache over the store's tag table.
///
/// Refresh computes the full snapshot, including the per-tag placeholder
/// patterns, before atomically publishing it; readers never observe a
/// partially built snapshot. Concurrent refreshes near expiry may race,
/// which at worst repeats the store query.
pub struct TagRegistry {
    snapshot: ArcSwapOption<TagSnapshot>,
    ttl: Duration,
}

impl TagRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            snapshot: ArcSwapOption::const_empty(),
            ttl,
        }
    }

    /// The current snapshot, refreshed from the store when expired.
    pub fn get(&self, store: &dyn RuleStore) -> Arc<TagSnapshot> {
        if let Some(snapshot) = self.snapshot.load_full() {
            if snapshot.is_fresh(self.ttl) {
                return snapshot;
            }
        }
        let fresh = Arc::new(Self::fetch(store));
        self.snapshot.store(Some(fresh.clone()));
        fresh
    }

    fn fetch(store: &dyn RuleStore) -> TagSnapshot {
        let entries: Vec<TagEntry> = store
            .all_tags()
            .into_iter()
            .map(|tag| {
                let pattern = Regex::new(&format!(r"\[{}\]", regex::escape(&tag.name)))
                    .expect("escaped tag name is a valid pattern");
                TagEntry {
                    name: tag.name,
                    default_value: tag.default_value,
                    pattern,
                }
            })
            .collect();
        debug!(tags = entries.len(), "tag registry refreshed");
        metrics::record_registry_refresh();
        TagSnapshot {
            entries,
            fetched_at: Instant::now(),
        }
    }
}
