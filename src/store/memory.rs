//! In-memory rule store.
//!
//! DashMap-backed so the admin API can mutate rules while request handlers
//! run lookups concurrently. Keys are stored lowercase; probes are lowercased
//! on the way in, which gives every table case-insensitive exact matching.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;

use super::{
    RefererMatchMode, ReplacementTag, ReplacementValue, RuleId, RuleKind, RuleStore, StoreError,
};

/// Admin-facing summary of one stored rule.
#[derive(Debug, Clone, Serialize)]
pub struct RuleSummary {
    pub id: RuleId,
    pub kind: RuleKind,
    pub key: String,
    pub values: Vec<u64>,
}

/// Thread-safe in-memory implementation of [`RuleStore`].
#[derive(Default)]
pub struct MemoryStore {
    next_id: AtomicU64,
    tags: DashMap<String, ReplacementTag>,
    values: DashMap<u64, ReplacementValue>,
    hostname_rules: DashMap<String, RuleId>,
    path_rules: DashMap<String, RuleId>,
    query_rules: DashMap<String, RuleId>,
    referer_rules: DashMap<String, RuleId>,
    search_rules: DashMap<(String, bool), RuleId>,
    bindings: DashMap<RuleId, Vec<u64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn add_tag(
        &self,
        name: impl Into<String>,
        default_value: impl Into<String>,
    ) -> Result<(), StoreError> {
        let name = name.into();
        match self.tags.entry(name.clone()) {
            Entry::Occupied(_) => Err(StoreError::Duplicate {
                table: "tag",
                key: name,
            }),
            Entry::Vacant(entry) => {
                entry.insert(ReplacementTag {
                    name,
                    default_value: default_value.into(),
                });
                Ok(())
            }
        }
    }

    pub fn add_value(
        &self,
        tag: impl Into<String>,
        name: impl Into<String>,
        data: impl Into<String>,
        active: bool,
    ) -> Result<u64, StoreError> {
        let tag = tag.into();
        if !self.tags.contains_key(&tag) {
            return Err(StoreError::UnknownTag(tag));
        }
        let id = self.allocate_id();
        self.values.insert(
            id,
            ReplacementValue {
                id,
                tag,
                name: name.into(),
                data: data.into(),
                active,
            },
        );
        Ok(id)
    }

    /// Flip a value's active flag. Inactive values stay stored but stop
    /// participating in lookups.
    pub fn set_value_active(&self, id: u64, active: bool) -> Result<(), StoreError> {
        match self.values.get_mut(&id) {
            Some(mut value) => {
                value.active = active;
                Ok(())
            }
            None => Err(StoreError::UnknownValue(id)),
        }
    }

    pub fn add_hostname_rule(
        &self,
        hostname: &str,
        values: Vec<u64>,
    ) -> Result<RuleId, StoreError> {
        let key = hostname.to_ascii_lowercase();
        self.insert_keyed_rule(&self.hostname_rules, "hostname", key, values)
    }

    pub fn add_path_rule(&self, path: &str, values: Vec<u64>) -> Result<RuleId, StoreError> {
        let key = path.to_ascii_lowercase();
        self.insert_keyed_rule(&self.path_rules, "path", key, values)
    }

    pub fn add_query_rule(&self, value: &str, values: Vec<u64>) -> Result<RuleId, StoreError> {
        let key = value.to_ascii_lowercase();
        self.insert_keyed_rule(&self.query_rules, "query_string", key, values)
    }

    pub fn add_referer_rule(&self, domain: &str, values: Vec<u64>) -> Result<RuleId, StoreError> {
        let key = domain.to_ascii_lowercase();
        self.insert_keyed_rule(&self.referer_rules, "referer", key, values)
    }

    pub fn add_search_rule(
        &self,
        engine: &str,
        branded: bool,
        values: Vec<u64>,
    ) -> Result<RuleId, StoreError> {
        let key = (engine.to_ascii_lowercase(), branded);
        self.check_values(&values)?;
        match self.search_rules.entry(key) {
            Entry::Occupied(entry) => Err(StoreError::Duplicate {
                table: "branded_search",
                key: format!("{}/{}", entry.key().0, entry.key().1),
            }),
            Entry::Vacant(entry) => {
                let id = RuleId(self.allocate_id());
                entry.insert(id);
                self.bindings.insert(id, values);
                Ok(id)
            }
        }
    }

    fn insert_keyed_rule(
        &self,
        table: &DashMap<String, RuleId>,
        table_name: &'static str,
        key: String,
        values: Vec<u64>,
    ) -> Result<RuleId, StoreError> {
        self.check_values(&values)?;
        match table.entry(key) {
            Entry::Occupied(entry) => Err(StoreError::Duplicate {
                table: table_name,
                key: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                let id = RuleId(self.allocate_id());
                entry.insert(id);
                self.bindings.insert(id, values);
                Ok(id)
            }
        }
    }

    fn check_values(&self, values: &[u64]) -> Result<(), StoreError> {
        for id in values {
            if !self.values.contains_key(id) {
                return Err(StoreError::UnknownValue(*id));
            }
        }
        Ok(())
    }

    pub fn tags(&self) -> Vec<ReplacementTag> {
        self.all_tags()
    }

    pub fn values(&self) -> Vec<ReplacementValue> {
        let mut values: Vec<_> = self.values.iter().map(|v| v.value().clone()).collect();
        values.sort_by_key(|v| v.id);
        values
    }

    pub fn rules(&self) -> Vec<RuleSummary> {
        let mut rules = Vec::new();
        for entry in self.hostname_rules.iter() {
            rules.push(self.summary(RuleKind::Hostname, entry.key().clone(), *entry.value()));
        }
        for entry in self.path_rules.iter() {
            rules.push(self.summary(RuleKind::Path, entry.key().clone(), *entry.value()));
        }
        for entry in self.query_rules.iter() {
            rules.push(self.summary(RuleKind::QueryString, entry.key().clone(), *entry.value()));
        }
        for entry in self.referer_rules.iter() {
            rules.push(self.summary(RuleKind::Referer, entry.key().clone(), *entry.value()));
        }
        for entry in self.search_rules.iter() {
            let (engine, branded) = entry.key();
            let key = format!("{engine}/{branded}");
            rules.push(self.summary(RuleKind::BrandedSearch, key, *entry.value()));
        }
        rules.sort_by_key(|r| r.id.0);
        rules
    }

    fn summary(&self, kind: RuleKind, key: String, id: RuleId) -> RuleSummary {
        RuleSummary {
            id,
            kind,
            key,
            values: self
                .bindings
                .get(&id)
                .map(|v| v.value().clone())
                .unwrap_or_default(),
        }
    }

    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    pub fn rule_count(&self) -> usize {
        self.hostname_rules.len()
            + self.path_rules.len()
            + self.query_rules.len()
            + self.referer_rules.len()
            + self.search_rules.len()
    }
}

impl RuleStore for MemoryStore {
    fn find_hostname(&self, host: &str) -> Option<RuleId> {
        self.hostname_rules
            .get(&host.to_ascii_lowercase())
            .map(|r| *r.value())
    }

    fn find_path(&self, path: &str) -> Option<RuleId> {
        self.path_rules
            .get(&path.to_ascii_lowercase())
            .map(|r| *r.value())
    }

    fn find_query_value(&self, value: &str) -> Option<RuleId> {
        self.query_rules
            .get(&value.to_ascii_lowercase())
            .map(|r| *r.value())
    }

    fn find_referer(&self, host: &str, mode: RefererMatchMode) -> Option<RuleId> {
        let host = host.to_ascii_lowercase();
        match mode {
            RefererMatchMode::Exact => self.referer_rules.get(&host).map(|r| *r.value()),
            RefererMatchMode::Contains => {
                // Longest stored domain wins so the most specific rule is
                // deterministic regardless of map iteration order.
                self.referer_rules
                    .iter()
                    .filter(|entry| host.contains(entry.key().as_str()))
                    .max_by_key(|entry| entry.key().len())
                    .map(|entry| *entry.value())
            }
        }
    }

    fn find_search(&self, engine: &str, branded: bool) -> Option<RuleId> {
        self.search_rules
            .get(&(engine.to_ascii_lowercase(), branded))
            .map(|r| *r.value())
    }

    fn active_values_for_rule(&self, rule: RuleId) -> Vec<ReplacementValue> {
        let Some(ids) = self.bindings.get(&rule) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| self.values.get(id))
            .filter(|v| v.active)
            .map(|v| v.value().clone())
            .collect()
    }

    fn all_tags(&self) -> Vec<ReplacementTag> {
        let mut tags: Vec<_> = self.tags.iter().map(|t| t.value().clone()).collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        tags
    }
}
