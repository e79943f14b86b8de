//! Visitor session storage.
//!
//! The classifier only ever sees the narrow [`Session`] get/set interface,
//! so the core carries no dependency on any particular session-store
//! implementation.

use std::collections::HashMap;

use dashmap::DashMap;

use crate::store::RuleId;

/// Default session key the matched rule is persisted under.
pub const DEFAULT_SESSION_KEY: &str = "contextual_rule";

/// Narrow get/set interface over one visitor's session data.
pub trait Session {
    fn get(&self, key: &str) -> Option<RuleId>;
    fn set(&self, key: &str, value: RuleId);
}

/// In-memory session store shared across requests, keyed by visitor id.
///
/// Two concurrent requests from the same visitor resolve writes as
/// last-write-wins; no ordering is promised.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: DashMap<String, HashMap<String, RuleId>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A [`Session`] view scoped to one visitor.
    pub fn visitor(&self, visitor_id: &str) -> VisitorSession<'_> {
        VisitorSession {
            store: self,
            visitor: visitor_id.to_string(),
        }
    }

    /// Number of visitors with session data.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// One visitor's window into the shared session store.
pub struct VisitorSession<'a> {
    store: &'a MemorySessionStore,
    visitor: String,
}

impl Session for VisitorSession<'_> {
    fn get(&self, key: &str) -> Option<RuleId> {
        self.store
            .sessions
            .get(&self.visitor)
            .and_then(|data| data.get(key).copied())
    }

    fn set(&self, key: &str, value: RuleId) {
        self.store
            .sessions
            .entry(self.visitor.clone())
            .or_default()
            .insert(key.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sessions_are_scoped_per_visitor() {
        let store = MemorySessionStore::new();
        store.visitor("a").set(DEFAULT_SESSION_KEY, RuleId(1));

        assert_eq!(
            store.visitor("a").get(DEFAULT_SESSION_KEY),
            Some(RuleId(1))
        );
        assert_eq!(store.visitor("b").get(DEFAULT_SESSION_KEY), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_last_write_wins() {
        let store = MemorySessionStore::new();
        let session = store.visitor("a");
        session.set(DEFAULT_SESSION_KEY, RuleId(1));
        session.set(DEFAULT_SESSION_KEY, RuleId(2));
        assert_eq!(session.get(DEFAULT_SESSION_KEY), Some(RuleId(2)));
    }
}
