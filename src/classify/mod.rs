//! Request classification.
//!
//! # Data Flow
//! ```text
//! Incoming request
//!     → excluded prefix check (static assets, admin surface)
//!     → session cache (rule match persisted for this visitor)
//!     → rules::TestChain (priority walk, first match wins)
//!     → MatchOutcome annotation, consumed by the response rewriter
//! ```
//!
//! # Design Decisions
//! - The only side effect is the session write on a fresh match
//! - A cached match never re-runs the chain or touches the rule store

pub mod session;

use tracing::debug;

pub use session::{MemorySessionStore, Session, VisitorSession, DEFAULT_SESSION_KEY};

use crate::rules::{RequestContext, TestChain};
use crate::store::{RuleId, RuleStore};

/// Terminal classification state for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    /// Path falls under an excluded prefix; skip all further processing.
    Excluded,
    /// Rule adopted from the visitor's session without re-running the chain.
    CachedMatch(RuleId),
    /// Rule found by the test chain on this request.
    FreshMatch(RuleId),
    /// No strategy matched; defaults apply.
    NoMatch,
}

impl MatchOutcome {
    /// The bound rule, if any.
    pub fn rule(&self) -> Option<RuleId> {
        match self {
            MatchOutcome::CachedMatch(rule) | MatchOutcome::FreshMatch(rule) => Some(*rule),
            MatchOutcome::Excluded | MatchOutcome::NoMatch => None,
        }
    }

    pub fn is_excluded(&self) -> bool {
        matches!(self, MatchOutcome::Excluded)
    }

    /// Stable label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            MatchOutcome::Excluded => "excluded",
            MatchOutcome::CachedMatch(_) => "cached",
            MatchOutcome::FreshMatch(_) => "fresh",
            MatchOutcome::NoMatch => "no_match",
        }
    }
}

/// Orchestrates exclusion rules, the session cache, and the test chain.
pub struct RequestClassifier {
    chain: TestChain,
    excluded_prefixes: Vec<String>,
    session_key: String,
}

impl RequestClassifier {
    pub fn new(chain: TestChain, excluded_prefixes: Vec<String>, session_key: String) -> Self {
        Self {
            chain,
            excluded_prefixes,
            session_key,
        }
    }

    /// Classify one request and record a fresh match into the session.
    pub fn classify(
        &self,
        req: &RequestContext<'_>,
        session: &dyn Session,
        store: &dyn RuleStore,
    ) -> MatchOutcome {
        if self
            .excluded_prefixes
            .iter()
            .any(|prefix| req.path.starts_with(prefix.as_str()))
        {
            return MatchOutcome::Excluded;
        }

        if let Some(rule) = session.get(&self.session_key) {
            debug!(rule = %rule, "adopted rule match from session");
            return MatchOutcome::CachedMatch(rule);
        }

        match self.chain.find_first_match(req, store) {
            Some((rule, index)) => {
                session.set(&self.session_key, rule);
                debug!(
                    rule = %rule,
                    strategy = self.chain.strategy_at(index).unwrap_or("unknown"),
                    "classified request"
                );
                MatchOutcome::FreshMatch(rule)
            }
            None => MatchOutcome::NoMatch,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::schema::{TestEntry, TestOptions};
    use crate::rules::matcher::MatcherSettings;
    use crate::rules::search::default_engines;
    use crate::store::{MemoryStore, RefererMatchMode};

    fn classifier() -> RequestClassifier {
        let tests = vec![TestEntry {
            strategy: "hostname".to_string(),
            priority: 1,
            config: TestOptions::default(),
        }];
        let settings = MatcherSettings {
            referer_match: RefererMatchMode::Exact,
            engines: Arc::new(default_engines()),
            fragment_search: true,
        };
        let chain = TestChain::from_config(&tests, &settings).unwrap();
        RequestClassifier::new(
            chain,
            vec!["/static/".to_string(), "/admin".to_string()],
            DEFAULT_SESSION_KEY.to_string(),
        )
    }

    fn request(path: &str) -> RequestContext<'_> {
        RequestContext {
            host: "www.example.com",
            path,
            query: "",
            referer: None,
        }
    }

    #[test]
    fn test_excluded_prefixes_short_circuit() {
        let store = MemoryStore::new();
        store.add_hostname_rule("www.example.com", vec![]).unwrap();
        let sessions = MemorySessionStore::new();
        let classifier = classifier();

        let outcome = classifier.classify(
            &request("/static/logo.png"),
            &sessions.visitor("v1"),
            &store,
        );
        assert_eq!(outcome, MatchOutcome::Excluded);

        let outcome =
            classifier.classify(&request("/admin/status"), &sessions.visitor("v1"), &store);
        assert_eq!(outcome, MatchOutcome::Excluded);

        // Exclusion happens before the chain, so nothing reaches the session.
        assert!(sessions.is_empty());
    }

    #[test]
    fn test_fresh_match_persists_to_session() {
        let store = MemoryStore::new();
        let rule = store.add_hostname_rule("www.example.com", vec![]).unwrap();
        let sessions = MemorySessionStore::new();
        let classifier = classifier();

        let outcome = classifier.classify(&request("/"), &sessions.visitor("v1"), &store);
        assert_eq!(outcome, MatchOutcome::FreshMatch(rule));
        assert_eq!(
            sessions.visitor("v1").get(DEFAULT_SESSION_KEY),
            Some(rule)
        );
    }

    #[test]
    fn test_cached_match_skips_the_chain() {
        let store = MemoryStore::new();
        let rule = store.add_hostname_rule("www.example.com", vec![]).unwrap();
        let sessions = MemorySessionStore::new();
        sessions.visitor("v1").set(DEFAULT_SESSION_KEY, rule);
        let classifier = classifier();

        // Host that would not match: the cached rule is adopted anyway.
        let req = RequestContext {
            host: "www.other.com",
            path: "/",
            query: "",
            referer: None,
        };
        let outcome = classifier.classify(&req, &sessions.visitor("v1"), &store);
        assert_eq!(outcome, MatchOutcome::CachedMatch(rule));
    }

    #[test]
    fn test_no_match_writes_nothing() {
        let store = MemoryStore::new();
        let sessions = MemorySessionStore::new();
        let classifier = classifier();

        let outcome = classifier.classify(&request("/"), &sessions.visitor("v1"), &store);
        assert_eq!(outcome, MatchOutcome::NoMatch);
        assert!(sessions.is_empty());
    }
}
