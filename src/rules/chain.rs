//! The priority-ordered test chain.

use tracing::debug;

use crate::config::schema::TestEntry;
use crate::rules::matcher::{ConfigurationError, Matcher, MatcherSettings};
use crate::rules::RequestContext;
use crate::store::{RuleId, RuleStore};

/// Ordered, short-circuiting sequence of matchers.
///
/// Built once at startup and held as an owned, immutable field of the
/// request-handling state. Entries are sorted by ascending priority; the
/// stable sort preserves declaration order on ties.
#[derive(Debug)]
pub struct TestChain {
    matchers: Vec<Matcher>,
}

impl TestChain {
    /// Instantiate every configured test and freeze the evaluation order.
    ///
    /// Fails when a test names an unknown strategy or omits a required
    /// config key; the process must not serve traffic with an invalid
    /// chain.
    pub fn from_config(
        tests: &[TestEntry],
        settings: &MatcherSettings,
    ) -> Result<Self, ConfigurationError> {
        let mut entries: Vec<&TestEntry> = tests.iter().collect();
        entries.sort_by_key(|entry| entry.priority);

        let mut matchers = Vec::with_capacity(entries.len());
        for entry in entries {
            let matcher = Matcher::from_entry(entry, settings)?;
            debug!(
                strategy = matcher.strategy(),
                priority = entry.priority,
                "test chain entry compiled"
            );
            matchers.push(matcher);
        }
        Ok(Self { matchers })
    }

    /// Walk the chain in priority order and stop at the first match.
    ///
    /// Returns the matched rule and the index of the strategy that found it.
    pub fn find_first_match(
        &self,
        req: &RequestContext<'_>,
        store: &dyn RuleStore,
    ) -> Option<(RuleId, usize)> {
        for (index, matcher) in self.matchers.iter().enumerate() {
            if let Some(rule) = matcher.evaluate(req, store) {
                debug!(
                    strategy = matcher.strategy(),
                    index,
                    rule = %rule,
                    "test chain matched"
                );
                return Some((rule, index));
            }
        }
        None
    }

    /// Strategy name at a chain position, for logging and metrics.
    pub fn strategy_at(&self, index: usize) -> Option<&'static str> {
        self.matchers.get(index).map(Matcher::strategy)
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}
