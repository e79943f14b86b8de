//! Rule storage subsystem.
//!
//! # Data Flow
//! ```text
//! Admin API (CRUD)
//!     → memory.rs (tags, values, rule tables)
//!     → RuleStore trait (exact / pair / contains lookups)
//!     → consumed by rules::matcher and rewrite::registry
//! ```
//!
//! # Design Decisions
//! - Match-key fields are unique per rule table; inserts reject duplicates
//! - Inactive replacement values are filtered at the query layer, not deleted
//! - A single id allocator keeps RuleId unique across all rule tables

pub mod memory;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::MemoryStore;

/// Identifies a stored rule. Unique across all rule tables so it can be
/// carried in a visitor session without remembering which table it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleId(pub u64);

impl std::fmt::Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named placeholder family with a process-wide default value.
///
/// The tag name generates the literal placeholder `[name]` in response
/// bodies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplacementTag {
    pub name: String,
    pub default_value: String,
}

/// A specific override value for a tag, owned by one or more rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplacementValue {
    pub id: u64,
    /// Name of the owning [`ReplacementTag`].
    pub tag: String,
    /// Admin display purposes only.
    pub name: String,
    pub data: String,
    pub active: bool,
}

/// Comparison mode for referer domain lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefererMatchMode {
    /// Rule domain must equal the referrer hostname.
    #[default]
    Exact,
    /// Rule domain must appear as a substring of the referrer hostname.
    Contains,
}

/// Which rule table a rule lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Hostname,
    Path,
    QueryString,
    Referer,
    BrandedSearch,
}

/// Query contract the matching core consumes.
///
/// Every lookup miss is a normal negative result. Comparisons are
/// case-insensitive exact matches unless noted otherwise.
pub trait RuleStore: Send + Sync {
    fn find_hostname(&self, host: &str) -> Option<RuleId>;
    fn find_path(&self, path: &str) -> Option<RuleId>;
    fn find_query_value(&self, value: &str) -> Option<RuleId>;
    fn find_referer(&self, host: &str, mode: RefererMatchMode) -> Option<RuleId>;
    fn find_search(&self, engine: &str, branded: bool) -> Option<RuleId>;

    /// Replacement values bound to a rule, restricted to active ones.
    fn active_values_for_rule(&self, rule: RuleId) -> Vec<ReplacementValue>;

    /// The full universe of known tags.
    fn all_tags(&self) -> Vec<ReplacementTag>;
}

/// Errors from store mutations. Lookups never error.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate {table} key \"{key}\"")]
    Duplicate { table: &'static str, key: String },

    #[error("unknown tag \"{0}\"")]
    UnknownTag(String),

    #[error("unknown replacement value id {0}")]
    UnknownValue(u64),
}
