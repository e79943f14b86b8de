//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::rules::search::{default_engines, SearchEngine};
use crate::store::RefererMatchMode;

/// Root configuration for the contextual proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ContextualConfig {
    /// Listener configuration (bind address, request timeout).
    pub listener: ListenerConfig,

    /// Upstream the proxy forwards traffic to.
    pub upstream: UpstreamConfig,

    /// Ordered test definitions driving request classification.
    pub tests: Vec<TestEntry>,

    /// Replacement pipeline settings.
    pub replacement: ReplacementConfig,

    /// Search engines the branded-search test understands, in match order.
    pub search_engines: Vec<SearchEngine>,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Upstream server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream address (e.g., "127.0.0.1:3000").
    pub address: String,

    /// Largest HTML body the rewriter will buffer, in bytes.
    pub max_rewrite_bytes: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3000".to_string(),
            max_rewrite_bytes: 2 * 1024 * 1024,
        }
    }
}

/// One test definition: strategy, matching priority, optional config.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TestEntry {
    /// Strategy identifier, one of [`crate::rules::matcher::STRATEGIES`].
    pub strategy: String,

    /// Matching priority; lower runs first. Ties keep declaration order.
    pub priority: i32,

    #[serde(default)]
    pub config: TestOptions,
}

/// Strategy-specific configuration. Required keys are validated when the
/// test chain is built.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TestOptions {
    /// Query parameter the query-string test inspects.
    pub get_key: Option<String>,

    /// Patterns marking a search term as branded.
    pub brand_terms: Option<Vec<String>>,
}

/// Replacement pipeline settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReplacementConfig {
    /// Session key the matched rule is persisted under.
    pub session_key: String,

    /// Cookie carrying the visitor id.
    pub cookie_name: String,

    /// Tag registry staleness window in seconds.
    pub tag_ttl_secs: u64,

    /// Path prefixes skipped from classification and rewriting.
    pub excluded_prefixes: Vec<String>,

    /// Referer domain comparison mode.
    pub referer_match: RefererMatchMode,

    /// Check fragment-style queries before the standard query string when
    /// extracting search terms.
    pub fragment_search: bool,
}

impl Default for ReplacementConfig {
    fn default() -> Self {
        Self {
            session_key: "contextual_rule".to_string(),
            cookie_name: "ctx_visitor".to_string(),
            tag_ttl_secs: 300,
            excluded_prefixes: vec!["/static/".to_string(), "/admin".to_string()],
            referer_match: RefererMatchMode::Exact,
            fragment_search: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API under /admin.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}

/// Default test chain: query-string lookup on `s` first, hostname second.
pub fn default_tests() -> Vec<TestEntry> {
    vec![
        TestEntry {
            strategy: "query_string".to_string(),
            priority: 1,
            config: TestOptions {
                get_key: Some("s".to_string()),
                brand_terms: None,
            },
        },
        TestEntry {
            strategy: "hostname".to_string(),
            priority: 2,
            config: TestOptions::default(),
        },
    ]
}

impl ContextualConfig {
    /// Configuration with the stock test chain and engine table filled in.
    ///
    /// `Default::default()` leaves the lists empty so a deserialized config
    /// is exactly what the file declares; this is the variant binaries use
    /// when no file is given.
    pub fn stock() -> Self {
        Self {
            tests: default_tests(),
            search_engines: default_engines(),
            ..Self::default()
        }
    }

    /// Effective search engine table: configured entries, or the stock set.
    pub fn engines(&self) -> Vec<SearchEngine> {
        if self.search_engines.is_empty() {
            default_engines()
        } else {
            self.search_engines.clone()
        }
    }
}
