//! Rule matching subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (host, path, query, referer)
//!     → chain.rs (priority-ordered walk, first match wins)
//!     → matcher.rs (per-strategy lookup against the rule store)
//!     → search.rs (referrer → search engine + branded term classification)
//!     → Return: matched RuleId or no match
//!
//! Chain compilation (at startup):
//!     TestEntry[]
//!     → stable sort by priority
//!     → validate per-strategy config, compile brand-term patterns
//!     → freeze as immutable TestChain
//! ```
//!
//! # Design Decisions
//! - Matchers are a closed enum, not trait objects
//! - Chain compiled at startup, immutable at runtime
//! - Lookup misses and unparsable referrers are normal no-match outcomes;
//!   only missing required config at construction is an error

pub mod chain;
pub mod matcher;
pub mod search;

pub use chain::TestChain;
pub use matcher::{ConfigurationError, Matcher};
pub use search::SearchEngine;

/// Borrowed view of the request fields the matchers inspect.
///
/// Built once per request from the incoming parts; the core never touches
/// the framework request type directly.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    /// Effective host, as sent by the client (may include a port).
    pub host: &'a str,
    pub path: &'a str,
    /// Raw query string, without the leading `?`.
    pub query: &'a str,
    pub referer: Option<&'a str>,
}

impl<'a> RequestContext<'a> {
    /// Decoded value of the first query parameter named `key`.
    pub fn query_param(&self, key: &str) -> Option<String> {
        url::form_urlencoded::parse(self.query.as_bytes())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_param_decoding() {
        let ctx = RequestContext {
            host: "www.example.com",
            path: "/",
            query: "s=google-phone&other=1",
            referer: None,
        };
        assert_eq!(ctx.query_param("s").as_deref(), Some("google-phone"));
        assert_eq!(ctx.query_param("other").as_deref(), Some("1"));
        assert_eq!(ctx.query_param("missing"), None);
    }

    #[test]
    fn test_query_param_plus_decodes_to_space() {
        let ctx = RequestContext {
            host: "www.example.com",
            path: "/",
            query: "s=space+test",
            referer: None,
        };
        assert_eq!(ctx.query_param("s").as_deref(), Some("space test"));
    }
}
