//! Matching strategies.
//!
//! # Responsibilities
//! - Evaluate one request against one rule table
//! - Validate per-strategy configuration eagerly at construction
//! - Compile brand-term patterns once, not per request
//!
//! # Design Decisions
//! - Host and path matching are case-insensitive exact (no prefixes)
//! - A lookup miss is a normal no-match, never an error

use std::sync::Arc;

use regex::{Regex, RegexBuilder};
use thiserror::Error;
use url::Url;

use crate::config::schema::TestEntry;
use crate::rules::search::{self, SearchEngine};
use crate::rules::RequestContext;
use crate::store::{RefererMatchMode, RuleId, RuleStore};

/// Strategy identifiers accepted in `[[tests]]` configuration entries.
pub const STRATEGIES: [&str; 5] = [
    "hostname",
    "path",
    "query_string",
    "referer",
    "branded_search_referer",
];

/// Raised once, at test chain construction. Fatal to startup.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("unknown test strategy \"{0}\"")]
    UnknownStrategy(String),

    #[error("{strategy} requires the key \"{key}\" in its test config: {reason}")]
    MissingKey {
        strategy: &'static str,
        key: &'static str,
        reason: &'static str,
    },

    #[error("invalid brand term pattern \"{pattern}\": {source}")]
    InvalidBrandTerm {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Deployment-wide settings shared by matcher construction.
#[derive(Debug, Clone)]
pub struct MatcherSettings {
    pub referer_match: RefererMatchMode,
    pub engines: Arc<Vec<SearchEngine>>,
    pub fragment_search: bool,
}

/// One matching strategy with its validated configuration payload.
#[derive(Debug)]
pub enum Matcher {
    Hostname,
    Path,
    QueryString {
        get_key: String,
    },
    Referer {
        mode: RefererMatchMode,
    },
    BrandedSearchReferer {
        engines: Arc<Vec<SearchEngine>>,
        brand_terms: Vec<Regex>,
        fragment_search: bool,
    },
}

impl Matcher {
    /// Build a matcher from one configuration entry, validating required
    /// config keys up front.
    pub fn from_entry(
        entry: &TestEntry,
        settings: &MatcherSettings,
    ) -> Result<Self, ConfigurationError> {
        match entry.strategy.as_str() {
            "hostname" => Ok(Matcher::Hostname),
            "path" => Ok(Matcher::Path),
            "query_string" => {
                let get_key = entry.config.get_key.clone().ok_or(
                    ConfigurationError::MissingKey {
                        strategy: "query_string",
                        key: "get_key",
                        reason: "used to select the query parameter to do the lookup on",
                    },
                )?;
                Ok(Matcher::QueryString { get_key })
            }
            "referer" => Ok(Matcher::Referer {
                mode: settings.referer_match,
            }),
            "branded_search_referer" => {
                let terms = entry.config.brand_terms.as_ref().ok_or(
                    ConfigurationError::MissingKey {
                        strategy: "branded_search_referer",
                        key: "brand_terms",
                        reason: "patterns that mark a search term as branded",
                    },
                )?;
                let brand_terms = terms
                    .iter()
                    .map(|term| {
                        RegexBuilder::new(term)
                            .case_insensitive(true)
                            .unicode(true)
                            .build()
                            .map_err(|source| ConfigurationError::InvalidBrandTerm {
                                pattern: term.clone(),
                                source,
                            })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Matcher::BrandedSearchReferer {
                    engines: settings.engines.clone(),
                    brand_terms,
                    fragment_search: settings.fragment_search,
                })
            }
            other => Err(ConfigurationError::UnknownStrategy(other.to_string())),
        }
    }

    /// Evaluate the request against this strategy's rule table.
    pub fn evaluate(&self, req: &RequestContext<'_>, store: &dyn RuleStore) -> Option<RuleId> {
        match self {
            Matcher::Hostname => store.find_hostname(req.host),
            Matcher::Path => store.find_path(req.path),
            Matcher::QueryString { get_key } => {
                let value = req.query_param(get_key)?;
                if value.is_empty() {
                    return None;
                }
                store.find_query_value(&value)
            }
            Matcher::Referer { mode } => {
                let host = referer_host(req.referer?)?;
                store.find_referer(&host, *mode)
            }
            Matcher::BrandedSearchReferer {
                engines,
                brand_terms,
                fragment_search,
            } => {
                let (engine, branded) = search::classify_referer(
                    req.referer?,
                    engines,
                    brand_terms,
                    *fragment_search,
                )?;
                store.find_search(engine, branded)
            }
        }
    }

    /// Stable name for logging and metrics labels.
    pub fn strategy(&self) -> &'static str {
        match self {
            Matcher::Hostname => "hostname",
            Matcher::Path => "path",
            Matcher::QueryString { .. } => "query_string",
            Matcher::Referer { .. } => "referer",
            Matcher::BrandedSearchReferer { .. } => "branded_search_referer",
        }
    }
}

fn referer_host(referer: &str) -> Option<String> {
    let url = Url::parse(referer).ok()?;
    url.host_str().map(|h| h.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::TestOptions;
    use crate::rules::search::default_engines;
    use crate::store::MemoryStore;

    fn settings() -> MatcherSettings {
        MatcherSettings {
            referer_match: RefererMatchMode::Exact,
            engines: Arc::new(default_engines()),
            fragment_search: true,
        }
    }

    fn entry(strategy: &str, config: TestOptions) -> TestEntry {
        TestEntry {
            strategy: strategy.to_string(),
            priority: 1,
            config,
        }
    }

    fn request<'a>(host: &'a str, path: &'a str, query: &'a str) -> RequestContext<'a> {
        RequestContext {
            host,
            path,
            query,
            referer: None,
        }
    }

    #[test]
    fn test_hostname_exact_case_insensitive() {
        let store = MemoryStore::new();
        let rule = store.add_hostname_rule("WWW.Example.com", vec![]).unwrap();
        let matcher = Matcher::from_entry(&entry("hostname", TestOptions::default()), &settings())
            .unwrap();

        assert_eq!(
            matcher.evaluate(&request("www.example.com", "/", ""), &store),
            Some(rule)
        );
        assert_eq!(
            matcher.evaluate(&request("www.cantfindme.com", "/", ""), &store),
            None
        );
    }

    #[test]
    fn test_hostname_with_port() {
        let store = MemoryStore::new();
        let rule = store.add_hostname_rule("127.0.0.1:8000", vec![]).unwrap();
        let matcher = Matcher::from_entry(&entry("hostname", TestOptions::default()), &settings())
            .unwrap();

        assert_eq!(
            matcher.evaluate(&request("127.0.0.1:8000", "/", ""), &store),
            Some(rule)
        );
    }

    #[test]
    fn test_path_exact_does_not_match_children() {
        let store = MemoryStore::new();
        let root = store.add_path_rule("/", vec![]).unwrap();
        let parent = store.add_path_rule("/parent/", vec![]).unwrap();
        store.add_path_rule("/parent/child/", vec![]).unwrap();
        let matcher =
            Matcher::from_entry(&entry("path", TestOptions::default()), &settings()).unwrap();

        assert_eq!(
            matcher.evaluate(&request("www.example.com", "/", ""), &store),
            Some(root)
        );
        assert_eq!(
            matcher.evaluate(&request("www.example.com", "/parent/", ""), &store),
            Some(parent)
        );
        assert_eq!(
            matcher.evaluate(&request("www.example.com", "/parent/child", ""), &store),
            None
        );
    }

    #[test]
    fn test_query_string_lookup() {
        let store = MemoryStore::new();
        let rule = store.add_query_rule("google-phone", vec![]).unwrap();
        let options = TestOptions {
            get_key: Some("s".to_string()),
            ..TestOptions::default()
        };
        let matcher = Matcher::from_entry(&entry("query_string", options), &settings()).unwrap();

        assert_eq!(
            matcher.evaluate(
                &request("www.example.com", "/", "s=google-phone&something=234"),
                &store
            ),
            Some(rule)
        );
        assert_eq!(
            matcher.evaluate(&request("www.example.com", "/", "s=google-phone2"), &store),
            None
        );
        // Right value under the wrong key is a miss.
        assert_eq!(
            matcher.evaluate(
                &request("www.example.com", "/", "correct=google-phone"),
                &store
            ),
            None
        );
        assert_eq!(
            matcher.evaluate(&request("www.example.com", "/", ""), &store),
            None
        );
    }

    #[test]
    fn test_query_string_requires_get_key() {
        let err = Matcher::from_entry(&entry("query_string", TestOptions::default()), &settings())
            .unwrap_err();
        match err {
            ConfigurationError::MissingKey { strategy, key, .. } => {
                assert_eq!(strategy, "query_string");
                assert_eq!(key, "get_key");
            }
            other => panic!("expected MissingKey, got {other:?}"),
        }
    }

    #[test]
    fn test_referer_exact_and_contains_modes() {
        let store = MemoryStore::new();
        let www = store.add_referer_rule("www.google.com", vec![]).unwrap();
        let bare = store.add_referer_rule("google.com", vec![]).unwrap();

        let exact =
            Matcher::from_entry(&entry("referer", TestOptions::default()), &settings()).unwrap();
        let req = RequestContext {
            host: "www.example.com",
            path: "/",
            query: "",
            referer: Some("http://www.google.com/search?q=test"),
        };
        assert_eq!(exact.evaluate(&req, &store), Some(www));

        let req_bare = RequestContext {
            referer: Some("http://google.com/search?q=test"),
            ..req
        };
        assert_eq!(exact.evaluate(&req_bare, &store), Some(bare));

        let req_fr = RequestContext {
            referer: Some("http://www.google.fr/search?q=test"),
            ..req
        };
        assert_eq!(exact.evaluate(&req_fr, &store), None);

        let contains_settings = MatcherSettings {
            referer_match: RefererMatchMode::Contains,
            ..settings()
        };
        let contains =
            Matcher::from_entry(&entry("referer", TestOptions::default()), &contains_settings)
                .unwrap();
        let req_images = RequestContext {
            referer: Some("http://images.google.com/imghp"),
            ..req
        };
        assert_eq!(contains.evaluate(&req_images, &store), Some(bare));
    }

    #[test]
    fn test_referer_missing_or_unparsable_is_no_match() {
        let store = MemoryStore::new();
        store.add_referer_rule("www.google.com", vec![]).unwrap();
        let matcher =
            Matcher::from_entry(&entry("referer", TestOptions::default()), &settings()).unwrap();

        let no_referer = request("www.example.com", "/", "");
        assert_eq!(matcher.evaluate(&no_referer, &store), None);

        let partial = RequestContext {
            host: "www.example.com",
            path: "/",
            query: "",
            referer: Some("http://"),
        };
        assert_eq!(matcher.evaluate(&partial, &store), None);
    }

    #[test]
    fn test_branded_search_lookup() {
        let store = MemoryStore::new();
        let branded = store.add_search_rule("ask", true, vec![]).unwrap();
        let unbranded = store.add_search_rule("ask", false, vec![]).unwrap();

        let options = TestOptions {
            brand_terms: Some(vec!["branded".to_string()]),
            ..TestOptions::default()
        };
        let matcher =
            Matcher::from_entry(&entry("branded_search_referer", options), &settings()).unwrap();

        let req = RequestContext {
            host: "www.example.com",
            path: "/",
            query: "",
            referer: Some("http://uk.ask.com/web?q=branded+test"),
        };
        assert_eq!(matcher.evaluate(&req, &store), Some(branded));

        let req_random = RequestContext {
            referer: Some("http://uk.ask.com/web?q=random+test"),
            ..req
        };
        assert_eq!(matcher.evaluate(&req_random, &store), Some(unbranded));

        // Recognized engine without a stored rule for the pair is a miss.
        let req_google = RequestContext {
            referer: Some("http://www.google.com/search?q=branded"),
            ..req
        };
        assert_eq!(matcher.evaluate(&req_google, &store), None);
    }

    #[test]
    fn test_branded_search_requires_brand_terms() {
        let err = Matcher::from_entry(
            &entry("branded_search_referer", TestOptions::default()),
            &settings(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::MissingKey {
                strategy: "branded_search_referer",
                key: "brand_terms",
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_brand_term_pattern_is_rejected() {
        let options = TestOptions {
            brand_terms: Some(vec!["br(and".to_string()]),
            ..TestOptions::default()
        };
        let err = Matcher::from_entry(&entry("branded_search_referer", options), &settings())
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidBrandTerm { .. }));
    }

    #[test]
    fn test_unknown_strategy_is_rejected() {
        let err = Matcher::from_entry(&entry("cookie", TestOptions::default()), &settings())
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::UnknownStrategy(_)));
    }
}
