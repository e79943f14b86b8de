//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check strategy names against the known set
//! - Validate value ranges (TTL > 0, prefixes rooted)
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function over the config
//! - Required per-strategy config keys are the test chain's concern and are
//!   checked again, authoritatively, at chain construction

use thiserror::Error;

use crate::config::schema::ContextualConfig;
use crate::rules::matcher::STRATEGIES;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("unknown test strategy \"{0}\"")]
    UnknownStrategy(String),

    #[error("no tests configured; every request would classify as no-match")]
    NoTests,

    #[error("replacement.tag_ttl_secs must be greater than zero")]
    ZeroTagTtl,

    #[error("upstream address \"{0}\" is not host:port")]
    BadUpstreamAddress(String),

    #[error("excluded prefix \"{0}\" must start with '/'")]
    UnrootedExcludedPrefix(String),

    #[error("search engine entry has an empty domain or param")]
    EmptySearchEngine,
}

/// Validate semantic constraints across the whole config.
pub fn validate_config(config: &ContextualConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.tests.is_empty() {
        errors.push(ValidationError::NoTests);
    }
    for test in &config.tests {
        if !STRATEGIES.contains(&test.strategy.as_str()) {
            errors.push(ValidationError::UnknownStrategy(test.strategy.clone()));
        }
    }

    if config.replacement.tag_ttl_secs == 0 {
        errors.push(ValidationError::ZeroTagTtl);
    }

    for prefix in &config.replacement.excluded_prefixes {
        if !prefix.starts_with('/') {
            errors.push(ValidationError::UnrootedExcludedPrefix(prefix.clone()));
        }
    }

    let upstream = &config.upstream.address;
    if upstream.is_empty() || !upstream.contains(':') {
        errors.push(ValidationError::BadUpstreamAddress(upstream.clone()));
    }

    for engine in &config.search_engines {
        if engine.domain.is_empty() || engine.param.is_empty() {
            errors.push(ValidationError::EmptySearchEngine);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
