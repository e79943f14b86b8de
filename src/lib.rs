//! Contextual replacement proxy library.
//!
//! Classifies each request against an ordered chain of matching tests and
//! rewrites bracket-delimited placeholder tags in HTML responses with the
//! replacement values bound to the matched rule, falling back to per-tag
//! defaults.

pub mod admin;
pub mod classify;
pub mod config;
pub mod http;
pub mod observability;
pub mod rewrite;
pub mod rules;
pub mod store;

pub use config::ContextualConfig;
pub use http::HttpServer;
