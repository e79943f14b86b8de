//! Response rewriting subsystem.
//!
//! # Data Flow
//! ```text
//! Classified request + upstream HTML response
//!     → registry.rs (TTL snapshot of known tags, patterns precompiled)
//!     → store.active_values_for_rule (covered tag set, when a rule is bound)
//!     → rewriter.rs (covered tags get values, uncovered tags get defaults)
//!     → rewritten body back to the client
//! ```
//!
//! # Design Decisions
//! - Placeholder patterns compiled once per registry refresh, not per request
//! - Every known tag is replaced exactly once; never twice, never skipped
//! - Best-effort: rewriting never fails the response

pub mod registry;
pub mod rewriter;

pub use registry::{TagRegistry, TagSnapshot, DEFAULT_TAG_TTL};
pub use rewriter::{is_html, rewrite_body};
