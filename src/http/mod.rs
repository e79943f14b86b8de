//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, proxy handler)
//!     → classify (exclusions, session cache, test chain)
//!     → upstream forward (hyper-util legacy client)
//!     → rewrite (HTML bodies only)
//!     → Send to client
//! ```

pub mod server;

pub use server::{AppState, HttpServer};
