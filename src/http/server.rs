//! HTTP server setup and request handling.
//!
//! # Responsibilities
//! - Create Axum Router with the proxy handler and optional admin API
//! - Wire up middleware (tracing, timeout, request ID)
//! - Classify each request before forwarding it upstream
//! - Rewrite HTML response bodies on the way back
//! - Observability (metrics, request IDs)

use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::uri::{Authority, PathAndQuery, Scheme},
    http::{header, HeaderMap, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::admin;
use crate::classify::{MatchOutcome, MemorySessionStore, RequestClassifier};
use crate::config::ContextualConfig;
use crate::observability::metrics;
use crate::rewrite::{self, TagRegistry};
use crate::rules::matcher::{ConfigurationError, MatcherSettings};
use crate::rules::{RequestContext, TestChain};
use crate::store::{MemoryStore, RuleStore};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<MemoryStore>,
    pub classifier: Arc<RequestClassifier>,
    pub sessions: Arc<MemorySessionStore>,
    pub registry: Arc<TagRegistry>,
    pub client: Client<HttpConnector, Body>,
    pub config: Arc<ContextualConfig>,
}

/// HTTP server for the contextual proxy.
pub struct HttpServer {
    router: Router,
    config: Arc<ContextualConfig>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration and rule store.
    ///
    /// Fails when the configured test chain is invalid; the process must not
    /// serve traffic in that state.
    pub fn new(
        config: ContextualConfig,
        store: Arc<MemoryStore>,
    ) -> Result<Self, ConfigurationError> {
        let settings = MatcherSettings {
            referer_match: config.replacement.referer_match,
            engines: Arc::new(config.engines()),
            fragment_search: config.replacement.fragment_search,
        };
        let chain = TestChain::from_config(&config.tests, &settings)?;
        tracing::info!(tests = chain.len(), "Test chain compiled");

        let classifier = Arc::new(RequestClassifier::new(
            chain,
            config.replacement.excluded_prefixes.clone(),
            config.replacement.session_key.clone(),
        ));
        let registry = Arc::new(TagRegistry::new(Duration::from_secs(
            config.replacement.tag_ttl_secs,
        )));
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        let config = Arc::new(config);
        let state = AppState {
            store,
            classifier,
            sessions: Arc::new(MemorySessionStore::new()),
            registry,
            client,
            config: config.clone(),
        };

        let router = Self::build_router(&config, state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ContextualConfig, state: AppState) -> Router {
        let mut router = Router::new();
        if config.admin.enabled {
            router = router.merge(admin::admin_router(state.clone()));
        }
        router
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.listener.request_timeout_secs,
            )))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.address,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &ContextualConfig {
        &self.config
    }
}

/// Main proxy handler: classify, forward upstream, rewrite HTML on the way
/// back.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let method = request.method().to_string();

    // Visitor identity from the session cookie; assign one when absent.
    let cookie_name = &state.config.replacement.cookie_name;
    let (visitor, assigned) = match cookie_value(request.headers(), cookie_name) {
        Some(id) => (id, false),
        None => (Uuid::new_v4().to_string(), true),
    };

    let (mut parts, body) = request.into_parts();

    // Classification phase.
    let ctx = RequestContext {
        host: parts
            .headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .unwrap_or(""),
        path: parts.uri.path(),
        query: parts.uri.query().unwrap_or(""),
        referer: parts
            .headers
            .get(header::REFERER)
            .and_then(|h| h.to_str().ok()),
    };
    let session = state.sessions.visitor(&visitor);
    let outcome = state
        .classifier
        .classify(&ctx, &session, state.store.as_ref());
    metrics::record_classification(outcome.label());

    tracing::debug!(
        method = %method,
        path = %parts.uri.path(),
        outcome = outcome.label(),
        "Proxying request"
    );

    // Forward upstream, preserving the original host header.
    let authority = match Authority::from_str(&state.config.upstream.address) {
        Ok(authority) => authority,
        Err(e) => {
            tracing::error!(error = %e, "Invalid upstream address");
            metrics::record_request(&method, 500, start_time);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Invalid upstream").into_response();
        }
    };
    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = Some(authority);
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    parts.uri = Uri::from_parts(uri_parts).unwrap_or_else(|_| parts.uri.clone());

    let upstream_response = match state.client.request(Request::from_parts(parts, body)).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "Upstream error");
            metrics::record_request(&method, 502, start_time);
            return (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response();
        }
    };

    // Rewrite phase: HTML only, and never for excluded requests.
    let (mut res_parts, res_body) = upstream_response.into_parts();
    let content_type = res_parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    // Compressed bodies cannot be text-substituted; pass them through.
    let encoded = res_parts.headers.contains_key(header::CONTENT_ENCODING);
    // Bodies declared larger than the rewrite limit also stream through
    // untouched; unrewritten placeholders beat a failed response.
    let limit = state.config.upstream.max_rewrite_bytes;
    let oversized = res_parts
        .headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
        .is_some_and(|len| len > limit);

    let mut response = if !outcome.is_excluded()
        && rewrite::is_html(&content_type)
        && !encoded
        && !oversized
    {
        match axum::body::to_bytes(Body::new(res_body), limit).await {
            Ok(bytes) => match String::from_utf8(bytes.to_vec()) {
                Ok(text) => {
                    let rewritten = rewrite_response(&state, outcome, &text);
                    res_parts.headers.remove(header::CONTENT_LENGTH);
                    Response::from_parts(res_parts, Body::from(rewritten))
                }
                Err(e) => {
                    // Claims HTML but is not UTF-8: pass through untouched.
                    tracing::warn!(content_type = %content_type, "Skipping rewrite of non-UTF-8 body");
                    Response::from_parts(res_parts, Body::from(e.into_bytes()))
                }
            },
            Err(e) => {
                tracing::error!(error = %e, "Failed to buffer upstream body");
                metrics::record_request(&method, 502, start_time);
                return (StatusCode::BAD_GATEWAY, "Upstream body unavailable").into_response();
            }
        }
    } else {
        Response::from_parts(res_parts, Body::new(res_body))
    };

    if assigned {
        let cookie = format!("{cookie_name}={visitor}; Path=/; HttpOnly");
        if let Ok(value) = header::HeaderValue::from_str(&cookie) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }

    metrics::record_request(&method, response.status().as_u16(), start_time);
    response
}

/// Resolve the matched rule's values and substitute every known tag.
fn rewrite_response(state: &AppState, outcome: MatchOutcome, body: &str) -> String {
    let snapshot = state.registry.get(state.store.as_ref());
    let values = outcome
        .rule()
        .map(|rule| state.store.active_values_for_rule(rule))
        .unwrap_or_default();
    let rewritten = rewrite::rewrite_body(body, &snapshot, &values);
    metrics::record_rewrite(snapshot.entries.len());
    rewritten
}

/// Value of the named cookie, if present.
fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(header::COOKIE)
        .and_then(|h| h.to_str().ok())?
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with_cookie(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, value.parse().unwrap());
        headers
    }

    #[test]
    fn test_cookie_value_parsing() {
        let headers = headers_with_cookie("ctx_visitor=abc123; other=1");
        assert_eq!(
            cookie_value(&headers, "ctx_visitor").as_deref(),
            Some("abc123")
        );
        assert_eq!(cookie_value(&headers, "other").as_deref(), Some("1"));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn test_cookie_value_absent_header() {
        assert_eq!(cookie_value(&HeaderMap::new(), "ctx_visitor"), None);
    }

    #[test]
    fn test_server_construction_rejects_bad_tests() {
        let mut config = ContextualConfig::stock();
        // query_string without get_key must fail at startup.
        config.tests[0].config.get_key = None;
        let result = HttpServer::new(config, Arc::new(MemoryStore::new()));
        assert!(result.is_err());
    }
}
