pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, put},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

/// CRUD surface over the rule store, mounted under /admin.
///
/// The /admin prefix is an excluded path by default, so admin traffic never
/// runs through classification or rewriting.
pub fn admin_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/tags", get(list_tags).post(create_tag))
        .route("/admin/values", get(list_values).post(create_value))
        .route("/admin/values/{id}/active", put(set_value_active))
        .route("/admin/rules", get(list_rules).post(create_rule))
        .layer(middleware::from_fn_with_state(
            state,
            admin_auth_middleware,
        ))
}
