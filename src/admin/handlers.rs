use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::http::server::AppState;
use crate::store::memory::RuleSummary;
use crate::store::{ReplacementTag, ReplacementValue, RuleId, StoreError};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub tags: usize,
    pub values: usize,
    pub rules: usize,
    pub sessions: usize,
}

#[derive(Deserialize)]
pub struct CreateTag {
    pub name: String,
    pub default_value: String,
}

#[derive(Deserialize)]
pub struct CreateValue {
    pub tag: String,
    pub name: String,
    pub data: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Deserialize)]
pub struct SetActive {
    pub active: bool,
}

/// One rule definition per strategy, tagged by kind.
#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CreateRule {
    Hostname { hostname: String, values: Vec<u64> },
    Path { path: String, values: Vec<u64> },
    QueryString { value: String, values: Vec<u64> },
    Referer { domain: String, values: Vec<u64> },
    BrandedSearch {
        engine: String,
        branded: bool,
        values: Vec<u64>,
    },
}

#[derive(Serialize)]
pub struct Created {
    pub id: u64,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        tags: state.store.tag_count(),
        values: state.store.value_count(),
        rules: state.store.rule_count(),
        sessions: state.sessions.len(),
    })
}

pub async fn list_tags(State(state): State<AppState>) -> Json<Vec<ReplacementTag>> {
    Json(state.store.tags())
}

pub async fn create_tag(
    State(state): State<AppState>,
    Json(body): Json<CreateTag>,
) -> Response {
    match state.store.add_tag(body.name, body.default_value) {
        Ok(()) => StatusCode::CREATED.into_response(),
        Err(e) => store_error(e),
    }
}

pub async fn list_values(State(state): State<AppState>) -> Json<Vec<ReplacementValue>> {
    Json(state.store.values())
}

pub async fn create_value(
    State(state): State<AppState>,
    Json(body): Json<CreateValue>,
) -> Response {
    match state
        .store
        .add_value(body.tag, body.name, body.data, body.active)
    {
        Ok(id) => (StatusCode::CREATED, Json(Created { id })).into_response(),
        Err(e) => store_error(e),
    }
}

pub async fn set_value_active(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(body): Json<SetActive>,
) -> Response {
    match state.store.set_value_active(id, body.active) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => store_error(e),
    }
}

pub async fn list_rules(State(state): State<AppState>) -> Json<Vec<RuleSummary>> {
    Json(state.store.rules())
}

pub async fn create_rule(
    State(state): State<AppState>,
    Json(body): Json<CreateRule>,
) -> Response {
    let result: Result<RuleId, StoreError> = match body {
        CreateRule::Hostname { hostname, values } => {
            state.store.add_hostname_rule(&hostname, values)
        }
        CreateRule::Path { path, values } => state.store.add_path_rule(&path, values),
        CreateRule::QueryString { value, values } => state.store.add_query_rule(&value, values),
        CreateRule::Referer { domain, values } => state.store.add_referer_rule(&domain, values),
        CreateRule::BrandedSearch {
            engine,
            branded,
            values,
        } => state.store.add_search_rule(&engine, branded, values),
    };
    match result {
        Ok(id) => (StatusCode::CREATED, Json(Created { id: id.0 })).into_response(),
        Err(e) => store_error(e),
    }
}

fn store_error(error: StoreError) -> Response {
    let status = match error {
        StoreError::Duplicate { .. } => StatusCode::CONFLICT,
        StoreError::UnknownTag(_) | StoreError::UnknownValue(_) => StatusCode::UNPROCESSABLE_ENTITY,
    };
    (status, error.to_string()).into_response()
}
