//! Reproduction requests: the researcher's order and the staff workflow.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use crate::error::{ResearchError, Result};
use crate::reproduction::{self, ItemInput, ItemUpdate, Payment, RequestFilter, RequestInput};
use crate::rest::extract::{Actor, ApiJson, ApiQuery};
use crate::rest::models::{ok, ReproductionQuery, StatusNotesRequest};
use crate::rest::{AppState, StorageBackend};
use crate::types::{ReproductionStatus, ReproductionType};

pub async fn mine<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    ApiQuery(query): ApiQuery<ReproductionQuery>,
) -> Result<Json<Value>> {
    let found = state
        .storage
        .read(|conn| reproduction::list_for_researcher(conn, actor, query.status))?;
    ok(json!({ "count": found.len(), "requests": found }))
}

pub async fn create<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    ApiJson(input): ApiJson<RequestInput>,
) -> Result<Json<Value>> {
    let created = state.storage.write(|conn| reproduction::create(conn, actor, &input))?;
    ok(json!({ "id": created.id, "request": created }))
}

/// Items and status trail; only the requesting researcher reads it here.
pub async fn get_one<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    let detail = state.storage.read(|conn| reproduction::detail(conn, id))?;
    if detail.request.researcher_id != actor {
        return Err(ResearchError::Forbidden(format!(
            "reproduction request {id} belongs to another researcher"
        )));
    }
    ok(detail)
}

pub async fn update<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(id): Path<i64>,
    ApiJson(input): ApiJson<RequestInput>,
) -> Result<Json<Value>> {
    let updated = state
        .storage
        .write(|conn| reproduction::update(conn, id, actor, &input))?;
    ok(json!({ "request": updated }))
}

pub async fn add_item<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(id): Path<i64>,
    ApiJson(input): ApiJson<ItemInput>,
) -> Result<Json<Value>> {
    let item = state
        .storage
        .write(|conn| reproduction::add_item(conn, id, actor, &input))?;
    ok(json!({ "id": item.id, "item": item }))
}

pub async fn remove_item<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    state.storage.write(|conn| reproduction::remove_item(conn, id, actor))?;
    ok(json!({ "deleted": id }))
}

pub async fn update_item<S: StorageBackend>(
    State(state): State<AppState<S>>,
    _staff: Actor,
    Path(id): Path<i64>,
    ApiJson(changes): ApiJson<ItemUpdate>,
) -> Result<Json<Value>> {
    let item = state
        .storage
        .write(|conn| reproduction::update_item(conn, id, &changes))?;
    ok(json!({ "item": item }))
}

pub async fn complete_item<S: StorageBackend>(
    State(state): State<AppState<S>>,
    _staff: Actor,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    let item = state.storage.write(|conn| reproduction::complete_item(conn, id))?;
    ok(json!({ "item": item }))
}

pub async fn submit<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    let submitted = state.storage.write(|conn| reproduction::submit(conn, id, actor))?;
    ok(json!({ "estimated_cost": submitted.estimated_cost, "request": submitted }))
}

pub async fn update_status<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(staff): Actor,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<StatusNotesRequest<ReproductionStatus>>,
) -> Result<Json<Value>> {
    let updated = state.storage.write(|conn| {
        reproduction::update_status(conn, id, req.status, Some(staff), req.notes.as_deref())
    })?;
    ok(json!({ "request": updated }))
}

pub async fn record_payment<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(staff): Actor,
    Path(id): Path<i64>,
    ApiJson(payment): ApiJson<Payment>,
) -> Result<Json<Value>> {
    let paid = state
        .storage
        .write(|conn| reproduction::record_payment(conn, id, &payment, Some(staff)))?;
    ok(json!({ "request": paid }))
}

/// Staff listing across researchers.
pub async fn all<S: StorageBackend>(
    State(state): State<AppState<S>>,
    _staff: Actor,
    ApiQuery(query): ApiQuery<ReproductionQuery>,
) -> Result<Json<Value>> {
    let filter = RequestFilter {
        status: query.status,
        search: query.search,
    };
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let offset = query.offset.unwrap_or(0).max(0);
    let found = state
        .storage
        .read(|conn| reproduction::list_all(conn, &filter, limit, offset))?;
    ok(json!({ "count": found.len(), "requests": found }))
}

pub async fn statistics<S: StorageBackend>(State(state): State<AppState<S>>) -> Result<Json<Value>> {
    let stats = state.storage.read(reproduction::statistics)?;
    ok(stats)
}

pub async fn pricing() -> Result<Json<Value>> {
    let table: serde_json::Map<String, Value> = ReproductionType::ALL
        .iter()
        .map(|kind| (kind.to_string(), json!(reproduction::pricing(*kind))))
        .collect();
    ok(json!({ "pricing": table }))
}
