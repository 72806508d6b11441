//! Retrieval of material for the reading rooms: staff queues, scheduled
//! runs, call slips and request status.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use crate::error::Result;
use crate::reading_room::retrieval::{self, NewQueue, NewSchedule, RequestDetails};
use crate::rest::extract::{Actor, ApiJson, ApiQuery};
use crate::rest::handlers::reading_room::{moment, range};
use crate::rest::models::{
    ok, BatchStatusRequest, MomentQuery, OffsetQuery, QueueMoveRequest, RangeQuery, RoomQuery, StatusNotesRequest,
};
use crate::rest::{AppState, StorageBackend};
use crate::types::MaterialRequestStatus;

// Queues

pub async fn list_queues<S: StorageBackend>(
    State(state): State<AppState<S>>,
    ApiQuery(query): ApiQuery<RoomQuery>,
) -> Result<Json<Value>> {
    let active_only = query.active_only.unwrap_or(true);
    let queues = state.storage.read(|conn| retrieval::list_queues(conn, active_only))?;
    ok(json!({ "queues": queues }))
}

pub async fn create_queue<S: StorageBackend>(
    State(state): State<AppState<S>>,
    _staff: Actor,
    ApiJson(data): ApiJson<NewQueue>,
) -> Result<Json<Value>> {
    let queue = state.storage.write(|conn| retrieval::create_queue(conn, &data))?;
    ok(json!({ "id": queue.id, "queue": queue }))
}

pub async fn queue_counts<S: StorageBackend>(State(state): State<AppState<S>>) -> Result<Json<Value>> {
    let counts = state.storage.read(retrieval::queue_counts)?;
    ok(json!({ "queues": counts }))
}

pub async fn queue_requests<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Path(id): Path<i64>,
    ApiQuery(query): ApiQuery<OffsetQuery>,
) -> Result<Json<Value>> {
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let offset = query.offset.unwrap_or(0).max(0);
    let (queue, requests) = state.storage.read(|conn| {
        let queue = retrieval::get_queue(conn, id)?;
        let requests = retrieval::queue_requests(conn, id, limit, offset)?;
        Ok((queue, requests))
    })?;
    ok(json!({ "queue": queue, "count": requests.len(), "requests": requests }))
}

pub async fn move_to_queue<S: StorageBackend>(
    State(state): State<AppState<S>>,
    _staff: Actor,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<QueueMoveRequest>,
) -> Result<Json<Value>> {
    let request = state
        .storage
        .write(|conn| retrieval::move_to_queue(conn, id, req.queue_id))?;
    ok(json!({ "request": request }))
}

// Request status and storage details

pub async fn update_status<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(staff): Actor,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<StatusNotesRequest<MaterialRequestStatus>>,
) -> Result<Json<Value>> {
    let request = state.storage.write(|conn| {
        retrieval::update_request_status(conn, id, req.status, Some(staff), req.notes.as_deref())
    })?;
    ok(json!({ "request": request }))
}

pub async fn batch_status<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(staff): Actor,
    ApiJson(req): ApiJson<BatchStatusRequest>,
) -> Result<Json<Value>> {
    let updated = state.storage.write(|conn| {
        retrieval::batch_update_status(conn, &req.ids, req.status, Some(staff), req.notes.as_deref())
    })?;
    ok(json!({ "updated": updated, "requested": req.ids.len() }))
}

pub async fn set_details<S: StorageBackend>(
    State(state): State<AppState<S>>,
    _staff: Actor,
    Path(id): Path<i64>,
    ApiJson(details): ApiJson<RequestDetails>,
) -> Result<Json<Value>> {
    let request = state
        .storage
        .write(|conn| retrieval::set_details(conn, id, &details))?;
    ok(json!({ "request": request }))
}

pub async fn call_slip<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    let slip = state.storage.read(|conn| retrieval::call_slip(conn, id))?;
    ok(slip)
}

pub async fn call_slip_printed<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(staff): Actor,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    let request = state
        .storage
        .write(|conn| retrieval::mark_call_slip_printed(conn, id, Some(staff)))?;
    ok(json!({ "request": request }))
}

// Schedules

pub async fn create_schedule<S: StorageBackend>(
    State(state): State<AppState<S>>,
    _staff: Actor,
    ApiJson(data): ApiJson<NewSchedule>,
) -> Result<Json<Value>> {
    let schedule = state.storage.write(|conn| retrieval::create_schedule(conn, &data))?;
    ok(json!({ "id": schedule.id, "schedule": schedule }))
}

pub async fn room_schedules<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Path(room_id): Path<i64>,
) -> Result<Json<Value>> {
    let schedules = state
        .storage
        .read(|conn| retrieval::schedules(conn, room_id, true))?;
    ok(json!({ "schedules": schedules }))
}

/// Next run after `date`/`time`, both defaulting to now.
pub async fn next_retrieval<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Path(room_id): Path<i64>,
    ApiQuery(query): ApiQuery<MomentQuery>,
) -> Result<Json<Value>> {
    let (date, at) = moment(&query)?;
    let next = state
        .storage
        .read(|conn| retrieval::next_run(conn, room_id, date.and_time(at)))?;
    ok(json!({ "next": next }))
}

/// The pick list for one run of a schedule on `date` (default today).
pub async fn schedule_requests<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Path(id): Path<i64>,
    ApiQuery(query): ApiQuery<MomentQuery>,
) -> Result<Json<Value>> {
    let (date, _) = moment(&query)?;
    let requests = state
        .storage
        .read(|conn| retrieval::requests_for_retrieval(conn, id, date))?;
    ok(json!({ "count": requests.len(), "requests": requests }))
}

pub async fn statistics<S: StorageBackend>(
    State(state): State<AppState<S>>,
    ApiQuery(query): ApiQuery<RangeQuery>,
) -> Result<Json<Value>> {
    let (from, to) = range(&query)?;
    let stats = state.storage.read(|conn| retrieval::statistics(conn, from, to))?;
    ok(stats)
}
