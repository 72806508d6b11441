//! Per-user favourites and folders.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use crate::error::Result;
use crate::favorites::{self, CustomFavorite};
use crate::rest::extract::{Actor, ApiJson, ApiQuery};
use crate::rest::models::{ok, FolderQuery, FolderRequest, IdsRequest, MoveRequest, NotesRequest};
use crate::rest::{AppState, StorageBackend};

pub async fn list<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    ApiQuery(query): ApiQuery<FolderQuery>,
) -> Result<Json<Value>> {
    let (items, total) = state.storage.read(|conn| {
        Ok((
            favorites::list(conn, actor, query.folder_id)?,
            favorites::count(conn, actor)?,
        ))
    })?;
    ok(json!({ "total": total, "favorites": items }))
}

pub async fn folders<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
) -> Result<Json<Value>> {
    let found = state.storage.read(|conn| favorites::folders(conn, actor))?;
    ok(json!({ "folders": found }))
}

pub async fn create_folder<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    ApiJson(req): ApiJson<FolderRequest>,
) -> Result<Json<Value>> {
    let folder = state
        .storage
        .write(|conn| favorites::create_folder(conn, actor, &req.name))?;
    ok(json!({ "folder": folder }))
}

pub async fn toggle_custom<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    ApiJson(data): ApiJson<CustomFavorite>,
) -> Result<Json<Value>> {
    let outcome = state
        .storage
        .write(|conn| favorites::toggle_custom(conn, actor, &data))?;
    ok(outcome)
}

pub async fn move_to_folder<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    ApiJson(req): ApiJson<MoveRequest>,
) -> Result<Json<Value>> {
    let moved = state
        .storage
        .write(|conn| favorites::move_to_folder(conn, actor, &req.ids, req.folder_id))?;
    ok(json!({ "moved": moved }))
}

pub async fn remove<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    ApiJson(req): ApiJson<IdsRequest>,
) -> Result<Json<Value>> {
    let removed = state
        .storage
        .write(|conn| favorites::remove_bulk(conn, actor, &req.ids))?;
    ok(json!({ "removed": removed }))
}

pub async fn notes<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<NotesRequest>,
) -> Result<Json<Value>> {
    let favorite = state
        .storage
        .write(|conn| favorites::update_notes(conn, actor, id, req.notes.as_deref()))?;
    ok(json!({ "favorite": favorite }))
}
