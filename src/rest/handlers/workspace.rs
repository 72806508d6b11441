//! Researchers, projects, catalogue records, notifications and the dashboard.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use crate::catalogue::{self, EntityInput, EntitySearch};
use crate::error::Result;
use crate::notifications::{self, NotificationFilter, PreferenceUpdate};
use crate::people::{self, NewProject, NewResearcher};
use crate::rest::extract::{Actor, ApiJson, ApiQuery};
use crate::rest::models::{ok, ActivityQuery, InviteRequest};
use crate::rest::{AppState, StorageBackend};
use crate::{activity, dashboard};

const SEARCH_LIMIT: i64 = 100;
const ACTIVITY_LIMIT: i64 = 50;

pub async fn dashboard<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
) -> Result<Json<Value>> {
    let counters = state.storage.read(|conn| Ok(dashboard::counters(conn, actor)))?;
    ok(counters)
}

pub async fn create_researcher<S: StorageBackend>(
    State(state): State<AppState<S>>,
    ApiJson(data): ApiJson<NewResearcher>,
) -> Result<Json<Value>> {
    let researcher = state.storage.write(|conn| people::create_researcher(conn, &data))?;
    ok(json!({ "researcher": researcher }))
}

pub async fn get_researcher<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    let researcher = state.storage.read(|conn| people::load_researcher(conn, id))?;
    ok(json!({ "researcher": researcher }))
}

pub async fn create_project<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    ApiJson(data): ApiJson<NewProject>,
) -> Result<Json<Value>> {
    let project = state.storage.write(|conn| people::create_project(conn, actor, &data))?;
    ok(json!({ "project": project }))
}

pub async fn get_project<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    let (project, collaborators) = state.storage.read(|conn| {
        Ok((people::load_project(conn, id)?, people::list_collaborators(conn, id)?))
    })?;
    ok(json!({ "project": project, "collaborators": collaborators }))
}

pub async fn invite<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<InviteRequest>,
) -> Result<Json<Value>> {
    let collaborator = state
        .storage
        .write(|conn| people::invite_collaborator(conn, id, actor, req.researcher_id, &req.role))?;
    ok(json!({ "collaborator": collaborator }))
}

pub async fn accept<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    let collaborator = state.storage.write(|conn| people::accept_invitation(conn, id, actor))?;
    ok(json!({ "collaborator": collaborator }))
}

pub async fn project_activity<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Path(id): Path<i64>,
    ApiQuery(query): ApiQuery<ActivityQuery>,
) -> Result<Json<Value>> {
    let limit = query.limit.unwrap_or(ACTIVITY_LIMIT);
    let entries = state.storage.read(|conn| activity::list_for_project(conn, id, limit))?;
    ok(json!({ "activity": entries }))
}

pub async fn upsert_entity<S: StorageBackend>(
    State(state): State<AppState<S>>,
    ApiJson(input): ApiJson<EntityInput>,
) -> Result<Json<Value>> {
    let entity = state.storage.write(|conn| catalogue::upsert(conn, &input))?;
    ok(json!({ "entity": entity }))
}

pub async fn search_entities<S: StorageBackend>(
    State(state): State<AppState<S>>,
    ApiQuery(search): ApiQuery<EntitySearch>,
) -> Result<Json<Value>> {
    let results = state.storage.read(|conn| catalogue::search(conn, &search, SEARCH_LIMIT))?;
    ok(json!({ "count": results.len(), "results": results }))
}

pub async fn notifications<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    ApiQuery(filter): ApiQuery<NotificationFilter>,
) -> Result<Json<Value>> {
    let items = state.storage.read(|conn| notifications::list(conn, actor, &filter))?;
    ok(json!({ "notifications": items }))
}

pub async fn unread_count<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
) -> Result<Json<Value>> {
    let count = state.storage.read(|conn| notifications::unread_count(conn, actor))?;
    ok(json!({ "count": count }))
}

pub async fn mark_read<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    state.storage.write(|conn| notifications::mark_read(conn, id, actor))?;
    ok(json!({}))
}

pub async fn mark_all_read<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
) -> Result<Json<Value>> {
    let updated = state.storage.write(|conn| notifications::mark_all_read(conn, actor))?;
    ok(json!({ "updated": updated }))
}

pub async fn preferences<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
) -> Result<Json<Value>> {
    let prefs = state.storage.read(|conn| notifications::preferences(conn, actor))?;
    ok(json!({ "preferences": prefs }))
}

pub async fn update_preference<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    ApiJson(update): ApiJson<PreferenceUpdate>,
) -> Result<Json<Value>> {
    let pref = state
        .storage
        .write(|conn| notifications::update_preference(conn, actor, &update))?;
    ok(json!({ "preference": pref }))
}
