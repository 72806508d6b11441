//! ODRL policies, access evaluation and source trust assessments.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};

use crate::error::{ResearchError, Result};
use crate::odrl::{self, AccessRequest, NewPolicy};
use crate::rest::extract::{Actor, ApiJson, ApiQuery};
use crate::rest::models::{ok, EvaluateRequest, PolicyQuery};
use crate::rest::{AppState, StorageBackend};
use crate::trust::{self, NewAssessment};

pub async fn create_policy<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    ApiJson(data): ApiJson<NewPolicy>,
) -> Result<Json<Value>> {
    let policy = state.storage.write(|conn| odrl::create(conn, actor, &data))?;
    ok(json!({ "id": policy.id, "policy": policy }))
}

pub async fn delete_policy<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    state.storage.write(|conn| odrl::delete(conn, id, actor))?;
    ok(json!({ "deleted": id }))
}

pub async fn list_policies<S: StorageBackend>(
    State(state): State<AppState<S>>,
    ApiQuery(query): ApiQuery<PolicyQuery>,
) -> Result<Json<Value>> {
    let policies = state
        .storage
        .read(|conn| odrl::list(conn, query.target_type.as_deref(), query.target_id))?;
    ok(json!({ "count": policies.len(), "policies": policies }))
}

/// Evaluates the target's policies. The acting researcher is optional and
/// the instant defaults to now.
pub async fn evaluate<S: StorageBackend>(
    State(state): State<AppState<S>>,
    actor: Option<Actor>,
    ApiJson(req): ApiJson<EvaluateRequest>,
) -> Result<Json<Value>> {
    let date_time = match req.date_time.as_deref() {
        Some(raw) => odrl::parse_instant(raw)
            .ok_or_else(|| ResearchError::invalid(format!("unreadable date_time '{raw}'")))?,
        None => Utc::now().naive_utc(),
    };
    let request = AccessRequest {
        action: req.action,
        researcher_id: actor.map(|Actor(id)| id),
        purpose: req.purpose,
        date_time,
        count: req.count,
        spatial: req.spatial,
    };
    let policies = state
        .storage
        .read(|conn| odrl::policies_for(conn, &req.target_type, req.target_id))?;
    ok(odrl::evaluate(&policies, &request))
}

pub async fn assess<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(object_id): Path<i64>,
    ApiJson(data): ApiJson<NewAssessment>,
) -> Result<Json<Value>> {
    let (assessment, breakdown) = state
        .storage
        .write(|conn| trust::assess(conn, object_id, actor, &data))?;
    ok(json!({ "assessment": assessment, "breakdown": breakdown }))
}

pub async fn assessment_report<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Path(object_id): Path<i64>,
) -> Result<Json<Value>> {
    let report = state.storage.read(|conn| trust::report(conn, object_id))?;
    ok(report)
}
