//! Entity-resolution proposals and the links they establish.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use crate::entity_resolution::{self, NewProposal, ProposalFilter};
use crate::error::{ResearchError, Result};
use crate::rest::extract::{Actor, ApiJson, ApiQuery};
use crate::rest::models::{ok, PageQuery, ResolveRequest};
use crate::rest::{AppState, StorageBackend};

pub async fn list<S: StorageBackend>(
    State(state): State<AppState<S>>,
    ApiQuery(page): ApiQuery<PageQuery>,
    ApiQuery(filter): ApiQuery<ProposalFilter>,
) -> Result<Json<Value>> {
    let listed = state
        .storage
        .read(|conn| entity_resolution::list(conn, &filter, page.page.unwrap_or(1), page.limit))?;
    ok(listed)
}

pub async fn propose<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    ApiJson(data): ApiJson<NewProposal>,
) -> Result<Json<Value>> {
    let proposal = state.storage.write(|conn| entity_resolution::propose(conn, actor, &data))?;
    ok(json!({ "id": proposal.id, "proposal": proposal }))
}

pub async fn get_one<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    let proposal = state.storage.read(|conn| entity_resolution::get(conn, id))?;
    ok(json!({ "proposal": proposal }))
}

/// Either settles the proposal or, with `action=check_conflicts`, lists
/// assertions that contradict it.
pub async fn resolve<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<ResolveRequest>,
) -> Result<Json<Value>> {
    if req.action.as_deref() == Some("check_conflicts") {
        let conflicts = state
            .storage
            .read(|conn| entity_resolution::check_conflicts(conn, id))?;
        return ok(json!({ "has_conflicts": !conflicts.is_empty(), "conflicts": conflicts }));
    }
    let status = req
        .status
        .ok_or_else(|| ResearchError::invalid("status or action=check_conflicts is required"))?;
    let proposal = state
        .storage
        .write(|conn| entity_resolution::resolve(conn, id, status, actor))?;
    ok(json!({ "proposal": proposal }))
}

pub async fn delete<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(_actor): Actor,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    state.storage.write(|conn| entity_resolution::delete(conn, id))?;
    ok(json!({ "deleted": id }))
}

pub async fn candidates<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Path((entity_type, id)): Path<(String, i64)>,
) -> Result<Json<Value>> {
    let found = state
        .storage
        .read(|conn| entity_resolution::find_candidates(conn, &entity_type, id))?;
    ok(json!({ "candidates": found }))
}

pub async fn links<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Path((entity_type, id)): Path<(String, i64)>,
) -> Result<Json<Value>> {
    let found = state
        .storage
        .read(|conn| entity_resolution::entity_links(conn, &entity_type, id))?;
    ok(json!({ "links": found }))
}

#[cfg(test)]
mod tests {
    use crate::rest::handlers::test_support::TestApi;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn proposal_lifecycle() {
        let api = TestApi::new();
        let (status, body) = api
            .post(
                "/research/entity-resolution/propose",
                Some(3),
                json!({"entity_a_type": "actor", "entity_a_id": 1, "entity_b_type": "actor", "entity_b_id": 2,
                       "confidence": 0.9, "relationship_type": "relatedTo"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let id = body["id"].as_i64().unwrap();

        let (_, listed) = api.get("/research/entity-resolution?status=proposed", None).await;
        assert_eq!(listed["total"], 1);

        let (_, body) = api
            .post(
                &format!("/research/entity-resolution/{id}/resolve"),
                Some(3),
                json!({"action": "check_conflicts"}),
            )
            .await;
        assert_eq!(body["has_conflicts"], false);

        let uri = format!("/research/entity-resolution/{id}/resolve");
        let (status, body) = api.post(&uri, Some(3), json!({"status": "accepted"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["proposal"]["status"], "accepted");

        let (status, _) = api.post(&uri, Some(3), json!({"status": "rejected"})).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, links) = api.get("/research/entity-links/actor/2", None).await;
        assert_eq!(links["links"][0]["linked_id"], 1);
    }

    #[tokio::test]
    async fn resolve_needs_status_or_action() {
        let api = TestApi::new();
        let (status, _) = api
            .post("/research/entity-resolution/1/resolve", Some(1), json!({}))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
