//! Extraction jobs and the human validation queue.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use crate::error::{ResearchError, Result};
use crate::rest::extract::{Actor, ApiJson, ApiQuery};
use crate::rest::models::{ok, BulkValidateRequest, NewJobRequest, PageQuery, ValidateRequest};
use crate::rest::{AppState, StorageBackend};
use crate::types::ValidationAction;
use crate::validation::{self, NewResult, QueueFilter};

pub async fn validate<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(result_id): Path<i64>,
    ApiJson(req): ApiJson<ValidateRequest>,
) -> Result<Json<Value>> {
    let reason = req.reason.unwrap_or_default();
    state.storage.write(|conn| match req.action {
        ValidationAction::Accept => validation::accept(conn, result_id, actor),
        ValidationAction::Reject => validation::reject(conn, result_id, actor, &reason),
        ValidationAction::Modify => {
            let data = req
                .modified_data
                .as_ref()
                .ok_or_else(|| ResearchError::invalid("modified_data is required to modify"))?;
            validation::modify(conn, result_id, actor, data)
        }
    })?;
    ok(json!({ "result_id": result_id, "action": req.action }))
}

pub async fn bulk_validate<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    ApiJson(req): ApiJson<BulkValidateRequest>,
) -> Result<Json<Value>> {
    let reason = req.reason.unwrap_or_default();
    let processed = state.storage.write(|conn| match req.action {
        ValidationAction::Accept => validation::bulk_accept(conn, &req.ids, actor),
        ValidationAction::Reject => validation::bulk_reject(conn, &req.ids, actor, &reason),
        ValidationAction::Modify => Err(ResearchError::invalid("modify is not a bulk action")),
    })?;
    ok(json!({ "processed": processed, "requested": req.ids.len() }))
}

pub async fn queue<S: StorageBackend>(
    State(state): State<AppState<S>>,
    ApiQuery(page): ApiQuery<PageQuery>,
    ApiQuery(filter): ApiQuery<QueueFilter>,
) -> Result<Json<Value>> {
    let listed = state
        .storage
        .read(|conn| validation::queue(conn, &filter, page.page.unwrap_or(1), page.limit))?;
    ok(listed)
}

/// Counts for the acting researcher when the header is present, otherwise
/// across the whole queue.
pub async fn stats<S: StorageBackend>(
    State(state): State<AppState<S>>,
    actor: Option<Actor>,
) -> Result<Json<Value>> {
    let counts = state
        .storage
        .read(|conn| validation::stats(conn, actor.map(|Actor(id)| id)))?;
    ok(counts)
}

pub async fn create_job<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    ApiJson(req): ApiJson<NewJobRequest>,
) -> Result<Json<Value>> {
    let job = state
        .storage
        .write(|conn| validation::create_job(conn, actor, req.project_id, &req.extraction_type))?;
    ok(json!({ "job": job }))
}

pub async fn add_result<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Path(job_id): Path<i64>,
    ApiJson(result): ApiJson<NewResult>,
) -> Result<Json<Value>> {
    let result_id = state
        .storage
        .write(|conn| validation::add_result(conn, job_id, &result))?;
    ok(json!({ "result_id": result_id }))
}

pub async fn disagreements<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Path(job_id): Path<i64>,
) -> Result<Json<Value>> {
    let found = state.storage.read(|conn| validation::disagreements(conn, job_id))?;
    ok(json!({ "count": found.len(), "disagreements": found }))
}

#[cfg(test)]
mod tests {
    use crate::people::fixtures::researcher;
    use crate::rest::handlers::test_support::TestApi;
    use crate::storage::Storage;
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    async fn job_with_results(api: &TestApi, actor: i64, n: usize) -> Vec<i64> {
        let (_, body) = api
            .post("/research/extraction-jobs", Some(actor), json!({"extraction_type": "ner"}))
            .await;
        let job = body["job"]["id"].as_i64().unwrap();
        let mut ids = Vec::new();
        for i in 0..n {
            let (status, body) = api
                .post(
                    &format!("/research/extraction-jobs/{job}/results"),
                    None,
                    json!({"object_id": 100 + i, "result_type": "summary", "data": {"text": "…"}, "confidence": 0.7}),
                )
                .await;
            assert_eq!(status, StatusCode::OK, "{body}");
            ids.push(body["result_id"].as_i64().unwrap());
        }
        ids
    }

    #[tokio::test]
    async fn review_moves_items_out_of_pending() {
        let api = TestApi::new();
        let me = api
            .storage
            .write(|conn| Ok(researcher(conn, "Natalie", "Davis").id))
            .unwrap();
        let ids = job_with_results(&api, me, 3).await;

        let (status, _) = api
            .post(
                &format!("/research/validate/{}", ids[0]),
                Some(me),
                json!({"action": "reject", "reason": "hallucinated"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = api
            .post(&format!("/research/validate/{}", ids[0]), Some(me), json!({"action": "accept"}))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, body) = api
            .post(
                "/research/bulk-validate",
                Some(me),
                json!({"ids": [ids[0], ids[1], ids[2]], "action": "accept"}),
            )
            .await;
        assert_eq!(body["processed"], 2);

        let (_, stats) = api.get("/research/validation-queue/stats", Some(me)).await;
        assert_eq!(stats["pending"], 0);
        assert_eq!(stats["accepted"], 2);
        assert_eq!(stats["rejected"], 1);
    }

    #[tokio::test]
    async fn queue_filters_by_status() {
        let api = TestApi::new();
        let me = api
            .storage
            .write(|conn| Ok(researcher(conn, "Carlo", "Ginzburg").id))
            .unwrap();
        let ids = job_with_results(&api, me, 2).await;

        let (status, body) = api
            .post(
                &format!("/research/validate/{}", ids[1]),
                Some(me),
                json!({"action": "modify"}),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

        let (_, body) = api.get("/research/validation-queue?status=pending&limit=10", None).await;
        assert_eq!(body["total"], 2);
        let items: &Vec<Value> = body["items"].as_array().unwrap();
        assert_eq!(items[0]["result_type"], "summary");
    }
}
