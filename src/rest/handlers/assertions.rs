//! Assertions, their evidence, and the relationship graph.

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use crate::assertion::{self, AssertionUpdate, NewAssertion, NewEvidence, PromoteAnnotation};
use crate::error::{ResearchError, Result};
use crate::graph::{self, GraphFilter};
use crate::rest::extract::{Actor, ApiJson, ApiQuery};
use crate::rest::models::{decode, ok, GraphQuery, SearchQuery, StatusRequest};
use crate::rest::{AppState, StorageBackend};
use crate::types::AssertionStatus;

/// Creates an assertion, or promotes an annotation when `annotation_id` is
/// present in the payload.
pub async fn create<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    ApiJson(payload): ApiJson<Value>,
) -> Result<Json<Value>> {
    let created = match payload.get("annotation_id").and_then(Value::as_i64) {
        Some(annotation_id) => {
            let data: PromoteAnnotation = decode(payload)?;
            state
                .storage
                .write(|conn| assertion::promote_annotation(conn, annotation_id, actor, &data))?
        }
        None => {
            let data: NewAssertion = decode(payload)?;
            state.storage.write(|conn| assertion::create(conn, actor, &data))?
        }
    };
    ok(json!({ "id": created.id, "assertion": created }))
}

pub async fn search<S: StorageBackend>(
    State(state): State<AppState<S>>,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> Result<Json<Value>> {
    let results = state.storage.read(|conn| assertion::search(conn, &query.q))?;
    ok(json!({ "count": results.len(), "results": results }))
}

pub async fn get_one<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    let detail = state.storage.read(|conn| assertion::get(conn, id))?;
    ok(json!({ "assertion": detail }))
}

pub async fn update<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(id): Path<i64>,
    ApiJson(changes): ApiJson<AssertionUpdate>,
) -> Result<Json<Value>> {
    let updated = state.storage.write(|conn| assertion::update(conn, id, actor, &changes))?;
    ok(json!({ "assertion": updated }))
}

pub async fn update_status<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<StatusRequest<AssertionStatus>>,
) -> Result<Json<Value>> {
    let updated = state
        .storage
        .write(|conn| assertion::update_status(conn, id, actor, req.status))?;
    ok(json!({ "assertion": updated }))
}

pub async fn add_evidence<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(id): Path<i64>,
    ApiJson(data): ApiJson<NewEvidence>,
) -> Result<Json<Value>> {
    let evidence = state.storage.write(|conn| assertion::add_evidence(conn, id, actor, &data))?;
    ok(json!({ "evidence": evidence }))
}

pub async fn remove_evidence<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(_actor): Actor,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    state.storage.write(|conn| assertion::remove_evidence(conn, id))?;
    ok(json!({ "deleted": id }))
}

pub async fn conflicts<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    let found = state.storage.read(|conn| assertion::detect_conflicts(conn, id))?;
    ok(json!({ "has_conflicts": !found.is_empty(), "conflicts": found }))
}

pub async fn for_subject<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Path((subject_type, id)): Path<(String, i64)>,
) -> Result<Json<Value>> {
    let items = state
        .storage
        .read(|conn| assertion::subject_assertions(conn, &subject_type, id))?;
    ok(json!({ "count": items.len(), "assertions": items }))
}

/// Graph as JSON, or as a GEXF / GraphML document when `format` asks for it.
pub async fn graph_data<S: StorageBackend>(
    State(state): State<AppState<S>>,
    ApiQuery(query): ApiQuery<GraphQuery>,
) -> Result<Response> {
    let filter = GraphFilter {
        assertion_type: query.assertion_type,
        status: query.status,
    };
    let built = state
        .storage
        .read(|conn| graph::build_relationship_graph(conn, query.project_id, &filter))?;

    let (content_type, document) = match query.format.as_deref().unwrap_or("json") {
        "json" => return Ok(ok(built)?.into_response()),
        "gexf" => ("application/gexf+xml", graph::export_gexf(&built)),
        "graphml" => ("application/graphml+xml", graph::export_graphml(&built)),
        other => return Err(ResearchError::invalid(format!("unknown graph format '{other}'"))),
    };
    Ok(([(header::CONTENT_TYPE, content_type)], document).into_response())
}

#[cfg(test)]
mod tests {
    use crate::people::fixtures::researcher;
    use crate::rest::handlers::test_support::TestApi;
    use crate::storage::Storage;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;

    fn seeded() -> (TestApi, i64) {
        let api = TestApi::new();
        let id = api
            .storage
            .write(|conn| Ok(researcher(conn, "Marc", "Bloch").id))
            .unwrap();
        (api, id)
    }

    #[tokio::test]
    async fn conflicting_assertions_are_reported() {
        let (api, marc) = seeded();
        let born = |place: &str| {
            json!({
                "subject_type": "actor",
                "subject_id": 5,
                "predicate": "born_in",
                "object_value": place,
                "assertion_type": "biographical"
            })
        };
        let (status, first) = api.post("/research/assertion/create", Some(marc), born("Lyon")).await;
        assert_eq!(status, StatusCode::OK, "{first}");
        api.post("/research/assertion/create", Some(marc), born("Paris")).await;

        let id = first["id"].as_i64().unwrap();
        let (_, body) = api.get(&format!("/research/assertions/{id}/conflicts"), None).await;
        assert_eq!(body["has_conflicts"], true);
        assert_eq!(body["conflicts"][0]["object_value"], "Paris");

        let (_, body) = api.get("/research/subjects/actor/5/assertions", None).await;
        assert_eq!(body["count"], 2);
    }

    #[tokio::test]
    async fn status_and_evidence_round_through_detail() {
        let (api, marc) = seeded();
        let (_, created) = api
            .post(
                "/research/assertion/create",
                Some(marc),
                json!({"subject_type": "actor", "subject_id": 1, "predicate": "occupation", "object_value": "historian"}),
            )
            .await;
        let id = created["id"].as_i64().unwrap();

        let (status, _) = api
            .post(
                &format!("/research/assertions/{id}/evidence"),
                Some(marc),
                json!({"source_type": "information_object", "source_id": 44, "relationship": "supports"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = api
            .post(
                &format!("/research/assertions/{id}/status"),
                Some(marc),
                json!({"status": "verified"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");

        let (_, detail) = api.get(&format!("/research/assertions/{id}"), None).await;
        assert_eq!(detail["assertion"]["status"], "verified");
        assert_eq!(detail["assertion"]["evidence_count"], 1);
    }

    #[tokio::test]
    async fn graph_exports_as_xml() {
        let (api, marc) = seeded();
        api.post(
            "/research/assertion/create",
            Some(marc),
            json!({"subject_type": "actor", "subject_id": 1, "predicate": "member_of",
                   "object_type": "actor", "object_id": 2, "assertion_type": "relational"}),
        )
        .await;

        let (_, body) = api.get("/research/network-graph-data", None).await;
        assert_eq!(body["stats"]["edge_count"], 1);

        let req = Request::builder()
            .uri("/research/network-graph-data?format=gexf")
            .body(Body::empty())
            .unwrap();
        let response = tower::ServiceExt::oneshot(api.app.clone(), req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"],
            "application/gexf+xml"
        );

        let (status, _) = api.get("/research/network-graph-data?format=dot", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
