//! W3C / IIIF annotation endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::annotation::{self, AnnotationUpdate, NewAnnotation, NewTarget};
use crate::error::{ResearchError, Result};
use crate::rest::extract::{Actor, ApiJson};
use crate::rest::models::{decode, ok};
use crate::rest::{AppState, StorageBackend};

#[derive(Debug, Deserialize)]
struct AddTargets {
    annotation_id: i64,
    #[serde(default)]
    targets: Vec<NewTarget>,
}

fn flag(payload: &Value, name: &str) -> bool {
    match payload.get(name) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(s.as_str(), "1" | "true"),
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        _ => false,
    }
}

fn annotation_id(payload: &Value) -> Result<i64> {
    payload
        .get("annotation_id")
        .and_then(Value::as_i64)
        .ok_or_else(|| ResearchError::invalid("annotation_id is required"))
}

/// One endpoint for delete, update, add-targets and create, picked by the
/// payload shape.
pub async fn dispatch<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    ApiJson(payload): ApiJson<Value>,
) -> Result<Json<Value>> {
    let base = state.config.base();

    if flag(&payload, "delete_annotation") {
        let id = annotation_id(&payload)?;
        state.storage.write(|conn| annotation::delete(conn, id, actor))?;
        return ok(json!({ "deleted": id }));
    }

    if flag(&payload, "update_annotation") {
        let id = annotation_id(&payload)?;
        let changes: AnnotationUpdate = decode(payload)?;
        let updated = state.storage.write(|conn| annotation::update(conn, id, actor, &changes))?;
        return ok(json!({ "annotation": annotation::to_w3c(&updated, base) }));
    }

    if payload.get("annotation_id").is_some() && payload.get("targets").is_some() {
        let req: AddTargets = decode(payload)?;
        let added = state.storage.write(|conn| {
            req.targets
                .iter()
                .map(|t| annotation::add_target(conn, req.annotation_id, actor, t))
                .collect::<Result<Vec<_>>>()
        })?;
        return ok(json!({ "annotation_id": req.annotation_id, "targets": added }));
    }

    let data: NewAnnotation = decode(payload)?;
    let created = state.storage.write(|conn| annotation::create(conn, actor, &data))?;
    ok(json!({ "id": created.id, "annotation": annotation::to_w3c(&created, base) }))
}

pub async fn get_w3c<S: StorageBackend>(
    State(state): State<AppState<S>>,
    viewer: Option<Actor>,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    let viewer = viewer.map(|Actor(id)| id);
    let found = state.storage.read(|conn| annotation::get_visible(conn, id, viewer))?;
    Ok(Json(annotation::to_w3c(&found, state.config.base())))
}

pub async fn iiif_page<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    let page = state
        .storage
        .read(|conn| annotation::export_iiif(conn, id, state.config.base()))?;
    Ok(Json(page))
}

pub async fn import<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(id): Path<i64>,
    ApiJson(page): ApiJson<Value>,
) -> Result<Json<Value>> {
    let count = state
        .storage
        .write(|conn| annotation::import_iiif(conn, actor, id, &page))?;
    ok(json!({ "count": count }))
}

pub async fn delete_target<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    state.storage.write(|conn| annotation::remove_target(conn, id, actor))?;
    ok(json!({ "deleted": id }))
}

pub async fn for_project<S: StorageBackend>(
    State(state): State<AppState<S>>,
    viewer: Option<Actor>,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    let base = state.config.base();
    let viewer = viewer.map(|Actor(id)| id);
    let items = state.storage.read(|conn| annotation::list_for_project(conn, id))?;
    let items: Vec<Value> = items
        .iter()
        .filter(|a| annotation::visible_to(a, viewer))
        .map(|a| annotation::to_w3c(a, base))
        .collect();
    ok(json!({ "count": items.len(), "annotations": items }))
}

#[cfg(test)]
mod tests {
    use crate::people::fixtures::researcher;
    use crate::rest::handlers::test_support::TestApi;
    use crate::storage::Storage;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn create_update_and_delete_through_one_endpoint() {
        let api = TestApi::new();
        let ada = api
            .storage
            .write(|conn| Ok(researcher(conn, "Ada", "Lovelace").id))
            .unwrap();

        let (status, body) = api
            .post(
                "/research/annotation-v2/create",
                Some(ada),
                json!({
                    "object_id": 12,
                    "motivation": "commenting",
                    "body": "Signed by the clerk",
                    "targets": [{"source_id": 12}]
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let id = body["id"].as_i64().unwrap();
        assert_eq!(
            body["annotation"]["id"],
            format!("https://archive.test/research/annotations/{id}")
        );
        assert_eq!(body["annotation"]["body"]["type"], "TextualBody");

        let (status, body) = api
            .post(
                "/research/annotation-v2/create",
                Some(ada),
                json!({"update_annotation": true, "annotation_id": id, "visibility": "public"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");

        let (_, page) = api.get("/research/annotations/object/12", None).await;
        assert_eq!(page["type"], "AnnotationPage");
        assert_eq!(page["items"].as_array().unwrap().len(), 1);

        let (status, _) = api
            .post(
                "/research/annotation-v2/create",
                Some(ada),
                json!({"delete_annotation": "1", "annotation_id": id}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let (_, page) = api.get("/research/annotations/object/12", None).await;
        assert!(page["items"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn private_and_deleted_annotations_are_hidden_from_others() {
        let api = TestApi::new();
        let (ada, eve) = api
            .storage
            .write(|conn| {
                Ok((
                    researcher(conn, "Ada", "Lovelace").id,
                    researcher(conn, "Eve", "Moneypenny").id,
                ))
            })
            .unwrap();
        let (_, body) = api
            .post(
                "/research/annotation-v2/create",
                Some(ada),
                json!({"object_id": 5, "body": "secret note", "visibility": "private"}),
            )
            .await;
        let id = body["id"].as_i64().unwrap();
        let uri = format!("/research/annotations/{id}");

        let (status, body) = api.get(&uri, Some(ada)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["body"]["value"], "secret note");
        let (status, _) = api.get(&uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = api.get(&uri, Some(eve)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = api
            .post(
                "/research/annotation-v2/create",
                Some(ada),
                json!({"delete_annotation": true, "annotation_id": id}),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = api.get(&uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = api.get(&uri, Some(ada)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn iiif_import_stores_private_annotations() {
        let api = TestApi::new();
        let ada = api
            .storage
            .write(|conn| Ok(researcher(conn, "Ada", "Lovelace").id))
            .unwrap();
        let page = json!({
            "type": "AnnotationPage",
            "items": [
                {"type": "Annotation", "motivation": "oa:identifying", "body": "Mill owner"},
                {"type": "Choice", "body": "skipped"}
            ]
        });
        let (status, body) = api.post("/research/annotations/import/44", Some(ada), page).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["count"], 1);

        let (_, exported) = api.get("/research/annotations/object/44", None).await;
        assert!(exported["items"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn bad_motivation_is_rejected() {
        let api = TestApi::new();
        let (status, body) = api
            .post(
                "/research/annotation-v2/create",
                Some(1),
                json!({"motivation": "shouting", "body": "x"}),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }
}
