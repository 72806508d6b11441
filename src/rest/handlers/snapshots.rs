//! Evidence collections, frozen snapshots and saved searches.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use crate::error::{ResearchError, Result};
use crate::rest::extract::{Actor, ApiJson};
use crate::rest::models::{ok, FreezeRequest, SnapshotRequest};
use crate::rest::{AppState, StorageBackend};
use crate::saved_search::{self, NewSavedSearch};
use crate::snapshot::{self, NewCollection, NewCollectionItem};

pub async fn create_collection<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    ApiJson(data): ApiJson<NewCollection>,
) -> Result<Json<Value>> {
    let collection = state
        .storage
        .write(|conn| snapshot::create_collection(conn, actor, &data))?;
    ok(json!({ "id": collection.id, "collection": collection }))
}

pub async fn get_collection<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    let (collection, items) = state.storage.read(|conn| {
        Ok((
            snapshot::load_collection(conn, id)?,
            snapshot::collection_items(conn, id)?,
        ))
    })?;
    ok(json!({ "collection": collection, "items": items }))
}

pub async fn add_item<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(id): Path<i64>,
    ApiJson(item): ApiJson<NewCollectionItem>,
) -> Result<Json<Value>> {
    let added = state
        .storage
        .write(|conn| snapshot::add_item(conn, id, actor, &item))?;
    ok(json!({ "item": added }))
}

/// Freezes a collection into the given project, or the collection's own
/// project when none is named.
pub async fn freeze<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<FreezeRequest>,
) -> Result<Json<Value>> {
    let key = state.config.snapshot_key.clone();
    let frozen = state.storage.write(|conn| {
        let project_id = match req.project_id {
            Some(project_id) => project_id,
            None => snapshot::load_collection(conn, id)?
                .project_id
                .ok_or_else(|| ResearchError::invalid("project_id is required"))?,
        };
        snapshot::freeze_collection(conn, project_id, id, actor, &key)
    })?;
    ok(json!({ "snapshot": frozen }))
}

pub async fn create<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    ApiJson(req): ApiJson<SnapshotRequest>,
) -> Result<Json<Value>> {
    let created = state
        .storage
        .write(|conn| snapshot::create(conn, req.project_id, actor, &req.snapshot))?;
    ok(json!({ "id": created.id, "snapshot": created }))
}

pub async fn get_one<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    let (found, items) = state
        .storage
        .read(|conn| Ok((snapshot::get(conn, id)?, snapshot::items(conn, id)?)))?;
    ok(json!({ "snapshot": found, "items": items }))
}

pub async fn for_project<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    let found = state.storage.read(|conn| snapshot::list_for_project(conn, id))?;
    ok(json!({ "count": found.len(), "snapshots": found }))
}

pub async fn verify<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    let result = state
        .storage
        .read(|conn| snapshot::verify(conn, id, &state.config.snapshot_key))?;
    ok(result)
}

pub async fn citation<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    let citation_id = state
        .storage
        .write(|conn| snapshot::citation(conn, id, &state.config.snapshot_key))?;
    ok(json!({ "citation_id": citation_id }))
}

pub async fn compare<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Path((a, b)): Path<(i64, i64)>,
) -> Result<Json<Value>> {
    let diff = state.storage.write(|conn| snapshot::compare(conn, a, b))?;
    ok(diff)
}

pub async fn archive<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    let archived = state.storage.write(|conn| snapshot::archive(conn, id, actor))?;
    ok(json!({ "snapshot": archived }))
}

pub async fn delete<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    state.storage.write(|conn| snapshot::delete(conn, id, actor))?;
    ok(json!({ "deleted": id }))
}

pub async fn list_searches<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
) -> Result<Json<Value>> {
    let searches = state.storage.read(|conn| saved_search::list(conn, actor))?;
    ok(json!({ "searches": searches }))
}

pub async fn save_search<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    ApiJson(data): ApiJson<NewSavedSearch>,
) -> Result<Json<Value>> {
    let saved = state.storage.write(|conn| saved_search::create(conn, actor, &data))?;
    ok(json!({ "search": saved }))
}

pub async fn delete_search<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    state.storage.write(|conn| saved_search::delete(conn, id, actor))?;
    ok(json!({ "deleted": id }))
}

pub async fn search_snapshot<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    let taken = state.storage.write(|conn| saved_search::snapshot(conn, id))?;
    ok(json!({ "snapshot": taken }))
}

pub async fn search_diff<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    let diff = state.storage.write(|conn| saved_search::diff(conn, id))?;
    ok(diff)
}

#[cfg(test)]
mod tests {
    use crate::catalogue::{self, EntityInput};
    use crate::people::fixtures::{project, researcher};
    use crate::rest::handlers::test_support::TestApi;
    use crate::storage::Storage;
    use axum::http::StatusCode;
    use serde_json::json;

    fn seeded() -> (TestApi, i64, i64) {
        let api = TestApi::new();
        let (me, project_id) = api
            .storage
            .write(|conn| {
                let me = researcher(conn, "Arlette", "Farge");
                let p = project(conn, me.id, "Police archives");
                for (id, label) in [(1, "Register of arrests"), (2, "Letters of cachet")] {
                    catalogue::upsert(
                        conn,
                        &EntityInput {
                            entity_type: "information_object".into(),
                            entity_id: id,
                            label: label.into(),
                            description: None,
                            repository_id: None,
                        },
                    )?;
                }
                Ok((me.id, p.id))
            })
            .unwrap();
        (api, me, project_id)
    }

    #[tokio::test]
    async fn frozen_collection_verifies_and_cites() {
        let (api, me, project_id) = seeded();
        let (_, body) = api
            .post(
                "/research/collections",
                Some(me),
                json!({"name": "Arrests", "project_id": project_id}),
            )
            .await;
        let collection = body["id"].as_i64().unwrap();
        for object_id in [1, 2] {
            let (status, body) = api
                .post(
                    &format!("/research/collections/{collection}/items"),
                    Some(me),
                    json!({"object_id": object_id}),
                )
                .await;
            assert_eq!(status, StatusCode::OK, "{body}");
        }
        let (status, _) = api
            .post(
                &format!("/research/collections/{collection}/items"),
                Some(me + 1),
                json!({"object_id": 3}),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = api
            .post(&format!("/research/collections/{collection}/freeze"), Some(me), json!({}))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let snap = body["snapshot"]["id"].as_i64().unwrap();
        assert_eq!(body["snapshot"]["item_count"], 2);
        assert_eq!(body["snapshot"]["status"], "frozen");

        let (_, verified) = api.get(&format!("/research/snapshots/{snap}/verify"), None).await;
        assert_eq!(verified["valid"], true);

        let (_, cited) = api.get(&format!("/research/snapshots/{snap}/citation"), None).await;
        let citation = cited["citation_id"].as_str().unwrap();
        assert!(citation.starts_with(&format!("SNAP-{project_id}-{snap}-")));

        let (status, _) = api
            .post(&format!("/research/snapshots/{snap}/delete"), Some(me), json!({}))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn only_the_owner_archives_or_deletes_a_snapshot() {
        let (api, me, project_id) = seeded();
        let eve = api
            .storage
            .write(|conn| Ok(researcher(conn, "Eve", "Moneypenny").id))
            .unwrap();
        let (status, body) = api
            .post(
                "/research/snapshots",
                Some(me),
                json!({"project_id": project_id, "title": "Working set"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let snap = body["id"].as_i64().unwrap();

        for action in ["archive", "delete"] {
            let (status, _) = api
                .post(&format!("/research/snapshots/{snap}/{action}"), Some(eve), json!({}))
                .await;
            assert_eq!(status, StatusCode::FORBIDDEN, "{action}");
        }
        let (status, _) = api.get(&format!("/research/snapshots/{snap}"), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = api
            .post(&format!("/research/snapshots/{snap}/delete"), Some(me), json!({}))
            .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = api.get(&format!("/research/snapshots/{snap}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn saved_search_diff_tracks_new_results() {
        let (api, me, _) = seeded();
        let (status, body) = api
            .post(
                "/research/saved-searches",
                Some(me),
                json!({"name": "letters", "search_query": "Letters"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let id = body["search"]["id"].as_i64().unwrap();

        let (_, taken) = api
            .post(&format!("/research/search-snapshot/{id}"), Some(me), json!({}))
            .await;
        assert_eq!(taken["snapshot"]["result_count"], 1);

        api.storage
            .write(|conn| {
                catalogue::upsert(
                    conn,
                    &EntityInput {
                        entity_type: "information_object".into(),
                        entity_id: 3,
                        label: "Letters patent".into(),
                        description: None,
                        repository_id: None,
                    },
                )
            })
            .unwrap();
        let (_, diff) = api.post(&format!("/research/search-diff/{id}"), Some(me), json!({})).await;
        assert_eq!(diff["added"], json!([3]));
        assert_eq!(diff["unchanged_count"], 1);

        let (_, listed) = api.get("/research/saved-searches", Some(me)).await;
        assert_eq!(listed["searches"].as_array().unwrap().len(), 1);
    }
}
