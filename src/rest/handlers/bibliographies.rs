//! Bibliographies, their entries, and reference-manager import and export.

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use crate::bibliography::{self, BibliographyUpdate, NewBibliography, NewEntry};
use crate::error::Result;
use crate::rest::extract::{Actor, ApiJson, ApiQuery};
use crate::rest::models::{ok, CitationRequest, ExportQuery, ImportRequest, ObjectRequest, ProjectFilter};
use crate::rest::{AppState, StorageBackend};
use crate::types::ExportFormat;

pub async fn list<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    ApiQuery(filter): ApiQuery<ProjectFilter>,
) -> Result<Json<Value>> {
    let found = state
        .storage
        .read(|conn| bibliography::list(conn, actor, filter.project_id))?;
    ok(json!({ "count": found.len(), "bibliographies": found }))
}

pub async fn create<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    ApiJson(data): ApiJson<NewBibliography>,
) -> Result<Json<Value>> {
    let created = state.storage.write(|conn| bibliography::create(conn, actor, &data))?;
    ok(json!({ "id": created.id, "bibliography": created }))
}

/// Owners see their own bibliographies; everyone sees public ones.
pub async fn get_one<S: StorageBackend>(
    State(state): State<AppState<S>>,
    viewer: Option<Actor>,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    let viewer = viewer.map(|Actor(id)| id);
    let (found, entries) = state.storage.read(|conn| {
        let found = bibliography::get_visible(conn, id, viewer)?;
        Ok((found, bibliography::entries(conn, id)?))
    })?;
    ok(json!({ "bibliography": found, "entries": entries }))
}

pub async fn shared<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Path(token): Path<String>,
) -> Result<Json<Value>> {
    let (found, entries) = state.storage.read(|conn| {
        let found = bibliography::by_share_token(conn, &token)?;
        let entries = bibliography::entries(conn, found.id)?;
        Ok((found, entries))
    })?;
    ok(json!({ "bibliography": found, "entries": entries }))
}

pub async fn update<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(id): Path<i64>,
    ApiJson(changes): ApiJson<BibliographyUpdate>,
) -> Result<Json<Value>> {
    let updated = state
        .storage
        .write(|conn| bibliography::update(conn, id, actor, &changes))?;
    ok(json!({ "bibliography": updated }))
}

pub async fn delete<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    state.storage.write(|conn| bibliography::delete(conn, id, actor))?;
    ok(json!({ "deleted": id }))
}

pub async fn add_entry<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(id): Path<i64>,
    ApiJson(data): ApiJson<NewEntry>,
) -> Result<Json<Value>> {
    let entry = state
        .storage
        .write(|conn| bibliography::add_entry(conn, id, actor, &data))?;
    ok(json!({ "id": entry.id, "entry": entry }))
}

pub async fn add_object<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<ObjectRequest>,
) -> Result<Json<Value>> {
    let base = state.config.base().to_string();
    let entry = state
        .storage
        .write(|conn| bibliography::add_entry_from_object(conn, id, actor, req.object_id, &base))?;
    ok(json!({ "id": entry.id, "entry": entry }))
}

pub async fn update_entry<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(id): Path<i64>,
    ApiJson(changes): ApiJson<NewEntry>,
) -> Result<Json<Value>> {
    let entry = state
        .storage
        .write(|conn| bibliography::update_entry(conn, id, actor, &changes))?;
    ok(json!({ "entry": entry }))
}

pub async fn remove_entry<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    state.storage.write(|conn| bibliography::remove_entry(conn, id, actor))?;
    ok(json!({ "deleted": id }))
}

fn extension(format: ExportFormat) -> &'static str {
    match format {
        ExportFormat::Ris => "ris",
        ExportFormat::Bibtex => "bib",
        ExportFormat::CslJson | ExportFormat::Mendeley => "json",
        ExportFormat::ZoteroRdf => "rdf",
    }
}

/// The bibliography as a reference-manager file; BibTeX unless `format` says otherwise.
pub async fn export<S: StorageBackend>(
    State(state): State<AppState<S>>,
    viewer: Option<Actor>,
    Path(id): Path<i64>,
    ApiQuery(query): ApiQuery<ExportQuery>,
) -> Result<Response> {
    let format = query.format.unwrap_or(ExportFormat::Bibtex);
    let viewer = viewer.map(|Actor(id)| id);
    let document = state.storage.read(|conn| {
        bibliography::get_visible(conn, id, viewer)?;
        bibliography::export(&bibliography::entries(conn, id)?, format)
    })?;
    let disposition = format!("attachment; filename=\"bibliography-{id}.{}\"", extension(format));
    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        document,
    )
        .into_response())
}

pub async fn import_bibtex<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<ImportRequest>,
) -> Result<Json<Value>> {
    let summary = state
        .storage
        .write(|conn| bibliography::import_bibtex(conn, id, actor, &req.content))?;
    ok(summary)
}

pub async fn import_ris<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<ImportRequest>,
) -> Result<Json<Value>> {
    let summary = state
        .storage
        .write(|conn| bibliography::import_ris(conn, id, actor, &req.content))?;
    ok(summary)
}

pub async fn import_citation<S: StorageBackend>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<CitationRequest>,
) -> Result<Json<Value>> {
    let entry = state
        .storage
        .write(|conn| bibliography::import_citation(conn, id, actor, &req.citation))?;
    ok(json!({ "id": entry.id, "entry": entry }))
}

#[cfg(test)]
mod tests {
    use crate::people::fixtures::researcher;
    use crate::rest::handlers::test_support::TestApi;
    use crate::storage::Storage;
    use axum::http::StatusCode;
    use serde_json::json;

    fn seeded() -> (TestApi, i64, i64) {
        let api = TestApi::new();
        let (ada, eve) = api
            .storage
            .write(|conn| Ok((researcher(conn, "Ada", "Lovelace").id, researcher(conn, "Eve", "Hacker").id)))
            .unwrap();
        (api, ada, eve)
    }

    async fn new_bibliography(api: &TestApi, owner: i64, name: &str) -> i64 {
        let (status, body) = api
            .post("/research/bibliographies", Some(owner), json!({ "name": name }))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["id"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn bibtex_export_imports_into_a_fresh_bibliography() {
        let (api, ada, _) = seeded();
        let source = new_bibliography(&api, ada, "Thesis sources").await;
        let (status, body) = api
            .post(
                &format!("/research/bibliographies/{source}/entries"),
                Some(ada),
                json!({
                    "entry_type": "book",
                    "title": "The Return of Martin Guerre",
                    "authors": "Davis, Natalie Zemon",
                    "date": "1983",
                    "publisher": "Harvard University Press"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");

        let (status, bibtex, content_type) = api
            .get_text(&format!("/research/bibliographies/{source}/export?format=bibtex"), Some(ada))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type, "application/x-bibtex");
        assert!(bibtex.starts_with("@book{entry"));

        let target = new_bibliography(&api, ada, "Copy").await;
        let (status, summary) = api
            .post(
                &format!("/research/bibliographies/{target}/import/bibtex"),
                Some(ada),
                json!({ "content": bibtex }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{summary}");
        assert_eq!(summary["imported"], 1);

        let (_, copy) = api.get(&format!("/research/bibliographies/{target}"), Some(ada)).await;
        let entry = &copy["entries"][0];
        assert_eq!(entry["entry_type"], "book");
        assert_eq!(entry["title"], "The Return of Martin Guerre");
        assert_eq!(entry["authors"], "Davis, Natalie Zemon");
        assert_eq!(entry["publisher"], "Harvard University Press");
    }

    #[tokio::test]
    async fn ris_export_imports_into_a_fresh_bibliography() {
        let (api, ada, _) = seeded();
        let source = new_bibliography(&api, ada, "Archives").await;
        api.post(
            &format!("/research/bibliographies/{source}/entries"),
            Some(ada),
            json!({
                "title": "Minutes of the Cape council",
                "archive_name": "Western Cape Archives",
                "box": "C 12",
                "folder": "4"
            }),
        )
        .await;

        let (status, ris, content_type) = api
            .get_text(&format!("/research/bibliographies/{source}/export?format=ris"), Some(ada))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type, "application/x-research-info-systems");

        let target = new_bibliography(&api, ada, "Copy").await;
        let (_, summary) = api
            .post(
                &format!("/research/bibliographies/{target}/import/ris"),
                Some(ada),
                json!({ "content": ris }),
            )
            .await;
        assert_eq!(summary["imported"], 1);
        let (_, copy) = api.get(&format!("/research/bibliographies/{target}"), Some(ada)).await;
        let entry = &copy["entries"][0];
        assert_eq!(entry["entry_type"], "archival");
        assert_eq!(entry["archive_name"], "Western Cape Archives");
        assert_eq!(entry["box"], "C 12");
        assert_eq!(entry["folder"], "4");
    }

    #[tokio::test]
    async fn private_bibliographies_stay_with_their_owner() {
        let (api, ada, eve) = seeded();
        let id = new_bibliography(&api, ada, "Private").await;
        let uri = format!("/research/bibliographies/{id}");

        assert_eq!(api.get(&uri, Some(ada)).await.0, StatusCode::OK);
        assert_eq!(api.get(&uri, Some(eve)).await.0, StatusCode::NOT_FOUND);
        assert_eq!(api.get(&uri, None).await.0, StatusCode::NOT_FOUND);
        assert_eq!(
            api.get_text(&format!("{uri}/export"), None).await.0,
            StatusCode::NOT_FOUND
        );
        let (status, _) = api
            .post(&format!("{uri}/entries"), Some(eve), json!({ "title": "Planted" }))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(api.post(&format!("{uri}/delete"), Some(eve), json!({})).await.0, StatusCode::FORBIDDEN);

        let (_, body) = api.get(&uri, Some(ada)).await;
        let token = body["bibliography"]["share_token"].as_str().unwrap().to_string();
        let (status, shared) = api.get(&format!("/research/bibliographies/shared/{token}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(shared["bibliography"]["id"], id);

        let (_, body) = api
            .post(&format!("{uri}/update"), Some(ada), json!({ "is_public": true }))
            .await;
        assert_eq!(body["bibliography"]["is_public"], true);
        assert_eq!(api.get(&uri, None).await.0, StatusCode::OK);

        assert_eq!(api.post(&format!("{uri}/delete"), Some(ada), json!({})).await.0, StatusCode::OK);
        assert_eq!(api.get(&uri, Some(ada)).await.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn csl_json_export_is_a_json_array() {
        let (api, ada, _) = seeded();
        let id = new_bibliography(&api, ada, "CSL").await;
        api.post(
            &format!("/research/bibliographies/{id}/import/citation"),
            Some(ada),
            json!({ "citation": "Bloch, M. \"Feudal Society.\" London, 1961." }),
        )
        .await;
        let (status, text, content_type) = api
            .get_text(&format!("/research/bibliographies/{id}/export?format=csl-json"), Some(ada))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type, "application/vnd.citationstyles.csl+json");
        let items: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(items[0]["title"], "Feudal Society.");
        assert_eq!(items[0]["issued"]["date-parts"][0][0], 1961);

        let (status, _) = api
            .get(&format!("/research/bibliographies/{id}/export?format=endnote"), Some(ada))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
