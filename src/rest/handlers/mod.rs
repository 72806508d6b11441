use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use super::{models::HealthResponse, AppState, StorageBackend};
use crate::error::ResearchError;

pub mod annotations;
pub mod assertions;
pub mod bibliographies;
pub mod favorites;
pub mod reading_room;
pub mod reproductions;
pub mod resolution;
pub mod retrieval;
pub mod rights;
pub mod snapshots;
pub mod validation;
pub mod workspace;

pub async fn health<S: StorageBackend>(State(state): State<AppState<S>>) -> impl IntoResponse {
    let uptime_secs = state.started_at.elapsed().map(|d| d.as_secs()).unwrap_or(0);
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
            uptime_secs,
        }),
    )
}

pub async fn not_found() -> ResearchError {
    ResearchError::not_found("route")
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tempfile::TempDir;
    use tower::ServiceExt;

    use crate::rest::{router, ApiConfig, API_KEY_HEADER, RESEARCHER_HEADER};
    use crate::storage::SqliteStorage;

    pub struct TestApi {
        pub app: Router,
        pub storage: SqliteStorage,
        _dir: TempDir,
    }

    impl TestApi {
        pub fn new() -> Self {
            Self::with_token(None)
        }

        pub fn with_token(token: Option<&str>) -> Self {
            let dir = TempDir::new().unwrap();
            let storage = SqliteStorage::new(dir.path().join("research.sqlite"));
            storage.init().unwrap();
            let config = ApiConfig {
                api_token: token.map(str::to_string),
                base_uri: "https://archive.test".parse().unwrap(),
                snapshot_key: "test-key".into(),
            };
            Self {
                app: router(storage.clone(), config),
                storage,
                _dir: dir,
            }
        }

        pub async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
            let response = self.app.clone().oneshot(req).await.unwrap();
            let status = response.status();
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            (status, body)
        }

        pub async fn get(&self, uri: &str, actor: Option<i64>) -> (StatusCode, Value) {
            let mut builder = Request::builder().uri(uri);
            if let Some(id) = actor {
                builder = builder.header(RESEARCHER_HEADER, id.to_string());
            }
            self.send(builder.body(Body::empty()).unwrap()).await
        }

        pub async fn post(&self, uri: &str, actor: Option<i64>, body: Value) -> (StatusCode, Value) {
            let mut builder = Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json");
            if let Some(id) = actor {
                builder = builder.header(RESEARCHER_HEADER, id.to_string());
            }
            self.send(builder.body(Body::from(body.to_string())).unwrap())
                .await
        }

        /// Body as text with its content type, for non-JSON documents.
        pub async fn get_text(&self, uri: &str, actor: Option<i64>) -> (StatusCode, String, String) {
            let mut builder = Request::builder().uri(uri);
            if let Some(id) = actor {
                builder = builder.header(RESEARCHER_HEADER, id.to_string());
            }
            let response = self
                .app
                .clone()
                .oneshot(builder.body(Body::empty()).unwrap())
                .await
                .unwrap();
            let status = response.status();
            let content_type = response
                .headers()
                .get("content-type")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            (status, String::from_utf8(bytes.to_vec()).unwrap(), content_type)
        }

        pub async fn get_with_key(&self, uri: &str, key: &str) -> (StatusCode, Value) {
            let req = Request::builder()
                .uri(uri)
                .header(API_KEY_HEADER, key)
                .body(Body::empty())
                .unwrap();
            self.send(req).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::TestApi;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn health_reports_ok() {
        let api = TestApi::new();
        let (status, body) = api.get("/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn unknown_route_uses_error_envelope() {
        let api = TestApi::new();
        let (status, body) = api.get("/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn token_guards_everything_but_health() {
        let api = TestApi::with_token(Some("s3cret"));
        assert_eq!(api.get("/health", None).await.0, StatusCode::OK);
        assert_eq!(api.get("/research/rooms", None).await.0, StatusCode::UNAUTHORIZED);
        assert_eq!(api.get_with_key("/research/rooms", "s3cret").await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_actor_is_unauthorized() {
        let api = TestApi::new();
        let (status, body) = api.get("/research/dashboard", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "unauthorized");
    }
}
