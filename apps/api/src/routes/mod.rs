pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::applications::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/api/job-applications",
            get(handlers::handle_list).post(handlers::handle_create),
        )
        .route(
            "/api/job-applications/:id",
            get(handlers::handle_get)
                .patch(handlers::handle_update)
                .delete(handlers::handle_delete),
        )
        .route(
            "/api/job-applications/:id/notes",
            post(handlers::handle_add_note),
        )
        .route(
            "/api/job-applications/:id/communications",
            post(handlers::handle_add_communication),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    use crate::applications::service::ApplicationService;
    use crate::config::Config;
    use crate::db::RecordStore;

    fn app() -> (TempDir, Router) {
        let dir = TempDir::new().unwrap();
        let state = AppState {
            applications: ApplicationService::new(RecordStore::new(dir.path())),
            config: Config {
                data_dir: dir.path().display().to_string(),
                port: 0,
                rust_log: "debug".to_string(),
            },
        };
        (dir, build_router(state))
    }

    async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                builder = builder.header("content-type", "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let response = router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let (_dir, router) = app();
        let (status, body) = send(&router, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_create_returns_201_in_researched() {
        let (_dir, router) = app();
        let (status, body) = send(
            &router,
            Method::POST,
            "/api/job-applications",
            Some(json!({"title": "SWE", "company": "Acme", "stage": "offer"})),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["stage"], "researched");
        assert_eq!(body["stageHistory"].as_array().unwrap().len(), 1);
        assert_eq!(body["stageHistory"][0]["fromStage"], Value::Null);
        assert_eq!(body["priority"], "medium");
        assert_eq!(body["source"], "Manual Entry");
    }

    #[tokio::test]
    async fn test_create_missing_title_is_400() {
        let (_dir, router) = app();
        let (status, body) = send(
            &router,
            Method::POST,
            "/api/job-applications",
            Some(json!({"company": "Acme"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_create_accepts_date_only_deadline() {
        let (_dir, router) = app();
        let (status, body) = send(
            &router,
            Method::POST,
            "/api/job-applications",
            Some(json!({
                "title": "SWE",
                "company": "Acme",
                "applicationDeadline": "2024-06-30"
            })),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["applicationDeadline"], "2024-06-30T00:00:00Z");
    }

    #[tokio::test]
    async fn test_malformed_body_is_400_with_envelope() {
        let (_dir, router) = app();
        let (status, body) = send(
            &router,
            Method::POST,
            "/api/job-applications",
            Some(json!({"title": 123, "company": "Acme"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert!(body["error"]["message"].as_str().unwrap().contains("title"));

        let (_, created) = send(
            &router,
            Method::POST,
            "/api/job-applications",
            Some(json!({"title": "SWE", "company": "Acme"})),
        )
        .await;
        let uri = format!("/api/job-applications/{}", created["id"].as_str().unwrap());
        let (status, body) = send(
            &router,
            Method::PATCH,
            &uri,
            Some(json!({"applicationDeadline": "someday"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_patch_stage_then_list_by_stage() {
        let (_dir, router) = app();
        let (_, created) = send(
            &router,
            Method::POST,
            "/api/job-applications",
            Some(json!({"title": "SWE", "company": "Acme"})),
        )
        .await;
        send(
            &router,
            Method::POST,
            "/api/job-applications",
            Some(json!({"title": "PM", "company": "Globex"})),
        )
        .await;
        let id = created["id"].as_str().unwrap();

        let (status, updated) = send(
            &router,
            Method::PATCH,
            &format!("/api/job-applications/{id}"),
            Some(json!({"stage": "applied"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["stageHistory"][1]["fromStage"], "researched");
        assert_eq!(updated["stageHistory"][1]["toStage"], "applied");

        let (status, list) = send(
            &router,
            Method::GET,
            "/api/job-applications?stage=applied",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list["total"], 1);
        assert_eq!(list["page"], 1);
        assert_eq!(list["limit"], 50);
        assert_eq!(list["data"][0]["id"], id);
    }

    #[tokio::test]
    async fn test_patch_invalid_stage_is_400_and_unknown_id_is_404() {
        let (_dir, router) = app();
        let (_, created) = send(
            &router,
            Method::POST,
            "/api/job-applications",
            Some(json!({"title": "SWE", "company": "Acme"})),
        )
        .await;
        let id = created["id"].as_str().unwrap();

        let (status, _) = send(
            &router,
            Method::PATCH,
            &format!("/api/job-applications/{id}"),
            Some(json!({"stage": "not_a_stage"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &router,
            Method::PATCH,
            "/api/job-applications/job_nope",
            Some(json!({"stage": "applied"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_notes_communications_and_delete() {
        let (_dir, router) = app();
        let (_, created) = send(
            &router,
            Method::POST,
            "/api/job-applications",
            Some(json!({"title": "SWE", "company": "Acme"})),
        )
        .await;
        let id = created["id"].as_str().unwrap();

        let (status, _) = send(
            &router,
            Method::POST,
            &format!("/api/job-applications/{id}/notes"),
            Some(json!({"content": ""})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, note) = send(
            &router,
            Method::POST,
            &format!("/api/job-applications/{id}/notes"),
            Some(json!({"content": "Ask about on-call", "type": "interview"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(note["type"], "interview");

        let (status, comm) = send(
            &router,
            Method::POST,
            &format!("/api/job-applications/{id}/communications"),
            Some(json!({
                "type": "meeting",
                "direction": "outbound",
                "content": "Coffee chat",
                "contactPerson": "Riley"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(comm["contactPerson"], "Riley");

        let (status, body) = send(
            &router,
            Method::DELETE,
            &format!("/api/job-applications/{id}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["deletedJobApplication"]["notes"].as_array().unwrap().len(), 1);

        let (status, _) = send(
            &router,
            Method::GET,
            &format!("/api/job-applications/{id}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &router,
            Method::POST,
            &format!("/api/job-applications/{id}/notes"),
            Some(json!({"content": "late note"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
