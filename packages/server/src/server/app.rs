//! Application setup and server configuration.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{header::CONTENT_TYPE, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::domains::auth::SessionManager;
use crate::server::routes::{
    begin_login_handler, cancel_login_handler, get_login_handler, health_handler,
    import_session_handler, list_sessions_handler, message_handler, relay_code_handler,
    submit_code_handler, submit_password_handler,
};

/// Shared application state
#[derive(Clone)]
pub struct AxumAppState {
    pub manager: Arc<SessionManager>,
}

/// Build the Axum application router
pub fn build_app(manager: Arc<SessionManager>) -> Router {
    let app_state = AxumAppState { manager };

    // CORS configuration - allow any origin, the edge carries no cookies
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_handler))
        .route("/logins", post(begin_login_handler))
        .route(
            "/logins/:user_id",
            get(get_login_handler).delete(cancel_login_handler),
        )
        .route("/logins/:user_id/code", post(submit_code_handler))
        .route("/logins/:user_id/password", post(submit_password_handler))
        .route(
            "/sessions/:user_id",
            get(list_sessions_handler).post(import_session_handler),
        )
        .route(
            "/sessions/:user_id/:session_id/code",
            post(relay_code_handler),
        )
        .route("/messages", post(message_handler))
        .layer(Extension(app_state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::common::UserId;
    use crate::domains::auth::LoginFailure;
    use crate::kernel::test_dependencies::{MockLoginTransport, TEST_OWNER};
    use crate::kernel::TestDependencies;

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn owner_uri(path: &str) -> String {
        format!("/logins/{}{}", TEST_OWNER, path)
    }

    #[tokio::test]
    async fn test_health() {
        let app = build_app(TestDependencies::new().manager());
        let (status, body) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["active_attempts"], 0);
    }

    #[tokio::test]
    async fn test_full_login_over_http() {
        let deps = TestDependencies::new();
        let app = build_app(deps.manager());

        let (status, body) = send(
            &app,
            Method::POST,
            "/logins",
            Some(json!({ "user_id": TEST_OWNER.get(), "phone_number": "+15551234567" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "code_sent");
        assert_eq!(body["attempt"]["state"]["state"], "awaiting_code");

        let (status, body) = send(&app, Method::GET, &owner_uri(""), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["phone_number"], "+155******67");

        let (status, body) = send(
            &app,
            Method::POST,
            &owner_uri("/code"),
            Some(json!({ "code": "12345" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "completed");
        assert_eq!(body["session"]["id"], "1");
        assert!(body["session"].get("session_string").is_none());

        let uri = format!("/sessions/{}", TEST_OWNER);
        let (status, body) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sessions"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_error_status_codes() {
        let deps = TestDependencies::new();
        let app = build_app(deps.manager());

        // Malformed phone
        let (status, body) = send(
            &app,
            Method::POST,
            "/logins",
            Some(json!({ "user_id": TEST_OWNER.get(), "phone_number": "555123" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "validation_failed");

        // Nothing to cancel
        let (status, body) = send(&app, Method::DELETE, &owner_uri(""), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "no_active_attempt");

        // Second begin while the first is live
        let begin = json!({ "user_id": TEST_OWNER.get(), "phone_number": "+15551234567" });
        send(&app, Method::POST, "/logins", Some(begin.clone())).await;
        let (status, _) = send(&app, Method::POST, "/logins", Some(begin)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        // Password while a code is awaited
        let (status, body) = send(
            &app,
            Method::POST,
            &owner_uri("/password"),
            Some(json!({ "password": "hunter2" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "unexpected_input");

        // Stranger
        let (status, _) = send(&app, Method::GET, "/sessions/77", None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(deps.notifier.messages_for(UserId::new(77)).is_empty());
    }

    #[tokio::test]
    async fn test_code_relay_over_http() {
        let deps = TestDependencies::new();
        let app = build_app(deps.manager());

        let uri = format!("/sessions/{}/9/code", TEST_OWNER);
        let (status, body) = send(&app, Method::POST, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "session_not_found");

        let uri = format!("/sessions/{}", TEST_OWNER);
        send(
            &app,
            Method::POST,
            &uri,
            Some(json!({ "session": "1BVtsOK4Bu-stored" })),
        )
        .await;

        let uri = format!("/sessions/{}/1/code", TEST_OWNER);
        let (status, body) = send(&app, Method::POST, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "code_relayed");
        assert_eq!(body["code"], "24680");
        assert_eq!(deps.transport.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_transport_failure_is_a_normal_outcome() {
        let deps = TestDependencies::new().mock_transport(
            MockLoginTransport::new()
                .with_request_results(vec![Err(LoginFailure::InvalidPhoneNumber)]),
        );
        let app = build_app(deps.manager());

        let (status, body) = send(
            &app,
            Method::POST,
            "/logins",
            Some(json!({ "user_id": TEST_OWNER.get(), "phone_number": "+15551234567" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "failed");
        assert_eq!(body["failure"]["reason"], "invalid_phone_number");
    }

    #[tokio::test]
    async fn test_message_endpoint_classifies_text() {
        let deps = TestDependencies::new();
        let app = build_app(deps.manager());

        let (status, body) = send(
            &app,
            Method::POST,
            "/messages",
            Some(json!({ "user_id": TEST_OWNER.get(), "text": "/start" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "help");

        let (status, body) = send(
            &app,
            Method::POST,
            "/messages",
            Some(json!({ "user_id": TEST_OWNER.get(), "text": "+15551234567" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "code_sent");
    }
}
