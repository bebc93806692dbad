use super::*;
use axum::{body, body::Body, http::Request};
use serde_json::{json, Value};
use shared::domain::{DocumentType, Role};
use storage::NewReview;
use tower::ServiceExt;

const TINY_PNG: &str = "data:image/png;base64,iVBORw0KGgo=";

struct TestApp {
    app: Router,
    state: Arc<AppState>,
    manager_token: String,
    worker_token: String,
    other_token: String,
    review_id: i64,
}

async fn test_app_with_limit(max_signature_bytes: usize) -> TestApp {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let company = storage.create_company("Vertical Access Ltd").await.expect("company");
    let manager = storage
        .create_employee(company, "Morgan Lead", "morgan@vertical.test", Role::Manager)
        .await
        .expect("manager");
    let worker = storage
        .create_employee(company, "Alice Rigger", "alice@vertical.test", Role::Employee)
        .await
        .expect("worker");
    let other = storage
        .create_employee(company, "Bo Rigger", "bo@vertical.test", Role::Employee)
        .await
        .expect("other");
    let review = storage
        .assign_review(&NewReview {
            company_id: company,
            employee_id: worker,
            document_type: DocumentType::SafeWorkProcedure,
            document_name: "Window Cleaning - Rope Access".into(),
            file_url: None,
            template_key: Some("window_cleaning".into()),
        })
        .await
        .expect("review");

    let sessions = SessionConfig {
        secret: "test-secret".into(),
        ttl_seconds: 60,
    };
    let token_for = |id| {
        let caller_summary = shared::domain::EmployeeSummary {
            id,
            company_id: company,
            name: String::new(),
            email: String::new(),
            role: if id == manager {
                Role::Manager
            } else {
                Role::Employee
            },
        };
        mint_session_token(&sessions, &caller_summary).expect("token")
    };
    let manager_token = token_for(manager);
    let worker_token = token_for(worker);
    let other_token = token_for(other);

    let (events, _) = broadcast::channel(32);
    let state = Arc::new(AppState {
        api: ApiContext {
            storage,
            max_signature_bytes,
        },
        sessions,
        events,
    });
    TestApp {
        app: build_router(state.clone()),
        state,
        manager_token,
        worker_token,
        other_token,
        review_id: review.id.0,
    }
}

async fn test_app() -> TestApp {
    test_app_with_limit(server_api::DEFAULT_MAX_SIGNATURE_BYTES).await
}

fn authed(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"));
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn healthz_reports_ok() {
    let t = test_app().await;
    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn login_issues_token_accepted_by_protected_routes() {
    let t = test_app().await;
    let (status, body) = send(
        &t.app,
        Request::builder()
            .method("POST")
            .uri(LOGIN_ROUTE)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "email": "Alice@Vertical.test" }).to_string()))
            .expect("request"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["employee"]["name"], "Alice Rigger");
    let token = body["token"].as_str().expect("token").to_string();

    let (status, body) = send(&t.app, authed("GET", MY_REVIEWS_ROUTE, &token, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reviews"].as_array().expect("reviews").len(), 1);
}

#[tokio::test]
async fn login_with_unknown_email_is_unauthorized() {
    let t = test_app().await;
    let (status, body) = send(
        &t.app,
        Request::builder()
            .method("POST")
            .uri(LOGIN_ROUTE)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "email": "ghost@vertical.test" }).to_string()))
            .expect("request"),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");
}

#[tokio::test]
async fn protected_route_requires_bearer_token() {
    let t = test_app().await;
    let (status, _) = send(
        &t.app,
        Request::builder()
            .uri(MY_REVIEWS_ROUTE)
            .body(Body::empty())
            .expect("request"),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&t.app, authed("GET", MY_REVIEWS_ROUTE, "garbage", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn sign_before_view_is_rejected_then_acquire_enables_signing() {
    let t = test_app().await;
    let sign_uri = format!("/api/document-reviews/{}/sign", t.review_id);
    let acquire_uri = format!("/api/document-reviews/{}/acquire", t.review_id);
    let signature = json!({ "signatureDataUrl": TINY_PNG });

    let (status, _) = send(
        &t.app,
        authed("POST", &sign_uri, &t.worker_token, Some(signature.clone())),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&t.app, authed("POST", &acquire_uri, &t.worker_token, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"]["kind"], "procedure");
    assert_eq!(body["content"]["jobType"], "window_cleaning");
    assert!(body["review"]["viewedAt"].is_string());

    let (status, body) = send(
        &t.app,
        authed("POST", &sign_uri, &t.worker_token, Some(signature.clone())),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["review"]["signatureDataUrl"], TINY_PNG);
    assert!(body["review"]["signedAt"].is_string());

    let (status, body) = send(
        &t.app,
        authed("POST", &sign_uri, &t.worker_token, Some(signature)),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");
}

#[tokio::test]
async fn signing_broadcasts_signed_and_invalidation_events() {
    let t = test_app().await;
    let mut events = t.state.events.subscribe();
    let view_uri = format!("/api/document-reviews/{}/view", t.review_id);
    let sign_uri = format!("/api/document-reviews/{}/sign", t.review_id);

    let (status, _) = send(&t.app, authed("POST", &view_uri, &t.worker_token, None)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
        &t.app,
        authed(
            "POST",
            &sign_uri,
            &t.worker_token,
            Some(json!({ "signatureDataUrl": TINY_PNG })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    assert!(matches!(
        events.recv().await.expect("viewed"),
        shared::protocol::ServerEvent::ReviewViewed { .. }
    ));
    assert!(matches!(
        events.recv().await.expect("signed"),
        shared::protocol::ServerEvent::ReviewSigned { .. }
    ));
    assert!(matches!(
        events.recv().await.expect("invalidated"),
        shared::protocol::ServerEvent::ComplianceScoreInvalidated { .. }
    ));
}

#[tokio::test]
async fn non_png_signature_is_bad_request() {
    let t = test_app().await;
    let view_uri = format!("/api/document-reviews/{}/view", t.review_id);
    let sign_uri = format!("/api/document-reviews/{}/sign", t.review_id);
    send(&t.app, authed("POST", &view_uri, &t.worker_token, None)).await;

    let (status, body) = send(
        &t.app,
        authed(
            "POST",
            &sign_uri,
            &t.worker_token,
            Some(json!({ "signatureDataUrl": "data:image/jpeg;base64,AAAA" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation");
}

#[tokio::test]
async fn oversized_signature_is_payload_too_large() {
    let t = test_app_with_limit(8).await;
    let view_uri = format!("/api/document-reviews/{}/view", t.review_id);
    let sign_uri = format!("/api/document-reviews/{}/sign", t.review_id);
    send(&t.app, authed("POST", &view_uri, &t.worker_token, None)).await;

    let big = format!("{SIGNATURE_PREFIX}{}", "QUFB".repeat(16));
    let (status, body) = send(
        &t.app,
        authed(
            "POST",
            &sign_uri,
            &t.worker_token,
            Some(json!({ "signatureDataUrl": big })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["code"], "payload_too_large");
}

#[tokio::test]
async fn malformed_bodies_use_the_error_shape() {
    let t = test_app().await;
    let sign_uri = format!("/api/document-reviews/{}/sign", t.review_id);

    let (status, body) = send(
        &t.app,
        authed("POST", &sign_uri, &t.worker_token, Some(json!({}))),
    )
    .await;
    assert!(status.is_client_error());
    assert_eq!(body["code"], "validation");
    assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));

    let request = Request::builder()
        .method("POST")
        .uri(LOGIN_ROUTE)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"email\":"))
        .expect("request");
    let (status, body) = send(&t.app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation");

    let request = Request::builder()
        .method("POST")
        .uri(LOGIN_ROUTE)
        .body(Body::from("{\"email\":\"alice@vertical.test\"}"))
        .expect("request");
    let (status, body) = send(&t.app, request).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["code"], "validation");
}

const SIGNATURE_PREFIX: &str = shared::protocol::SIGNATURE_DATA_URL_PREFIX;

#[tokio::test]
async fn other_employee_cannot_acquire_review() {
    let t = test_app().await;
    let acquire_uri = format!("/api/document-reviews/{}/acquire", t.review_id);
    let (status, body) = send(&t.app, authed("POST", &acquire_uri, &t.other_token, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn pending_check_reports_unsigned_reviews() {
    let t = test_app().await;
    let (status, body) = send(
        &t.app,
        authed("GET", PENDING_CHECK_ROUTE, &t.worker_token, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["hasPending"], true);
    assert_eq!(body["pendingCount"], 1);

    let (_, body) = send(
        &t.app,
        authed("GET", PENDING_CHECK_ROUTE, &t.other_token, None),
    )
    .await;
    assert_eq!(body["hasPending"], false);
}

#[tokio::test]
async fn manager_routes_are_forbidden_to_employees() {
    let t = test_app().await;
    for uri in [ALL_REVIEWS_ROUTE, CSR_ROUTE, COMPANY_SAFETY_RATING_ROUTE] {
        let (status, _) = send(&t.app, authed("GET", uri, &t.worker_token, None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
    }
}

#[tokio::test]
async fn manager_assigns_review_and_sees_rating() {
    let t = test_app().await;
    let (_, login) = send(
        &t.app,
        Request::builder()
            .method("POST")
            .uri(LOGIN_ROUTE)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "email": "bo@vertical.test" }).to_string()))
            .expect("request"),
    )
    .await;
    let bo_id = login["employee"]["id"].clone();

    let (status, body) = send(
        &t.app,
        authed(
            "POST",
            ALL_REVIEWS_ROUTE,
            &t.manager_token,
            Some(json!({
                "employeeId": bo_id,
                "documentType": "company_policy",
                "documentName": "Drug and Alcohol Policy",
                "fileUrl": "https://docs.vertical.test/policy.pdf"
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["review"]["documentType"], "company_policy");

    let (status, body) = send(
        &t.app,
        authed("GET", ALL_REVIEWS_ROUTE, &t.manager_token, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reviews"].as_array().expect("reviews").len(), 2);

    let (status, body) = send(
        &t.app,
        authed("GET", COMPANY_SAFETY_RATING_ROUTE, &t.manager_token, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["documentsTotal"], 2);
    assert_eq!(body["documentsSigned"], 0);
    assert_eq!(body["band"], "poor");

    let (status, body) = send(&t.app, authed("GET", CSR_ROUTE, &t.manager_token, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().expect("entries").len() >= 2);
}

#[tokio::test]
async fn ws_rejects_invalid_token_before_upgrade() {
    let t = test_app().await;
    let (status, _) = send(
        &t.app,
        Request::builder()
            .uri("/ws?token=nope")
            .header(header::CONNECTION, "upgrade")
            .header(header::UPGRADE, "websocket")
            .header("sec-websocket-version", "13")
            .header("sec-websocket-key", "dGhlIHNhbXBsZSBub25jZQ==")
            .body(Body::empty())
            .expect("request"),
    )
    .await;
    // Without a hyper upgrade handle the extractor itself may reject first.
    assert!(status.is_client_error());
}
