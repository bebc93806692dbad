use super::*;
use axum::{
    extract::Path,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use shared::{
    content::ReviewContent,
    domain::{CompanyId, DocumentType, EmployeeId, Role},
};
use tokio::net::TcpListener;

fn review(id: i64) -> ReviewRecord {
    ReviewRecord {
        id: ReviewId(id),
        company_id: CompanyId(1),
        employee_id: EmployeeId(2),
        document_type: DocumentType::SafeWorkProcedure,
        document_name: "Window Cleaning - Rope Access".into(),
        template_key: Some("window_cleaning".into()),
        file_url: None,
        viewed_at: None,
        signed_at: None,
        signature_data_url: None,
        created_at: Utc::now(),
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "Bearer tok-123")
}

fn unauthorized() -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(ApiError::new(ErrorCode::Unauthorized, "invalid or expired session")),
    )
}

async fn handle_login(Json(req): Json<LoginRequest>) -> Json<LoginResponse> {
    Json(LoginResponse {
        token: "tok-123".into(),
        employee: EmployeeSummary {
            id: EmployeeId(2),
            company_id: CompanyId(1),
            name: "Alice Rigger".into(),
            email: req.email,
            role: Role::Employee,
        },
    })
}

async fn handle_my_reviews(
    headers: HeaderMap,
) -> Result<Json<ReviewListResponse>, (StatusCode, Json<ApiError>)> {
    if !authorized(&headers) {
        return Err(unauthorized());
    }
    Ok(Json(ReviewListResponse {
        reviews: vec![review(1), review(2)],
    }))
}

async fn handle_acquire(
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<AcquireReviewResponse>, (StatusCode, Json<ApiError>)> {
    if !authorized(&headers) {
        return Err(unauthorized());
    }
    if id == 404 {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ApiError::new(
                ErrorCode::TemplateNotFound,
                "no safe_work_procedure template matches 'Abseil'",
            )),
        ));
    }
    if id == 405 {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ApiError::new(
                ErrorCode::NotFound,
                "template not found lookalike for a missing review",
            )),
        ));
    }
    let mut review = review(id);
    review.viewed_at = Some(Utc::now());
    Ok(Json(AcquireReviewResponse {
        review,
        content: ReviewContent::Procedure {
            job_type: "window_cleaning".into(),
        },
    }))
}

async fn handle_sign(
    Path(id): Path<i64>,
    Json(req): Json<SignReviewRequest>,
) -> Result<Json<ReviewResponse>, (StatusCode, &'static str)> {
    if id == 413 {
        return Err((StatusCode::PAYLOAD_TOO_LARGE, "length limit exceeded"));
    }
    let mut review = review(id);
    review.viewed_at = Some(Utc::now());
    review.signed_at = Some(Utc::now());
    review.signature_data_url = Some(req.signature_data_url);
    Ok(Json(ReviewResponse { review }))
}

async fn handle_conflict() -> (StatusCode, &'static str) {
    (StatusCode::CONFLICT, "plain text body")
}

async fn spawn_review_server() -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = Router::new()
        .route(LOGIN_ROUTE, post(handle_login))
        .route(MY_REVIEWS_ROUTE, get(handle_my_reviews))
        .route("/api/document-reviews/:id/acquire", post(handle_acquire))
        .route("/api/document-reviews/:id/sign", post(handle_sign))
        .route("/api/document-reviews/:id/view", post(handle_conflict));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}/")
}

#[tokio::test]
async fn login_stores_token_and_lists_reviews() {
    let server_url = spawn_review_server().await;
    let (client, employee) = HttpReviewClient::login(server_url, "alice@vertical.test")
        .await
        .expect("login");
    assert_eq!(client.token(), "tok-123");
    assert!(!client.server_url().ends_with('/'));
    assert_eq!(employee.email, "alice@vertical.test");

    let reviews = client.list_my_reviews().await.expect("reviews");
    assert_eq!(reviews.len(), 2);
}

#[tokio::test]
async fn wrong_token_surfaces_server_error_body() {
    let server_url = spawn_review_server().await;
    let client = HttpReviewClient::with_token(server_url, "stale");
    let err = client.list_my_reviews().await.expect_err("should fail");
    assert_eq!(err.api_code(), Some(ErrorCode::Unauthorized));
    assert_eq!(err.to_string(), "invalid or expired session");
}

#[tokio::test]
async fn acquire_returns_content_and_viewed_record() {
    let server_url = spawn_review_server().await;
    let client = HttpReviewClient::with_token(server_url, "tok-123");
    let acquired = client.acquire_review(ReviewId(5)).await.expect("acquire");
    assert!(acquired.review.has_been_viewed());
    assert_eq!(
        acquired.content.procedure().map(|p| p.title),
        Some("Window Cleaning - Rope Access")
    );
}

#[tokio::test]
async fn acquire_template_miss_is_recognised() {
    let server_url = spawn_review_server().await;
    let client = HttpReviewClient::with_token(server_url, "tok-123");
    let err = client
        .acquire_review(ReviewId(404))
        .await
        .expect_err("should fail");
    assert!(err.is_template_not_found());

    let err = client
        .acquire_review(ReviewId(405))
        .await
        .expect_err("should fail");
    assert_eq!(err.api_code(), Some(ErrorCode::NotFound));
    assert!(!err.is_template_not_found());
}

#[tokio::test]
async fn sign_posts_data_url() {
    let server_url = spawn_review_server().await;
    let client = HttpReviewClient::with_token(server_url, "tok-123");
    let signed = client
        .sign_review(ReviewId(3), "data:image/png;base64,iVBORw0KGgo=")
        .await
        .expect("sign");
    assert!(signed.is_signed());
    assert_eq!(
        signed.signature_data_url.as_deref(),
        Some("data:image/png;base64,iVBORw0KGgo=")
    );
}

#[tokio::test]
async fn non_json_error_body_maps_status_to_code() {
    let server_url = spawn_review_server().await;
    let client = HttpReviewClient::with_token(server_url, "tok-123");
    let err = client.mark_viewed(ReviewId(1)).await.expect_err("should fail");
    assert_eq!(err.api_code(), Some(ErrorCode::Conflict));
}

#[tokio::test]
async fn oversized_signature_status_maps_to_payload_too_large() {
    let server_url = spawn_review_server().await;
    let client = HttpReviewClient::with_token(server_url, "tok-123");
    let err = client
        .sign_review(ReviewId(413), "data:image/png;base64,iVBORw0KGgo=")
        .await
        .expect_err("should fail");
    assert_eq!(err.api_code(), Some(ErrorCode::PayloadTooLarge));
}
