use std::{net::SocketAddr, sync::Arc};

use axum::{
    async_trait,
    extract::{
        rejection::JsonRejection, FromRequest, FromRequestParts, Path, Query, Request, State,
        WebSocketUpgrade,
    },
    http::{header, request::Parts, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{de::DeserializeOwned, Deserialize};
use server_api::{
    acquire_review, assign_review, company_safety_rating, csr_summary,
    list_company_reviews, list_my_reviews, login, mark_viewed, pending_check, sign_review,
    ApiContext, Caller,
};
use shared::{
    domain::ReviewId,
    error::{ApiError, ErrorCode},
    protocol::{
        AcquireReviewResponse, AssignReviewRequest, CompanySafetyRating, CsrEntry, LoginRequest,
        LoginResponse, PendingCheckResponse, ReviewListResponse, ReviewResponse,
        SignReviewRequest, ALL_REVIEWS_ROUTE, COMPANY_SAFETY_RATING_ROUTE, CSR_ROUTE,
        LOGIN_ROUTE, MY_REVIEWS_ROUTE, PENDING_CHECK_ROUTE,
    },
};
use storage::Storage;
use tokio::sync::broadcast;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;
mod session;

use app_state::AppState;
use config::{load_settings, prepare_database_url, DEV_SESSION_SECRET};
use session::{mint_session_token, verify_session_token, SessionConfig};

type HttpError = (StatusCode, Json<ApiError>);

const BODY_LIMIT_OVERHEAD_BYTES: usize = 16 * 1024;

#[derive(Debug, Deserialize)]
struct WsQuery {
    token: String,
}

/// Bearer-authenticated employee extracted from the `Authorization` header.
struct Authenticated(Caller);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Authenticated {
    type Rejection = HttpError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| unauthorized("missing bearer token"))?;
        verify_session_token(&state.sessions, token)
            .map(Authenticated)
            .ok_or_else(|| unauthorized("invalid or expired session"))
    }
}

/// JSON request body whose rejections use the `{ code, message }` error shape.
struct JsonBody<T>(T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = HttpError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Json::<T>::from_request(req, state)
            .await
            .map(|Json(value)| JsonBody(value))
            .map_err(json_rejection)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings();
    if settings.session_secret == DEV_SESSION_SECRET {
        warn!("using the development session secret; set APP__SESSION_SECRET in production");
    }
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    let api = ApiContext {
        storage,
        max_signature_bytes: settings.max_signature_bytes,
    };
    let (events, _) = broadcast::channel(256);

    let state = AppState {
        api,
        sessions: SessionConfig {
            secret: settings.session_secret,
            ttl_seconds: settings.session_ttl_seconds,
        },
        events,
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    // base64 inflates the signature by a third; the rest covers JSON framing.
    let body_limit = state.api.max_signature_bytes.div_ceil(3) * 4 + BODY_LIMIT_OVERHEAD_BYTES;
    Router::new()
        .route("/healthz", get(healthz))
        .route(LOGIN_ROUTE, post(http_login))
        .route(MY_REVIEWS_ROUTE, get(http_list_my_reviews))
        .route(
            ALL_REVIEWS_ROUTE,
            get(http_list_company_reviews).post(http_assign_review),
        )
        .route(PENDING_CHECK_ROUTE, get(http_pending_check))
        .route("/api/document-reviews/:review_id/view", post(http_mark_viewed))
        .route(
            "/api/document-reviews/:review_id/acquire",
            post(http_acquire_review),
        )
        .route("/api/document-reviews/:review_id/sign", post(http_sign_review))
        .route(CSR_ROUTE, get(http_csr))
        .route(COMPANY_SAFETY_RATING_ROUTE, get(http_company_safety_rating))
        .route("/ws", get(ws_handler))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .with_state(state)
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, HttpError> {
    state.api.storage.health_check().await.map_err(|e| {
        error!(error = %e, "health check failed");
        error_response(ApiError::new(ErrorCode::Internal, "storage unavailable"))
    })?;
    Ok("ok")
}

async fn http_login(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>, HttpError> {
    let employee = login(&state.api, &req.email)
        .await
        .map_err(error_response)?;
    let token = mint_session_token(&state.sessions, &employee).map_err(|e| {
        error_response(ApiError::new(
            ErrorCode::Internal,
            format!("session token mint failed: {e}"),
        ))
    })?;
    info!(employee_id = employee.id.0, company_id = employee.company_id.0, "employee signed in");
    Ok(Json(LoginResponse { token, employee }))
}

async fn http_list_my_reviews(
    State(state): State<Arc<AppState>>,
    Authenticated(caller): Authenticated,
) -> Result<Json<ReviewListResponse>, HttpError> {
    let reviews = list_my_reviews(&state.api, caller)
        .await
        .map_err(error_response)?;
    Ok(Json(ReviewListResponse { reviews }))
}

async fn http_list_company_reviews(
    State(state): State<Arc<AppState>>,
    Authenticated(caller): Authenticated,
) -> Result<Json<ReviewListResponse>, HttpError> {
    let reviews = list_company_reviews(&state.api, caller)
        .await
        .map_err(error_response)?;
    Ok(Json(ReviewListResponse { reviews }))
}

async fn http_assign_review(
    State(state): State<Arc<AppState>>,
    Authenticated(caller): Authenticated,
    JsonBody(req): JsonBody<AssignReviewRequest>,
) -> Result<Json<ReviewResponse>, HttpError> {
    let (review, event) = assign_review(&state.api, caller, req)
        .await
        .map_err(error_response)?;
    state.publish(event);
    Ok(Json(ReviewResponse { review }))
}

async fn http_pending_check(
    State(state): State<Arc<AppState>>,
    Authenticated(caller): Authenticated,
) -> Result<Json<PendingCheckResponse>, HttpError> {
    let check = pending_check(&state.api, caller)
        .await
        .map_err(error_response)?;
    Ok(Json(check))
}

async fn http_mark_viewed(
    State(state): State<Arc<AppState>>,
    Authenticated(caller): Authenticated,
    Path(review_id): Path<i64>,
) -> Result<Json<ReviewResponse>, HttpError> {
    let (review, event) = mark_viewed(&state.api, caller, ReviewId(review_id))
        .await
        .map_err(error_response)?;
    state.publish(event);
    Ok(Json(ReviewResponse { review }))
}

async fn http_acquire_review(
    State(state): State<Arc<AppState>>,
    Authenticated(caller): Authenticated,
    Path(review_id): Path<i64>,
) -> Result<Json<AcquireReviewResponse>, HttpError> {
    let (response, event) = acquire_review(&state.api, caller, ReviewId(review_id))
        .await
        .map_err(error_response)?;
    state.publish(event);
    Ok(Json(response))
}

async fn http_sign_review(
    State(state): State<Arc<AppState>>,
    Authenticated(caller): Authenticated,
    Path(review_id): Path<i64>,
    JsonBody(req): JsonBody<SignReviewRequest>,
) -> Result<Json<ReviewResponse>, HttpError> {
    let (review, events) = sign_review(
        &state.api,
        caller,
        ReviewId(review_id),
        &req.signature_data_url,
    )
    .await
    .map_err(error_response)?;
    for event in events {
        state.publish(event);
    }
    Ok(Json(ReviewResponse { review }))
}

async fn http_csr(
    State(state): State<Arc<AppState>>,
    Authenticated(caller): Authenticated,
) -> Result<Json<Vec<CsrEntry>>, HttpError> {
    let entries = csr_summary(&state.api, caller)
        .await
        .map_err(error_response)?;
    Ok(Json(entries))
}

async fn http_company_safety_rating(
    State(state): State<Arc<AppState>>,
    Authenticated(caller): Authenticated,
) -> Result<Json<CompanySafetyRating>, HttpError> {
    let rating = company_safety_rating(&state.api, caller)
        .await
        .map_err(error_response)?;
    Ok(Json(rating))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(q): Query<WsQuery>,
) -> Result<impl IntoResponse, HttpError> {
    let caller = verify_session_token(&state.sessions, &q.token)
        .ok_or_else(|| unauthorized("invalid or expired session"))?;
    Ok(ws.on_upgrade(move |socket| ws_connection(state, socket, caller)))
}

async fn ws_connection(state: Arc<AppState>, socket: axum::extract::ws::WebSocket, caller: Caller) {
    use axum::extract::ws::Message;
    use futures::{SinkExt, StreamExt};

    let (mut sender, mut receiver) = socket.split();
    let mut events_rx = state.events.subscribe();
    let company_id = caller.company_id;

    let send_task = tokio::spawn(async move {
        loop {
            let event = match events_rx.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, company_id = company_id.0, "ws subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            if event.company_id() != Some(company_id) {
                continue;
            }
            let text = match serde_json::to_string(&event) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    debug!(employee_id = caller.employee_id.0, "ws subscriber connected");
    while let Some(Ok(_msg)) = receiver.next().await {}

    send_task.abort();
}

fn error_response(err: ApiError) -> HttpError {
    let status = status_for(err.code);
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(message = %err.message, "request failed");
    }
    (status, Json(err))
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::NotFound | ErrorCode::TemplateNotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn json_rejection(rejection: JsonRejection) -> HttpError {
    let code = if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ErrorCode::PayloadTooLarge
    } else {
        ErrorCode::Validation
    };
    let status = rejection.status();
    debug!(%status, "rejected request body");
    (status, Json(ApiError::new(code, rejection.body_text())))
}

fn unauthorized(message: &str) -> HttpError {
    error_response(ApiError::new(ErrorCode::Unauthorized, message))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
