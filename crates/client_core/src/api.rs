use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::{EmployeeSummary, ReviewId, ReviewRecord},
    error::{ApiError, ErrorCode},
    protocol::{
        review_acquire_route, review_sign_route, review_view_route, AcquireReviewResponse,
        LoginRequest, LoginResponse, PendingCheckResponse, ReviewListResponse, ReviewResponse,
        SignReviewRequest, LOGIN_ROUTE, MY_REVIEWS_ROUTE, PENDING_CHECK_ROUTE,
    },
};
use tracing::debug;

use crate::error::ClientError;

/// Review operations available to a signed-in employee.
#[async_trait]
pub trait ReviewApi: Send + Sync {
    async fn list_my_reviews(&self) -> Result<Vec<ReviewRecord>, ClientError>;
    async fn acquire_review(&self, review_id: ReviewId)
        -> Result<AcquireReviewResponse, ClientError>;
    async fn mark_viewed(&self, review_id: ReviewId) -> Result<ReviewRecord, ClientError>;
    async fn sign_review(
        &self,
        review_id: ReviewId,
        signature_data_url: &str,
    ) -> Result<ReviewRecord, ClientError>;
    async fn pending_check(&self) -> Result<PendingCheckResponse, ClientError>;
}

#[derive(Clone)]
pub struct HttpReviewClient {
    http: Client,
    server_url: String,
    token: String,
}

impl HttpReviewClient {
    pub fn with_token(server_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            server_url: trim_server_url(server_url.into()),
            token: token.into(),
        }
    }

    pub async fn login(
        server_url: impl Into<String>,
        email: &str,
    ) -> Result<(Self, EmployeeSummary), ClientError> {
        let server_url = trim_server_url(server_url.into());
        let http = Client::new();
        let res = http
            .post(format!("{server_url}{LOGIN_ROUTE}"))
            .json(&LoginRequest {
                email: email.to_string(),
            })
            .send()
            .await?;
        let body: LoginResponse = decode(res).await?;
        debug!(employee_id = body.employee.id.0, "signed in");
        Ok((
            Self {
                http,
                server_url,
                token: body.token,
            },
            body.employee,
        ))
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    async fn get<T: DeserializeOwned>(&self, route: &str) -> Result<T, ClientError> {
        let res = self
            .http
            .get(format!("{}{route}", self.server_url))
            .bearer_auth(&self.token)
            .send()
            .await?;
        decode(res).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        route: &str,
        body: Option<&SignReviewRequest>,
    ) -> Result<T, ClientError> {
        let mut req = self
            .http
            .post(format!("{}{route}", self.server_url))
            .bearer_auth(&self.token);
        if let Some(body) = body {
            req = req.json(body);
        }
        decode(req.send().await?).await
    }
}

#[async_trait]
impl ReviewApi for HttpReviewClient {
    async fn list_my_reviews(&self) -> Result<Vec<ReviewRecord>, ClientError> {
        let body: ReviewListResponse = self.get(MY_REVIEWS_ROUTE).await?;
        Ok(body.reviews)
    }

    async fn acquire_review(
        &self,
        review_id: ReviewId,
    ) -> Result<AcquireReviewResponse, ClientError> {
        self.post(&review_acquire_route(review_id), None).await
    }

    async fn mark_viewed(&self, review_id: ReviewId) -> Result<ReviewRecord, ClientError> {
        let body: ReviewResponse = self.post(&review_view_route(review_id), None).await?;
        Ok(body.review)
    }

    async fn sign_review(
        &self,
        review_id: ReviewId,
        signature_data_url: &str,
    ) -> Result<ReviewRecord, ClientError> {
        let body: ReviewResponse = self
            .post(
                &review_sign_route(review_id),
                Some(&SignReviewRequest {
                    signature_data_url: signature_data_url.to_string(),
                }),
            )
            .await?;
        Ok(body.review)
    }

    async fn pending_check(&self) -> Result<PendingCheckResponse, ClientError> {
        self.get(PENDING_CHECK_ROUTE).await
    }
}

fn trim_server_url(server_url: String) -> String {
    server_url.trim().trim_end_matches('/').to_string()
}

async fn decode<T: DeserializeOwned>(res: Response) -> Result<T, ClientError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res.json().await?);
    }
    let bytes = res.bytes().await?;
    let err = serde_json::from_slice::<ApiError>(&bytes).unwrap_or_else(|_| {
        let code = match status.as_u16() {
            401 => ErrorCode::Unauthorized,
            403 => ErrorCode::Forbidden,
            404 => ErrorCode::NotFound,
            409 => ErrorCode::Conflict,
            413 => ErrorCode::PayloadTooLarge,
            429 => ErrorCode::RateLimited,
            400..=499 => ErrorCode::Validation,
            _ => ErrorCode::Internal,
        };
        ApiError::new(code, format!("server responded with {status}"))
    });
    Err(ClientError::Api(err))
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
