use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    content::ReviewContent,
    domain::{CompanyId, DocumentType, EmployeeId, EmployeeSummary, ReviewId, ReviewRecord},
    error::ApiError,
};

pub const MY_REVIEWS_ROUTE: &str = "/api/document-reviews/my";
pub const ALL_REVIEWS_ROUTE: &str = "/api/document-reviews";
pub const PENDING_CHECK_ROUTE: &str = "/api/document-reviews/pending-check";
pub const CSR_ROUTE: &str = "/api/csr";
pub const COMPANY_SAFETY_RATING_ROUTE: &str = "/api/company-safety-rating";
pub const LOGIN_ROUTE: &str = "/api/auth/login";

pub fn review_view_route(review_id: ReviewId) -> String {
    format!("/api/document-reviews/{}/view", review_id.0)
}

pub fn review_acquire_route(review_id: ReviewId) -> String {
    format!("/api/document-reviews/{}/acquire", review_id.0)
}

pub fn review_sign_route(review_id: ReviewId) -> String {
    format!("/api/document-reviews/{}/sign", review_id.0)
}

pub const SIGNATURE_DATA_URL_PREFIX: &str = "data:image/png;base64,";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub employee: EmployeeSummary,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewListResponse {
    pub reviews: Vec<ReviewRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewResponse {
    pub review: ReviewRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquireReviewResponse {
    pub review: ReviewRecord,
    pub content: ReviewContent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignReviewRequest {
    pub signature_data_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignReviewRequest {
    pub employee_id: EmployeeId,
    pub document_type: DocumentType,
    pub document_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingCheckResponse {
    pub has_pending: bool,
    pub pending_count: usize,
    pub pending: Vec<ReviewRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsrEntry {
    pub employee_id: EmployeeId,
    pub employee_name: String,
    pub pending: u64,
    pub signed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingBand {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl RatingBand {
    pub fn for_score(score: f64) -> Self {
        if score >= 90.0 {
            RatingBand::Excellent
        } else if score >= 75.0 {
            RatingBand::Good
        } else if score >= 50.0 {
            RatingBand::Fair
        } else {
            RatingBand::Poor
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanySafetyRating {
    pub company_id: CompanyId,
    pub documents_total: u64,
    pub documents_signed: u64,
    pub document_review_score: f64,
    pub band: RatingBand,
}

impl CompanySafetyRating {
    pub fn from_counts(company_id: CompanyId, total: u64, signed: u64) -> Self {
        let document_review_score = if total == 0 {
            100.0
        } else {
            let raw = signed as f64 * 100.0 / total as f64;
            (raw * 10.0).round() / 10.0
        };
        Self {
            company_id,
            documents_total: total,
            documents_signed: signed,
            document_review_score,
            band: RatingBand::for_score(document_review_score),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    ReviewAssigned {
        review: ReviewRecord,
    },
    ReviewViewed {
        company_id: CompanyId,
        review_id: ReviewId,
        employee_id: EmployeeId,
        viewed_at: DateTime<Utc>,
    },
    ReviewSigned {
        company_id: CompanyId,
        review_id: ReviewId,
        employee_id: EmployeeId,
        signed_at: DateTime<Utc>,
    },
    /// Signing changed the inputs of the company safety rating.
    ComplianceScoreInvalidated {
        company_id: CompanyId,
    },
    Error(ApiError),
}

impl ServerEvent {
    pub fn company_id(&self) -> Option<CompanyId> {
        match self {
            ServerEvent::ReviewAssigned { review } => Some(review.company_id),
            ServerEvent::ReviewViewed { company_id, .. }
            | ServerEvent::ReviewSigned { company_id, .. }
            | ServerEvent::ComplianceScoreInvalidated { company_id } => Some(*company_id),
            ServerEvent::Error(_) => None,
        }
    }
}
