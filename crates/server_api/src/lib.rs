use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use shared::{
    content::resolve_content,
    domain::{CompanyId, EmployeeId, EmployeeSummary, ReviewId, ReviewRecord, Role},
    error::{ApiError, ErrorCode},
    protocol::{
        AcquireReviewResponse, AssignReviewRequest, CompanySafetyRating, CsrEntry,
        PendingCheckResponse, ServerEvent, SIGNATURE_DATA_URL_PREFIX,
    },
};
use storage::{NewReview, SignOutcome, Storage};
use tracing::{info, warn};

pub const DEFAULT_MAX_SIGNATURE_BYTES: usize = 512 * 1024;
const MAX_DOCUMENT_NAME_BYTES: usize = 200;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub max_signature_bytes: usize,
}

impl ApiContext {
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            max_signature_bytes: DEFAULT_MAX_SIGNATURE_BYTES,
        }
    }
}

/// The authenticated employee a request acts for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub employee_id: EmployeeId,
    pub company_id: CompanyId,
    pub role: Role,
}

impl From<&EmployeeSummary> for Caller {
    fn from(employee: &EmployeeSummary) -> Self {
        Self {
            employee_id: employee.id,
            company_id: employee.company_id,
            role: employee.role,
        }
    }
}

pub async fn login(ctx: &ApiContext, email: &str) -> Result<EmployeeSummary, ApiError> {
    if email.trim().is_empty() {
        return Err(ApiError::new(ErrorCode::Validation, "email is required"));
    }
    ctx.storage
        .employee_by_email(email)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::new(ErrorCode::Unauthorized, "unknown employee"))
}

pub async fn list_my_reviews(ctx: &ApiContext, caller: Caller) -> Result<Vec<ReviewRecord>, ApiError> {
    ctx.storage
        .list_reviews_for_employee(caller.employee_id)
        .await
        .map_err(internal)
}

pub async fn list_company_reviews(
    ctx: &ApiContext,
    caller: Caller,
) -> Result<Vec<ReviewRecord>, ApiError> {
    ensure_manager(caller)?;
    ctx.storage
        .list_reviews_for_company(caller.company_id)
        .await
        .map_err(internal)
}

pub async fn pending_check(ctx: &ApiContext, caller: Caller) -> Result<PendingCheckResponse, ApiError> {
    let pending: Vec<ReviewRecord> = list_my_reviews(ctx, caller)
        .await?
        .into_iter()
        .filter(ReviewRecord::is_pending)
        .collect();
    Ok(PendingCheckResponse {
        has_pending: !pending.is_empty(),
        pending_count: pending.len(),
        pending,
    })
}

pub async fn assign_review(
    ctx: &ApiContext,
    caller: Caller,
    req: AssignReviewRequest,
) -> Result<(ReviewRecord, ServerEvent), ApiError> {
    ensure_manager(caller)?;
    let employee_id = req.employee_id;
    let draft = NewReview {
        company_id: caller.company_id,
        employee_id,
        document_type: req.document_type,
        document_name: req.document_name,
        file_url: req.file_url,
        template_key: req.template_key,
    }
    .normalized();
    if draft.document_name.is_empty() {
        return Err(ApiError::new(
            ErrorCode::Validation,
            "document name cannot be empty",
        ));
    }
    if draft.document_name.len() > MAX_DOCUMENT_NAME_BYTES {
        return Err(ApiError::new(
            ErrorCode::Validation,
            "document name is too long",
        ));
    }

    let employee = ctx
        .storage
        .employee(employee_id)
        .await
        .map_err(internal)?
        .filter(|employee| employee.company_id == caller.company_id)
        .ok_or_else(|| ApiError::new(ErrorCode::NotFound, "employee not found"))?;

    let review = ctx
        .storage
        .assign_review(&draft)
        .await
        .map_err(internal)?;
    info!(
        review_id = review.id.0,
        employee_id = employee.id.0,
        company_id = caller.company_id.0,
        document_type = %review.document_type,
        "document review assigned"
    );
    let event = ServerEvent::ReviewAssigned {
        review: review.clone(),
    };
    Ok((review, event))
}

pub async fn mark_viewed(
    ctx: &ApiContext,
    caller: Caller,
    review_id: ReviewId,
) -> Result<(ReviewRecord, ServerEvent), ApiError> {
    let review = ctx
        .storage
        .mark_viewed(review_id, caller.employee_id, Utc::now())
        .await
        .map_err(internal)?
        .ok_or_else(review_not_found)?;
    let event = viewed_event(&review);
    Ok((review, event))
}

/// Resolves the review's content and records the view in one step.
///
/// Resolution happens first; a record whose content cannot be resolved is left
/// untouched.
pub async fn acquire_review(
    ctx: &ApiContext,
    caller: Caller,
    review_id: ReviewId,
) -> Result<(AcquireReviewResponse, ServerEvent), ApiError> {
    let review = load_owned_review(ctx, caller, review_id).await?;
    let content = resolve_content(&review).map_err(|err| {
        warn!(
            review_id = review_id.0,
            document_name = %review.document_name,
            %err,
            "review content could not be resolved"
        );
        ApiError::from(err)
    })?;
    let (review, event) = mark_viewed(ctx, caller, review_id).await?;
    Ok((AcquireReviewResponse { review, content }, event))
}

pub async fn sign_review(
    ctx: &ApiContext,
    caller: Caller,
    review_id: ReviewId,
    signature_data_url: &str,
) -> Result<(ReviewRecord, Vec<ServerEvent>), ApiError> {
    validate_signature_data_url(signature_data_url, ctx.max_signature_bytes)?;

    let outcome = ctx
        .storage
        .mark_signed(review_id, caller.employee_id, signature_data_url, Utc::now())
        .await
        .map_err(internal)?;
    let review = match outcome {
        SignOutcome::Signed(review) => review,
        SignOutcome::NotFound => return Err(review_not_found()),
        SignOutcome::NotViewed => {
            return Err(ApiError::new(
                ErrorCode::Validation,
                "document must be viewed before it can be signed",
            ))
        }
        SignOutcome::AlreadySigned(_) => {
            return Err(ApiError::new(
                ErrorCode::Conflict,
                "document has already been signed",
            ))
        }
    };

    let signed_at = review.signed_at.unwrap_or_else(Utc::now);
    info!(
        review_id = review.id.0,
        employee_id = caller.employee_id.0,
        company_id = review.company_id.0,
        "document review signed"
    );
    let events = vec![
        ServerEvent::ReviewSigned {
            company_id: review.company_id,
            review_id: review.id,
            employee_id: review.employee_id,
            signed_at,
        },
        ServerEvent::ComplianceScoreInvalidated {
            company_id: review.company_id,
        },
    ];
    Ok((review, events))
}

pub async fn csr_summary(ctx: &ApiContext, caller: Caller) -> Result<Vec<CsrEntry>, ApiError> {
    ensure_manager(caller)?;
    let rows = ctx
        .storage
        .acknowledgment_summary(caller.company_id)
        .await
        .map_err(internal)?;
    Ok(rows
        .into_iter()
        .map(|row| CsrEntry {
            employee_id: row.employee_id,
            employee_name: row.employee_name,
            pending: row.pending,
            signed: row.signed,
        })
        .collect())
}

pub async fn company_safety_rating(
    ctx: &ApiContext,
    caller: Caller,
) -> Result<CompanySafetyRating, ApiError> {
    ensure_manager(caller)?;
    let (total, signed) = ctx
        .storage
        .review_counts_for_company(caller.company_id)
        .await
        .map_err(internal)?;
    Ok(CompanySafetyRating::from_counts(
        caller.company_id,
        total,
        signed,
    ))
}

/// Accepts `data:image/png;base64,<payload>` whose decoded size is within `max_bytes`.
pub fn validate_signature_data_url(data_url: &str, max_bytes: usize) -> Result<(), ApiError> {
    let payload = data_url
        .strip_prefix(SIGNATURE_DATA_URL_PREFIX)
        .ok_or_else(|| {
            ApiError::new(
                ErrorCode::Validation,
                "signature must be a PNG data URL",
            )
        })?;
    if payload.is_empty() {
        return Err(ApiError::new(ErrorCode::Validation, "signature is empty"));
    }
    // base64 expands 3 bytes to 4 characters; reject before decoding.
    if payload.len() > max_bytes.div_ceil(3) * 4 {
        return Err(signature_too_large(max_bytes));
    }
    let decoded = STANDARD
        .decode(payload)
        .map_err(|_| ApiError::new(ErrorCode::Validation, "invalid base64 signature"))?;
    if decoded.len() > max_bytes {
        return Err(signature_too_large(max_bytes));
    }
    Ok(())
}

async fn load_owned_review(
    ctx: &ApiContext,
    caller: Caller,
    review_id: ReviewId,
) -> Result<ReviewRecord, ApiError> {
    ctx.storage
        .load_review(review_id)
        .await
        .map_err(internal)?
        .filter(|review| review.employee_id == caller.employee_id)
        .ok_or_else(review_not_found)
}

fn viewed_event(review: &ReviewRecord) -> ServerEvent {
    ServerEvent::ReviewViewed {
        company_id: review.company_id,
        review_id: review.id,
        employee_id: review.employee_id,
        viewed_at: review.viewed_at.unwrap_or_else(Utc::now),
    }
}

fn ensure_manager(caller: Caller) -> Result<(), ApiError> {
    if caller.role.can_manage_reviews() {
        Ok(())
    } else {
        Err(ApiError::new(
            ErrorCode::Forbidden,
            "manager role required",
        ))
    }
}

fn review_not_found() -> ApiError {
    ApiError::new(ErrorCode::NotFound, "document review not found")
}

fn signature_too_large(max_bytes: usize) -> ApiError {
    ApiError::new(
        ErrorCode::PayloadTooLarge,
        format!("signature exceeds {max_bytes} bytes"),
    )
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, err.to_string())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
