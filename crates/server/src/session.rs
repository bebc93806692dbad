use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use server_api::Caller;
use shared::domain::{CompanyId, EmployeeId, EmployeeSummary, Role};

const ISSUER: &str = "rope-access-reviews";

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub secret: String,
    pub ttl_seconds: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    iss: String,
    sub: String,
    exp: i64,
    iat: i64,
    jti: String,
    company_id: i64,
    role: Role,
}

pub fn mint_session_token(
    cfg: &SessionConfig,
    employee: &EmployeeSummary,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let exp = now + Duration::seconds(cfg.ttl_seconds);
    let claims = Claims {
        iss: ISSUER.to_string(),
        sub: format!("employee:{}", employee.id.0),
        iat: now.timestamp(),
        exp: exp.timestamp(),
        jti: uuid::Uuid::new_v4().to_string(),
        company_id: employee.company_id.0,
        role: employee.role,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(cfg.secret.as_bytes()),
    )
}

/// Returns `None` for expired, forged or malformed tokens.
pub fn verify_session_token(cfg: &SessionConfig, token: &str) -> Option<Caller> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(cfg.secret.as_bytes()),
        &validation,
    )
    .ok()?;
    let employee_id = data
        .claims
        .sub
        .strip_prefix("employee:")
        .and_then(|id| id.parse::<i64>().ok())?;
    Some(Caller {
        employee_id: EmployeeId(employee_id),
        company_id: CompanyId(data.claims.company_id),
        role: data.claims.role,
    })
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
