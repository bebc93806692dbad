use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::domain::{
    CompanyId, DocumentType, EmployeeId, EmployeeSummary, ReviewId, ReviewRecord, Role,
};

const REVIEW_COLUMNS: &str = "id, company_id, employee_id, document_type, document_name, template_key, file_url, viewed_at, signed_at, signature_data_url, created_at";

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub company_id: CompanyId,
    pub employee_id: EmployeeId,
    pub document_type: DocumentType,
    pub document_name: String,
    pub file_url: Option<String>,
    pub template_key: Option<String>,
}

impl NewReview {
    /// Trims text fields; blank `file_url` and `template_key` become `None`.
    pub fn normalized(self) -> Self {
        let trimmed = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            document_name: self.document_name.trim().to_string(),
            file_url: trimmed(self.file_url),
            template_key: trimmed(self.template_key),
            ..self
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignOutcome {
    Signed(ReviewRecord),
    NotFound,
    NotViewed,
    AlreadySigned(ReviewRecord),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAcknowledgment {
    pub employee_id: EmployeeId,
    pub employee_name: String,
    pub pending: u64,
    pub signed: u64,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn create_company(&self, name: &str) -> Result<CompanyId> {
        let rec = sqlx::query("INSERT INTO companies (name) VALUES (?) RETURNING id")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("failed to create company '{name}'"))?;
        Ok(CompanyId(rec.get::<i64, _>(0)))
    }

    pub async fn company_name(&self, company_id: CompanyId) -> Result<Option<String>> {
        let row = sqlx::query("SELECT name FROM companies WHERE id = ?")
            .bind(company_id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<String, _>(0)))
    }

    /// Creates the employee, or updates name and role when the email is already known.
    pub async fn create_employee(
        &self,
        company_id: CompanyId,
        name: &str,
        email: &str,
        role: Role,
    ) -> Result<EmployeeId> {
        let rec = sqlx::query(
            "INSERT INTO employees (company_id, name, email, role) VALUES (?, ?, ?, ?)
             ON CONFLICT(email) DO UPDATE SET name=excluded.name, role=excluded.role
             RETURNING id",
        )
        .bind(company_id.0)
        .bind(name)
        .bind(normalize_email(email))
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("failed to create employee '{email}'"))?;
        Ok(EmployeeId(rec.get::<i64, _>(0)))
    }

    pub async fn employee(&self, employee_id: EmployeeId) -> Result<Option<EmployeeSummary>> {
        let row = sqlx::query("SELECT id, company_id, name, email, role FROM employees WHERE id = ?")
            .bind(employee_id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(employee_from_row).transpose()
    }

    pub async fn employee_by_email(&self, email: &str) -> Result<Option<EmployeeSummary>> {
        let row =
            sqlx::query("SELECT id, company_id, name, email, role FROM employees WHERE email = ?")
                .bind(normalize_email(email))
                .fetch_optional(&self.pool)
                .await?;
        row.as_ref().map(employee_from_row).transpose()
    }

    pub async fn list_employees(&self, company_id: CompanyId) -> Result<Vec<EmployeeSummary>> {
        let rows = sqlx::query(
            "SELECT id, company_id, name, email, role FROM employees
             WHERE company_id = ?
             ORDER BY lower(name) ASC, id ASC",
        )
        .bind(company_id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(employee_from_row).collect()
    }

    /// Assigning the same document to the same employee twice returns the existing record.
    pub async fn assign_review(&self, review: &NewReview) -> Result<ReviewRecord> {
        let rec = sqlx::query(
            "INSERT INTO document_reviews (company_id, employee_id, document_type, document_name, template_key, file_url, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(employee_id, document_type, document_name) DO UPDATE SET document_name=excluded.document_name
             RETURNING id",
        )
        .bind(review.company_id.0)
        .bind(review.employee_id.0)
        .bind(review.document_type.as_str())
        .bind(&review.document_name)
        .bind(review.template_key.as_deref())
        .bind(review.file_url.as_deref())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .with_context(|| {
            format!(
                "failed to assign '{}' to employee {}",
                review.document_name, review.employee_id
            )
        })?;
        let review_id = ReviewId(rec.get::<i64, _>(0));
        self.load_review(review_id)
            .await?
            .ok_or_else(|| anyhow!("review {review_id} vanished after insert"))
    }

    pub async fn load_review(&self, review_id: ReviewId) -> Result<Option<ReviewRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {REVIEW_COLUMNS} FROM document_reviews WHERE id = ?"
        ))
        .bind(review_id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(review_from_row).transpose()
    }

    pub async fn list_reviews_for_employee(
        &self,
        employee_id: EmployeeId,
    ) -> Result<Vec<ReviewRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {REVIEW_COLUMNS} FROM document_reviews
             WHERE employee_id = ?
             ORDER BY id ASC"
        ))
        .bind(employee_id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(review_from_row).collect()
    }

    pub async fn list_reviews_for_company(&self, company_id: CompanyId) -> Result<Vec<ReviewRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {REVIEW_COLUMNS} FROM document_reviews
             WHERE company_id = ?
             ORDER BY id ASC"
        ))
        .bind(company_id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(review_from_row).collect()
    }

    /// Sets `viewed_at` for a record the employee owns. Repeated calls move the timestamp forward.
    pub async fn mark_viewed(
        &self,
        review_id: ReviewId,
        employee_id: EmployeeId,
        viewed_at: DateTime<Utc>,
    ) -> Result<Option<ReviewRecord>> {
        let result =
            sqlx::query("UPDATE document_reviews SET viewed_at = ? WHERE id = ? AND employee_id = ?")
                .bind(viewed_at)
                .bind(review_id.0)
                .bind(employee_id.0)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.load_review(review_id).await
    }

    /// Signs a viewed, unsigned record in one conditional update so concurrent
    /// submissions produce exactly one `Signed`.
    pub async fn mark_signed(
        &self,
        review_id: ReviewId,
        employee_id: EmployeeId,
        signature_data_url: &str,
        signed_at: DateTime<Utc>,
    ) -> Result<SignOutcome> {
        let result = sqlx::query(
            "UPDATE document_reviews
             SET signed_at = ?, signature_data_url = ?
             WHERE id = ? AND employee_id = ? AND signed_at IS NULL AND viewed_at IS NOT NULL",
        )
        .bind(signed_at)
        .bind(signature_data_url)
        .bind(review_id.0)
        .bind(employee_id.0)
        .execute(&self.pool)
        .await?;

        let Some(review) = self.load_review(review_id).await? else {
            return Ok(SignOutcome::NotFound);
        };
        if review.employee_id != employee_id {
            return Ok(SignOutcome::NotFound);
        }
        if result.rows_affected() > 0 {
            return Ok(SignOutcome::Signed(review));
        }
        if review.is_signed() {
            Ok(SignOutcome::AlreadySigned(review))
        } else {
            Ok(SignOutcome::NotViewed)
        }
    }

    /// Returns `(total, signed)` across every review in the company.
    pub async fn review_counts_for_company(&self, company_id: CompanyId) -> Result<(u64, u64)> {
        let row = sqlx::query(
            "SELECT COUNT(*), COALESCE(SUM(CASE WHEN signed_at IS NOT NULL THEN 1 ELSE 0 END), 0)
             FROM document_reviews WHERE company_id = ?",
        )
        .bind(company_id.0)
        .fetch_one(&self.pool)
        .await?;
        Ok((
            u64::try_from(row.get::<i64, _>(0)).unwrap_or_default(),
            u64::try_from(row.get::<i64, _>(1)).unwrap_or_default(),
        ))
    }

    pub async fn acknowledgment_summary(
        &self,
        company_id: CompanyId,
    ) -> Result<Vec<StoredAcknowledgment>> {
        let rows = sqlx::query(
            "SELECT e.id, e.name,
                    COALESCE(SUM(CASE WHEN r.id IS NOT NULL AND r.signed_at IS NULL THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN r.signed_at IS NOT NULL THEN 1 ELSE 0 END), 0)
             FROM employees e
             LEFT JOIN document_reviews r ON r.employee_id = e.id
             WHERE e.company_id = ?
             GROUP BY e.id, e.name
             ORDER BY lower(e.name) ASC, e.id ASC",
        )
        .bind(company_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| StoredAcknowledgment {
                employee_id: EmployeeId(r.get::<i64, _>(0)),
                employee_name: r.get::<String, _>(1),
                pending: u64::try_from(r.get::<i64, _>(2)).unwrap_or_default(),
                signed: u64::try_from(r.get::<i64, _>(3)).unwrap_or_default(),
            })
            .collect())
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

fn employee_from_row(row: &SqliteRow) -> Result<EmployeeSummary> {
    let role: String = row.try_get("role")?;
    Ok(EmployeeSummary {
        id: EmployeeId(row.try_get("id")?),
        company_id: CompanyId(row.try_get("company_id")?),
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        role: Role::from_str(&role).with_context(|| format!("corrupt employee role '{role}'"))?,
    })
}

fn review_from_row(row: &SqliteRow) -> Result<ReviewRecord> {
    let document_type: String = row.try_get("document_type")?;
    Ok(ReviewRecord {
        id: ReviewId(row.try_get("id")?),
        company_id: CompanyId(row.try_get("company_id")?),
        employee_id: EmployeeId(row.try_get("employee_id")?),
        document_type: DocumentType::from_str(&document_type)
            .with_context(|| format!("corrupt document type '{document_type}'"))?,
        document_name: row.try_get("document_name")?,
        template_key: row.try_get("template_key")?,
        file_url: row.try_get("file_url")?,
        viewed_at: row.try_get("viewed_at")?,
        signed_at: row.try_get("signed_at")?,
        signature_data_url: row.try_get("signature_data_url")?,
        created_at: row.try_get("created_at")?,
    })
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
