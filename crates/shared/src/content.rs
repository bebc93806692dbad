use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    catalog::{self, SafeWorkPractice, SafeWorkProcedure},
    domain::{DocumentType, ReviewRecord},
    error::{ApiError, ErrorCode},
};

/// What a review opens onto. Templates travel by catalog key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReviewContent {
    FileFrame {
        url: String,
    },
    Procedure {
        #[serde(rename = "jobType")]
        job_type: String,
    },
    Practice {
        #[serde(rename = "practiceId")]
        practice_id: String,
    },
}

impl ReviewContent {
    pub fn procedure(&self) -> Option<&'static SafeWorkProcedure> {
        match self {
            ReviewContent::Procedure { job_type } => catalog::procedure_by_job_type(job_type),
            _ => None,
        }
    }

    pub fn practice(&self) -> Option<&'static SafeWorkPractice> {
        match self {
            ReviewContent::Practice { practice_id } => catalog::practice_by_id(practice_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentError {
    #[error("template not found: no {document_type} template matches '{document_name}'")]
    TemplateNotFound {
        document_type: DocumentType,
        document_name: String,
    },
    #[error("document file not available")]
    FileUnavailable,
}

impl From<ContentError> for ApiError {
    fn from(value: ContentError) -> Self {
        let code = match value {
            ContentError::TemplateNotFound { .. } => ErrorCode::TemplateNotFound,
            ContentError::FileUnavailable => ErrorCode::NotFound,
        };
        ApiError::new(code, value.to_string())
    }
}

/// Resolves a review to exactly one piece of content.
///
/// An attached file always wins. Template types are looked up by stable key when
/// the record carries one, otherwise by exact title match on `document_name`.
pub fn resolve_content(review: &ReviewRecord) -> Result<ReviewContent, ContentError> {
    resolve_assignment(
        review.document_type,
        &review.document_name,
        review.attached_file_url(),
        review.template_key.as_deref(),
    )
}

/// Same resolution as [`resolve_content`], for a review that has not been stored yet.
/// Blank `file_url` and `template_key` count as absent.
pub fn resolve_assignment(
    document_type: DocumentType,
    document_name: &str,
    file_url: Option<&str>,
    template_key: Option<&str>,
) -> Result<ReviewContent, ContentError> {
    if let Some(url) = file_url.map(str::trim).filter(|url| !url.is_empty()) {
        return Ok(ReviewContent::FileFrame {
            url: url.to_string(),
        });
    }

    let template_key = template_key.map(str::trim).filter(|key| !key.is_empty());
    let not_found = || ContentError::TemplateNotFound {
        document_type,
        document_name: document_name.to_string(),
    };

    match document_type {
        DocumentType::SafeWorkProcedure => {
            let entry = match template_key {
                Some(key) => catalog::procedure_by_job_type(key),
                None => catalog::procedure_by_title(document_name),
            };
            entry
                .map(|procedure| ReviewContent::Procedure {
                    job_type: procedure.job_type.to_string(),
                })
                .ok_or_else(not_found)
        }
        DocumentType::SafeWorkPractice => {
            let entry = match template_key {
                Some(key) => catalog::practice_by_id(key),
                None => catalog::practice_by_title(document_name),
            };
            entry
                .map(|practice| ReviewContent::Practice {
                    practice_id: practice.id.to_string(),
                })
                .ok_or_else(not_found)
        }
        _ => Err(ContentError::FileUnavailable),
    }
}
