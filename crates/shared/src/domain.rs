use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(CompanyId);
id_newtype!(EmployeeId);
id_newtype!(ReviewId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    HealthSafetyManual,
    CompanyPolicy,
    MethodStatement,
    SafeWorkProcedure,
    SafeWorkPractice,
}

impl DocumentType {
    pub const ALL: [DocumentType; 5] = [
        DocumentType::HealthSafetyManual,
        DocumentType::CompanyPolicy,
        DocumentType::MethodStatement,
        DocumentType::SafeWorkProcedure,
        DocumentType::SafeWorkPractice,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentType::HealthSafetyManual => "health_safety_manual",
            DocumentType::CompanyPolicy => "company_policy",
            DocumentType::MethodStatement => "method_statement",
            DocumentType::SafeWorkProcedure => "safe_work_procedure",
            DocumentType::SafeWorkPractice => "safe_work_practice",
        }
    }

    /// Template-backed types resolve against the static catalogs when no file is attached.
    pub fn is_template(self) -> bool {
        matches!(
            self,
            DocumentType::SafeWorkProcedure | DocumentType::SafeWorkPractice
        )
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown value '{0}'")]
pub struct UnknownVariant(pub String);

impl FromStr for DocumentType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DocumentType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Manager,
    Employee,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Manager => "manager",
            Role::Employee => "employee",
        }
    }

    pub fn can_manage_reviews(self) -> bool {
        matches!(self, Role::Owner | Role::Manager)
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Role::Owner),
            "manager" => Ok(Role::Manager),
            "employee" => Ok(Role::Employee),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeSummary {
    pub id: EmployeeId,
    pub company_id: CompanyId,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// One employee's acknowledgment of one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRecord {
    pub id: ReviewId,
    pub company_id: CompanyId,
    pub employee_id: EmployeeId,
    pub document_type: DocumentType,
    pub document_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(default)]
    pub viewed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub signed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_data_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ReviewRecord {
    pub fn is_signed(&self) -> bool {
        self.signed_at.is_some()
    }

    pub fn is_pending(&self) -> bool {
        !self.is_signed()
    }

    pub fn has_been_viewed(&self) -> bool {
        self.viewed_at.is_some()
    }

    /// Trimmed file URL, `None` when absent or blank.
    pub fn attached_file_url(&self) -> Option<&str> {
        self.file_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}
