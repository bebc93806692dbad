//! Review dialogs as one state machine.
//!
//! Exactly one of viewing or signing can be active; every transition goes
//! through [`DialogState::apply`], which leaves the state untouched on error.

use shared::{
    catalog::{SafeWorkPractice, SafeWorkProcedure},
    content::ReviewContent,
    domain::ReviewRecord,
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogView {
    FileFrame(String),
    Procedure(&'static SafeWorkProcedure),
    Practice(&'static SafeWorkPractice),
}

impl DialogView {
    pub fn from_content(content: &ReviewContent) -> Result<Self, DialogError> {
        match content {
            ReviewContent::FileFrame { url } => Ok(DialogView::FileFrame(url.clone())),
            ReviewContent::Procedure { job_type } => content
                .procedure()
                .map(DialogView::Procedure)
                .ok_or_else(|| DialogError::UnknownTemplate(job_type.clone())),
            ReviewContent::Practice { practice_id } => content
                .practice()
                .map(DialogView::Practice)
                .ok_or_else(|| DialogError::UnknownTemplate(practice_id.clone())),
        }
    }

    fn sign_origin(&self) -> SignOrigin {
        match self {
            DialogView::FileFrame(_) => SignOrigin::Unified,
            DialogView::Procedure(_) => SignOrigin::Procedure,
            DialogView::Practice(_) => SignOrigin::Practice,
        }
    }
}

/// Which dialog handed over to the sign dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOrigin {
    Direct,
    Unified,
    Procedure,
    Practice,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DialogState {
    #[default]
    Closed,
    Viewing {
        review: ReviewRecord,
        view: DialogView,
    },
    Signing {
        review: ReviewRecord,
        origin: SignOrigin,
    },
}

#[derive(Debug, Clone)]
pub enum DialogAction {
    Open {
        review: ReviewRecord,
        content: ReviewContent,
    },
    ProceedToSign,
    OpenSign {
        review: ReviewRecord,
    },
    Cancel,
    Signed,
}

impl DialogAction {
    fn name(&self) -> &'static str {
        match self {
            DialogAction::Open { .. } => "open",
            DialogAction::ProceedToSign => "proceed_to_sign",
            DialogAction::OpenSign { .. } => "open_sign",
            DialogAction::Cancel => "cancel",
            DialogAction::Signed => "signed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DialogError {
    #[error("cannot {action} while {state}")]
    IllegalTransition {
        state: &'static str,
        action: &'static str,
    },
    #[error("please view the document before signing")]
    NotViewed,
    #[error("this document has already been signed")]
    AlreadySigned,
    #[error("template not found: {0}")]
    UnknownTemplate(String),
}

impl DialogState {
    pub fn name(&self) -> &'static str {
        match self {
            DialogState::Closed => "closed",
            DialogState::Viewing { .. } => "viewing",
            DialogState::Signing { .. } => "signing",
        }
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, DialogState::Closed)
    }

    pub fn apply(&mut self, action: DialogAction) -> Result<(), DialogError> {
        let next = self.next(action)?;
        *self = next;
        Ok(())
    }

    fn next(&self, action: DialogAction) -> Result<DialogState, DialogError> {
        let illegal = |action: &DialogAction| DialogError::IllegalTransition {
            state: self.name(),
            action: action.name(),
        };
        match (self, action) {
            (_, DialogAction::Cancel) => Ok(DialogState::Closed),
            (DialogState::Closed, DialogAction::Open { review, content }) => {
                let view = DialogView::from_content(&content)?;
                Ok(DialogState::Viewing { review, view })
            }
            (DialogState::Viewing { review, view }, DialogAction::ProceedToSign) => {
                if review.is_signed() {
                    return Err(DialogError::AlreadySigned);
                }
                Ok(DialogState::Signing {
                    review: review.clone(),
                    origin: view.sign_origin(),
                })
            }
            (DialogState::Closed, DialogAction::OpenSign { review }) => {
                if review.is_signed() {
                    return Err(DialogError::AlreadySigned);
                }
                if !review.has_been_viewed() {
                    return Err(DialogError::NotViewed);
                }
                Ok(DialogState::Signing {
                    review,
                    origin: SignOrigin::Direct,
                })
            }
            (DialogState::Signing { .. }, DialogAction::Signed) => Ok(DialogState::Closed),
            (_, action) => Err(illegal(&action)),
        }
    }

    pub fn selected_review(&self) -> Option<&ReviewRecord> {
        match self {
            DialogState::Closed => None,
            DialogState::Viewing { review, .. } | DialogState::Signing { review, .. } => {
                Some(review)
            }
        }
    }

    pub fn selected_swp(&self) -> Option<&'static SafeWorkProcedure> {
        match self {
            DialogState::Viewing {
                view: DialogView::Procedure(entry),
                ..
            } => Some(*entry),
            _ => None,
        }
    }

    pub fn selected_practice(&self) -> Option<&'static SafeWorkPractice> {
        match self {
            DialogState::Viewing {
                view: DialogView::Practice(entry),
                ..
            } => Some(*entry),
            _ => None,
        }
    }

    pub fn unified_document_url(&self) -> Option<&str> {
        match self {
            DialogState::Viewing {
                view: DialogView::FileFrame(url),
                ..
            } => Some(url),
            _ => None,
        }
    }

    pub fn sign_origin(&self) -> Option<SignOrigin> {
        match self {
            DialogState::Signing { origin, .. } => Some(*origin),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "tests/dialog_tests.rs"]
mod tests;
