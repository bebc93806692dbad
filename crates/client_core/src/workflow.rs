use shared::{
    domain::{ReviewId, ReviewRecord},
    protocol::ServerEvent,
};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::{
    api::ReviewApi,
    cache::{QueryCache, QueryKey},
    dialog::{DialogAction, DialogError, DialogState},
    error::ClientError,
    signature::SignaturePad,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Destructive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub kind: ToastKind,
    pub title: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub enum ClientEvent {
    Toast(Toast),
    CacheInvalidated(Vec<QueryKey>),
    Server(ServerEvent),
    /// The review list request started (`true`) or settled (`false`).
    Loading(bool),
}

/// An employee's reviews split by signature state, in server order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewListing {
    pub pending: Vec<ReviewRecord>,
    pub signed: Vec<ReviewRecord>,
}

impl ReviewListing {
    pub fn partition(reviews: Vec<ReviewRecord>) -> Self {
        let (signed, pending): (Vec<_>, Vec<_>) =
            reviews.into_iter().partition(ReviewRecord::is_signed);
        Self { pending, signed }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn signed_count(&self) -> usize {
        self.signed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.signed.is_empty()
    }

    pub fn find(&self, review_id: ReviewId) -> Option<&ReviewRecord> {
        self.pending
            .iter()
            .chain(self.signed.iter())
            .find(|review| review.id == review_id)
    }

    fn upsert(&mut self, review: ReviewRecord) {
        self.pending.retain(|r| r.id != review.id);
        self.signed.retain(|r| r.id != review.id);
        if review.is_signed() {
            self.signed.push(review);
        } else {
            self.pending.push(review);
        }
    }

    fn replace(&mut self, review: ReviewRecord) {
        let bucket = if review.is_signed() {
            &mut self.signed
        } else {
            &mut self.pending
        };
        match bucket.iter_mut().find(|r| r.id == review.id) {
            Some(slot) => *slot = review,
            None => self.upsert(review),
        }
    }
}

/// Drives the document review screen: list, open, sign.
pub struct ReviewWorkflow<A: ReviewApi> {
    api: A,
    dialog: DialogState,
    pad: SignaturePad,
    cache: QueryCache,
    listing: ReviewListing,
    submitting: bool,
    events: broadcast::Sender<ClientEvent>,
}

impl<A: ReviewApi> ReviewWorkflow<A> {
    pub fn new(api: A) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            api,
            dialog: DialogState::Closed,
            pad: SignaturePad::default(),
            cache: QueryCache::new(),
            listing: ReviewListing::default(),
            submitting: false,
            events,
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn dialog(&self) -> &DialogState {
        &self.dialog
    }

    pub fn pad(&self) -> &SignaturePad {
        &self.pad
    }

    pub fn pad_mut(&mut self) -> &mut SignaturePad {
        &mut self.pad
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn listing(&self) -> &ReviewListing {
        &self.listing
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub async fn load_reviews(&mut self) -> Result<&ReviewListing, ClientError> {
        let _ = self.events.send(ClientEvent::Loading(true));
        let result = self.api.list_my_reviews().await;
        let _ = self.events.send(ClientEvent::Loading(false));
        match result {
            Ok(reviews) => {
                match serde_json::to_value(&reviews) {
                    Ok(value) => self.cache.put(QueryKey::MyReviews, value),
                    Err(error) => {
                        warn!(%error, "could not cache review list");
                        self.cache.invalidate(QueryKey::MyReviews);
                    }
                }
                self.listing = ReviewListing::partition(reviews);
                Ok(&self.listing)
            }
            Err(err) => {
                self.toast_error("Could not load documents", &err);
                Err(err)
            }
        }
    }

    /// Resolves the review's content and records the view. Nothing opens on failure.
    pub async fn open_review(&mut self, review_id: ReviewId) -> Result<(), ClientError> {
        if self.dialog.is_open() {
            return Err(ClientError::Precondition(format!(
                "a dialog is already {}",
                self.dialog.name()
            )));
        }
        let acquired = match self.api.acquire_review(review_id).await {
            Ok(acquired) => acquired,
            Err(err) => {
                let title = if err.is_template_not_found() {
                    "Template not found"
                } else {
                    "Could not open document"
                };
                self.toast_error(title, &err);
                return Err(err);
            }
        };

        self.record_review(acquired.review.clone());
        if let Err(err) = self.dialog.apply(DialogAction::Open {
            review: acquired.review,
            content: acquired.content,
        }) {
            let err = dialog_error(err);
            self.toast_error("Template not found", &err);
            return Err(err);
        }
        Ok(())
    }

    /// Re-records a view without opening anything. Repeating it only moves `viewedAt`.
    pub async fn mark_viewed(&mut self, review_id: ReviewId) -> Result<ReviewRecord, ClientError> {
        match self.api.mark_viewed(review_id).await {
            Ok(review) => {
                self.record_review(review.clone());
                Ok(review)
            }
            Err(err) => {
                self.toast_error("Could not mark document as viewed", &err);
                Err(err)
            }
        }
    }

    pub fn proceed_to_sign(&mut self) -> Result<(), ClientError> {
        self.dialog
            .apply(DialogAction::ProceedToSign)
            .map_err(dialog_error)
    }

    /// Opens the sign dialog straight from the list. Never touches the network.
    pub fn open_sign_dialog(&mut self, review_id: ReviewId) -> Result<(), ClientError> {
        let Some(review) = self.listing.find(review_id).cloned() else {
            let err = ClientError::Precondition(format!("review {review_id} is not in the list"));
            self.toast_error("Cannot sign", &err);
            return Err(err);
        };
        if let Err(err) = self.dialog.apply(DialogAction::OpenSign { review }) {
            let err = dialog_error(err);
            self.toast_error("Cannot sign", &err);
            return Err(err);
        }
        Ok(())
    }

    pub fn clear_signature(&mut self) {
        self.pad.clear();
    }

    pub async fn submit_signature(&mut self) -> Result<ReviewRecord, ClientError> {
        let review_id = match &self.dialog {
            DialogState::Signing { review, .. } => review.id,
            other => {
                return Err(ClientError::Precondition(format!(
                    "nothing to sign while {}",
                    other.name()
                )))
            }
        };
        if self.submitting {
            return Err(ClientError::Precondition(
                "signature submission already in progress".into(),
            ));
        }
        if self.pad.is_empty() {
            let err = ClientError::Signature("please provide your signature".into());
            self.toast_error("Signature required", &err);
            return Err(err);
        }
        let data_url = self.pad.to_data_url()?;

        self.submitting = true;
        let result = self.api.sign_review(review_id, &data_url).await;
        self.submitting = false;

        let review = match result {
            Ok(review) => review,
            Err(err) => {
                warn!(review_id = review_id.0, error = %err, "sign failed");
                self.toast_error("Signing failed", &err);
                return Err(err);
            }
        };

        self.dialog
            .apply(DialogAction::Signed)
            .map_err(dialog_error)?;
        self.pad.clear();
        self.record_review(review.clone());
        self.handle_server_event(ServerEvent::ComplianceScoreInvalidated {
            company_id: review.company_id,
        });
        info!(review_id = review.id.0, "document signed");
        self.toast(Toast {
            kind: ToastKind::Success,
            title: "Document signed".into(),
            message: format!("{} has been acknowledged", review.document_name),
        });
        Ok(review)
    }

    pub fn cancel(&mut self) {
        // Cancel is legal from every state.
        let _ = self.dialog.apply(DialogAction::Cancel);
        self.pad.clear();
    }

    /// Applies a server notification to the cache and forwards it to subscribers.
    pub fn handle_server_event(&mut self, event: ServerEvent) -> Vec<QueryKey> {
        let keys = self.cache.apply_event(&event);
        let _ = self.events.send(ClientEvent::Server(event));
        if !keys.is_empty() {
            let _ = self.events.send(ClientEvent::CacheInvalidated(keys.clone()));
        }
        keys
    }

    fn record_review(&mut self, review: ReviewRecord) {
        self.listing.replace(review);
        self.cache.invalidate(QueryKey::MyReviews);
    }

    fn toast_error(&self, title: &str, err: &ClientError) {
        self.toast(Toast {
            kind: ToastKind::Destructive,
            title: title.to_string(),
            message: err.to_string(),
        });
    }

    fn toast(&self, toast: Toast) {
        let _ = self.events.send(ClientEvent::Toast(toast));
    }
}

fn dialog_error(err: DialogError) -> ClientError {
    ClientError::Precondition(err.to_string())
}

#[cfg(test)]
#[path = "tests/workflow_tests.rs"]
mod tests;
