//! Client side of the document acknowledgment workflow.

pub mod api;
pub mod cache;
pub mod dialog;
pub mod error;
pub mod events;
pub mod render;
pub mod signature;
pub mod workflow;

pub use api::{HttpReviewClient, ReviewApi};
pub use cache::{QueryCache, QueryKey};
pub use dialog::{DialogAction, DialogError, DialogState, DialogView, SignOrigin};
pub use error::ClientError;
pub use events::EventStream;
pub use signature::SignaturePad;
pub use workflow::{ClientEvent, ReviewListing, ReviewWorkflow, Toast, ToastKind};
