//! Document upload and the sidebar refresh that follows it.
//!
//! The upload form is a small state machine kept on the session:
//!
//! ```text
//! idle ──submit()──▶ submitted ──(collection + file present)──▶ uploading ──▶ idle
//!                        ▲                                         │
//!                        └──────────── flag stays set ─────────────┘
//! ```
//!
//! The submitted flag is sticky: it stays set across renders until
//! [`UploadForm::reset`] is called. A successful upload (HTTP 200) triggers
//! exactly one populated re-fetch of the collection list so the new document
//! shows up in the sidebar; any other outcome triggers none.

use crate::backend::{Backend, BackendError};
use crate::collections::list_collections;
use crate::models::Collection;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadForm {
    submitted: bool,
}

impl UploadForm {
    pub fn submit(&mut self) {
        self.submitted = true;
    }

    pub fn reset(&mut self) {
        self.submitted = false;
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }
}

/// What the user put in the upload form.
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    pub collection: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadRequest {
    /// Both a collection name and a chosen file are present.
    pub fn is_ready(&self) -> bool {
        !self.collection.trim().is_empty() && !self.file_name.is_empty()
    }
}

#[derive(Debug)]
pub enum UploadOutcome {
    /// Form not submitted, or collection/file missing.
    Skipped,
    /// The backend rejected or never received the upload.
    Failed(BackendError),
    /// Upload succeeded; `sidebar` is the refreshed, populated listing.
    Uploaded { sidebar: Option<Vec<Collection>> },
}

impl UploadOutcome {
    pub fn is_uploaded(&self) -> bool {
        matches!(self, UploadOutcome::Uploaded { .. })
    }
}

/// Post a file to `POST /document/upload`.
pub async fn upload_document(
    backend: &dyn Backend,
    collection: &str,
    file_name: &str,
    bytes: Vec<u8>,
) -> Result<(), BackendError> {
    backend.upload_document(collection, file_name, bytes).await
}

/// Run the upload step of a render.
///
/// `submitted` is the session's sticky flag as read before the call.
pub async fn handle_upload(
    backend: &dyn Backend,
    submitted: bool,
    request: UploadRequest,
) -> UploadOutcome {
    if !submitted || !request.is_ready() {
        return UploadOutcome::Skipped;
    }

    let UploadRequest {
        collection,
        file_name,
        bytes,
    } = request;

    match upload_document(backend, collection.trim(), &file_name, bytes).await {
        Ok(()) => {
            tracing::info!(collection = %collection, file = %file_name, "upload accepted");
            let sidebar = list_collections(backend, true).await;
            UploadOutcome::Uploaded { sidebar }
        }
        Err(error) => {
            tracing::warn!(collection = %collection, file = %file_name, error = %error, "upload failed");
            UploadOutcome::Failed(error)
        }
    }
}
