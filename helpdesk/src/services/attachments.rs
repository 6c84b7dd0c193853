//! Attachments service
//!
//! Uploads avatars and ticket attachments, and downloads them into the
//! local blob store behind scoped leases.

use super::notifications::NotificationCenter;
use super::resource::failure_message;
use crate::api::{ApiClient, UploadedFile};
use crate::error::Result;
use crate::forms::ValidationErrors;
use crate::storage::{BlobLease, BlobStore};

/// Service for uploading and displaying files
#[derive(Clone)]
pub struct AttachmentsService {
    api: ApiClient,
    blob_store: BlobStore,
    notifications: NotificationCenter,
}

impl AttachmentsService {
    pub fn new(api: ApiClient, blob_store: BlobStore, notifications: NotificationCenter) -> Self {
        Self {
            api,
            blob_store,
            notifications,
        }
    }

    pub fn blob_store(&self) -> &BlobStore {
        &self.blob_store
    }

    /// Upload a file; returns the backend's file record
    pub async fn upload(&self, filename: &str, mime_type: &str, data: &[u8]) -> Result<UploadedFile> {
        let safe_filename = sanitize_filename(filename);

        let mut errors = ValidationErrors::new();
        if safe_filename.trim().is_empty() {
            errors.add("file_name", "File name is required");
        }
        if data.is_empty() {
            errors.add("content", "File is empty");
        }
        errors.into_result()?;

        tracing::info!("Uploading attachment: {} ({} bytes)", safe_filename, data.len());

        let uploaded = match self.api.upload_file(&safe_filename, mime_type, data).await {
            Ok(uploaded) => uploaded,
            Err(e) => {
                self.notifications.error(failure_message("upload", "file", &e));
                return Err(e);
            }
        };

        tracing::info!("Attachment uploaded: {}", uploaded.id);
        Ok(uploaded)
    }

    /// Download a file into the blob store; the cache entry lives as long as the lease
    pub async fn fetch(&self, file_id: &str) -> Result<BlobLease> {
        let data = self.api.download_file(file_id).await?;
        self.blob_store.acquire(&data).await
    }
}

/// Holds the blob for whichever file a view currently displays.
///
/// Showing a different file (or nothing) releases the previous lease
/// before the next download starts; dropping the slot releases it too.
pub struct BlobSlot {
    service: AttachmentsService,
    current: Option<(String, BlobLease)>,
}

impl BlobSlot {
    pub fn new(service: AttachmentsService) -> Self {
        Self {
            service,
            current: None,
        }
    }

    /// Point the slot at `file_id`, fetching only when the id changed
    pub async fn show(&mut self, file_id: Option<&str>) -> Result<Option<&BlobLease>> {
        let unchanged = match (&self.current, file_id) {
            (Some((current_id, _)), Some(id)) => current_id == id,
            (None, None) => true,
            _ => false,
        };

        if !unchanged {
            self.current = None;

            if let Some(id) = file_id {
                let lease = self.service.fetch(id).await?;
                self.current = Some((id.to_string(), lease));
            }
        }

        Ok(self.lease())
    }

    pub fn file_id(&self) -> Option<&str> {
        self.current.as_ref().map(|(id, _)| id.as_str())
    }

    pub fn lease(&self) -> Option<&BlobLease> {
        self.current.as_ref().map(|(_, lease)| lease)
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}

/// Strip path separators and null bytes, capped at 255 characters
fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .filter(|c| *c != '/' && *c != '\\' && *c != '\0')
        .take(255)
        .collect()
}
