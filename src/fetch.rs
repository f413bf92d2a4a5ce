// The `fetch` module downloads attachment payloads to local disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use google_gmail1::api::Scope;
use thiserror::Error;
use tokio::fs;
use tracing::info;
use uuid::Uuid;

use crate::utils::google_auth::GmailHubType;

/// The `FetchError` enum defines the possible errors that can occur while
/// downloading an attachment. All of them are isolated to the attachment
/// being processed.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Gmail API error: {0}")]
    Api(String),
    #[error("Attachment {0} carried no data")]
    NoData(String),
    #[error("Failed to write attachment to disk: {0}")]
    Io(#[from] std::io::Error),
}

/// Downloads one attachment and returns the local path it was written to.
#[async_trait]
pub trait AttachmentFetcher: Send + Sync {
    async fn fetch(
        &self,
        message_id: &str,
        attachment_id: &str,
        filename: &str,
    ) -> Result<PathBuf, FetchError>;
}

/// Fetches attachments through the Gmail API into a download directory.
///
/// Each attachment lands in its own uuid-named subdirectory so identically
/// named attachments from different messages never clobber each other, and
/// the later in-place rename stays collision-free.
pub struct GmailAttachmentFetcher {
    hub: GmailHubType,
    download_dir: PathBuf,
}

impl GmailAttachmentFetcher {
    /// Creates a new `GmailAttachmentFetcher`.
    ///
    /// # Arguments
    ///
    /// * `hub` - An authenticated Gmail hub.
    /// * `download_dir` - The directory downloaded attachments are written under.
    pub fn new(hub: GmailHubType, download_dir: PathBuf) -> Self {
        Self { hub, download_dir }
    }
}

/// Reduces an attachment filename to its final component, so a hostile
/// `../../etc/passwd` name cannot escape the download directory.
fn safe_filename(filename: &str) -> String {
    Path::new(filename)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_string())
}

#[async_trait]
impl AttachmentFetcher for GmailAttachmentFetcher {
    async fn fetch(
        &self,
        message_id: &str,
        attachment_id: &str,
        filename: &str,
    ) -> Result<PathBuf, FetchError> {
        let (_, body) = self
            .hub
            .users()
            .messages_attachments_get("me", message_id, attachment_id)
            .add_scope(Scope::Readonly)
            .doit()
            .await
            .map_err(|e| FetchError::Api(e.to_string()))?;

        let data = body
            .data
            .ok_or_else(|| FetchError::NoData(attachment_id.to_string()))?;

        let target_dir = self.download_dir.join(Uuid::new_v4().to_string());
        fs::create_dir_all(&target_dir).await?;

        let local_path = target_dir.join(safe_filename(filename));
        fs::write(&local_path, data).await?;

        info!(
            message_id = %message_id,
            path = %local_path.display(),
            "Downloaded attachment"
        );
        Ok(local_path)
    }
}
