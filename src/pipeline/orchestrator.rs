// The `orchestrator` module sequences one attachment through download,
// extraction, classification, renaming, and upload.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, error, info, warn};

use crate::extract::{StructuredExtractor, TextExtractor};
use crate::fetch::AttachmentFetcher;
use crate::store::{DriveStore, FolderMap};
use crate::triggers::event::{AttachmentRef, MailEvent};

use super::classifier::{Category, classify_name, classify_record};
use super::normalizer;

/// What happened to one attachment. One value per attachment is returned
/// from [`TriagePipeline::process_event`]; failures are data, not errors,
/// because they never abort the batch.
#[derive(Debug)]
pub enum AttachmentOutcome {
    Uploaded {
        filename: String,
        category: Category,
        uploaded_as: String,
    },
    Skipped {
        filename: String,
        reason: String,
    },
}

/// The triage pipeline: collaborators plus the startup folder map.
///
/// Without a structured extractor the pipeline runs in keyword mode,
/// classifying by the attachment's original filename and never touching
/// the document content. With one, document text is extracted and the
/// model's record drives both the category and the new filename; every
/// failure along that path degrades to `Uncategorized` under the original
/// name rather than dropping the attachment.
pub struct TriagePipeline {
    fetcher: Box<dyn AttachmentFetcher>,
    text: Box<dyn TextExtractor>,
    structured: Option<StructuredExtractor>,
    store: Box<dyn DriveStore>,
    folders: FolderMap,
}

impl TriagePipeline {
    /// Creates a pipeline in keyword mode.
    pub fn new(
        fetcher: Box<dyn AttachmentFetcher>,
        text: Box<dyn TextExtractor>,
        store: Box<dyn DriveStore>,
        folders: FolderMap,
    ) -> Self {
        Self {
            fetcher,
            text,
            structured: None,
            store,
            folders,
        }
    }

    /// Enables structured extraction through the given extractor.
    pub fn with_structured_extractor(mut self, extractor: StructuredExtractor) -> Self {
        self.structured = Some(extractor);
        self
    }

    /// Processes every attachment of one mail event, strictly in order.
    ///
    /// Attachments are independent: an attachment that fails at any stage
    /// is reported as skipped and the rest still run.
    pub async fn process_event(&mut self, event: &MailEvent) -> Vec<AttachmentOutcome> {
        info!(
            message_id = %event.message_id,
            attachment_count = event.attachments.len(),
            "Processing mail event"
        );

        let mut outcomes = Vec::with_capacity(event.attachments.len());
        for attachment in &event.attachments {
            let outcome = self.process_attachment(&event.message_id, attachment).await;
            match &outcome {
                AttachmentOutcome::Uploaded {
                    category,
                    uploaded_as,
                    ..
                } => {
                    info!(filename = %attachment.filename, category = %category, uploaded_as = %uploaded_as, "Attachment filed");
                }
                AttachmentOutcome::Skipped { reason, .. } => {
                    warn!(filename = %attachment.filename, reason = %reason, "Attachment skipped");
                }
            }
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn process_attachment(
        &mut self,
        message_id: &str,
        attachment: &AttachmentRef,
    ) -> AttachmentOutcome {
        let local = match self
            .fetcher
            .fetch(message_id, &attachment.attachment_id, &attachment.filename)
            .await
        {
            Ok(path) => path,
            Err(e) => {
                return AttachmentOutcome::Skipped {
                    filename: attachment.filename.clone(),
                    reason: format!("download failed: {e}"),
                };
            }
        };

        let (category, path) = self.classify_and_rename(local, &attachment.filename).await;

        let Some(folder) = self.folders.get(category) else {
            // The folder map covers Category::ALL at startup, so this is a
            // configuration error, not a pipeline failure.
            error!(category = %category, "No folder provisioned for category");
            return AttachmentOutcome::Skipped {
                filename: attachment.filename.clone(),
                reason: format!("no folder provisioned for {category}"),
            };
        };

        match self.store.upload(&path, folder).await {
            Ok(uploaded_as) => {
                Self::discard_local(&path).await;
                AttachmentOutcome::Uploaded {
                    filename: attachment.filename.clone(),
                    category,
                    uploaded_as,
                }
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Upload failed");
                AttachmentOutcome::Skipped {
                    filename: attachment.filename.clone(),
                    reason: format!("upload failed: {e}"),
                }
            }
        }
    }

    /// Removes a filed attachment's local copy and its per-attachment
    /// directory. A skipped attachment keeps its download so the partial
    /// state stays inspectable; a successfully filed one has no reason to
    /// keep accumulating under the download directory.
    async fn discard_local(path: &Path) {
        if let Err(e) = fs::remove_file(path).await {
            debug!(path = %path.display(), error = %e, "Could not remove local copy");
            return;
        }
        if let Some(parent) = path.parent() {
            // Non-recursive: only succeeds once the directory is empty.
            let _ = fs::remove_dir(parent).await;
        }
    }

    /// Resolves the category and final path for a downloaded attachment.
    async fn classify_and_rename(
        &mut self,
        local: PathBuf,
        original_name: &str,
    ) -> (Category, PathBuf) {
        let Some(extractor) = self.structured.as_mut() else {
            return (classify_name(original_name), local);
        };

        let text = match self.text.extract(&local).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                debug!(path = %local.display(), "Extracted text is empty");
                return (Category::Uncategorized, local);
            }
            Err(e) => {
                warn!(path = %local.display(), error = %e, "Text extraction failed");
                return (Category::Uncategorized, local);
            }
        };

        let record = match extractor.extract_record(&text).await {
            Ok(record) => record,
            Err(e) => {
                warn!(path = %local.display(), error = %e, "Structured extraction failed");
                return (Category::Uncategorized, local);
            }
        };

        let category = classify_record(&record);
        let renamed = normalizer::apply(&record, &local).await;
        (category, renamed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractError;
    use crate::fetch::FetchError;
    use crate::llm::{LLM, LLMError};
    use crate::store::{FolderId, LocalDriveStore, StoreError};
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::path::Path;
    use tempfile::TempDir;

    struct StubFetcher {
        dir: PathBuf,
        contents: HashMap<String, Vec<u8>>,
        fail: HashSet<String>,
    }

    impl StubFetcher {
        fn new(dir: &Path) -> Self {
            Self {
                dir: dir.to_path_buf(),
                contents: HashMap::new(),
                fail: HashSet::new(),
            }
        }

        fn with_content(mut self, filename: &str, content: &str) -> Self {
            self.contents.insert(filename.to_string(), content.into());
            self
        }

        fn failing_for(mut self, filename: &str) -> Self {
            self.fail.insert(filename.to_string());
            self
        }
    }

    #[async_trait]
    impl AttachmentFetcher for StubFetcher {
        async fn fetch(
            &self,
            _message_id: &str,
            attachment_id: &str,
            filename: &str,
        ) -> Result<PathBuf, FetchError> {
            if self.fail.contains(filename) {
                return Err(FetchError::Api("backend unavailable".to_string()));
            }
            let dir = self.dir.join(attachment_id);
            tokio::fs::create_dir_all(&dir).await?;
            let path = dir.join(filename);
            let content = self.contents.get(filename).cloned().unwrap_or_default();
            tokio::fs::write(&path, content).await?;
            Ok(path)
        }
    }

    /// Returns the file's own bytes as text, except for names listed as
    /// failing, which behave like an OCR outage.
    struct StubTextExtractor {
        fail: HashSet<String>,
    }

    impl StubTextExtractor {
        fn new() -> Self {
            Self {
                fail: HashSet::new(),
            }
        }

        fn failing_for(mut self, filename: &str) -> Self {
            self.fail.insert(filename.to_string());
            self
        }
    }

    #[async_trait]
    impl TextExtractor for StubTextExtractor {
        async fn extract(&self, path: &Path) -> Result<String, ExtractError> {
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            if self.fail.contains(&name) {
                return Err(ExtractError::Unsupported("pdf".to_string()));
            }
            let bytes = tokio::fs::read(path).await?;
            String::from_utf8(bytes).map_err(|_| ExtractError::NotText)
        }
    }

    struct CannedLLM {
        reply: String,
    }

    #[async_trait]
    impl LLM for CannedLLM {
        async fn prompt(&mut self, _prompt: String) -> Result<String, LLMError> {
            Ok(self.reply.clone())
        }
    }

    /// A store that rejects uploads of specific filenames.
    struct FlakyStore {
        inner: LocalDriveStore,
        reject: HashSet<String>,
    }

    impl FlakyStore {
        fn new(root: &Path, reject: &[&str]) -> Self {
            Self {
                inner: LocalDriveStore::new(root.to_path_buf()),
                reject: reject.iter().map(|s| s.to_string()).collect(),
            }
        }
    }

    #[async_trait]
    impl DriveStore for FlakyStore {
        async fn ensure_folder(&self, name: &str) -> Result<FolderId, StoreError> {
            self.inner.ensure_folder(name).await
        }

        async fn upload(&self, local_path: &Path, folder: &FolderId) -> Result<String, StoreError> {
            let name = local_path.file_name().unwrap().to_string_lossy().into_owned();
            if self.reject.contains(&name) {
                return Err(StoreError::Rejected("quota exceeded".to_string()));
            }
            self.inner.upload(local_path, folder).await
        }
    }

    fn event(attachments: &[(&str, &str)]) -> MailEvent {
        MailEvent {
            message_id: "msg-1".to_string(),
            attachments: attachments
                .iter()
                .map(|(filename, id)| AttachmentRef {
                    filename: filename.to_string(),
                    attachment_id: id.to_string(),
                })
                .collect(),
        }
    }

    async fn drive_with_folders(root: &Path) -> (LocalDriveStore, FolderMap) {
        let store = LocalDriveStore::new(root.to_path_buf());
        let folders = FolderMap::provision(&store).await.unwrap();
        (store, folders)
    }

    #[tokio::test]
    async fn keyword_mode_files_by_filename() {
        let tmp = TempDir::new().unwrap();
        let (store, folders) = drive_with_folders(&tmp.path().join("drive")).await;
        let fetcher = StubFetcher::new(&tmp.path().join("dl")).with_content("invoice_42.txt", "x");

        let mut pipeline = TriagePipeline::new(
            Box::new(fetcher),
            Box::new(StubTextExtractor::new()),
            Box::new(store),
            folders,
        );

        let outcomes = pipeline.process_event(&event(&[("invoice_42.txt", "a1")])).await;

        match &outcomes[0] {
            AttachmentOutcome::Uploaded {
                category,
                uploaded_as,
                ..
            } => {
                assert_eq!(*category, Category::Invoices);
                assert_eq!(uploaded_as, "invoice_42.txt");
            }
            other => panic!("expected upload, got {other:?}"),
        }
        assert!(
            tmp.path()
                .join("drive")
                .join("Invoices")
                .join("invoice_42.txt")
                .exists()
        );
    }

    #[tokio::test]
    async fn filed_attachment_leaves_no_local_copy() {
        let tmp = TempDir::new().unwrap();
        let (store, folders) = drive_with_folders(&tmp.path().join("drive")).await;
        let download_dir = tmp.path().join("dl");
        let fetcher = StubFetcher::new(&download_dir).with_content("invoice_42.txt", "x");

        let mut pipeline = TriagePipeline::new(
            Box::new(fetcher),
            Box::new(StubTextExtractor::new()),
            Box::new(store),
            folders,
        );

        let outcomes = pipeline.process_event(&event(&[("invoice_42.txt", "a1")])).await;

        assert!(matches!(&outcomes[0], AttachmentOutcome::Uploaded { .. }));
        // The download and its per-attachment directory are gone once the
        // file is in the drive; polling forever must not fill the disk.
        assert!(!download_dir.join("a1").join("invoice_42.txt").exists());
        assert!(!download_dir.join("a1").exists());
        assert!(
            tmp.path()
                .join("drive")
                .join("Invoices")
                .join("invoice_42.txt")
                .exists()
        );
    }

    #[tokio::test]
    async fn text_extraction_failure_degrades_to_uncategorized() {
        let tmp = TempDir::new().unwrap();
        let (store, folders) = drive_with_folders(&tmp.path().join("drive")).await;
        let fetcher =
            StubFetcher::new(&tmp.path().join("dl")).with_content("invoice_march.pdf", "%PDF");
        let llm = CannedLLM {
            reply: "never reached".to_string(),
        };

        let mut pipeline = TriagePipeline::new(
            Box::new(fetcher),
            Box::new(StubTextExtractor::new().failing_for("invoice_march.pdf")),
            Box::new(store),
            folders,
        )
        .with_structured_extractor(StructuredExtractor::new(Box::new(llm)).unwrap());

        let outcomes = pipeline
            .process_event(&event(&[("invoice_march.pdf", "a1")]))
            .await;

        // Original filename kept, filed as Uncategorized despite the
        // "invoice" keyword: keyword mode does not apply once a structured
        // extractor is configured.
        match &outcomes[0] {
            AttachmentOutcome::Uploaded {
                category,
                uploaded_as,
                ..
            } => {
                assert_eq!(*category, Category::Uncategorized);
                assert_eq!(uploaded_as, "invoice_march.pdf");
            }
            other => panic!("expected upload, got {other:?}"),
        }
        assert!(
            tmp.path()
                .join("drive")
                .join("Uncategorized")
                .join("invoice_march.pdf")
                .exists()
        );
    }

    #[tokio::test]
    async fn malformed_llm_reply_degrades_to_uncategorized() {
        let tmp = TempDir::new().unwrap();
        let (store, folders) = drive_with_folders(&tmp.path().join("drive")).await;
        let fetcher =
            StubFetcher::new(&tmp.path().join("dl")).with_content("scan.txt", "some document");
        let llm = CannedLLM {
            reply: "Sorry, I cannot help with that.".to_string(),
        };

        let mut pipeline = TriagePipeline::new(
            Box::new(fetcher),
            Box::new(StubTextExtractor::new()),
            Box::new(store),
            folders,
        )
        .with_structured_extractor(StructuredExtractor::new(Box::new(llm)).unwrap());

        let outcomes = pipeline.process_event(&event(&[("scan.txt", "a1")])).await;

        match &outcomes[0] {
            AttachmentOutcome::Uploaded {
                category,
                uploaded_as,
                ..
            } => {
                assert_eq!(*category, Category::Uncategorized);
                assert_eq!(uploaded_as, "scan.txt");
            }
            other => panic!("expected upload, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn structured_extraction_renames_and_files() {
        let tmp = TempDir::new().unwrap();
        let (store, folders) = drive_with_folders(&tmp.path().join("drive")).await;
        let fetcher = StubFetcher::new(&tmp.path().join("dl"))
            .with_content("att.pdf", "Invoice 1001 from Acme, 2024-05-01");
        let llm = CannedLLM {
            reply: "```json\n{\"document_type\": \"Invoice\", \"vendor_name\": \"Acme\", \
                    \"document_id\": \"1001\", \"document_date\": \"2024-05-01\"}\n```"
                .to_string(),
        };

        let mut pipeline = TriagePipeline::new(
            Box::new(fetcher),
            Box::new(StubTextExtractor::new()),
            Box::new(store),
            folders,
        )
        .with_structured_extractor(StructuredExtractor::new(Box::new(llm)).unwrap());

        let outcomes = pipeline.process_event(&event(&[("att.pdf", "a1")])).await;

        match &outcomes[0] {
            AttachmentOutcome::Uploaded {
                category,
                uploaded_as,
                ..
            } => {
                assert_eq!(*category, Category::Invoices);
                assert_eq!(uploaded_as, "2024-05-01_Acme_1001.pdf");
            }
            other => panic!("expected upload, got {other:?}"),
        }
        assert!(
            tmp.path()
                .join("drive")
                .join("Invoices")
                .join("2024-05-01_Acme_1001.pdf")
                .exists()
        );
    }

    #[tokio::test]
    async fn one_failing_attachment_does_not_stop_the_rest() {
        let tmp = TempDir::new().unwrap();
        let drive_root = tmp.path().join("drive");
        let store = FlakyStore::new(&drive_root, &["receipt_a.txt"]);
        let folders = FolderMap::provision(&store).await.unwrap();
        let fetcher = StubFetcher::new(&tmp.path().join("dl"))
            .with_content("receipt_a.txt", "a")
            .with_content("receipt_b.txt", "b");

        let mut pipeline = TriagePipeline::new(
            Box::new(fetcher),
            Box::new(StubTextExtractor::new()),
            Box::new(store),
            folders,
        );

        let outcomes = pipeline
            .process_event(&event(&[("receipt_a.txt", "a1"), ("receipt_b.txt", "a2")]))
            .await;

        assert!(matches!(&outcomes[0], AttachmentOutcome::Skipped { reason, .. } if reason.contains("upload failed")));
        match &outcomes[1] {
            AttachmentOutcome::Uploaded { uploaded_as, .. } => {
                assert_eq!(uploaded_as, "receipt_b.txt");
            }
            other => panic!("expected second attachment uploaded, got {other:?}"),
        }
        assert!(drive_root.join("Receipts").join("receipt_b.txt").exists());
        // The rejected attachment's download stays behind for inspection;
        // only filed attachments are cleaned up.
        assert!(tmp.path().join("dl").join("a1").join("receipt_a.txt").exists());
        assert!(!tmp.path().join("dl").join("a2").join("receipt_b.txt").exists());
    }

    #[tokio::test]
    async fn download_failure_skips_only_that_attachment() {
        let tmp = TempDir::new().unwrap();
        let (store, folders) = drive_with_folders(&tmp.path().join("drive")).await;
        let fetcher = StubFetcher::new(&tmp.path().join("dl"))
            .failing_for("gone.txt")
            .with_content("receipt.txt", "lunch");

        let mut pipeline = TriagePipeline::new(
            Box::new(fetcher),
            Box::new(StubTextExtractor::new()),
            Box::new(store),
            folders,
        );

        let outcomes = pipeline
            .process_event(&event(&[("gone.txt", "a1"), ("receipt.txt", "a2")]))
            .await;

        assert!(matches!(&outcomes[0], AttachmentOutcome::Skipped { reason, .. } if reason.contains("download failed")));
        assert!(matches!(&outcomes[1], AttachmentOutcome::Uploaded { .. }));
    }

    #[tokio::test]
    async fn missing_folder_is_reported_not_fatal() {
        let tmp = TempDir::new().unwrap();
        let store = LocalDriveStore::new(tmp.path().join("drive"));
        // Deliberately partial map: no Invoices folder.
        let uncategorized = store.ensure_folder("Uncategorized").await.unwrap();
        let folders = FolderMap::from_entries([(Category::Uncategorized, uncategorized)]);
        let fetcher = StubFetcher::new(&tmp.path().join("dl"))
            .with_content("invoice.txt", "x")
            .with_content("note.txt", "y");

        let mut pipeline = TriagePipeline::new(
            Box::new(fetcher),
            Box::new(StubTextExtractor::new()),
            Box::new(store),
            folders,
        );

        let outcomes = pipeline
            .process_event(&event(&[("invoice.txt", "a1"), ("note.txt", "a2")]))
            .await;

        assert!(matches!(&outcomes[0], AttachmentOutcome::Skipped { reason, .. } if reason.contains("no folder")));
        assert!(matches!(&outcomes[1], AttachmentOutcome::Uploaded { .. }));
    }
}
