//! # Paperflow: an email-attachment triage agent.
//!
//! Watches a mailbox for messages with attachments, downloads each
//! attachment, classifies it by document type, renames it from extracted
//! structured data, and files it into per-category folders.

/// The `agent` module runs the event loop connecting triggers to the pipeline.
pub mod agent;
/// The `config` module holds the runtime settings built at startup.
pub mod config;
/// The `extract` module converts files to text and text to structured records.
pub mod extract;
/// The `fetch` module downloads attachments to local disk.
pub mod fetch;
/// The `llm` module provides a trait for interacting with language models.
pub mod llm;
/// The `pipeline` module is the classification and naming core.
pub mod pipeline;
/// The `shutdown` module provides a trait for gracefully shutting down the agent.
pub mod shutdown;
/// The `store` module files processed documents into folders.
pub mod store;
/// The `triggers` module provides the event sources the agent listens to.
pub mod triggers;
/// The `utils` module provides authentication and templating helpers.
pub mod utils;

pub use agent::Agent;
pub use config::TriageConfig;
pub use extract::{PlainTextExtractor, StructuredExtractor, TextExtractor};
pub use fetch::{AttachmentFetcher, GmailAttachmentFetcher};
pub use pipeline::{AttachmentOutcome, Category, StructuredRecord, TriagePipeline};
pub use store::{DriveStore, FolderMap, LocalDriveStore};
pub use triggers::{MailWatchTrigger, mail_watch::MailWatchTriggerBuilder};
