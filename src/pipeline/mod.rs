// The `pipeline` module holds the document classification and naming
// pipeline: the decision core the collaborators feed.

pub mod classifier;
pub mod normalizer;
pub mod orchestrator;
pub mod record;

pub use classifier::{Category, classify_name, classify_record};
pub use orchestrator::{AttachmentOutcome, TriagePipeline};
pub use record::{DocumentType, StructuredRecord};
