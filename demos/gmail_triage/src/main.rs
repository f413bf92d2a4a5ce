// End-to-end wiring: watch a Gmail inbox, extract structured data with
// Gemini, and file attachments into a local archive tree.

use google_gmail1::api::Scope;
use paperflow::{
    Agent, FolderMap, GmailAttachmentFetcher, LocalDriveStore, PlainTextExtractor,
    StructuredExtractor, TriageConfig, TriagePipeline,
    llm::RetryableLLM,
    shutdown::CtrlCShutdown,
    triggers::mail_watch::MailWatchTriggerBuilder,
    utils::google_auth::{GConf, gmail_auth},
};
use rig::{client::CompletionClient, prelude::ProviderClient, providers::gemini::Client, providers::gemini::completion};
use std::path::Path;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    // Initialize the logger.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    // Any failure from here to the first poll is fatal: no partial-agent mode.
    let config = TriageConfig::from_env().expect("incomplete environment configuration");

    let gconf = GConf::new(
        Path::new("./tmp/credential.json").to_path_buf(),
        Path::new("./tmp/token.json").to_path_buf(),
    );
    let hub = gmail_auth(gconf, &[Scope::Readonly])
        .await
        .expect("Gmail authentication failed");
    info!("Gmail hub ready");

    let trigger = MailWatchTriggerBuilder::new(hub.clone())
        .with_interval(config.poll_interval)
        .with_query(&config.mailbox_query)
        .build();

    let fetcher = GmailAttachmentFetcher::new(hub, config.download_dir.clone());

    let store = LocalDriveStore::new(config.archive_root.clone());
    let folders = FolderMap::provision(&store)
        .await
        .expect("failed to provision category folders");

    // Gemini behind the retry decorator; GEMINI_API_KEY from the environment.
    let gemini_client = Client::from_env();
    let gemini_agent = gemini_client
        .agent(completion::GEMINI_2_0_FLASH_LITE)
        .preamble("You extract structured data from business documents and reply with JSON only.")
        .temperature(0.0)
        .build();
    let llm = RetryableLLM::new(Box::new(gemini_agent), 3);

    let extractor =
        StructuredExtractor::new(Box::new(llm)).expect("failed to build the extraction prompt");

    let pipeline = TriagePipeline::new(
        Box::new(fetcher),
        Box::new(PlainTextExtractor),
        Box::new(store),
        folders,
    )
    .with_structured_extractor(extractor);

    Agent::new(pipeline)
        .add_trigger(Box::new(trigger))
        .with_shutdown_handler(CtrlCShutdown::new())
        .run()
        .await;

    info!("Agent run completed");
}
