use crate::pipeline::TriagePipeline;
use crate::shutdown::Shutdown;
use crate::triggers::{Trigger, event::MailEvent, event::TEvent};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// The triage agent: a set of triggers feeding one event loop that runs
/// the pipeline on each mail event, one event at a time.
pub struct Agent {
    triggers: Vec<Box<dyn Trigger>>,
    shutdown_handler: Option<Box<dyn Shutdown>>,
    pipeline: TriagePipeline,
    inflight: AtomicUsize,
}

impl Agent {
    pub fn new(pipeline: TriagePipeline) -> Self {
        Agent {
            triggers: Vec::new(),
            shutdown_handler: None,
            pipeline,
            inflight: AtomicUsize::new(0),
        }
    }

    pub fn add_trigger(mut self, t: Box<dyn Trigger>) -> Self {
        self.triggers.push(t);
        self
    }

    pub fn with_shutdown_handler(mut self, handler: impl Shutdown + 'static) -> Self {
        self.shutdown_handler = Some(Box::new(handler));
        self
    }

    pub async fn run(mut self) {
        let (_, event_rx, shutdown_tx, trigger_handles) = self.launch_triggers().await;

        if let Some(mut handler) = self.shutdown_handler.take() {
            tokio::select! {
                _ = self.event_loop(event_rx) => {
                    info!("Event loop completed normally");
                },
                _ = handler.wait_for_signal() => {
                    info!("External shutdown signal triggered termination");
                }
            }
        } else {
            self.event_loop(event_rx).await;
        }

        self.shutdown_triggers(shutdown_tx, trigger_handles).await;

        info!("Agent has shut down gracefully");
    }

    async fn event_loop(&mut self, mut event_rx: mpsc::Receiver<TEvent>) {
        info!("Agent event loop started, waiting for events");
        while let Some(event) = event_rx.recv().await {
            info!(event_name = %event.name, "Received event");

            self.process_single_event(event).await;
        }
        debug!("Event loop terminated - no more events to process");
    }

    async fn process_single_event(&mut self, event: TEvent) {
        let Some(mail_event) = MailEvent::from_event(&event) else {
            // Payload missing the message id or the attachment list.
            warn!(event_name = %event.name, "Event payload is not a mail event, ignoring");
            return;
        };

        self.inflight.fetch_add(1, Ordering::Relaxed);
        let outcomes = self.pipeline.process_event(&mail_event).await;
        self.inflight.fetch_sub(1, Ordering::Relaxed);

        info!(
            message_id = %mail_event.message_id,
            processed = outcomes.len(),
            "Finished mail event"
        );
    }

    async fn launch_triggers(
        &self,
    ) -> (
        mpsc::Sender<TEvent>,
        mpsc::Receiver<TEvent>,
        broadcast::Sender<()>,
        Vec<JoinHandle<()>>,
    ) {
        let (event_tx, event_rx) = mpsc::channel(100);
        let (shutdown_tx, _) = broadcast::channel(1);
        let mut trigger_handles = Vec::new();

        info!(trigger_count = self.triggers.len(), "Launching triggers");
        for (index, trigger) in self.triggers.iter().enumerate() {
            let shutdown_rx = shutdown_tx.subscribe();
            match trigger.launch(event_tx.clone(), shutdown_rx).await {
                Ok(handle) => {
                    debug!(trigger_index = index, "Trigger launched successfully");
                    trigger_handles.push(handle);
                }
                Err(e) => {
                    error!(trigger_index = index, error = %e, "Failed to launch trigger");
                }
            }
        }
        info!(
            launched_count = trigger_handles.len(),
            "All triggers launched"
        );

        (event_tx, event_rx, shutdown_tx, trigger_handles)
    }

    async fn shutdown_triggers(
        &self,
        shutdown_tx: broadcast::Sender<()>,
        trigger_handles: Vec<JoinHandle<()>>,
    ) {
        info!(
            trigger_count = trigger_handles.len(),
            "Sending shutdown signal to all triggers"
        );
        let _ = shutdown_tx.send(());
        debug!("Waiting for triggers to terminate");
        for (index, handle) in trigger_handles.into_iter().enumerate() {
            if let Err(e) = handle.await {
                error!(
                    trigger_index = index,
                    error = %e,
                    "Error waiting for trigger to terminate"
                );
            } else {
                debug!(trigger_index = index, "Trigger terminated successfully");
            }
        }
        info!("All triggers have been shut down");
        let abandoned = self.inflight.load(Ordering::Relaxed);
        if abandoned != 0 {
            // The event loop future was cancelled mid-pipeline: the
            // attachment's downloaded file stays on disk with no
            // compensation, and the message is re-delivered after restart.
            warn!(abandoned, "Shutdown abandoned an in-flight event");
        }
    }
}
