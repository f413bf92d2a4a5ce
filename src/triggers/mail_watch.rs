// The `mail_watch` module provides a trigger that polls a Gmail mailbox for
// unread messages carrying attachments.

use crate::triggers::{Trigger, TriggerError, event::AttachmentRef, event::MailEvent, event::TEvent};
use crate::utils::google_auth::GmailHubType;
use async_trait::async_trait;
use google_gmail1::api::{MessagePart, Scope};
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A builder for [`MailWatchTrigger`].
pub struct MailWatchTriggerBuilder {
    hub: GmailHubType,
    interval: Duration,
    query: String,
}

impl MailWatchTriggerBuilder {
    /// Creates a new `MailWatchTriggerBuilder` with the default mailbox
    /// query and a two-minute poll interval.
    ///
    /// # Arguments
    ///
    /// * `hub` - An authenticated Gmail hub.
    pub fn new(hub: GmailHubType) -> Self {
        Self {
            hub,
            interval: Duration::from_secs(120),
            query: "is:unread has:attachment".to_string(),
        }
    }

    /// Sets the poll interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets the Gmail search query selecting the messages to triage.
    pub fn with_query(mut self, query: &str) -> Self {
        self.query = query.to_string();
        self
    }

    /// Builds a `MailWatchTrigger`.
    pub fn build(self) -> MailWatchTrigger {
        MailWatchTrigger {
            hub: self.hub,
            interval: self.interval,
            query: self.query,
        }
    }
}

/// A trigger that polls Gmail and emits one event per matching message.
///
/// The trigger never marks anything read, so a matching message keeps
/// showing up in the query result on every poll. A [`DeliveryLog`] inside
/// the poll task suppresses the repeats: each message is emitted at most
/// once per process run. A message whose metadata fetch failed is not
/// logged and gets another chance on the next poll, and a restart starts
/// with an empty log, re-delivering anything still unread.
pub struct MailWatchTrigger {
    hub: GmailHubType,
    interval: Duration,
    query: String,
}

/// Remembers the message ids already handed to the agent.
struct DeliveryLog {
    delivered: HashSet<String>,
}

impl DeliveryLog {
    fn new() -> Self {
        Self {
            delivered: HashSet::new(),
        }
    }

    fn is_delivered(&self, message_id: &str) -> bool {
        self.delivered.contains(message_id)
    }

    fn mark_delivered(&mut self, message_id: &str) {
        self.delivered.insert(message_id.to_string());
    }
}

/// Walks a MIME tree collecting the parts that are real attachments
/// (a filename plus a server-side attachment id).
fn collect_attachments(part: &MessagePart, out: &mut Vec<AttachmentRef>) {
    if let (Some(filename), Some(body)) = (&part.filename, &part.body) {
        if !filename.is_empty() {
            if let Some(attachment_id) = &body.attachment_id {
                out.push(AttachmentRef {
                    filename: filename.clone(),
                    attachment_id: attachment_id.clone(),
                });
            }
        }
    }
    if let Some(parts) = &part.parts {
        for child in parts {
            collect_attachments(child, out);
        }
    }
}

#[async_trait]
impl Trigger for MailWatchTrigger {
    /// Launches the trigger's long-running task.
    async fn launch(
        &self,
        tx: mpsc::Sender<TEvent>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<JoinHandle<()>, TriggerError> {
        let hub = self.hub.clone();
        let interval = self.interval;
        let query = self.query.clone();

        let task_handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            let mut log = DeliveryLog::new();
            info!(interval_secs = interval.as_secs(), query = %query, "MailWatchTrigger started");

            'outer: loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("MailWatchTrigger received shutdown signal, terminating");
                        break;
                    }

                    _ = ticker.tick() => {
                        let listing = match hub.users().messages_list("me").q(&query).doit().await {
                            Ok((_, listing)) => listing,
                            Err(e) => {
                                warn!(error = %e, "Message listing failed, retrying next poll");
                                continue;
                            }
                        };

                        let Some(messages) = listing.messages else { continue };
                        for stub in messages {
                            let Some(message_id) = stub.id else { continue };
                            if log.is_delivered(&message_id) {
                                debug!(message_id = %message_id, "Already delivered, skipping");
                                continue;
                            }

                            let message = match hub
                                .users()
                                .messages_get("me", &message_id)
                                .add_scope(Scope::Readonly)
                                .doit()
                                .await
                            {
                                Ok((_, message)) => message,
                                Err(e) => {
                                    warn!(message_id = %message_id, error = %e, "Message fetch failed, skipping");
                                    continue;
                                }
                            };

                            let mut attachments = Vec::new();
                            if let Some(payload) = &message.payload {
                                collect_attachments(payload, &mut attachments);
                            }
                            if attachments.is_empty() {
                                debug!(message_id = %message_id, "No attachment parts, skipping");
                                log.mark_delivered(&message_id);
                                continue;
                            }

                            let event = MailEvent {
                                message_id: message_id.clone(),
                                attachments,
                            }
                            .into_tevent();

                            if tx.send(event).await.is_err() {
                                warn!("Main channel closed, stopping trigger");
                                break 'outer;
                            }
                            log.mark_delivered(&message_id);
                        }
                    }
                }
            }
            debug!("MailWatchTrigger task completed");
        });

        Ok(task_handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use google_gmail1::api::MessagePartBody;

    fn attachment_part(filename: &str, attachment_id: Option<&str>) -> MessagePart {
        MessagePart {
            filename: Some(filename.to_string()),
            body: Some(MessagePartBody {
                attachment_id: attachment_id.map(str::to_string),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn collects_attachments_from_nested_parts() {
        let root = MessagePart {
            parts: Some(vec![
                attachment_part("", None), // text body: empty filename
                attachment_part("invoice.pdf", Some("att-1")),
                MessagePart {
                    parts: Some(vec![attachment_part("receipt.png", Some("att-2"))]),
                    ..Default::default()
                },
            ]),
            ..Default::default()
        };

        let mut found = Vec::new();
        collect_attachments(&root, &mut found);

        assert_eq!(
            found,
            vec![
                AttachmentRef {
                    filename: "invoice.pdf".to_string(),
                    attachment_id: "att-1".to_string(),
                },
                AttachmentRef {
                    filename: "receipt.png".to_string(),
                    attachment_id: "att-2".to_string(),
                },
            ]
        );
    }

    #[test]
    fn a_message_is_delivered_at_most_once() {
        let mut log = DeliveryLog::new();

        // First poll: two unread messages, both emitted and logged.
        for id in ["msg-1", "msg-2"] {
            assert!(!log.is_delivered(id));
            log.mark_delivered(id);
        }

        // Second poll: nothing marked the mail read, so the query returns
        // the same ids again, plus a new arrival.
        assert!(log.is_delivered("msg-1"));
        assert!(log.is_delivered("msg-2"));
        assert!(!log.is_delivered("msg-3"));
    }

    #[test]
    fn a_message_skipped_on_fetch_failure_is_retried() {
        let mut log = DeliveryLog::new();

        // The metadata fetch for msg-1 failed, so it was never logged.
        log.mark_delivered("msg-2");

        assert!(!log.is_delivered("msg-1"));
    }

    #[test]
    fn inline_parts_without_attachment_id_are_skipped() {
        // A named part whose body carries inline data but no attachment id.
        let part = attachment_part("logo.png", None);
        let mut found = Vec::new();
        collect_attachments(&part, &mut found);
        assert!(found.is_empty());
    }
}
