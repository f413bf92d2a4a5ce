use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// The raw event a trigger hands to the agent.
#[derive(Serialize, Debug)]
pub struct TEvent {
    pub name: String,
    pub payload: Option<Value>,
}

/// One attachment announced in a mail event.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRef {
    pub filename: String,
    #[serde(rename = "attachmentId")]
    pub attachment_id: String,
}

/// A new-mail event decoded at the boundary.
///
/// Triggers emit the payload as JSON; [`MailEvent::from_event`] decodes it
/// back into typed form before anything downstream touches it. A payload
/// missing the message id or the attachment list does not decode, and the
/// agent ignores the event.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MailEvent {
    pub message_id: String,
    pub attachments: Vec<AttachmentRef>,
}

impl MailEvent {
    pub const EVENT_NAME: &'static str = "NewMailWithAttachments";

    /// Wraps this event into the `TEvent` envelope triggers send.
    pub fn into_tevent(self) -> TEvent {
        TEvent {
            name: Self::EVENT_NAME.to_string(),
            payload: Some(json!(self)),
        }
    }

    /// Decodes a raw trigger event, or `None` if the payload is absent or
    /// not a well-formed mail event.
    pub fn from_event(event: &TEvent) -> Option<MailEvent> {
        let payload = event.payload.as_ref()?;
        serde_json::from_value(payload.clone()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_tevent() {
        let event = MailEvent {
            message_id: "m-1".to_string(),
            attachments: vec![AttachmentRef {
                filename: "invoice.pdf".to_string(),
                attachment_id: "a-1".to_string(),
            }],
        };

        let tevent = event.into_tevent();
        assert_eq!(tevent.name, MailEvent::EVENT_NAME);

        let decoded = MailEvent::from_event(&tevent).unwrap();
        assert_eq!(decoded.message_id, "m-1");
        assert_eq!(decoded.attachments.len(), 1);
        assert_eq!(decoded.attachments[0].attachment_id, "a-1");
    }

    #[test]
    fn payload_missing_message_id_is_ignored() {
        let tevent = TEvent {
            name: MailEvent::EVENT_NAME.to_string(),
            payload: Some(json!({"attachments": []})),
        };
        assert!(MailEvent::from_event(&tevent).is_none());
    }

    #[test]
    fn payload_missing_attachment_list_is_ignored() {
        let tevent = TEvent {
            name: MailEvent::EVENT_NAME.to_string(),
            payload: Some(json!({"message_id": "m-1"})),
        };
        assert!(MailEvent::from_event(&tevent).is_none());
    }

    #[test]
    fn absent_payload_is_ignored() {
        let tevent = TEvent {
            name: "Heartbeat".to_string(),
            payload: None,
        };
        assert!(MailEvent::from_event(&tevent).is_none());
    }
}
