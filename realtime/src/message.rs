use crate::error::Error;
use chrono::{DateTime, Utc};
use domain::Identity;
use serde::Deserialize;

/// A chat frame as sent by a client:
/// `{"receiver_id": 2, "content": "hi"}`.
///
/// Older clients name the field `recipient_id`, and some send the id as a
/// string; all of these decode to the same frame.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InboundFrame {
    #[serde(alias = "recipient_id")]
    pub receiver_id: Identity,
    pub content: String,
}

impl InboundFrame {
    pub fn decode(payload: &[u8]) -> Result<Self, Error> {
        Ok(serde_json::from_slice(payload)?)
    }
}

/// What gets persisted for each accepted frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRecord {
    pub sender: Identity,
    pub recipient: Identity,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}

impl ChatRecord {
    /// Stamps the frame with the current time.
    pub fn new(sender: Identity, frame: InboundFrame) -> Self {
        Self {
            sender,
            recipient: frame.receiver_id,
            content: frame.content,
            sent_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RealtimeErrorKind;

    #[test]
    fn recipient_may_be_numeric_textual_or_aliased() {
        let expected = InboundFrame {
            receiver_id: Identity::new(2),
            content: "hi".to_string(),
        };

        for payload in [
            r#"{"receiver_id": 2, "content": "hi"}"#,
            r#"{"receiver_id": "2", "content": "hi"}"#,
            r#"{"recipient_id": 2, "content": "hi"}"#,
        ] {
            assert_eq!(InboundFrame::decode(payload.as_bytes()).unwrap(), expected);
        }
    }

    #[test]
    fn malformed_frames_fail_to_decode() {
        for payload in [
            "not json",
            r#"{"content": "no recipient"}"#,
            r#"{"receiver_id": "bob", "content": "hi"}"#,
            r#"{"receiver_id": 2}"#,
        ] {
            let err = InboundFrame::decode(payload.as_bytes()).unwrap_err();
            assert_eq!(err.error_kind, RealtimeErrorKind::FrameDecode, "{payload}");
        }
    }

    #[test]
    fn records_take_the_sender_from_the_session() {
        let before = Utc::now();
        let frame = InboundFrame {
            receiver_id: Identity::new(2),
            content: "hi".to_string(),
        };

        let record = ChatRecord::new(Identity::new(1), frame);

        assert_eq!(record.sender, Identity::new(1));
        assert_eq!(record.recipient, Identity::new(2));
        assert!(record.sent_at >= before);
    }
}
