//! Pub/sub message type.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::result::AppResult;

/// A message received on a subscribed channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// Channel the message was published to.
    pub channel: String,
    /// Raw message body.
    pub payload: Vec<u8>,
}

impl ChannelMessage {
    /// Create a new message.
    pub fn new(channel: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            channel: channel.into(),
            payload: payload.into(),
        }
    }

    /// The body as UTF-8 text.
    pub fn payload_str(&self) -> AppResult<&str> {
        Ok(std::str::from_utf8(&self.payload)?)
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> AppResult<T> {
        Ok(serde_json::from_slice(&self.payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_json_body() {
        let msg = ChannelMessage::new("orders", br#"{"id":7,"status":"paid"}"#.to_vec());
        let body: serde_json::Value = msg.json().unwrap();
        assert_eq!(body["status"], "paid");
        assert_eq!(msg.payload_str().unwrap(), r#"{"id":7,"status":"paid"}"#);
    }

    #[test]
    fn test_non_json_body_is_serialization_error() {
        let msg = ChannelMessage::new("orders", "plain text");
        let err = msg.json::<serde_json::Value>().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Serialization);
    }
}
