use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Event name relayed to every chat peer.
pub const CHAT_MESSAGE_EVENT: &str = "chat:message";

#[derive(Debug, Deserialize, Serialize, ToSchema)]
/// Envelope of every realtime frame.
pub struct ChatEnvelope {
    /// Event name, such as `chat:message`.
    pub event: String,
    /// Opaque payload, relayed untouched.
    #[serde(default)]
    pub data: Value,
}

impl ChatEnvelope {
    /// Parse a text frame.
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Whether the frame should be relayed.
    pub fn is_chat_message(&self) -> bool {
        self.event == CHAT_MESSAGE_EVENT
    }
}
