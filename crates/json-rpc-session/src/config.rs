//! Configuration types for sessions

use serde::{Deserialize, Serialize};

/// How outbound messages are framed on the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    #[default]
    Binary,
    Text,
}

/// Per-session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Largest message accepted from the peer, in bytes
    pub max_message_bytes: usize,

    /// Text sent to the peer before closing when a message is too big
    pub oversize_reason: String,

    /// Frame type used for replies, requests and notifications
    pub frame_kind: FrameKind,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_message_bytes: crate::MAX_MESSAGE_BYTES,
            oversize_reason: "Message too big".to_string(),
            frame_kind: FrameKind::Binary,
        }
    }
}

impl SessionConfig {
    pub fn with_max_message_bytes(mut self, max_message_bytes: usize) -> Self {
        self.max_message_bytes = max_message_bytes;
        self
    }

    pub fn with_oversize_reason(mut self, reason: impl Into<String>) -> Self {
        self.oversize_reason = reason.into();
        self
    }

    pub fn with_frame_kind(mut self, frame_kind: FrameKind) -> Self {
        self.frame_kind = frame_kind;
        self
    }
}
