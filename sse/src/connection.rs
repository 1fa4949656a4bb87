use chrono::{DateTime, Utc};
use std::fmt;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::message::Event;

/// Unique identifier for an SSE session (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub type FrameSender = UnboundedSender<Event>;

/// One open SSE response stream.
///
/// The stream side reads frames from the channel behind `sender` and ends once
/// `cancel` fires and the already-queued frames are written.
#[derive(Debug, Clone)]
pub struct SseSession {
    pub id: SessionId,
    pub created_at: DateTime<Utc>,
    sender: FrameSender,
    cancel: CancellationToken,
}

impl SseSession {
    pub(crate) fn new(sender: FrameSender) -> Self {
        Self {
            id: SessionId::new(),
            created_at: Utc::now(),
            sender,
            cancel: CancellationToken::new(),
        }
    }

    /// Queues a frame; fails only when the stream side is gone.
    pub(crate) fn push(&self, event: Event) -> bool {
        self.sender.send(event).is_ok()
    }

    /// Ends the stream after queued frames drain.
    pub fn end(&self) {
        self.cancel.cancel();
    }

    pub fn is_ended(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token the stream side waits on.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }
}
