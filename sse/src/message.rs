use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};

/// Trait for getting the SSE event type name
pub trait EventType {
    fn event_type(&self) -> &'static str;
}

/// A frame written to an SSE session as `event: <name>\ndata: <data>\n\n`.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Where the client should POST its JSON-RPC requests. Data is the raw URI.
    Endpoint { uri: String },
    Ready { session_id: String },
    Heartbeat { ts: DateTime<Utc> },
    /// A JSON-RPC response pushed to the session.
    Message(Value),
    Close,
    Shutdown,
}

impl Event {
    pub fn heartbeat_now() -> Self {
        Event::Heartbeat { ts: Utc::now() }
    }

    /// The `data:` line payload. JSON-RPC messages are written as-is, with
    /// a missing value rendered as `null`.
    pub fn data(&self) -> String {
        match self {
            Event::Endpoint { uri } => uri.clone(),
            Event::Ready { session_id } => {
                json!({"event": "ready", "sessionId": session_id}).to_string()
            }
            Event::Heartbeat { ts } => json!({
                "event": "heartbeat",
                "ts": ts.to_rfc3339_opts(SecondsFormat::Millis, true),
            })
            .to_string(),
            Event::Message(message) => message.to_string(),
            Event::Close => json!({"event": "close"}).to_string(),
            Event::Shutdown => json!({"event": "shutdown"}).to_string(),
        }
    }

    /// Wire form of the frame.
    #[cfg(test)]
    pub fn encode(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.event_type(), self.data())
    }
}

impl EventType for Event {
    fn event_type(&self) -> &'static str {
        match self {
            Event::Endpoint { .. } => "endpoint",
            Event::Ready { .. } => "ready",
            Event::Heartbeat { .. } => "heartbeat",
            Event::Message(_) => "message",
            Event::Close => "close",
            Event::Shutdown => "shutdown",
        }
    }
}

impl From<Event> for axum::response::sse::Event {
    fn from(event: Event) -> Self {
        axum::response::sse::Event::default()
            .event(event.event_type())
            .data(event.data())
    }
}
