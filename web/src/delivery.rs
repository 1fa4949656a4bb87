//! Publishing one JSON-RPC result to the SSE streams that should see it.
//!
//! The HTTP reply always carries the result inline. On top of that the result
//! is pushed to the stream the caller named explicitly, or else to every
//! stream the same authenticated caller opened.

use auth::AuthContext;
use log::*;
use mcp::JsonRpcResponse;
use sse::message::Event;
use sse::{Manager, SessionId, SessionRegistry};

/// The push channels available for one request.
pub(crate) struct Sinks<'a> {
    pub manager: &'a Manager,
    pub registry: &'a SessionRegistry,
    pub explicit: Option<&'a SessionId>,
    pub auth: &'a AuthContext,
}

/// Where a result was pushed, besides the inline reply.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Delivery {
    Explicit(SessionId),
    Correlated(Vec<SessionId>),
    InlineOnly,
}

pub(crate) fn deliver(response: &JsonRpcResponse, sinks: &Sinks<'_>) -> Delivery {
    let frame = Event::Message(response.to_value());

    if let Some(session_id) = sinks.explicit {
        if let Some(record) = sinks.registry.get(session_id) {
            sinks.manager.send(&record.session.id, frame);
            debug!("Delivered RPC result via explicit session {session_id}");
            return Delivery::Explicit(record.session.id);
        }
        warn!("Received RPC request with unknown session id {session_id}");
    }

    if sinks.auth.is_anonymous() {
        return Delivery::InlineOnly;
    }

    let records = sinks.registry.find_matching_sessions(sinks.auth);
    if records.is_empty() {
        warn!(
            "No active SSE sessions matched authenticated request (subject {:?})",
            sinks.auth.subject()
        );
        return Delivery::InlineOnly;
    }

    let reached = records
        .into_iter()
        .filter(|record| sinks.manager.send(&record.session.id, frame.clone()))
        .map(|record| record.session.id)
        .collect();
    Delivery::Correlated(reached)
}
