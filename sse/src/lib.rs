//! Server-Sent Events transport for MCP clients.
//!
//! # Architecture
//!
//! - **One session per open stream**: every `GET /sse` gets its own session id
//!   and frame channel. Sessions are never shared between connections.
//! - **Shared heartbeat**: a single timer writes `heartbeat` frames to every
//!   open session. It starts with the first session and stops with the last.
//! - **Caller correlation**: the [`SessionRegistry`] remembers which caller
//!   (subject, or a hash of their token) opened each session, so a later
//!   stateless JSON-RPC POST can have its result pushed to that stream.
//! - **Ephemeral**: nothing survives a restart.
//!
//! # Example: pushing a JSON-RPC response
//!
//! ```rust,ignore
//! use sse::message::Event;
//!
//! for record in app_state.session_registry.find_matching_sessions(&ctx) {
//!     app_state.sse_manager.send(&record.session.id, Event::Message(response.clone()));
//! }
//! ```
//!
//! # Modules
//!
//! - `connection`: `SessionId` and the per-stream `SseSession` handle
//! - `manager`: session lifecycle, capacity limit and heartbeat
//! - `message`: frame definitions and their wire form
//! - `registry`: caller-to-session correlation

pub mod connection;
pub mod error;
pub mod manager;
pub mod message;
pub mod registry;

pub use connection::{SessionId, SseSession};
pub use error::{Error, ErrorKind};
pub use manager::{Manager, ManagerConfig};
pub use registry::{SessionRecord, SessionRegistry};
