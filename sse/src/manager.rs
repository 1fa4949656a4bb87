use crate::connection::{FrameSender, SessionId, SseSession};
use crate::error::{Error, ErrorKind};
use crate::message::{Event, EventType};
use log::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub heartbeat_interval: Duration,
    pub max_connections: usize,
    /// Path announced in each session's `endpoint` frame.
    pub message_endpoint: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(15),
            max_connections: 1000,
            message_endpoint: "/messages".to_string(),
        }
    }
}

struct Heartbeat {
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct State {
    sessions: HashMap<SessionId, SseSession>,
    heartbeat: Option<Heartbeat>,
    generation: u64,
}

impl State {
    fn stop_heartbeat_if_idle(&mut self) {
        if self.sessions.is_empty() {
            if let Some(heartbeat) = self.heartbeat.take() {
                heartbeat.handle.abort();
                debug!("Last SSE session closed, heartbeat stopped");
            }
        }
    }
}

struct Shared {
    state: Mutex<State>,
    config: ManagerConfig,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Owns every open SSE session and the single heartbeat timer they share.
///
/// All mutations go through one mutex, so the capacity check, the insert and
/// the heartbeat start happen atomically.
pub struct Manager {
    shared: Arc<Shared>,
}

impl Manager {
    pub fn new(config: ManagerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                config,
            }),
        }
    }

    /// Opens a session writing into `sender`. The session immediately receives
    /// an `endpoint` frame and a `ready` frame carrying its id.
    pub fn connect(&self, sender: FrameSender) -> Result<SseSession, Error> {
        let mut state = self.shared.lock();

        let max_connections = self.shared.config.max_connections;
        if state.sessions.len() >= max_connections {
            warn!("Rejecting SSE connection, {max_connections} sessions already open");
            return Err(Error {
                source: None,
                error_kind: ErrorKind::CapacityReached { max_connections },
            });
        }

        let session = SseSession::new(sender);
        session.push(Event::Endpoint {
            uri: format!(
                "{}?sessionId={}",
                self.shared.config.message_endpoint, session.id
            ),
        });
        session.push(Event::Ready {
            session_id: session.id.to_string(),
        });
        state.sessions.insert(session.id.clone(), session.clone());

        if state.heartbeat.is_none() {
            state.generation += 1;
            let generation = state.generation;
            let handle = tokio::spawn(run_heartbeat(
                Arc::downgrade(&self.shared),
                self.shared.config.heartbeat_interval,
                generation,
            ));
            state.heartbeat = Some(Heartbeat { generation, handle });
            debug!("SSE heartbeat started");
        }

        debug!(
            "SSE session {} established ({} open)",
            session.id,
            state.sessions.len()
        );
        Ok(session)
    }

    /// Writes a frame to one session. Unknown or departed sessions are logged
    /// and skipped; returns whether the frame was queued.
    pub fn send(&self, session_id: &SessionId, event: Event) -> bool {
        let state = self.shared.lock();
        let Some(session) = state.sessions.get(session_id) else {
            warn!(
                "SSE session {session_id} not found, dropping {} frame",
                event.event_type()
            );
            return false;
        };

        if !session.push(event) {
            warn!("SSE session {session_id} stream is gone, frame dropped");
            return false;
        }
        true
    }

    /// Writes a frame to every open session, returning how many accepted it.
    pub fn broadcast(&self, event: Event) -> usize {
        let state = self.shared.lock();
        state
            .sessions
            .values()
            .filter(|session| {
                let queued = session.push(event.clone());
                if !queued {
                    warn!("Failed to broadcast to SSE session {}", session.id);
                }
                queued
            })
            .count()
    }

    /// Sends `close` to one session and ends its stream.
    pub fn close(&self, session_id: &SessionId) -> bool {
        let mut state = self.shared.lock();
        let Some(session) = state.sessions.remove(session_id) else {
            return false;
        };
        session.push(Event::Close);
        session.end();
        state.stop_heartbeat_if_idle();
        debug!("SSE session {session_id} closed");
        true
    }

    /// Sends `shutdown` to every session and ends all streams.
    pub fn close_all(&self) {
        let mut state = self.shared.lock();
        let count = state.sessions.len();
        for (_, session) in state.sessions.drain() {
            session.push(Event::Shutdown);
            session.end();
        }
        state.stop_heartbeat_if_idle();
        info!("Closed {count} SSE session(s)");
    }

    /// Forgets a session whose client went away. No frame is written.
    pub fn disconnect(&self, session_id: &SessionId) {
        let mut state = self.shared.lock();
        if state.sessions.remove(session_id).is_some() {
            debug!("SSE session {session_id} disconnected");
        }
        state.stop_heartbeat_if_idle();
    }

    pub fn active_connections(&self) -> usize {
        self.shared.lock().sessions.len()
    }

    pub fn heartbeat_running(&self) -> bool {
        self.shared.lock().heartbeat.is_some()
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new(ManagerConfig::default())
    }
}

async fn run_heartbeat(shared: Weak<Shared>, period: Duration, generation: u64) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let Some(shared) = shared.upgrade() else {
            return;
        };
        let mut state = shared.lock();
        if state.heartbeat.as_ref().map(|h| h.generation) != Some(generation) {
            return;
        }

        let frame = Event::heartbeat_now();
        state.sessions.retain(|id, session| {
            let alive = session.push(frame.clone());
            if !alive {
                debug!("Dropping SSE session {id}, stream is gone");
            }
            alive
        });

        if state.sessions.is_empty() {
            state.heartbeat = None;
            debug!("No SSE sessions left, heartbeat stopped");
            return;
        }
    }
}
