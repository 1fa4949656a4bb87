use std::convert::Infallible;
use std::sync::Arc;

use async_stream::stream;
use auth::AuthContext;
use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, CONNECTION};
use axum::http::HeaderValue;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use log::*;
use sse::{Manager, SessionId, SessionRegistry};
use tokio::sync::mpsc;

use crate::error::Error;
use crate::extractors::BearerCredentials;
use crate::middleware::auth::authenticate;
use crate::AppState;

/// Forgets the session in both the manager and the registry once the
/// response body is dropped, whether the stream ended or the client left.
struct SessionGuard {
    session_id: SessionId,
    manager: Arc<Manager>,
    registry: Arc<SessionRegistry>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.manager.disconnect(&self.session_id);
        self.registry.unregister(&self.session_id);
        info!("SSE connection {} closed", self.session_id);
    }
}

/// GET /sse
///
/// Never answers 401. A valid bearer token binds the session to its caller
/// for later correlation; a missing or invalid one yields an anonymous session.
pub(crate) async fn connect(
    State(app_state): State<AppState>,
    credentials: BearerCredentials,
) -> Result<Response, Error> {
    let ctx = match credentials.token {
        Some(_) => match authenticate(&app_state, &credentials).await {
            Ok(ctx) => ctx,
            Err(_) => {
                warn!("Invalid bearer token on SSE connect, opening an anonymous session");
                AuthContext::anonymous()
            }
        },
        None => AuthContext::anonymous(),
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    let session = app_state.sse_manager.connect(tx)?;
    app_state.session_registry.register(session.clone(), &ctx);
    info!(
        "SSE connection {} opened (subject {:?})",
        session.id,
        ctx.subject()
    );

    let ended = session.cancellation();
    let guard = SessionGuard {
        session_id: session.id.clone(),
        manager: Arc::clone(&app_state.sse_manager),
        registry: Arc::clone(&app_state.session_registry),
    };

    // Queued frames win over the end signal, so terminal frames are flushed.
    let stream = stream! {
        let _guard = guard;
        loop {
            let frame = tokio::select! {
                biased;
                frame = rx.recv() => frame,
                _ = ended.cancelled() => None,
            };
            let Some(frame) = frame else {
                break;
            };
            yield Ok::<Event, Infallible>(frame.into());
        }
    };

    let mut response = Sse::new(stream).into_response();
    let headers = response.headers_mut();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache, no-transform"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    Ok(response)
}
