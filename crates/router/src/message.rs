// SPDX-License-Identifier: MIT

//! §4.8 "Send message": the one operation that streams. Everything else in
//! [`crate::session_ops`] is a single request/response.

use crate::error::RouterError;
use crate::SessionRouter;
use ash_backend::RunnerBackend;
use ash_core::clock::Clock;
use ash_core::ids::{SessionId, TenantId};
use ash_core::session::SessionStatus;
use ash_sandbox::BridgeEvent;
use ash_wire::{Command, Event};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::warn;

/// What [`SessionRouter::send_message`] hands the HTTP layer for each frame
/// of the response stream, already shaped for `event: <kind>\ndata: <json>`.
#[derive(Debug, Clone, PartialEq)]
pub enum RouterSseEvent {
    Message(Value),
    Error(String),
    Done,
    /// A malformed line from the bridge (§4.1, §7 `decode_error`): surfaced
    /// to the client as an SSE error frame, but — unlike [`Self::Error`] —
    /// does not end the stream, since the bridge connection itself is fine
    /// and a later `done` may still arrive.
    DecodeWarning(String),
    /// §4.8 "SSE backpressure": the client failed to drain within
    /// `SSE_WRITE_TIMEOUT_MS`. Always the last frame.
    ClientWriteTimeout,
}

impl RouterSseEvent {
    /// Whether this frame ends the stream.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RouterSseEvent::Message(_) | RouterSseEvent::DecodeWarning(_))
    }

    /// The SSE `event:` field name (§6.1 "SSE `event: message|error|done`").
    pub fn event_name(&self) -> &'static str {
        match self {
            RouterSseEvent::Message(_) => "message",
            RouterSseEvent::Error(_) | RouterSseEvent::ClientWriteTimeout | RouterSseEvent::DecodeWarning(_) => "error",
            RouterSseEvent::Done => "done",
        }
    }

    /// The SSE `data:` payload.
    pub fn data(&self) -> Value {
        match self {
            RouterSseEvent::Message(payload) => payload.clone(),
            RouterSseEvent::Error(error) | RouterSseEvent::DecodeWarning(error) => serde_json::json!({ "error": error }),
            RouterSseEvent::Done => serde_json::json!({}),
            RouterSseEvent::ClientWriteTimeout => serde_json::json!({ "error": "client_write_timeout" }),
        }
    }
}

impl<C: Clock> SessionRouter<C> {
    /// §4.8 "Send message", steps 1-7. Returns a bounded channel the HTTP
    /// layer drains into an SSE response; the channel's capacity-1 backing
    /// is itself the backpressure signal (the sender blocks, bounded by
    /// `sse_write_timeout`, until the HTTP layer has taken the previous
    /// frame, which only happens once the client's socket can accept more
    /// bytes).
    pub async fn send_message(
        &self,
        tenant_id: TenantId,
        session_id: SessionId,
        prompt: String,
        include_partial_messages: Option<bool>,
    ) -> Result<mpsc::Receiver<RouterSseEvent>, RouterError> {
        let session = self.load_scoped(tenant_id, session_id).await?;
        if !session.status.accepts_messages() {
            return Err(RouterError::InvalidState);
        }

        let backend = match self.coordinator.get_backend_for_runner_async(session.runner_id).await {
            Ok(backend) => backend,
            Err(err) => {
                self.db.update_session_status(session.id, SessionStatus::Error).await.ok();
                return Err(err.into());
            }
        };

        let Some(sandbox_id) = session.sandbox_id else {
            self.db.update_session_status(session.id, SessionStatus::Error).await.ok();
            return Err(RouterError::InvalidState);
        };

        if backend.get_sandbox(sandbox_id).await?.is_none() {
            self.db.update_session_status(session.id, SessionStatus::Error).await.ok();
            return Err(RouterError::NotFound);
        }

        // Step 4: must be observable before any further await so the idle
        // sweep can never race a sandbox that is about to run a command.
        backend.mark_running(sandbox_id).await?;

        self.db.touch_session_last_active(session.id).await.ok();

        let mut bridge_rx = backend
            .send_command(
                sandbox_id,
                &Command::Query { session_id: session.id, prompt, include_partial_messages },
            )
            .await?;

        let (tx, rx) = mpsc::channel(1);
        let sse_write_timeout = self.config.sse_write_timeout;
        let agent_name = session.agent_name.clone();
        let db = self.db.clone();

        tokio::spawn(async move {
            loop {
                let Some(bridge_event) = bridge_rx.recv().await else {
                    break;
                };

                let sse_event = match bridge_event {
                    BridgeEvent::Event(Event::Ready) | BridgeEvent::Event(Event::Unknown) => continue,
                    BridgeEvent::Event(Event::Message { payload }) => RouterSseEvent::Message(payload),
                    BridgeEvent::Event(Event::Error { error }) => RouterSseEvent::Error(error),
                    BridgeEvent::Event(Event::Done { session_id }) => {
                        if !backend.persist_state(sandbox_id, session_id, &agent_name).await {
                            warn!(%session_id, "best-effort persist failed on done");
                        }
                        RouterSseEvent::Done
                    }
                    BridgeEvent::DecodeError(raw) => RouterSseEvent::DecodeWarning(raw),
                    BridgeEvent::PeerClosed => {
                        // §7 `peer_closed`: the sandbox died mid-stream; the
                        // session does not get another `mark_waiting` turn.
                        db.update_session_status(session_id, SessionStatus::Error).await.ok();
                        RouterSseEvent::Error("peer_closed".to_string())
                    }
                };

                let terminal = sse_event.is_terminal();
                match tokio::time::timeout(sse_write_timeout, tx.send(sse_event)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(_)) => break, // client disconnected, receiver dropped
                    Err(_) => {
                        warn!(sandbox_id = %sandbox_id, "SSE client failed to drain within SSE_WRITE_TIMEOUT_MS");
                        let _ = tx.try_send(RouterSseEvent::ClientWriteTimeout);
                        break;
                    }
                }
                if terminal {
                    break;
                }
            }

            if let Err(err) = backend.mark_waiting(sandbox_id).await {
                warn!(sandbox_id = %sandbox_id, %err, "mark_waiting failed after send_message");
            }
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::RouterSseEvent;

    #[test]
    fn decode_warning_is_not_terminal_but_error_is() {
        let warning = RouterSseEvent::DecodeWarning("bad json".to_string());
        assert!(!warning.is_terminal());
        assert_eq!(warning.event_name(), "error");

        let error = RouterSseEvent::Error("boom".to_string());
        assert!(error.is_terminal());
        assert_eq!(error.event_name(), "error");
    }

    #[test]
    fn message_and_done_terminality() {
        assert!(!RouterSseEvent::Message(serde_json::json!({})).is_terminal());
        assert!(RouterSseEvent::Done.is_terminal());
        assert!(RouterSseEvent::ClientWriteTimeout.is_terminal());
    }
}
