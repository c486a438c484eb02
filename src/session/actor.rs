//! Ein Task pro Session
//!
//! Befehle des Hosts und Ereignisse der Engine landen in derselben Mailbox
//! und werden strikt nacheinander abgearbeitet.

use super::machine::{CallSession, SessionEvents, SessionHost, SessionOutputs, SessionState};
use crate::call_engine::{EngineEvent, EngineEventSink, MediaEngine};
use crate::config::{EngineSettings, SessionConfig};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use uuid::Uuid;

#[derive(Debug)]
pub enum SessionCommand {
    Call,
    Receive(String),
    Renegotiate(SessionConfig),
    Disconnect { send_bye: bool },
    Engine(EngineEvent),
    /// Antwortet mit dem Zustand, nachdem alle vorherigen Befehle verarbeitet sind
    State(oneshot::Sender<SessionState>),
}

/// Adresse eines laufenden Session-Tasks
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: Uuid,
    tx: mpsc::UnboundedSender<SessionCommand>,
    state: watch::Receiver<SessionState>,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Gibt `false` zurück, wenn der Task bereits beendet ist
    pub fn send(&self, command: SessionCommand) -> bool {
        self.tx.send(command).is_ok()
    }

    /// Wahr, sobald die Session aufgelegt hat, auch wenn der Task noch läuft
    pub fn has_ended(&self) -> bool {
        *self.state.borrow() == SessionState::Disconnected
    }

    pub async fn state(&self) -> Option<SessionState> {
        let (tx, rx) = oneshot::channel();
        if !self.send(SessionCommand::State(tx)) {
            return None;
        }
        rx.await.ok()
    }

    /// Wartet, bis der Task beendet ist
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}

/// Startet den Task einer neuen Session
pub fn spawn_session(
    key: String,
    config: SessionConfig,
    engine: Arc<dyn MediaEngine>,
    host: Arc<dyn SessionHost>,
    settings: Arc<EngineSettings>,
) -> (SessionHandle, SessionEvents) {
    let id = Uuid::new_v4();
    let (tx, rx) = mpsc::unbounded_channel();
    let (outputs, events) = SessionOutputs::channel();
    let state = outputs.state.subscribe();

    // Die Engine darf den Task nicht am Leben halten
    let weak = tx.downgrade();
    let sink: EngineEventSink = Arc::new(move |event| {
        if let Some(tx) = weak.upgrade() {
            let _ = tx.send(SessionCommand::Engine(event));
        }
    });

    let session = CallSession::new(id, key, config, engine, host, settings, sink, outputs);
    tokio::spawn(run(session, rx));

    (SessionHandle { id, tx, state }, events)
}

async fn run(mut session: CallSession, mut rx: mpsc::UnboundedReceiver<SessionCommand>) {
    tracing::debug!("[{}] Session task started", session.key());

    while let Some(command) = rx.recv().await {
        match command {
            SessionCommand::Call => session.call().await,
            SessionCommand::Receive(raw) => session.receive_message(&raw).await,
            SessionCommand::Renegotiate(config) => session.renegotiate(config).await,
            SessionCommand::Disconnect { send_bye } => session.disconnect(send_bye).await,
            SessionCommand::Engine(event) => session.handle_engine_event(event).await,
            SessionCommand::State(reply) => {
                let _ = reply.send(session.state());
            }
        }

        if session.state() == SessionState::Disconnected {
            break;
        }
    }

    // Mailbox ohne Sender: Host hat die Session fallen gelassen
    if session.state() != SessionState::Disconnected {
        session.disconnect(false).await;
    }

    tracing::debug!("[{}] Session task stopped", session.key());
}

// ============================================================================
// TESTS
// ============================================================================
