//! PeerCall - P2P Audio/Video Sessions
//!
//! Koordiniert Peer-to-Peer Anrufe zwischen zwei Endpunkten:
//! - Offer/Answer Verhandlung und ICE Candidates über einen externen Signaling-Kanal
//! - Mehrere gleichzeitige Sessions mit geteilten lokalen Medien
//! - Raster-Layout für Remote-Videos
//!
//! Der Host spricht über JSON-Zeilen auf stdin/stdout mit dem Prozess.

pub mod call_engine;
pub mod config;
pub mod session;
pub mod signaling;
pub mod video;

use call_engine::{MediaEngine, WebRtcEngine};
use config::{EngineSettings, SessionConfig, VideoConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use session::{RegistryError, SessionEvents, SessionRegistry};
use signaling::{SessionNotification, SignalingMessage};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use video::{HeadlessRenderer, SurfaceEvent};

// ============================================================================
// LOGGING
// ============================================================================

/// Initialisiert das Logging auf stderr; `RUST_LOG` überschreibt die Defaults
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("peercall_lib=debug,webrtc=warn"));

    // Zweiter Aufruf (z.B. in Tests) ist kein Fehler
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

// ============================================================================
// HOST PROTOCOL
// ============================================================================

/// Befehle des Hosts, eine JSON-Zeile pro Befehl
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum HostCommand {
    #[serde(rename_all = "camelCase")]
    CreateSessionObject {
        session_key: String,
        config: SessionConfig,
    },

    #[serde(rename_all = "camelCase")]
    Call { session_key: String },

    /// `message` darf ein JSON-String oder ein Objekt sein
    #[serde(rename_all = "camelCase")]
    ReceiveMessage { session_key: String, message: Value },

    #[serde(rename_all = "camelCase")]
    Renegotiate {
        session_key: String,
        config: SessionConfig,
    },

    #[serde(rename_all = "camelCase")]
    Disconnect { session_key: String },

    SetVideoView(VideoConfig),

    HideVideoView,

    ShowVideoView,
}

/// Ereignisse an den Host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum HostEvent {
    /// Nachricht für die Gegenstelle
    #[serde(rename_all = "camelCase")]
    Message {
        session_key: String,
        message: SignalingMessage,
    },

    #[serde(rename_all = "camelCase")]
    Answered { session_key: String },

    #[serde(rename_all = "camelCase")]
    Disconnected { session_key: String },

    /// Änderung an einer Video-Fläche
    Surface { update: SurfaceEvent },
}

impl HostEvent {
    fn from_notification(session_key: String, notification: SessionNotification) -> Self {
        match notification {
            SessionNotification::Answered => Self::Answered { session_key },
            SessionNotification::Disconnected => Self::Disconnected { session_key },
        }
    }
}

// ============================================================================
// BRIDGE
// ============================================================================

/// Verteilt Host-Befehle an die Registry und leitet Session-Ausgaben weiter
pub struct Bridge {
    registry: SessionRegistry,
    events: mpsc::UnboundedSender<HostEvent>,
}

impl Bridge {
    pub fn new(registry: SessionRegistry, events: mpsc::UnboundedSender<HostEvent>) -> Self {
        Self { registry, events }
    }

    /// Führt einen Befehl aus; Fehler werden nur geloggt
    pub fn handle(&self, command: HostCommand) {
        if let Err(e) = self.dispatch(command) {
            match e {
                RegistryError::UnknownSession(_) => tracing::debug!("Ignoring command: {}", e),
                _ => tracing::warn!("Command failed: {}", e),
            }
        }
    }

    fn dispatch(&self, command: HostCommand) -> Result<(), RegistryError> {
        match command {
            HostCommand::CreateSessionObject {
                session_key,
                config,
            } => {
                let events = self.registry.create_session(&session_key, config)?;
                tokio::spawn(forward_session(session_key, events, self.events.clone()));
                Ok(())
            }
            HostCommand::Call { session_key } => self.registry.call(&session_key),
            HostCommand::ReceiveMessage {
                session_key,
                message,
            } => {
                let raw = match message {
                    Value::String(raw) => raw,
                    other => other.to_string(),
                };
                self.registry.receive_message(&session_key, &raw)
            }
            HostCommand::Renegotiate {
                session_key,
                config,
            } => self.registry.renegotiate(&session_key, config),
            HostCommand::Disconnect { session_key } => self.registry.disconnect(&session_key),
            HostCommand::SetVideoView(config) => self.registry.set_video_view(config),
            HostCommand::HideVideoView => {
                self.registry.hide_video_view();
                Ok(())
            }
            HostCommand::ShowVideoView => {
                self.registry.show_video_view();
                Ok(())
            }
        }
    }
}

/// Leitet die Ausgaben einer Session weiter, bis beide Kanäle geschlossen sind
async fn forward_session(
    session_key: String,
    mut events: SessionEvents,
    out: mpsc::UnboundedSender<HostEvent>,
) {
    let mut signals_open = true;
    let mut notifications_open = true;

    while signals_open || notifications_open {
        // Wire-Nachrichten zuerst, damit `bye` vor `disconnected` ankommt
        let event = tokio::select! {
            biased;
            msg = events.signals.recv(), if signals_open => match msg {
                Some(message) => HostEvent::Message {
                    session_key: session_key.clone(),
                    message,
                },
                None => {
                    signals_open = false;
                    continue;
                }
            },
            notification = events.notifications.recv(), if notifications_open => match notification {
                Some(n) => HostEvent::from_notification(session_key.clone(), n),
                None => {
                    notifications_open = false;
                    continue;
                }
            },
        };

        if out.send(event).is_err() {
            break;
        }
    }
}

/// Leitet Änderungen an Video-Flächen weiter
async fn forward_surfaces(
    mut rx: broadcast::Receiver<SurfaceEvent>,
    out: mpsc::UnboundedSender<HostEvent>,
) {
    loop {
        match rx.recv().await {
            Ok(update) => {
                if out.send(HostEvent::Surface { update }).is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!("Dropped {} surface updates", n);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

// ============================================================================
// RUNNER
// ============================================================================

/// Liest Befehle aus `input` bis EOF und schreibt Ereignisse nach `output`
///
/// Bei EOF werden alle Sessions mit `bye` beendet.
pub async fn serve<R, W>(
    engine: Arc<dyn MediaEngine>,
    settings: EngineSettings,
    input: R,
    mut output: W,
) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let renderer = Arc::new(HeadlessRenderer::new());
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<HostEvent>();

    let surfaces = tokio::spawn(forward_surfaces(renderer.subscribe(), event_tx.clone()));

    let writer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            let mut line = serde_json::to_string(&event)?;
            line.push('\n');
            output.write_all(line.as_bytes()).await?;
            output.flush().await?;
        }
        anyhow::Ok(())
    });

    let registry = SessionRegistry::new(engine, renderer, settings);
    let bridge = Bridge::new(registry.clone(), event_tx);

    let mut lines = BufReader::new(input).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<HostCommand>(line) {
            Ok(command) => {
                tracing::debug!("Host command: {:?}", command);
                bridge.handle(command);
            }
            Err(e) => tracing::warn!("Invalid host command: {}", e),
        }
    }

    tracing::info!("Input closed, shutting down");
    registry.shutdown().await;

    surfaces.abort();
    drop(bridge);

    writer.await??;
    Ok(())
}

/// Startet den Host-Bridge Prozess mit der webrtc Engine
pub fn run() -> anyhow::Result<()> {
    init_logging();

    let settings = EngineSettings::from_env();
    tracing::info!(
        "Starting PeerCall (stun: {}, codec: {})",
        settings.stun_url,
        settings.preferred_audio_codec
    );

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(serve(
        Arc::new(WebRtcEngine::new()),
        settings,
        tokio::io::stdin(),
        tokio::io::stdout(),
    ))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call_engine::fake::FakeEngine;
    use tokio::io::AsyncReadExt;

    #[test]
    fn test_parse_host_commands() {
        let cmd: HostCommand = serde_json::from_str(
            r#"{"action":"createSessionObject","sessionKey":"s1","config":{"isInitiator":true,"turn":{"host":"turn:t","username":"u","password":"p"},"streams":{"audio":true,"video":false}}}"#,
        )
        .unwrap();
        assert!(matches!(
            cmd,
            HostCommand::CreateSessionObject { session_key, config } if session_key == "s1" && config.is_initiator
        ));

        let cmd: HostCommand = serde_json::from_str(
            r#"{"action":"setVideoView","containerParams":{"position":[0,0],"size":[300,600]}}"#,
        )
        .unwrap();
        assert!(matches!(cmd, HostCommand::SetVideoView(c) if c.container.width == 300));

        let cmd: HostCommand = serde_json::from_str(r#"{"action":"hideVideoView"}"#).unwrap();
        assert!(matches!(cmd, HostCommand::HideVideoView));

        assert!(serde_json::from_str::<HostCommand>(r#"{"action":"explode"}"#).is_err());
    }

    #[test]
    fn test_host_event_json() {
        let json = serde_json::to_value(HostEvent::Message {
            session_key: "s1".to_string(),
            message: SignalingMessage::Bye,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"event": "message", "sessionKey": "s1", "message": {"type": "bye"}})
        );

        let json = serde_json::to_value(HostEvent::from_notification(
            "s1".to_string(),
            SessionNotification::Answered,
        ))
        .unwrap();
        assert_eq!(json, serde_json::json!({"event": "answered", "sessionKey": "s1"}));
    }

    #[tokio::test]
    async fn test_serve_runs_a_call_until_input_closes() {
        let (mut host_in, input) = tokio::io::duplex(64 * 1024);
        let (output, mut host_out) = tokio::io::duplex(64 * 1024);

        let server = tokio::spawn(serve(
            Arc::new(FakeEngine::new()),
            EngineSettings::default(),
            input,
            output,
        ));

        let commands = [
            r#"{"action":"createSessionObject","sessionKey":"s1","config":{"isInitiator":true,"turn":{"host":"turn:t","username":"u","password":"p"},"streams":{"audio":true,"video":false}}}"#,
            "garbage",
            r#"{"action":"call","sessionKey":"s1"}"#,
            r#"{"action":"receiveMessage","sessionKey":"s1","message":"{\"type\":\"unknown\"}"}"#,
            r#"{"action":"call","sessionKey":"nobody"}"#,
        ];
        for command in commands {
            host_in.write_all(command.as_bytes()).await.unwrap();
            host_in.write_all(b"\n").await.unwrap();
        }
        drop(host_in);

        server.await.unwrap().unwrap();

        let mut raw = String::new();
        host_out.read_to_string(&mut raw).await.unwrap();
        let events: Vec<Value> = raw
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        let kinds: Vec<String> = events
            .iter()
            .map(|e| match e["event"].as_str().unwrap() {
                "message" => format!("message:{}", e["message"]["type"].as_str().unwrap()),
                other => other.to_string(),
            })
            .collect();
        assert_eq!(kinds, vec!["message:offer", "message:bye", "disconnected"]);
        assert!(events.iter().all(|e| e["sessionKey"] == "s1"));
    }
}
