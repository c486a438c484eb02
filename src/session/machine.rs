//! Zustandsmaschine eines Anrufs
//!
//! Eine `CallSession` gehört genau einem Task (siehe `actor`). Alle Methoden
//! nehmen `&mut self`, damit sind Nachrichten einer Session strikt serialisiert.

use super::candidates::CandidateQueue;
use crate::call_engine::{
    EngineError, EngineEvent, EngineEventSink, IceCandidate, LocalStream, MediaConstraints,
    MediaEngine, PeerConnection, RemoteTrack, SdpType, SessionDescription,
};
use crate::config::{EngineSettings, SessionConfig, StreamsConfig};
use crate::signaling::{prefer_codec, SessionNotification, SignalingMessage};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

// ============================================================================
// STATE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Angelegt, noch keine Verbindung
    Created,
    /// Verbindung existiert, Verhandlung läuft
    Calling,
    /// Remote Description wurde angewendet
    Active,
    /// Beendet, alle weiteren Operationen sind wirkungslos
    Disconnected,
}

// ============================================================================
// HOST CAPABILITY
// ============================================================================

/// Was eine Session von ihrer Registry braucht
pub trait SessionHost: Send + Sync {
    /// Lokaler Stream aus den geteilten Tracks
    fn local_stream(&self, streams: &StreamsConfig) -> Result<LocalStream, EngineError>;

    /// Ob der Host eine Video-Ansicht konfiguriert hat
    fn video_configured(&self) -> bool;

    fn add_remote_video(&self, track: &RemoteTrack);

    fn remove_remote_video(&self, track: &RemoteTrack);

    /// Die Session ist beendet und kann entfernt werden
    fn session_ended(&self, key: &str, id: Uuid);
}

/// Ausgehende Kanäle einer Session
#[derive(Debug)]
pub struct SessionOutputs {
    pub signals: mpsc::UnboundedSender<SignalingMessage>,
    pub notifications: mpsc::UnboundedSender<SessionNotification>,
    /// Aktueller Zustand, für die Registry sichtbar
    pub state: watch::Sender<SessionState>,
}

/// Empfangsseite für den Host
#[derive(Debug)]
pub struct SessionEvents {
    /// Nachrichten für die Gegenstelle
    pub signals: mpsc::UnboundedReceiver<SignalingMessage>,
    /// Lokale Benachrichtigungen
    pub notifications: mpsc::UnboundedReceiver<SessionNotification>,
}

impl SessionOutputs {
    pub fn channel() -> (Self, SessionEvents) {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(SessionState::Created);
        (
            Self {
                signals: signal_tx,
                notifications: notify_tx,
                state: state_tx,
            },
            SessionEvents {
                signals: signal_rx,
                notifications: notify_rx,
            },
        )
    }
}

// ============================================================================
// CALL SESSION
// ============================================================================

pub struct CallSession {
    id: Uuid,
    key: String,
    config: SessionConfig,
    state: SessionState,
    engine: Arc<dyn MediaEngine>,
    host: Arc<dyn SessionHost>,
    settings: Arc<EngineSettings>,
    events: EngineEventSink,
    outputs: SessionOutputs,
    connection: Option<Arc<dyn PeerConnection>>,
    candidates: CandidateQueue,
    stream: Option<LocalStream>,
    video_track: Option<RemoteTrack>,
    answered: bool,
}

impl CallSession {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: Uuid,
        key: String,
        config: SessionConfig,
        engine: Arc<dyn MediaEngine>,
        host: Arc<dyn SessionHost>,
        settings: Arc<EngineSettings>,
        events: EngineEventSink,
        outputs: SessionOutputs,
    ) -> Self {
        Self {
            id,
            key,
            config,
            state: SessionState::Created,
            engine,
            host,
            settings,
            events,
            outputs,
            connection: None,
            candidates: CandidateQueue::new(),
            stream: None,
            video_track: None,
            answered: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn set_state(&mut self, state: SessionState) {
        self.state = state;
        self.outputs.state.send_replace(state);
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn candidates(&self) -> &CandidateQueue {
        &self.candidates
    }

    /// Baut die Verbindung auf und startet als Initiator die Verhandlung
    pub async fn call(&mut self) {
        if self.state != SessionState::Created {
            tracing::debug!("[{}] call() ignored in state {:?}", self.key, self.state);
            return;
        }

        let ice_servers = self.config.ice_servers(&self.settings.stun_url);
        let constraints = MediaConstraints::for_call(self.host.video_configured());

        let connection = match self
            .engine
            .create_connection(ice_servers, constraints, Arc::clone(&self.events))
            .await
        {
            Ok(connection) => connection,
            Err(e) => {
                tracing::error!("[{}] Failed to create peer connection: {}", self.key, e);
                return;
            }
        };

        tracing::info!(
            "[{}] Calling (initiator: {})",
            self.key,
            self.config.is_initiator
        );
        self.connection = Some(connection);
        self.set_state(SessionState::Calling);

        self.create_or_update_stream().await;

        if self.config.is_initiator {
            self.negotiate(SdpType::Offer).await;
        }
    }

    /// Ersetzt den lokalen Stream gemäß `config.streams`
    ///
    /// Ein vorheriger Stream wird genau einmal entfernt, bevor der neue
    /// angehängt wird.
    pub async fn create_or_update_stream(&mut self) {
        let Some(connection) = self.connection.clone() else {
            return;
        };

        if let Some(previous) = self.stream.take() {
            if let Err(e) = connection.remove_stream(&previous).await {
                tracing::warn!("[{}] Failed to remove local stream: {}", self.key, e);
            }
        }

        let stream = match self.host.local_stream(&self.config.streams) {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!("[{}] Failed to create local stream: {}", self.key, e);
                return;
            }
        };

        if let Err(e) = connection.add_stream(&stream).await {
            tracing::error!("[{}] Failed to add local stream: {}", self.key, e);
            return;
        }

        tracing::debug!("[{}] Local stream {:?}", self.key, stream.track_ids());
        self.stream = Some(stream);
    }

    /// Übernimmt eine neue Konfiguration und aktualisiert den lokalen Stream
    pub async fn renegotiate(&mut self, config: SessionConfig) {
        if self.state == SessionState::Disconnected {
            tracing::debug!("[{}] renegotiate() ignored, session ended", self.key);
            return;
        }

        self.config = config;
        self.create_or_update_stream().await;
    }

    /// Verarbeitet eine Signaling-Nachricht der Gegenstelle
    pub async fn receive_message(&mut self, raw: &str) {
        if self.state == SessionState::Disconnected {
            tracing::debug!("[{}] Message ignored, session ended", self.key);
            return;
        }

        let message = match SignalingMessage::parse(raw) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("[{}] Dropping message: {}", self.key, e);
                return;
            }
        };

        tracing::debug!("[{}] Received {}", self.key, message.type_name());

        match message {
            SignalingMessage::Candidate {
                label,
                id,
                candidate,
            } => {
                let candidate = IceCandidate {
                    sdp_mid: id,
                    sdp_mline_index: label,
                    candidate,
                };
                if let Err(e) = self
                    .candidates
                    .push(candidate, self.connection.as_ref())
                    .await
                {
                    tracing::warn!("[{}] Failed to add remote candidate: {}", self.key, e);
                }
            }
            SignalingMessage::Offer { sdp } => {
                self.apply_remote_description(SessionDescription::offer(sdp))
                    .await
            }
            SignalingMessage::Answer { sdp } => {
                self.apply_remote_description(SessionDescription::answer(sdp))
                    .await
            }
            SignalingMessage::Bye => self.disconnect(false).await,
        }
    }

    async fn apply_remote_description(&mut self, desc: SessionDescription) {
        let Some(connection) = self.connection.clone() else {
            tracing::debug!(
                "[{}] {:?} ignored, no peer connection yet",
                self.key,
                desc.sdp_type
            );
            return;
        };

        let sdp_type = desc.sdp_type;
        let desc = SessionDescription {
            sdp_type,
            sdp: prefer_codec(&desc.sdp, &self.settings.preferred_audio_codec),
        };

        if let Err(e) = connection.set_remote_description(desc).await {
            tracing::error!("[{}] Failed to set remote description: {}", self.key, e);
            return;
        }

        self.set_state(SessionState::Active);
        self.candidates.drain_into(connection.as_ref()).await;

        if sdp_type == SdpType::Offer
            && !self.config.is_initiator
            && !connection.has_local_description().await
        {
            self.negotiate(SdpType::Answer).await;
        }
    }

    /// Erzeugt Offer oder Answer, setzt sie lokal und sendet sie
    async fn negotiate(&mut self, sdp_type: SdpType) {
        let Some(connection) = self.connection.clone() else {
            return;
        };

        let created = match sdp_type {
            SdpType::Offer => connection.create_offer().await,
            SdpType::Answer => connection.create_answer().await,
        };
        let desc = match created {
            Ok(desc) => desc,
            Err(e) => {
                tracing::error!("[{}] Failed to create {:?}: {}", self.key, sdp_type, e);
                return;
            }
        };

        let desc = SessionDescription {
            sdp_type: desc.sdp_type,
            sdp: prefer_codec(&desc.sdp, &self.settings.preferred_audio_codec),
        };

        if let Err(e) = connection.set_local_description(desc.clone()).await {
            tracing::error!("[{}] Failed to set local description: {}", self.key, e);
            return;
        }

        self.send(SignalingMessage::from_description(&desc));
    }

    /// Reagiert auf spontane Ereignisse der Verbindung
    pub async fn handle_engine_event(&mut self, event: EngineEvent) {
        if self.state == SessionState::Disconnected {
            return;
        }

        match event {
            EngineEvent::CandidateDiscovered(candidate) => {
                self.send(SignalingMessage::from_candidate(&candidate));
            }
            EngineEvent::StreamAdded(stream) => {
                tracing::info!("[{}] Remote stream {} added", self.key, stream.id);

                if self.video_track.is_none() {
                    if let Some(track) = stream.first_video_track() {
                        self.host.add_remote_video(track);
                        self.video_track = Some(track.clone());
                    }
                }

                if !self.answered {
                    self.answered = true;
                    self.notify(SessionNotification::Answered);
                }
            }
            EngineEvent::StreamRemoved(stream) => {
                tracing::info!("[{}] Remote stream {} removed", self.key, stream.id);
            }
            EngineEvent::SignalingStateChanged(state) => {
                tracing::debug!("[{}] Signaling state: {}", self.key, state);
            }
            EngineEvent::RenegotiationNeeded => {
                tracing::debug!("[{}] Renegotiation needed, ignored", self.key);
            }
            EngineEvent::Error(e) => {
                tracing::error!("[{}] Peer connection error: {}", self.key, e);
            }
        }
    }

    /// Beendet die Session
    ///
    /// Ein zweiter Aufruf hat keine Wirkung.
    pub async fn disconnect(&mut self, send_bye: bool) {
        if self.state == SessionState::Disconnected {
            tracing::debug!("[{}] Already disconnected", self.key);
            return;
        }

        if let Some(track) = self.video_track.take() {
            self.host.remove_remote_video(&track);
        }

        if let Some(connection) = self.connection.take() {
            if send_bye {
                self.send(SignalingMessage::Bye);
            }
            if let Err(e) = connection.close().await {
                tracing::warn!("[{}] Failed to close peer connection: {}", self.key, e);
            }
        }

        self.candidates.close();
        self.stream = None;
        self.set_state(SessionState::Disconnected);

        tracing::info!("[{}] Disconnected", self.key);
        self.notify(SessionNotification::Disconnected);
        self.host.session_ended(&self.key, self.id);
    }

    fn send(&self, message: SignalingMessage) {
        tracing::debug!("[{}] Sending {}", self.key, message.type_name());
        if self.outputs.signals.send(message).is_err() {
            tracing::debug!("[{}] Signal receiver dropped", self.key);
        }
    }

    fn notify(&self, notification: SessionNotification) {
        if self.outputs.notifications.send(notification).is_err() {
            tracing::debug!("[{}] Notification receiver dropped", self.key);
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
