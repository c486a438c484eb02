//! Media-Engine Schnittstelle
//!
//! Die eigentliche WebRTC-Implementierung ist austauschbar. Sessions sprechen
//! nur über `MediaEngine` und `PeerConnection` mit ihr und bekommen spontane
//! Ereignisse (ICE Candidates, Remote Streams, ...) als `EngineEvent` zurück.

use super::media::{LocalStream, LocalTrack, LOCAL_AUDIO_TRACK_ID, LOCAL_VIDEO_TRACK_ID};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("WebRTC error: {0}")]
    WebRTC(String),

    #[error("Invalid SDP: {0}")]
    InvalidSdp(String),

    #[error("No peer connection")]
    NoConnection,

    #[error("Peer connection closed")]
    Closed,
}

// ============================================================================
// VALUE TYPES
// ============================================================================

/// Art einer Session Description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
}

/// SDP Offer oder Answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// ICE Candidate mit Media-Section (`mid`) und Zeilenindex (`label`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IceCandidate {
    pub sdp_mid: String,
    pub sdp_mline_index: u16,
    pub candidate: String,
}

/// STUN/TURN Server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IceServer {
    pub url: String,
    pub username: String,
    pub credential: String,
}

/// Verhandlungs-Constraints einer Verbindung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaConstraints {
    pub offer_to_receive_audio: bool,
    pub offer_to_receive_video: bool,
    pub internal_sctp_data_channels: bool,
    pub dtls_srtp_key_agreement: bool,
}

impl MediaConstraints {
    /// Feste Constraints eines Anrufs; Video wird nur empfangen,
    /// wenn der Host eine Video-Ansicht konfiguriert hat.
    pub fn for_call(video_configured: bool) -> Self {
        Self {
            offer_to_receive_audio: true,
            offer_to_receive_video: video_configured,
            internal_sctp_data_channels: true,
            dtls_srtp_key_agreement: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

/// Kamera für die lokale Videoaufnahme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraPosition {
    #[default]
    Front,
    Back,
}

/// Referenz auf einen empfangenen Track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrack {
    pub id: String,
    pub stream_id: String,
    pub kind: MediaKind,
}

/// Empfangener Media Stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStream {
    pub id: String,
    pub tracks: Vec<RemoteTrack>,
}

impl RemoteStream {
    pub fn first_video_track(&self) -> Option<&RemoteTrack> {
        self.tracks.iter().find(|t| t.kind == MediaKind::Video)
    }
}

// ============================================================================
// ENGINE EVENTS
// ============================================================================

/// Spontane Ereignisse einer Verbindung
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Lokal gefundener ICE Candidate
    CandidateDiscovered(IceCandidate),
    /// Remote Stream (oder Track eines Streams) ist angekommen
    StreamAdded(RemoteStream),
    StreamRemoved(RemoteStream),
    SignalingStateChanged(String),
    RenegotiationNeeded,
    Error(String),
}

/// Rückkanal für Engine-Ereignisse, darf aus beliebigen Tasks aufgerufen werden
pub type EngineEventSink = Arc<dyn Fn(EngineEvent) + Send + Sync>;

// ============================================================================
// CAPABILITY TRAITS
// ============================================================================

/// Erzeugt Verbindungen und lokale Tracks
#[async_trait]
pub trait MediaEngine: Send + Sync + 'static {
    async fn create_connection(
        &self,
        ice_servers: Vec<IceServer>,
        constraints: MediaConstraints,
        events: EngineEventSink,
    ) -> Result<Arc<dyn PeerConnection>, EngineError>;

    fn create_audio_track(&self) -> Result<LocalTrack, EngineError> {
        Ok(LocalTrack::audio(LOCAL_AUDIO_TRACK_ID))
    }

    fn create_video_track(&self, camera: CameraPosition) -> Result<LocalTrack, EngineError> {
        tracing::debug!("Creating local video track ({:?} camera)", camera);
        Ok(LocalTrack::video(LOCAL_VIDEO_TRACK_ID))
    }
}

/// Eine Peer Connection
///
/// Alle Methoden kehren erst zurück, wenn die Engine den Vorgang
/// abgeschlossen hat; die aufrufende Session wartet ohne Thread zu blockieren.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    async fn create_offer(&self) -> Result<SessionDescription, EngineError>;

    async fn create_answer(&self) -> Result<SessionDescription, EngineError>;

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), EngineError>;

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), EngineError>;

    async fn has_local_description(&self) -> bool;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), EngineError>;

    async fn add_stream(&self, stream: &LocalStream) -> Result<(), EngineError>;

    async fn remove_stream(&self, stream: &LocalStream) -> Result<(), EngineError>;

    async fn close(&self) -> Result<(), EngineError>;
}
