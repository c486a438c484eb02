//! WebRTC Media-Engine
//!
//! Implementiert `MediaEngine` und `PeerConnection` mit dem `webrtc` Crate.
//! Callbacks der Peer Connection werden in `EngineEvent`s übersetzt.

use super::engine::{
    EngineError, EngineEvent, EngineEventSink, IceCandidate, IceServer, MediaConstraints,
    MediaEngine, MediaKind, PeerConnection, RemoteStream, RemoteTrack, SdpType,
    SessionDescription,
};
use super::media::LocalStream;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine as RtcMediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::signaling_state::RTCSignalingState;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;

/// Label des Datenkanals, wenn SCTP-Datenkanäle aktiviert sind
const DATA_CHANNEL_LABEL: &str = "ARDAMSd0";

fn rtc_error(e: webrtc::Error) -> EngineError {
    EngineError::WebRTC(e.to_string())
}

// ============================================================================
// ENGINE
// ============================================================================

/// Media-Engine auf Basis von webrtc-rs
#[derive(Debug, Default)]
pub struct WebRtcEngine;

impl WebRtcEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MediaEngine for WebRtcEngine {
    async fn create_connection(
        &self,
        ice_servers: Vec<IceServer>,
        constraints: MediaConstraints,
        events: EngineEventSink,
    ) -> Result<Arc<dyn PeerConnection>, EngineError> {
        // Media Engine mit Standard-Codecs (Opus, VP8, ...)
        let mut media_engine = RtcMediaEngine::default();
        media_engine.register_default_codecs().map_err(rtc_error)?;

        // Interceptors für RTCP, NACK etc.
        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media_engine).map_err(rtc_error)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let config = RTCConfiguration {
            ice_servers: ice_servers
                .into_iter()
                .map(|server| RTCIceServer {
                    urls: vec![server.url],
                    username: server.username,
                    credential: server.credential,
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        let pc = Arc::new(api.new_peer_connection(config).await.map_err(rtc_error)?);

        apply_constraints(&pc, &constraints).await?;
        setup_peer_connection_handlers(&pc, events);

        Ok(Arc::new(WebRtcConnection {
            pc,
            senders: Mutex::new(HashMap::new()),
        }))
    }
}

/// Übersetzt die Constraints in Transceiver und Datenkanal
async fn apply_constraints(
    pc: &Arc<RTCPeerConnection>,
    constraints: &MediaConstraints,
) -> Result<(), EngineError> {
    let receive = [
        (RTPCodecType::Audio, constraints.offer_to_receive_audio),
        (RTPCodecType::Video, constraints.offer_to_receive_video),
    ];

    for (kind, enabled) in receive {
        if !enabled {
            continue;
        }
        let init = RTCRtpTransceiverInit {
            direction: RTCRtpTransceiverDirection::Recvonly,
            send_encodings: vec![],
        };
        pc.add_transceiver_from_kind(kind, Some(init))
            .await
            .map_err(rtc_error)?;
    }

    if constraints.internal_sctp_data_channels {
        pc.create_data_channel(DATA_CHANNEL_LABEL, None)
            .await
            .map_err(rtc_error)?;
    }

    // webrtc-rs verhandelt immer DTLS-SRTP
    if !constraints.dtls_srtp_key_agreement {
        tracing::warn!("DTLS-SRTP key agreement cannot be disabled, ignoring constraint");
    }

    Ok(())
}

/// Registriert Event Handler für die Peer Connection
fn setup_peer_connection_handlers(pc: &Arc<RTCPeerConnection>, events: EngineEventSink) {
    // Connection State Handler
    let events_clone = Arc::clone(&events);
    pc.on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
        tracing::info!("Peer connection state: {:?}", s);
        if matches!(s, RTCPeerConnectionState::Failed) {
            events_clone(EngineEvent::Error("peer connection failed".to_string()));
        }
        Box::pin(async {})
    }));

    // Signaling State Handler
    let events_clone = Arc::clone(&events);
    pc.on_signaling_state_change(Box::new(move |s: RTCSignalingState| {
        events_clone(EngineEvent::SignalingStateChanged(format!("{:?}", s)));
        Box::pin(async {})
    }));

    // ICE Candidate Handler
    let events_clone = Arc::clone(&events);
    pc.on_ice_candidate(Box::new(move |candidate| {
        if let Some(c) = candidate {
            match c.to_json() {
                Ok(json) => events_clone(EngineEvent::CandidateDiscovered(IceCandidate {
                    sdp_mid: json.sdp_mid.unwrap_or_default(),
                    sdp_mline_index: json.sdp_mline_index.unwrap_or_default(),
                    candidate: json.candidate,
                })),
                Err(e) => tracing::warn!("Failed to serialize local ICE candidate: {}", e),
            }
        }
        Box::pin(async {})
    }));

    // Track Handler, jeder Track wird als eigener Stream gemeldet
    let events_clone = Arc::clone(&events);
    pc.on_track(Box::new(move |track, _, _| {
        let kind = match track.kind() {
            RTPCodecType::Video => MediaKind::Video,
            _ => MediaKind::Audio,
        };
        let stream_id = track.stream_id().to_string();
        tracing::info!("Received remote track {} ({:?})", track.id(), kind);

        events_clone(EngineEvent::StreamAdded(RemoteStream {
            id: stream_id.clone(),
            tracks: vec![RemoteTrack {
                id: track.id().to_string(),
                stream_id,
                kind,
            }],
        }));
        Box::pin(async {})
    }));

    // Renegotiation Handler
    pc.on_negotiation_needed(Box::new(move || {
        events(EngineEvent::RenegotiationNeeded);
        Box::pin(async {})
    }));
}

// ============================================================================
// CONNECTION
// ============================================================================

/// Peer Connection mit Buchführung über die RTP Sender je lokalem Stream
pub struct WebRtcConnection {
    pc: Arc<RTCPeerConnection>,
    senders: Mutex<HashMap<String, Vec<Arc<RTCRtpSender>>>>,
}

impl WebRtcConnection {
    fn to_rtc(desc: SessionDescription) -> Result<RTCSessionDescription, EngineError> {
        let result = match desc.sdp_type {
            SdpType::Offer => RTCSessionDescription::offer(desc.sdp),
            SdpType::Answer => RTCSessionDescription::answer(desc.sdp),
        };
        result.map_err(|e| EngineError::InvalidSdp(e.to_string()))
    }
}

#[async_trait]
impl PeerConnection for WebRtcConnection {
    async fn create_offer(&self) -> Result<SessionDescription, EngineError> {
        let offer = self.pc.create_offer(None).await.map_err(rtc_error)?;
        Ok(SessionDescription::offer(offer.sdp))
    }

    async fn create_answer(&self) -> Result<SessionDescription, EngineError> {
        let answer = self.pc.create_answer(None).await.map_err(rtc_error)?;
        Ok(SessionDescription::answer(answer.sdp))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), EngineError> {
        self.pc
            .set_local_description(Self::to_rtc(desc)?)
            .await
            .map_err(rtc_error)
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), EngineError> {
        self.pc
            .set_remote_description(Self::to_rtc(desc)?)
            .await
            .map_err(rtc_error)
    }

    async fn has_local_description(&self) -> bool {
        self.pc.local_description().await.is_some()
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), EngineError> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: Some(candidate.sdp_mid),
            sdp_mline_index: Some(candidate.sdp_mline_index),
            ..Default::default()
        };

        self.pc.add_ice_candidate(init).await.map_err(rtc_error)
    }

    async fn add_stream(&self, stream: &LocalStream) -> Result<(), EngineError> {
        let mut senders = Vec::with_capacity(stream.tracks.len());
        for track in &stream.tracks {
            let sender = self
                .pc
                .add_track(track.rtc_track())
                .await
                .map_err(rtc_error)?;
            senders.push(sender);
        }

        self.senders
            .lock()
            .entry(stream.label.clone())
            .or_default()
            .extend(senders);
        Ok(())
    }

    async fn remove_stream(&self, stream: &LocalStream) -> Result<(), EngineError> {
        let senders = self.senders.lock().remove(&stream.label).unwrap_or_default();
        for sender in senders {
            self.pc.remove_track(&sender).await.map_err(rtc_error)?;
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), EngineError> {
        self.senders.lock().clear();
        self.pc.close().await.map_err(rtc_error)
    }
}

impl std::fmt::Debug for WebRtcConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebRtcConnection")
            .field("connection_state", &self.pc.connection_state())
            .finish()
    }
}
