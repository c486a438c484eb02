//! Call Engine Module - Media-Engine Schnittstelle und WebRTC
//!
//! Dieses Modul verwaltet:
//! - Die Schnittstelle zur Media-Engine (Offer/Answer, ICE, Streams)
//! - Geteilte lokale Audio/Video Tracks
//! - Die Implementierung mit webrtc-rs

mod engine;
#[cfg(test)]
pub(crate) mod fake;
mod media;
mod rtc;

pub use engine::{
    CameraPosition, EngineError, EngineEvent, EngineEventSink, IceCandidate, IceServer,
    MediaConstraints, MediaEngine, MediaKind, PeerConnection, RemoteStream, RemoteTrack, SdpType,
    SessionDescription,
};
pub use media::{
    LocalMedia, LocalStream, LocalTrack, LOCAL_AUDIO_TRACK_ID, LOCAL_STREAM_LABEL,
    LOCAL_VIDEO_TRACK_ID,
};
pub use rtc::{WebRtcConnection, WebRtcEngine};
