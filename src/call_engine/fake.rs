//! In-Memory Media-Engine für Tests
//!
//! Zeichnet alle Aufrufe auf und verhält sich bei ICE Candidates wie webrtc:
//! ohne Remote Description werden sie abgelehnt.

use super::engine::{
    CameraPosition, EngineError, EngineEvent, EngineEventSink, IceCandidate, IceServer,
    MediaConstraints, MediaEngine, PeerConnection, SdpType, SessionDescription,
};
use super::media::{LocalStream, LocalTrack, LOCAL_AUDIO_TRACK_ID, LOCAL_VIDEO_TRACK_ID};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// SDP mit ISAC an dritter Stelle
pub const FAKE_SDP: &str = "v=0\r\n\
o=- 0 0 IN IP4 127.0.0.1\r\n\
s=-\r\n\
m=audio 9 UDP/TLS/RTP/SAVPF 111 103 104\r\n\
a=rtpmap:111 opus/48000/2\r\n\
a=rtpmap:103 ISAC/32000\r\n\
a=rtpmap:104 ISAC/16000\r\n";

/// SDP nach dem Umsortieren durch den Codec-Rewrite
pub const FAKE_SDP_PREFERRED: &str = "v=0\r\n\
o=- 0 0 IN IP4 127.0.0.1\r\n\
s=-\r\n\
m=audio 9 UDP/TLS/RTP/SAVPF 104 111 103\r\n\
a=rtpmap:111 opus/48000/2\r\n\
a=rtpmap:103 ISAC/32000\r\n\
a=rtpmap:104 ISAC/16000\r\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateOffer,
    CreateAnswer,
    SetLocal(SessionDescription),
    SetRemote(SessionDescription),
    AddCandidate(IceCandidate),
    AddStream(Vec<String>),
    RemoveStream(Vec<String>),
    Close,
}

pub struct FakeConnection {
    pub ice_servers: Vec<IceServer>,
    pub constraints: MediaConstraints,
    events: EngineEventSink,
    calls: Mutex<Vec<Call>>,
    local: Mutex<Option<SessionDescription>>,
    remote: Mutex<Option<SessionDescription>>,
}

impl FakeConnection {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn candidates(&self) -> Vec<IceCandidate> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::AddCandidate(candidate) => Some(candidate),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| pred(c)).count()
    }

    /// Simuliert ein spontanes Engine-Ereignis
    pub fn emit(&self, event: EngineEvent) {
        (self.events)(event);
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl PeerConnection for FakeConnection {
    async fn create_offer(&self) -> Result<SessionDescription, EngineError> {
        self.record(Call::CreateOffer);
        Ok(SessionDescription::offer(FAKE_SDP))
    }

    async fn create_answer(&self) -> Result<SessionDescription, EngineError> {
        self.record(Call::CreateAnswer);
        match &*self.remote.lock() {
            Some(remote) if remote.sdp_type == SdpType::Offer => {
                Ok(SessionDescription::answer(FAKE_SDP))
            }
            _ => Err(EngineError::WebRTC("no remote offer".to_string())),
        }
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), EngineError> {
        self.record(Call::SetLocal(desc.clone()));
        *self.local.lock() = Some(desc);
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), EngineError> {
        self.record(Call::SetRemote(desc.clone()));
        if desc.sdp.is_empty() {
            return Err(EngineError::InvalidSdp("empty".to_string()));
        }
        *self.remote.lock() = Some(desc);
        Ok(())
    }

    async fn has_local_description(&self) -> bool {
        self.local.lock().is_some()
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), EngineError> {
        if self.remote.lock().is_none() {
            return Err(EngineError::WebRTC("remote description not set".to_string()));
        }
        self.record(Call::AddCandidate(candidate));
        Ok(())
    }

    async fn add_stream(&self, stream: &LocalStream) -> Result<(), EngineError> {
        self.record(Call::AddStream(stream.track_ids()));
        Ok(())
    }

    async fn remove_stream(&self, stream: &LocalStream) -> Result<(), EngineError> {
        self.record(Call::RemoveStream(stream.track_ids()));
        Ok(())
    }

    async fn close(&self) -> Result<(), EngineError> {
        self.record(Call::Close);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeEngine {
    connections: Mutex<Vec<Arc<FakeConnection>>>,
    audio_tracks: AtomicUsize,
    video_tracks: AtomicUsize,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connections(&self) -> Vec<Arc<FakeConnection>> {
        self.connections.lock().clone()
    }

    pub fn last_connection(&self) -> Option<Arc<FakeConnection>> {
        self.connections.lock().last().cloned()
    }

    pub fn audio_tracks_created(&self) -> usize {
        self.audio_tracks.load(Ordering::SeqCst)
    }

    pub fn video_tracks_created(&self) -> usize {
        self.video_tracks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaEngine for FakeEngine {
    async fn create_connection(
        &self,
        ice_servers: Vec<IceServer>,
        constraints: MediaConstraints,
        events: EngineEventSink,
    ) -> Result<Arc<dyn PeerConnection>, EngineError> {
        let connection = Arc::new(FakeConnection {
            ice_servers,
            constraints,
            events,
            calls: Mutex::new(Vec::new()),
            local: Mutex::new(None),
            remote: Mutex::new(None),
        });
        self.connections.lock().push(Arc::clone(&connection));
        Ok(connection)
    }

    fn create_audio_track(&self) -> Result<LocalTrack, EngineError> {
        self.audio_tracks.fetch_add(1, Ordering::SeqCst);
        Ok(LocalTrack::audio(LOCAL_AUDIO_TRACK_ID))
    }

    fn create_video_track(&self, _camera: CameraPosition) -> Result<LocalTrack, EngineError> {
        self.video_tracks.fetch_add(1, Ordering::SeqCst);
        Ok(LocalTrack::video(LOCAL_VIDEO_TRACK_ID))
    }
}
