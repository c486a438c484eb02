//! Lokale Medien
//!
//! Lokale Audio- und Video-Tracks werden von allen Sessions geteilt. Sie
//! entstehen beim ersten Bedarf und werden erst freigegeben, wenn die letzte
//! Session endet.

use super::engine::{CameraPosition, EngineError, MediaEngine, MediaKind};
use crate::config::StreamsConfig;
use std::sync::Arc;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;

pub const LOCAL_STREAM_LABEL: &str = "ARDAMS";
pub const LOCAL_AUDIO_TRACK_ID: &str = "ARDAMSa0";
pub const LOCAL_VIDEO_TRACK_ID: &str = "ARDAMSv0";

/// Abtastrate des lokalen Opus-Tracks
pub const AUDIO_CLOCK_RATE: u32 = 48000;
const VIDEO_CLOCK_RATE: u32 = 90000;

// ============================================================================
// LOCAL TRACK
// ============================================================================

/// Lokaler Track, geteilt zwischen allen Sessions
#[derive(Clone)]
pub struct LocalTrack {
    id: String,
    kind: MediaKind,
    track: Arc<TrackLocalStaticSample>,
}

impl LocalTrack {
    /// Opus Audio-Track
    pub fn audio(id: &str) -> Self {
        let track = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_string(),
                clock_rate: AUDIO_CLOCK_RATE,
                channels: 1,
                ..Default::default()
            },
            id.to_string(),
            LOCAL_STREAM_LABEL.to_string(),
        ));

        Self {
            id: id.to_string(),
            kind: MediaKind::Audio,
            track,
        }
    }

    /// VP8 Video-Track
    pub fn video(id: &str) -> Self {
        let track = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP8.to_string(),
                clock_rate: VIDEO_CLOCK_RATE,
                ..Default::default()
            },
            id.to_string(),
            LOCAL_STREAM_LABEL.to_string(),
        ));

        Self {
            id: id.to_string(),
            kind: MediaKind::Video,
            track,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Der zugrunde liegende webrtc Track
    pub fn rtc_track(&self) -> Arc<dyn TrackLocal + Send + Sync> {
        Arc::clone(&self.track) as Arc<dyn TrackLocal + Send + Sync>
    }
}

impl std::fmt::Debug for LocalTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalTrack")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Lokaler Stream, so wie er an eine Verbindung gehängt wird
#[derive(Debug, Clone)]
pub struct LocalStream {
    pub label: String,
    pub tracks: Vec<LocalTrack>,
}

impl LocalStream {
    pub fn track_ids(&self) -> Vec<String> {
        self.tracks.iter().map(|t| t.id().to_string()).collect()
    }
}

// ============================================================================
// SHARED LOCAL MEDIA
// ============================================================================

/// Geteilte lokale Aufnahme-Ressourcen
#[derive(Debug, Default)]
pub struct LocalMedia {
    audio: Option<LocalTrack>,
    video: Option<LocalTrack>,
    camera: CameraPosition,
}

impl LocalMedia {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kamera für die nächste Initialisierung des Video-Tracks
    pub fn set_camera(&mut self, camera: CameraPosition) {
        self.camera = camera;
    }

    /// Lokaler Audio-Track, wird beim ersten Aufruf erzeugt
    pub fn audio_track(&mut self, engine: &dyn MediaEngine) -> Result<LocalTrack, EngineError> {
        if let Some(track) = &self.audio {
            return Ok(track.clone());
        }

        let track = engine.create_audio_track()?;
        tracing::info!("Initialized local audio track {}", track.id());
        self.audio = Some(track.clone());
        Ok(track)
    }

    /// Lokaler Video-Track, wird beim ersten Aufruf erzeugt
    pub fn video_track(&mut self, engine: &dyn MediaEngine) -> Result<LocalTrack, EngineError> {
        if let Some(track) = &self.video {
            return Ok(track.clone());
        }

        let track = engine.create_video_track(self.camera)?;
        tracing::info!("Initialized local video track {}", track.id());
        self.video = Some(track.clone());
        Ok(track)
    }

    /// Baut einen frischen lokalen Stream gemäß `streams`
    pub fn stream(
        &mut self,
        engine: &dyn MediaEngine,
        streams: &StreamsConfig,
    ) -> Result<LocalStream, EngineError> {
        let mut tracks = Vec::new();
        if streams.audio {
            tracks.push(self.audio_track(engine)?);
        }
        if streams.video {
            tracks.push(self.video_track(engine)?);
        }

        Ok(LocalStream {
            label: LOCAL_STREAM_LABEL.to_string(),
            tracks,
        })
    }

    pub fn is_capturing(&self) -> bool {
        self.audio.is_some() || self.video.is_some()
    }

    /// Gibt alle lokalen Tracks frei
    pub fn release(&mut self) {
        if self.is_capturing() {
            tracing::info!("Releasing local capture resources");
        }
        self.audio = None;
        self.video = None;
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call_engine::fake::FakeEngine;

    #[test]
    fn test_tracks_are_created_lazily_and_shared() {
        let engine = FakeEngine::new();
        let mut media = LocalMedia::new();
        assert!(!media.is_capturing());

        let streams = StreamsConfig {
            audio: true,
            video: false,
        };
        let first = media.stream(&engine, &streams).unwrap();
        let second = media.stream(&engine, &streams).unwrap();

        assert_eq!(first.track_ids(), vec![LOCAL_AUDIO_TRACK_ID]);
        assert_eq!(second.track_ids(), vec![LOCAL_AUDIO_TRACK_ID]);
        assert_eq!(engine.audio_tracks_created(), 1);
        assert_eq!(engine.video_tracks_created(), 0);
    }

    #[test]
    fn test_release_forces_new_tracks() {
        let engine = FakeEngine::new();
        let mut media = LocalMedia::new();

        let streams = StreamsConfig {
            audio: true,
            video: true,
        };
        let stream = media.stream(&engine, &streams).unwrap();
        assert_eq!(
            stream.track_ids(),
            vec![LOCAL_AUDIO_TRACK_ID, LOCAL_VIDEO_TRACK_ID]
        );

        media.release();
        assert!(!media.is_capturing());

        media.stream(&engine, &streams).unwrap();
        assert_eq!(engine.audio_tracks_created(), 2);
        assert_eq!(engine.video_tracks_created(), 2);
    }

    #[test]
    fn test_empty_streams_config_gives_empty_stream() {
        let engine = FakeEngine::new();
        let mut media = LocalMedia::new();

        let stream = media.stream(&engine, &StreamsConfig::default()).unwrap();
        assert!(stream.tracks.is_empty());
        assert_eq!(stream.label, LOCAL_STREAM_LABEL);
    }
}
