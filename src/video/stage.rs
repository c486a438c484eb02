//! Video-Bühne
//!
//! Verwaltet die Video-Flächen aller Sessions: lokale Vorschau, Remote-Kacheln
//! in Ankunftsreihenfolge und deren Sichtbarkeit. Das eigentliche Zeichnen
//! übernimmt der Host über `VideoRenderer`.

use super::layout::grid_layout;
use crate::call_engine::{LocalTrack, RemoteTrack};
use crate::config::{VideoConfig, VideoLayoutParams};
use std::sync::Arc;
use uuid::Uuid;

pub type SurfaceId = Uuid;

// ============================================================================
// RENDERER
// ============================================================================

/// Zeichenfläche des Hosts
pub trait VideoRenderer: Send + Sync {
    /// Erzeugt eine neue Fläche; ohne `frame` wird sie später positioniert
    fn create_surface(&self, frame: Option<VideoLayoutParams>) -> SurfaceId;

    fn set_frame(&self, surface: SurfaceId, frame: VideoLayoutParams);

    fn set_hidden(&self, surface: SurfaceId, hidden: bool);

    fn bring_to_front(&self, surface: SurfaceId);

    fn remove_surface(&self, surface: SurfaceId);

    fn attach_remote(&self, surface: SurfaceId, track: &RemoteTrack);

    fn attach_local(&self, surface: SurfaceId, track: &LocalTrack);
}

/// Remote Video-Track mit seiner Fläche
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteVideoSurface {
    pub track: RemoteTrack,
    pub surface: SurfaceId,
}

// ============================================================================
// STAGE
// ============================================================================

pub struct VideoStage {
    renderer: Arc<dyn VideoRenderer>,
    config: Option<VideoConfig>,
    local_view: Option<SurfaceId>,
    remote: Vec<RemoteVideoSurface>,
}

impl VideoStage {
    pub fn new(renderer: Arc<dyn VideoRenderer>) -> Self {
        Self {
            renderer,
            config: None,
            local_view: None,
            remote: Vec::new(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    pub fn config(&self) -> Option<&VideoConfig> {
        self.config.as_ref()
    }

    pub fn set_config(&mut self, config: VideoConfig) {
        self.config = Some(config);
    }

    pub fn local_view(&self) -> Option<SurfaceId> {
        self.local_view
    }

    pub fn remote_surfaces(&self) -> &[RemoteVideoSurface] {
        &self.remote
    }

    /// Zeigt die lokale Vorschau an der konfigurierten Stelle
    ///
    /// Existiert die Fläche schon, wird sie nur verschoben.
    pub fn show_local(&mut self, track: &LocalTrack) {
        let Some(frame) = self.config.as_ref().and_then(VideoConfig::local_frame) else {
            return;
        };

        match self.local_view {
            Some(surface) => self.renderer.set_frame(surface, frame),
            None => {
                let surface = self.renderer.create_surface(Some(frame));
                self.renderer.attach_local(surface, track);
                self.local_view = Some(surface);
            }
        }
    }

    /// Entfernt die lokale Vorschau, falls vorhanden
    pub fn remove_local_view(&mut self) {
        if let Some(surface) = self.local_view.take() {
            self.renderer.set_hidden(surface, true);
            self.renderer.remove_surface(surface);
        }
    }

    /// Hängt einen Remote Video-Track an eine neue Kachel
    ///
    /// Ohne Video-Konfiguration passiert nichts. Doppelte Tracks werden ignoriert.
    pub fn add_remote_track(&mut self, track: &RemoteTrack) -> bool {
        if !self.is_configured() {
            tracing::debug!("No video view configured, not showing track {}", track.id);
            return false;
        }
        if self.remote.iter().any(|r| r.track.id == track.id) {
            return false;
        }

        let surface = self.renderer.create_surface(None);
        self.renderer.attach_remote(surface, track);
        self.remote.push(RemoteVideoSurface {
            track: track.clone(),
            surface,
        });

        self.refresh();

        if let Some(local) = self.local_view {
            self.renderer.bring_to_front(local);
        }
        true
    }

    /// Entfernt die Kachel eines Remote Video-Tracks
    pub fn remove_remote_track(&mut self, track: &RemoteTrack) -> bool {
        let Some(index) = self.remote.iter().position(|r| r.track.id == track.id) else {
            return false;
        };

        let removed = self.remote.remove(index);
        self.renderer.set_hidden(removed.surface, true);
        self.renderer.remove_surface(removed.surface);
        self.refresh();
        true
    }

    /// Ordnet alle Remote-Kacheln neu im Raster an
    pub fn refresh(&self) {
        let Some(config) = &self.config else {
            return;
        };

        let frames = grid_layout(self.remote.len(), &config.container);
        for (remote, frame) in self.remote.iter().zip(frames) {
            self.renderer.set_frame(remote.surface, frame);
        }
    }

    /// Blendet alle Flächen aus oder ein
    pub fn set_hidden(&self, hidden: bool) {
        if let Some(local) = self.local_view {
            self.renderer.set_hidden(local, hidden);
        }
        for remote in &self.remote {
            self.renderer.set_hidden(remote.surface, hidden);
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call_engine::{MediaKind, LOCAL_VIDEO_TRACK_ID};
    use crate::video::HeadlessRenderer;

    fn remote(id: &str) -> RemoteTrack {
        RemoteTrack {
            id: id.to_string(),
            stream_id: format!("stream-{}", id),
            kind: MediaKind::Video,
        }
    }

    fn config(local: Option<VideoLayoutParams>) -> VideoConfig {
        VideoConfig {
            container: VideoLayoutParams::new(0, 0, 300, 600),
            local,
            camera: None,
        }
    }

    #[test]
    fn test_remote_track_ignored_without_config() {
        let renderer = Arc::new(HeadlessRenderer::new());
        let mut stage = VideoStage::new(renderer.clone());

        assert!(!stage.add_remote_track(&remote("a")));
        assert!(stage.remote_surfaces().is_empty());
        assert!(renderer.surfaces().is_empty());
    }

    #[test]
    fn test_tiles_follow_arrival_order() {
        let renderer = Arc::new(HeadlessRenderer::new());
        let mut stage = VideoStage::new(renderer.clone());
        stage.set_config(config(None));

        assert!(stage.add_remote_track(&remote("a")));
        assert!(stage.add_remote_track(&remote("b")));
        assert!(!stage.add_remote_track(&remote("a")));

        let surfaces = stage.remote_surfaces();
        assert_eq!(surfaces.len(), 2);
        assert_eq!(
            renderer.surface(surfaces[0].surface).unwrap().frame,
            Some(VideoLayoutParams::new(0, 225, 150, 150))
        );
        assert_eq!(
            renderer.surface(surfaces[1].surface).unwrap().frame,
            Some(VideoLayoutParams::new(150, 225, 150, 150))
        );
    }

    #[test]
    fn test_removal_relayouts_remaining_tiles() {
        let renderer = Arc::new(HeadlessRenderer::new());
        let mut stage = VideoStage::new(renderer.clone());
        stage.set_config(config(None));

        stage.add_remote_track(&remote("a"));
        stage.add_remote_track(&remote("b"));
        let first = stage.remote_surfaces()[0].surface;

        assert!(stage.remove_remote_track(&remote("a")));
        assert!(!stage.remove_remote_track(&remote("a")));
        assert!(renderer.surface(first).is_none());

        let remaining = stage.remote_surfaces()[0].surface;
        assert_eq!(
            renderer.surface(remaining).unwrap().frame,
            Some(VideoLayoutParams::new(0, 150, 300, 300))
        );
    }

    #[test]
    fn test_local_view_is_created_once_and_kept_on_top() {
        let renderer = Arc::new(HeadlessRenderer::new());
        let mut stage = VideoStage::new(renderer.clone());
        stage.set_config(config(Some(VideoLayoutParams::new(10, 10, 40, 60))));

        let track = LocalTrack::video(LOCAL_VIDEO_TRACK_ID);
        stage.show_local(&track);
        let local = stage.local_view().unwrap();

        stage.set_config(VideoConfig {
            container: VideoLayoutParams::new(5, 5, 300, 600),
            local: Some(VideoLayoutParams::new(10, 10, 40, 60)),
            camera: None,
        });
        stage.show_local(&track);
        assert_eq!(stage.local_view(), Some(local));
        assert_eq!(
            renderer.surface(local).unwrap().frame,
            Some(VideoLayoutParams::new(15, 15, 40, 60))
        );

        stage.add_remote_track(&remote("a"));
        assert_eq!(renderer.topmost(), Some(local));
    }

    #[test]
    fn test_hide_and_show_all_surfaces() {
        let renderer = Arc::new(HeadlessRenderer::new());
        let mut stage = VideoStage::new(renderer.clone());
        stage.set_config(config(Some(VideoLayoutParams::new(0, 0, 40, 60))));
        stage.show_local(&LocalTrack::video(LOCAL_VIDEO_TRACK_ID));
        stage.add_remote_track(&remote("a"));

        stage.set_hidden(true);
        assert!(renderer.surfaces().values().all(|s| s.hidden));

        stage.set_hidden(false);
        assert!(renderer.surfaces().values().all(|s| !s.hidden));

        stage.remove_local_view();
        assert_eq!(renderer.surfaces().len(), 1);
    }
}
