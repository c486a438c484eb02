//! Renderer ohne eigene Zeichenfläche
//!
//! Merkt sich den Zustand aller Flächen und meldet jede Änderung als
//! `SurfaceEvent`. Der Host zeichnet anhand dieser Ereignisse selbst.

use super::stage::{SurfaceId, VideoRenderer};
use crate::call_engine::{LocalTrack, RemoteTrack};
use crate::config::VideoLayoutParams;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Zustand einer Fläche
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceState {
    pub frame: Option<VideoLayoutParams>,
    pub hidden: bool,
    pub track_id: Option<String>,
    z_order: u64,
}

/// Änderung an einer Fläche, für den Host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "change", rename_all = "camelCase")]
pub enum SurfaceEvent {
    Created {
        surface: SurfaceId,
        frame: Option<VideoLayoutParams>,
    },
    Moved {
        surface: SurfaceId,
        frame: VideoLayoutParams,
    },
    Hidden {
        surface: SurfaceId,
        hidden: bool,
    },
    Raised {
        surface: SurfaceId,
    },
    #[serde(rename_all = "camelCase")]
    Attached {
        surface: SurfaceId,
        track_id: String,
        local: bool,
    },
    Removed {
        surface: SurfaceId,
    },
}

struct Inner {
    surfaces: HashMap<SurfaceId, SurfaceState>,
    next_z: u64,
}

pub struct HeadlessRenderer {
    inner: Mutex<Inner>,
    event_tx: broadcast::Sender<SurfaceEvent>,
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            inner: Mutex::new(Inner {
                surfaces: HashMap::new(),
                next_z: 0,
            }),
            event_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SurfaceEvent> {
        self.event_tx.subscribe()
    }

    pub fn surfaces(&self) -> HashMap<SurfaceId, SurfaceState> {
        self.inner.lock().surfaces.clone()
    }

    pub fn surface(&self, surface: SurfaceId) -> Option<SurfaceState> {
        self.inner.lock().surfaces.get(&surface).cloned()
    }

    /// Oberste Fläche
    pub fn topmost(&self) -> Option<SurfaceId> {
        self.inner
            .lock()
            .surfaces
            .iter()
            .max_by_key(|(_, s)| s.z_order)
            .map(|(id, _)| *id)
    }

    fn emit(&self, event: SurfaceEvent) {
        // Ohne Empfänger gehen Events verloren
        let _ = self.event_tx.send(event);
    }

    fn update(&self, surface: SurfaceId, f: impl FnOnce(&mut SurfaceState)) -> bool {
        let mut inner = self.inner.lock();
        match inner.surfaces.get_mut(&surface) {
            Some(state) => {
                f(state);
                true
            }
            None => {
                tracing::warn!("Unknown video surface {}", surface);
                false
            }
        }
    }

    fn attach(&self, surface: SurfaceId, track_id: &str, local: bool) {
        if self.update(surface, |s| s.track_id = Some(track_id.to_string())) {
            self.emit(SurfaceEvent::Attached {
                surface,
                track_id: track_id.to_string(),
                local,
            });
        }
    }
}

impl Default for HeadlessRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoRenderer for HeadlessRenderer {
    fn create_surface(&self, frame: Option<VideoLayoutParams>) -> SurfaceId {
        let surface = Uuid::new_v4();
        {
            let mut inner = self.inner.lock();
            inner.next_z += 1;
            let z_order = inner.next_z;
            inner.surfaces.insert(
                surface,
                SurfaceState {
                    frame,
                    hidden: false,
                    track_id: None,
                    z_order,
                },
            );
        }

        self.emit(SurfaceEvent::Created { surface, frame });
        surface
    }

    fn set_frame(&self, surface: SurfaceId, frame: VideoLayoutParams) {
        if self.update(surface, |s| s.frame = Some(frame)) {
            self.emit(SurfaceEvent::Moved { surface, frame });
        }
    }

    fn set_hidden(&self, surface: SurfaceId, hidden: bool) {
        if self.update(surface, |s| s.hidden = hidden) {
            self.emit(SurfaceEvent::Hidden { surface, hidden });
        }
    }

    fn bring_to_front(&self, surface: SurfaceId) {
        let raised = {
            let mut inner = self.inner.lock();
            inner.next_z += 1;
            let z_order = inner.next_z;
            match inner.surfaces.get_mut(&surface) {
                Some(state) => {
                    state.z_order = z_order;
                    true
                }
                None => false,
            }
        };

        if raised {
            self.emit(SurfaceEvent::Raised { surface });
        }
    }

    fn remove_surface(&self, surface: SurfaceId) {
        if self.inner.lock().surfaces.remove(&surface).is_some() {
            self.emit(SurfaceEvent::Removed { surface });
        }
    }

    fn attach_remote(&self, surface: SurfaceId, track: &RemoteTrack) {
        self.attach(surface, &track.id, false);
    }

    fn attach_local(&self, surface: SurfaceId, track: &LocalTrack) {
        self.attach(surface, track.id(), true);
    }
}

// ============================================================================
// TESTS
// ============================================================================
