//! Video Module - Anordnung der Video-Flächen
//!
//! Dieses Modul verwaltet:
//! - Das Raster-Layout der Remote-Videos
//! - Die lokale Vorschau und ihre Sichtbarkeit
//! - Einen Renderer, der Änderungen als Ereignisse an den Host meldet

mod headless;
mod layout;
mod stage;

pub use headless::{HeadlessRenderer, SurfaceEvent, SurfaceState};
pub use layout::grid_layout;
pub use stage::{RemoteVideoSurface, SurfaceId, VideoRenderer, VideoStage};
