//! Konfiguration
//!
//! Enthält alle Konfigurationsstrukturen, die der Host als JSON übergibt:
//! - `SessionConfig` pro Anruf (Initiator, TURN-Server, lokale Streams)
//! - `VideoConfig` für Container und lokale Vorschau
//! - `EngineSettings` für prozessweite Einstellungen (Umgebungsvariablen)

use crate::call_engine::{CameraPosition, IceServer};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Öffentlicher STUN-Server, der jeder Verbindung vorangestellt wird
pub const DEFAULT_STUN_URL: &str = "stun:stun.l.google.com:19302";

/// Audio-Codec, der im `m=audio` Block nach vorne sortiert wird
pub const DEFAULT_PREFERRED_CODEC: &str = "ISAC/16000";

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid video container: {width}x{height}")]
    InvalidContainer { width: i32, height: i32 },
}

// ============================================================================
// SESSION CONFIG
// ============================================================================

/// TURN-Server Zugangsdaten
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnConfig {
    pub host: String,
    pub username: String,
    pub password: String,
}

/// Welche lokalen Medien veröffentlicht werden
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreamsConfig {
    pub audio: bool,
    pub video: bool,
}

/// Konfiguration einer Session
///
/// Wird bei `renegotiate` komplett ersetzt, nie teilweise verändert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    pub is_initiator: bool,
    pub turn: TurnConfig,
    pub streams: StreamsConfig,
}

impl SessionConfig {
    /// Baut die ICE-Server Liste: öffentlicher STUN-Fallback plus TURN-Server
    pub fn ice_servers(&self, stun_url: &str) -> Vec<IceServer> {
        vec![
            IceServer {
                url: stun_url.to_string(),
                username: String::new(),
                credential: String::new(),
            },
            IceServer {
                url: self.turn.host.clone(),
                username: self.turn.username.clone(),
                credential: self.turn.password.clone(),
            },
        ]
    }
}

// ============================================================================
// VIDEO CONFIG
// ============================================================================

/// Rechteck in Pixeln
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "RawLayoutParams")]
pub struct VideoLayoutParams {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Format des Hosts: `{"position": [x, y], "size": [w, h]}`
#[derive(Deserialize)]
struct RawLayoutParams {
    position: [i32; 2],
    size: [i32; 2],
}

impl From<RawLayoutParams> for VideoLayoutParams {
    fn from(raw: RawLayoutParams) -> Self {
        Self {
            x: raw.position[0],
            y: raw.position[1],
            width: raw.size[0],
            height: raw.size[1],
        }
    }
}

impl VideoLayoutParams {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Video-Container und optionale lokale Vorschau
///
/// `local` ist relativ zum Container positioniert.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VideoConfig {
    #[serde(rename = "containerParams")]
    pub container: VideoLayoutParams,
    #[serde(default)]
    pub local: Option<VideoLayoutParams>,
    #[serde(default)]
    pub camera: Option<String>,
}

impl VideoConfig {
    /// Ein Container ohne positive Fläche ist unbrauchbar
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.container.width <= 0 || self.container.height <= 0 {
            return Err(ConfigError::InvalidContainer {
                width: self.container.width,
                height: self.container.height,
            });
        }
        Ok(())
    }

    /// Gewünschte Kamera, Frontkamera wenn nichts Gültiges angegeben ist
    pub fn camera_position(&self) -> CameraPosition {
        match self.camera.as_deref() {
            Some("Back") => CameraPosition::Back,
            _ => CameraPosition::Front,
        }
    }

    /// Absolute Position der lokalen Vorschau
    pub fn local_frame(&self) -> Option<VideoLayoutParams> {
        self.local.map(|local| VideoLayoutParams {
            x: local.x + self.container.x,
            y: local.y + self.container.y,
            width: local.width,
            height: local.height,
        })
    }
}

// ============================================================================
// ENGINE SETTINGS
// ============================================================================

/// Prozessweite Einstellungen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub stun_url: String,
    pub preferred_audio_codec: String,
}

impl EngineSettings {
    /// Liest `PEERCALL_STUN_URL` und `PEERCALL_PREFERRED_CODEC`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            stun_url: std::env::var("PEERCALL_STUN_URL").unwrap_or(defaults.stun_url),
            preferred_audio_codec: std::env::var("PEERCALL_PREFERRED_CODEC")
                .unwrap_or(defaults.preferred_audio_codec),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            stun_url: DEFAULT_STUN_URL.to_string(),
            preferred_audio_codec: DEFAULT_PREFERRED_CODEC.to_string(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
