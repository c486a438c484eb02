//! Session-Registry
//!
//! Hält alle laufenden Sessions, die geteilten lokalen Medien und die
//! Video-Bühne. Sessions sprechen über `SessionHost` mit der Registry und
//! halten nur eine schwache Referenz auf sie.

use super::actor::{spawn_session, SessionCommand, SessionHandle};
use super::machine::{SessionEvents, SessionHost, SessionState};
use crate::call_engine::{EngineError, LocalMedia, LocalStream, MediaEngine, RemoteTrack};
use crate::config::{ConfigError, EngineSettings, SessionConfig, StreamsConfig, VideoConfig};
use crate::video::{VideoRenderer, VideoStage};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Session already exists: {0}")]
    SessionExists(String),

    #[error("Unknown session: {0}")]
    UnknownSession(String),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

// ============================================================================
// REGISTRY
// ============================================================================

struct RegistryInner {
    engine: Arc<dyn MediaEngine>,
    settings: Arc<EngineSettings>,
    sessions: RwLock<HashMap<String, SessionHandle>>,
    media: Mutex<LocalMedia>,
    stage: Mutex<VideoStage>,
}

impl RegistryInner {
    /// Entfernt eine beendete Session; mit der letzten werden die lokalen Medien frei
    ///
    /// Der Abbau läuft unter dem Schreib-Lock der Session-Map, damit keine neue
    /// Session dazwischen die alten Tracks übernimmt. Lock-Reihenfolge ist immer
    /// `sessions` vor `stage`/`media`.
    fn remove_session(&self, key: &str, id: Uuid) {
        let mut sessions = self.sessions.write();
        // Unter gleichem Key kann schon eine neue Session laufen
        if sessions.get(key).map(SessionHandle::id) != Some(id) {
            return;
        }
        sessions.remove(key);

        tracing::info!("Session {} removed ({} remaining)", key, sessions.len());

        if sessions.is_empty() {
            self.stage.lock().remove_local_view();
            self.media.lock().release();
        }
    }
}

/// Verbindung einer Session zu ihrer Registry
struct RegistryHost(Weak<RegistryInner>);

impl SessionHost for RegistryHost {
    fn local_stream(&self, streams: &StreamsConfig) -> Result<LocalStream, EngineError> {
        let inner = self.0.upgrade().ok_or(EngineError::Closed)?;
        let mut media = inner.media.lock();
        media.stream(inner.engine.as_ref(), streams)
    }

    fn video_configured(&self) -> bool {
        self.0
            .upgrade()
            .is_some_and(|inner| inner.stage.lock().is_configured())
    }

    fn add_remote_video(&self, track: &RemoteTrack) {
        if let Some(inner) = self.0.upgrade() {
            inner.stage.lock().add_remote_track(track);
        }
    }

    fn remove_remote_video(&self, track: &RemoteTrack) {
        if let Some(inner) = self.0.upgrade() {
            inner.stage.lock().remove_remote_track(track);
        }
    }

    fn session_ended(&self, key: &str, id: Uuid) {
        if let Some(inner) = self.0.upgrade() {
            inner.remove_session(key, id);
        }
    }
}

/// Alle Sessions eines Prozesses
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

impl SessionRegistry {
    pub fn new(
        engine: Arc<dyn MediaEngine>,
        renderer: Arc<dyn VideoRenderer>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                engine,
                settings: Arc::new(settings),
                sessions: RwLock::new(HashMap::new()),
                media: Mutex::new(LocalMedia::new()),
                stage: Mutex::new(VideoStage::new(renderer)),
            }),
        }
    }

    /// Legt eine Session an und gibt ihre Ausgabekanäle zurück
    pub fn create_session(
        &self,
        key: &str,
        config: SessionConfig,
    ) -> Result<SessionEvents, RegistryError> {
        let mut sessions = self.inner.sessions.write();
        match sessions.get(key) {
            // Aufgelegt, aber noch nicht ausgetragen: wird ersetzt
            Some(existing) if existing.has_ended() => {
                tracing::debug!("Replacing ended session {}", key);
            }
            Some(_) => return Err(RegistryError::SessionExists(key.to_string())),
            None => {}
        }

        let host: Arc<dyn SessionHost> = Arc::new(RegistryHost(Arc::downgrade(&self.inner)));
        let (handle, events) = spawn_session(
            key.to_string(),
            config,
            Arc::clone(&self.inner.engine),
            host,
            Arc::clone(&self.inner.settings),
        );
        sessions.insert(key.to_string(), handle);

        tracing::info!("Session {} created", key);
        Ok(events)
    }

    pub fn call(&self, key: &str) -> Result<(), RegistryError> {
        self.dispatch(key, SessionCommand::Call)
    }

    pub fn receive_message(&self, key: &str, message: &str) -> Result<(), RegistryError> {
        self.dispatch(key, SessionCommand::Receive(message.to_string()))
    }

    pub fn renegotiate(&self, key: &str, config: SessionConfig) -> Result<(), RegistryError> {
        self.dispatch(key, SessionCommand::Renegotiate(config))
    }

    /// Legt lokal auf und sendet `bye`
    pub fn disconnect(&self, key: &str) -> Result<(), RegistryError> {
        self.dispatch(key, SessionCommand::Disconnect { send_bye: true })
    }

    fn dispatch(&self, key: &str, command: SessionCommand) -> Result<(), RegistryError> {
        let handle = self
            .inner
            .sessions
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownSession(key.to_string()))?;

        if !handle.send(command) {
            return Err(RegistryError::UnknownSession(key.to_string()));
        }
        Ok(())
    }

    /// Zustand einer Session, nachdem alle bisherigen Befehle verarbeitet sind
    pub async fn session_state(&self, key: &str) -> Option<SessionState> {
        let handle = self.inner.sessions.read().get(key).cloned()?;
        handle.state().await
    }

    pub fn session_count(&self) -> usize {
        self.inner.sessions.read().len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.sessions.read().contains_key(key)
    }

    // ========================================================================
    // VIDEO
    // ========================================================================

    /// Setzt Container und lokale Vorschau
    pub fn set_video_view(&self, config: VideoConfig) -> Result<(), RegistryError> {
        config.validate()?;

        let local_track = {
            let mut media = self.inner.media.lock();
            media.set_camera(config.camera_position());
            match config.local {
                Some(_) => Some(media.video_track(self.inner.engine.as_ref())?),
                None => None,
            }
        };

        let mut stage = self.inner.stage.lock();
        stage.set_config(config);
        match local_track {
            Some(track) => stage.show_local(&track),
            None => stage.remove_local_view(),
        }
        stage.refresh();
        Ok(())
    }

    pub fn hide_video_view(&self) {
        self.inner.stage.lock().set_hidden(true);
    }

    pub fn show_video_view(&self) {
        self.inner.stage.lock().set_hidden(false);
    }

    /// Beendet alle Sessions und wartet auf ihre Tasks
    pub async fn shutdown(&self) {
        let handles: Vec<SessionHandle> = self.inner.sessions.read().values().cloned().collect();
        if handles.is_empty() {
            return;
        }

        tracing::info!("Shutting down {} session(s)", handles.len());
        for handle in &handles {
            handle.send(SessionCommand::Disconnect { send_bye: true });
        }
        futures::future::join_all(handles.iter().map(|h| h.closed())).await;
    }
}

// ============================================================================
// TESTS
// ============================================================================
