//! Warteschlange für Remote ICE Candidates
//!
//! webrtc nimmt Candidates erst an, wenn eine Remote Description gesetzt ist.
//! Bis dahin werden sie in Ankunftsreihenfolge gepuffert.

use crate::call_engine::{EngineError, IceCandidate, PeerConnection};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateQueue {
    /// Candidates werden gesammelt
    Open(Vec<IceCandidate>),
    /// Candidates gehen direkt an die Verbindung
    Closed,
}

impl Default for CandidateQueue {
    fn default() -> Self {
        Self::Open(Vec::new())
    }
}

impl CandidateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open(_))
    }

    /// Anzahl gepufferter Candidates
    pub fn len(&self) -> usize {
        match self {
            Self::Open(queued) => queued.len(),
            Self::Closed => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Puffert den Candidate oder wendet ihn direkt an, wenn die Queue geschlossen ist
    pub async fn push(
        &mut self,
        candidate: IceCandidate,
        connection: Option<&Arc<dyn PeerConnection>>,
    ) -> Result<(), EngineError> {
        match self {
            Self::Open(queued) => {
                tracing::debug!("Queueing remote candidate (mid={})", candidate.sdp_mid);
                queued.push(candidate);
                Ok(())
            }
            Self::Closed => {
                let connection = connection.ok_or(EngineError::NoConnection)?;
                connection.add_ice_candidate(candidate).await
            }
        }
    }

    /// Wendet alle gepufferten Candidates in Reihenfolge an und schließt die Queue
    ///
    /// Gibt die Anzahl erfolgreich angewendeter Candidates zurück. Eine bereits
    /// geschlossene Queue bleibt unverändert.
    pub async fn drain_into(&mut self, connection: &dyn PeerConnection) -> usize {
        let queued = match std::mem::replace(self, Self::Closed) {
            Self::Open(queued) => queued,
            Self::Closed => return 0,
        };

        let total = queued.len();
        let mut applied = 0;
        for candidate in queued {
            match connection.add_ice_candidate(candidate).await {
                Ok(()) => applied += 1,
                Err(e) => tracing::warn!("Failed to apply queued candidate: {}", e),
            }
        }

        if total > 0 {
            tracing::debug!("Applied {}/{} queued candidates", applied, total);
        }
        applied
    }

    /// Verwirft alle gepufferten Candidates
    pub fn close(&mut self) {
        *self = Self::Closed;
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call_engine::fake::{FakeEngine, FAKE_SDP};
    use crate::call_engine::{EngineEvent, MediaConstraints, MediaEngine, SessionDescription};

    fn candidate(n: u16) -> IceCandidate {
        IceCandidate {
            sdp_mid: "audio".to_string(),
            sdp_mline_index: n,
            candidate: format!("candidate:{}", n),
        }
    }

    async fn connection(engine: &FakeEngine) -> Arc<dyn PeerConnection> {
        let connection = engine
            .create_connection(Vec::new(), MediaConstraints::for_call(false), Arc::new(|_: EngineEvent| {}))
            .await
            .unwrap();
        connection
            .set_remote_description(SessionDescription::offer(FAKE_SDP))
            .await
            .unwrap();
        connection
    }

    #[tokio::test]
    async fn test_drain_preserves_arrival_order() {
        let engine = FakeEngine::new();
        let pc = connection(&engine).await;
        let mut queue = CandidateQueue::new();

        for n in 0..3 {
            queue.push(candidate(n), None).await.unwrap();
        }
        assert_eq!(queue.len(), 3);
        assert!(engine.last_connection().unwrap().candidates().is_empty());

        assert_eq!(queue.drain_into(pc.as_ref()).await, 3);
        assert!(!queue.is_open());
        assert_eq!(
            engine.last_connection().unwrap().candidates(),
            vec![candidate(0), candidate(1), candidate(2)]
        );
    }

    #[tokio::test]
    async fn test_closed_queue_applies_directly() {
        let engine = FakeEngine::new();
        let pc = connection(&engine).await;
        let mut queue = CandidateQueue::new();

        queue.push(candidate(0), Some(&pc)).await.unwrap();
        queue.drain_into(pc.as_ref()).await;
        queue.push(candidate(1), Some(&pc)).await.unwrap();

        // Zweites Drain ist wirkungslos, nichts wird doppelt angewendet
        assert_eq!(queue.drain_into(pc.as_ref()).await, 0);
        assert_eq!(
            engine.last_connection().unwrap().candidates(),
            vec![candidate(0), candidate(1)]
        );
    }

    #[tokio::test]
    async fn test_closed_queue_without_connection() {
        let mut queue = CandidateQueue::new();
        queue.push(candidate(0), None).await.unwrap();
        queue.close();

        assert!(queue.is_empty());
        assert_eq!(
            queue.push(candidate(1), None).await,
            Err(EngineError::NoConnection)
        );
    }

    #[tokio::test]
    async fn test_failed_candidate_does_not_stop_drain() {
        let engine = FakeEngine::new();
        let pc = engine
            .create_connection(Vec::new(), MediaConstraints::for_call(false), Arc::new(|_: EngineEvent| {}))
            .await
            .unwrap();
        let mut queue = CandidateQueue::new();
        queue.push(candidate(0), None).await.unwrap();

        // Ohne Remote Description lehnt die Verbindung ab
        assert_eq!(queue.drain_into(pc.as_ref()).await, 0);
        assert!(!queue.is_open());
    }
}
