//! Message Types für das Signaling-Protokoll
//!
//! Die Nachrichten werden als JSON über einen externen Kanal zwischen den
//! beiden Endpunkten ausgetauscht. Lokale Benachrichtigungen an den Host
//! laufen getrennt davon über `SessionNotification`.

use crate::call_engine::{IceCandidate, SdpType, SessionDescription};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug)]
pub enum SignalingError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Message has no type")]
    MissingType,

    #[error("Unknown message type: {0}")]
    UnknownType(String),

    #[error("Malformed {msg_type} message: {reason}")]
    Malformed { msg_type: String, reason: String },
}

// ============================================================================
// WIRE MESSAGES
// ============================================================================

/// Nachrichten zwischen den Endpunkten
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SignalingMessage {
    /// ICE Candidate; `label` ist der m-Zeilenindex, `id` die mid
    Candidate {
        label: u16,
        id: String,
        candidate: String,
    },

    /// SDP Offer
    Offer { sdp: String },

    /// SDP Answer
    Answer { sdp: String },

    /// Gegenstelle hat aufgelegt
    Bye,
}

impl SignalingMessage {
    /// Parst eine eingehende Nachricht
    ///
    /// Unterscheidet zwischen kaputtem JSON, fehlendem/unbekanntem `type` und
    /// fehlenden Feldern, damit das Log aussagekräftig bleibt.
    pub fn parse(raw: &str) -> Result<Self, SignalingError> {
        let value: Value = serde_json::from_str(raw)?;

        let msg_type = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(SignalingError::MissingType)?
            .to_string();

        if !matches!(msg_type.as_str(), "candidate" | "offer" | "answer" | "bye") {
            return Err(SignalingError::UnknownType(msg_type));
        }

        serde_json::from_value(value).map_err(|e| SignalingError::Malformed {
            msg_type,
            reason: e.to_string(),
        })
    }

    pub fn from_candidate(candidate: &IceCandidate) -> Self {
        Self::Candidate {
            label: candidate.sdp_mline_index,
            id: candidate.sdp_mid.clone(),
            candidate: candidate.candidate.clone(),
        }
    }

    pub fn from_description(desc: &SessionDescription) -> Self {
        match desc.sdp_type {
            SdpType::Offer => Self::Offer {
                sdp: desc.sdp.clone(),
            },
            SdpType::Answer => Self::Answer {
                sdp: desc.sdp.clone(),
            },
        }
    }

    /// Name des `type` Feldes, für Logs
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Candidate { .. } => "candidate",
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::Bye => "bye",
        }
    }
}

// ============================================================================
// LOCAL NOTIFICATIONS
// ============================================================================

/// Lokale Benachrichtigungen, werden nie an die Gegenstelle gesendet
///
/// Serialisiert sich im alten Format (`{"type": "__answered"}`), falls ein
/// Host das erwartet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum SessionNotification {
    /// Erster Remote Stream ist angekommen
    #[serde(rename = "__answered")]
    Answered,

    /// Session wurde beendet
    #[serde(rename = "__disconnected")]
    Disconnected,
}

// ============================================================================
// TESTS
// ============================================================================
