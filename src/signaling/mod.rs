//! Signaling Module - Nachrichten zwischen den Endpunkten
//!
//! Dieses Modul verwaltet:
//! - Parsen und Serialisieren der Signaling-Nachrichten
//! - Lokale Benachrichtigungen an den Host
//! - Codec-Präferenz im SDP
//!

mod messages;
mod sdp;

pub use messages::{SessionNotification, SignalingError, SignalingMessage};
pub use sdp::prefer_codec;
