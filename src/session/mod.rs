//! Session Module - Anrufe und ihre Verwaltung
//!
//! Dieses Modul verwaltet:
//! - Die Zustandsmaschine eines Anrufs (Offer/Answer, ICE, Teardown)
//! - Die Warteschlange für Remote ICE Candidates
//! - Einen Task pro Session
//! - Die Registry aller Sessions und der geteilten lokalen Medien

mod actor;
mod candidates;
mod machine;
mod registry;

pub use actor::{SessionCommand, SessionHandle};
pub use candidates::CandidateQueue;
pub use machine::{CallSession, SessionEvents, SessionHost, SessionOutputs, SessionState};
pub use registry::{RegistryError, SessionRegistry};
