//! Core type definitions
//!
//! - [`options`]: session configuration and its builder
//! - [`phase`]: the session lifecycle state machine
//! - [`identifiers`]: session and exchange identifiers

pub mod identifiers;
pub mod options;
pub mod phase;

pub use identifiers::{ExchangeId, SessionId};
pub use options::{SessionConfig, SessionConfigBuilder};
pub use phase::Phase;
