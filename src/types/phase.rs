//! Session lifecycle phases
//!
//! The phase only ever moves forward, with the exception of the
//! `ReadyForInput ⇄ Processing` cycle driven by exchanges. `Closed` is
//! absorbing.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle and readiness state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Process not spawned yet
    NotStarted,
    /// Process spawned, waiting for the first prompt marker
    Starting,
    /// The binary is ingesting a prompt
    LoadingPrompt,
    /// The binary printed its prompt marker and waits for a line
    ReadyForInput,
    /// A request line was written, response pending
    Processing,
    /// The process is gone
    Closed,
}

impl Phase {
    /// Whether moving from `self` to `next` is a legal transition
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        use Phase::{Closed, LoadingPrompt, NotStarted, Processing, ReadyForInput, Starting};

        matches!(
            (self, next),
            (NotStarted, Starting | Closed)
                | (Starting, LoadingPrompt | ReadyForInput | Closed)
                | (LoadingPrompt, ReadyForInput | Closed)
                | (ReadyForInput, Processing | LoadingPrompt | Closed)
                | (Processing, LoadingPrompt | ReadyForInput | Closed)
        )
    }

    /// Whether content observed in this phase belongs to an exchange
    #[must_use]
    pub const fn collects_content(self) -> bool {
        matches!(self, Self::Processing | Self::LoadingPrompt)
    }

    /// Whether the session has terminated
    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Snake-case name, as used in logs and config files
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Starting => "starting",
            Self::LoadingPrompt => "loading_prompt",
            Self::ReadyForInput => "ready_for_input",
            Self::Processing => "processing",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
