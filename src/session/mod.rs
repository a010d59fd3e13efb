//! Interactive session with the inference binary
//!
//! A [`Session`] owns one child process for its whole life. Background tasks
//! read the child's output, classify it, and drive the session phase:
//!
//! ```text
//!            start()
//! NotStarted ──────► Starting ──► ReadyForInput ◄──────────┐
//!                                     │ request             │ ready marker
//!                                     ▼                     │
//!                                 Processing ──► LoadingPrompt
//!
//!   any phase ── process exit / shutdown() ──► Closed
//! ```
//!
//! Exactly one exchange may be outstanding. Each exchange installs a
//! collector that receives response content until the ready marker returns.
//!
//! # Example
//!
//! ```no_run
//! use gemma_session::{Session, SessionConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SessionConfig::builder()
//!     .directory("/opt/gemma")
//!     .model("2b-it")
//!     .compressed_weights("2b-it-sfp.sbs")
//!     .tokenizer("tokenizer.spm")
//!     .build()?;
//!
//! let session = Session::connect(config).await?;
//! let chunks = session.send_request_await_response("hello world").await?;
//! println!("{}", chunks.concat());
//! session.shutdown().await?;
//! # Ok(())
//! # }
//! ```

mod collector;
mod exchange;
mod state;

use std::process::ExitStatus;
use std::sync::Arc;

use tokio::sync::watch;

use crate::error::Result;
use crate::transcript::Transcript;
use crate::transport::SubprocessTransport;
use crate::types::identifiers::SessionId;
use crate::types::options::SessionConfig;
use crate::types::phase::Phase;

pub use exchange::ResponseStream;
pub(crate) use state::SessionState;

/// Handle to one running inference process
pub struct Session {
    id: SessionId,
    config: SessionConfig,
    state: Arc<SessionState>,
    transport: SubprocessTransport,
    transcript: Transcript,
}

impl Session {
    /// Spawn the binary and start monitoring its output
    ///
    /// Returns as soon as the process is running, in phase `Starting`.
    ///
    /// # Errors
    /// `Spawn` if the binary is missing or cannot be executed; `Io` if the
    /// transcript file cannot be opened
    pub async fn start(config: SessionConfig) -> Result<Self> {
        let id = SessionId::new();
        let transcript = Transcript::open(config.transcript(), id).await?;
        let state = Arc::new(SessionState::new(id));

        let transport =
            match SubprocessTransport::spawn(&config, Arc::clone(&state), transcript.clone()) {
                Ok(transport) => transport,
                Err(e) => {
                    log::error!("[{}] {e}", id.short());
                    transcript.event(format!("spawn failed: {e}"));
                    transcript.close().await;
                    return Err(e);
                }
            };

        log::info!(
            "[{}] started {} (model {})",
            id.short(),
            config.binary_path().display(),
            config.model()
        );

        Ok(Self {
            id,
            config,
            state,
            transport,
            transcript,
        })
    }

    /// Spawn the binary and wait until it first asks for input
    ///
    /// Waits up to the configured ready timeout. On failure the session is
    /// dropped, which kills the child.
    ///
    /// # Errors
    /// Same as [`Session::start`], plus `Timeout` or `SessionClosed` from
    /// [`Session::wait_until_ready`]
    pub async fn connect(config: SessionConfig) -> Result<Self> {
        let timeout = config.ready_timeout();
        let session = Self::start(config).await?;
        session.wait_until_ready(timeout).await?;
        Ok(session)
    }

    /// Close stdin, give the child the grace period to exit, then kill it
    ///
    /// Moves the session to `Closed`, wakes every waiter, and flushes the
    /// transcript. Returns the exit status if one was observed.
    ///
    /// # Errors
    /// Returns error if waiting on the process fails
    pub async fn shutdown(&self) -> Result<Option<ExitStatus>> {
        log::info!("[{}] shutting down", self.id.short());
        let status = self.transport.close(self.config.shutdown_grace()).await;
        self.state.close();
        self.transcript.close().await;
        status
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    /// Receiver notified on every phase change
    #[must_use]
    pub fn subscribe_phase(&self) -> watch::Receiver<Phase> {
        self.state.subscribe()
    }

    /// Identifier used in logs and the transcript
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// The configuration this session was started with
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// OS process id of the child, as reported at spawn time
    #[must_use]
    pub const fn pid(&self) -> Option<u32> {
        self.transport.pid()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("phase", &self.phase())
            .field("pid", &self.pid())
            .field("transcript", &self.transcript.is_enabled())
            .finish_non_exhaustive()
    }
}
