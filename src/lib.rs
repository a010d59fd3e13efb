//! # gemma_session
//!
//! Drive the `gemma` inference CLI as an interactive subprocess: spawn it,
//! detect when it is ready for input, and exchange prompts and responses over
//! its standard streams.
//!
//! The binary has no structured protocol. It prints status markers
//! (`Reading prompt`, progress dots, a `>` prompt) mixed with response text.
//! This crate scans that stream incrementally, tracks the session phase, and
//! serializes exchanges so that exactly one request is in flight at a time.
//!
//! ## Quick Start
//!
//! ```no_run
//! use gemma_session::{Session, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SessionConfig::builder()
//!         .directory("/opt/gemma")
//!         .model("2b-it")
//!         .compressed_weights("2b-it-sfp.sbs")
//!         .tokenizer("tokenizer.spm")
//!         .transcript("output.txt")
//!         .build()?;
//!
//!     let session = Session::connect(config).await?;
//!     let response = session.send_request_await_response("hello world").await?;
//!     log::info!("gemma: {}", response.concat());
//!
//!     session.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Streaming
//!
//! ```no_run
//! # use gemma_session::Session;
//! use futures::StreamExt;
//!
//! # async fn example(session: &Session) -> Result<(), Box<dyn std::error::Error>> {
//! let mut stream = session.send_request_stream("Can you help with math?").await?;
//! while let Some(chunk) = stream.next().await {
//!     print!("{}", chunk?);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`session`]: the session handle, phase tracking and exchanges
//! - [`output`]: UTF-8 decoding and marker scanning of stdout
//! - [`transport`]: spawning the binary and its background reader tasks
//! - [`transcript`]: ordered append-only log of raw output
//! - [`types`]: configuration, phases and identifiers
//! - [`error`]: error types
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T, SessionError>`](Result):
//!
//! ```no_run
//! # use gemma_session::{Session, SessionError};
//! # async fn example(session: &Session) {
//! match session.send_request_await_response("hi").await {
//!     Ok(chunks) => log::info!("{}", chunks.concat()),
//!     Err(SessionError::Busy) => log::warn!("another request is in flight"),
//!     Err(SessionError::SessionClosed { partial }) => {
//!         log::error!("gemma exited; partial answer: {}", partial.concat());
//!     }
//!     Err(e) => log::error!("Error: {e}"),
//! }
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod output;
pub mod session;
pub mod transcript;
pub mod transport;
pub mod types;

// Re-export commonly used types for external API
pub use error::{Result, SessionError};
pub use output::{Markers, OutputScanner, ScanEvent};
pub use session::{ResponseStream, Session};
pub use transcript::Transcript;
pub use transport::SubprocessTransport;
pub use types::identifiers::{ExchangeId, SessionId};
pub use types::options::{GEMMA_DIR_ENV, SessionConfig, SessionConfigBuilder};
pub use types::phase::Phase;

/// Version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
