//! Subprocess transport for the gemma CLI
//!
//! This module spawns the binary as a subprocess and communicates with it via
//! stdin/stdout. Three background tasks run per process:
//!
//! - stdout reader: transcript, decode, classify, update the session
//! - stderr reader: transcript only
//! - monitor: waits for exit (or a shutdown request) and closes the session

mod command;
mod config;
mod lifecycle;
mod reader;
mod transport;

// Re-export public types
pub use command::CommandBuilder;
pub use transport::SubprocessTransport;
