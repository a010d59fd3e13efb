//! Transport layer for talking to the inference binary
//!
//! This module owns the child process: it builds the command line, spawns
//! the binary with piped stdio, and runs the background tasks that read its
//! output and watch for its exit.

pub mod subprocess;

pub use subprocess::SubprocessTransport;
