//! Configuration constants for subprocess transport

use std::time::Duration;

/// Size of a single pipe read
pub const READ_BUFFER_SIZE: usize = 4096;

/// How long the monitor waits for stdout to drain after the child exits
///
/// A grandchild can keep the pipe open past the child's exit; the session is
/// closed anyway once this elapses.
pub const EXIT_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);
