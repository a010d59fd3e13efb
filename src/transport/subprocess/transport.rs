//! Subprocess transport handle

use std::process::ExitStatus;

use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;
use tokio::process::ChildStdin;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::{Result, SessionError};

/// Owner of the child's stdin and of the background tasks watching it
///
/// The child process itself lives inside the monitor task, which is the only
/// place that waits on or kills it.
pub struct SubprocessTransport {
    pub(super) pid: Option<u32>,
    pub(super) stdin: tokio::sync::Mutex<Option<ChildStdin>>,
    pub(super) shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    pub(super) monitor_task: Mutex<Option<JoinHandle<Option<ExitStatus>>>>,
    pub(super) stderr_task: Mutex<Option<JoinHandle<()>>>,
}

impl SubprocessTransport {
    /// Write `line` plus a line terminator and flush
    ///
    /// # Errors
    /// Returns error if stdin has been closed or the write fails
    pub async fn write_line(&self, line: &str) -> Result<()> {
        let mut guard = self.stdin.lock().await;
        let stdin = guard
            .as_mut()
            .ok_or_else(|| SessionError::closed(Vec::new()))?;

        let mut data = String::with_capacity(line.len() + 1);
        data.push_str(line);
        data.push('\n');

        stdin.write_all(data.as_bytes()).await?;
        stdin.flush().await?;
        Ok(())
    }

    /// Close stdin, signalling end of input to the child
    ///
    /// # Errors
    /// Returns error if closing fails
    pub async fn end_input(&self) -> Result<()> {
        if let Some(mut stdin) = self.stdin.lock().await.take() {
            stdin.shutdown().await?;
        }
        Ok(())
    }

    /// OS process id at spawn time
    #[must_use]
    pub const fn pid(&self) -> Option<u32> {
        self.pid
    }
}

impl Drop for SubprocessTransport {
    fn drop(&mut self) {
        self.drop_impl();
    }
}
