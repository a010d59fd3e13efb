//! Lifecycle management for subprocess transport (spawn, close)

use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::{Result, SessionError};
use crate::session::SessionState;
use crate::transcript::Transcript;
use crate::types::options::SessionConfig;
use crate::types::phase::Phase;

use super::command::CommandBuilder;
use super::reader::{monitor_process, read_stderr, read_stdout};
use super::transport::SubprocessTransport;

impl SubprocessTransport {
    /// Spawn the binary with piped stdio and start the background tasks
    ///
    /// Moves `state` to `Starting` before any output can be classified.
    ///
    /// # Errors
    /// Returns `Spawn` if the binary does not exist, cannot be executed, or a
    /// stdio handle is missing
    pub(crate) fn spawn(
        config: &SessionConfig,
        state: Arc<SessionState>,
        transcript: Transcript,
    ) -> Result<Self> {
        let program = config.binary_path();
        if !program.is_file() {
            return Err(SessionError::spawn(format!(
                "binary not found: {}",
                program.display()
            )));
        }

        let builder = CommandBuilder::new(config);
        let mut cmd = builder.build();

        // Pipe everything: stdout is classified, stderr goes to the
        // transcript, stdin carries requests
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        transcript.event(format!(
            "Starting {} with arguments: {}",
            program.display(),
            builder.describe()
        ));

        let mut child = cmd
            .spawn()
            .map_err(|e| SessionError::spawn(format!("{}: {e}", program.display())))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SessionError::spawn("Failed to get stdin handle"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SessionError::spawn("Failed to get stdout handle"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| SessionError::spawn("Failed to get stderr handle"))?;

        let pid = child.id();
        state.transition(Phase::Starting);

        let stdout_task = tokio::spawn(read_stdout(
            stdout,
            Arc::clone(&state),
            transcript.clone(),
            config.markers().clone(),
        ));
        let stderr_task = tokio::spawn(read_stderr(stderr, transcript.clone()));

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let monitor_task = tokio::spawn(monitor_process(
            child,
            shutdown_rx,
            stdout_task,
            state,
            transcript,
            config.shutdown_grace(),
        ));

        Ok(Self {
            pid,
            stdin: tokio::sync::Mutex::new(Some(stdin)),
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            monitor_task: Mutex::new(Some(monitor_task)),
            stderr_task: Mutex::new(Some(stderr_task)),
        })
    }

    /// Shut the child down and wait for it
    ///
    /// Closes stdin first so the binary can exit on its own; the monitor
    /// kills it once `grace` has elapsed. Calling this again returns
    /// `Ok(None)`.
    ///
    /// # Errors
    /// Returns error if the monitor task failed
    pub async fn close(&self, grace: Duration) -> Result<Option<ExitStatus>> {
        if let Err(e) = self.end_input().await {
            log::debug!("stdin already gone: {e}");
        }

        let shutdown_tx = self.shutdown_tx.lock().take();
        if let Some(tx) = shutdown_tx {
            let _ = tx.send(());
        }

        let monitor = self.monitor_task.lock().take();
        let status = match monitor {
            Some(handle) => handle.await.map_err(std::io::Error::other)?,
            None => None,
        };

        let stderr_task = self.stderr_task.lock().take();
        if let Some(task) = stderr_task {
            // stderr hits EOF once the child is gone; bound the wait anyway
            if tokio::time::timeout(grace, task).await.is_err() {
                log::warn!("stderr reader still running after shutdown");
            }
        }

        Ok(status)
    }

    /// Handle Drop cleanup
    pub(super) fn drop_impl(&mut self) {
        // Dropping stdin closes it
        drop(self.stdin.get_mut().take());

        // Aborting the monitor drops the child, which kills it
        if let Some(task) = self.monitor_task.get_mut().take() {
            task.abort();
        }

        if let Some(task) = self.stderr_task.get_mut().take() {
            task.abort();
        }
    }
}
