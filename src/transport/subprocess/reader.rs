//! Background tasks reading the child's output and watching its exit

use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStderr, ChildStdout};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::output::{Markers, OutputScanner, Utf8Decoder};
use crate::session::SessionState;
use crate::transcript::Transcript;

use super::config::{EXIT_DRAIN_TIMEOUT, READ_BUFFER_SIZE};

/// Read stdout until EOF, transcribing and classifying every chunk
///
/// Closes the session at EOF, after the last held text has been flushed
/// into the outstanding exchange.
pub(super) async fn read_stdout(
    mut stdout: ChildStdout,
    state: Arc<SessionState>,
    transcript: Transcript,
    markers: Markers,
) {
    let mut decoder = Utf8Decoder::new();
    let mut scanner = OutputScanner::new(markers);
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];

    loop {
        match stdout.read(&mut buffer).await {
            Ok(0) => break, // EOF
            Ok(n) => {
                // Transcript first, classification second
                transcript.stdout(&buffer[..n]);

                let text = decoder.decode(&buffer[..n]);
                if text.is_empty() {
                    continue;
                }
                for event in scanner.feed(&text) {
                    state.handle(event).await;
                }
            }
            Err(e) => {
                log::error!("stdout read failed: {e}");
                transcript.event(format!("stdout read failed: {e}"));
                break;
            }
        }
    }

    let tail = decoder.finish();
    let mut events = if tail.is_empty() {
        Vec::new()
    } else {
        scanner.feed(&tail)
    };
    events.extend(scanner.finish());
    for event in events {
        state.handle(event).await;
    }

    state.close();
}

/// Read stderr until EOF into the transcript
pub(super) async fn read_stderr(mut stderr: ChildStderr, transcript: Transcript) {
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    loop {
        match stderr.read(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => transcript.stderr(&buffer[..n]),
            Err(e) => {
                transcript.event(format!("stderr read failed: {e}"));
                break;
            }
        }
    }
}

/// Own the child until it exits or a shutdown is requested
///
/// On shutdown the child gets `grace` to exit after stdin was closed, then
/// it is killed. Either way the exit status is transcribed, stdout is given
/// a moment to drain, and the session is closed.
pub(super) async fn monitor_process(
    mut child: Child,
    mut shutdown_rx: oneshot::Receiver<()>,
    stdout_task: JoinHandle<()>,
    state: Arc<SessionState>,
    transcript: Transcript,
    grace: Duration,
) -> Option<ExitStatus> {
    let waited = tokio::select! {
        status = child.wait() => status,
        _ = &mut shutdown_rx => {
            match tokio::time::timeout(grace, child.wait()).await {
                Ok(status) => status,
                Err(_) => {
                    log::warn!("child did not exit within {grace:?}, killing it");
                    transcript.event("child did not exit after stdin closed; killing it");
                    match child.kill().await {
                        Ok(()) => child.wait().await,
                        Err(e) => Err(e),
                    }
                }
            }
        }
    };

    let status = match waited {
        Ok(status) => {
            log::info!("child process exited with {status}");
            transcript.event(format!("child process exited with {status}"));
            Some(status)
        }
        Err(e) => {
            log::error!("failed to wait for child process: {e}");
            transcript.event(format!("failed to wait for child process: {e}"));
            None
        }
    };

    if tokio::time::timeout(EXIT_DRAIN_TIMEOUT, stdout_task)
        .await
        .is_err()
    {
        log::warn!("stdout still open {EXIT_DRAIN_TIMEOUT:?} after exit");
    }

    state.close();
    status
}
