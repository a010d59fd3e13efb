//! Append-only transcript of everything the child process printed
//!
//! A single writer task owns the file and drains an unbounded channel, so
//! entries land in the file in the order they were observed. Raw stdout and
//! stderr chunks are written verbatim; lifecycle events are written as
//! timestamped lines. [`Transcript::close`] flushes and closes the file and
//! waits for the writer to finish.

use std::path::Path;

use chrono::Utc;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::{mpsc, oneshot};

use crate::error::Result;
use crate::types::identifiers::SessionId;

/// One observed item
#[derive(Debug)]
enum Entry {
    /// Raw bytes read from stdout
    Stdout(Vec<u8>),
    /// Raw bytes read from stderr
    Stderr(Vec<u8>),
    /// Lifecycle event (start, exit status, errors)
    Event(String),
}

enum Command {
    Append(Entry),
    Close(oneshot::Sender<()>),
}

/// Cloneable handle to the transcript writer
///
/// A disabled transcript accepts every call and records nothing but trace
/// logs.
#[derive(Clone, Debug)]
pub struct Transcript {
    session: SessionId,
    tx: Option<mpsc::UnboundedSender<Command>>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Append(entry) => f.debug_tuple("Append").field(entry).finish(),
            Self::Close(_) => f.write_str("Close"),
        }
    }
}

impl Transcript {
    /// Open (or create) the transcript file in append mode and start its writer
    ///
    /// # Errors
    /// Returns error if the file cannot be opened
    pub async fn open(path: Option<&Path>, session: SessionId) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::disabled(session));
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        log::debug!("[{}] Transcript at {}", session.short(), path.display());

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(write_entries(BufWriter::new(file), rx, session));

        Ok(Self {
            session,
            tx: Some(tx),
        })
    }

    /// A transcript that records nothing
    #[must_use]
    pub const fn disabled(session: SessionId) -> Self {
        Self { session, tx: None }
    }

    /// Whether entries are written to a file
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Record a raw stdout chunk
    pub fn stdout(&self, bytes: &[u8]) {
        log::trace!(
            "[{}] stdout: {:?}",
            self.session.short(),
            String::from_utf8_lossy(bytes)
        );
        self.append(Entry::Stdout(bytes.to_vec()));
    }

    /// Record a raw stderr chunk
    pub fn stderr(&self, bytes: &[u8]) {
        log::trace!(
            "[{}] stderr: {:?}",
            self.session.short(),
            String::from_utf8_lossy(bytes)
        );
        self.append(Entry::Stderr(bytes.to_vec()));
    }

    /// Record a lifecycle event line
    pub fn event(&self, message: impl Into<String>) {
        self.append(Entry::Event(message.into()));
    }

    /// Flush and close the file; later entries are dropped
    pub async fn close(&self) {
        let Some(tx) = &self.tx else {
            return;
        };
        let (ack_tx, ack_rx) = oneshot::channel();
        if tx.send(Command::Close(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }

    fn append(&self, entry: Entry) {
        if let Some(tx) = &self.tx {
            // Fails only once the writer has been closed
            let _ = tx.send(Command::Append(entry));
        }
    }
}

async fn write_entries<W>(
    mut out: BufWriter<W>,
    mut rx: mpsc::UnboundedReceiver<Command>,
    session: SessionId,
) where
    W: tokio::io::AsyncWrite + Unpin,
{
    while let Some(command) = rx.recv().await {
        match command {
            Command::Append(entry) => {
                if let Err(e) = write_entry(&mut out, &entry).await {
                    log::warn!("[{}] Transcript write failed: {e}", session.short());
                }
                // Flush once the backlog is drained so a crash loses little
                if rx.is_empty()
                    && let Err(e) = out.flush().await
                {
                    log::warn!("[{}] Transcript flush failed: {e}", session.short());
                }
            }
            Command::Close(ack) => {
                rx.close();
                finish(&mut out, session).await;
                let _ = ack.send(());
                return;
            }
        }
    }
    finish(&mut out, session).await;
}

async fn write_entry<W>(out: &mut BufWriter<W>, entry: &Entry) -> std::io::Result<()>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    match entry {
        Entry::Stdout(bytes) | Entry::Stderr(bytes) => out.write_all(bytes).await,
        Entry::Event(message) => {
            let line = format!("\n[{}] {message}\n", Utc::now().to_rfc3339());
            out.write_all(line.as_bytes()).await
        }
    }
}

async fn finish<W>(out: &mut BufWriter<W>, session: SessionId)
where
    W: tokio::io::AsyncWrite + Unpin,
{
    if let Err(e) = out.flush().await {
        log::warn!("[{}] Transcript flush failed: {e}", session.short());
    }
    if let Err(e) = out.shutdown().await {
        log::warn!("[{}] Transcript close failed: {e}", session.short());
    }
}
