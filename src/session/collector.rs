//! Per-exchange response collectors

use tokio::sync::{mpsc, oneshot};

use crate::error::{Result, SessionError};
use crate::types::identifiers::ExchangeId;

/// Accumulator bound to exactly one in-flight exchange
pub(crate) struct ResponseCollector {
    id: ExchangeId,
    sink: Sink,
}

enum Sink {
    /// Chunks kept until the ready marker, then handed over at once
    Buffer {
        chunks: Vec<String>,
        done: oneshot::Sender<Result<Vec<String>>>,
    },
    /// Chunks forwarded to a consumer through a bounded channel
    Stream {
        tx: mpsc::Sender<String>,
        done: oneshot::Sender<Result<()>>,
    },
    /// Nobody is waiting any more; content is dropped until the exchange ends
    Discard,
}

/// A chunk that must be sent to a stream consumer outside the state lock
pub(crate) struct PendingSend {
    pub id: ExchangeId,
    pub tx: mpsc::Sender<String>,
    pub chunk: String,
}

impl ResponseCollector {
    /// Collector that hands all chunks over when the exchange completes
    pub fn buffered(id: ExchangeId) -> (Self, oneshot::Receiver<Result<Vec<String>>>) {
        let (done, done_rx) = oneshot::channel();
        let sink = Sink::Buffer {
            chunks: Vec::new(),
            done,
        };
        (Self { id, sink }, done_rx)
    }

    /// Collector that forwards chunks through a channel bounded by `capacity`
    pub fn streaming(
        id: ExchangeId,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<String>, oneshot::Receiver<Result<()>>) {
        let (tx, rx) = mpsc::channel(capacity);
        let (done, done_rx) = oneshot::channel();
        (
            Self {
                id,
                sink: Sink::Stream { tx, done },
            },
            rx,
            done_rx,
        )
    }

    pub const fn id(&self) -> ExchangeId {
        self.id
    }

    /// Accept one content chunk
    ///
    /// Streaming collectors return the send to perform; the caller awaits it
    /// without holding any lock, which is where backpressure applies.
    pub fn push(&mut self, chunk: String) -> Option<PendingSend> {
        match &mut self.sink {
            Sink::Buffer { chunks, .. } => {
                chunks.push(chunk);
                None
            }
            Sink::Stream { tx, .. } => Some(PendingSend {
                id: self.id,
                tx: tx.clone(),
                chunk,
            }),
            Sink::Discard => None,
        }
    }

    /// Stop delivering content; the waiting side has gone away
    pub fn abandon(&mut self) {
        self.sink = Sink::Discard;
    }

    /// The ready marker arrived: the response is complete
    pub fn complete(self) {
        match self.sink {
            Sink::Buffer { chunks, done } => {
                let _ = done.send(Ok(chunks));
            }
            Sink::Stream { tx, done } => {
                // Dropping the sender ends the stream after queued chunks
                drop(tx);
                let _ = done.send(Ok(()));
            }
            Sink::Discard => {}
        }
    }

    /// The process went away mid-exchange
    pub fn fail(self) {
        match self.sink {
            Sink::Buffer { chunks, done } => {
                let _ = done.send(Err(SessionError::closed(chunks)));
            }
            Sink::Stream { tx, done } => {
                drop(tx);
                let _ = done.send(Err(SessionError::closed(Vec::new())));
            }
            Sink::Discard => {}
        }
    }
}
