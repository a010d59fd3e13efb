//! Request/response exchanges
//!
//! Both request operations share the same preconditions and setup: the
//! session must be `ReadyForInput` with no exchange outstanding, the phase
//! moves to `Processing`, a collector is installed, and the request is
//! written as one line. They differ in how the response is handed back.

use std::pin::Pin;
use std::time::Duration;

use futures::Stream;

use super::Session;
use super::collector::ResponseCollector;
use crate::error::{Result, SessionError};
use crate::types::identifiers::ExchangeId;
use crate::types::phase::Phase;

/// Chunks of one streamed response
///
/// Ends after the ready marker. If the process exits first, the last item
/// is `Err(SessionError::SessionClosed { .. })`.
pub type ResponseStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

impl Session {
    /// Send one request line and wait for the complete response
    ///
    /// Returns the content chunks in the order they were classified. The
    /// wait is bounded by the configured response timeout; on timeout the
    /// child keeps running and the session stays busy until the binary asks
    /// for input again.
    ///
    /// # Errors
    /// - `NotReady` / `Busy` / `SessionClosed` if the request cannot start
    /// - `InvalidRequest` if `text` contains a line break
    /// - `Timeout` if no ready marker arrives in time
    /// - `SessionClosed { partial }` if the process exits mid-response
    pub async fn send_request_await_response(&self, text: &str) -> Result<Vec<String>> {
        validate_request(text)?;

        let id = self.state.allocate_exchange();
        let (collector, done) = ResponseCollector::buffered(id);
        self.state.begin(collector)?;
        self.write_request(id, text).await?;

        let timeout = self.config.response_timeout();
        match tokio::time::timeout(timeout, done).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(SessionError::closed(Vec::new())),
            Err(_) => {
                self.state.abandon(id);
                log::warn!(
                    "[{}] exchange {id} timed out after {timeout:?}",
                    self.id.short()
                );
                Err(SessionError::timeout(format!(
                    "no response within {timeout:?}"
                )))
            }
        }
    }

    /// Send one request line and stream the response as it arrives
    ///
    /// At most `stream_buffer` chunks are queued for the consumer; beyond
    /// that the output reader waits for the consumer instead of dropping
    /// data. Dropping the stream abandons the rest of the response.
    ///
    /// # Errors
    /// Same setup errors as [`Session::send_request_await_response`]
    pub async fn send_request_stream(&self, text: &str) -> Result<ResponseStream> {
        validate_request(text)?;

        let id = self.state.allocate_exchange();
        let (collector, mut chunks, done) =
            ResponseCollector::streaming(id, self.config.stream_buffer());
        self.state.begin(collector)?;
        self.write_request(id, text).await?;

        Ok(Box::pin(async_stream::stream! {
            while let Some(chunk) = chunks.recv().await {
                yield Ok(chunk);
            }
            match done.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => yield Err(e),
                Err(_) => yield Err(SessionError::closed(Vec::new())),
            }
        }))
    }

    /// Wait until the session is ready for input
    ///
    /// Returns immediately if it already is. An expired call stays expired
    /// even if readiness arrives right after the deadline.
    ///
    /// # Errors
    /// `Timeout` when the deadline passes, `SessionClosed` if the process
    /// exits first
    pub async fn wait_until_ready(&self, timeout: Duration) -> Result<()> {
        let mut phase = self.state.subscribe();
        let waited = tokio::time::timeout(
            timeout,
            phase.wait_for(|p| matches!(p, Phase::ReadyForInput | Phase::Closed)),
        )
        .await;

        match waited {
            Ok(Ok(reached)) if *reached == Phase::ReadyForInput => Ok(()),
            Ok(_) => Err(SessionError::closed(Vec::new())),
            Err(_) => Err(SessionError::timeout(format!(
                "not ready within {timeout:?} (phase: {})",
                self.state.phase()
            ))),
        }
    }

    async fn write_request(&self, id: ExchangeId, text: &str) -> Result<()> {
        log::debug!("[{}] exchange {id}: sending {} bytes", self.id.short(), text.len());
        if let Err(e) = self.transport.write_line(text).await {
            log::error!("[{}] failed to write request: {e}", self.id.short());
            self.transcript.event(format!("failed to write request: {e}"));
            // A broken stdin leaves nothing to talk to
            self.state.close();
            return Err(SessionError::closed(Vec::new()));
        }
        Ok(())
    }
}

fn validate_request(text: &str) -> Result<()> {
    if text.contains(['\n', '\r']) {
        return Err(SessionError::invalid_request(
            "request must be a single line; replace line breaks first",
        ));
    }
    Ok(())
}
