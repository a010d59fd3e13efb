//! State shared between the session handle and its background tasks

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::watch;

use super::collector::{PendingSend, ResponseCollector};
use crate::error::{Result, SessionError};
use crate::output::ScanEvent;
use crate::types::identifiers::{ExchangeId, SessionId};
use crate::types::phase::Phase;

/// Phase plus the single outstanding collector
///
/// The collector slot and phase changes that depend on it are only touched
/// while holding `exchange`, and that lock is never held across an await.
pub(crate) struct SessionState {
    id: SessionId,
    phase: watch::Sender<Phase>,
    exchange: Mutex<Option<ResponseCollector>>,
    next_exchange: AtomicU64,
}

impl SessionState {
    pub fn new(id: SessionId) -> Self {
        let (phase, _) = watch::channel(Phase::NotStarted);
        Self {
            id,
            phase,
            exchange: Mutex::new(None),
            next_exchange: AtomicU64::new(1),
        }
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    pub fn allocate_exchange(&self) -> ExchangeId {
        ExchangeId::new(self.next_exchange.fetch_add(1, Ordering::Relaxed))
    }

    /// Move to `next` if the transition is legal; returns whether it happened
    pub fn transition(&self, next: Phase) -> bool {
        let id = self.id.short();
        self.phase.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            if current.can_transition_to(next) {
                log::debug!("[{id}] phase {current} -> {next}");
                *current = next;
                true
            } else {
                log::debug!("[{id}] ignoring phase change {current} -> {next}");
                false
            }
        })
    }

    /// Install a collector for a new exchange and enter `Processing`
    ///
    /// # Errors
    /// `SessionClosed` once closed, `Busy` while another exchange is
    /// outstanding, `NotReady` in any other phase than `ReadyForInput`
    pub fn begin(&self, collector: ResponseCollector) -> Result<()> {
        let mut slot = self.exchange.lock();

        let phase = self.phase();
        if phase.is_closed() {
            return Err(SessionError::closed(Vec::new()));
        }
        if slot.is_some() {
            return Err(SessionError::Busy);
        }
        if phase != Phase::ReadyForInput {
            return Err(SessionError::not_ready(phase));
        }

        log::debug!("[{}] exchange {} started", self.id.short(), collector.id());
        self.transition(Phase::Processing);
        *slot = Some(collector);
        Ok(())
    }

    /// Stop delivering to exchange `id` if it is still the current one
    pub fn abandon(&self, id: ExchangeId) {
        let mut slot = self.exchange.lock();
        if let Some(collector) = slot.as_mut()
            && collector.id() == id
        {
            log::debug!("[{}] exchange {id} abandoned", self.id.short());
            collector.abandon();
        }
    }

    /// Apply one classified output event
    pub async fn handle(&self, event: ScanEvent) {
        if let Some(pending) = self.apply(event)
            && pending.tx.send(pending.chunk).await.is_err()
        {
            // Consumer dropped the stream
            self.abandon(pending.id);
        }
    }

    fn apply(&self, event: ScanEvent) -> Option<PendingSend> {
        match event {
            ScanEvent::LoadingPrompt => {
                self.transition(Phase::LoadingPrompt);
                None
            }
            ScanEvent::Progress => None,
            ScanEvent::Ready => {
                let finished = {
                    let mut slot = self.exchange.lock();
                    let finished = slot.take();
                    self.transition(Phase::ReadyForInput);
                    finished
                };
                if let Some(collector) = finished {
                    log::debug!("[{}] exchange {} complete", self.id.short(), collector.id());
                    collector.complete();
                }
                None
            }
            ScanEvent::Content(chunk) => {
                let mut slot = self.exchange.lock();
                if !self.phase().collects_content() {
                    log::debug!("[{}] output outside an exchange: {chunk:?}", self.id.short());
                    return None;
                }
                match slot.as_mut() {
                    Some(collector) => collector.push(chunk),
                    None => None,
                }
            }
        }
    }

    /// Enter `Closed` and fail the outstanding exchange, if any
    pub fn close(&self) {
        let failed = {
            let mut slot = self.exchange.lock();
            let failed = slot.take();
            if self.transition(Phase::Closed) {
                log::info!("[{}] session closed", self.id.short());
            }
            failed
        };
        if let Some(collector) = failed {
            log::warn!(
                "[{}] exchange {} interrupted by process exit",
                self.id.short(),
                collector.id()
            );
            collector.fail();
        }
    }
}
