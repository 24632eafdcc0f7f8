use crate::domain::order::StatusUpdate;
use crate::domain::ports::{AccrualClientBox, AccrualResponse, LedgerStoreRef};
use crate::error::LedgerError;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Ticking,
    Stopped,
}

/// What happened during one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Pending orders fetched from the store.
    pub pending: usize,
    /// Orders the accrual service gave a verdict for.
    pub resolved: usize,
    /// Orders skipped because the service did not know them or the call failed.
    pub skipped: usize,
    pub rate_limited: bool,
    /// At least part of the batch reached the store and was committed.
    pub committed: bool,
    /// Verdicts the store refused when applied on their own.
    pub rejected: usize,
    /// The tick did nothing because a `Retry-After` deadline had not passed.
    pub deferred: bool,
}

/// Drains pending orders through the accrual service on a fixed interval.
///
/// The poller is the only writer of order status transitions. Each tick
/// walks the pending set one order at a time, stops at the first rate-limit
/// answer, and hands the collected verdicts to the store as a single batch.
/// When the store rejects the batch because of one of its rows, the verdicts
/// are applied one by one so the rest still settle; the refused ones stay
/// pending. Faults are logged and never end the loop; only the shutdown token
/// does, and it is checked between ticks so a batch is never torn.
pub struct ReconciliationPoller {
    store: LedgerStoreRef,
    client: AccrualClientBox,
    interval: Duration,
    state: PollerState,
    resume_at: Option<Instant>,
}

impl ReconciliationPoller {
    pub fn new(store: LedgerStoreRef, client: AccrualClientBox, interval: Duration) -> Self {
        Self {
            store,
            client,
            interval,
            state: PollerState::Idle,
            resume_at: None,
        }
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    /// Runs one reconciliation pass.
    pub async fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();

        if let Some(resume_at) = self.resume_at {
            if Instant::now() < resume_at {
                debug!("Accrual service asked us to back off, skipping tick");
                report.deferred = true;
                return report;
            }
            self.resume_at = None;
        }

        self.state = PollerState::Ticking;
        self.run_tick(&mut report).await;
        self.state = PollerState::Idle;
        report
    }

    async fn run_tick(&mut self, report: &mut TickReport) {
        let pending = match self.store.pending_orders().await {
            Ok(pending) => pending,
            Err(e) => {
                error!(error = %e, "Failed to load pending orders");
                return;
            }
        };
        report.pending = pending.len();
        if pending.is_empty() {
            return;
        }

        let mut batch = Vec::with_capacity(pending.len());
        for order in pending {
            match self.client.fetch(&order.number).await {
                AccrualResponse::Resolved { status, amount } => {
                    batch.push(StatusUpdate {
                        number: order.number,
                        status,
                        amount,
                    });
                }
                AccrualResponse::NotFound => {
                    debug!(order = %order.number, "Order unknown to accrual service");
                    report.skipped += 1;
                }
                AccrualResponse::TransportError(e) => {
                    warn!(order = %order.number, error = %e, "Accrual request failed");
                    report.skipped += 1;
                }
                AccrualResponse::RateLimited { retry_after } => {
                    warn!(order = %order.number, ?retry_after, "Accrual service rate limit hit");
                    report.rate_limited = true;
                    self.resume_at = retry_after.map(|delay| Instant::now() + delay);
                    break;
                }
            }
        }
        report.resolved = batch.len();

        if batch.is_empty() {
            return;
        }
        match self.store.apply_reconciliation_batch(batch.clone()).await {
            Ok(()) => {
                report.committed = true;
                info!(
                    resolved = report.resolved,
                    pending = report.pending,
                    "Reconciliation batch committed"
                );
            }
            Err(e) if is_row_fault(&e) => {
                warn!(error = %e, "Reconciliation batch rejected, applying verdicts one by one");
                self.apply_each(batch, report).await;
            }
            Err(e) => error!(error = %e, "Reconciliation batch discarded"),
        }
    }

    async fn apply_each(&self, batch: Vec<StatusUpdate>, report: &mut TickReport) {
        for update in batch {
            let order = update.number.clone();
            match self.store.apply_reconciliation_batch(vec![update]).await {
                Ok(()) => report.committed = true,
                Err(e) if is_row_fault(&e) => {
                    error!(%order, error = %e, "Accrual verdict rejected, order stays pending");
                    report.rejected += 1;
                }
                Err(e) => {
                    error!(error = %e, "Reconciliation aborted");
                    return;
                }
            }
        }
    }

    /// Ticks every `interval` until `shutdown` is cancelled.
    ///
    /// The first tick fires one interval after start. Cancellation is only
    /// observed between ticks; a tick in progress runs to completion.
    pub async fn run(mut self, shutdown: CancellationToken) -> PollerState {
        info!(interval = ?self.interval, "Reconciliation poller started");
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let report = self.tick().await;
                    debug!(?report, "Tick finished");
                }
            }
        }

        drop(ticker);
        self.state = PollerState::Stopped;
        info!("Reconciliation poller stopped");
        self.state
    }

    /// Spawns [`run`](Self::run) onto the runtime.
    pub fn spawn(self) -> PollerHandle {
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(self.run(shutdown.clone()));
        PollerHandle { shutdown, task }
    }
}

/// Errors caused by the content of a batch rather than by the store itself.
fn is_row_fault(e: &LedgerError) -> bool {
    matches!(
        e,
        LedgerError::BatchRejected(_)
            | LedgerError::ValidationError(_)
            | LedgerError::AccountNotFound(_)
    )
}

/// Handle to a spawned poller.
pub struct PollerHandle {
    shutdown: CancellationToken,
    task: JoinHandle<PollerState>,
}

impl PollerHandle {
    /// Signals the poller and waits for it to leave its loop.
    pub async fn stop(self) -> PollerState {
        self.shutdown.cancel();
        match self.task.await {
            Ok(state) => state,
            Err(e) => {
                error!(error = %e, "Reconciliation poller task failed");
                PollerState::Stopped
            }
        }
    }
}
