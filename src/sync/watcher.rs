//! Polling watch loop
//!
//! ```text
//! listen():  scan ──▶ Put per key (baseline) ──▶ spawn loop
//!
//! loop:      interval.tick() ──▶ Ticker::tick()
//!                                  ├─ lock last_known   (serialises timer and sync ticks)
//!                                  ├─ scan namespace
//!                                  ├─ diff(last_known, scan)
//!                                  ├─ dispatch puts, then deletes
//!                                  └─ last_known = scan
//! ```
//!
//! The interval is the detection latency bound. Cancellation is only observed
//! between ticks, so a tick that has started always finishes its dispatch.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::interval_at;
use tokio::time::Instant;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::diff::diff;
use super::diff::Snapshot;
use super::event::ChangeEvent;
use super::event::EventDispatcher;
use crate::metrics::WATCH_EVENTS;
use crate::metrics::WATCH_TICKS;
use crate::metrics::WATCH_TICK_FAILURES;
use crate::Error;
use crate::KvStore;
use crate::Result;
use crate::TickErrorPolicy;

/// Scans the namespace, keeping only keys that actually live under it
pub(crate) async fn scan_namespace<S: KvStore>(
    store: &S,
    namespace: &str,
) -> Result<Snapshot> {
    let mut snapshot = store.get_keys_with_prefix(namespace).await?;
    let before = snapshot.len();
    snapshot.retain(|key, _| key.starts_with(namespace));
    if snapshot.len() != before {
        warn!(
            "store returned {} keys outside namespace {}",
            before - snapshot.len(),
            namespace
        );
    }
    Ok(snapshot)
}

/// One scan-diff-emit cycle, shared by the timer and by out-of-band triggers
pub(crate) struct Ticker<S: KvStore> {
    store: Arc<S>,
    dispatcher: Arc<dyn EventDispatcher>,
    namespace: String,
    cancel: CancellationToken,
    /// Owned by whichever tick holds the lock
    last_known: Mutex<Snapshot>,
    /// Error that ended the loop under [`TickErrorPolicy::Stop`]
    fatal: parking_lot::Mutex<Option<Error>>,
}

impl<S: KvStore> Ticker<S> {
    /// Takes the baseline scan and emits one `Put` per key
    async fn baseline(
        store: Arc<S>,
        dispatcher: Arc<dyn EventDispatcher>,
        namespace: String,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let baseline = scan_namespace(store.as_ref(), &namespace).await?;
        info!("watch baseline of {} holds {} keys", namespace, baseline.len());

        for (key, value) in &baseline {
            emit(dispatcher.as_ref(), ChangeEvent::put(key.clone(), value.clone())).await;
        }

        Ok(Self {
            store,
            dispatcher,
            namespace,
            cancel,
            last_known: Mutex::new(baseline),
            fatal: parking_lot::Mutex::new(None),
        })
    }

    /// Runs one tick. Returns the number of dispatched events.
    ///
    /// On a scan failure nothing is emitted and the last known snapshot is kept.
    /// Ticks requested after the loop was stopped are skipped.
    pub(crate) async fn tick(&self) -> Result<usize> {
        let mut last_known = self.last_known.lock().await;
        if self.cancel.is_cancelled() {
            debug!("watch loop stopped, skipping tick");
            return Ok(0);
        }

        let current = scan_namespace(self.store.as_ref(), &self.namespace).await?;
        let changes = diff(&last_known, &current);

        let mut dispatched = 0;
        for (key, value) in &changes.puts {
            emit(self.dispatcher.as_ref(), ChangeEvent::put(key.clone(), value.clone())).await;
            dispatched += 1;
        }
        for key in &changes.deletes {
            if changes.puts.contains_key(key) {
                continue;
            }
            emit(self.dispatcher.as_ref(), ChangeEvent::delete(key.clone())).await;
            dispatched += 1;
        }

        *last_known = current;
        WATCH_TICKS.inc();
        debug!("watch tick on {} dispatched {} events", self.namespace, dispatched);
        Ok(dispatched)
    }

    /// Applies `policy` to a failed tick, wherever the tick came from
    ///
    /// Under `Stop` the error is kept for [`WatchLoop::stop`] and the loop is
    /// cancelled.
    fn tick_failed(
        &self,
        policy: TickErrorPolicy,
        e: Error,
    ) {
        WATCH_TICK_FAILURES.inc();
        match policy {
            TickErrorPolicy::Continue => {
                warn!("watch tick on {} failed, waiting for next interval: {}", self.namespace, e);
            }
            TickErrorPolicy::Stop => {
                error!("watch tick on {} failed, stopping loop: {}", self.namespace, e);
                self.fatal.lock().get_or_insert(e);
                self.cancel.cancel();
            }
        }
    }

    fn take_fatal(&self) -> Result<()> {
        match self.fatal.lock().take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

async fn emit(
    dispatcher: &dyn EventDispatcher,
    event: ChangeEvent,
) {
    debug!("dispatch {:?}", event);
    WATCH_EVENTS.with_label_values(&[event.kind()]).inc();
    dispatcher.dispatch(event).await;
}

/// A running watch loop
pub(crate) struct WatchLoop<S: KvStore> {
    ticker: Arc<Ticker<S>>,
    policy: TickErrorPolicy,
    cancel: CancellationToken,
    task: JoinHandle<Result<()>>,
}

impl<S: KvStore> WatchLoop<S> {
    /// Emits the baseline, then arms the timer
    pub(crate) async fn start(
        store: Arc<S>,
        dispatcher: Arc<dyn EventDispatcher>,
        namespace: String,
        interval: Duration,
        policy: TickErrorPolicy,
    ) -> Result<Self> {
        let cancel = CancellationToken::new();
        let ticker = Arc::new(Ticker::baseline(store, dispatcher, namespace, cancel.clone()).await?);

        let task = tokio::spawn(run(ticker.clone(), interval, policy, cancel.clone()));

        Ok(Self {
            ticker,
            policy,
            cancel,
            task,
        })
    }

    /// False once stopped or ended by a fatal tick
    pub(crate) fn is_running(&self) -> bool {
        !self.cancel.is_cancelled() && !self.task.is_finished()
    }

    /// Runs one tick now, after any tick already in flight
    ///
    /// A failure goes through the loop's tick error policy and yields `None`.
    pub(crate) async fn trigger(&self) -> Option<usize> {
        match self.ticker.tick().await {
            Ok(dispatched) => Some(dispatched),
            Err(e) => {
                self.ticker.tick_failed(self.policy, e);
                None
            }
        }
    }

    /// Token cancelled when the loop is stopped or ends on a fatal tick
    pub(crate) fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Disarms the timer and waits for an in-flight tick to finish
    ///
    /// Returns the error that ended the loop, if it ended on its own.
    pub(crate) async fn stop(self) -> Result<()> {
        self.cancel.cancel();
        self.task.await?
    }
}

async fn run<S: KvStore>(
    ticker: Arc<Ticker<S>>,
    interval: Duration,
    policy: TickErrorPolicy,
    cancel: CancellationToken,
) -> Result<()> {
    // The baseline already covered "now"
    let mut timer = interval_at(Instant::now() + interval, interval);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("watch loop on {} stopped", ticker.namespace);
                return ticker.take_fatal();
            }
            _ = timer.tick() => {}
        }

        if let Err(e) = ticker.tick().await {
            ticker.tick_failed(policy, e);
        }
    }
}
