use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::Notify;
use tracing::debug;

use crate::ChangeEvent;
use crate::EventDispatcher;

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
    debug!("setup logger for unit test.");
}

/// Every event already sitting in the channel, without waiting for more
pub(crate) fn drain_events(rx: &mut mpsc::UnboundedReceiver<ChangeEvent>) -> Vec<ChangeEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Forwards events to a channel and can park one dispatch until released
///
/// Every delivered event is also appended to `log` as `dispatch:<key>`, so
/// tests can order dispatches against other recorded steps.
#[derive(Clone)]
pub(crate) struct GatedDispatcher {
    events: mpsc::UnboundedSender<ChangeEvent>,
    log: Arc<Mutex<Vec<String>>>,
    hold: Arc<AtomicBool>,
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl GatedDispatcher {
    pub(crate) fn new(
        events: mpsc::UnboundedSender<ChangeEvent>,
        log: Arc<Mutex<Vec<String>>>,
    ) -> Self {
        Self {
            events,
            log,
            hold: Arc::new(AtomicBool::new(false)),
            entered: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        }
    }

    /// The next dispatch waits for [`release`](Self::release)
    pub(crate) fn hold_next(&self) {
        self.hold.store(true, Ordering::SeqCst);
    }

    /// Resolves once a held dispatch is parked
    pub(crate) async fn parked(&self) {
        self.entered.notified().await;
    }

    pub(crate) fn release(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl EventDispatcher for GatedDispatcher {
    async fn dispatch(
        &self,
        event: ChangeEvent,
    ) {
        if self.hold.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.log.lock().push(format!("dispatch:{}", event.key()));
        let _ = self.events.send(event);
    }
}
