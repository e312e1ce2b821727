use lazy_static::lazy_static;
use prometheus::Encoder;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::IntGaugeVec;
use prometheus::Opts;
use prometheus::Registry;
use prometheus::TextEncoder;
use tracing::error;


lazy_static! {
    pub static ref WATCH_TICKS: IntCounter =
        IntCounter::new("watch_ticks_total", "Completed watch loop ticks")
            .expect("metric can not be created");

    pub static ref WATCH_TICK_FAILURES: IntCounter =
        IntCounter::new("watch_tick_failures_total", "Watch loop ticks aborted by a remote failure")
            .expect("metric can not be created");

    pub static ref WATCH_EVENTS: IntCounterVec = IntCounterVec::new(
        Opts::new("watch_events_total", "Change events dispatched by the watch loop"),
        &["kind"]
    )
    .expect("metric can not be created");

    pub static ref SYNC_WRITES: IntCounterVec = IntCounterVec::new(
        Opts::new("sync_writes_total", "Remote writes issued by sync"),
        &["kind"]
    )
    .expect("metric can not be created");

    pub static ref POOL_CONNECTIONS: IntGaugeVec = IntGaugeVec::new(
        Opts::new("pool_connections", "Pooled connections by state"),
        &["state"]
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = build_registry(None);
}

fn build_registry(prefix: Option<String>) -> Registry {
    let registry = Registry::new_custom(prefix, None).expect("registry can be created");
    register_custom_metrics(&registry);
    registry
}

fn register_custom_metrics(registry: &Registry) {
    registry
        .register(Box::new(WATCH_TICKS.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(WATCH_TICK_FAILURES.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(WATCH_EVENTS.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(SYNC_WRITES.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(POOL_CONNECTIONS.clone()))
        .expect("collector can be registered");
}

/// Renders every registered metric in the Prometheus text exposition format.
pub fn gather_text() -> String {
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer) {
        error!("encode metrics failed: {:?}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
