//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Relationship Metrics
    pub static ref RELATIONSHIP_MUTATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("rapport_relationship_mutations_total", "Total number of relationship graph mutations"),
        &["operation"]
    ).expect("metric can be created");

    // Messaging Metrics
    pub static ref MESSAGES_SENT_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("rapport_messages_sent_total", "Total number of messages appended to the log"),
        &["channel"]
    ).expect("metric can be created");

    // Realtime Metrics
    pub static ref REALTIME_EVENTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("rapport_realtime_events_total", "Total number of inbound realtime events"),
        &["event"]
    ).expect("metric can be created");
    pub static ref REALTIME_MALFORMED_EVENTS_TOTAL: IntCounter = IntCounter::new(
        "rapport_realtime_malformed_events_total",
        "Total number of realtime frames that could not be decoded"
    ).expect("metric can be created");
    pub static ref REALTIME_STALLED_CONNECTIONS_TOTAL: IntCounter = IntCounter::new(
        "rapport_realtime_stalled_connections_total",
        "Total number of connections dropped for a full outbound queue"
    ).expect("metric can be created");
    pub static ref WS_CONNECTIONS_ACTIVE: IntGauge = IntGauge::new(
        "rapport_ws_connections_active",
        "Current number of open WebSocket connections"
    ).expect("metric can be created");
    pub static ref ONLINE_ACCOUNTS: IntGauge = IntGauge::new(
        "rapport_online_accounts",
        "Current number of registered accounts"
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("rapport_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

/// Initialize metrics registry.
///
/// Safe to call more than once; later registrations are ignored.
pub fn init_metrics() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(RELATIONSHIP_MUTATIONS_TOTAL.clone()),
        Box::new(MESSAGES_SENT_TOTAL.clone()),
        Box::new(REALTIME_EVENTS_TOTAL.clone()),
        Box::new(REALTIME_MALFORMED_EVENTS_TOTAL.clone()),
        Box::new(REALTIME_STALLED_CONNECTIONS_TOTAL.clone()),
        Box::new(WS_CONNECTIONS_ACTIVE.clone()),
        Box::new(ONLINE_ACCOUNTS.clone()),
        Box::new(ERRORS_TOTAL.clone()),
    ];

    for collector in collectors {
        if let Err(error) = REGISTRY.register(collector) {
            tracing::debug!(%error, "Metric already registered");
        }
    }

    tracing::info!("Metrics registry initialized");
}
