use std::sync::Arc;

use prometheus::{
    CounterVec, Encoder, IntCounter, IntGauge, Opts, Registry, TextEncoder, proto::MetricFamily,
};

use slotlease_core::{ClaimOutcome, HeartbeatOutcome, LeaseMetrics};

const NAMESPACE: &str = "slotlease";

/// Prometheus metrics backend for the lease allocator.
///
/// ## Label cardinality
/// All labels are bounded:
/// - `outcome` on claims: "minted", "adopted", "verified", "conceded"
/// - `outcome` on heartbeats: "renewed", "failed"
#[derive(Clone)]
pub struct PrometheusMetrics {
    scans: IntCounter,
    expired: IntCounter,
    live: IntGauge,
    claims: CounterVec,
    heartbeats: CounterVec,
    registry: Arc<Registry>,
}

impl PrometheusMetrics {
    /// Create a new prometheus metrics backend with custom registry.
    pub fn new_with_registry(registry: Arc<Registry>) -> Result<Self, prometheus::Error> {
        let scans = IntCounter::with_opts(
            Opts::new("scans_total", "Pool scans completed under the mutex").namespace(NAMESPACE),
        )?;
        registry.register(Box::new(scans.clone()))?;

        let expired = IntCounter::with_opts(
            Opts::new(
                "expired_slots_total",
                "Abandoned pool entries deleted during scans",
            )
            .namespace(NAMESPACE),
        )?;
        registry.register(Box::new(expired.clone()))?;

        let live = IntGauge::with_opts(
            Opts::new("live_slots", "Live pool entries seen by the most recent scan")
                .namespace(NAMESPACE),
        )?;
        registry.register(Box::new(live.clone()))?;

        let claims = CounterVec::new(
            Opts::new("claims_total", "Claim attempts by outcome").namespace(NAMESPACE),
            &["outcome"],
        )?;
        registry.register(Box::new(claims.clone()))?;

        let heartbeats = CounterVec::new(
            Opts::new("heartbeats_total", "Heartbeat writes by outcome").namespace(NAMESPACE),
            &["outcome"],
        )?;
        registry.register(Box::new(heartbeats.clone()))?;

        Ok(Self {
            scans,
            expired,
            live,
            claims,
            heartbeats,
            registry,
        })
    }

    /// Create a new prometheus metrics backend with its own registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::new_with_registry(Arc::new(Registry::new()))
    }

    /// Gather all metrics for exposition.
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Render the registry in the prometheus text exposition format.
    pub fn encode_text(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    /// Underlying registry, for registering custom metrics alongside these.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }
}

impl LeaseMetrics for PrometheusMetrics {
    fn record_scan(&self, expired: usize, live: usize) {
        self.scans.inc();
        self.expired.inc_by(expired as u64);
        self.live.set(live as i64);
    }

    fn record_claim(&self, outcome: ClaimOutcome) {
        self.claims.with_label_values(&[outcome.as_label()]).inc();
    }

    fn record_heartbeat(&self, outcome: HeartbeatOutcome) {
        self.heartbeats.with_label_values(&[outcome.as_label()]).inc();
    }
}
