//! Prometheus counters kept by every machine session.

use prometheus::core::Collector;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use tracing::warn;

/// Traffic of one [`MachineSession`](crate::MachineSession).
#[derive(Clone)]
pub struct SessionMetrics {
    pub reads: IntCounter,
    pub writes: IntCounter,
    pub livebit_echoes: IntCounter,
    pub subscriptions: IntGauge,
}

impl SessionMetrics {
    fn new() -> prometheus::Result<Self> {
        Ok(Self {
            reads: IntCounter::new("mtec_reads", "Controller variables read")?,
            writes: IntCounter::new("mtec_writes", "Controller variables written")?,
            livebit_echoes: IntCounter::new(
                "mtec_livebit_echoes",
                "Livebit values echoed to the machine",
            )?,
            subscriptions: IntGauge::new("mtec_subscriptions", "Active subscriptions")?,
        })
    }
}

#[derive(Clone)]
pub struct MetricsHub {
    pub registry: Registry,
    pub session: SessionMetrics,
}

impl MetricsHub {
    pub fn new() -> Result<Self, String> {
        let registry = Registry::new();
        let session = SessionMetrics::new().map_err(|e| format!("metrics init error: {e}"))?;
        register(&registry, "mtec_reads", session.reads.clone());
        register(&registry, "mtec_writes", session.writes.clone());
        register(&registry, "mtec_livebit_echoes", session.livebit_echoes.clone());
        register(&registry, "mtec_subscriptions", session.subscriptions.clone());
        Ok(Self { registry, session })
    }

    /// Prometheus text exposition of every registered metric.
    pub fn encode_text(&self) -> String {
        let mut buf = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buf) {
            return format!("error encoding metrics: {e}");
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

/// A metric that cannot be registered keeps counting but is not exported.
fn register<M: Collector + 'static>(registry: &Registry, name: &str, metric: M) {
    if let Err(e) = registry.register(Box::new(metric)) {
        warn!(metric = name, error = %e, "metric not registered");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_counters_are_exported() {
        let hub = MetricsHub::new().unwrap();
        hub.session.reads.inc();
        hub.session.subscriptions.set(2);
        let text = hub.encode_text();
        assert!(text.contains("mtec_reads 1"));
        assert!(text.contains("mtec_writes 0"));
        assert!(text.contains("mtec_livebit_echoes 0"));
        assert!(text.contains("mtec_subscriptions 2"));
    }

    #[test]
    fn duplicate_registration_is_tolerated() {
        let hub = MetricsHub::new().unwrap();
        let again = IntCounter::new("mtec_reads", "again").unwrap();
        register(&hub.registry, "mtec_reads", again.clone());
        again.inc_by(5);
        assert_eq!(hub.registry.gather().len(), 4);
        assert!(hub.encode_text().contains("mtec_reads 0"));
    }
}
