//! Prometheus metrics for the Teamspeak Controller.
//!
//! Every `Metrics` owns its registry, so tests can create as many as they
//! like without clashing on metric names.

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Reconciliation and allocation metrics.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    reconciliations: IntCounterVec,
    allocations: IntCounter,
    pool_exhausted: IntCounter,
    children_created: IntCounterVec,
    reconcile_duration: Histogram,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    /// Creates and registers all metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let reconciliations = IntCounterVec::new(
            Opts::new("teamspeak_reconciliations_total", "Teamspeak reconciliations by result"),
            &["result"],
        )?;
        let allocations = IntCounter::new(
            "teamspeak_address_allocations_total",
            "Addresses allocated to Teamspeak resources",
        )?;
        let pool_exhausted = IntCounter::new(
            "teamspeak_address_pool_exhausted_total",
            "Reconciliations that found no free address",
        )?;
        let children_created = IntCounterVec::new(
            Opts::new("teamspeak_children_created_total", "Pods and Services created by kind"),
            &["kind"],
        )?;
        let reconcile_duration = Histogram::with_opts(HistogramOpts::new(
            "teamspeak_reconcile_duration_seconds",
            "Duration of Teamspeak reconciliations",
        ))?;

        registry.register(Box::new(reconciliations.clone()))?;
        registry.register(Box::new(allocations.clone()))?;
        registry.register(Box::new(pool_exhausted.clone()))?;
        registry.register(Box::new(children_created.clone()))?;
        registry.register(Box::new(reconcile_duration.clone()))?;

        Ok(Self {
            registry,
            reconciliations,
            allocations,
            pool_exhausted,
            children_created,
            reconcile_duration,
        })
    }

    /// Counts a finished reconciliation (`success`, `deleted` or `error`).
    pub fn reconciled(&self, result: &str, seconds: f64) {
        self.reconciliations.with_label_values(&[result]).inc();
        self.reconcile_duration.observe(seconds);
    }

    /// Counts a persisted address allocation.
    pub fn address_allocated(&self) {
        self.allocations.inc();
    }

    /// Counts an allocation attempt that found the pool exhausted.
    pub fn pool_exhausted(&self) {
        self.pool_exhausted.inc();
    }

    /// Counts a created child object (`pod` or `service`).
    pub fn child_created(&self, kind: &str) {
        self.children_created.with_label_values(&[kind]).inc();
    }

    /// Renders all metrics in the Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_contains_counters() {
        let metrics = Metrics::new().unwrap();
        metrics.reconciled("success", 0.01);
        metrics.address_allocated();
        metrics.child_created("pod");

        let text = metrics.encode().unwrap();

        assert!(text.contains("teamspeak_reconciliations_total{result=\"success\"} 1"));
        assert!(text.contains("teamspeak_address_allocations_total 1"));
        assert!(text.contains("teamspeak_children_created_total{kind=\"pod\"} 1"));
        assert!(text.contains("teamspeak_reconcile_duration_seconds_count 1"));
    }

    #[test]
    fn test_independent_registries() {
        let a = Metrics::new().unwrap();
        let b = Metrics::new().unwrap();
        a.pool_exhausted();

        assert!(a.encode().unwrap().contains("teamspeak_address_pool_exhausted_total 1"));
        assert!(b.encode().unwrap().contains("teamspeak_address_pool_exhausted_total 0"));
    }
}
