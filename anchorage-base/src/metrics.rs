//! Useful metrics that the observer tracks.

use prometheus::{
    opts, register_int_counter_vec_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, IntCounter, IntCounterVec, IntGauge, Registry,
};

/// The metrics namespace prefix. All metric names will start with
/// `{NAMESPACE}_`.
pub const NAMESPACE: &str = "anchorage";

/// Macro to prefix a string with the namespace.
macro_rules! namespaced {
    ($name:expr) => {
        format!("{NAMESPACE}_{}", $name)
    };
}

/// Metrics tracked by the observer. Handles are cheaply cloneable; the
/// registry is shared with the embedding service, which owns scraping.
#[derive(Clone)]
pub struct ObserverMetrics {
    registry: Registry,

    /// Highest block the historical walk has covered.
    pub last_synced_block: IntGauge,
    /// Chain tip targeted by the current walk.
    pub target_block: IntGauge,
    /// Entries currently in the under-processing sequence.
    pub pending_transactions: IntGauge,
    /// Anchor records persisted to the transaction store since boot.
    pub stored_transactions: IntCounter,
    /// Unresolvable fetch attempts recorded since boot.
    pub unresolvable_attempts: IntCounter,
    /// Chain reorganizations handled since boot.
    pub reorgs: IntCounter,
    /// Live-loop passes by outcome (`success` or `failure`).
    pub loop_runs: IntCounterVec,
}

impl ObserverMetrics {
    /// Register the observer metric family on `registry`.
    pub fn new(registry: Registry) -> prometheus::Result<Self> {
        let last_synced_block = register_int_gauge_with_registry!(
            opts!(
                namespaced!("last_synced_block"),
                "Highest block height fully covered by the historical walk"
            ),
            registry
        )?;

        let target_block = register_int_gauge_with_registry!(
            opts!(
                namespaced!("target_block"),
                "Chain tip height targeted by the current historical walk"
            ),
            registry
        )?;

        let pending_transactions = register_int_gauge_with_registry!(
            opts!(
                namespaced!("pending_transactions"),
                "Anchor records currently in the under-processing sequence"
            ),
            registry
        )?;

        let stored_transactions = register_int_counter_with_registry!(
            opts!(
                namespaced!("stored_transactions_total"),
                "Anchor records persisted to the transaction store since boot"
            ),
            registry
        )?;

        let unresolvable_attempts = register_int_counter_with_registry!(
            opts!(
                namespaced!("unresolvable_attempts_total"),
                "Unresolvable fetch attempts recorded since boot"
            ),
            registry
        )?;

        let reorgs = register_int_counter_with_registry!(
            opts!(
                namespaced!("reorgs_total"),
                "Chain reorganizations handled since boot"
            ),
            registry
        )?;

        let loop_runs = register_int_counter_vec_with_registry!(
            opts!(
                namespaced!("loop_runs_total"),
                "Live-loop passes since boot, by outcome"
            ),
            &["outcome"],
            registry
        )?;

        Ok(Self {
            registry,
            last_synced_block,
            target_block,
            pending_transactions,
            stored_transactions,
            unresolvable_attempts,
            reorgs,
            loop_runs,
        })
    }

    /// Metrics on a private registry; test and embedder convenience.
    pub fn standalone() -> Self {
        Self::new(Registry::new()).expect("metric names collide on a fresh registry")
    }

    /// Gather the current metric report from the shared registry.
    pub fn gather(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }
}

impl std::fmt::Debug for ObserverMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObserverMetrics")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn registers_and_gathers() {
        let metrics = ObserverMetrics::standalone();
        metrics.last_synced_block.set(42);
        metrics.loop_runs.with_label_values(&["success"]).inc();
        let families = metrics.gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "anchorage_last_synced_block"));
    }

    #[test]
    fn double_registration_fails() {
        let registry = Registry::new();
        assert!(ObserverMetrics::new(registry.clone()).is_ok());
        assert!(ObserverMetrics::new(registry).is_err());
    }
}
