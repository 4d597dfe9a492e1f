//! Metrics and observability.
//!
//! Counter helpers compile to no-ops unless the `observability` feature is
//! enabled, so instrumented call sites stay unconditional.

/// Registers descriptions for every metric the crate emits. Call once at
/// startup when the `observability` feature is enabled.
#[cfg(feature = "observability")]
pub fn describe_metrics() {
    use metrics::describe_counter;
    describe_counter!(
        "defistate_snapshots_processed_total",
        "Processed snapshots published downstream."
    );
    describe_counter!(
        "defistate_snapshots_dropped_total",
        "Processed snapshots dropped because the consumer lagged."
    );
    describe_counter!(
        "defistate_patch_failures_total",
        "Deltas rejected by the patcher (block or schema mismatch)."
    );
    describe_counter!(
        "defistate_graph_compactions_total",
        "In-place compactions of the token-pool graph registry."
    );
    describe_counter!(
        "defistate_engine_builds_total",
        "Per-snapshot pathfinding engines constructed."
    );
}

#[cfg(not(feature = "observability"))]
pub fn describe_metrics() {}

macro_rules! counter_helper {
    ($helper:ident, $name:literal) => {
        #[cfg(feature = "observability")]
        pub fn $helper() {
            metrics::increment_counter!($name);
        }
        #[cfg(not(feature = "observability"))]
        pub fn $helper() {}
    };
}

counter_helper!(inc_snapshots_processed, "defistate_snapshots_processed_total");
counter_helper!(inc_snapshots_dropped, "defistate_snapshots_dropped_total");
counter_helper!(inc_patch_failures, "defistate_patch_failures_total");
counter_helper!(inc_graph_compactions, "defistate_graph_compactions_total");
counter_helper!(inc_engine_builds, "defistate_engine_builds_total");

/// Initializes a JSON-formatted tracing subscriber honoring `RUST_LOG`.
#[cfg(feature = "observability")]
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
}
