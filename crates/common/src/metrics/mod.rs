//! Metrics and observability utilities
//!
//! Provides Prometheus-style metrics with standardized naming conventions.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};

/// Metrics prefix for all Bibnet metrics
pub const METRICS_PREFIX: &str = "bibnet";

/// Histogram buckets for engine operations (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001,  // 1ms
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_edge_recomputations_total", METRICS_PREFIX),
        Unit::Count,
        "Total edge set recomputations per relation"
    );

    describe_histogram!(
        format!("{}_edge_recompute_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Edge set recomputation latency in seconds"
    );

    describe_gauge!(
        format!("{}_edge_count", METRICS_PREFIX),
        Unit::Count,
        "Number of edges in the current edge set"
    );

    describe_counter!(
        format!("{}_edge_cache_hits_total", METRICS_PREFIX),
        Unit::Count,
        "Edge set reads served from the derived cache"
    );

    describe_counter!(
        format!("{}_edge_cache_misses_total", METRICS_PREFIX),
        Unit::Count,
        "Edge set reads that forced a recomputation"
    );

    describe_counter!(
        format!("{}_graph_builds_total", METRICS_PREFIX),
        Unit::Count,
        "Total graph builds"
    );

    describe_histogram!(
        format!("{}_graph_build_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Graph build latency in seconds"
    );

    describe_counter!(
        format!("{}_heatmap_builds_total", METRICS_PREFIX),
        Unit::Count,
        "Total heatmap builds"
    );

    describe_counter!(
        format!("{}_merges_total", METRICS_PREFIX),
        Unit::Count,
        "Entity merges by outcome"
    );

    describe_counter!(
        format!("{}_works_ingested_total", METRICS_PREFIX),
        Unit::Count,
        "Total works upserted"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record an edge recomputation
pub fn record_edge_recompute(relation: &str, duration_secs: f64, edge_count: usize) {
    counter!(
        format!("{}_edge_recomputations_total", METRICS_PREFIX),
        "relation" => relation.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_edge_recompute_duration_seconds", METRICS_PREFIX),
        "relation" => relation.to_string()
    )
    .record(duration_secs);

    gauge!(
        format!("{}_edge_count", METRICS_PREFIX),
        "relation" => relation.to_string()
    )
    .set(edge_count as f64);
}

/// Helper to record derived edge cache lookups
pub fn record_edge_cache(hit: bool, relation: &str) {
    let name = if hit { "edge_cache_hits_total" } else { "edge_cache_misses_total" };
    counter!(
        format!("{}_{}", METRICS_PREFIX, name),
        "relation" => relation.to_string()
    )
    .increment(1);
}

/// Helper to record graph builds
pub fn record_graph_build(duration_secs: f64, layer: &str, mode: &str) {
    counter!(
        format!("{}_graph_builds_total", METRICS_PREFIX),
        "layer" => layer.to_string(),
        "mode" => mode.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_graph_build_duration_seconds", METRICS_PREFIX),
        "layer" => layer.to_string()
    )
    .record(duration_secs);
}

pub fn record_heatmap(kind: &str) {
    counter!(
        format!("{}_heatmap_builds_total", METRICS_PREFIX),
        "kind" => kind.to_string()
    )
    .increment(1);
}

pub fn record_merge(kind: &str, success: bool) {
    let outcome = if success { "success" } else { "error" };
    counter!(
        format!("{}_merges_total", METRICS_PREFIX),
        "kind" => kind.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

pub fn record_ingestion(works: usize) {
    counter!(format!("{}_works_ingested_total", METRICS_PREFIX)).increment(works as u64);
}
