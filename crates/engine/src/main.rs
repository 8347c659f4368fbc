//! Bibnet command line driver
//!
//! Loads a workspace from a bundle and/or a JSON file of work records,
//! derives every relation, builds all graph layers and heatmaps, logs the
//! dataset report and optionally exports the result as a new bundle.

use anyhow::Context;
use bibnet_common::config::{AppConfig, ObservabilityConfig};
use bibnet_common::metrics::{register_metrics, LATENCY_BUCKETS};
use bibnet_common::store::WorkRecord;
use bibnet_common::VERSION;
use bibnet_engine::{GraphRequest, Layer, Relation, WorkspaceRegistry};
use futures::future::join_all;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets(LATENCY_BUCKETS)?
        .install()?;
    register_metrics();
    info!("Metrics exporter listening on {}", addr);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load configuration
    dotenvy::dotenv().ok();
    let config = AppConfig::load().context("Failed to load configuration")?;

    // 2. Setup logging and metrics
    init_tracing(&config.observability);
    info!(service = %config.observability.service_name, "Starting Bibnet Engine v{}", VERSION);

    if config.observability.metrics_port != 0 {
        init_metrics(config.observability.metrics_port)?;
    }

    // 3. Load the workspace
    let registry = WorkspaceRegistry::new(config.engine.clone());
    let workspace = registry.get_or_create(&config.workspace.name).await;

    if let Some(dir) = &config.storage.bundle_dir {
        let metadata = workspace.import_bundle(dir).await?;
        info!(dir = %dir, exported = %metadata.export_date, "Bundle imported");
    }

    if let Some(path) = &config.storage.ingest_path {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path))?;
        let records: Vec<WorkRecord> = serde_json::from_slice(&bytes)?;
        let summary = workspace.ingest(&records).await?;
        info!(path = %path, created = summary.created, updated = summary.updated, "Records ingested");
    }

    // 4. Derive edges, then build every layer concurrently
    for relation in Relation::PERSISTED {
        workspace.recompute_edges(relation).await?;
    }

    let min_edge_weight = config.engine.default_min_edge_weight;
    let builds = Layer::ALL.into_iter().map(|layer| {
        let workspace = workspace.clone();
        async move {
            let request = GraphRequest::new(layer).min_edge_weight(min_edge_weight);
            (layer, workspace.build_graph(&request).await)
        }
    });

    for (layer, graph) in join_all(builds).await {
        match graph {
            Ok(graph) => info!(layer = %layer, nodes = graph.nodes.len(), edges = graph.edges.len(), "Layer ready"),
            Err(e) => error!(layer = %layer, error = %e, "Layer build failed"),
        }
    }

    let (authors, nations) = futures::join!(
        workspace.author_keyword_matrix(None, None),
        workspace.nation_nation_matrix(None, None)
    );
    let (authors, nations) = (authors?, nations?);
    info!(
        author_rows = authors.rows.len(),
        keyword_cols = authors.cols.len(),
        nations = nations.rows.len(),
        "Heatmaps ready"
    );

    // 5. Report and export
    let report = workspace.report().await?;
    info!(report = %serde_json::to_string(&report)?, "Dataset report");

    if let Some(dir) = &config.storage.export_dir {
        let metadata = workspace.export_bundle(dir).await?;
        info!(dir = %dir, tables = metadata.checksums.len(), "Bundle exported");
    }

    Ok(())
}
