//! Workspaces
//!
//! A workspace is one isolated dataset: a fact store plus the edge sets
//! derived from it. Writers (ingestion, imports, merges, resets) take the
//! fact lock exclusively; graph, heatmap and report builds share it for
//! their whole duration, so every read sees one consistent revision.
//!
//! Lock order is always the fact lock first, then an edge slot.

use crate::aggregate::{DerivedEdges, EdgeSet, NodeKey, Relation};
use crate::graph::{Graph, GraphBuilder, GraphRequest, Layer};
use crate::heatmap::{self, Heatmap};
use crate::merge;
use crate::report::{self, Report};
use bibnet_common::config::EngineConfig;
use bibnet_common::errors::{AppError, Result};
use bibnet_common::metrics::{record_graph_build, record_heatmap, record_ingestion, record_merge};
use bibnet_common::store::bundle::{BundleMetadata, BundleReader, BundleWriter};
use bibnet_common::store::models::MergeRecord;
use bibnet_common::store::{FactReader, WorkRecord, YearRange};
use bibnet_common::{EntityId, EntityKind, FactStore};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{info, instrument};

/// Result of one ingestion batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub created: usize,
    pub updated: usize,
}

#[derive(Debug)]
pub struct Workspace {
    name: String,
    settings: EngineConfig,
    facts: RwLock<FactStore>,
    edges: DerivedEdges,
}

impl Workspace {
    pub fn new(name: impl Into<String>, settings: EngineConfig) -> Self {
        Self::with_store(name, settings, FactStore::new())
    }

    pub fn with_store(name: impl Into<String>, settings: EngineConfig, store: FactStore) -> Self {
        Self {
            name: name.into(),
            settings,
            facts: RwLock::new(store),
            edges: DerivedEdges::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run `f` against the committed facts
    pub async fn read<T>(&self, f: impl FnOnce(&FactStore) -> T) -> T {
        let facts = self.facts.read().await;
        f(&*facts)
    }

    /// Upsert a batch of records. Either every record lands or none does.
    #[instrument(skip(self, records), fields(workspace = %self.name, records = records.len()))]
    pub async fn ingest(&self, records: &[WorkRecord]) -> Result<IngestSummary> {
        let mut facts = self.facts.write().await;

        let summary = facts
            .transaction(|staged| {
                let mut summary = IngestSummary::default();
                for record in records {
                    if staged.upsert_work(record)?.created {
                        summary.created += 1;
                    } else {
                        summary.updated += 1;
                    }
                }
                Ok(summary)
            })
            .map_err(|e| {
                e.log();
                e
            })?;

        record_ingestion(records.len());
        info!(
            created = summary.created,
            updated = summary.updated,
            revision = facts.revision(),
            "Ingestion batch committed"
        );
        Ok(summary)
    }

    /// Replace the stored edge set of a persisted relation
    pub async fn recompute_edges(&self, relation: Relation) -> Result<Arc<EdgeSet>> {
        let facts = self.facts.read().await;
        self.edges.recompute(relation, &*facts).await
    }

    /// Current edge set of a persisted relation, derived if stale
    pub async fn edge_set(&self, relation: Relation) -> Result<Arc<EdgeSet>> {
        let facts = self.facts.read().await;
        self.edges.current(relation, &*facts).await
    }

    /// Parse and check node ids of a layer against the committed facts
    pub async fn validate_ids(&self, layer: Layer, ids: &[String]) -> Result<Vec<NodeKey>> {
        let facts = self.facts.read().await;
        validate_ids(&*facts, layer, ids)
    }

    #[instrument(skip(self, request), fields(workspace = %self.name, layer = %request.layer))]
    pub async fn build_graph(&self, request: &GraphRequest) -> Result<Graph> {
        let start = Instant::now();
        let range = YearRange::new(request.year_min, request.year_max)?;
        let relation = request.layer.relation();
        let facts = self.facts.read().await;

        let focus: BTreeSet<NodeKey> = validate_ids(&*facts, request.layer, &request.focus_ids)?
            .into_iter()
            .collect();
        let works = facts.works_in_range(range)?;
        let edges = if relation.is_persisted() {
            Some(self.edges.current(relation, &*facts).await?)
        } else {
            None
        };

        let mode = request.mode();
        let graph = GraphBuilder::new(&*facts, request.layer).build(
            &works,
            edges.as_deref(),
            range,
            request.min_edge_weight,
            &focus,
            mode,
        )?;

        record_graph_build(start.elapsed().as_secs_f64(), request.layer.as_str(), mode.as_str());
        info!(
            mode = mode.as_str(),
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "Graph built"
        );
        Ok(graph)
    }

    pub async fn author_keyword_matrix(&self, year_min: Option<i32>, year_max: Option<i32>) -> Result<Heatmap> {
        let range = YearRange::new(year_min, year_max)?;
        let facts = self.facts.read().await;

        let works = facts.works_in_range(range)?;
        let map = heatmap::author_keyword(&*facts, &works, self.settings.heatmap_top_k)?;

        record_heatmap("author_keyword");
        Ok(map)
    }

    pub async fn nation_nation_matrix(&self, year_min: Option<i32>, year_max: Option<i32>) -> Result<Heatmap> {
        let range = YearRange::new(year_min, year_max)?;
        let facts = self.facts.read().await;

        let works = facts.works_in_range(range)?;
        let edges = self.edges.current(Relation::Nation, &*facts).await?;
        let map = heatmap::nation_nation(&works, &edges, range)?;

        record_heatmap("nation_nation");
        Ok(map)
    }

    /// Fold `removed_id` into `kept_id` atomically. Affected edge sets are
    /// recomputed against the staged facts before anything is committed.
    #[instrument(skip(self, reason, actor), fields(workspace = %self.name))]
    pub async fn merge_entities(
        &self,
        kind: EntityKind,
        kept_id: EntityId,
        removed_id: EntityId,
        reason: Option<String>,
        actor: Option<String>,
    ) -> Result<MergeRecord> {
        let mut facts = self.facts.write().await;

        let result = merge_staged(&mut facts, kind, kept_id, removed_id, reason, actor);
        record_merge(kind.as_str(), result.is_ok());
        let (record, sets) = result.map_err(|e| {
            e.log();
            e
        })?;

        for set in sets {
            self.edges.install(set).await?;
        }
        Ok(record)
    }

    pub async fn report(&self) -> Result<Report> {
        let facts = self.facts.read().await;
        let coauthor = self.edges.current(Relation::Coauthor, &*facts).await?;
        report::build(&facts, &coauthor)
    }

    /// Write the fact tables and the current edge sets into `dir`
    pub async fn export_bundle(&self, dir: impl AsRef<Path>) -> Result<BundleMetadata> {
        let facts = self.facts.read().await;
        let mut writer = BundleWriter::create(dir).await?;

        facts.write_tables(&mut writer).await?;
        for relation in Relation::PERSISTED {
            let set = self.edges.current(relation, &*facts).await?;
            writer.write_table(relation.table_name(), &set.rows()).await?;
        }

        writer.finish().await
    }

    /// Replace the whole dataset with a bundle's contents. Edge tables in
    /// the bundle are ignored; edges are derived again on demand.
    pub async fn import_bundle(&self, dir: impl AsRef<Path>) -> Result<BundleMetadata> {
        let reader = BundleReader::open(dir).await?;
        let loaded = FactStore::read_tables(&reader).await.map_err(|e| {
            e.log();
            e
        })?;

        let mut facts = self.facts.write().await;
        facts.replace(loaded);
        self.edges.invalidate_all().await;

        info!(workspace = %self.name, revision = facts.revision(), "Workspace loaded from bundle");
        Ok(reader.metadata().clone())
    }

    /// Clear every fact. The merge log is kept.
    pub async fn reset(&self) {
        let mut facts = self.facts.write().await;
        facts.reset();
        self.edges.invalidate_all().await;
        info!(workspace = %self.name, "Workspace reset");
    }

    pub async fn merge_history(&self) -> Vec<MergeRecord> {
        self.facts.read().await.merge_history().to_vec()
    }
}

/// Apply a merge to a staged copy, derive the affected edge sets from it,
/// then commit. Nothing is committed if any step fails.
fn merge_staged(
    facts: &mut FactStore,
    kind: EntityKind,
    kept_id: EntityId,
    removed_id: EntityId,
    reason: Option<String>,
    actor: Option<String>,
) -> Result<(MergeRecord, Vec<EdgeSet>)> {
    let mut staged = facts.staged();
    let outcome = merge::apply(&mut staged, kind, kept_id, removed_id, reason, actor)?;
    let sets = merge::affected_relations(kind)
        .iter()
        .map(|relation| DerivedEdges::derive(*relation, &staged))
        .collect::<Result<Vec<_>>>()?;

    facts.commit(staged)?;
    Ok((outcome.record, sets))
}

/// Parse node ids and require each to exist
fn validate_ids<R>(facts: &R, layer: Layer, ids: &[String]) -> Result<Vec<NodeKey>>
where
    R: FactReader + ?Sized,
{
    let nations = match layer.entity_kind() {
        None => facts.nations(),
        Some(_) => BTreeSet::new(),
    };

    ids.iter()
        .map(|raw| {
            let key = layer.parse_node(raw)?;
            let exists = match (&key, layer.entity_kind()) {
                (NodeKey::Entity(id), Some(kind)) => facts.contains(kind, *id),
                (NodeKey::Nation(code), None) => nations.contains(code),
                _ => false,
            };
            if exists {
                Ok(key)
            } else {
                Err(AppError::not_found(layer.as_str(), raw.trim()))
            }
        })
        .collect()
}

/// Named, isolated workspaces
#[derive(Debug, Default)]
pub struct WorkspaceRegistry {
    settings: EngineConfig,
    workspaces: RwLock<HashMap<String, Arc<Workspace>>>,
}

impl WorkspaceRegistry {
    pub fn new(settings: EngineConfig) -> Self {
        Self {
            settings,
            workspaces: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get_or_create(&self, name: &str) -> Arc<Workspace> {
        if let Some(workspace) = self.workspaces.read().await.get(name) {
            return Arc::clone(workspace);
        }

        let mut workspaces = self.workspaces.write().await;
        let workspace = workspaces.entry(name.to_string()).or_insert_with(|| {
            info!(workspace = name, "Workspace created");
            Arc::new(Workspace::new(name, self.settings.clone()))
        });
        Arc::clone(workspace)
    }

    pub async fn get(&self, name: &str) -> Option<Arc<Workspace>> {
        self.workspaces.read().await.get(name).cloned()
    }

    /// Workspace names, sorted
    pub async fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.workspaces.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn remove(&self, name: &str) -> bool {
        self.workspaces.write().await.remove(name).is_some()
    }
}
