//! Per-workspace derived edge cache
//!
//! One slot per persisted relation. A slot holds the last edge set derived
//! for that relation, stamped with the fact revision it was computed from.
//! The slot mutex serializes recomputation, so concurrent readers asking
//! for the same stale relation wait for a single derivation.

use super::{EdgeSet, Relation};
use bibnet_common::errors::{AppError, Result};
use bibnet_common::metrics::{record_edge_cache, record_edge_recompute};
use bibnet_common::store::{FactReader, YearRange};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info};

type Slot = Mutex<Option<Arc<EdgeSet>>>;

#[derive(Debug, Default)]
pub struct DerivedEdges {
    coauthor: Slot,
    organization: Slot,
    nation: Slot,
}

impl DerivedEdges {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, relation: Relation) -> Result<&Slot> {
        match relation {
            Relation::Coauthor => Ok(&self.coauthor),
            Relation::Organization => Ok(&self.organization),
            Relation::Nation => Ok(&self.nation),
            Relation::Keyword => Err(AppError::validation(
                "relation",
                "keyword co-occurrence is derived per request and has no stored edge set",
            )),
        }
    }

    /// Derive a fresh edge set from the whole fact base
    pub fn derive<R>(relation: Relation, facts: &R) -> Result<EdgeSet>
    where
        R: FactReader + ?Sized,
    {
        let start = Instant::now();
        let works = facts.works_in_range(YearRange::all())?;
        let set = EdgeSet::derive(relation, facts.revision(), &works);

        record_edge_recompute(relation.as_str(), start.elapsed().as_secs_f64(), set.len());
        info!(
            relation = %relation,
            revision = set.revision,
            works = works.len(),
            edges = set.len(),
            "Edge set recomputed"
        );
        Ok(set)
    }

    /// Edge set matching the current revision of `facts`, recomputed first
    /// when the slot is empty or stale
    pub async fn current<R>(&self, relation: Relation, facts: &R) -> Result<Arc<EdgeSet>>
    where
        R: FactReader + ?Sized,
    {
        let mut slot = self.slot(relation)?.lock().await;

        if let Some(set) = slot.as_ref().filter(|set| set.revision == facts.revision()) {
            record_edge_cache(true, relation.as_str());
            debug!(relation = %relation, revision = set.revision, "Edge cache hit");
            return Ok(Arc::clone(set));
        }

        record_edge_cache(false, relation.as_str());
        let set = Arc::new(Self::derive(relation, facts)?);
        *slot = Some(Arc::clone(&set));
        Ok(set)
    }

    /// Replace the stored set unconditionally
    pub async fn recompute<R>(&self, relation: Relation, facts: &R) -> Result<Arc<EdgeSet>>
    where
        R: FactReader + ?Sized,
    {
        let mut slot = self.slot(relation)?.lock().await;
        let set = Arc::new(Self::derive(relation, facts)?);
        *slot = Some(Arc::clone(&set));
        Ok(set)
    }

    /// Store a set derived elsewhere, such as inside a merge
    pub async fn install(&self, set: EdgeSet) -> Result<()> {
        let mut slot = self.slot(set.relation)?.lock().await;
        *slot = Some(Arc::new(set));
        Ok(())
    }

    /// Stored set without any freshness check
    pub async fn cached(&self, relation: Relation) -> Option<Arc<EdgeSet>> {
        let slot = self.slot(relation).ok()?.lock().await;
        slot.clone()
    }

    pub async fn invalidate(&self, relation: Relation) -> Result<()> {
        self.slot(relation)?.lock().await.take();
        Ok(())
    }

    pub async fn invalidate_all(&self) {
        for relation in Relation::PERSISTED {
            // Persisted relations always have a slot
            let _ = self.invalidate(relation).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{record, store_with, three_works};
    use bibnet_common::FactStore;

    #[tokio::test]
    async fn test_current_reuses_fresh_set() {
        let store = store_with(&three_works());
        let edges = DerivedEdges::new();

        let first = edges.current(Relation::Coauthor, &store).await.unwrap();
        let second = edges.current(Relation::Coauthor, &store).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_stale_revision_forces_recompute() {
        let mut store = store_with(&three_works());
        let edges = DerivedEdges::new();

        let before = edges.current(Relation::Coauthor, &store).await.unwrap();
        store
            .transaction(|staged| staged.upsert_work(&record("W4", 2022, &["A", "D"])))
            .unwrap();
        let after = edges.current(Relation::Coauthor, &store).await.unwrap();

        assert_eq!(before.len(), 3);
        assert_eq!(after.len(), 4);
        assert_eq!(after.revision, store.revision());
    }

    #[tokio::test]
    async fn test_recompute_is_idempotent() {
        let store = store_with(&three_works());
        let edges = DerivedEdges::new();

        for relation in Relation::PERSISTED {
            let first = edges.recompute(relation, &store).await.unwrap();
            let second = edges.recompute(relation, &store).await.unwrap();
            assert_eq!(*first, *second);

            let bytes = |set: &EdgeSet| serde_json::to_vec(&set.rows()).unwrap();
            assert_eq!(bytes(&first), bytes(&second));
        }
    }

    #[tokio::test]
    async fn test_keyword_has_no_slot() {
        let edges = DerivedEdges::new();
        let store = FactStore::new();

        let err = edges.recompute(Relation::Keyword, &store).await.unwrap_err();
        assert!(err.is_client_error());
        assert!(edges.cached(Relation::Keyword).await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_clears_slot() {
        let store = store_with(&three_works());
        let edges = DerivedEdges::new();

        edges.recompute(Relation::Coauthor, &store).await.unwrap();
        edges.invalidate_all().await;
        assert!(edges.cached(Relation::Coauthor).await.is_none());
    }

    #[tokio::test]
    async fn test_independent_caches() {
        let small = store_with(&three_works());
        let empty = FactStore::new();
        let left = DerivedEdges::new();
        let right = DerivedEdges::new();

        left.recompute(Relation::Coauthor, &small).await.unwrap();
        right.recompute(Relation::Coauthor, &empty).await.unwrap();

        assert_eq!(left.cached(Relation::Coauthor).await.unwrap().len(), 3);
        assert!(right.cached(Relation::Coauthor).await.unwrap().is_empty());
    }
}
