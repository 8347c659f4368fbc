//! Entity merge steps
//!
//! Folds a duplicate entity into the one being kept. Everything here runs
//! against a staged copy of the fact store; the caller commits it only when
//! every step, and the edge recomputation that follows, has succeeded.

use crate::aggregate::Relation;
use bibnet_common::errors::{AppError, Result};
use bibnet_common::store::models::MergeRecord;
use bibnet_common::store::{FactReader, RepointStats};
use bibnet_common::{EntityId, EntityKind, FactStore};
use tracing::info;

/// What a successful merge changed
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub record: MergeRecord,
    pub repointed: RepointStats,
    pub aliases_moved: usize,
}

/// Persisted relations whose edges depend on entities of `kind`
pub fn affected_relations(kind: EntityKind) -> &'static [Relation] {
    match kind {
        EntityKind::Author => &[Relation::Coauthor],
        EntityKind::Organization => &[Relation::Organization],
        _ => &[],
    }
}

/// Reject a merge before anything is touched
pub fn validate<R>(facts: &R, kind: EntityKind, kept_id: EntityId, removed_id: EntityId) -> Result<()>
where
    R: FactReader + ?Sized,
{
    if !matches!(kind, EntityKind::Author | EntityKind::Organization | EntityKind::Keyword) {
        return Err(AppError::validation(
            "kind",
            format!("{} entities cannot be merged", kind),
        ));
    }
    if kept_id == removed_id {
        return Err(AppError::validation(
            "removed_id",
            format!("cannot merge {} {} into itself", kind, kept_id),
        ));
    }
    for id in [kept_id, removed_id] {
        if !facts.contains(kind, id) {
            return Err(AppError::not_found(kind.as_str(), id));
        }
    }
    Ok(())
}

/// Re-point, collapse, delete and log, in that order
pub fn apply(
    staged: &mut FactStore,
    kind: EntityKind,
    kept_id: EntityId,
    removed_id: EntityId,
    reason: Option<String>,
    actor: Option<String>,
) -> Result<MergeOutcome> {
    validate(&*staged, kind, kept_id, removed_id)?;

    let mut aliases_moved = 0;
    let repointed = match kind {
        EntityKind::Author => {
            let removed_name = staged
                .label(kind, removed_id)
                .ok_or_else(|| AppError::not_found(kind.as_str(), removed_id))?;
            let stats = staged.repoint_author(removed_id, kept_id);
            aliases_moved = staged.move_aliases(removed_id, kept_id, &removed_name);
            stats
        }
        EntityKind::Organization => staged.repoint_organization(removed_id, kept_id),
        EntityKind::Keyword => staged.repoint_keyword(removed_id, kept_id),
        // Rejected by validate
        EntityKind::Work | EntityKind::Venue => RepointStats::default(),
    };

    staged.remove_entity(kind, removed_id);
    staged.check_integrity()?;

    let record = MergeRecord::new(kind, kept_id, removed_id, reason).by(actor);
    staged.append_merge(record.clone());

    info!(
        kind = %kind,
        kept_id,
        removed_id,
        actor = record.actor.as_deref().unwrap_or("unknown"),
        rewritten = repointed.rewritten,
        collapsed = repointed.collapsed,
        aliases_moved,
        "Entities merged"
    );

    Ok(MergeOutcome {
        record,
        repointed,
        aliases_moved,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{author_id, record, store_with, tagged};
    use bibnet_common::store::YearRange;

    fn merged(store: &FactStore, kind: EntityKind, kept: EntityId, removed: EntityId) -> Result<(FactStore, MergeOutcome)> {
        let mut staged = store.staged();
        let outcome = apply(&mut staged, kind, kept, removed, Some("duplicate".into()), Some("curator".into()))?;
        Ok((staged, outcome))
    }

    #[test]
    fn test_merge_conserves_distinct_works() {
        // A on W1, W2; B on W2, W3; B's W2 overlaps A
        let store = store_with(&[
            record("W1", 2020, &["A", "X"]),
            record("W2", 2021, &["A", "B"]),
            record("W3", 2021, &["B", "X"]),
        ]);
        let a = author_id(&store, "A");
        let b = author_id(&store, "B");

        let (after, outcome) = merged(&store, EntityKind::Author, a, b).unwrap();

        assert_eq!(after.works_of_author(a).len(), 3);
        assert!(after.author(b).is_none());
        assert_eq!(outcome.repointed.collapsed, 1);
        assert_eq!(after.work_authors().iter().filter(|row| row.author_id == a).count(), 3);
        assert!(after.work_authors().iter().all(|row| row.author_id != b));
    }

    #[test]
    fn test_merge_moves_aliases() {
        let store = store_with(&[record("W1", 2020, &["Ada Lovelace"]), record("W2", 2021, &["A. Lovelace"])]);
        let kept = author_id(&store, "Ada Lovelace");
        let removed = author_id(&store, "A. Lovelace");

        let (after, outcome) = merged(&store, EntityKind::Author, kept, removed).unwrap();

        assert_eq!(outcome.aliases_moved, 1);
        assert_eq!(after.resolve_author_alias("a. lovelace"), Some(kept));
        assert_eq!(after.merge_history().len(), 1);
        assert_eq!(after.merge_history()[0].reason.as_deref(), Some("duplicate"));
        assert_eq!(after.merge_history()[0].actor.as_deref(), Some("curator"));
    }

    #[test]
    fn test_keyword_merge_collapses_rows() {
        let store = store_with(&[
            tagged(record("W1", 2020, &["A"]), &["graph", "graphs"]),
            tagged(record("W2", 2021, &["A"]), &["graphs"]),
        ]);
        let kept = store.keywords().find(|k| k.term_norm == "graph").unwrap().id;
        let removed = store.keywords().find(|k| k.term_norm == "graphs").unwrap().id;

        let (after, _) = merged(&store, EntityKind::Keyword, kept, removed).unwrap();

        assert_eq!(after.work_keywords().len(), 2);
        let works = after.works_in_range(YearRange::all()).unwrap();
        assert!(works.iter().all(|work| work.keywords == vec![kept]));
    }

    #[test]
    fn test_invalid_merges_rejected() {
        let store = store_with(&[record("W1", 2020, &["A", "B"])]);
        let a = author_id(&store, "A");
        let work = store.works().next().unwrap().id;

        let err = merged(&store, EntityKind::Author, a, a).unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        let err = merged(&store, EntityKind::Author, a, 999).unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));

        // Kind mismatch: a work id is not an author
        let err = merged(&store, EntityKind::Author, a, work).unwrap_err();
        assert!(err.is_client_error());

        let err = merged(&store, EntityKind::Work, work, a).unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[test]
    fn test_affected_relations() {
        assert_eq!(affected_relations(EntityKind::Author), &[Relation::Coauthor]);
        assert_eq!(affected_relations(EntityKind::Organization), &[Relation::Organization]);
        assert!(affected_relations(EntityKind::Keyword).is_empty());
    }
}
