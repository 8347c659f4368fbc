//! Join row re-pointing and duplicate collapsing
//!
//! Re-pointing a removed entity's rows onto the kept entity can produce two
//! rows with the same key (both entities were linked to the same work). Those
//! must collapse into one row, otherwise a work would be counted twice by the
//! edge aggregation.

use super::models::*;
use super::FactStore;
use std::collections::HashMap;
use std::hash::Hash;

/// What a re-point pass changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepointStats {
    /// Rows whose reference was rewritten
    pub rewritten: usize,
    /// Rows dropped as duplicates afterwards
    pub collapsed: usize,
}

/// Keep the first row per key, folding later duplicates into it.
/// Returns the number of rows removed.
fn collapse_by<T, K, F, M>(rows: &mut Vec<T>, key: F, mut fold: M) -> usize
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
    M: FnMut(&mut T, T),
{
    let before = rows.len();
    let mut slots: HashMap<K, usize> = HashMap::with_capacity(before);
    let mut kept: Vec<T> = Vec::with_capacity(before);

    for row in rows.drain(..) {
        let k = key(&row);
        match slots.get(&k).copied() {
            Some(slot) => fold(&mut kept[slot], row),
            None => {
                slots.insert(k, kept.len());
                kept.push(row);
            }
        }
    }

    *rows = kept;
    before - rows.len()
}

/// One row per (work, author): earliest position, corresponding if either was
pub fn collapse_work_authors(rows: &mut Vec<WorkAuthor>) -> usize {
    collapse_by(
        rows,
        |row| (row.work_id, row.author_id),
        |kept, dup| {
            kept.position = kept.position.min(dup.position);
            kept.corresponding |= dup.corresponding;
        },
    )
}

/// One row per (work, author, organization, country)
pub fn collapse_affiliations(rows: &mut Vec<WorkAffiliation>) -> usize {
    collapse_by(
        rows,
        |row| (row.work_id, row.author_id, row.org_id, row.country_code.clone()),
        |kept, dup| {
            if kept.org_label_raw.is_none() {
                kept.org_label_raw = dup.org_label_raw;
            }
        },
    )
}

/// One row per (work, keyword), keeping the strongest score
pub fn collapse_work_keywords(rows: &mut Vec<WorkKeyword>) -> usize {
    collapse_by(
        rows,
        |row| (row.work_id, row.keyword_id),
        |kept, dup| {
            if dup.weight > kept.weight {
                kept.weight = dup.weight;
                kept.extractor = dup.extractor;
            }
        },
    )
}

impl FactStore {
    /// Move every author reference from `from` to `to`
    pub fn repoint_author(&mut self, from: EntityId, to: EntityId) -> RepointStats {
        let mut stats = RepointStats::default();

        for row in self.work_authors.iter_mut().filter(|row| row.author_id == from) {
            row.author_id = to;
            stats.rewritten += 1;
        }
        for row in self
            .work_affiliations
            .iter_mut()
            .filter(|row| row.author_id == Some(from))
        {
            row.author_id = Some(to);
            stats.rewritten += 1;
        }

        stats.collapsed += collapse_work_authors(&mut self.work_authors);
        stats.collapsed += collapse_affiliations(&mut self.work_affiliations);
        stats
    }

    /// Move every organization reference from `from` to `to`
    pub fn repoint_organization(&mut self, from: EntityId, to: EntityId) -> RepointStats {
        let mut stats = RepointStats::default();

        for row in self
            .work_affiliations
            .iter_mut()
            .filter(|row| row.org_id == Some(from))
        {
            row.org_id = Some(to);
            stats.rewritten += 1;
        }

        stats.collapsed += collapse_affiliations(&mut self.work_affiliations);
        stats
    }

    /// Move every keyword reference from `from` to `to`
    pub fn repoint_keyword(&mut self, from: EntityId, to: EntityId) -> RepointStats {
        let mut stats = RepointStats::default();

        for row in self.work_keywords.iter_mut().filter(|row| row.keyword_id == from) {
            row.keyword_id = to;
            stats.rewritten += 1;
        }

        stats.collapsed += collapse_work_keywords(&mut self.work_keywords);
        stats
    }

    /// Hand the removed author's aliases, and its display name, to the kept
    /// author so later ingestion of either spelling resolves to `to`
    pub fn move_aliases(&mut self, from: EntityId, to: EntityId, removed_name: &str) -> usize {
        let mut moved = 0;
        for alias in self.aliases.iter_mut().filter(|a| a.author_id == from) {
            alias.author_id = to;
            moved += 1;
        }

        let already_known = self
            .aliases
            .iter()
            .any(|a| a.author_id == to && a.raw_name == removed_name);
        if !already_known {
            self.aliases.push(AuthorAlias {
                author_id: to,
                raw_name: removed_name.to_string(),
                source: "merge".to_string(),
                confidence: 1.0,
            });
        }

        // A shared spelling now appears twice for the kept author
        let mut seen = std::collections::HashSet::new();
        self.aliases
            .retain(|a| a.author_id != to || seen.insert(super::normalize_name(&a.raw_name)));

        moved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wa(work_id: EntityId, author_id: EntityId, position: u32) -> WorkAuthor {
        WorkAuthor {
            work_id,
            author_id,
            position,
            corresponding: false,
        }
    }

    fn aff(work_id: EntityId, author_id: EntityId, org_id: EntityId, country: &str) -> WorkAffiliation {
        WorkAffiliation {
            work_id,
            author_id: Some(author_id),
            org_id: Some(org_id),
            org_label_raw: None,
            country_code: Some(country.to_string()),
        }
    }

    #[test]
    fn test_collapse_work_authors_keeps_first_and_min_position() {
        let mut rows = vec![wa(1, 10, 3), wa(2, 10, 0), wa(1, 10, 1), wa(1, 11, 2)];
        let removed = collapse_work_authors(&mut rows);

        assert_eq!(removed, 1);
        assert_eq!(rows, vec![wa(1, 10, 1), wa(2, 10, 0), wa(1, 11, 2)]);
    }

    #[test]
    fn test_collapse_affiliations_exact_key() {
        let mut rows = vec![aff(1, 10, 5, "US"), aff(1, 10, 5, "US"), aff(1, 10, 6, "US")];
        assert_eq!(collapse_affiliations(&mut rows), 1);
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_collapse_keywords_keeps_max_weight() {
        let mut rows = vec![
            WorkKeyword { work_id: 1, keyword_id: 7, weight: 0.2, extractor: None },
            WorkKeyword { work_id: 1, keyword_id: 7, weight: 0.9, extractor: Some("manual".into()) },
        ];
        assert_eq!(collapse_work_keywords(&mut rows), 1);
        assert_eq!(rows[0].weight, 0.9);
        assert_eq!(rows[0].extractor.as_deref(), Some("manual"));
    }

    #[test]
    fn test_repoint_author_collapses_shared_work() {
        let mut store = FactStore::new();
        store.work_authors = vec![wa(1, 10, 0), wa(1, 20, 1), wa(2, 20, 0)];
        store.work_affiliations = vec![aff(1, 10, 5, "US"), aff(1, 20, 5, "US")];

        let stats = store.repoint_author(20, 10);

        assert_eq!(stats.rewritten, 3);
        assert_eq!(stats.collapsed, 2);
        assert_eq!(store.work_authors, vec![wa(1, 10, 0), wa(2, 10, 0)]);
        assert_eq!(store.work_affiliations.len(), 1);
    }

    #[test]
    fn test_move_aliases_adds_removed_name_once() {
        let mut store = FactStore::new();
        store.aliases = vec![
            AuthorAlias { author_id: 1, raw_name: "Ada".into(), source: "ingest".into(), confidence: 0.9 },
            AuthorAlias { author_id: 2, raw_name: "A. Lovelace".into(), source: "ingest".into(), confidence: 0.9 },
        ];

        let moved = store.move_aliases(2, 1, "A. Lovelace");

        assert_eq!(moved, 1);
        assert_eq!(store.aliases.len(), 2);
        assert!(store.aliases.iter().all(|a| a.author_id == 1));
    }
}
