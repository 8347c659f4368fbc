//! In-memory fact store for Bibnet
//!
//! Holds the normalized bibliographic fact base:
//! - Entity tables (works, authors, organizations, venues, keywords)
//! - Join rows (work-author, work-affiliation, work-keyword)
//! - The append-only merge log
//!
//! Mutations are applied to a staged copy and committed atomically, so a
//! reader holding `&FactStore` never observes a half-applied batch.

pub mod bundle;
mod ingest;
mod links;
pub mod models;

pub use ingest::{
    normalize_country, normalize_doi, normalize_name, AuthorshipRecord, InstitutionRecord,
    KeywordRecord, UpsertOutcome, VenueRecord, WorkRecord,
};
pub use links::{collapse_affiliations, collapse_work_authors, collapse_work_keywords, RepointStats};

use crate::errors::{AppError, Result};
use models::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Inclusive publication year window. An open bound accepts any year.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub min: Option<i32>,
    pub max: Option<i32>,
}

impl YearRange {
    pub fn new(min: Option<i32>, max: Option<i32>) -> Result<Self> {
        if let (Some(lo), Some(hi)) = (min, max) {
            if lo > hi {
                return Err(AppError::validation(
                    "year_min",
                    format!("year_min {} is after year_max {}", lo, hi),
                ));
            }
        }
        Ok(Self { min, max })
    }

    /// Window with no bounds
    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    /// Undated works only fall inside an unbounded window
    pub fn contains(&self, year: Option<i32>) -> bool {
        match year {
            None => self.is_unbounded(),
            Some(y) => self.min.map_or(true, |lo| y >= lo) && self.max.map_or(true, |hi| y <= hi),
        }
    }
}

/// (author, organization, country) tuple of one affiliation row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffiliationFact {
    pub author_id: Option<EntityId>,
    pub org_id: Option<EntityId>,
    pub country_code: Option<String>,
}

/// Everything the aggregation layer needs to know about one work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkFacts {
    pub work_id: EntityId,
    pub year: Option<i32>,
    /// Distinct, sorted
    pub authors: Vec<EntityId>,
    pub affiliations: Vec<AffiliationFact>,
    /// Distinct, sorted
    pub keywords: Vec<EntityId>,
}

/// Read contract consumed by the aggregation engine
pub trait FactReader {
    /// Revision of the committed state; changes on every mutation
    fn revision(&self) -> u64;

    /// Works inside the window with their linked facts, ordered by work id
    fn works_in_range(&self, range: YearRange) -> Result<Vec<WorkFacts>>;

    fn contains(&self, kind: EntityKind, id: EntityId) -> bool;

    /// Human readable label for an entity
    fn label(&self, kind: EntityKind, id: EntityId) -> Option<String>;

    /// Every country code observed on an affiliation
    fn nations(&self) -> BTreeSet<String>;

    /// Canonical author for a raw name, via normalized name or alias
    fn resolve_author_alias(&self, name: &str) -> Option<EntityId>;
}

/// Normalized fact base of one workspace
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FactStore {
    pub(crate) works: BTreeMap<EntityId, Work>,
    pub(crate) authors: BTreeMap<EntityId, Author>,
    pub(crate) aliases: Vec<AuthorAlias>,
    pub(crate) organizations: BTreeMap<EntityId, Organization>,
    pub(crate) venues: BTreeMap<EntityId, Venue>,
    pub(crate) keywords: BTreeMap<EntityId, Keyword>,
    pub(crate) work_authors: Vec<WorkAuthor>,
    pub(crate) work_affiliations: Vec<WorkAffiliation>,
    pub(crate) work_keywords: Vec<WorkKeyword>,
    pub(crate) merges: Vec<MergeRecord>,
    next_id: EntityId,
    revision: u64,
}

impl FactStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn allocate_id(&mut self) -> EntityId {
        self.next_id += 1;
        self.next_id
    }

    /// Re-seed the id sequence after tables were loaded wholesale. Ids named
    /// by the merge log count as taken even when their rows are gone.
    pub(crate) fn reseed_ids(&mut self) {
        self.next_id = self
            .works
            .keys()
            .chain(self.authors.keys())
            .chain(self.organizations.keys())
            .chain(self.venues.keys())
            .chain(self.keywords.keys())
            .copied()
            .chain(self.merges.iter().flat_map(|merge| [merge.kept_id, merge.removed_id]))
            .max()
            .unwrap_or(0);
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Copy of the store stamped with the next revision. Mutate it, then
    /// hand it back to `commit`; dropping it discards every change.
    pub fn staged(&self) -> FactStore {
        let mut staged = self.clone();
        staged.revision = self.revision + 1;
        staged
    }

    /// Swap in a staged copy after verifying referential integrity
    pub fn commit(&mut self, staged: FactStore) -> Result<()> {
        if staged.revision != self.revision + 1 {
            return Err(AppError::Internal {
                message: format!(
                    "stale staged state: revision {} cannot follow {}",
                    staged.revision, self.revision
                ),
            });
        }
        staged.check_integrity()?;
        *self = staged;
        Ok(())
    }

    /// Run `f` against a staged copy and commit only if everything succeeds
    pub fn transaction<T>(&mut self, f: impl FnOnce(&mut FactStore) -> Result<T>) -> Result<T> {
        let mut staged = self.staged();
        let out = f(&mut staged)?;
        self.commit(staged)?;
        Ok(out)
    }

    /// Drop every entity and join row. The merge log survives, and so does
    /// the id sequence, so new entities never take an id the log names.
    pub fn reset(&mut self) {
        let merges = std::mem::take(&mut self.merges);
        *self = FactStore {
            merges,
            next_id: self.next_id,
            revision: self.revision + 1,
            ..FactStore::default()
        };
    }

    /// Take over the contents of a store loaded elsewhere. The revision keeps
    /// counting from ours so derived state stamped earlier is never reused.
    /// Merge logs are unioned by record id, oldest first.
    pub fn replace(&mut self, mut loaded: FactStore) {
        let revision = self.revision.max(loaded.revision) + 1;
        let next_id = self.next_id.max(loaded.next_id);

        let mut merges = std::mem::take(&mut self.merges);
        let known: HashSet<_> = merges.iter().map(|merge| merge.id).collect();
        merges.extend(
            std::mem::take(&mut loaded.merges)
                .into_iter()
                .filter(|merge| !known.contains(&merge.id)),
        );
        merges.sort_by(|x, y| x.created_at.cmp(&y.created_at).then_with(|| x.id.cmp(&y.id)));

        *self = FactStore {
            merges,
            next_id,
            revision,
            ..loaded
        };
    }

    /// Verify that every join row references existing rows and that join
    /// keys are unique where the schema requires it
    pub fn check_integrity(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for row in &self.work_authors {
            self.require(EntityKind::Work, row.work_id, "work_authors")?;
            self.require(EntityKind::Author, row.author_id, "work_authors")?;
            if !seen.insert((row.work_id, row.author_id)) {
                return Err(AppError::consistency(format!(
                    "work_authors holds duplicate row for work {} and author {}",
                    row.work_id, row.author_id
                )));
            }
        }

        for row in &self.work_affiliations {
            self.require(EntityKind::Work, row.work_id, "work_affiliations")?;
            if let Some(author_id) = row.author_id {
                self.require(EntityKind::Author, author_id, "work_affiliations")?;
            }
            if let Some(org_id) = row.org_id {
                self.require(EntityKind::Organization, org_id, "work_affiliations")?;
            }
        }

        seen.clear();
        for row in &self.work_keywords {
            self.require(EntityKind::Work, row.work_id, "work_keywords")?;
            self.require(EntityKind::Keyword, row.keyword_id, "work_keywords")?;
            if !seen.insert((row.work_id, row.keyword_id)) {
                return Err(AppError::consistency(format!(
                    "work_keywords holds duplicate row for work {} and keyword {}",
                    row.work_id, row.keyword_id
                )));
            }
        }

        for alias in &self.aliases {
            self.require(EntityKind::Author, alias.author_id, "author_aliases")?;
        }

        for work in self.works.values() {
            if let Some(venue_id) = work.venue_id {
                self.require(EntityKind::Venue, venue_id, "works")?;
            }
        }

        Ok(())
    }

    fn require(&self, kind: EntityKind, id: EntityId, table: &str) -> Result<()> {
        if self.contains(kind, id) {
            Ok(())
        } else {
            Err(AppError::consistency(format!(
                "{} row references missing {} {}",
                table, kind, id
            )))
        }
    }

    // ========================================================================
    // Table access
    // ========================================================================

    pub fn works(&self) -> impl Iterator<Item = &Work> {
        self.works.values()
    }

    pub fn authors(&self) -> impl Iterator<Item = &Author> {
        self.authors.values()
    }

    pub fn organizations(&self) -> impl Iterator<Item = &Organization> {
        self.organizations.values()
    }

    pub fn venues(&self) -> impl Iterator<Item = &Venue> {
        self.venues.values()
    }

    pub fn keywords(&self) -> impl Iterator<Item = &Keyword> {
        self.keywords.values()
    }

    pub fn aliases(&self) -> &[AuthorAlias] {
        &self.aliases
    }

    pub fn work_authors(&self) -> &[WorkAuthor] {
        &self.work_authors
    }

    pub fn work_affiliations(&self) -> &[WorkAffiliation] {
        &self.work_affiliations
    }

    pub fn work_keywords(&self) -> &[WorkKeyword] {
        &self.work_keywords
    }

    pub fn work(&self, id: EntityId) -> Option<&Work> {
        self.works.get(&id)
    }

    pub fn author(&self, id: EntityId) -> Option<&Author> {
        self.authors.get(&id)
    }

    pub fn organization(&self, id: EntityId) -> Option<&Organization> {
        self.organizations.get(&id)
    }

    pub fn keyword(&self, id: EntityId) -> Option<&Keyword> {
        self.keywords.get(&id)
    }

    /// Merge audit trail, oldest first
    pub fn merge_history(&self) -> &[MergeRecord] {
        &self.merges
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Work => self.works.len(),
            EntityKind::Author => self.authors.len(),
            EntityKind::Organization => self.organizations.len(),
            EntityKind::Venue => self.venues.len(),
            EntityKind::Keyword => self.keywords.len(),
        }
    }

    /// Distinct works an author is linked to
    pub fn works_of_author(&self, author_id: EntityId) -> BTreeSet<EntityId> {
        self.work_authors
            .iter()
            .filter(|row| row.author_id == author_id)
            .map(|row| row.work_id)
            .collect()
    }

    // ========================================================================
    // Entity removal (merges only)
    // ========================================================================

    /// Delete an entity row. Callers re-point join rows first.
    pub fn remove_entity(&mut self, kind: EntityKind, id: EntityId) -> bool {
        match kind {
            EntityKind::Work => self.works.remove(&id).is_some(),
            EntityKind::Author => self.authors.remove(&id).is_some(),
            EntityKind::Organization => self.organizations.remove(&id).is_some(),
            EntityKind::Venue => self.venues.remove(&id).is_some(),
            EntityKind::Keyword => self.keywords.remove(&id).is_some(),
        }
    }

    pub fn append_merge(&mut self, record: MergeRecord) {
        self.merges.push(record);
    }
}

impl FactReader for FactStore {
    fn revision(&self) -> u64 {
        self.revision
    }

    fn works_in_range(&self, range: YearRange) -> Result<Vec<WorkFacts>> {
        let mut index: BTreeMap<EntityId, WorkFacts> = self
            .works
            .values()
            .filter(|w| range.contains(w.year))
            .map(|w| {
                (
                    w.id,
                    WorkFacts {
                        work_id: w.id,
                        year: w.year,
                        authors: Vec::new(),
                        affiliations: Vec::new(),
                        keywords: Vec::new(),
                    },
                )
            })
            .collect();

        for row in &self.work_authors {
            self.require(EntityKind::Work, row.work_id, "work_authors")?;
            self.require(EntityKind::Author, row.author_id, "work_authors")?;
            if let Some(facts) = index.get_mut(&row.work_id) {
                facts.authors.push(row.author_id);
            }
        }

        for row in &self.work_affiliations {
            self.require(EntityKind::Work, row.work_id, "work_affiliations")?;
            if let Some(org_id) = row.org_id {
                self.require(EntityKind::Organization, org_id, "work_affiliations")?;
            }
            if let Some(facts) = index.get_mut(&row.work_id) {
                facts.affiliations.push(AffiliationFact {
                    author_id: row.author_id,
                    org_id: row.org_id,
                    country_code: row.country_code.clone(),
                });
            }
        }

        for row in &self.work_keywords {
            self.require(EntityKind::Work, row.work_id, "work_keywords")?;
            self.require(EntityKind::Keyword, row.keyword_id, "work_keywords")?;
            if let Some(facts) = index.get_mut(&row.work_id) {
                facts.keywords.push(row.keyword_id);
            }
        }

        Ok(index
            .into_values()
            .map(|mut facts| {
                facts.authors.sort_unstable();
                facts.authors.dedup();
                facts.keywords.sort_unstable();
                facts.keywords.dedup();
                facts
            })
            .collect())
    }

    fn contains(&self, kind: EntityKind, id: EntityId) -> bool {
        match kind {
            EntityKind::Work => self.works.contains_key(&id),
            EntityKind::Author => self.authors.contains_key(&id),
            EntityKind::Organization => self.organizations.contains_key(&id),
            EntityKind::Venue => self.venues.contains_key(&id),
            EntityKind::Keyword => self.keywords.contains_key(&id),
        }
    }

    fn label(&self, kind: EntityKind, id: EntityId) -> Option<String> {
        match kind {
            EntityKind::Work => self.works.get(&id).map(|w| w.title.clone()),
            EntityKind::Author => self.authors.get(&id).map(|a| a.display_name.clone()),
            EntityKind::Organization => self.organizations.get(&id).map(|o| o.name.clone()),
            EntityKind::Venue => self.venues.get(&id).map(|v| v.name.clone()),
            EntityKind::Keyword => self.keywords.get(&id).map(|k| k.term_display.clone()),
        }
    }

    fn nations(&self) -> BTreeSet<String> {
        self.work_affiliations
            .iter()
            .filter_map(|row| row.country_code.clone())
            .collect()
    }

    fn resolve_author_alias(&self, name: &str) -> Option<EntityId> {
        let key = normalize_name(name);
        if key.is_empty() {
            return None;
        }

        self.authors
            .values()
            .find(|a| a.normalized_name == key)
            .map(|a| a.id)
            .or_else(|| {
                self.aliases
                    .iter()
                    .find(|alias| normalize_name(&alias.raw_name) == key)
                    .map(|alias| alias.author_id)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str, year: i32, authors: &[&str]) -> WorkRecord {
        WorkRecord {
            title: title.to_string(),
            year: Some(year),
            authorships: authors
                .iter()
                .map(|name| AuthorshipRecord {
                    display_name: name.to_string(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_year_range_bounds() {
        let range = YearRange::new(Some(2020), Some(2021)).unwrap();
        assert!(range.contains(Some(2020)));
        assert!(range.contains(Some(2021)));
        assert!(!range.contains(Some(2019)));
        assert!(!range.contains(None));
        assert!(YearRange::all().contains(None));
        assert!(YearRange::new(Some(2022), Some(2021)).is_err());
    }

    #[test]
    fn test_works_in_range_filters_and_dedups() {
        let mut store = FactStore::new();
        store.upsert_work(&record("W1", 2020, &["Ada", "Bob"])).unwrap();
        store.upsert_work(&record("W2", 2021, &["Ada", "Cy"])).unwrap();

        let all = store.works_in_range(YearRange::all()).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].authors.len(), 2);

        let late = store.works_in_range(YearRange::new(Some(2021), None).unwrap()).unwrap();
        assert_eq!(late.len(), 1);
        assert_eq!(late[0].year, Some(2021));
    }

    #[test]
    fn test_dangling_join_row_is_consistency_error() {
        let mut store = FactStore::new();
        store.upsert_work(&record("W1", 2020, &["Ada"])).unwrap();
        store.work_authors.push(WorkAuthor {
            work_id: 999,
            author_id: 1,
            position: 0,
            corresponding: false,
        });

        let err = store.works_in_range(YearRange::all()).unwrap_err();
        assert!(matches!(err, AppError::Consistency { .. }));
        assert!(store.check_integrity().is_err());
    }

    #[test]
    fn test_transaction_discards_on_error() {
        let mut store = FactStore::new();
        store.upsert_work(&record("W1", 2020, &["Ada"])).unwrap();
        let before = store.clone();

        let result: Result<()> = store.transaction(|staged| {
            staged.upsert_work(&record("W2", 2021, &["Bob"]))?;
            Err(AppError::validation("test", "abort"))
        });

        assert!(result.is_err());
        assert_eq!(store, before);
    }

    #[test]
    fn test_commit_bumps_revision() {
        let mut store = FactStore::new();
        let start = store.revision();
        store
            .transaction(|staged| staged.upsert_work(&record("W1", 2020, &["Ada"])))
            .unwrap();
        assert_eq!(store.revision(), start + 1);

        let stale = store.staged();
        store.transaction(|_| Ok(())).unwrap();
        assert!(store.commit(stale).is_err());
    }

    #[test]
    fn test_replace_advances_revision() {
        let mut store = FactStore::new();
        store.transaction(|staged| staged.upsert_work(&record("W1", 2020, &["Ada"]))).unwrap();
        let before = store.revision();

        let mut loaded = FactStore::new();
        loaded.upsert_work(&record("W2", 2021, &["Bob"])).unwrap();
        store.replace(loaded);

        assert!(store.revision() > before);
        assert_eq!(store.works().next().unwrap().title, "W2");
    }

    #[test]
    fn test_reset_keeps_merge_log() {
        let mut store = FactStore::new();
        store.upsert_work(&record("W1", 2020, &["Ada"])).unwrap();
        store.append_merge(MergeRecord::new(EntityKind::Author, 1, 2, None));
        store.reset();

        assert_eq!(store.count(EntityKind::Work), 0);
        assert_eq!(store.count(EntityKind::Author), 0);
        assert_eq!(store.merge_history().len(), 1);
    }

    fn highest_logged_id(store: &FactStore) -> EntityId {
        store
            .merge_history()
            .iter()
            .flat_map(|merge| [merge.kept_id, merge.removed_id])
            .max()
            .unwrap()
    }

    #[test]
    fn test_reset_never_reuses_logged_ids() {
        let mut store = FactStore::new();
        store.upsert_work(&record("W1", 2020, &["Ada", "Bob"])).unwrap();
        store.upsert_work(&record("W2", 2021, &["Ada", "Cy"])).unwrap();
        let ada = store.resolve_author_alias("Ada").unwrap();
        let cy = store.resolve_author_alias("Cy").unwrap();
        store.append_merge(MergeRecord::new(EntityKind::Author, ada, cy, None));

        store.reset();
        store.upsert_work(&record("W3", 2022, &["Zed", "Yan"])).unwrap();

        let logged = highest_logged_id(&store);
        let fresh: Vec<EntityId> = store
            .works()
            .map(|w| w.id)
            .chain(store.authors().map(|a| a.id))
            .collect();
        assert!(fresh.iter().all(|id| *id > logged));
    }

    #[test]
    fn test_replace_unions_merge_logs() {
        let mut store = FactStore::new();
        store.upsert_work(&record("W1", 2020, &["Ada", "Bob"])).unwrap();
        let local = MergeRecord::new(EntityKind::Author, 2, 3, Some("local".into()));
        store.append_merge(local.clone());

        let mut loaded = FactStore::new();
        loaded.upsert_work(&record("W2", 2021, &["Cy"])).unwrap();
        let imported = MergeRecord::new(EntityKind::Author, 40, 41, Some("imported".into()));
        loaded.append_merge(imported.clone());
        loaded.append_merge(local.clone());
        loaded.reseed_ids();

        store.replace(loaded);

        let ids: Vec<_> = store.merge_history().iter().map(|merge| merge.id).collect();
        assert_eq!(ids, vec![local.id, imported.id]);
        assert_eq!(store.works().next().unwrap().title, "W2");

        store.upsert_work(&record("W3", 2022, &["Di"])).unwrap();
        let di = store.resolve_author_alias("Di").unwrap();
        assert!(di > highest_logged_id(&store));
    }

    #[test]
    fn test_replace_keeps_log_when_bundle_has_none() {
        let mut store = FactStore::new();
        store.upsert_work(&record("W1", 2020, &["Ada", "Bob"])).unwrap();
        store.append_merge(MergeRecord::new(EntityKind::Author, 2, 3, None));

        store.replace(FactStore::new());

        assert_eq!(store.merge_history().len(), 1);
        assert_eq!(store.count(EntityKind::Work), 0);
    }
}
