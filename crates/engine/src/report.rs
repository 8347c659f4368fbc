//! Dataset report
//!
//! Summary statistics over the whole fact base: counts, year span, output
//! per year and the most prominent authors, keywords, countries and
//! collaborations.

use crate::aggregate::{EdgeSet, NodeKey};
use bibnet_common::errors::{AppError, Result};
use bibnet_common::store::FactReader;
use bibnet_common::{EntityId, EntityKind, FactStore};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

const TOP_AUTHORS: usize = 20;
const TOP_KEYWORDS: usize = 20;
const TOP_COUNTRIES: usize = 20;
const TOP_COLLABORATIONS: usize = 15;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetCounts {
    pub works: usize,
    pub authors: usize,
    pub organizations: usize,
    pub keywords: usize,
    pub venues: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearCount {
    pub year: i32,
    pub works: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub label: String,
    pub works: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collaboration {
    pub a: String,
    pub b: String,
    pub weight: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub counts: DatasetCounts,
    pub year_min: Option<i32>,
    pub year_max: Option<i32>,
    pub publications_per_year: Vec<YearCount>,
    pub top_authors: Vec<RankedEntry>,
    pub top_keywords: Vec<RankedEntry>,
    pub top_countries: Vec<RankedEntry>,
    pub top_collaborations: Vec<Collaboration>,
}

/// Most works first; ties keep key order
fn ranked<K: Ord + Clone>(works: BTreeMap<K, BTreeSet<EntityId>>, limit: usize) -> Vec<(K, usize)> {
    let mut ranked: Vec<(K, usize)> = works.into_iter().map(|(key, set)| (key, set.len())).collect();
    ranked.sort_by(|x, y| y.1.cmp(&x.1).then_with(|| x.0.cmp(&y.0)));
    ranked.truncate(limit);
    ranked
}

fn entity_label(store: &FactStore, kind: EntityKind, id: EntityId) -> Result<String> {
    store
        .label(kind, id)
        .ok_or_else(|| AppError::consistency(format!("{} {} has no entity row", kind, id)))
}

/// Build the report from a fact store and its current co-author edges
pub fn build(store: &FactStore, coauthor: &EdgeSet) -> Result<Report> {
    let counts = DatasetCounts {
        works: store.count(EntityKind::Work),
        authors: store.count(EntityKind::Author),
        organizations: store.count(EntityKind::Organization),
        keywords: store.count(EntityKind::Keyword),
        venues: store.count(EntityKind::Venue),
    };

    let mut per_year: BTreeMap<i32, usize> = BTreeMap::new();
    for year in store.works().filter_map(|work| work.year) {
        *per_year.entry(year).or_insert(0) += 1;
    }

    let mut author_works: BTreeMap<EntityId, BTreeSet<EntityId>> = BTreeMap::new();
    for row in store.work_authors() {
        author_works.entry(row.author_id).or_default().insert(row.work_id);
    }

    let mut keyword_works: BTreeMap<EntityId, BTreeSet<EntityId>> = BTreeMap::new();
    for row in store.work_keywords() {
        keyword_works.entry(row.keyword_id).or_default().insert(row.work_id);
    }

    let mut country_works: BTreeMap<String, BTreeSet<EntityId>> = BTreeMap::new();
    for row in store.work_affiliations() {
        if let Some(code) = &row.country_code {
            country_works.entry(code.clone()).or_default().insert(row.work_id);
        }
    }

    let top_authors = ranked(author_works, TOP_AUTHORS)
        .into_iter()
        .map(|(id, works)| {
            Ok(RankedEntry {
                label: entity_label(store, EntityKind::Author, id)?,
                works,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let top_keywords = ranked(keyword_works, TOP_KEYWORDS)
        .into_iter()
        .map(|(id, works)| {
            Ok(RankedEntry {
                label: entity_label(store, EntityKind::Keyword, id)?,
                works,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let top_countries = ranked(country_works, TOP_COUNTRIES)
        .into_iter()
        .map(|(label, works)| RankedEntry { label, works })
        .collect();

    let mut strongest: Vec<_> = coauthor.edges.iter().collect();
    strongest.sort_by(|x, y| y.weight.cmp(&x.weight).then_with(|| (&x.a, &x.b).cmp(&(&y.a, &y.b))));
    let top_collaborations = strongest
        .into_iter()
        .take(TOP_COLLABORATIONS)
        .map(|edge| {
            let name = |key: &NodeKey| match key.entity_id() {
                Some(id) => entity_label(store, EntityKind::Author, id),
                None => Err(AppError::Internal {
                    message: format!("co-author edge endpoint {} is not an author", key),
                }),
            };
            Ok(Collaboration {
                a: name(&edge.a)?,
                b: name(&edge.b)?,
                weight: edge.weight,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Report {
        counts,
        year_min: per_year.keys().next().copied(),
        year_max: per_year.keys().next_back().copied(),
        publications_per_year: per_year
            .into_iter()
            .map(|(year, works)| YearCount { year, works })
            .collect(),
        top_authors,
        top_keywords,
        top_countries,
        top_collaborations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Relation;
    use crate::test_support::{affiliated, record, store_with, tagged};
    use bibnet_common::store::{WorkRecord, YearRange};

    #[test]
    fn test_report_sections() {
        let store = store_with(&[
            tagged(record("W1", 2020, &["Ada", "Bob"]), &["graphs"]),
            tagged(record("W2", 2021, &["Ada", "Bob"]), &["graphs", "rust"]),
            WorkRecord {
                authorships: vec![affiliated("Ada", "MIT", "US"), affiliated("Cy", "ETH", "CH")],
                ..record("W3", 2021, &[])
            },
            WorkRecord { year: None, ..record("W4", 2000, &["Di"]) },
        ]);
        let works = store.works_in_range(YearRange::all()).unwrap();
        let coauthor = EdgeSet::derive(Relation::Coauthor, store.revision(), &works);

        let report = build(&store, &coauthor).unwrap();

        assert_eq!(report.counts.works, 4);
        assert_eq!(report.counts.authors, 4);
        assert_eq!((report.year_min, report.year_max), (Some(2020), Some(2021)));
        assert_eq!(report.publications_per_year, vec![
            YearCount { year: 2020, works: 1 },
            YearCount { year: 2021, works: 2 },
        ]);
        assert_eq!(report.top_authors[0], RankedEntry { label: "Ada".into(), works: 3 });
        assert_eq!(report.top_keywords[0], RankedEntry { label: "graphs".into(), works: 2 });
        assert_eq!(report.top_countries.len(), 2);
        assert_eq!(report.top_collaborations[0], Collaboration { a: "Ada".into(), b: "Bob".into(), weight: 2 });
    }

    #[test]
    fn test_empty_report() {
        let store = FactStore::new();
        let report = build(&store, &EdgeSet::derive(Relation::Coauthor, 0, &[])).unwrap();

        assert_eq!(report.counts, DatasetCounts::default());
        assert!(report.year_min.is_none());
        assert!(report.top_collaborations.is_empty());
    }
}
