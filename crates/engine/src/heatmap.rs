//! Co-occurrence heatmaps
//!
//! Dense matrices rebuilt from scratch on every call:
//! - author x keyword, cut to the top-K of each axis
//! - nation x nation, over every nation observed in range

use crate::aggregate::{EdgeSet, NodeKey, Relation};
use bibnet_common::errors::{AppError, Result};
use bibnet_common::store::{FactReader, WorkFacts, YearRange};
use bibnet_common::{EntityId, EntityKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Upper bound on either axis of the author x keyword matrix
pub const MAX_TOP_K: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heatmap {
    pub rows: Vec<String>,
    pub cols: Vec<String>,
    pub data: Vec<Vec<u32>>,
}

impl Heatmap {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() && self.cols.is_empty()
    }

    pub fn cell(&self, row: &str, col: &str) -> Option<u32> {
        let i = self.rows.iter().position(|r| r == row)?;
        let j = self.cols.iter().position(|c| c == col)?;
        Some(self.data[i][j])
    }
}

/// Highest totals first, lower id on ties
fn top_k(totals: &BTreeMap<EntityId, u32>, k: usize) -> Vec<EntityId> {
    let mut ranked: Vec<(EntityId, u32)> = totals.iter().map(|(id, total)| (*id, *total)).collect();
    ranked.sort_by(|x, y| y.1.cmp(&x.1).then(x.0.cmp(&y.0)));
    ranked.truncate(k);
    ranked.into_iter().map(|(id, _)| id).collect()
}

fn labels<R>(facts: &R, kind: EntityKind, ids: &[EntityId]) -> Result<Vec<String>>
where
    R: FactReader + ?Sized,
{
    ids.iter()
        .map(|id| {
            facts
                .label(kind, *id)
                .ok_or_else(|| AppError::consistency(format!("{} {} has no entity row", kind, id)))
        })
        .collect()
}

/// Author x keyword matrix over `works`, which must already be restricted
/// to the requested year range. Axis totals are summed author-keyword
/// co-occurrences.
pub fn author_keyword<R>(facts: &R, works: &[WorkFacts], top: usize) -> Result<Heatmap>
where
    R: FactReader + ?Sized,
{
    let top = top.min(MAX_TOP_K);
    let mut cells: HashMap<(EntityId, EntityId), u32> = HashMap::new();
    let mut author_totals: BTreeMap<EntityId, u32> = BTreeMap::new();
    let mut keyword_totals: BTreeMap<EntityId, u32> = BTreeMap::new();

    for work in works {
        // Author and keyword lists are distinct per work
        for author in &work.authors {
            for keyword in &work.keywords {
                *cells.entry((*author, *keyword)).or_insert(0) += 1;
                *author_totals.entry(*author).or_insert(0) += 1;
                *keyword_totals.entry(*keyword).or_insert(0) += 1;
            }
        }
    }

    let authors = top_k(&author_totals, top);
    let keywords = top_k(&keyword_totals, top);

    let data = authors
        .iter()
        .map(|author| {
            keywords
                .iter()
                .map(|keyword| cells.get(&(*author, *keyword)).copied().unwrap_or(0))
                .collect()
        })
        .collect();

    Ok(Heatmap {
        rows: labels(facts, EntityKind::Author, &authors)?,
        cols: labels(facts, EntityKind::Keyword, &keywords)?,
        data,
    })
}

/// Symmetric nation matrix with a zero diagonal. `works` must already be
/// restricted to `range`; `nation_edges` is the full nation edge set.
pub fn nation_nation(works: &[WorkFacts], nation_edges: &EdgeSet, range: YearRange) -> Result<Heatmap> {
    if nation_edges.relation != Relation::Nation {
        return Err(AppError::Internal {
            message: format!("expected nation edges, got {}", nation_edges.relation),
        });
    }

    let nations: BTreeSet<NodeKey> = works
        .iter()
        .flat_map(|work| Relation::Nation.members(work))
        .collect();
    let index: HashMap<&NodeKey, usize> = nations.iter().enumerate().map(|(i, n)| (n, i)).collect();

    let mut data = vec![vec![0u32; nations.len()]; nations.len()];
    for (a, b, weight) in nation_edges.scoped(range) {
        if let (Some(&i), Some(&j)) = (index.get(a), index.get(b)) {
            data[i][j] += weight;
            data[j][i] += weight;
        }
    }

    let labels: Vec<String> = nations.iter().map(ToString::to_string).collect();
    Ok(Heatmap {
        rows: labels.clone(),
        cols: labels,
        data,
    })
}
