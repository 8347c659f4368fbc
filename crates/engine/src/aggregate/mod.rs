//! Co-occurrence edge aggregation
//!
//! Derives weighted, undirected edge sets from per-work fact lists. Every
//! unordered pair of distinct entities sharing a work gains one unit of
//! weight for that work, however many join rows link them to it.
//!
//! Edges keep their weight split by publication year so a year-scoped
//! weight can be read back without touching the fact store again.

mod derived;

pub use derived::DerivedEdges;

use bibnet_common::errors::{AppError, Result};
use bibnet_common::store::{WorkFacts, YearRange};
use bibnet_common::EntityId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Co-occurrence edge spaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Coauthor,
    Organization,
    Nation,
    /// Derived per request, never cached
    Keyword,
}

impl Relation {
    /// Relations whose edge sets live in the derived cache
    pub const PERSISTED: [Relation; 3] = [Relation::Coauthor, Relation::Organization, Relation::Nation];

    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::Coauthor => "coauthor",
            Relation::Organization => "organization",
            Relation::Nation => "nation",
            Relation::Keyword => "keyword",
        }
    }

    pub fn is_persisted(&self) -> bool {
        !matches!(self, Relation::Keyword)
    }

    /// Bundle table the edge set is exported to
    pub fn table_name(&self) -> &'static str {
        match self {
            Relation::Coauthor => "coauthor_edges",
            Relation::Organization => "organization_edges",
            Relation::Nation => "nation_edges",
            Relation::Keyword => "keyword_edges",
        }
    }

    /// Distinct entities of one work under this relation, sorted
    pub fn members(&self, work: &WorkFacts) -> Vec<NodeKey> {
        let mut members: Vec<NodeKey> = match self {
            Relation::Coauthor => work.authors.iter().copied().map(NodeKey::Entity).collect(),
            Relation::Organization => work
                .affiliations
                .iter()
                .filter_map(|aff| aff.org_id)
                .map(NodeKey::Entity)
                .collect(),
            Relation::Nation => work
                .affiliations
                .iter()
                .filter_map(|aff| aff.country_code.clone())
                .map(NodeKey::Nation)
                .collect(),
            Relation::Keyword => work.keywords.iter().copied().map(NodeKey::Entity).collect(),
        };
        members.sort();
        members.dedup();
        members
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Relation {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "coauthor" | "coauthors" | "author" | "authors" => Ok(Relation::Coauthor),
            "organization" | "organizations" | "org" | "orgs" => Ok(Relation::Organization),
            "nation" | "nations" | "country" | "countries" => Ok(Relation::Nation),
            "keyword" | "keywords" => Ok(Relation::Keyword),
            other => Err(AppError::validation(
                "relation",
                format!("unknown relation '{}'", other),
            )),
        }
    }
}

/// Node identity within one relation. Nations are keyed by country code
/// since they have no entity row.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeKey {
    Entity(EntityId),
    Nation(String),
}

impl NodeKey {
    pub fn entity_id(&self) -> Option<EntityId> {
        match self {
            NodeKey::Entity(id) => Some(*id),
            NodeKey::Nation(_) => None,
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKey::Entity(id) => write!(f, "{}", id),
            NodeKey::Nation(code) => f.write_str(code),
        }
    }
}

/// Undirected weighted edge with `a < b`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub a: NodeKey,
    pub b: NodeKey,

    /// Distinct works both endpoints share
    pub weight: u32,

    /// Contributing works per publication year
    pub years: BTreeMap<Option<i32>, u32>,
}

impl Edge {
    /// Weight counting only works inside `range`
    pub fn weight_in(&self, range: YearRange) -> u32 {
        if range.is_unbounded() {
            return self.weight;
        }
        self.years
            .iter()
            .filter(|(year, _)| range.contains(**year))
            .map(|(_, works)| works)
            .sum()
    }

    pub fn touches(&self, key: &NodeKey) -> bool {
        &self.a == key || &self.b == key
    }
}

/// Running pair counts, keyed by canonical pair
#[derive(Debug, Default)]
pub struct PairCounter {
    pairs: BTreeMap<(NodeKey, NodeKey), BTreeMap<Option<i32>, u32>>,
}

impl PairCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count every unordered pair of one work's members once.
    /// `members` must be sorted and distinct.
    pub fn observe(&mut self, year: Option<i32>, members: &[NodeKey]) {
        debug_assert!(members.windows(2).all(|w| w[0] < w[1]));

        for (i, a) in members.iter().enumerate() {
            for b in &members[i + 1..] {
                *self
                    .pairs
                    .entry((a.clone(), b.clone()))
                    .or_default()
                    .entry(year)
                    .or_insert(0) += 1;
            }
        }
    }

    /// Emit one edge per counted pair, ordered by pair
    pub fn into_edges(self) -> Vec<Edge> {
        self.pairs
            .into_iter()
            .map(|((a, b), years)| Edge {
                a,
                b,
                weight: years.values().sum(),
                years,
            })
            .collect()
    }
}

/// Count co-occurrences of `relation` across `works`
pub fn aggregate(relation: Relation, works: &[WorkFacts]) -> Vec<Edge> {
    let mut counter = PairCounter::new();
    for work in works {
        let members = relation.members(work);
        if members.len() > 1 {
            counter.observe(work.year, &members);
        }
    }
    counter.into_edges()
}

/// Year share of an exported edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearWeight {
    pub year: Option<i32>,
    pub works: u32,
}

/// Flat edge row written to bundles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRow {
    pub a_id: NodeKey,
    pub b_id: NodeKey,
    pub weight: u32,
    pub years: Vec<YearWeight>,
}

/// Complete edge set of one relation, derived from one fact revision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeSet {
    pub relation: Relation,

    /// Fact store revision the set was derived from
    pub revision: u64,

    /// Sorted by `(a, b)`
    pub edges: Vec<Edge>,
}

impl EdgeSet {
    pub fn derive(relation: Relation, revision: u64, works: &[WorkFacts]) -> Self {
        Self {
            relation,
            revision,
            edges: aggregate(relation, works),
        }
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Full weight of the pair, in either order
    pub fn weight(&self, x: &NodeKey, y: &NodeKey) -> u32 {
        let (a, b) = if x <= y { (x, y) } else { (y, x) };
        self.edges
            .binary_search_by(|edge| (&edge.a, &edge.b).cmp(&(a, b)))
            .map(|idx| self.edges[idx].weight)
            .unwrap_or(0)
    }

    /// Whether any edge still references `key`
    pub fn touches(&self, key: &NodeKey) -> bool {
        self.edges.iter().any(|edge| edge.touches(key))
    }

    /// `(a, b, weight)` of every edge with a non-zero weight inside `range`
    pub fn scoped(&self, range: YearRange) -> impl Iterator<Item = (&NodeKey, &NodeKey, u32)> + '_ {
        self.edges
            .iter()
            .map(move |edge| (&edge.a, &edge.b, edge.weight_in(range)))
            .filter(|(_, _, weight)| *weight > 0)
    }

    pub fn rows(&self) -> Vec<EdgeRow> {
        self.edges
            .iter()
            .map(|edge| EdgeRow {
                a_id: edge.a.clone(),
                b_id: edge.b.clone(),
                weight: edge.weight,
                years: edge
                    .years
                    .iter()
                    .map(|(year, works)| YearWeight { year: *year, works: *works })
                    .collect(),
            })
            .collect()
    }
}
