//! Graph views over the co-occurrence layers
//!
//! Provides:
//! - Layer selection (authors, keywords, organizations, nations)
//! - Year and weight filtering
//! - Full network and focus-only (ego) shaping

mod builder;

pub use builder::GraphBuilder;

use crate::aggregate::{NodeKey, Relation};
use bibnet_common::errors::{AppError, Result};
use bibnet_common::store::normalize_country;
use bibnet_common::EntityKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Entity layer a graph is drawn over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    Authors,
    Keywords,
    Organizations,
    Nations,
}

impl Layer {
    pub const ALL: [Layer; 4] = [Layer::Authors, Layer::Keywords, Layer::Organizations, Layer::Nations];

    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Authors => "authors",
            Layer::Keywords => "keywords",
            Layer::Organizations => "organizations",
            Layer::Nations => "nations",
        }
    }

    /// Edge space backing this layer
    pub fn relation(&self) -> Relation {
        match self {
            Layer::Authors => Relation::Coauthor,
            Layer::Keywords => Relation::Keyword,
            Layer::Organizations => Relation::Organization,
            Layer::Nations => Relation::Nation,
        }
    }

    /// Entity table behind the nodes; nations have none
    pub fn entity_kind(&self) -> Option<EntityKind> {
        match self {
            Layer::Authors => Some(EntityKind::Author),
            Layer::Keywords => Some(EntityKind::Keyword),
            Layer::Organizations => Some(EntityKind::Organization),
            Layer::Nations => None,
        }
    }

    fn prefix(&self) -> char {
        match self {
            Layer::Authors => 'A',
            Layer::Keywords => 'K',
            Layer::Organizations => 'O',
            Layer::Nations => 'N',
        }
    }

    /// Node type tag, suffixed for focus nodes
    pub fn node_type(&self, is_focus: bool) -> &'static str {
        match (self, is_focus) {
            (Layer::Authors, false) => "author",
            (Layer::Authors, true) => "focus_author",
            (Layer::Keywords, false) => "keyword",
            (Layer::Keywords, true) => "focus_keyword",
            (Layer::Organizations, false) => "organization",
            (Layer::Organizations, true) => "focus_organization",
            (Layer::Nations, false) => "nation",
            (Layer::Nations, true) => "focus_nation",
        }
    }

    /// Stable, layer-prefixed node id such as `A12` or `NUS`
    pub fn node_id(&self, key: &NodeKey) -> String {
        format!("{}{}", self.prefix(), key)
    }

    /// Parse a focus id given either as a node id (`A12`) or bare (`12`)
    pub fn parse_node(&self, raw: &str) -> Result<NodeKey> {
        let raw = raw.trim();
        match self {
            Layer::Nations => {
                let code = match raw.strip_prefix(&['N', 'n'][..]) {
                    Some(code) if raw.len() == 3 => code,
                    _ => raw,
                };
                match normalize_country(Some(code)) {
                    Some(code) if code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic()) => {
                        Ok(NodeKey::Nation(code))
                    }
                    _ => Err(AppError::validation(
                        "focus_ids",
                        format!("'{}' is not a country code", raw),
                    )),
                }
            }
            _ => {
                let digits = raw
                    .strip_prefix(self.prefix())
                    .or_else(|| raw.strip_prefix(self.prefix().to_ascii_lowercase()))
                    .unwrap_or(raw);
                digits.parse().map(NodeKey::Entity).map_err(|_| {
                    AppError::validation(
                        "focus_ids",
                        format!("'{}' is not a valid {} id", raw, self.as_str()),
                    )
                })
            }
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Layer {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "authors" | "author" => Ok(Layer::Authors),
            "keywords" | "keyword" => Ok(Layer::Keywords),
            "organizations" | "organization" | "orgs" | "org" => Ok(Layer::Organizations),
            "nations" | "nation" | "countries" | "country" => Ok(Layer::Nations),
            other => Err(AppError::validation("layer", format!("unknown layer '{}'", other))),
        }
    }
}

/// Graph shaping policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphMode {
    FullNetwork,
    FocusOnly,
}

impl GraphMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GraphMode::FullNetwork => "full_network",
            GraphMode::FocusOnly => "focus_only",
        }
    }
}

/// Parameters of one graph build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphRequest {
    pub layer: Layer,

    #[serde(default)]
    pub year_min: Option<i32>,

    #[serde(default)]
    pub year_max: Option<i32>,

    #[serde(default = "default_min_edge_weight")]
    pub min_edge_weight: u32,

    /// Node ids (`A12`) or bare ids (`12`, `US`)
    #[serde(default)]
    pub focus_ids: Vec<String>,

    #[serde(default)]
    pub focus_only: bool,
}

fn default_min_edge_weight() -> u32 {
    1
}

impl GraphRequest {
    pub fn new(layer: Layer) -> Self {
        Self {
            layer,
            year_min: None,
            year_max: None,
            min_edge_weight: default_min_edge_weight(),
            focus_ids: Vec::new(),
            focus_only: false,
        }
    }

    pub fn years(mut self, year_min: Option<i32>, year_max: Option<i32>) -> Self {
        self.year_min = year_min;
        self.year_max = year_max;
        self
    }

    pub fn min_edge_weight(mut self, weight: u32) -> Self {
        self.min_edge_weight = weight;
        self
    }

    pub fn focus<S: ToString>(mut self, ids: &[S]) -> Self {
        self.focus_ids = ids.iter().map(ToString::to_string).collect();
        self
    }

    pub fn focus_only(mut self, focus_only: bool) -> Self {
        self.focus_only = focus_only;
        self
    }

    /// Focus-only without any focus node degrades to the full network
    pub fn mode(&self) -> GraphMode {
        if self.focus_only && !self.focus_ids.is_empty() {
            GraphMode::FocusOnly
        } else {
            GraphMode::FullNetwork
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,

    pub label: String,

    #[serde(rename = "type")]
    pub node_type: String,

    pub is_focus: bool,

    /// Distinct works of the node inside the year range
    pub works: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub weight: u32,
}

/// Layer-agnostic graph, nodes and edges sorted by node key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    pub layer: Layer,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl Graph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn edge(&self, source: &str, target: &str) -> Option<&GraphEdge> {
        self.edges.iter().find(|edge| {
            (edge.source == source && edge.target == target)
                || (edge.source == target && edge.target == source)
        })
    }
}
