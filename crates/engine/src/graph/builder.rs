//! Graph composition from facts and derived edges

use super::{Graph, GraphEdge, GraphMode, GraphNode, Layer};
use crate::aggregate::{aggregate, EdgeSet, NodeKey};
use bibnet_common::errors::{AppError, Result};
use bibnet_common::store::{FactReader, WorkFacts, YearRange};
use std::collections::{BTreeMap, BTreeSet};

/// Builds one layer's graph from a consistent view of the facts
pub struct GraphBuilder<'a, R: ?Sized> {
    facts: &'a R,
    layer: Layer,
}

impl<'a, R> GraphBuilder<'a, R>
where
    R: FactReader + ?Sized,
{
    pub fn new(facts: &'a R, layer: Layer) -> Self {
        Self { facts, layer }
    }

    /// Compose the graph.
    ///
    /// `works` must already be restricted to `range`. `edges` is the cached
    /// set for persisted relations; keyword co-occurrence is counted here
    /// over `works` instead. Focus keys must exist.
    pub fn build(
        &self,
        works: &[WorkFacts],
        edges: Option<&EdgeSet>,
        range: YearRange,
        min_edge_weight: u32,
        focus: &BTreeSet<NodeKey>,
        mode: GraphMode,
    ) -> Result<Graph> {
        let relation = self.layer.relation();

        // Works per node inside the range
        let mut works_per_node: BTreeMap<NodeKey, u32> = BTreeMap::new();
        for work in works {
            for member in relation.members(work) {
                *works_per_node.entry(member).or_insert(0) += 1;
            }
        }

        let threshold = min_edge_weight.max(1);
        let mut kept: Vec<(NodeKey, NodeKey, u32)> = match edges {
            Some(set) => set
                .scoped(range)
                .map(|(a, b, weight)| (a.clone(), b.clone(), weight))
                .collect(),
            None => aggregate(relation, works)
                .into_iter()
                .map(|edge| (edge.a, edge.b, edge.weight))
                .collect(),
        };
        kept.retain(|(_, _, weight)| *weight >= threshold);

        let nodes: BTreeSet<NodeKey> = match mode {
            GraphMode::FullNetwork => works_per_node.keys().cloned().chain(focus.iter().cloned()).collect(),
            GraphMode::FocusOnly => {
                kept.retain(|(a, b, _)| focus.contains(a) || focus.contains(b));
                kept.iter()
                    .flat_map(|(a, b, _)| [a.clone(), b.clone()])
                    .chain(focus.iter().cloned())
                    .collect()
            }
        };

        let nodes = nodes
            .into_iter()
            .map(|key| {
                let is_focus = focus.contains(&key);
                Ok(GraphNode {
                    id: self.layer.node_id(&key),
                    label: self.label(&key)?,
                    node_type: self.layer.node_type(is_focus).to_string(),
                    is_focus,
                    works: works_per_node.get(&key).copied().unwrap_or(0),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        // Sources are already in canonical pair order
        let edges = kept
            .into_iter()
            .map(|(a, b, weight)| GraphEdge {
                source: self.layer.node_id(&a),
                target: self.layer.node_id(&b),
                weight,
            })
            .collect();

        Ok(Graph {
            layer: self.layer,
            nodes,
            edges,
        })
    }

    fn label(&self, key: &NodeKey) -> Result<String> {
        match (self.layer.entity_kind(), key) {
            (Some(kind), NodeKey::Entity(id)) => self.facts.label(kind, *id).ok_or_else(|| {
                AppError::consistency(format!("{} {} has no entity row", kind, id))
            }),
            (None, NodeKey::Nation(code)) => Ok(code.clone()),
            _ => Err(AppError::Internal {
                message: format!("node {} does not belong to layer {}", key, self.layer),
            }),
        }
    }
}
