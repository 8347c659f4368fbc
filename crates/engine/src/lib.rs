//! Bibnet Engine
//!
//! Relationship aggregation over a bibliographic fact base:
//! - Co-occurrence edge sets (co-author, organization, nation, keyword)
//! - Layer graphs with year, weight and focus/ego shaping
//! - Top-K author x keyword and nation x nation heatmaps
//! - Atomic entity merges with edge re-derivation

pub mod aggregate;
pub mod graph;
pub mod heatmap;
pub mod merge;
pub mod report;
pub mod workspace;

#[cfg(test)]
mod test_support;

pub use aggregate::{DerivedEdges, Edge, EdgeSet, NodeKey, Relation};
pub use graph::{Graph, GraphEdge, GraphMode, GraphNode, GraphRequest, Layer};
pub use heatmap::Heatmap;
pub use report::Report;
pub use workspace::{IngestSummary, Workspace, WorkspaceRegistry};
