//! Author entity and its name aliases

use super::EntityId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: EntityId,

    /// Canonical display name
    pub display_name: String,

    /// Deduplication key used on ingest
    pub normalized_name: String,

    pub orcid: Option<String>,
}

/// Alternate spelling of an author's name. Lookup only, never ownership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorAlias {
    pub author_id: EntityId,

    pub raw_name: String,

    /// Where the alias came from: ingest, merge, manual
    pub source: String,

    pub confidence: f32,
}
