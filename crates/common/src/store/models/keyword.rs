//! Keyword entity

use super::EntityId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyword {
    pub id: EntityId,

    /// Unique normalized term
    pub term_norm: String,

    pub term_display: String,

    pub vocabulary: Option<String>,
}
