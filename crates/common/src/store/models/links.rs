//! Join rows linking works to authors, organizations and keywords

use super::EntityId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkAuthor {
    pub work_id: EntityId,

    pub author_id: EntityId,

    /// Author order on the work; ignored by aggregation
    pub position: u32,

    pub corresponding: bool,
}

/// An author's institutional context for one specific work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkAffiliation {
    pub work_id: EntityId,

    pub author_id: Option<EntityId>,

    pub org_id: Option<EntityId>,

    /// Institution label as it appeared in the source record
    pub org_label_raw: Option<String>,

    /// Country at the time of the work
    pub country_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkKeyword {
    pub work_id: EntityId,

    pub keyword_id: EntityId,

    /// Relevance score reported by the extractor
    pub weight: f32,

    pub extractor: Option<String>,
}
