//! Work and venue entities

use super::EntityId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Work {
    pub id: EntityId,

    pub title: String,

    /// Lowercased DOI, the preferred natural key
    pub doi: Option<String>,

    /// Identifier assigned by the upstream source
    pub source_uid: Option<String>,

    pub year: Option<i32>,

    pub venue_id: Option<EntityId>,

    pub work_type: Option<String>,

    pub language: Option<String>,

    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Venue {
    pub id: EntityId,

    pub name: String,

    /// journal, conference, repository
    pub venue_type: Option<String>,

    pub issn: Option<String>,

    pub publisher: Option<String>,
}
