//! Organization entity

use super::EntityId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: EntityId,

    pub name: String,

    /// ISO 3166-1 alpha-2, upper case
    pub country_code: Option<String>,

    pub city: Option<String>,
}
