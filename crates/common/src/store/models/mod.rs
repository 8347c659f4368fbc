//! Fact store entities
//!
//! Rows of the normalized bibliographic fact base

mod author;
mod keyword;
mod links;
mod merge_record;
mod organization;
mod work;

pub use author::{Author, AuthorAlias};
pub use keyword::Keyword;
pub use links::{WorkAffiliation, WorkAuthor, WorkKeyword};
pub use merge_record::MergeRecord;
pub use organization::Organization;
pub use work::{Venue, Work};

use crate::errors::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque, stable identifier assigned by the fact store
pub type EntityId = u64;

/// Entity tables of the fact store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Work,
    Author,
    Organization,
    Venue,
    Keyword,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Work => "work",
            EntityKind::Author => "author",
            EntityKind::Organization => "organization",
            EntityKind::Venue => "venue",
            EntityKind::Keyword => "keyword",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "work" | "works" => Ok(EntityKind::Work),
            "author" | "authors" => Ok(EntityKind::Author),
            "organization" | "organizations" | "org" | "orgs" => Ok(EntityKind::Organization),
            "venue" | "venues" => Ok(EntityKind::Venue),
            "keyword" | "keywords" => Ok(EntityKind::Keyword),
            other => Err(AppError::validation("kind", format!("unknown entity kind '{}'", other))),
        }
    }
}
