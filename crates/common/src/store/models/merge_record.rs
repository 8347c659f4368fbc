//! Append-only audit trail of entity merges

use super::{EntityId, EntityKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRecord {
    pub id: Uuid,

    pub kind: EntityKind,

    pub kept_id: EntityId,

    pub removed_id: EntityId,

    pub reason: Option<String>,

    /// Who requested the merge, when known
    #[serde(default)]
    pub actor: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl MergeRecord {
    pub fn new(kind: EntityKind, kept_id: EntityId, removed_id: EntityId, reason: Option<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            kind,
            kept_id,
            removed_id,
            reason,
            actor: None,
            created_at: Utc::now(),
        }
    }

    pub fn by(mut self, actor: Option<String>) -> Self {
        self.actor = actor;
        self
    }
}
