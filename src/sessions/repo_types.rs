use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::store::Record;

/// A refresh-token session. Rotated or logged-out sessions stay on disk with
/// `is_revoked` set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub refresh_token_hash: String, // sha-256 hex, never the raw token
    pub user_agent: String,
    pub ip_address: String,
    pub is_revoked: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Session {
    pub fn is_active_at(&self, now: OffsetDateTime) -> bool {
        !self.is_revoked && self.expires_at > now
    }
}

impl Record for Session {
    fn id(&self) -> Uuid {
        self.id
    }
}
