use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::store::Record;

/// Spending plan for one calendar month. At most one per (user, month).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    pub id: Uuid,
    pub user_id: Uuid,
    pub month: String, // YYYY-MM
    pub monthly_goal: f64,
    pub savings_target: f64,
    #[serde(default)]
    pub category_budgets: BTreeMap<String, f64>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Record for Budget {
    fn id(&self) -> Uuid {
        self.id
    }
}
