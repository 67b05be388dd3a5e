use std::collections::BTreeMap;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertBudgetRequest {
    pub month: Option<String>,
    pub monthly_goal: Option<f64>,
    pub savings_target: Option<f64>,
    pub category_budgets: Option<BTreeMap<String, f64>>,
}
