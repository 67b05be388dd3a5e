use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    pub month: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotals {
    pub income: f64,
    pub expense: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_income: f64,
    pub total_expense: f64,
    pub balance: f64,
    pub transaction_count: usize,
    pub category_breakdown: BTreeMap<String, CategoryTotals>,
    pub period: String,
    pub cached: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyTrend {
    pub month: String,
    pub income: f64,
    pub expense: f64,
    pub count: usize,
    pub balance: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub total_income: f64,
    pub total_expense: f64,
    pub balance: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SavingTips {
    pub tips: Vec<String>,
    pub summary: Totals,
}

#[derive(Debug, Clone, Serialize)]
pub struct Actuals {
    pub income: f64,
    pub expense: f64,
    pub balance: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetTargets {
    pub monthly_goal: f64,
    pub savings_target: f64,
    pub category_budgets: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetAnalysis {
    pub within_budget: bool,
    pub savings_achieved: bool,
    pub budget_utilization: f64,
    pub savings_progress: f64,
}

/// `budget` serializes as `null` when the month has no budget; `analysis` is
/// omitted in that case.
#[derive(Debug, Clone, Serialize)]
pub struct BudgetComparison {
    pub month: String,
    pub actual: Actuals,
    pub budget: Option<BudgetTargets>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<BudgetAnalysis>,
}
