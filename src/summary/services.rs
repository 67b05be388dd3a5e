//! Derived analytics over a user's ledger.
//!
//! Cached results live under keys starting with `summary_<userId>` or
//! `analytics_<userId>`; ledger writes drop both prefixes. A new cached
//! figure must use one of these prefixes or invalidate itself on writes.

use std::collections::BTreeMap;

use tracing::debug;
use uuid::Uuid;

use super::dto::{
    Actuals, BudgetAnalysis, BudgetComparison, BudgetTargets, CategoryTotals, MonthlyTrend,
    SavingTips, Summary, Totals,
};
use super::tips::saving_tips;
use crate::{
    budgets::{self, services::is_valid_month},
    error::AppError,
    state::AppState,
    transactions::{
        self,
        categorize::FALLBACK_CATEGORY,
        dto::TransactionFilters,
        repo_types::{Transaction, TransactionType},
    },
};

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn percent_of(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        round1(part / whole * 100.0)
    } else {
        0.0
    }
}

fn summarize(transactions: &[Transaction], period: String) -> Summary {
    let mut income = 0.0;
    let mut expense = 0.0;
    let mut breakdown: BTreeMap<String, CategoryTotals> = BTreeMap::new();
    for t in transactions {
        let category = if t.category.is_empty() {
            FALLBACK_CATEGORY
        } else {
            t.category.as_str()
        };
        let entry = breakdown.entry(category.to_string()).or_default();
        match t.kind {
            TransactionType::Income => {
                income += t.amount;
                entry.income += t.amount;
            }
            TransactionType::Expense => {
                expense += t.amount;
                entry.expense += t.amount;
            }
        }
        entry.count += 1;
    }
    for totals in breakdown.values_mut() {
        totals.income = round2(totals.income);
        totals.expense = round2(totals.expense);
    }

    Summary {
        total_income: round2(income),
        total_expense: round2(expense),
        balance: round2(income - expense),
        transaction_count: transactions.len(),
        category_breakdown: breakdown,
        period,
        cached: false,
    }
}

/// Month keys are part of the cache key, so only well-formed ones get that far.
fn check_month(month: &str) -> Result<(), AppError> {
    if is_valid_month(month) {
        Ok(())
    } else {
        Err(AppError::validation(
            "Invalid month",
            vec![r#"Field "month" must be in YYYY-MM format"#.to_string()],
        ))
    }
}

/// Income/expense totals, optionally limited to one `YYYY-MM` month.
///
/// The month window is `<month>-01..=<month>-31`; string comparison keeps it
/// correct for shorter months.
pub async fn get_summary(
    st: &AppState,
    user_id: Uuid,
    month: Option<&str>,
) -> Result<Summary, AppError> {
    let month = month.filter(|m| !m.is_empty());
    if let Some(m) = month {
        check_month(m)?;
    }
    Ok(summary_for(st, user_id, month).await)
}

async fn summary_for(st: &AppState, user_id: Uuid, month: Option<&str>) -> Summary {
    let key = format!("summary_{user_id}_{}", month.unwrap_or("all"));
    if let Some(mut hit) = st.cache.get_as::<Summary>(&key) {
        hit.cached = true;
        return hit;
    }

    let filters = TransactionFilters {
        start_date: month.map(|m| format!("{m}-01")),
        end_date: month.map(|m| format!("{m}-31")),
        ..Default::default()
    };
    let txs = transactions::services::get_all(st, user_id, &filters).await;
    let summary = summarize(&txs, month.unwrap_or("all-time").to_string());
    debug!(%user_id, %key, count = summary.transaction_count, "summary computed");
    st.cache.set(&key, &summary);
    summary
}

/// Per-month totals, oldest month first.
pub async fn get_monthly_trends(st: &AppState, user_id: Uuid) -> Vec<MonthlyTrend> {
    let key = format!("analytics_{user_id}_trends");
    if let Some(hit) = st.cache.get_as::<Vec<MonthlyTrend>>(&key) {
        return hit;
    }

    let txs = transactions::services::get_all(st, user_id, &TransactionFilters::default()).await;
    let mut months: BTreeMap<String, MonthlyTrend> = BTreeMap::new();
    for t in &txs {
        let month = t.date.get(..7).unwrap_or(&t.date);
        let m = months
            .entry(month.to_string())
            .or_insert_with(|| MonthlyTrend {
                month: month.to_string(),
                income: 0.0,
                expense: 0.0,
                count: 0,
                balance: 0.0,
            });
        match t.kind {
            TransactionType::Income => m.income += t.amount,
            TransactionType::Expense => m.expense += t.amount,
        }
        m.count += 1;
    }
    let trends: Vec<MonthlyTrend> = months
        .into_values()
        .map(|m| MonthlyTrend {
            balance: round2(m.income - m.expense),
            income: round2(m.income),
            expense: round2(m.expense),
            ..m
        })
        .collect();

    debug!(%user_id, %key, months = trends.len(), "trends computed");
    st.cache.set(&key, &trends);
    trends
}

/// Recomputed on every call; only the embedded all-time summary is cached.
pub async fn get_saving_tips(st: &AppState, user_id: Uuid) -> SavingTips {
    let txs = transactions::services::get_all(st, user_id, &TransactionFilters::default()).await;
    let tips = saving_tips(&txs);
    let summary = summary_for(st, user_id, None).await;
    SavingTips {
        tips,
        summary: Totals {
            total_income: summary.total_income,
            total_expense: summary.total_expense,
            balance: summary.balance,
        },
    }
}

/// Actual figures for `month` against its budget. A month without a budget
/// is not an error: `budget` is null and there is no analysis.
pub async fn get_budget_comparison(
    st: &AppState,
    user_id: Uuid,
    month: &str,
) -> Result<BudgetComparison, AppError> {
    check_month(month)?;
    let (summary, budget) = tokio::join!(
        summary_for(st, user_id, Some(month)),
        budgets::services::find_by_month(st, user_id, month),
    );

    let analysis = budget.as_ref().map(|b| BudgetAnalysis {
        within_budget: summary.total_expense <= b.monthly_goal,
        savings_achieved: summary.balance >= b.savings_target,
        budget_utilization: percent_of(summary.total_expense, b.monthly_goal),
        savings_progress: percent_of(summary.balance, b.savings_target),
    });

    Ok(BudgetComparison {
        month: month.to_string(),
        actual: Actuals {
            income: summary.total_income,
            expense: summary.total_expense,
            balance: summary.balance,
        },
        budget: budget.map(|b| BudgetTargets {
            monthly_goal: b.monthly_goal,
            savings_target: b.savings_target,
            category_budgets: b.category_budgets,
        }),
        analysis,
    })
}
