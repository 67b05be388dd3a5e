use lazy_static::lazy_static;
use regex::Regex;
use tracing::info;
use uuid::Uuid;

use super::dto::UpsertBudgetRequest;
use super::repo_types::Budget;
use crate::{error::AppError, state::AppState};

pub(crate) fn is_valid_month(month: &str) -> bool {
    lazy_static! {
        static ref MONTH_RE: Regex = Regex::new(r"^\d{4}-\d{2}$").unwrap();
    }
    MONTH_RE.is_match(month)
}

fn non_negative(v: Option<f64>) -> Option<f64> {
    v.filter(|v| v.is_finite() && *v >= 0.0)
}

pub async fn upsert(
    st: &AppState,
    user_id: Uuid,
    req: UpsertBudgetRequest,
) -> Result<Budget, AppError> {
    let mut errors = Vec::new();
    match req.month.as_deref() {
        None | Some("") => errors.push(r#"Field "month" is required (format: YYYY-MM)"#.to_string()),
        Some(m) if !is_valid_month(m) => {
            errors.push(r#"Field "month" must be in YYYY-MM format"#.to_string())
        }
        Some(_) => {}
    }
    let monthly_goal = non_negative(req.monthly_goal);
    if monthly_goal.is_none() {
        errors.push(
            r#"Field "monthlyGoal" is required and must be a non-negative number"#.to_string(),
        );
    }
    let savings_target = non_negative(req.savings_target);
    if savings_target.is_none() {
        errors.push(
            r#"Field "savingsTarget" is required and must be a non-negative number"#.to_string(),
        );
    }

    let (Some(month), Some(monthly_goal), Some(savings_target)) =
        (req.month, monthly_goal, savings_target)
    else {
        return Err(AppError::validation("Budget validation failed", errors));
    };
    if !errors.is_empty() {
        return Err(AppError::validation("Budget validation failed", errors));
    }

    let (budget, created) = Budget::upsert(
        &st.store.budgets,
        user_id,
        month,
        monthly_goal,
        savings_target,
        req.category_budgets,
    )
    .await?;
    info!(%user_id, budget_id = %budget.id, month = %budget.month, created, "budget saved");
    Ok(budget)
}

pub async fn get_all(st: &AppState, user_id: Uuid) -> Vec<Budget> {
    Budget::list_by_user(&st.store.budgets, user_id).await
}

pub async fn find_by_month(st: &AppState, user_id: Uuid, month: &str) -> Option<Budget> {
    Budget::find_by_month(&st.store.budgets, user_id, month).await
}

pub async fn get_by_month(st: &AppState, user_id: Uuid, month: &str) -> Result<Budget, AppError> {
    find_by_month(st, user_id, month)
        .await
        .ok_or_else(|| AppError::not_found("Budget", month))
}

pub async fn delete(st: &AppState, user_id: Uuid, id: Uuid) -> Result<(), AppError> {
    if !Budget::delete_owned(&st.store.budgets, id, user_id).await? {
        return Err(AppError::not_found("Budget", id));
    }
    info!(%user_id, budget_id = %id, "budget deleted");
    Ok(())
}
