use std::collections::BTreeMap;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::budgets::repo_types::Budget;
use crate::store::Collection;

impl Budget {
    pub async fn list_by_user(budgets: &Collection<Budget>, user_id: Uuid) -> Vec<Budget> {
        budgets.find_where(|b| b.user_id == user_id).await
    }

    pub async fn find_by_month(budgets: &Collection<Budget>, user_id: Uuid, month: &str) -> Option<Budget> {
        budgets
            .find_where(|b| b.user_id == user_id && b.month == month)
            .await
            .into_iter()
            .next()
    }

    /// Updates the user's budget for `month` or creates it. Lookup and write
    /// share one store transaction, so a month never gets two records.
    ///
    /// `category_budgets: None` keeps whatever the existing record has.
    pub async fn upsert(
        budgets: &Collection<Budget>,
        user_id: Uuid,
        month: String,
        monthly_goal: f64,
        savings_target: f64,
        category_budgets: Option<BTreeMap<String, f64>>,
    ) -> anyhow::Result<(Budget, bool)> {
        budgets
            .transact(move |records| {
                let now = OffsetDateTime::now_utc();
                if let Some(existing) = records
                    .iter_mut()
                    .find(|b| b.user_id == user_id && b.month == month)
                {
                    existing.monthly_goal = monthly_goal;
                    existing.savings_target = savings_target;
                    if let Some(categories) = category_budgets {
                        existing.category_budgets = categories;
                    }
                    existing.updated_at = now;
                    return (existing.clone(), false);
                }
                let budget = Budget {
                    id: Uuid::new_v4(),
                    user_id,
                    month,
                    monthly_goal,
                    savings_target,
                    category_budgets: category_budgets.unwrap_or_default(),
                    created_at: now,
                    updated_at: now,
                };
                records.push(budget.clone());
                (budget, true)
            })
            .await
    }

    pub async fn delete_owned(budgets: &Collection<Budget>, id: Uuid, user_id: Uuid) -> anyhow::Result<bool> {
        budgets
            .transact(move |records| {
                let before = records.len();
                records.retain(|b| !(b.id == id && b.user_id == user_id));
                records.len() != before
            })
            .await
    }
}
