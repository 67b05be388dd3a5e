use std::collections::BTreeMap;

use crate::transactions::{
    categorize::FALLBACK_CATEGORY,
    repo_types::{Transaction, TransactionType},
};

const TARGET_SAVINGS_RATE: f64 = 20.0;
const FOOD_SHARE: f64 = 0.30;
const ENTERTAINMENT_SHARE: f64 = 0.15;
const SHOPPING_SHARE: f64 = 0.25;

/// Rule-based saving advice from a user's ledger.
///
/// Rules run in a fixed order and each adds at most one tip. An empty ledger
/// short-circuits to a single onboarding tip.
pub fn saving_tips(transactions: &[Transaction]) -> Vec<String> {
    let mut total_income = 0.0;
    let mut total_expense = 0.0;
    let mut by_category: BTreeMap<&str, f64> = BTreeMap::new();
    for t in transactions {
        match t.kind {
            TransactionType::Income => total_income += t.amount,
            TransactionType::Expense => {
                total_expense += t.amount;
                let category = if t.category.is_empty() {
                    FALLBACK_CATEGORY
                } else {
                    t.category.as_str()
                };
                *by_category.entry(category).or_default() += t.amount;
            }
        }
    }

    if total_income == 0.0 && total_expense == 0.0 {
        return vec![
            "Start tracking your income and expenses to get personalized saving tips!".to_string(),
        ];
    }

    let mut tips = Vec::new();

    if total_income > 0.0 {
        let rate = (total_income - total_expense) / total_income * 100.0;
        if rate < TARGET_SAVINGS_RATE {
            tips.push(format!(
                "⚠️ Your savings rate is {rate:.1}%. Aim for at least 20% to build a healthy financial cushion."
            ));
        } else {
            tips.push(format!(
                "✅ Great job! Your savings rate is {rate:.1}%. Keep it up!"
            ));
        }
    }

    // ties go to the alphabetically first category
    let top = by_category
        .iter()
        .fold(None::<(&str, f64)>, |best, (&cat, &amount)| match best {
            Some((_, best_amount)) if best_amount >= amount => best,
            _ => Some((cat, amount)),
        });
    if let Some((category, amount)) = top {
        let share = if total_expense > 0.0 {
            amount / total_expense * 100.0
        } else {
            0.0
        };
        tips.push(format!(
            "💡 Your highest spending category is \"{category}\" at ₹{amount:.2} ({share:.1}% of total expenses). Consider setting a budget limit for this category."
        ));
    }

    let share_of = |category: &str| {
        by_category
            .get(category)
            .filter(|_| total_expense > 0.0)
            .map_or(0.0, |amount| amount / total_expense)
    };

    if share_of("food") > FOOD_SHARE {
        tips.push(
            "🍕 Food expenses are over 30% of your total spending. Try meal prepping to cut costs!"
                .to_string(),
        );
    }
    if share_of("entertainment") > ENTERTAINMENT_SHARE {
        tips.push(
            "🎬 Entertainment costs are above 15%. Look for free or low-cost alternatives for fun activities."
                .to_string(),
        );
    }
    if share_of("shopping") > SHOPPING_SHARE {
        tips.push(
            "🛍️ Shopping makes up over 25% of your expenses. Try the 24-hour rule: wait a day before making non-essential purchases."
                .to_string(),
        );
    }

    if tips.is_empty() {
        tips.push(
            "📊 Your spending looks balanced. Keep tracking to maintain good financial health!"
                .to_string(),
        );
    }
    tips
}
