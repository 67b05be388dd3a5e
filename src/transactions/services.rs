use anyhow::Context;
use lazy_static::lazy_static;
use regex::Regex;
use time::{macros::format_description, Date, OffsetDateTime};
use tracing::info;
use uuid::Uuid;

use super::categorize::auto_categorize;
use super::dto::{CreateTransactionRequest, TransactionFilters, UpdateTransactionRequest};
use super::repo_types::{Transaction, TransactionType};
use crate::{error::AppError, state::AppState};

const TYPE_ERROR: &str = r#"Field "type" must be either "income" or "expense""#;
const AMOUNT_ERROR: &str = r#"Field "amount" must be a positive number"#;

fn parse_date(raw: &str) -> Result<Date, &'static str> {
    lazy_static! {
        static ref DATE_RE: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap();
    }
    if !DATE_RE.is_match(raw) {
        return Err(r#"Field "date" must be in YYYY-MM-DD format"#);
    }
    Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .map_err(|_| r#"Field "date" is not a valid date"#)
}

fn today() -> anyhow::Result<String> {
    OffsetDateTime::now_utc()
        .date()
        .format(format_description!("[year]-[month]-[day]"))
        .context("format current date")
}

fn valid_amount(amount: f64) -> bool {
    amount.is_finite() && amount > 0.0
}

fn validate_create(req: &CreateTransactionRequest) -> Result<(TransactionType, f64), AppError> {
    let mut errors = Vec::new();
    let kind = match req.kind.as_deref() {
        None => {
            errors.push(r#"Field "type" is required"#.to_string());
            None
        }
        Some(raw) => {
            let kind = TransactionType::parse(raw);
            if kind.is_none() {
                errors.push(TYPE_ERROR.to_string());
            }
            kind
        }
    };
    let amount = match req.amount {
        None => {
            errors.push(r#"Field "amount" is required"#.to_string());
            None
        }
        Some(a) if !valid_amount(a) => {
            errors.push(AMOUNT_ERROR.to_string());
            None
        }
        Some(a) => Some(a),
    };
    if let Some(Err(e)) = req.date.as_deref().map(parse_date) {
        errors.push(e.to_string());
    }

    match (kind, amount) {
        (Some(kind), Some(amount)) if errors.is_empty() => Ok((kind, amount)),
        _ => Err(AppError::validation("Transaction validation failed", errors)),
    }
}

fn validate_update(req: &UpdateTransactionRequest) -> Result<Option<TransactionType>, AppError> {
    let mut errors = Vec::new();
    let kind = req.kind.as_deref().map(TransactionType::parse);
    if matches!(kind, Some(None)) {
        errors.push(TYPE_ERROR.to_string());
    }
    if req.amount.is_some_and(|a| !valid_amount(a)) {
        errors.push(AMOUNT_ERROR.to_string());
    }
    if let Some(Err(e)) = req.date.as_deref().map(parse_date) {
        errors.push(e.to_string());
    }
    if errors.is_empty() {
        Ok(kind.flatten())
    } else {
        Err(AppError::validation("Transaction validation failed", errors))
    }
}

/// Drops every cached figure derived from this user's ledger.
fn invalidate_derived(st: &AppState, user_id: Uuid) {
    st.cache.invalidate_by_prefix(&format!("summary_{user_id}"));
    st.cache.invalidate_by_prefix(&format!("analytics_{user_id}"));
}

pub async fn create(
    st: &AppState,
    user_id: Uuid,
    req: CreateTransactionRequest,
) -> Result<Transaction, AppError> {
    let (kind, amount) = validate_create(&req)?;
    let description = req.description.unwrap_or_default();
    let category = match req.category.filter(|c| !c.is_empty()) {
        Some(c) => c,
        None => auto_categorize(&description).to_string(),
    };
    let date = match req.date {
        Some(d) => d,
        None => today()?,
    };
    let now = OffsetDateTime::now_utc();
    let tx = Transaction {
        id: Uuid::new_v4(),
        user_id,
        kind,
        category,
        amount,
        description,
        date,
        created_at: now,
        updated_at: now,
    };

    let tx = st.store.transactions.insert(tx).await?;
    invalidate_derived(st, user_id);
    info!(%user_id, transaction_id = %tx.id, category = %tx.category, "transaction created");
    Ok(tx)
}

/// Owner's transactions, filtered and sorted newest date first.
///
/// Category and type match case-insensitively; the date bounds are inclusive.
pub async fn get_all(st: &AppState, user_id: Uuid, filters: &TransactionFilters) -> Vec<Transaction> {
    let mut txs = Transaction::list_by_user(&st.store.transactions, user_id).await;
    if let Some(category) = filters.category.as_deref().filter(|c| !c.is_empty()) {
        let category = category.to_lowercase();
        txs.retain(|t| t.category.to_lowercase() == category);
    }
    if let Some(kind) = filters.kind.as_deref().filter(|k| !k.is_empty()) {
        txs.retain(|t| t.kind.as_str().eq_ignore_ascii_case(kind));
    }
    if let Some(start) = filters.start_date.as_deref().filter(|d| !d.is_empty()) {
        txs.retain(|t| t.date.as_str() >= start);
    }
    if let Some(end) = filters.end_date.as_deref().filter(|d| !d.is_empty()) {
        txs.retain(|t| t.date.as_str() <= end);
    }
    txs.sort_by(|a, b| b.date.cmp(&a.date));
    txs
}

pub async fn get_by_id(st: &AppState, user_id: Uuid, id: Uuid) -> Result<Transaction, AppError> {
    Transaction::find_owned(&st.store.transactions, id, user_id)
        .await
        .ok_or_else(|| AppError::not_found("Transaction", id))
}

pub async fn update(
    st: &AppState,
    user_id: Uuid,
    id: Uuid,
    req: UpdateTransactionRequest,
) -> Result<Transaction, AppError> {
    let kind = validate_update(&req)?;
    let category = match (req.category, req.description.as_deref()) {
        (Some(c), _) if !c.is_empty() => Some(c),
        (_, Some(d)) if !d.is_empty() => Some(auto_categorize(d).to_string()),
        _ => None,
    };

    let updated = Transaction::update_owned(&st.store.transactions, id, user_id, |t| {
        if let Some(kind) = kind {
            t.kind = kind;
        }
        if let Some(amount) = req.amount {
            t.amount = amount;
        }
        if let Some(description) = req.description {
            t.description = description;
        }
        if let Some(category) = category {
            t.category = category;
        }
        if let Some(date) = req.date {
            t.date = date;
        }
        t.updated_at = OffsetDateTime::now_utc();
    })
    .await?
    .ok_or_else(|| AppError::not_found("Transaction", id))?;

    invalidate_derived(st, user_id);
    info!(%user_id, transaction_id = %id, "transaction updated");
    Ok(updated)
}

pub async fn delete(st: &AppState, user_id: Uuid, id: Uuid) -> Result<(), AppError> {
    if !Transaction::delete_owned(&st.store.transactions, id, user_id).await? {
        return Err(AppError::not_found("Transaction", id));
    }
    invalidate_derived(st, user_id);
    info!(%user_id, transaction_id = %id, "transaction deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expense(amount: f64, description: &str, date: &str) -> CreateTransactionRequest {
        CreateTransactionRequest {
            kind: Some("expense".into()),
            amount: Some(amount),
            category: None,
            description: Some(description.into()),
            date: Some(date.into()),
        }
    }

    #[test]
    fn date_validation() {
        assert!(parse_date("2025-02-28").is_ok());
        assert_eq!(
            parse_date("2025-2-28").unwrap_err(),
            r#"Field "date" must be in YYYY-MM-DD format"#
        );
        assert_eq!(
            parse_date("2025-02-30").unwrap_err(),
            r#"Field "date" is not a valid date"#
        );
    }

    #[tokio::test]
    async fn create_derives_category_and_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let st = AppState::fake(dir.path()).await;
        let user = Uuid::new_v4();

        let tx = create(&st, user, expense(500.0, "Lunch at restaurant", "2025-01-10"))
            .await
            .unwrap();
        assert_eq!(tx.category, "food");
        assert_eq!(tx.kind, TransactionType::Expense);

        let bare = create(
            &st,
            user,
            CreateTransactionRequest {
                kind: Some("income".into()),
                amount: Some(10.0),
                category: Some("gift".into()),
                description: None,
                date: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(bare.category, "gift");
        assert_eq!(bare.description, "");
        assert!(parse_date(&bare.date).is_ok());
    }

    #[tokio::test]
    async fn create_rejects_bad_input() {
        let dir = tempfile::tempdir().unwrap();
        let st = AppState::fake(dir.path()).await;
        let err = create(
            &st,
            Uuid::new_v4(),
            CreateTransactionRequest {
                kind: Some("transfer".into()),
                amount: Some(-5.0),
                category: None,
                description: None,
                date: Some("01/02/2025".into()),
            },
        )
        .await
        .unwrap_err();
        match err {
            AppError::Validation { message, details } => {
                assert_eq!(message, "Transaction validation failed");
                assert_eq!(details.len(), 3);
            }
            other => panic!("unexpected {other:?}"),
        }

        let err = create(&st, Uuid::new_v4(), expense(0.0, "x", "2025-01-01"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
        assert!(st.store.transactions.all().await.is_empty());
    }

    #[tokio::test]
    async fn get_all_filters_and_sorts_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let st = AppState::fake(dir.path()).await;
        let user = Uuid::new_v4();
        create(&st, user, expense(10.0, "Pizza", "2025-01-05")).await.unwrap();
        create(&st, user, expense(20.0, "Uber", "2025-02-01")).await.unwrap();
        create(&st, user, expense(30.0, "Burger", "2025-01-20")).await.unwrap();
        create(&st, Uuid::new_v4(), expense(99.0, "Pizza", "2025-01-06")).await.unwrap();

        let all = get_all(&st, user, &TransactionFilters::default()).await;
        let dates: Vec<_> = all.iter().map(|t| t.date.as_str()).collect();
        assert_eq!(dates, ["2025-02-01", "2025-01-20", "2025-01-05"]);

        let food = get_all(
            &st,
            user,
            &TransactionFilters {
                category: Some("FOOD".into()),
                kind: Some("Expense".into()),
                ..Default::default()
            },
        )
        .await;
        assert_eq!(food.len(), 2);

        let january = get_all(
            &st,
            user,
            &TransactionFilters {
                start_date: Some("2025-01-05".into()),
                end_date: Some("2025-01-20".into()),
                ..Default::default()
            },
        )
        .await;
        assert_eq!(january.len(), 2);
    }

    #[tokio::test]
    async fn other_users_transactions_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let st = AppState::fake(dir.path()).await;
        let owner = Uuid::new_v4();
        let intruder = Uuid::new_v4();
        let tx = create(&st, owner, expense(10.0, "Pizza", "2025-01-05")).await.unwrap();

        assert!(matches!(get_by_id(&st, intruder, tx.id).await, Err(AppError::NotFound(_))));
        let upd = update(
            &st,
            intruder,
            tx.id,
            UpdateTransactionRequest { amount: Some(1.0), ..Default::default() },
        )
        .await;
        assert!(matches!(upd, Err(AppError::NotFound(_))));
        assert!(matches!(delete(&st, intruder, tx.id).await, Err(AppError::NotFound(_))));

        let still = get_by_id(&st, owner, tx.id).await.unwrap();
        assert_eq!(still.amount, 10.0);
    }

    #[tokio::test]
    async fn update_recategorizes_unless_category_given() {
        let dir = tempfile::tempdir().unwrap();
        let st = AppState::fake(dir.path()).await;
        let user = Uuid::new_v4();
        let tx = create(&st, user, expense(10.0, "Pizza", "2025-01-05")).await.unwrap();

        let moved = update(
            &st,
            user,
            tx.id,
            UpdateTransactionRequest {
                description: Some("Taxi home".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(moved.category, "transport");

        let pinned = update(
            &st,
            user,
            tx.id,
            UpdateTransactionRequest {
                description: Some("Netflix".into()),
                category: Some("family".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(pinned.category, "family");
        assert_eq!(pinned.description, "Netflix");

        let err = update(
            &st,
            user,
            tx.id,
            UpdateTransactionRequest { amount: Some(0.0), ..Default::default() },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn writes_drop_cached_analytics_for_that_user_only() {
        let dir = tempfile::tempdir().unwrap();
        let st = AppState::fake(dir.path()).await;
        let user = Uuid::new_v4();
        let other = Uuid::new_v4();
        st.cache.set(&format!("summary_{user}_all"), &1);
        st.cache.set(&format!("analytics_{user}_trends"), &2);
        st.cache.set(&format!("summary_{other}_all"), &3);

        let tx = create(&st, user, expense(10.0, "Pizza", "2025-01-05")).await.unwrap();
        assert!(st.cache.get(&format!("summary_{user}_all")).is_none());
        assert!(st.cache.get(&format!("analytics_{user}_trends")).is_none());
        assert!(st.cache.get(&format!("summary_{other}_all")).is_some());

        st.cache.set(&format!("summary_{user}_all"), &1);
        delete(&st, user, tx.id).await.unwrap();
        assert!(st.cache.get(&format!("summary_{user}_all")).is_none());
    }
}
