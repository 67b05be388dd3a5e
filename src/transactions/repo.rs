use uuid::Uuid;

use crate::store::Collection;
use crate::transactions::repo_types::Transaction;

impl Transaction {
    pub async fn list_by_user(transactions: &Collection<Transaction>, user_id: Uuid) -> Vec<Transaction> {
        transactions.find_where(|t| t.user_id == user_id).await
    }

    pub async fn find_owned(
        transactions: &Collection<Transaction>,
        id: Uuid,
        user_id: Uuid,
    ) -> Option<Transaction> {
        transactions
            .find_by_id(id)
            .await
            .filter(|t| t.user_id == user_id)
    }

    /// Applies `f` if the transaction exists and belongs to `user_id`.
    pub async fn update_owned<F>(
        transactions: &Collection<Transaction>,
        id: Uuid,
        user_id: Uuid,
        f: F,
    ) -> anyhow::Result<Option<Transaction>>
    where
        F: FnOnce(&mut Transaction),
    {
        transactions
            .transact(move |records| {
                records
                    .iter_mut()
                    .find(|t| t.id == id && t.user_id == user_id)
                    .map(|t| {
                        f(t);
                        t.clone()
                    })
            })
            .await
    }

    pub async fn delete_owned(
        transactions: &Collection<Transaction>,
        id: Uuid,
        user_id: Uuid,
    ) -> anyhow::Result<bool> {
        transactions
            .transact(move |records| {
                let before = records.len();
                records.retain(|t| !(t.id == id && t.user_id == user_id));
                records.len() != before
            })
            .await
    }
}
