use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::User;
use crate::store::Collection;

impl User {
    /// Find a user by (normalized) email.
    pub async fn find_by_email(users: &Collection<User>, email: &str) -> Option<User> {
        users
            .find_where(|u| u.email == email)
            .await
            .into_iter()
            .next()
    }

    /// Insert a new user unless the email is already taken.
    ///
    /// The uniqueness check and the insert share one store transaction.
    pub async fn create_unique(users: &Collection<User>, user: User) -> anyhow::Result<Option<User>> {
        users
            .transact(|records| {
                if records.iter().any(|u| u.email == user.email) {
                    return None;
                }
                records.push(user.clone());
                Some(user)
            })
            .await
    }

    /// Shallow-merge `preferences` into the stored ones.
    pub async fn merge_preferences(
        users: &Collection<User>,
        id: Uuid,
        preferences: serde_json::Map<String, serde_json::Value>,
    ) -> anyhow::Result<Option<User>> {
        users
            .update(id, |u| {
                u.preferences.extend(preferences);
                u.updated_at = OffsetDateTime::now_utc();
            })
            .await
    }
}
