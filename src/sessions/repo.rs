use time::OffsetDateTime;
use uuid::Uuid;

use crate::sessions::repo_types::Session;
use crate::store::Collection;

impl Session {
    /// Unrevoked session holding this refresh-token hash, if any.
    pub async fn find_unrevoked_by_hash(
        sessions: &Collection<Session>,
        token_hash: &str,
    ) -> Option<Session> {
        sessions
            .find_where(|s| s.refresh_token_hash == token_hash && !s.is_revoked)
            .await
            .into_iter()
            .next()
    }

    pub async fn list_active_for_user(
        sessions: &Collection<Session>,
        user_id: Uuid,
        now: OffsetDateTime,
    ) -> Vec<Session> {
        sessions
            .find_where(|s| s.user_id == user_id && s.is_active_at(now))
            .await
    }

    pub async fn mark_revoked(
        sessions: &Collection<Session>,
        id: Uuid,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<Session>> {
        sessions
            .update(id, |s| {
                s.is_revoked = true;
                s.updated_at = now;
            })
            .await
    }

    /// Revokes every active session of `user_id`; returns how many flipped.
    pub async fn revoke_active_for_user(
        sessions: &Collection<Session>,
        user_id: Uuid,
        now: OffsetDateTime,
    ) -> anyhow::Result<usize> {
        sessions
            .transact(|records| {
                let mut count = 0;
                for s in records
                    .iter_mut()
                    .filter(|s| s.user_id == user_id && s.is_active_at(now))
                {
                    s.is_revoked = true;
                    s.updated_at = now;
                    count += 1;
                }
                count
            })
            .await
    }
}
