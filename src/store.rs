use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{de::DeserializeOwned, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::auth::repo_types::User;
use crate::budgets::repo_types::Budget;
use crate::sessions::repo_types::Session;
use crate::transactions::repo_types::Transaction;

/// A persisted entity keyed by an opaque id.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    fn id(&self) -> Uuid;
}

/// One JSON array on disk, mirrored in memory.
///
/// Every mutation holds the collection lock until the new array has been
/// written and renamed into place, so writers never interleave.
pub struct Collection<T: Record> {
    path: PathBuf,
    records: Mutex<Vec<T>>,
}

impl<T: Record> Collection<T> {
    pub async fn open(dir: &Path, name: &str) -> anyhow::Result<Self> {
        let path = dir.join(format!("{name}.json"));
        let records = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Vec::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("parse {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e).with_context(|| format!("read {}", path.display())),
        };
        debug!(path = %path.display(), count = records.len(), "collection loaded");
        let collection = Self {
            path,
            records: Mutex::new(records),
        };
        {
            let guard = collection.records.lock().await;
            collection.persist(&guard).await?;
        }
        Ok(collection)
    }

    pub async fn all(&self) -> Vec<T> {
        self.records.lock().await.clone()
    }

    pub async fn find_by_id(&self, id: Uuid) -> Option<T> {
        self.records
            .lock()
            .await
            .iter()
            .find(|r| r.id() == id)
            .cloned()
    }

    pub async fn find_where<F>(&self, pred: F) -> Vec<T>
    where
        F: Fn(&T) -> bool,
    {
        self.records
            .lock()
            .await
            .iter()
            .filter(|r| pred(r))
            .cloned()
            .collect()
    }

    pub async fn insert(&self, record: T) -> anyhow::Result<T> {
        self.transact(move |records| {
            records.push(record.clone());
            record
        })
        .await
    }

    /// Applies `f` to the record with `id`; `None` when it does not exist.
    pub async fn update<F>(&self, id: Uuid, f: F) -> anyhow::Result<Option<T>>
    where
        F: FnOnce(&mut T),
    {
        self.transact(move |records| {
            records.iter_mut().find(|r| r.id() == id).map(|r| {
                f(r);
                r.clone()
            })
        })
        .await
    }

    pub async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        self.transact(move |records| {
            let before = records.len();
            records.retain(|r| r.id() != id);
            records.len() != before
        })
        .await
    }

    /// Runs several mutations under one lock and one write.
    ///
    /// If the write fails the in-memory state is rolled back.
    pub async fn transact<R, F>(&self, f: F) -> anyhow::Result<R>
    where
        F: FnOnce(&mut Vec<T>) -> R,
    {
        let mut guard = self.records.lock().await;
        let snapshot = guard.clone();
        let out = f(&mut *guard);
        if let Err(e) = self.persist(&guard).await {
            *guard = snapshot;
            return Err(e);
        }
        Ok(out)
    }

    async fn persist(&self, records: &[T]) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        let body = serde_json::to_vec_pretty(records).context("serialize collection")?;
        let tmp = self.path.with_extension("json.tmp");
        let mut file = tokio::fs::File::create(&tmp)
            .await
            .with_context(|| format!("create {}", tmp.display()))?;
        file.write_all(&body)
            .await
            .with_context(|| format!("write {}", tmp.display()))?;
        file.sync_all()
            .await
            .with_context(|| format!("sync {}", tmp.display()))?;
        drop(file);
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e).with_context(|| format!("rename into {}", self.path.display()));
        }
        Ok(())
    }
}

/// All entity collections of the service.
pub struct Store {
    pub users: Collection<User>,
    pub sessions: Collection<Session>,
    pub transactions: Collection<Transaction>,
    pub budgets: Collection<Budget>,
}

impl Store {
    pub async fn open(dir: &Path) -> anyhow::Result<Self> {
        Ok(Self {
            users: Collection::open(dir, "users").await?,
            sessions: Collection::open(dir, "sessions").await?,
            transactions: Collection::open(dir, "transactions").await?,
            budgets: Collection::open(dir, "budgets").await?,
        })
    }
}
