use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{
    domain::{Debt, DebtId, UserId},
    errors::Error,
    ports::DebtStore,
    Result,
};

#[derive(Default, Serialize, Deserialize)]
struct Snapshot {
    next_id: i64,
    debts: Vec<Debt>,
}

#[derive(Clone, Default)]
struct Inner {
    next_id: i64,
    debts: BTreeMap<DebtId, Debt>,
}

/// In-process [`DebtStore`], optionally mirrored to a JSON file after every
/// mutation.
///
/// A mutation becomes visible only after its snapshot is written, so memory
/// and file never disagree.
pub struct MemoryDebtStore {
    inner: Mutex<Inner>,
    snapshot: Option<PathBuf>,
}

impl MemoryDebtStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            snapshot: None,
        }
    }

    /// Open (or start) a store backed by `path`.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let inner = match load_snapshot(&path).await? {
            Some(snap) => Inner {
                next_id: snap.next_id,
                debts: snap.debts.into_iter().map(|d| (d.id, d)).collect(),
            },
            None => Inner::default(),
        };
        tracing::info!(path = %path.display(), debts = inner.debts.len(), "debt store opened");
        Ok(Self {
            inner: Mutex::new(inner),
            snapshot: Some(path),
        })
    }

    async fn persist(&self, inner: &Inner) -> Result<()> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };
        let snap = Snapshot {
            next_id: inner.next_id,
            debts: inner.debts.values().cloned().collect(),
        };
        save_snapshot(path, &snap).await
    }
}

impl Default for MemoryDebtStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DebtStore for MemoryDebtStore {
    async fn save(&self, debt: &Debt) -> Result<DebtId> {
        let mut inner = self.inner.lock().await;
        let mut next = inner.clone();
        next.next_id += 1;
        let id = DebtId(next.next_id);
        let mut stored = debt.clone();
        stored.id = id;
        next.debts.insert(id, stored);
        self.persist(&next).await?;
        *inner = next;
        Ok(id)
    }

    async fn get(&self, id: DebtId) -> Result<Debt> {
        self.inner
            .lock()
            .await
            .debts
            .get(&id)
            .cloned()
            .ok_or(Error::NotFound(id))
    }

    async fn list_by_owner(&self, owner: UserId) -> Result<Vec<Debt>> {
        Ok(self
            .inner
            .lock()
            .await
            .debts
            .values()
            .filter(|d| d.owner == owner)
            .cloned()
            .collect())
    }

    async fn update(&self, debt: &Debt) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if !inner.debts.contains_key(&debt.id) {
            return Err(Error::NotFound(debt.id));
        }
        let mut next = inner.clone();
        next.debts.insert(debt.id, debt.clone());
        self.persist(&next).await?;
        *inner = next;
        Ok(())
    }

    async fn delete(&self, id: DebtId) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if !inner.debts.contains_key(&id) {
            return Ok(());
        }
        let mut next = inner.clone();
        next.debts.remove(&id);
        self.persist(&next).await?;
        *inner = next;
        Ok(())
    }
}

async fn load_snapshot(path: &Path) -> Result<Option<Snapshot>> {
    let txt = match tokio::fs::read_to_string(path).await {
        Ok(txt) => txt,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if txt.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(&txt)?))
}

async fn save_snapshot(path: &Path, snap: &Snapshot) -> Result<()> {
    let txt = serde_json::to_string(snap)?;
    // The snapshot on disk is never partially written.
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, txt).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
