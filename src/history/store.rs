use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use anyhow::Result;
use chrono::Utc;
use tracing::warn;

use super::{
    LocalFileStorage,
    hash::{is_record_id, record_id},
    record::{HistoryRecord, NewHistoryRecord},
};

const HISTORY_DIR: &str = "history";

#[derive(Clone, Debug)]
pub struct HistoryStore {
    storage: LocalFileStorage,
    sequence: Arc<AtomicU64>,
}

impl HistoryStore {
    pub fn new(storage: LocalFileStorage) -> Self {
        Self {
            storage,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    fn key(id: &str) -> String {
        format!("{HISTORY_DIR}/{id}.json")
    }

    pub async fn insert(&self, record: NewHistoryRecord) -> Result<HistoryRecord> {
        let created_at = Utc::now();
        let seed = format!(
            "{}:{}:{}:{}",
            record.kind,
            record.image_url,
            created_at.timestamp_nanos_opt().unwrap_or_default(),
            self.sequence.fetch_add(1, Ordering::Relaxed),
        );
        let saved = HistoryRecord {
            id: record_id(&seed),
            image_url: record.image_url,
            kind: record.kind,
            metadata: record.metadata,
            created_at,
        };
        let payload = serde_json::to_vec_pretty(&saved)?;
        self.storage.put(&Self::key(&saved.id), &payload).await?;
        Ok(saved)
    }

    pub async fn get(&self, id: &str) -> Result<Option<HistoryRecord>> {
        if !is_record_id(id) {
            return Ok(None);
        }
        match self.storage.get(&Self::key(id)).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Newest first; unreadable files are skipped.
    pub async fn list(&self, limit: usize) -> Result<Vec<HistoryRecord>> {
        let mut records = Vec::new();
        for key in self.storage.list_json(HISTORY_DIR).await? {
            let Some(bytes) = self.storage.get(&key).await? else {
                continue;
            };
            match serde_json::from_slice::<HistoryRecord>(&bytes) {
                Ok(record) => records.push(record),
                Err(err) => warn!(%key, error = %err, "skipping unreadable history record"),
            }
        }
        records.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        records.truncate(limit);
        Ok(records)
    }

    pub async fn delete(&self, id: &str) -> Result<bool> {
        if !is_record_id(id) {
            return Ok(false);
        }
        self.storage.delete(&Self::key(id)).await
    }
}
