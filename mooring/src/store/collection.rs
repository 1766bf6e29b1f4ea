//! Keyed record collection with optional JSON file backing

use std::collections::BTreeMap;

use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::errors::EngineError;
use crate::filesys::file::File;

/// A stored record with a stable id
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    fn id(&self) -> &str;
}

/// Records of one kind, keyed by id.
///
/// Every mutation rewrites the backing file, if any, before the write lock is
/// released, and only becomes visible once that write succeeded. There is no
/// versioning: the last `put` of a record wins.
pub struct Collection<T: Record> {
    name: &'static str,
    items: RwLock<BTreeMap<String, T>>,
    file: Option<File>,
}

impl<T: Record> Collection<T> {
    pub fn in_memory(name: &'static str) -> Self {
        Self {
            name,
            items: RwLock::new(BTreeMap::new()),
            file: None,
        }
    }

    /// Load the collection from `file`, starting empty if it does not exist.
    pub async fn open(name: &'static str, file: File) -> Result<Self, EngineError> {
        let items = if file.exists().await {
            let records: Vec<T> = file.read_json().await.map_err(|e| {
                EngineError::StorageError(format!(
                    "failed to load {} from {}: {}",
                    name,
                    file.path().display(),
                    e
                ))
            })?;
            records
                .into_iter()
                .map(|record| (record.id().to_string(), record))
                .collect()
        } else {
            BTreeMap::new()
        };
        debug!("Loaded {} {} records", items.len(), name);

        Ok(Self {
            name,
            items: RwLock::new(items),
            file: Some(file),
        })
    }

    pub async fn get(&self, id: &str) -> Option<T> {
        self.items.read().await.get(id).cloned()
    }

    /// Insert or replace. When the flush fails the previous record is
    /// restored.
    pub async fn put(&self, record: T) -> Result<(), EngineError> {
        let id = record.id().to_string();
        let mut items = self.items.write().await;
        let previous = items.insert(id.clone(), record);
        if let Err(e) = self.flush(&items).await {
            match previous {
                Some(previous) => items.insert(id, previous),
                None => items.remove(&id),
            };
            return Err(e);
        }
        Ok(())
    }

    /// Remove by id. When the flush fails the record stays.
    pub async fn remove(&self, id: &str) -> Result<Option<T>, EngineError> {
        let mut items = self.items.write().await;
        let Some(removed) = items.remove(id) else {
            return Ok(None);
        };
        if let Err(e) = self.flush(&items).await {
            items.insert(id.to_string(), removed);
            return Err(e);
        }
        Ok(Some(removed))
    }

    pub async fn values(&self) -> Vec<T> {
        self.items.read().await.values().cloned().collect()
    }

    pub async fn filter<F>(&self, predicate: F) -> Vec<T>
    where
        F: Fn(&T) -> bool,
    {
        self.items
            .read()
            .await
            .values()
            .filter(|record| predicate(record))
            .cloned()
            .collect()
    }

    async fn flush(&self, items: &BTreeMap<String, T>) -> Result<(), EngineError> {
        let Some(file) = &self.file else {
            return Ok(());
        };
        let records: Vec<&T> = items.values().collect();
        file.write_json(&records).await.map_err(|e| {
            EngineError::StorageError(format!("failed to persist {}: {}", self.name, e))
        })
    }
}
