//! Deployment output kept apart from the record files.
//!
//! Appends go to one file per deployment and kind, so a chunk of build output
//! costs one small write instead of a rewrite of every record. Text is cached
//! in memory and loaded from disk on first read.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::errors::EngineError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Build,
    Deploy,
}

impl LogKind {
    fn suffix(self) -> &'static str {
        match self {
            LogKind::Build => "build",
            LogKind::Deploy => "deploy",
        }
    }
}

/// Build and deploy output of one deployment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentLogs {
    pub build: String,
    pub deploy: String,
}

impl DeploymentLogs {
    fn push(&mut self, kind: LogKind, text: &str) {
        match kind {
            LogKind::Build => self.build.push_str(text),
            LogKind::Deploy => self.deploy.push_str(text),
        }
    }
}

pub struct LogBook {
    entries: RwLock<HashMap<String, DeploymentLogs>>,
    dir: Option<Dir>,
}

impl LogBook {
    pub fn in_memory() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            dir: None,
        }
    }

    pub fn open(dir: Dir) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            dir: Some(dir),
        }
    }

    fn file(&self, id: &str, kind: LogKind) -> Option<File> {
        self.dir
            .as_ref()
            .map(|dir| dir.file(&format!("{}.{}.log", id, kind.suffix())))
    }

    /// Append `text`. The cache lock is held across the file append so a
    /// concurrent first read cannot load the file between the two.
    pub async fn append(&self, id: &str, kind: LogKind, text: &str) -> Result<(), EngineError> {
        let mut entries = self.entries.write().await;
        if let Some(file) = self.file(id, kind) {
            file.append(text.as_bytes()).await.map_err(|e| {
                EngineError::StorageError(format!(
                    "failed to append {} log of deployment {}: {}",
                    kind.suffix(),
                    id,
                    e
                ))
            })?;
        }

        match entries.get_mut(id) {
            Some(entry) => entry.push(kind, text),
            // file-backed entries not read yet pick the text up from disk
            None if self.dir.is_some() => {}
            None => entries.entry(id.to_string()).or_default().push(kind, text),
        }
        Ok(())
    }

    pub async fn read(&self, id: &str) -> Result<DeploymentLogs, EngineError> {
        if let Some(entry) = self.entries.read().await.get(id) {
            return Ok(entry.clone());
        }

        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get(id) {
            return Ok(entry.clone());
        }
        let loaded = DeploymentLogs {
            build: self.read_file(id, LogKind::Build).await?,
            deploy: self.read_file(id, LogKind::Deploy).await?,
        };
        entries.insert(id.to_string(), loaded.clone());
        Ok(loaded)
    }

    async fn read_file(&self, id: &str, kind: LogKind) -> Result<String, EngineError> {
        match self.file(id, kind) {
            Some(file) if file.exists().await => file.read_string().await,
            _ => Ok(String::new()),
        }
    }

    pub async fn remove(&self, id: &str) -> Result<(), EngineError> {
        self.entries.write().await.remove(id);
        for kind in [LogKind::Build, LogKind::Deploy] {
            if let Some(file) = self.file(id, kind) {
                file.delete().await?;
            }
        }
        Ok(())
    }
}
