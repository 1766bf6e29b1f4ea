//! Storage layout configuration

use std::path::PathBuf;

use crate::errors::EngineError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;

/// On-disk layout of the record store
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// Base directory for all storage
    pub base_dir: PathBuf,
}

impl StorageLayout {
    /// Create a new storage layout
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Get the records directory
    pub fn records_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("records"))
    }

    pub fn deployments_file(&self) -> File {
        self.records_dir().file("deployments.json")
    }

    pub fn applications_file(&self) -> File {
        self.records_dir().file("applications.json")
    }

    pub fn databases_file(&self) -> File {
        self.records_dir().file("databases.json")
    }

    pub fn proxy_routes_file(&self) -> File {
        self.records_dir().file("proxy_routes.json")
    }

    /// Build and deploy output, one file per deployment and kind
    pub fn deployment_logs_dir(&self) -> Dir {
        self.records_dir().subdir("logs")
    }

    /// Get the logs directory
    pub fn logs_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("logs"))
    }

    /// Setup the storage layout (create directories)
    pub async fn setup(&self) -> Result<(), EngineError> {
        self.records_dir().create().await?;
        self.deployment_logs_dir().create().await?;
        self.logs_dir().create().await?;
        Ok(())
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        Self::new("/var/lib/mooring")
    }
}
