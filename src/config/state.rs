// Application state module
// Owns the task store and the upload directory

use super::types::Config;
use crate::store::TaskStore;
use crate::upload::UploadStore;

/// Application state shared by every connection
pub struct AppState {
    pub config: Config,
    pub store: TaskStore,
    pub uploads: UploadStore,
}

impl AppState {
    /// Prepare storage and load the task file.
    ///
    /// Creates the upload directory, the data directory and an empty task
    /// file when they are missing. A malformed task file aborts startup.
    pub async fn open(config: &Config) -> Result<Self, Box<dyn std::error::Error>> {
        let uploads = UploadStore::create(&config.storage.upload_dir).await?;
        let store = TaskStore::open(&config.storage.data_file).await?;

        Ok(Self {
            config: config.clone(),
            store,
            uploads,
        })
    }

    pub const fn access_log_enabled(&self) -> bool {
        self.config.logging.access_log
    }
}
