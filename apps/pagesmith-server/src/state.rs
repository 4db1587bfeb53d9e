//! Shared application state

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::janitor::Janitor;
use crate::storage::Storage;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub storage: Storage,
    pub janitor: Janitor,
}

impl AppState {
    /// Prepare the temp directory and cleanup policy for `config`
    pub async fn new(config: ServerConfig) -> std::io::Result<Self> {
        let storage = Storage::open(config.temp_dir.clone()).await?;
        let janitor = Janitor::new(config.cleanup_delay);
        Ok(Self {
            config: Arc::new(config),
            storage,
            janitor,
        })
    }
}
