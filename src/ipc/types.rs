use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::config::StoreConfig;
use crate::manager::EntityLifecycleManager;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub store: StoreConfig,
}

impl AppState {
    pub fn new(store: StoreConfig) -> Self {
        AppState {
            workspace: None,
            db: None,
            store,
        }
    }

    /// A manager over the open workspace, if any.
    pub fn manager(&self) -> Option<EntityLifecycleManager<'_>> {
        self.db
            .as_ref()
            .map(|conn| EntityLifecycleManager::new(conn, self.store))
    }
}
