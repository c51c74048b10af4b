use std::path::PathBuf;

use serde::Deserialize;

use crate::store::Store;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub user: String,
    pub role: String,
}

pub struct AppState {
    pub store_path: Option<PathBuf>,
    pub store: Option<Store>,
    pub session: Option<Session>,
}

impl AppState {
    pub fn new() -> Self {
        AppState {
            store_path: None,
            store: None,
            session: None,
        }
    }
}
