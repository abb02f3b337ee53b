use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::import::session::ImportSession;

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
    /// At most one import session exists per daemon; batch processing is
    /// strictly sequential and suspends on the duplicate prompt.
    pub import_session: Option<ImportSession>,
}
