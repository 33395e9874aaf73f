pub mod ingest;
pub mod init;
pub mod newsletters;
pub mod open;
pub mod openings;
pub mod show;
pub mod stats;
pub mod top;

use anyhow::Result;
use openstreak_core::config;
use openstreak_core::db::query;
use openstreak_core::error::TrackerError;
use rusqlite::Connection;
use std::path::Path;

/// Open the project's existing store, without creating one.
///
/// # Errors
///
/// [`TrackerError::NotInitialized`] when no database exists yet, and
/// [`TrackerError::CorruptStore`] when it exists but cannot be opened.
pub fn open_existing_store(project_root: &Path) -> Result<Connection> {
    let path = config::database_path(project_root);
    if !path.exists() {
        return Err(TrackerError::NotInitialized { path }.into());
    }

    match query::try_open_store(&path)? {
        Some(conn) => Ok(conn),
        None => Err(TrackerError::CorruptStore { path }.into()),
    }
}

/// Format an optional value for human output.
pub fn or_dash<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}
