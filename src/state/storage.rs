// File system locations and content hashing
use sha2::{Digest, Sha256};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to get app data directory")]
    NoAppDataDir,
}

pub type StorageResult<T> = Result<T, StorageError>;

/// `<data dir>/songform`, created if missing
pub fn get_app_data_dir() -> StorageResult<PathBuf> {
    let data_dir = dirs::data_dir().ok_or(StorageError::NoAppDataDir)?;
    let app_dir = data_dir.join("songform");
    fs::create_dir_all(&app_dir)?;
    Ok(app_dir)
}

/// Fresh directory for the clips of one rearrange call
pub fn get_render_dir(run_id: &Uuid) -> StorageResult<PathBuf> {
    let render_dir = get_app_data_dir()?.join("renders").join(run_id.to_string());
    fs::create_dir_all(&render_dir)?;
    Ok(render_dir)
}

/// Calculate SHA256 hash of data
pub fn calculate_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
