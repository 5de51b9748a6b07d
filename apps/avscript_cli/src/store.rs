use avscript_core::{CoreError, TimelineDocument};
use avscript_sync::{ScriptStore, StoreError};
use std::io::ErrorKind;
use std::path::PathBuf;

/// Writes autosaved timeline documents to one file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ScriptStore<TimelineDocument> for FileStore {
    async fn save(&self, payload: TimelineDocument) -> Result<(), StoreError> {
        let path = self.path.clone();
        let written = tokio::task::spawn_blocking(move || payload.save_to_file(path))
            .await
            .map_err(|e| StoreError::Other(e.to_string()))?;
        written.map_err(store_error)
    }
}

fn store_error(e: CoreError) -> StoreError {
    match e {
        CoreError::Io(io) if matches!(io.kind(), ErrorKind::StorageFull | ErrorKind::QuotaExceeded) => {
            StoreError::QuotaExceeded
        }
        other => StoreError::Other(other.to_string()),
    }
}
