//! Persistence backends for the scoreboard
//!
//! The scoreboard lives under one logical key, so a backend only has to read
//! and replace the whole list. Last write wins.

use std::path::PathBuf;
use std::sync::Mutex;
use tokio::runtime::RuntimeFlavor;

use super::scores::ScoreRecord;

/// Whole-list storage for score records
pub trait ScoreBackend: Send {
    /// Read every stored record (an absent store reads as empty)
    fn load(&self) -> Result<Vec<ScoreRecord>, StoreError>;

    /// Replace the stored records
    fn save(&self, records: &[ScoreRecord]) -> Result<(), StoreError>;
}

/// JSON file holding the serialized list.
///
/// The file is read once; later loads are served from memory and every save
/// writes through. Disk work runs under `block_in_place` on a multi-thread
/// runtime so the round tick keeps its worker.
pub struct JsonFileBackend {
    path: PathBuf,
    cache: Mutex<Option<Vec<ScoreRecord>>>,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Mutex::new(None),
        }
    }

    fn read_file(&self) -> Result<Vec<ScoreRecord>, StoreError> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::Io(e)),
        };

        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        Ok(serde_json::from_slice(&raw)?)
    }

    fn write_file(&self, json: &[u8]) -> Result<(), StoreError> {
        // Write to a sibling file first so a crash never leaves half a list behind
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Run blocking file I/O without stalling other tasks on this worker
fn off_worker<T>(io: impl FnOnce() -> T) -> T {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(io)
        }
        _ => io(),
    }
}

impl ScoreBackend for JsonFileBackend {
    fn load(&self) -> Result<Vec<ScoreRecord>, StoreError> {
        let mut cache = self.cache.lock().map_err(|_| StoreError::Poisoned)?;
        if let Some(records) = cache.as_ref() {
            return Ok(records.clone());
        }

        let records = off_worker(|| self.read_file())?;
        *cache = Some(records.clone());
        Ok(records)
    }

    fn save(&self, records: &[ScoreRecord]) -> Result<(), StoreError> {
        let json = serde_json::to_vec(records)?;
        off_worker(|| self.write_file(&json))?;

        *self.cache.lock().map_err(|_| StoreError::Poisoned)? = Some(records.to_vec());
        Ok(())
    }
}

/// In-process backend, used when nothing should touch the disk
#[derive(Default)]
pub struct MemoryBackend {
    records: Mutex<Vec<ScoreRecord>>,
}

impl ScoreBackend for MemoryBackend {
    fn load(&self) -> Result<Vec<ScoreRecord>, StoreError> {
        Ok(self.records.lock().map_err(|_| StoreError::Poisoned)?.clone())
    }

    fn save(&self, records: &[ScoreRecord]) -> Result<(), StoreError> {
        *self.records.lock().map_err(|_| StoreError::Poisoned)? = records.to_vec();
        Ok(())
    }
}

/// Scoreboard persistence errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Score file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Score data is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Score store lock poisoned")]
    Poisoned,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tokio_test::{assert_err, assert_ok};

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("drop-scores-{}.json", uuid::Uuid::new_v4()))
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let backend = JsonFileBackend::new(temp_path());
        assert!(assert_ok!(backend.load()).is_empty());
    }

    #[test]
    fn file_backend_keeps_what_was_saved() {
        let path = temp_path();
        let backend = JsonFileBackend::new(&path);
        let records = vec![
            ScoreRecord::new("alice", 42.0, Utc::now()),
            ScoreRecord::new("bob", 88.5, Utc::now()),
        ];

        assert_ok!(backend.save(&records));
        let loaded = assert_ok!(JsonFileBackend::new(&path).load());
        assert_eq!(loaded, records);

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn loads_are_served_from_memory_after_the_first_read() {
        let path = temp_path();
        let backend = JsonFileBackend::new(&path);
        let records = vec![ScoreRecord::new("alice", 42.0, Utc::now())];
        assert_ok!(backend.save(&records));

        std::fs::write(&path, b"{not json").unwrap();
        assert_eq!(assert_ok!(backend.load()), records);

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn file_io_inside_the_runtime() {
        let path = temp_path();
        let backend = JsonFileBackend::new(&path);
        let records = vec![ScoreRecord::new("bob", 88.5, Utc::now())];

        assert_ok!(backend.save(&records));
        assert_eq!(assert_ok!(JsonFileBackend::new(&path).load()), records);

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn file_io_on_a_single_thread_runtime() {
        let path = temp_path();
        let backend = JsonFileBackend::new(&path);
        assert_ok!(backend.save(&[]));
        assert!(assert_ok!(backend.load()).is_empty());

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let path = temp_path();
        std::fs::write(&path, b"{not json").unwrap();
        assert_err!(JsonFileBackend::new(&path).load());
        let _ = std::fs::remove_file(path);
    }
}
