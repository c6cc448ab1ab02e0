//! Persisted FIFO of pending updates.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use chronicle_types::Update;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{QueueError, QueueResult};

/// On-disk format version.
pub const QUEUE_FILE_VERSION: u32 = 1;

/// One pending update plus its delivery bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedUpdate {
    /// Acknowledgment token. Removal goes by this id, never by position.
    pub id: Uuid,
    pub enqueued_at: DateTime<Utc>,
    /// Failed apply attempts so far.
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub last_error: Option<String>,
    pub update: Update,
}

impl QueuedUpdate {
    fn new(update: Update) -> Self {
        Self {
            id: Uuid::new_v4(),
            enqueued_at: Utc::now(),
            attempts: 0,
            last_error: None,
            update,
        }
    }
}

#[derive(Serialize)]
struct QueueFileRef<'a> {
    version: u32,
    updates: &'a [QueuedUpdate],
}

#[derive(Deserialize)]
struct QueueFile {
    version: u32,
    updates: Vec<QueuedUpdate>,
}

/// Single owner of the queue's in-memory and on-disk state.
///
/// Every mutation takes the lock, changes the list, and rewrites the file
/// before releasing it. If the write fails the change is rolled back, so
/// memory never runs ahead of disk.
pub struct UpdateQueue {
    path: PathBuf,
    entries: Mutex<Vec<QueuedUpdate>>,
}

impl UpdateQueue {
    /// Open the queue at `path`, loading any updates left by a previous run.
    /// A missing file is an empty queue.
    pub async fn open(path: impl Into<PathBuf>) -> QueueResult<Self> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|source| QueueError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let entries = read_queue_file(&path).await?;
        info!(path = %path.display(), pending = entries.len(), "Update queue opened");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Add an update to the tail. The file has been written and synced by the
    /// time this returns `Ok`.
    pub async fn append(&self, update: Update) -> QueueResult<Uuid> {
        let entry = QueuedUpdate::new(update);
        let id = entry.id;
        let kind = entry.update.kind();

        let mut entries = self.entries.lock().await;
        entries.push(entry);
        if let Err(e) = write_queue_file(&self.path, &entries).await {
            entries.pop();
            return Err(e);
        }

        debug!(update_id = %id, kind = %kind, pending = entries.len(), "Appended update");
        Ok(id)
    }

    /// Copy of the pending updates in arrival order. Nothing is removed.
    pub async fn snapshot_pending(&self) -> Vec<QueuedUpdate> {
        self.entries.lock().await.clone()
    }

    /// Remove the entry with this id. Returns false when it was not queued.
    pub async fn remove(&self, id: Uuid) -> QueueResult<bool> {
        let mut entries = self.entries.lock().await;
        let Some(index) = entries.iter().position(|e| e.id == id) else {
            return Ok(false);
        };

        let removed = entries.remove(index);
        if let Err(e) = write_queue_file(&self.path, &entries).await {
            entries.insert(index, removed);
            return Err(e);
        }

        Ok(true)
    }

    /// Record a failed apply on the entry with this id. Returns the new
    /// attempt count, or `None` when the entry is no longer queued.
    pub async fn record_failure(&self, id: Uuid, error: &str) -> QueueResult<Option<u32>> {
        let mut entries = self.entries.lock().await;
        let Some(entry) = entries.iter_mut().find(|e| e.id == id) else {
            return Ok(None);
        };

        let previous = (entry.attempts, entry.last_error.take());
        entry.attempts += 1;
        entry.last_error = Some(error.to_string());
        let attempts = entry.attempts;

        if let Err(e) = write_queue_file(&self.path, &entries).await {
            if let Some(entry) = entries.iter_mut().find(|e| e.id == id) {
                (entry.attempts, entry.last_error) = previous;
            }
            return Err(e);
        }

        Ok(Some(attempts))
    }

    /// Replace in-memory state with what is on disk. Returns the pending count.
    pub async fn reload(&self) -> QueueResult<usize> {
        let mut entries = self.entries.lock().await;
        *entries = read_queue_file(&self.path).await?;
        Ok(entries.len())
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

async fn read_queue_file(path: &Path) -> QueueResult<Vec<QueuedUpdate>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(QueueError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    if bytes.iter().all(u8::is_ascii_whitespace) {
        warn!(path = %path.display(), "Queue file is empty, treating as no pending updates");
        return Ok(Vec::new());
    }

    let file: QueueFile = serde_json::from_slice(&bytes).map_err(|source| QueueError::Corrupt {
        path: path.to_path_buf(),
        source,
    })?;

    if file.version != QUEUE_FILE_VERSION {
        return Err(QueueError::UnsupportedVersion {
            path: path.to_path_buf(),
            version: file.version,
        });
    }

    Ok(file.updates)
}

/// Write to a sibling temp file, fsync, then rename over the real file so a
/// crash mid-write leaves the previous version intact. The directory is
/// fsynced after the rename so the new entry itself survives a power loss.
async fn write_queue_file(path: &Path, updates: &[QueuedUpdate]) -> QueueResult<()> {
    let body = serde_json::to_vec_pretty(&QueueFileRef {
        version: QUEUE_FILE_VERSION,
        updates,
    })?;

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    let io_err = |source: std::io::Error| QueueError::Io {
        path: tmp.clone(),
        source,
    };

    let mut file = fs::File::create(&tmp).await.map_err(io_err)?;
    file.write_all(&body).await.map_err(io_err)?;
    file.sync_all().await.map_err(io_err)?;
    drop(file);

    fs::rename(&tmp, path).await.map_err(|source| QueueError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    sync_dir(queue_dir(path)).await
}

/// Directory holding the queue file. A bare file name lives in `.`.
fn queue_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

#[cfg(unix)]
async fn sync_dir(dir: &Path) -> QueueResult<()> {
    let io_err = |source: std::io::Error| QueueError::Io {
        path: dir.to_path_buf(),
        source,
    };
    fs::File::open(dir).await.map_err(io_err)?.sync_all().await.map_err(io_err)
}

// Directories cannot be opened as files here; the rename is as durable as it gets.
#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> QueueResult<()> {
    Ok(())
}
