//! Disk store with a serial background writer.
//!
//! Every key maps to one file named after the SHA-256 of the key:
//!
//! ```text
//! {cache_dir}/{sha256(key) as hex}.cache
//! ```
//!
//! Writes and clears are queued to a single writer task and run in
//! submission order. The writer drains the queue in batches; a queued write
//! that is overwritten by a later queued write for the same key is skipped
//! and its completion fires together with the one that supersedes it.
//!
//! Reads are synchronous and hit the filesystem directly.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::r#trait::BlobStore;
use crate::cache::types::{CacheError, CacheKey, Completion, DiskStoreConfig};
use crate::cache::CacheStats;

/// Extension of persisted entries.
const ENTRY_EXTENSION: &str = "cache";

/// Extension of in-flight writes before they are renamed into place.
const TEMP_EXTENSION: &str = "tmp";

/// Most commands the writer takes off the queue at once.
const MAX_BATCH: usize = 64;

/// Work item for the writer task.
enum DiskCommand {
    Store {
        key: CacheKey,
        path: PathBuf,
        bytes: Vec<u8>,
        completion: Option<Completion>,
    },
    Clear {
        completion: Option<Completion>,
    },
    Flush {
        done: oneshot::Sender<()>,
    },
}

impl DiskCommand {
    /// Signal completion without doing the work.
    fn abandon(self) {
        match self {
            DiskCommand::Store { completion, .. } | DiskCommand::Clear { completion } => {
                if let Some(done) = completion {
                    done();
                }
            }
            DiskCommand::Flush { done } => {
                let _ = done.send(());
            }
        }
    }
}

/// File count and total size of a cache directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskUsage {
    pub files: u64,
    pub bytes: u64,
}

/// Persistent key-to-bytes store backed by one file per key.
pub struct DiskStore {
    /// Cache directory root
    directory: PathBuf,
    /// Queue feeding the writer task
    commands: mpsc::UnboundedSender<DiskCommand>,
    /// Handle to the writer task, taken on shutdown
    writer: Mutex<Option<JoinHandle<()>>>,
    /// Stops the writer after it drains queued work
    shutdown: CancellationToken,
    stats: Arc<Mutex<CacheStats>>,
}

impl DiskStore {
    /// Create the cache directory and start the writer task on `runtime`.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be created.
    pub fn start(config: DiskStoreConfig, runtime: &Handle) -> Result<Arc<Self>, CacheError> {
        fs::create_dir_all(&config.cache_dir)?;

        let (commands, receiver) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let stats = Arc::new(Mutex::new(CacheStats::new()));

        let writer = DiskWriter {
            directory: config.cache_dir.clone(),
            stats: Arc::clone(&stats),
            shutdown: shutdown.clone(),
        };
        let handle = runtime.spawn(writer.run(receiver));

        info!(dir = %config.cache_dir.display(), "Disk store started");

        Ok(Arc::new(Self {
            directory: config.cache_dir,
            commands,
            writer: Mutex::new(Some(handle)),
            shutdown,
            stats,
        }))
    }

    /// Cache directory root.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// File that holds (or would hold) the entry for `key`.
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.directory.join(key_to_filename(key))
    }

    /// Read the entry for `key`, reporting I/O failures.
    ///
    /// A missing file is `Ok(None)`.
    pub fn try_read(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::Io(e)),
        }
    }

    /// Resolve once every command queued before this call has run.
    pub async fn flush(&self) {
        let (done, waiter) = oneshot::channel();
        if let Err(mpsc::error::SendError(command)) =
            self.commands.send(DiskCommand::Flush { done })
        {
            command.abandon();
        }
        let _ = waiter.await;
    }

    /// Stop the writer after it finishes the work already queued.
    ///
    /// Later stores and clears complete immediately without touching disk.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        let handle = self.writer.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Disk writer task failed");
            }
        }

        debug!(dir = %self.directory.display(), "Disk store shut down");
    }

    /// Scan the cache directory for its current file count and size.
    pub fn usage(&self) -> Result<DiskUsage, CacheError> {
        disk_usage(&self.directory)
    }

    fn enqueue(&self, command: DiskCommand) {
        if let Err(mpsc::error::SendError(command)) = self.commands.send(command) {
            debug!(dir = %self.directory.display(), "Disk store is shut down, skipping");
            command.abandon();
        }
    }
}

impl BlobStore for DiskStore {
    fn store(&self, key: &CacheKey, bytes: Vec<u8>, completion: Option<Completion>) {
        self.enqueue(DiskCommand::Store {
            key: key.clone(),
            path: self.path_for(key),
            bytes,
            completion,
        });
    }

    fn read(&self, key: &CacheKey) -> Option<Vec<u8>> {
        match self.try_read(key) {
            Ok(Some(bytes)) => {
                self.stats.lock().record_disk_hit();
                Some(bytes)
            }
            Ok(None) => {
                self.stats.lock().record_disk_miss();
                None
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Disk read failed, treating as miss");
                self.stats.lock().record_disk_read_failure();
                None
            }
        }
    }

    fn clear(&self, completion: Option<Completion>) {
        self.enqueue(DiskCommand::Clear { completion });
    }

    fn stats(&self) -> CacheStats {
        self.stats.lock().clone()
    }
}

impl Drop for DiskStore {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// The writer task's state.
struct DiskWriter {
    directory: PathBuf,
    stats: Arc<Mutex<CacheStats>>,
    shutdown: CancellationToken,
}

impl DiskWriter {
    async fn run(self, mut commands: mpsc::UnboundedReceiver<DiskCommand>) {
        let mut batch = Vec::with_capacity(MAX_BATCH);

        loop {
            tokio::select! {
                biased;
                received = commands.recv_many(&mut batch, MAX_BATCH) => {
                    if received == 0 {
                        break;
                    }
                    self.process(&mut batch).await;
                }
                _ = self.shutdown.cancelled() => {
                    commands.close();
                    while commands.recv_many(&mut batch, MAX_BATCH).await > 0 {
                        self.process(&mut batch).await;
                    }
                    break;
                }
            }
        }

        debug!(dir = %self.directory.display(), "Disk writer stopped");
    }

    async fn process(&self, batch: &mut Vec<DiskCommand>) {
        let superseded = superseded_stores(batch);
        let mut deferred: HashMap<CacheKey, Vec<Completion>> = HashMap::new();

        for (index, command) in batch.drain(..).enumerate() {
            match command {
                DiskCommand::Store {
                    key,
                    path,
                    bytes,
                    completion,
                } => {
                    if superseded.contains(&index) {
                        debug!(key = %key, "Coalescing superseded disk write");
                        self.stats.lock().record_disk_write_coalesced();
                        if let Some(done) = completion {
                            deferred.entry(key).or_default().push(done);
                        }
                        continue;
                    }

                    match write_atomic(&path, &bytes).await {
                        Ok(()) => self.stats.lock().record_disk_write(),
                        Err(e) => {
                            warn!(
                                key = %key,
                                path = %path.display(),
                                error = %e,
                                "Disk write failed"
                            );
                            self.stats.lock().record_disk_write_failure();
                        }
                    }

                    for done in deferred.remove(&key).into_iter().flatten() {
                        complete(done);
                    }
                    if let Some(done) = completion {
                        complete(done);
                    }
                }
                DiskCommand::Clear { completion } => {
                    match clear_directory(&self.directory).await {
                        Ok(()) => {
                            info!(dir = %self.directory.display(), "Disk cache cleared");
                            self.stats.lock().record_disk_clear();
                        }
                        Err(e) => {
                            warn!(
                                dir = %self.directory.display(),
                                error = %e,
                                "Disk cache clear failed"
                            );
                        }
                    }
                    if let Some(done) = completion {
                        complete(done);
                    }
                }
                DiskCommand::Flush { done } => {
                    let _ = done.send(());
                }
            }
        }

        // Every superseded store has a later surviving store in the same
        // segment, so nothing should be left here.
        for done in deferred.into_values().flatten() {
            complete(done);
        }
    }
}

/// Run a caller's completion on the writer task.
///
/// A panicking completion is logged and contained so the writer keeps
/// serving later commands.
fn complete(done: Completion) {
    if catch_unwind(AssertUnwindSafe(done)).is_err() {
        warn!("Disk completion callback panicked");
    }
}

/// Indices of stores overwritten by a later store of the same key before
/// any clear or flush.
fn superseded_stores(batch: &[DiskCommand]) -> HashSet<usize> {
    let mut later: HashSet<&CacheKey> = HashSet::new();
    let mut superseded = HashSet::new();

    for (index, command) in batch.iter().enumerate().rev() {
        match command {
            DiskCommand::Store { key, .. } => {
                if !later.insert(key) {
                    superseded.insert(index);
                }
            }
            DiskCommand::Clear { .. } | DiskCommand::Flush { .. } => later.clear(),
        }
    }

    superseded
}

/// Write via a temp file and rename so readers never see a partial entry.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let temp_path = path.with_extension(TEMP_EXTENSION);
    if let Err(e) = tokio::fs::write(&temp_path, bytes).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e.into());
    }
    if let Err(e) = tokio::fs::rename(&temp_path, path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e.into());
    }
    Ok(())
}

/// Remove the whole cache directory and recreate it empty.
async fn clear_directory(directory: &Path) -> Result<(), CacheError> {
    match tokio::fs::remove_dir_all(directory).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    tokio::fs::create_dir_all(directory).await?;
    Ok(())
}

/// Generate the filename for a cache key.
///
/// SHA-256 keeps the mapping stable across builds and platforms and makes
/// any key safe to use as a filename.
pub fn key_to_filename(key: &CacheKey) -> String {
    let digest = Sha256::digest(key.as_str().as_bytes());
    format!("{:x}.{}", digest, ENTRY_EXTENSION)
}

/// Count the entries in a cache directory and sum their sizes.
///
/// A directory that does not exist is empty.
pub fn disk_usage(directory: &Path) -> Result<DiskUsage, CacheError> {
    let entries = match fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(DiskUsage::default()),
        Err(e) => return Err(e.into()),
    };

    let mut usage = DiskUsage::default();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(ENTRY_EXTENSION) {
            continue;
        }
        if let Ok(metadata) = entry.metadata() {
            if metadata.is_file() {
                usage.files += 1;
                usage.bytes += metadata.len();
            }
        }
    }
    Ok(usage)
}
