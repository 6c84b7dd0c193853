//! Content-addressed blob cache
//!
//! Downloaded files (avatars, ticket attachments) are stored under their
//! SHA-256 hash in a two-level directory layout, e.g. hash "abcd1234..."
//! lives at "blobs/ab/cd/abcd1234...".
//!
//! Every blob on disk is held by one or more [`BlobLease`]s. The file is
//! removed when the last lease drops, so a cached file never outlives
//! the view that displays it.

use crate::error::{AppError, Result};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Content-addressed blob store with reference-counted leases
#[derive(Clone)]
pub struct BlobStore {
    root: PathBuf,
    leases: Arc<Mutex<HashMap<String, usize>>>,
}

/// Scoped handle to a cached blob; the file is released on drop
#[derive(Debug)]
pub struct BlobLease {
    hash: String,
    path: PathBuf,
    len: usize,
    store: BlobStore,
}

impl std::fmt::Debug for BlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobStore").field("root", &self.root).finish()
    }
}

impl BlobStore {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            leases: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Create the root directory and drop blobs left by an earlier run
    pub async fn initialize(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await?;
        let removed = self.purge_unleased().await?;
        tracing::info!(
            "Blob store initialized at: {:?} ({} stale blobs removed)",
            self.root,
            removed
        );
        Ok(())
    }

    /// Store `data` and return a lease on it
    pub async fn acquire(&self, data: &[u8]) -> Result<BlobLease> {
        let hash = calculate_hash(data);

        // Count the lease before touching the disk so a concurrent
        // release of the same hash cannot delete the file under us
        let lease = self.lease(hash, data.len())?;
        self.write_at(&lease.path, data).await?;

        tracing::debug!("Leased blob: {} ({} bytes)", lease.hash, data.len());
        Ok(lease)
    }

    pub async fn read(&self, hash: &str) -> Result<Vec<u8>> {
        let path = self.get_path(hash)?;

        if !path.exists() {
            return Err(AppError::BlobStore(format!("Blob not found: {}", hash)));
        }

        Ok(fs::read(&path).await?)
    }

    pub fn exists(&self, hash: &str) -> bool {
        self.get_path(hash).map(|p| p.exists()).unwrap_or(false)
    }

    /// Number of live leases on a blob
    pub fn lease_count(&self, hash: &str) -> usize {
        self.leases
            .lock()
            .map(|leases| leases.get(hash).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All blob hashes currently on disk
    pub async fn list_all(&self) -> Result<Vec<String>> {
        let mut hashes = Vec::new();
        scan_directory(&self.root, &mut hashes).await?;
        Ok(hashes)
    }

    /// Remove every blob nobody holds a lease on
    pub async fn purge_unleased(&self) -> Result<usize> {
        let mut removed = 0;
        for hash in self.list_all().await? {
            if self.lease_count(&hash) == 0 {
                fs::remove_file(self.get_path(&hash)?).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn lease(&self, hash: String, len: usize) -> Result<BlobLease> {
        let path = self.get_path(&hash)?;
        let mut leases = self
            .leases
            .lock()
            .map_err(|_| AppError::BlobStore("Lease table poisoned".to_string()))?;
        *leases.entry(hash.clone()).or_insert(0) += 1;

        Ok(BlobLease {
            hash,
            path,
            len,
            store: self.clone(),
        })
    }

    async fn write_at(&self, path: &Path, data: &[u8]) -> Result<()> {
        if path.exists() {
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Each writer gets its own temp file; concurrent acquires of the
        // same bytes race only on the final rename
        let temp_path = path.with_extension(format!("{}.tmp", Uuid::new_v4()));
        if let Err(e) = write_temp(&temp_path, data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }

        match fs::rename(&temp_path, path).await {
            Ok(()) => Ok(()),
            Err(_) if path.exists() => {
                // Another writer landed the same content first
                let _ = fs::remove_file(&temp_path).await;
                Ok(())
            }
            Err(e) => {
                let _ = fs::remove_file(&temp_path).await;
                Err(e.into())
            }
        }
    }

    fn release(&self, hash: &str, path: &Path) {
        let Ok(mut leases) = self.leases.lock() else {
            return;
        };

        let remaining = match leases.get_mut(hash) {
            Some(count) => {
                *count = count.saturating_sub(1);
                *count
            }
            None => return,
        };

        if remaining == 0 {
            leases.remove(hash);
            // Removed while holding the table lock so a new lease waits
            match std::fs::remove_file(path) {
                Ok(()) => tracing::debug!("Released blob: {}", hash),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("Failed to remove blob {}: {}", hash, e),
            }
        }
    }

    fn get_path(&self, hash: &str) -> Result<PathBuf> {
        if !is_hash(hash) {
            return Err(AppError::BlobStore(format!("Invalid blob hash: {}", hash)));
        }
        Ok(self.root.join(&hash[0..2]).join(&hash[2..4]).join(hash))
    }
}

impl BlobLease {
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Location of the cached file, valid while the lease lives
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub async fn read(&self) -> Result<Vec<u8>> {
        self.store.read(&self.hash).await
    }
}

impl Clone for BlobLease {
    fn clone(&self) -> Self {
        if let Ok(mut leases) = self.store.leases.lock() {
            *leases.entry(self.hash.clone()).or_insert(0) += 1;
        }
        Self {
            hash: self.hash.clone(),
            path: self.path.clone(),
            len: self.len,
            store: self.store.clone(),
        }
    }
}

impl Drop for BlobLease {
    fn drop(&mut self) {
        self.store.release(&self.hash, &self.path);
    }
}

async fn write_temp(temp_path: &Path, data: &[u8]) -> Result<()> {
    let mut file = fs::File::create(temp_path).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    Ok(())
}

fn calculate_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

fn is_hash(value: &str) -> bool {
    value.len() == 64 && value.chars().all(|c| c.is_ascii_hexdigit())
}

fn scan_directory<'a>(
    dir: &'a Path,
    hashes: &'a mut Vec<String>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
    Box::pin(async move {
        if !dir.exists() {
            return Ok(());
        }

        let mut entries = fs::read_dir(dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();

            if path.is_dir() {
                scan_directory(&path, hashes).await?;
            } else if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if is_hash(name) {
                    hashes.push(name.to_string());
                }
            }
        }

        Ok(())
    })
}
