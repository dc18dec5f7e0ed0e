//! Content-addressed blob store for part images
//!
//! Blobs live under the store root at `<2-hex>/<sha256>.png`. A blob is
//! written once per digest and never modified afterwards:
//! - the claimed digest is checked against the bytes before anything is written
//! - writes go to a temp file in the shard directory and are renamed into place
//! - every relative path is checked for traversal before touching the filesystem

mod cache;
mod repository;
mod types;

pub use cache::{AssetByteCache, LruByteCache};
pub use repository::AssetRepository;
pub use types::*;

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use miette::Diagnostic;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Errors raised by the asset store
#[derive(Debug, Error, Diagnostic)]
pub enum AssetError {
    #[error("SHA-256 mismatch for {uniq_no}: expected {expected}, actual {actual}")]
    #[diagnostic(
        code(partmaster::asset::integrity),
        help("the bytes do not hash to the claimed digest; nothing was written")
    )]
    Integrity {
        uniq_no: String,
        expected: String,
        actual: String,
    },

    #[error("unsupported media type '{0}' (only {PNG_MIME} is accepted)")]
    #[diagnostic(code(partmaster::asset::unsupported_media))]
    UnsupportedMedia(String),

    #[error("unsupported asset kind '{0}'")]
    #[diagnostic(code(partmaster::asset::unsupported_kind))]
    UnsupportedKeyType(String),

    #[error("invalid SHA-256 digest '{0}'")]
    #[diagnostic(code(partmaster::asset::invalid_digest))]
    InvalidDigest(String),

    #[error("path traversal not allowed: {0}")]
    #[diagnostic(code(partmaster::asset::path_traversal))]
    PathTraversal(String),

    #[error("asset store IO error: {0}")]
    #[diagnostic(code(partmaster::asset::io))]
    Io(#[from] std::io::Error),
}

/// Content-addressed store rooted at a directory
pub struct AssetStore {
    root: PathBuf,
    cache: Option<Arc<dyn AssetByteCache>>,
}

impl AssetStore {
    /// Create a store rooted at `root` (created lazily on first write)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: None,
        }
    }

    /// Attach a read cache owned by this store
    pub fn with_cache(mut self, cache: Arc<dyn AssetByteCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Relative storage path for a (lowercase) digest; `None` if it has no shard prefix
    pub fn rel_path_for(digest: &str) -> Option<String> {
        let shard = digest.get(..2)?;
        Some(format!("{}/{}.png", shard, digest))
    }

    /// Store `bytes` under their digest
    ///
    /// Idempotent: if the blob already exists the call succeeds without
    /// rewriting it.
    pub fn put(&self, key: &AssetKey, bytes: &[u8], mime: &str) -> Result<AssetRef, AssetError> {
        if key.kind != PART_IMAGE_KIND {
            return Err(AssetError::UnsupportedKeyType(key.kind.clone()));
        }
        if mime != PNG_MIME {
            return Err(AssetError::UnsupportedMedia(mime.to_string()));
        }

        let expected = key.digest.to_ascii_lowercase();
        if !is_sha256_hex(&expected) {
            return Err(AssetError::InvalidDigest(key.digest.clone()));
        }

        let actual = sha256_hex(bytes);
        if actual != expected {
            return Err(AssetError::Integrity {
                uniq_no: key.uniq_no.clone(),
                expected,
                actual,
            });
        }

        let rel = Self::rel_path_for(&expected)
            .ok_or_else(|| AssetError::InvalidDigest(key.digest.clone()))?;
        let target = self.resolve(&rel)?;

        if !target.exists() {
            write_atomically(&target, bytes)?;
            debug!(path = %rel, size = bytes.len(), "stored asset blob");
        }

        if let Some(cache) = &self.cache {
            cache.put(&rel, Arc::new(bytes.to_vec()));
        }

        Ok(AssetRef {
            storage_rel_path: rel,
            digest_hex: expected,
            mime: mime.to_string(),
            size_bytes: bytes.len() as i64,
        })
    }

    /// Read a blob back; `None` when it is not on disk
    pub fn get(&self, asset: &AssetRef) -> Result<Option<Vec<u8>>, AssetError> {
        let path = self.resolve(&asset.storage_rel_path)?;

        if let Some(cache) = &self.cache {
            if let Some(bytes) = cache.get(&asset.storage_rel_path) {
                return Ok(Some(bytes.as_ref().clone()));
            }
        }

        if !path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(&path)?;
        if let Some(cache) = &self.cache {
            cache.put(&asset.storage_rel_path, Arc::new(bytes.clone()));
        }
        Ok(Some(bytes))
    }

    pub fn exists(&self, asset: &AssetRef) -> Result<bool, AssetError> {
        Ok(self.resolve(&asset.storage_rel_path)?.exists())
    }

    /// Remove a blob; `false` if it was absent or could not be removed
    pub fn delete(&self, asset: &AssetRef) -> Result<bool, AssetError> {
        let path = self.resolve(&asset.storage_rel_path)?;
        if !path.exists() {
            return Ok(false);
        }

        match fs::remove_file(&path) {
            Ok(()) => {
                if let Some(cache) = &self.cache {
                    cache.remove(&asset.storage_rel_path);
                }
                Ok(true)
            }
            Err(e) => {
                warn!(path = %asset.storage_rel_path, error = %e, "failed deleting asset");
                Ok(false)
            }
        }
    }

    /// Re-hash every blob under the root
    pub fn verify(&self) -> Result<VerifyReport, AssetError> {
        let mut report = VerifyReport::default();

        for (rel, path) in self.walk_files() {
            match blob_digest_from_rel(&rel) {
                Some(digest) => {
                    report.blobs_checked += 1;
                    let bytes = fs::read(&path)?;
                    if sha256_hex(&bytes) != digest {
                        report.mismatched.push(rel);
                    }
                }
                None => report.foreign.push(rel),
            }
        }

        Ok(report)
    }

    /// Delete every blob whose relative path is not in `referenced`
    pub fn gc(&self, referenced: &HashSet<String>, dry_run: bool) -> Result<GcReport, AssetError> {
        let mut report = GcReport::default();

        for (rel, path) in self.walk_files() {
            if blob_digest_from_rel(&rel).is_none() {
                continue;
            }
            report.blobs_scanned += 1;
            if referenced.contains(&rel) {
                continue;
            }

            let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            if !dry_run {
                fs::remove_file(&path)?;
                if let Some(cache) = &self.cache {
                    cache.remove(&rel);
                }
            }
            report.bytes_freed += size;
            report.removed.push(rel);
        }

        Ok(report)
    }

    /// Files under the root as (forward-slash relative path, absolute path)
    fn walk_files(&self) -> Vec<(String, PathBuf)> {
        if !self.root.exists() {
            return Vec::new();
        }

        let mut files: Vec<(String, PathBuf)> = WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                let rel = e
                    .path()
                    .strip_prefix(&self.root)
                    .ok()?
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().to_string())
                    .collect::<Vec<_>>()
                    .join("/");
                Some((rel, e.path().to_path_buf()))
            })
            .collect();
        files.sort();
        files
    }

    fn resolve(&self, rel: &str) -> Result<PathBuf, AssetError> {
        safe_resolve(&self.root, rel)
    }
}

/// Resolve `rel` against `root`, rejecting parent-directory segments
pub fn safe_resolve(root: &Path, rel: &str) -> Result<PathBuf, AssetError> {
    let normalized = rel.replace('\\', "/");
    let normalized = normalized.trim_start_matches('/');
    if normalized.is_empty() || normalized.split('/').any(|segment| segment.contains("..")) {
        return Err(AssetError::PathTraversal(rel.to_string()));
    }
    Ok(root.join(normalized))
}

/// Compute the lowercase hex SHA-256 of `bytes`
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn is_sha256_hex(value: &str) -> bool {
    value.len() == 64 && value.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Digest named by a `<2-hex>/<digest>.png` path, if it has that shape
fn blob_digest_from_rel(rel: &str) -> Option<String> {
    let (shard, file) = rel.split_once('/')?;
    let digest = file.strip_suffix(".png")?;
    if is_sha256_hex(digest) && digest.starts_with(shard) && shard.len() == 2 {
        Some(digest.to_string())
    } else {
        None
    }
}

/// Write to a unique temp file beside `target`, then rename over it
fn write_atomically(target: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = target.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "asset path has no parent")
    })?;
    fs::create_dir_all(parent)?;

    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let tmp = parent.join(format!("{}.tmp-{}", file_name, ulid::Ulid::new()));

    let result = (|| {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp, target)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}
