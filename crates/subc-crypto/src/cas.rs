//! # Content-Addressed Blob Storage
//!
//! Where published profile documents live. A document is canonicalized
//! with JCS, its SHA-256 digest becomes its content id (`sha256:<hex>`),
//! and the canonical bytes are written under that id.
//!
//! ## Integrity Invariant
//!
//! Every load recomputes the digest of the stored bytes and compares it
//! with the requested id. A blob that was corrupted or swapped on disk is
//! reported as [`StoreError::Integrity`], never returned.
//! Saving over an existing blob re-verifies it and rewrites it when the
//! check fails, so an interrupted write is repaired by the next save.
//!
//! Two backends: [`MemoryBlobStore`] for tests and single-process use, and
//! [`FsBlobStore`] writing `{root}/{digest_hex}.json`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use subc_core::{sha256_digest, CanonicalBytes, CanonicalizationError, ContentDigest, ContentId};
use thiserror::Error;

/// Error from a blob store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No blob is stored under the id.
    #[error("blob not found: {0}")]
    NotFound(ContentId),

    /// Stored bytes do not hash to the id they were requested by, or the
    /// id itself is malformed.
    #[error("integrity violation for {id}: {reason}")]
    Integrity {
        /// Requested content id.
        id: ContentId,
        /// What did not match.
        reason: String,
    },

    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The document could not be canonicalized.
    #[error("serialization error: {0}")]
    Serialization(#[from] CanonicalizationError),

    /// Stored bytes are not JSON.
    #[error("stored blob is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Storage for JSON documents addressed by content digest.
pub trait BlobStore {
    /// Store `document` and return its content id. Saving the same content
    /// twice returns the same id.
    fn save(&mut self, document: &Value) -> Result<ContentId, StoreError>;

    /// Load the document stored under `id`, verifying its digest.
    fn load(&self, id: &ContentId) -> Result<Value, StoreError>;
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Canonicalize a document and compute its content id.
pub fn content_id_of(document: &Value) -> Result<(ContentId, CanonicalBytes), StoreError> {
    let canonical = CanonicalBytes::new(document)?;
    let id = sha256_digest(&canonical).content_id();
    Ok((id, canonical))
}

/// Extract the 64-char hex digest from a `sha256:<hex>` id.
fn digest_hex(id: &ContentId) -> Result<&str, StoreError> {
    let hex = id
        .as_str()
        .strip_prefix("sha256:")
        .ok_or_else(|| StoreError::Integrity {
            id: id.clone(),
            reason: "content id must start with sha256:".into(),
        })?;
    if hex.len() != 64 || !hex.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)) {
        return Err(StoreError::Integrity {
            id: id.clone(),
            reason: "digest must be 64 lowercase hex chars".into(),
        });
    }
    Ok(hex)
}

/// Parse stored bytes and check they hash to `id`.
fn verify_blob(id: &ContentId, bytes: &[u8]) -> Result<Value, StoreError> {
    let value: Value = serde_json::from_slice(bytes)?;
    let (recomputed, _) = content_id_of(&value)?;
    if recomputed != *id {
        return Err(StoreError::Integrity {
            id: id.clone(),
            reason: format!("stored content hashes to {recomputed}"),
        });
    }
    Ok(value)
}

// ---------------------------------------------------------------------------
// MemoryBlobStore
// ---------------------------------------------------------------------------

/// In-memory blob store.
#[derive(Debug, Default, Clone)]
pub struct MemoryBlobStore {
    blobs: BTreeMap<ContentId, Vec<u8>>,
}

impl MemoryBlobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// Whether a blob is stored under `id`.
    pub fn contains(&self, id: &ContentId) -> bool {
        self.blobs.contains_key(id)
    }

    /// Overwrite the bytes stored under `id` without re-addressing them.
    /// Lets tests simulate a corrupted backend.
    pub fn insert_raw(&mut self, id: ContentId, bytes: Vec<u8>) {
        self.blobs.insert(id, bytes);
    }
}

impl BlobStore for MemoryBlobStore {
    fn save(&mut self, document: &Value) -> Result<ContentId, StoreError> {
        let (id, canonical) = content_id_of(document)?;
        self.blobs
            .entry(id.clone())
            .or_insert_with(|| canonical.as_bytes().to_vec());
        tracing::debug!(id = %id, bytes = canonical.len(), "saved blob to memory store");
        Ok(id)
    }

    fn load(&self, id: &ContentId) -> Result<Value, StoreError> {
        let bytes = self
            .blobs
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        verify_blob(id, bytes)
    }
}

// ---------------------------------------------------------------------------
// FsBlobStore
// ---------------------------------------------------------------------------

/// Filesystem blob store writing `{root}/{digest_hex}.json`.
///
/// The root directory is created on first save.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Create a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path a blob with the given digest is stored at.
    pub fn path_for(&self, digest: &ContentDigest) -> PathBuf {
        self.root.join(format!("{}.json", digest.to_hex()))
    }

    fn path_for_id(&self, id: &ContentId) -> Result<PathBuf, StoreError> {
        Ok(self.root.join(format!("{}.json", digest_hex(id)?)))
    }

    /// Overwrite `path` by writing a sibling temp file and renaming it over.
    fn replace(&self, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes)?;
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }
}

impl BlobStore for FsBlobStore {
    fn save(&mut self, document: &Value) -> Result<ContentId, StoreError> {
        let (id, canonical) = content_id_of(document)?;
        fs::create_dir_all(&self.root)?;
        let path = self.path_for_id(&id)?;
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(mut f) => {
                use std::io::Write;
                let written = f.write_all(canonical.as_bytes()).and_then(|()| f.sync_all());
                drop(f);
                if let Err(e) = written {
                    let _ = fs::remove_file(&path);
                    return Err(e.into());
                }
            }
            // Same digest, same content, unless an earlier write was cut short.
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let existing = fs::read(&path)?;
                if let Err(err) = verify_blob(&id, &existing) {
                    tracing::warn!(
                        id = %id,
                        path = %path.display(),
                        error = %err,
                        "replacing damaged blob"
                    );
                    self.replace(&path, canonical.as_bytes())?;
                }
            }
            Err(e) => return Err(e.into()),
        }
        tracing::debug!(id = %id, path = %path.display(), "saved blob to filesystem store");
        Ok(id)
    }

    fn load(&self, id: &ContentId) -> Result<Value, StoreError> {
        let path = self.path_for_id(id)?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id.clone()))
            }
            Err(e) => return Err(e.into()),
        };
        let value = verify_blob(id, &bytes);
        if let Err(StoreError::Integrity { reason, .. }) = &value {
            tracing::warn!(id = %id, path = %path.display(), %reason, "blob failed integrity check");
        }
        value
    }
}
