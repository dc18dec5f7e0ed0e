//! Asset key and reference value types

use serde::{Deserialize, Serialize};

/// The only key kind the store accepts today
pub const PART_IMAGE_KIND: &str = "part_image";

/// The only media type the store accepts today
pub const PNG_MIME: &str = "image/png";

/// What the caller claims it is storing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetKey {
    /// Asset kind, currently always `part_image`
    pub kind: String,
    /// Part the asset belongs to (used in error messages)
    pub uniq_no: String,
    /// Claimed SHA-256 of the bytes, hex
    pub digest: String,
}

impl AssetKey {
    /// Key for a part image
    pub fn part_image(uniq_no: impl Into<String>, digest: impl Into<String>) -> Self {
        Self {
            kind: PART_IMAGE_KIND.to_string(),
            uniq_no: uniq_no.into(),
            digest: digest.into(),
        }
    }
}

/// Handle to a stored blob
///
/// `storage_rel_path` is relative to the asset store root and is only ever
/// resolved by [`super::AssetStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRef {
    pub storage_rel_path: String,
    pub digest_hex: String,
    pub mime: String,
    pub size_bytes: i64,
}

/// Outcome of re-hashing every blob under the store root
#[derive(Debug, Default)]
pub struct VerifyReport {
    pub blobs_checked: usize,
    /// Relative paths whose content no longer matches the digest in their name
    pub mismatched: Vec<String>,
    /// Files under the root that do not look like blobs (leftover temp files etc.)
    pub foreign: Vec<String>,
}

/// Outcome of a garbage-collection pass
#[derive(Debug, Default)]
pub struct GcReport {
    pub blobs_scanned: usize,
    /// Relative paths removed (or that would be removed, on a dry run)
    pub removed: Vec<String>,
    pub bytes_freed: u64,
}
