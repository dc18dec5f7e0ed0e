//! Resolve a part's active image through the store and load its bytes

use std::collections::HashSet;

use miette::{IntoDiagnostic, Result};
use rusqlite::{params, OptionalExtension};

use super::{AssetRef, AssetStore};
use crate::core::db::Store;
use crate::core::normalize::normalize_uniq;

/// Read-side bridge between image_asset rows and the blob store
pub struct AssetRepository<'a> {
    store: &'a Store,
    assets: &'a AssetStore,
}

impl<'a> AssetRepository<'a> {
    pub fn new(store: &'a Store, assets: &'a AssetStore) -> Self {
        Self { store, assets }
    }

    /// Reference to the active image for a part, matched on its normalized uniq code
    pub fn active_image_ref(&self, uniq_no: &str) -> Result<Option<AssetRef>> {
        self.store
            .conn()
            .query_row(
                "SELECT ia.storage_relpath, ia.sha256, ia.mime, ia.size_bytes
                 FROM image_asset ia
                 JOIN part p ON p.part_id = ia.part_id
                 WHERE p.uniq_no_norm = ?1 AND ia.active = 1
                 LIMIT 1",
                params![normalize_uniq(uniq_no)],
                |row| {
                    Ok(AssetRef {
                        storage_rel_path: row.get(0)?,
                        digest_hex: row.get(1)?,
                        mime: row.get(2)?,
                        size_bytes: row.get(3)?,
                    })
                },
            )
            .optional()
            .into_diagnostic()
    }

    pub fn load_image_bytes(&self, asset: &AssetRef) -> Result<Option<Vec<u8>>> {
        Ok(self.assets.get(asset)?)
    }

    /// Active image reference and bytes; `None` if either is missing
    pub fn load_active_image(&self, uniq_no: &str) -> Result<Option<(AssetRef, Vec<u8>)>> {
        let Some(asset) = self.active_image_ref(uniq_no)? else {
            return Ok(None);
        };
        Ok(self.load_image_bytes(&asset)?.map(|bytes| (asset, bytes)))
    }

    /// Every storage path any image_asset row points at, active or not
    pub fn referenced_paths(&self) -> Result<HashSet<String>> {
        let mut stmt = self
            .store
            .conn()
            .prepare("SELECT DISTINCT storage_relpath FROM image_asset")
            .into_diagnostic()?;
        let paths = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .into_diagnostic()?
            .collect::<rusqlite::Result<HashSet<_>>>()
            .into_diagnostic()?;
        Ok(paths)
    }
}
