//! Shared utilities for CLI commands

use miette::Result;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::GlobalOpts;
use crate::core::assets::{AssetStore, LruByteCache};
use crate::core::config::Config;
use crate::core::db::{SchemaMigrator, Store};

/// Paths and settings resolved from config, environment and flags
pub struct Context {
    pub config: Config,
    pub db: PathBuf,
    pub asset_root: PathBuf,
}

impl Context {
    /// Flags win over everything `Config::load` merged
    pub fn resolve(global: &GlobalOpts) -> Self {
        let config = Config::load();
        let db = global.db.clone().unwrap_or_else(|| config.database());
        let asset_root = global.assets.clone().unwrap_or_else(|| config.asset_root());
        Self {
            config,
            db,
            asset_root,
        }
    }

    /// Run the migrator and hand back a ready store
    pub fn open_store(&self) -> Result<Store> {
        Ok(SchemaMigrator::new().ensure_ready(&self.db)?)
    }

    pub fn asset_store(&self) -> AssetStore {
        let cache = LruByteCache::new(self.config.asset_cache_entries());
        AssetStore::new(&self.asset_root).with_cache(Arc::new(cache))
    }
}

/// Pretty JSON on stdout
pub fn print_json(value: &serde_json::Value) -> Result<()> {
    let text = serde_json::to_string_pretty(value).map_err(|e| miette::miette!("{}", e))?;
    println!("{}", text);
    Ok(())
}
