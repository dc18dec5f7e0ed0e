//! Configuration management with layered hierarchy
//!
//! Built-in defaults, then the global `config.yaml`, then `PARTMASTER_*`
//! environment variables. CLI flags are applied last by the caller.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::core::bootstrap::FALLBACK_LINE;

/// Entries kept in the asset read cache unless configured otherwise
pub const DEFAULT_CACHE_ENTRIES: usize = 128;

/// File name of the store under the data directory
pub const DATABASE_FILE: &str = "partmaster.db";

/// Asset root under the data directory
pub const ASSET_SUBDIR: &str = "assets_store/images/sha256";

#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Store file path
    pub database: Option<PathBuf>,

    /// Root of the content-addressed image store
    pub asset_root: Option<PathBuf>,

    /// Export directory read by `partmaster bootstrap`
    pub export_dir: Option<PathBuf>,

    /// Line code for rows whose line is not recognized
    pub default_line: Option<String>,

    pub asset_cache_entries: Option<usize>,
}

impl Config {
    /// Load configuration from all sources, merging in priority order
    pub fn load() -> Self {
        let mut config = Config::default();

        if let Some(global_path) = Self::global_config_path() {
            if let Some(global) = Self::read_file(&global_path) {
                config.merge(global);
            }
        }

        config.merge(Self::from_env(|key| std::env::var(key).ok()));
        config
    }

    /// Parse a YAML config file; unreadable or malformed files are ignored
    pub fn read_file(path: &Path) -> Option<Config> {
        let contents = std::fs::read_to_string(path).ok()?;
        match serde_yml::from_str::<Config>(&contents) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring malformed config file");
                None
            }
        }
    }

    /// Environment layer, read through `lookup` so tests need not touch the process env
    pub fn from_env(lookup: impl Fn(&str) -> Option<String>) -> Config {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Config {
            database: non_empty("PARTMASTER_DB").map(PathBuf::from),
            asset_root: non_empty("PARTMASTER_ASSETS").map(PathBuf::from),
            export_dir: non_empty("PARTMASTER_EXPORT").map(PathBuf::from),
            default_line: non_empty("PARTMASTER_DEFAULT_LINE"),
            asset_cache_entries: None,
        }
    }

    fn global_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("", "", "partmaster")
    }

    fn data_dir() -> PathBuf {
        Self::project_dirs()
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".partmaster"))
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: Config) {
        if other.database.is_some() {
            self.database = other.database;
        }
        if other.asset_root.is_some() {
            self.asset_root = other.asset_root;
        }
        if other.export_dir.is_some() {
            self.export_dir = other.export_dir;
        }
        if other.default_line.is_some() {
            self.default_line = other.default_line;
        }
        if other.asset_cache_entries.is_some() {
            self.asset_cache_entries = other.asset_cache_entries;
        }
    }

    pub fn database(&self) -> PathBuf {
        self.database
            .clone()
            .unwrap_or_else(|| Self::data_dir().join(DATABASE_FILE))
    }

    pub fn asset_root(&self) -> PathBuf {
        self.asset_root
            .clone()
            .unwrap_or_else(|| Self::data_dir().join(ASSET_SUBDIR))
    }

    /// Export directory, if one was configured anywhere
    pub fn export_dir(&self) -> Option<&Path> {
        self.export_dir.as_deref()
    }

    pub fn default_line(&self) -> &str {
        self.default_line.as_deref().unwrap_or(FALLBACK_LINE)
    }

    pub fn asset_cache_entries(&self) -> usize {
        self.asset_cache_entries.unwrap_or(DEFAULT_CACHE_ENTRIES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.database().ends_with(DATABASE_FILE));
        assert!(config.asset_root().ends_with(ASSET_SUBDIR));
        assert_eq!(config.default_line(), "press");
        assert_eq!(config.asset_cache_entries(), 128);
        assert!(config.export_dir().is_none());
    }

    #[test]
    fn test_yaml_file_layer() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("config.yaml");
        std::fs::write(
            &path,
            "database: /srv/pm/catalog.db\ndefault_line: sewing\nasset_cache_entries: 16\n",
        )
        .unwrap();

        let config = Config::read_file(&path).unwrap();
        assert_eq!(config.database(), PathBuf::from("/srv/pm/catalog.db"));
        assert_eq!(config.default_line(), "sewing");
        assert_eq!(config.asset_cache_entries(), 16);
    }

    #[test]
    fn test_malformed_yaml_is_ignored() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("config.yaml");
        std::fs::write(&path, "asset_cache_entries: [not, a, number]\n").unwrap();
        assert!(Config::read_file(&path).is_none());
        assert!(Config::read_file(&tmp.path().join("absent.yaml")).is_none());
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = Config {
            database: Some(PathBuf::from("/from/file.db")),
            default_line: Some("sewing".to_string()),
            asset_cache_entries: Some(4),
            ..Default::default()
        };

        let env: HashMap<&str, &str> = [
            ("PARTMASTER_DB", "/from/env.db"),
            ("PARTMASTER_EXPORT", "/exports/latest"),
            ("PARTMASTER_DEFAULT_LINE", "  "),
        ]
        .into_iter()
        .collect();
        config.merge(Config::from_env(|key| env.get(key).map(|v| v.to_string())));

        assert_eq!(config.database(), PathBuf::from("/from/env.db"));
        assert_eq!(config.export_dir(), Some(Path::new("/exports/latest")));
        // blank env values do not override
        assert_eq!(config.default_line(), "sewing");
        assert_eq!(config.asset_cache_entries(), 4);
    }
}
