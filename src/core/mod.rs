//! Core module - store lifecycle, export import and asset storage

pub mod assets;
pub mod bootstrap;
pub mod catalog;
pub mod config;
pub mod db;
pub mod normalize;

pub use assets::{AssetError, AssetRepository, AssetStore};
pub use bootstrap::{BootstrapError, BootstrapSummary, Bootstrapper};
pub use config::Config;
pub use db::{MigrationError, MigrationPath, SchemaMigrator, Store};
