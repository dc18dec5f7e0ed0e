//! Local SQLite store for part master data
//!
//! The store is only ever handed out by [`SchemaMigrator::ensure_ready`], so
//! every [`Store`] is at [`TARGET_SCHEMA_VERSION`] with foreign keys enforced.

mod migrate;
mod reference;
mod schema;
mod split;

pub use migrate::{MigrationPath, SchemaMigrator};
pub(crate) use reference::ensure_known_lines;
pub use reference::DEFAULT_SUPPLIER_NAME;
pub use schema::TARGET_SCHEMA_VERSION;
pub use split::split_statements;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use miette::Diagnostic;
use rusqlite::{Connection, Transaction};
use thiserror::Error;

/// Suffixes SQLite uses for files living beside the main store file
pub(crate) const SIDECAR_SUFFIXES: &[&str] = &["-wal", "-shm", "-journal"];

/// Errors raised while bringing a store to the target schema
#[derive(Debug, Error, Diagnostic)]
pub enum MigrationError {
    #[error("schema migration failed at statement {index}: {source}")]
    #[diagnostic(
        code(partmaster::migrate::schema),
        help("the migration was rolled back; the store is unchanged")
    )]
    SchemaMigration {
        index: usize,
        statement: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("store file {} is corrupted and could not be recovered", .path.display())]
    #[diagnostic(
        code(partmaster::migrate::corrupted),
        help("the damaged file was moved aside once already; inspect or delete it and retry")
    )]
    StorageCorrupted {
        path: PathBuf,
        backup: Option<PathBuf>,
        #[source]
        source: rusqlite::Error,
    },

    #[error("store IO error: {0}")]
    #[diagnostic(code(partmaster::migrate::io))]
    Io(#[from] io::Error),

    #[error("store error: {0}")]
    #[diagnostic(code(partmaster::migrate::sqlite))]
    Sqlite(#[from] rusqlite::Error),
}

/// An open store at the target schema version
pub struct Store {
    conn: Connection,
    path: PathBuf,
    migration: MigrationPath,
    recovered_from: Option<PathBuf>,
}

impl Store {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Which migration path produced this handle
    pub fn migration(&self) -> MigrationPath {
        self.migration
    }

    /// Backup location of a corrupted file that was moved aside on open
    pub fn recovered_from(&self) -> Option<&Path> {
        self.recovered_from.as_deref()
    }

    pub fn schema_version(&self) -> rusqlite::Result<i32> {
        read_user_version(&self.conn)
    }

    /// Run `f` inside one transaction, committing only if it succeeds
    pub fn write<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        E: From<rusqlite::Error>,
        F: FnOnce(&Transaction<'_>) -> Result<T, E>,
    {
        let tx = self.conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Delete a store file and its sidecars
    ///
    /// The next [`SchemaMigrator::ensure_ready`] starts from an empty file.
    pub fn reset(path: &Path) -> io::Result<()> {
        for file in std::iter::once(path.to_path_buf()).chain(sidecar_paths(path)) {
            match fs::remove_file(&file) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

pub(crate) fn read_user_version(conn: &Connection) -> rusqlite::Result<i32> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
}

pub(crate) fn sidecar_paths(path: &Path) -> Vec<PathBuf> {
    SIDECAR_SUFFIXES
        .iter()
        .map(|suffix| {
            let mut name = path.as_os_str().to_owned();
            name.push(suffix);
            PathBuf::from(name)
        })
        .collect()
}
