//! Schema lifecycle: fast path, supplemental patch, hard replacement, and
//! one-shot recovery from a corrupted store file

use std::borrow::Cow;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use rusqlite::{Connection, ErrorCode};
use tracing::{debug, info, warn};

use super::reference;
use super::schema::{
    has_column, has_table, ADVANCED_TABLES, NORMALIZED_MARKER, SCHEMA_SQL,
    SUPPLEMENTAL_BASE_VERSION, SUPPLEMENTAL_COLUMNS, SUPPLEMENTAL_INDEXES, SUPPLEMENTAL_TABLES,
    TARGET_SCHEMA_VERSION,
};
use super::split::split_statements;
use super::{read_user_version, sidecar_paths, MigrationError, Store};

/// Which route [`SchemaMigrator::ensure_ready`] took
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationPath {
    /// Already at the target version with every expected object present
    FastPath,
    /// Additive objects were created on a normalized store
    SupplementalPatch,
    /// Every owned table was dropped and recreated
    HardReplacement,
}

impl fmt::Display for MigrationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationPath::FastPath => write!(f, "fast path"),
            MigrationPath::SupplementalPatch => write!(f, "supplemental patch"),
            MigrationPath::HardReplacement => write!(f, "hard replacement"),
        }
    }
}

/// Brings a store file to [`TARGET_SCHEMA_VERSION`]
pub struct SchemaMigrator {
    script: Cow<'static, str>,
}

impl Default for SchemaMigrator {
    fn default() -> Self {
        Self::new()
    }
}

/// Failure of a single open-and-migrate attempt
enum AttemptError {
    /// The file is not a usable database; eligible for one recovery
    Corrupt(rusqlite::Error),
    Fatal(MigrationError),
}

impl From<MigrationError> for AttemptError {
    fn from(e: MigrationError) -> Self {
        AttemptError::Fatal(e)
    }
}

impl From<rusqlite::Error> for AttemptError {
    fn from(e: rusqlite::Error) -> Self {
        if is_corruption(&e) {
            AttemptError::Corrupt(e)
        } else {
            AttemptError::Fatal(MigrationError::Sqlite(e))
        }
    }
}

impl SchemaMigrator {
    pub fn new() -> Self {
        Self {
            script: Cow::Borrowed(SCHEMA_SQL),
        }
    }

    /// Use a different hard-replacement script
    pub fn with_script(script: impl Into<String>) -> Self {
        Self {
            script: Cow::Owned(script.into()),
        }
    }

    /// Open `path`, migrating it as needed
    ///
    /// A file that SQLite rejects as not-a-database or malformed is moved to
    /// `<file>.corrupt-<timestamp>` and the migration is retried once.
    pub fn ensure_ready(&self, path: &Path) -> Result<Store, MigrationError> {
        let first = match self.attempt(path) {
            Ok(store) => return Ok(store),
            Err(AttemptError::Fatal(e)) => return Err(e),
            Err(AttemptError::Corrupt(e)) => e,
        };

        warn!(path = %path.display(), error = %first, "store file is corrupted, moving it aside");
        let backup = quarantine(path)?;
        info!(backup = %backup.display(), "retrying migration on a fresh store");

        match self.attempt(path) {
            Ok(mut store) => {
                store.recovered_from = Some(backup);
                Ok(store)
            }
            Err(AttemptError::Corrupt(source)) => Err(MigrationError::StorageCorrupted {
                path: path.to_path_buf(),
                backup: Some(backup),
                source,
            }),
            Err(AttemptError::Fatal(e)) => Err(e),
        }
    }

    fn attempt(&self, path: &Path) -> Result<Store, AttemptError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(MigrationError::from)?;
        }

        let mut conn = Connection::open(path)?;
        let version = read_user_version(&conn)?;
        conn.execute_batch("PRAGMA foreign_keys = OFF;")?;

        let (marker_table, marker_column) = NORMALIZED_MARKER;
        let normalized = has_column(&conn, marker_table, marker_column)?;
        let mut advanced = true;
        for table in ADVANCED_TABLES {
            advanced &= has_table(&conn, table)?;
        }

        let migration = if version >= TARGET_SCHEMA_VERSION && normalized && advanced {
            debug!(version, "store schema is current");
            MigrationPath::FastPath
        } else if normalized && version >= SUPPLEMENTAL_BASE_VERSION {
            apply_supplemental(&mut conn)?;
            MigrationPath::SupplementalPatch
        } else {
            self.apply_script(&mut conn)?;
            MigrationPath::HardReplacement
        };

        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA journal_mode = WAL;")?;

        let corrections = reference::reconcile(&mut conn)?;
        if corrections > 0 {
            info!(corrections, "reference data corrected");
        }

        info!(
            path = %path.display(),
            from_version = version,
            to_version = TARGET_SCHEMA_VERSION,
            %migration,
            "store ready"
        );

        Ok(Store {
            conn,
            path: path.to_path_buf(),
            migration,
            recovered_from: None,
        })
    }

    /// Run the full script in one transaction; any failure leaves the store untouched
    fn apply_script(&self, conn: &mut Connection) -> Result<(), MigrationError> {
        let tx = conn.transaction()?;
        for (index, statement) in split_statements(&self.script).into_iter().enumerate() {
            if let Err(source) = tx.execute_batch(&statement) {
                return Err(MigrationError::SchemaMigration {
                    index,
                    statement,
                    source,
                });
            }
        }
        tx.execute_batch(&format!("PRAGMA user_version = {};", TARGET_SCHEMA_VERSION))?;
        tx.commit()?;
        Ok(())
    }
}

/// Create the objects added since the supplemental base version
///
/// Every statement is guarded, so a second run changes nothing.
pub(crate) fn apply_supplemental(conn: &mut Connection) -> Result<(), MigrationError> {
    let tx = conn.transaction()?;
    let mut index = 0;

    let mut run = |sql: &str| -> Result<(), MigrationError> {
        let result = tx.execute_batch(sql);
        index += 1;
        result.map_err(|source| MigrationError::SchemaMigration {
            index: index - 1,
            statement: sql.to_string(),
            source,
        })
    };

    for sql in SUPPLEMENTAL_TABLES {
        run(sql)?;
    }
    for column in SUPPLEMENTAL_COLUMNS {
        if !has_column(&tx, column.table, column.column)? {
            run(column.ddl)?;
        }
    }
    for sql in SUPPLEMENTAL_INDEXES {
        run(sql)?;
    }

    tx.execute_batch(&format!("PRAGMA user_version = {};", TARGET_SCHEMA_VERSION))?;
    tx.commit()?;
    Ok(())
}

fn is_corruption(e: &rusqlite::Error) -> bool {
    matches!(
        e.sqlite_error_code(),
        Some(ErrorCode::NotADatabase) | Some(ErrorCode::DatabaseCorrupt)
    )
}

/// Move a damaged store file and its sidecars to a timestamped backup
fn quarantine(path: &Path) -> Result<PathBuf, MigrationError> {
    let stamp = Local::now().format("%Y%m%d%H%M%S").to_string();
    let mut backup = with_suffix(path, &format!(".corrupt-{}", stamp));
    let mut n = 1;
    while backup.exists() {
        backup = with_suffix(path, &format!(".corrupt-{}-{}", stamp, n));
        n += 1;
    }

    fs::rename(path, &backup)?;
    for sidecar in sidecar_paths(path) {
        if sidecar.exists() {
            let suffix = sidecar
                .to_string_lossy()
                .strip_prefix(path.to_string_lossy().as_ref())
                .map(str::to_string)
                .unwrap_or_default();
            fs::rename(&sidecar, with_suffix(&backup, &suffix))?;
        }
    }

    Ok(backup)
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}
