//! SQLite storage bootstrap and store-location bookkeeping.
//!
//! # Responsibility
//! - Open and configure SQLite connections for slot stores.
//! - Create one table per model entity before a store may use the connection.
//! - Track which store files are open in this process.
//!
//! # Invariants
//! - Core code must not read/write slot data before entity tables are verified.
//! - A store file is open through at most one backend at a time.

use crate::mapping::MappingError;
use crate::model::schema::ModelError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

mod open;
mod registry;
pub(crate) mod tables;

pub use open::{open_connection, open_connection_in_memory};
pub use registry::{is_location_open, LocationLease};

pub type DbResult<T> = Result<T, DbError>;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    Io(std::io::Error),
    InvalidModel(ModelError),
    /// Another backend in this process already holds the store file.
    LocationInUse(PathBuf),
    SchemaMismatch {
        table: String,
        column: String,
    },
    /// A stored value does not decode to its attribute's kind.
    Decode(MappingError),
    NoActiveTransaction,
    TransactionAlreadyActive,
    /// The backend refused the operation for a reason of its own.
    Rejected(String),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "{err}"),
            Self::InvalidModel(err) => write!(f, "invalid data model: {err}"),
            Self::LocationInUse(path) => {
                write!(f, "store location `{}` is already open", path.display())
            }
            Self::SchemaMismatch { table, column } => {
                write!(f, "existing table `{table}` is missing column `{column}`")
            }
            Self::Decode(err) => write!(f, "invalid persisted slot data: {err}"),
            Self::NoActiveTransaction => write!(f, "no transaction is active"),
            Self::TransactionAlreadyActive => write!(f, "a transaction is already active"),
            Self::Rejected(message) => write!(f, "backend rejected operation: {message}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::InvalidModel(err) => Some(err),
            Self::Decode(err) => Some(err),
            Self::LocationInUse(_)
            | Self::SchemaMismatch { .. }
            | Self::NoActiveTransaction
            | Self::TransactionAlreadyActive
            | Self::Rejected(_) => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<std::io::Error> for DbError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<ModelError> for DbError {
    fn from(value: ModelError) -> Self {
        Self::InvalidModel(value)
    }
}

/// SQLite journal mode applied when a file connection is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JournalMode {
    #[default]
    Delete,
    Wal,
}

impl JournalMode {
    fn pragma_value(self) -> &'static str {
        match self {
            Self::Delete => "DELETE",
            Self::Wal => "WAL",
        }
    }
}

/// Connection options for SQLite-backed stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendOptions {
    /// How long a connection waits on a locked database file.
    pub busy_timeout: Duration,
    pub journal_mode: JournalMode,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            journal_mode: JournalMode::default(),
        }
    }
}

impl BackendOptions {
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn with_journal_mode(mut self, mode: JournalMode) -> Self {
        self.journal_mode = mode;
        self
    }
}
