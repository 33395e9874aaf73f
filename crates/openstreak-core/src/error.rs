use std::fmt;
use std::path::PathBuf;

/// Machine-readable error codes for callers that branch on failure kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    MissingField,
    ReaderNotFound,
    NewsletterNotFound,
    CorruptStore,
    StorageUnavailable,
    LockContention,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::MissingField => "E2001",
            Self::ReaderNotFound => "E2002",
            Self::NewsletterNotFound => "E2003",
            Self::CorruptStore => "E3001",
            Self::StorageUnavailable => "E5001",
            Self::LockContention => "E5002",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Project not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::MissingField => "Required event field missing",
            Self::ReaderNotFound => "Reader not found",
            Self::NewsletterNotFound => "Newsletter not found",
            Self::CorruptStore => "Corrupt SQLite store",
            Self::StorageUnavailable => "Storage unavailable",
            Self::LockContention => "Lock contention",
        }
    }

    /// Snake-case name for JSON error payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotInitialized => "not_initialized",
            Self::ConfigParseError => "config_parse_error",
            Self::MissingField => "missing_field",
            Self::ReaderNotFound => "reader_not_found",
            Self::NewsletterNotFound => "newsletter_not_found",
            Self::CorruptStore => "corrupt_store",
            Self::StorageUnavailable => "storage_unavailable",
            Self::LockContention => "lock_contention",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `openstreak init` to create the store."),
            Self::ConfigParseError => Some("Fix syntax in .openstreak/config.toml and retry."),
            Self::MissingField => Some("Both 'email' and 'id' are required."),
            Self::ReaderNotFound | Self::NewsletterNotFound => None,
            Self::CorruptStore => Some("Restore the database from backup or re-run `openstreak init --force`."),
            Self::StorageUnavailable => Some("Check disk space and permissions, then retry the event."),
            Self::LockContention => Some("Retry after the other writer releases its lock."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors surfaced by the tracker to its callers.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// The event is missing a field the tracker cannot work without.
    #[error("missing required field '{field}': 'email' and 'id' are required")]
    MissingField { field: &'static str },

    #[error("reader '{0}' not found")]
    ReaderNotFound(String),

    #[error("newsletter '{0}' not found")]
    NewsletterNotFound(String),

    #[error("no store at {}", .path.display())]
    NotInitialized { path: PathBuf },

    #[error("store at {} is unreadable", .path.display())]
    CorruptStore { path: PathBuf },

    /// The store failed underneath a read or a write. Nothing was persisted.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl TrackerError {
    #[must_use]
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::MissingField { .. } => ErrorCode::MissingField,
            Self::ReaderNotFound(_) => ErrorCode::ReaderNotFound,
            Self::NewsletterNotFound(_) => ErrorCode::NewsletterNotFound,
            Self::NotInitialized { .. } => ErrorCode::NotInitialized,
            Self::CorruptStore { .. } => ErrorCode::CorruptStore,
            Self::Storage(err) if is_busy(err) => ErrorCode::LockContention,
            Self::Storage(_) => ErrorCode::StorageUnavailable,
        }
    }

    /// Remediation text for operators.
    #[must_use]
    pub fn suggestion(&self) -> String {
        self.error_code()
            .hint()
            .map_or_else(|| self.error_code().message().to_string(), str::to_string)
    }

    /// True when the caller may retry the same event unchanged.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// True when the event itself was unacceptable (HTTP 406 territory).
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::MissingField { .. })
    }
}

fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
    )
}
