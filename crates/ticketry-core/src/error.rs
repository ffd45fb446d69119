use std::fmt;

/// Machine-readable error codes so service layers can map failures to responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidArgument,
    TicketNotFound,
    VersionConflict,
    AllocationFailed,
    StoreFailure,
    CorruptRecord,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::InvalidArgument => "E2005",
            Self::TicketNotFound => "E2001",
            Self::VersionConflict => "E2006",
            Self::AllocationFailed => "E5003",
            Self::StoreFailure => "E5001",
            Self::CorruptRecord => "E3003",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::InvalidArgument => "Invalid argument",
            Self::TicketNotFound => "Ticket not found",
            Self::VersionConflict => "Ticket was modified concurrently",
            Self::AllocationFailed => "Ticket number allocation failed",
            Self::StoreFailure => "Ticket store failure",
            Self::CorruptRecord => "Corrupt ticket record",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and callers.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::InvalidArgument | Self::TicketNotFound => None,
            Self::VersionConflict => Some("Reload the ticket, re-apply the change, and save again."),
            Self::AllocationFailed => Some("Check that the counter table is reachable and writable."),
            Self::StoreFailure => Some("Retry once. If persistent, check the database file and disk."),
            Self::CorruptRecord => Some("Inspect the row with sqlite3; the stored value is out of range."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Failure reported by an [`crate::alloc::IdentifierAllocator`].
#[derive(Debug, thiserror::Error)]
#[error("failed to allocate next number from counter '{counter}'")]
pub struct AllocationError {
    /// Name of the counter that could not be incremented.
    pub counter: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AllocationError {
    pub fn new(
        counter: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            counter: counter.into(),
            source: Some(source.into()),
        }
    }

    /// An allocation failure with no underlying cause (e.g. missing counter row).
    pub fn missing(counter: impl Into<String>) -> Self {
        Self {
            counter: counter.into(),
            source: None,
        }
    }
}

/// Transport or query failure from the persistence collaborator.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A SQLite call failed; `op` names the store operation.
    #[error("{op} failed: {source}")]
    Sqlite {
        op: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    /// The database directory could not be prepared.
    #[error("prepare store directory {}: {source}", path.display())]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stored row holds a value the model cannot represent.
    #[error("corrupt ticket row {ticket_id}: {reason}")]
    Corrupt { ticket_id: String, reason: String },

    /// The connection mutex was poisoned by a panicking writer.
    #[error("store connection poisoned")]
    Poisoned,
}

/// Errors returned by ticket mutators, the lifecycle manager, and queries.
#[derive(Debug, thiserror::Error)]
pub enum TicketError {
    /// A required parameter was missing or malformed.
    #[error("invalid {param}: {reason}")]
    InvalidArgument { param: &'static str, reason: String },

    /// The lookup/update target does not exist or is soft-deleted.
    #[error("ticket not found: {key}")]
    NotFound { key: String },

    /// The stored ticket changed since it was loaded.
    #[error("ticket {ticket_id} was modified concurrently (expected version {expected})")]
    Conflict { ticket_id: String, expected: u64 },

    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TicketError {
    pub(crate) fn invalid(param: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            param,
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(key: impl fmt::Display) -> Self {
        Self::NotFound {
            key: key.to_string(),
        }
    }

    /// Machine-readable code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidArgument { .. } => ErrorCode::InvalidArgument,
            Self::NotFound { .. } => ErrorCode::TicketNotFound,
            Self::Conflict { .. } => ErrorCode::VersionConflict,
            Self::Allocation(_) => ErrorCode::AllocationFailed,
            Self::Store(StoreError::Corrupt { .. }) => ErrorCode::CorruptRecord,
            Self::Store(_) => ErrorCode::StoreFailure,
        }
    }

    /// Optional remediation hint for operators and callers.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}

/// Result alias used across the crate.
pub type Result<T, E = TicketError> = std::result::Result<T, E>;

/// Attach the store operation name to a raw SQLite result.
pub(crate) trait SqlResultExt<T> {
    fn op(self, op: &'static str) -> std::result::Result<T, StoreError>;
}

impl<T> SqlResultExt<T> for rusqlite::Result<T> {
    fn op(self, op: &'static str) -> std::result::Result<T, StoreError> {
        self.map_err(|source| StoreError::Sqlite { op, source })
    }
}

#[cfg(test)]
mod tests {
    use super::{AllocationError, ErrorCode, StoreError, TicketError};
    use std::collections::HashSet;
    use std::error::Error as _;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::InvalidArgument,
            ErrorCode::TicketNotFound,
            ErrorCode::VersionConflict,
            ErrorCode::AllocationFailed,
            ErrorCode::StoreFailure,
            ErrorCode::CorruptRecord,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::VersionConflict.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn kinds_map_to_distinct_codes() {
        let invalid = TicketError::invalid("status", "unknown code 9");
        assert_eq!(invalid.code(), ErrorCode::InvalidArgument);
        assert_eq!(invalid.to_string(), "invalid status: unknown code 9");

        let missing = TicketError::not_found("#42");
        assert_eq!(missing.code(), ErrorCode::TicketNotFound);

        let corrupt = TicketError::from(StoreError::Corrupt {
            ticket_id: "tk-1".into(),
            reason: "status 9".into(),
        });
        assert_eq!(corrupt.code(), ErrorCode::CorruptRecord);
        assert!(corrupt.hint().is_some());
    }

    #[test]
    fn store_errors_keep_their_cause() {
        let err = TicketError::from(StoreError::Sqlite {
            op: "count tickets",
            source: rusqlite::Error::QueryReturnedNoRows,
        });
        assert_eq!(err.code(), ErrorCode::StoreFailure);
        let source = err.source().expect("store error exposes its source");
        assert!(matches!(
            source.downcast_ref::<rusqlite::Error>(),
            Some(rusqlite::Error::QueryReturnedNoRows)
        ));
    }

    #[test]
    fn allocation_errors_keep_their_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "counter offline");
        let err = TicketError::from(AllocationError::new("tickets", io));
        assert_eq!(err.code(), ErrorCode::AllocationFailed);
        assert_eq!(
            err.to_string(),
            "failed to allocate next number from counter 'tickets'"
        );
        let cause = err.source().expect("allocation error carries the io cause");
        assert_eq!(cause.to_string(), "counter offline");
    }
}
