use thiserror::Error;

pub type Result<T> = std::result::Result<T, RepairError>;

/// Failures surfaced by the repair procedures and the catalog backends.
///
/// `Configuration` and `IllegalTableName` are caught before any mutation.
/// `Decode` is fatal to a scan; a corrupt metadata row is never skipped.
#[derive(Debug, Error)]
pub enum RepairError {
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The gap a plug was aimed at is already occupied.
    #[error("already a region in the gap: {0}")]
    Conflict(String),

    #[error("corrupt metadata row {row}: {reason}")]
    Decode { row: String, reason: String },

    /// The cluster stayed unavailable through the whole retry budget.
    #[error("cluster call failed after {attempts} attempts: {last}")]
    Transient { attempts: u32, last: String },

    #[error("illegal table name: {0}")]
    IllegalTableName(String),

    #[error("unknown table: {0}")]
    UnknownTable(String),

    #[error("storage error: {0}")]
    Storage(#[from] fjall::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("descriptor encoding failed: {0}")]
    Encode(#[source] serde_json::Error),
}
