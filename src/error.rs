use thiserror::Error;

pub type Result<T> = std::result::Result<T, EscrowError>;

#[derive(Error, Debug)]
pub enum EscrowError {
    /// Unknown request/order/dispute id. Surfaced to the caller, never retried.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The actor lacks the required relationship to the entity.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Operation attempted outside its legal source state. Carries the current
    /// state so the caller can decide to retry later or abandon.
    #[error("{operation} not allowed in state {current}")]
    InvalidState {
        operation: &'static str,
        current: String,
    },

    /// Payouts are blocked while a dispute holds the escrow frozen.
    #[error("escrow is frozen by an open dispute")]
    EscrowFrozen,

    /// A dispute can only be filed while funds are held.
    #[error("nothing to dispute: escrow is {0}")]
    NothingToDispute(String),

    #[error("validation error: {0}")]
    Validation(String),

    /// Gateway/network failure on refund or invoice lookup. Propagated as-is;
    /// the caller owns the retry, the core never re-issues money-moving calls.
    #[error("payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(Box<dyn std::error::Error + Send + Sync>),
}

impl EscrowError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn invalid_state(operation: &'static str, current: impl ToString) -> Self {
        Self::InvalidState {
            operation,
            current: current.to_string(),
        }
    }
}
