use crate::types::{BoardId, ConnectionId, ShareId};
use thiserror::Error;

/// Errors reported back to whoever issued a board or share request.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("missing parameter: {0}")]
    MissingParameter(&'static str),

    #[error("board not found: {0}")]
    BoardNotFound(BoardId),

    #[error("share link not found: {0}")]
    ShareNotFound(ShareId),

    #[error("share link expired: {0}")]
    ShareExpired(ShareId),

    #[error("unknown connection: {0}")]
    UnknownConnection(ConnectionId),

    #[error("persistence failure: {0}")]
    PersistenceFailure(#[from] PersistenceError),
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Only produced by storages that simulate outages.
    #[error("storage unavailable")]
    Unavailable,
}

/// Why a push to a live viewer was dropped.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("connection closed")]
    Closed,

    #[error("outbox full")]
    Full,
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::BoardNotFound(_) | StoreError::ShareNotFound(_)
        )
    }
}
