use thiserror::Error;

use crate::Colour;

/// Errors raised by the simulation backend or the retry layer around it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("backend unavailable after {attempts} attempts")]
    Unavailable { attempts: u32 },

    #[error("backend call timed out")]
    Timeout,

    #[error("backend has no entity named '{0}'")]
    UnknownEntity(String),

    #[error("backend rejected request: {0}")]
    Rejected(String),
}

impl BackendError {
    /// Availability problems are worth retrying; everything else is final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BackendError::Unavailable { .. } | BackendError::Timeout)
    }
}

/// Rejection sampling could not produce a valid placement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlacementError {
    #[error("no free cluster location for {colour} after {attempts} attempts")]
    ClusterExhausted { colour: Colour, attempts: u32 },

    #[error("no free item position in {cluster_id} after {attempts} attempts")]
    ItemExhausted { cluster_id: String, attempts: u32 },

    #[error("unknown cluster '{0}'")]
    UnknownCluster(String),
}

/// Errors returned by arena operations and the service handle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArenaError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Placement(#[from] PlacementError),

    #[error("arena service is no longer running")]
    ServiceClosed,
}

impl ArenaError {
    /// True when the backend could not be reached; trying again later may succeed.
    pub fn is_backend_unavailable(&self) -> bool {
        matches!(self, ArenaError::Backend(e) if e.is_retryable())
    }
}
