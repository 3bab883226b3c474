use fretboard_core::ProviderError;
use thiserror::Error;

use crate::DatabaseError;

pub type CollabResult<T> = Result<T, CollabError>;

/// Errors of the collab managers, the server maps each to a status code
#[derive(Debug, Error)]
pub enum CollabError {
    /// The feature needs a paid plan
    #[error("A paid plan is required")]
    PlanRequired,
    /// The user may see the resource, but not do this to it
    #[error("Not allowed: {0}")]
    Forbidden(&'static str),
    /// The resource exists but the user may not see it
    #[error("{0} not found")]
    NotFound(&'static str),
    /// The input was rejected, the message is shown to the user
    #[error("{0}")]
    Invalid(String),
    /// Every external source of a search failed
    #[error("All sources failed")]
    SourcesFailed,
    #[error(transparent)]
    Db(#[from] DatabaseError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl CollabError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}
