//! Contracts of the third-party services fretboard talks to.
//! Implementations live in `fretboard-impls`.

use thiserror::Error;

mod billing;
mod music;
mod push;
mod recognition;
mod storage;
mod tabs;

pub use billing::*;
pub use music::*;
pub use push::*;
pub use recognition::*;
pub use storage::*;
pub use tabs::*;

pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider answered with a non-success status
    #[error("Provider responded with {code}: {message}")]
    Status { code: u16, message: String },

    #[error("Failed to reach provider: {0}")]
    Request(String),

    #[error("Failed to parse provider response: {0}")]
    Parse(String),

    /// The integration has no credentials configured
    #[error("Provider is not configured")]
    Unavailable,
}
