use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::ProviderResult;

/// The best match for a recorded audio sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionMatch {
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub release_date: Option<String>,
    /// Where in the song the sample was found, like "00:56"
    pub timecode: Option<String>,
    pub song_link: Option<String>,
    pub spotify_id: Option<String>,
}

/// An audio recognition service
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Identifies the audio, returning `None` if nothing matched
    async fn recognize(&self, audio: Bytes, filename: &str)
        -> ProviderResult<Option<RecognitionMatch>>;
}
