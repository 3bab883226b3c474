use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ProviderResult;

/// OAuth tokens granted by the music provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MusicTokens {
    pub access_token: String,
    /// Not always returned on refresh, in which case the old one stays valid
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// A track as returned by the music provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalTrack {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub artwork: Option<String>,
    pub duration_ms: Option<u32>,
    pub url: Option<String>,
}

/// A recently played entry, the same track may show up several times
#[derive(Debug, Clone)]
pub struct PlayedTrack {
    pub track: ExternalTrack,
    pub played_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalPlaylist {
    pub id: String,
    pub name: String,
    pub track_count: u32,
    pub artwork: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioFeatures {
    pub track_id: String,
    pub tempo: f32,
    /// Pitch class, -1 when no key was detected
    pub key: i32,
    /// 1 for major, 0 for minor
    pub mode: i32,
    pub time_signature: i32,
    pub energy: f32,
    pub danceability: f32,
}

/// A music streaming provider reachable through OAuth2 (authorization code)
#[async_trait]
pub trait MusicProvider: Send + Sync {
    /// The URL the user is sent to for consent
    fn authorize_url(&self, state: &str) -> String;

    async fn exchange_code(&self, code: &str) -> ProviderResult<MusicTokens>;

    async fn refresh(&self, refresh_token: &str) -> ProviderResult<MusicTokens>;

    async fn search_tracks(&self, access_token: &str, query: &str)
        -> ProviderResult<Vec<ExternalTrack>>;

    async fn playlists(&self, access_token: &str) -> ProviderResult<Vec<ExternalPlaylist>>;

    async fn recently_played(&self, access_token: &str) -> ProviderResult<Vec<PlayedTrack>>;

    async fn audio_features(&self, access_token: &str, track_id: &str)
        -> ProviderResult<AudioFeatures>;
}
