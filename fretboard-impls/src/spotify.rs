use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use fretboard_core::{
    AudioFeatures, ExternalPlaylist, ExternalTrack, MusicProvider, MusicTokens, PlayedTrack,
    ProviderError, ProviderResult, SpotifyConfig,
};
use reqwest::Client;
use serde::Deserialize;
use url::form_urlencoded;

use crate::http::{json, request_error};

/// Spotify's accounts service and Web API
pub struct SpotifyMusic {
    client: Client,
    config: SpotifyConfig,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct SpotifyTrack {
    id: String,
    name: String,
    #[serde(default)]
    artists: Vec<Named>,
    album: Option<SpotifyAlbum>,
    duration_ms: Option<u32>,
    external_urls: Option<ExternalUrls>,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SpotifyAlbum {
    name: String,
    #[serde(default)]
    images: Vec<Image>,
}

#[derive(Debug, Deserialize)]
struct Image {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ExternalUrls {
    spotify: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: Page<SpotifyTrack>,
}

#[derive(Debug, Deserialize)]
struct SpotifyPlaylist {
    id: String,
    name: String,
    tracks: Option<TrackCount>,
    #[serde(default)]
    images: Option<Vec<Image>>,
    external_urls: Option<ExternalUrls>,
}

#[derive(Debug, Deserialize)]
struct TrackCount {
    total: u32,
}

#[derive(Debug, Deserialize)]
struct PlayHistory {
    track: SpotifyTrack,
    played_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct SpotifyFeatures {
    id: String,
    tempo: f32,
    key: i32,
    mode: i32,
    time_signature: i32,
    energy: f32,
    danceability: f32,
}

impl SpotifyMusic {
    const AUTHORIZE_URL: &'static str = "https://accounts.spotify.com/authorize";
    const TOKEN_URL: &'static str = "https://accounts.spotify.com/api/token";
    const API_URL: &'static str = "https://api.spotify.com/v1";
    const SCOPES: &'static str = "user-read-email playlist-read-private user-read-recently-played";

    pub fn new(config: SpotifyConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    async fn token(&self, form: &[(&str, &str)]) -> ProviderResult<MusicTokens> {
        if self.config.client_id.is_empty() {
            return Err(ProviderError::Unavailable);
        }

        let response = self
            .client
            .post(Self::TOKEN_URL)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(form)
            .send()
            .await
            .map_err(request_error)?;

        let tokens: TokenResponse = json(response).await?;

        Ok(MusicTokens {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_at: Utc::now() + Duration::seconds(tokens.expires_in),
        })
    }

    async fn api_get<T>(&self, access_token: &str, path: &str, query: &[(&str, &str)]) -> ProviderResult<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let response = self
            .client
            .get(format!("{}{}", Self::API_URL, path))
            .bearer_auth(access_token)
            .query(query)
            .send()
            .await
            .map_err(request_error)?;

        json(response).await
    }
}

#[async_trait]
impl MusicProvider for SpotifyMusic {
    fn authorize_url(&self, state: &str) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("client_id", &self.config.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("scope", Self::SCOPES)
            .append_pair("state", state)
            .finish();

        format!("{}?{}", Self::AUTHORIZE_URL, query)
    }

    async fn exchange_code(&self, code: &str) -> ProviderResult<MusicTokens> {
        self.token(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ])
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> ProviderResult<MusicTokens> {
        self.token(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    async fn search_tracks(
        &self,
        access_token: &str,
        query: &str,
    ) -> ProviderResult<Vec<ExternalTrack>> {
        let response: SearchResponse = self
            .api_get(
                access_token,
                "/search",
                &[("q", query), ("type", "track"), ("limit", "20")],
            )
            .await?;

        Ok(response.tracks.items.into_iter().map(Into::into).collect())
    }

    async fn playlists(&self, access_token: &str) -> ProviderResult<Vec<ExternalPlaylist>> {
        let page: Page<SpotifyPlaylist> = self
            .api_get(access_token, "/me/playlists", &[("limit", "50")])
            .await?;

        Ok(page.items.into_iter().map(Into::into).collect())
    }

    async fn recently_played(&self, access_token: &str) -> ProviderResult<Vec<PlayedTrack>> {
        let page: Page<PlayHistory> = self
            .api_get(access_token, "/me/player/recently-played", &[("limit", "50")])
            .await?;

        Ok(page
            .items
            .into_iter()
            .map(|h| PlayedTrack {
                track: h.track.into(),
                played_at: h.played_at,
            })
            .collect())
    }

    async fn audio_features(
        &self,
        access_token: &str,
        track_id: &str,
    ) -> ProviderResult<AudioFeatures> {
        let features: SpotifyFeatures = self
            .api_get(access_token, &format!("/audio-features/{track_id}"), &[])
            .await?;

        Ok(AudioFeatures {
            track_id: features.id,
            tempo: features.tempo,
            key: features.key,
            mode: features.mode,
            time_signature: features.time_signature,
            energy: features.energy,
            danceability: features.danceability,
        })
    }
}

impl From<SpotifyTrack> for ExternalTrack {
    fn from(track: SpotifyTrack) -> Self {
        let artist = track
            .artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        let (album, artwork) = match track.album {
            Some(album) => (
                Some(album.name),
                album.images.into_iter().next().map(|i| i.url),
            ),
            None => (None, None),
        };

        Self {
            id: track.id,
            title: track.name,
            artist,
            album,
            artwork,
            duration_ms: track.duration_ms,
            url: track.external_urls.and_then(|u| u.spotify),
        }
    }
}

impl From<SpotifyPlaylist> for ExternalPlaylist {
    fn from(playlist: SpotifyPlaylist) -> Self {
        Self {
            id: playlist.id,
            name: playlist.name,
            track_count: playlist.tracks.map(|t| t.total).unwrap_or_default(),
            artwork: playlist
                .images
                .and_then(|images| images.into_iter().next())
                .map(|i| i.url),
            url: playlist.external_urls.and_then(|u| u.spotify),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn spotify() -> SpotifyMusic {
        SpotifyMusic::new(SpotifyConfig {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "http://localhost:9050/v1/spotify/callback".to_string(),
        })
    }

    #[test]
    fn builds_authorize_urls() {
        let url = spotify().authorize_url("abc123");

        assert!(url.starts_with("https://accounts.spotify.com/authorize?client_id=client"));
        assert!(url.contains("state=abc123"));
        assert!(url.contains(
            "redirect_uri=http%3A%2F%2Flocalhost%3A9050%2Fv1%2Fspotify%2Fcallback"
        ));
        assert!(url.contains("scope=user-read-email+playlist-read-private"));
    }

    #[test]
    fn reads_tracks() {
        let raw = json!({
            "id": "4uLU6hMCjMI75M1A2tKUQC",
            "name": "Minor Swing",
            "artists": [{ "name": "Django Reinhardt" }, { "name": "Stéphane Grappelli" }],
            "album": { "name": "Djangology", "images": [{ "url": "https://i.scdn.co/a.jpg" }] },
            "duration_ms": 195000,
            "external_urls": { "spotify": "https://open.spotify.com/track/4uLU" }
        });

        let track: ExternalTrack = serde_json::from_value::<SpotifyTrack>(raw).unwrap().into();

        assert_eq!(track.artist, "Django Reinhardt, Stéphane Grappelli");
        assert_eq!(track.album.as_deref(), Some("Djangology"));
        assert_eq!(track.artwork.as_deref(), Some("https://i.scdn.co/a.jpg"));
        assert_eq!(track.url.as_deref(), Some("https://open.spotify.com/track/4uLU"));
    }

    #[test]
    fn reads_playlists_without_images() {
        let raw = json!({
            "id": "pl",
            "name": "Gypsy jazz",
            "tracks": { "total": 42 },
            "images": null
        });

        let playlist: ExternalPlaylist =
            serde_json::from_value::<SpotifyPlaylist>(raw).unwrap().into();

        assert_eq!(playlist.track_count, 42);
        assert_eq!(playlist.artwork, None);
    }

    #[tokio::test]
    async fn needs_credentials() {
        let music = SpotifyMusic::new(SpotifyConfig::default());
        let result = music.exchange_code("code").await;

        assert!(matches!(result, Err(ProviderError::Unavailable)));
    }
}
