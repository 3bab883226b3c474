use async_trait::async_trait;
use fretboard_core::{ProviderResult, TabResult, TabSource};
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;

use crate::http::{json, request_error, USER_AGENT};

lazy_static! {
    static ref NON_SLUG: Regex = Regex::new(r"[^a-z0-9]+").unwrap();
}

/// Tabs from songsterr.com's public song search
pub struct SongsterrSource {
    client: Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SongsterrSong {
    song_id: u64,
    title: String,
    artist: String,
    #[serde(default)]
    has_chords: Option<bool>,
}

impl SongsterrSource {
    const SEARCH_URL: &'static str = "https://www.songsterr.com/api/songs";
    const RESULT_LIMIT: &'static str = "10";

    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for SongsterrSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TabSource for SongsterrSource {
    fn name(&self) -> &'static str {
        "songsterr"
    }

    async fn search(&self, query: &str) -> ProviderResult<Vec<TabResult>> {
        let response = self
            .client
            .get(Self::SEARCH_URL)
            .header("User-Agent", USER_AGENT)
            .query(&[("pattern", query), ("size", Self::RESULT_LIMIT)])
            .send()
            .await
            .map_err(request_error)?;

        let songs: Vec<SongsterrSong> = json(response).await?;

        Ok(songs
            .into_iter()
            .map(|song| TabResult {
                source: self.name().to_string(),
                url: song_url(&song),
                title: song.title,
                artist: Some(song.artist),
                has_chords: song.has_chords,
            })
            .collect())
    }
}

fn song_url(song: &SongsterrSong) -> String {
    format!(
        "https://www.songsterr.com/a/wsa/{}-{}-tab-s{}",
        slug(&song.artist),
        slug(&song.title),
        song.song_id
    )
}

fn slug(text: &str) -> String {
    NON_SLUG
        .replace_all(&text.to_lowercase(), "-")
        .trim_matches('-')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_song_urls() {
        let song: SongsterrSong = serde_json::from_str(
            r#"{"songId": 27, "title": "Sweet Child O' Mine", "artist": "Guns N' Roses"}"#,
        )
        .unwrap();

        assert_eq!(
            song_url(&song),
            "https://www.songsterr.com/a/wsa/guns-n-roses-sweet-child-o-mine-tab-s27"
        );
        assert_eq!(song.has_chords, None);
    }
}
