use async_trait::async_trait;
use bytes::Bytes;
use fretboard_core::{ProviderError, ProviderResult, RecognitionMatch, Recognizer};
use reqwest::{
    multipart::{Form, Part},
    Client,
};
use serde::Deserialize;

use crate::http::{json, parse_error, request_error};

/// Audio recognition through audd.io
pub struct AuddRecognizer {
    client: Client,
    api_token: String,
}

#[derive(Debug, Deserialize)]
struct AuddResponse {
    status: String,
    result: Option<AuddResult>,
    error: Option<AuddError>,
}

#[derive(Debug, Deserialize)]
struct AuddError {
    error_code: u16,
    error_message: String,
}

#[derive(Debug, Deserialize)]
struct AuddResult {
    title: String,
    artist: String,
    album: Option<String>,
    release_date: Option<String>,
    timecode: Option<String>,
    song_link: Option<String>,
    spotify: Option<AuddSpotify>,
}

#[derive(Debug, Deserialize)]
struct AuddSpotify {
    id: String,
}

impl AuddRecognizer {
    const API_URL: &'static str = "https://api.audd.io/";

    pub fn new<S>(api_token: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            client: Client::new(),
            api_token: api_token.into(),
        }
    }
}

#[async_trait]
impl Recognizer for AuddRecognizer {
    async fn recognize(
        &self,
        audio: Bytes,
        filename: &str,
    ) -> ProviderResult<Option<RecognitionMatch>> {
        if self.api_token.is_empty() {
            return Err(ProviderError::Unavailable);
        }

        let file = Part::stream(audio).file_name(filename.to_string());

        let form = Form::new()
            .text("api_token", self.api_token.clone())
            .text("return", "spotify")
            .part("file", file);

        let response = self
            .client
            .post(Self::API_URL)
            .multipart(form)
            .send()
            .await
            .map_err(request_error)?;

        let body: AuddResponse = json(response).await?;
        into_match(body)
    }
}

/// AudD answers 200 even for failures, the status field tells them apart
fn into_match(response: AuddResponse) -> ProviderResult<Option<RecognitionMatch>> {
    if response.status != "success" {
        return Err(match response.error {
            Some(error) => ProviderError::Status {
                code: 502,
                message: format!("AudD error {}: {}", error.error_code, error.error_message),
            },
            None => parse_error(format!("unexpected status {}", response.status)),
        });
    }

    Ok(response.result.map(|result| RecognitionMatch {
        title: result.title,
        artist: result.artist,
        album: result.album,
        release_date: result.release_date,
        timecode: result.timecode,
        song_link: result.song_link,
        spotify_id: result.spotify.map(|s| s.id),
    }))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parse(value: serde_json::Value) -> ProviderResult<Option<RecognitionMatch>> {
        into_match(serde_json::from_value(value).unwrap())
    }

    #[test]
    fn reads_matches() {
        let found = parse(json!({
            "status": "success",
            "result": {
                "artist": "Django Reinhardt",
                "title": "Minor Swing",
                "album": "Djangology",
                "release_date": "1937-11-25",
                "label": "Swing",
                "timecode": "00:56",
                "song_link": "https://lis.tn/MinorSwing",
                "spotify": { "id": "4uLU6hMCjMI75M1A2tKUQC", "popularity": 50 }
            }
        }))
        .unwrap()
        .unwrap();

        assert_eq!(found.title, "Minor Swing");
        assert_eq!(found.timecode.as_deref(), Some("00:56"));
        assert_eq!(found.spotify_id.as_deref(), Some("4uLU6hMCjMI75M1A2tKUQC"));
    }

    #[test]
    fn no_match_is_not_an_error() {
        let found = parse(json!({ "status": "success", "result": null })).unwrap();
        assert_eq!(found, None);
    }

    #[test]
    fn reports_api_errors() {
        let result = parse(json!({
            "status": "error",
            "error": { "error_code": 901, "error_message": "Recognition failed" }
        }));

        assert!(matches!(
            result,
            Err(ProviderError::Status { code: 502, message }) if message.contains("901")
        ));
    }
}
