//! Request bodies and query strings accepted by the endpoints

use std::collections::HashMap;

use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Request},
    Json,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use fretboard_collab::SongStatus;
use serde::{de::DeserializeOwned, Deserialize};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationErrors};

use crate::errors::{ServerError, ServerResult};

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LoginSchema {
    #[validate(length(max = 32))]
    pub username: String,
    #[validate(length(max = 128))]
    pub password: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegisterSchema {
    #[validate(length(min = 1, max = 64, message = "Le nom affiché est requis"))]
    pub display_name: String,
    #[validate(length(
        min = 3,
        max = 32,
        message = "Le nom d'utilisateur doit contenir entre 3 et 32 caractères"
    ))]
    pub username: String,
    #[validate(length(
        min = 8,
        max = 128,
        message = "Le mot de passe doit contenir au moins 8 caractères"
    ))]
    pub password: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProfileUpdateSchema {
    #[validate(length(max = 64))]
    pub display_name: Option<String>,
    #[validate(url(message = "L'URL de l'avatar est invalide"))]
    pub avatar_url: Option<String>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SongSchema {
    #[validate(length(max = 200))]
    pub title: String,
    #[validate(length(max = 200))]
    pub artist: String,
    #[schema(value_type = Option<String>, example = "learning")]
    pub status: Option<SongStatus>,
    #[validate(range(min = 1, max = 5, message = "La difficulté doit être entre 1 et 5"))]
    pub difficulty: Option<i32>,
    #[validate(length(max = 64))]
    pub tuning: Option<String>,
    #[validate(url(message = "L'URL de la tablature est invalide"))]
    pub tab_url: Option<String>,
    pub spotify_id: Option<String>,
    #[validate(length(max = 5000))]
    pub notes: Option<String>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SongUpdateSchema {
    #[validate(length(max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 200))]
    pub artist: Option<String>,
    #[schema(value_type = Option<String>, example = "mastered")]
    pub status: Option<SongStatus>,
    #[validate(range(min = 1, max = 5, message = "La difficulté doit être entre 1 et 5"))]
    pub difficulty: Option<i32>,
    #[validate(length(max = 64))]
    pub tuning: Option<String>,
    #[validate(url(message = "L'URL de la tablature est invalide"))]
    pub tab_url: Option<String>,
    #[validate(length(max = 5000))]
    pub notes: Option<String>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WishlistSchema {
    #[validate(length(max = 200))]
    pub title: String,
    #[validate(length(max = 200))]
    pub artist: String,
    pub spotify_id: Option<String>,
    #[validate(length(max = 5000))]
    pub notes: Option<String>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PlaylistSchema {
    #[validate(length(max = 100))]
    pub name: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PlaylistSongSchema {
    pub song_id: i32,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PracticeSchema {
    pub song_id: Option<i32>,
    #[validate(range(min = 1, max = 600, message = "La durée doit être comprise entre 1 et 600 minutes"))]
    pub duration_minutes: i32,
    #[validate(length(max = 5000))]
    pub notes: Option<String>,
    pub practiced_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct PracticeQuery {
    /// Only sessions practiced at or after this time
    pub since: Option<DateTime<Utc>>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExerciseSchema {
    #[validate(length(min = 1, max = 100, message = "L'exercice est requis"))]
    pub exercise_id: String,
    #[validate(range(min = 1, max = 400, message = "Le tempo doit être compris entre 1 et 400 BPM"))]
    pub bpm: i32,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BandSchema {
    #[validate(length(max = 100))]
    pub name: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UsernameSchema {
    #[validate(length(min = 1, max = 32, message = "Le nom d'utilisateur est requis"))]
    pub username: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SetlistSchema {
    #[validate(length(max = 200))]
    pub title: String,
    /// Makes this a band setlist
    pub band_id: Option<i32>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SetlistUpdateSchema {
    #[validate(length(max = 200))]
    pub title: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SetlistSongsSchema {
    /// Songs in performance order
    #[validate(length(max = 200, message = "Une setlist contient au plus 200 morceaux"))]
    pub song_ids: Vec<i32>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct JamSchema {
    #[validate(length(max = 200))]
    pub title: String,
    /// Restricts the jam to a band
    pub band_id: Option<i32>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct JamMessageSchema {
    #[validate(length(
        min = 1,
        max = 1000,
        message = "Le message doit contenir entre 1 et 1000 caractères"
    ))]
    pub content: String,
}

/// The JSON form of a browser `PushSubscription`
#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushSubscriptionSchema {
    #[validate(url(message = "Abonnement push invalide"))]
    pub endpoint: String,
    pub keys: PushKeysSchema,
}

#[derive(Debug, ToSchema, Deserialize)]
pub struct PushKeysSchema {
    pub p256dh: String,
    pub auth: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushEndpointSchema {
    pub endpoint: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PlanSchema {
    /// One of "pro" or "band"
    #[schema(example = "pro")]
    pub plan: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SpotifyCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set when the user refused access
    pub error: Option<String>,
}

/// The multipart form of a cover upload, only used for the docs
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct CoverUploadForm {
    pub title: String,
    #[schema(rename = "songId")]
    pub song_id: Option<i32>,
    /// An audio or video file
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

/// The multipart form of a recognition request, only used for the docs
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct RecognizeForm {
    /// A short audio recording
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

/// A file read from a multipart form
pub struct UploadedFile {
    pub filename: Option<String>,
    pub content_type: String,
    pub data: Bytes,
}

/// Reads the text fields and the `file` field of a multipart form
pub async fn read_form(mut multipart: Multipart) -> ServerResult<(HashMap<String, String>, Option<UploadedFile>)> {
    let invalid = |_| ServerError::BadRequest("Formulaire invalide".to_string());

    let mut fields = HashMap::new();
    let mut file = None;

    while let Some(field) = multipart.next_field().await.map_err(invalid)? {
        let name = field.name().unwrap_or_default().to_string();

        if name == "file" {
            let filename = field.file_name().map(str::to_string);
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let data = field.bytes().await.map_err(invalid)?;

            file = Some(UploadedFile {
                filename,
                content_type,
                data,
            });
        } else {
            let value = field.text().await.map_err(invalid)?;
            fields.insert(name, value);
        }
    }

    Ok((fields, file))
}

/// Json that is validated before it reaches the handler
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|_| ServerError::BadRequest("Requête invalide".to_string()))?;

        value
            .validate()
            .map_err(|e| ServerError::BadRequest(first_message(&e)))?;

        Ok(Self(value))
    }
}

fn first_message(errors: &ValidationErrors) -> String {
    errors
        .field_errors()
        .values()
        .flat_map(|errors| errors.iter())
        .find_map(|e| e.message.as_ref())
        .map(|m| m.to_string())
        .unwrap_or_else(|| "Requête invalide".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uses_the_field_message() {
        let schema = JamMessageSchema {
            content: String::new(),
        };

        let errors = schema.validate().unwrap_err();
        assert_eq!(
            first_message(&errors),
            "Le message doit contenir entre 1 et 1000 caractères"
        );
    }

    #[test]
    fn accepts_browser_push_subscriptions() {
        let raw = r#"{
            "endpoint": "https://fcm.googleapis.com/fcm/send/abc",
            "expirationTime": null,
            "keys": { "p256dh": "BNc...", "auth": "tBH..." }
        }"#;

        let schema: PushSubscriptionSchema = serde_json::from_str(raw).unwrap();
        assert!(schema.validate().is_ok());
        assert_eq!(schema.keys.auth, "tBH...");
    }
}
