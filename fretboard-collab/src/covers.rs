use std::sync::Arc;

use bytes::Bytes;
use fretboard_core::ObjectStorage;
use log::{info, warn};

use crate::{
    util::{non_blank, random_string},
    ArcedDatabase, CollabContext, CollabError, CollabResult, CoverData, MediaKind, NewCover,
    PrimaryKey,
};

/// Recordings users upload of themselves playing
pub struct CoverManager {
    db: ArcedDatabase,
    storage: Arc<dyn ObjectStorage>,
}

#[derive(Debug)]
pub struct CoverUpload {
    pub title: String,
    pub song_id: Option<PrimaryKey>,
    pub filename: Option<String>,
    pub content_type: String,
    pub data: Bytes,
}

impl CoverManager {
    const KEY_LENGTH: usize = 16;

    pub fn new(context: &CollabContext) -> Self {
        Self {
            db: context.database.clone(),
            storage: context.providers.storage.clone(),
        }
    }

    pub async fn upload(&self, user_id: PrimaryKey, upload: CoverUpload) -> CollabResult<CoverData> {
        let title = non_blank(Some(upload.title))
            .ok_or_else(|| CollabError::invalid("Le titre est requis"))?;

        let media_kind = MediaKind::from_content_type(&upload.content_type).ok_or_else(|| {
            CollabError::invalid("Seuls les fichiers audio et vidéo sont acceptés")
        })?;

        if upload.data.is_empty() {
            return Err(CollabError::invalid("Le fichier est vide"));
        }

        if let Some(song_id) = upload.song_id {
            self.db.song_by_id(user_id, song_id).await?;
        }

        let extension = file_extension(upload.filename.as_deref(), &upload.content_type);
        let key = format!(
            "covers/{}/{}.{}",
            user_id,
            random_string(Self::KEY_LENGTH),
            extension
        );

        let url = self
            .storage
            .upload(&key, upload.data, &upload.content_type)
            .await?;

        let cover = self
            .db
            .create_cover(NewCover {
                user_id,
                song_id: upload.song_id,
                title,
                media_kind,
                url,
                storage_key: key.clone(),
            })
            .await;

        match cover {
            Ok(cover) => {
                info!("User {} uploaded cover {}", user_id, cover.id);
                Ok(cover)
            }
            Err(e) => {
                // Don't leave orphaned objects behind
                if let Err(delete_error) = self.storage.delete(&key).await {
                    warn!("Failed to delete orphaned object {}: {}", key, delete_error);
                }

                Err(e.into())
            }
        }
    }

    pub async fn covers_of(&self, user_id: PrimaryKey) -> CollabResult<Vec<CoverData>> {
        // Ensure the user exists, so unknown users are a 404 rather than an empty list
        self.db.user_by_id(user_id).await?;
        Ok(self.db.list_covers(user_id).await?)
    }

    pub async fn delete(&self, user_id: PrimaryKey, cover_id: PrimaryKey) -> CollabResult<()> {
        let cover = self.db.cover_by_id(cover_id).await?;

        if cover.user_id != user_id {
            return Err(CollabError::Forbidden("only the uploader can delete a cover"));
        }

        self.db.delete_cover(cover.id).await?;

        if let Err(e) = self.storage.delete(&cover.storage_key).await {
            warn!("Failed to delete object {}: {}", cover.storage_key, e);
        }

        Ok(())
    }
}

/// Prefers the extension of the uploaded file, falling back to the mime subtype
fn file_extension(filename: Option<&str>, content_type: &str) -> String {
    let from_filename = filename
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()));

    from_filename.unwrap_or_else(|| {
        let subtype = content_type
            .split('/')
            .nth(1)
            .and_then(|s| s.split(';').next())
            .unwrap_or("bin")
            .trim();

        match subtype {
            "mpeg" => "mp3".to_string(),
            "quicktime" => "mov".to_string(),
            "x-wav" | "wave" => "wav".to_string(),
            other if other.chars().all(|c| c.is_ascii_alphanumeric()) => other.to_string(),
            _ => "bin".to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use crate::testing::TestCollab;

    use super::*;

    fn upload(content_type: &str) -> CoverUpload {
        CoverUpload {
            title: "Minor Swing take 3".to_string(),
            song_id: None,
            filename: Some("take3.MP4".to_string()),
            content_type: content_type.to_string(),
            data: Bytes::from_static(b"not really a video"),
        }
    }

    #[test]
    fn picks_extensions() {
        assert_eq!(file_extension(Some("take.webm"), "video/webm"), "webm");
        assert_eq!(file_extension(None, "audio/mpeg"), "mp3");
        assert_eq!(file_extension(Some("noext"), "video/mp4"), "mp4");
    }

    #[tokio::test]
    async fn stores_uploads_under_the_user() {
        let test = TestCollab::new();
        let session = test.user("django").await;

        let cover = test
            .collab
            .covers
            .upload(session.user.id, upload("video/mp4"))
            .await
            .unwrap();

        assert_eq!(cover.media_kind, MediaKind::Video);
        assert!(cover
            .storage_key
            .starts_with(&format!("covers/{}/", session.user.id)));
        assert!(cover.storage_key.ends_with(".mp4"));
        assert!(test.storage.contains(&cover.storage_key));
    }

    #[tokio::test]
    async fn rejects_non_media_files() {
        let test = TestCollab::new();
        let session = test.user("django").await;

        let result = test
            .collab
            .covers
            .upload(session.user.id, upload("application/pdf"))
            .await;

        assert!(matches!(result, Err(CollabError::Invalid(_))));
    }

    #[tokio::test]
    async fn only_the_uploader_can_delete() {
        let test = TestCollab::new();
        let owner = test.user("owner").await;
        let other = test.user("other").await;

        let cover = test
            .collab
            .covers
            .upload(owner.user.id, upload("audio/ogg"))
            .await
            .unwrap();

        let result = test.collab.covers.delete(other.user.id, cover.id).await;
        assert!(matches!(result, Err(CollabError::Forbidden(_))));

        test.collab.covers.delete(owner.user.id, cover.id).await.unwrap();
        assert!(!test.storage.contains(&cover.storage_key));
    }
}
