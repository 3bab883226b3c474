use crate::{
    util::non_blank, ArcedDatabase, CollabContext, CollabError, CollabResult, NewPlaylist,
    NewSong, NewWishlistSong, PlaylistData, PrimaryKey, SongData, SongStatus, UpdatedSong,
    WishlistSongData,
};

/// Songs, the wishlist and playlists of a user.
/// Everything here is private to its owner, other users' rows read as not found.
pub struct LibraryManager {
    db: ArcedDatabase,
}

#[derive(Debug, Default)]
pub struct SongInput {
    pub title: String,
    pub artist: String,
    pub status: Option<SongStatus>,
    pub difficulty: Option<i32>,
    pub tuning: Option<String>,
    pub tab_url: Option<String>,
    pub spotify_id: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Default)]
pub struct SongChanges {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub status: Option<SongStatus>,
    pub difficulty: Option<i32>,
    pub tuning: Option<String>,
    pub tab_url: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Default)]
pub struct WishlistInput {
    pub title: String,
    pub artist: String,
    pub spotify_id: Option<String>,
    pub notes: Option<String>,
}

impl LibraryManager {
    pub fn new(context: &CollabContext) -> Self {
        Self {
            db: context.database.clone(),
        }
    }

    pub async fn songs(&self, user_id: PrimaryKey) -> CollabResult<Vec<SongData>> {
        Ok(self.db.list_songs(user_id).await?)
    }

    pub async fn song(&self, user_id: PrimaryKey, song_id: PrimaryKey) -> CollabResult<SongData> {
        Ok(self.db.song_by_id(user_id, song_id).await?)
    }

    pub async fn create_song(&self, user_id: PrimaryKey, input: SongInput) -> CollabResult<SongData> {
        let title = required(input.title, "Le titre est requis")?;
        let artist = required(input.artist, "L'artiste est requis")?;
        check_difficulty(input.difficulty)?;

        let song = self
            .db
            .create_song(NewSong {
                user_id,
                title,
                artist,
                status: input.status.unwrap_or_default(),
                difficulty: input.difficulty,
                tuning: non_blank(input.tuning),
                tab_url: non_blank(input.tab_url),
                spotify_id: non_blank(input.spotify_id),
                notes: non_blank(input.notes),
            })
            .await?;

        Ok(song)
    }

    pub async fn update_song(
        &self,
        user_id: PrimaryKey,
        song_id: PrimaryKey,
        changes: SongChanges,
    ) -> CollabResult<SongData> {
        check_difficulty(changes.difficulty)?;

        let title = changes
            .title
            .map(|t| required(t, "Le titre est requis"))
            .transpose()?;
        let artist = changes
            .artist
            .map(|a| required(a, "L'artiste est requis"))
            .transpose()?;

        let song = self
            .db
            .update_song(UpdatedSong {
                id: song_id,
                user_id,
                title,
                artist,
                status: changes.status,
                difficulty: changes.difficulty,
                tuning: non_blank(changes.tuning),
                tab_url: non_blank(changes.tab_url),
                notes: non_blank(changes.notes),
            })
            .await?;

        Ok(song)
    }

    pub async fn delete_song(&self, user_id: PrimaryKey, song_id: PrimaryKey) -> CollabResult<()> {
        Ok(self.db.delete_song(user_id, song_id).await?)
    }

    pub async fn wishlist(&self, user_id: PrimaryKey) -> CollabResult<Vec<WishlistSongData>> {
        Ok(self.db.list_wishlist(user_id).await?)
    }

    pub async fn add_to_wishlist(
        &self,
        user_id: PrimaryKey,
        input: WishlistInput,
    ) -> CollabResult<WishlistSongData> {
        let song = self
            .db
            .create_wishlist_song(NewWishlistSong {
                user_id,
                title: required(input.title, "Le titre est requis")?,
                artist: required(input.artist, "L'artiste est requis")?,
                spotify_id: non_blank(input.spotify_id),
                notes: non_blank(input.notes),
            })
            .await?;

        Ok(song)
    }

    pub async fn remove_from_wishlist(
        &self,
        user_id: PrimaryKey,
        wishlist_id: PrimaryKey,
    ) -> CollabResult<()> {
        Ok(self.db.delete_wishlist_song(user_id, wishlist_id).await?)
    }

    /// Moves a wishlist entry into the library, as a song being learned
    pub async fn promote(
        &self,
        user_id: PrimaryKey,
        wishlist_id: PrimaryKey,
    ) -> CollabResult<SongData> {
        let wish = self.db.wishlist_song_by_id(user_id, wishlist_id).await?;

        let song = self
            .db
            .create_song(NewSong {
                user_id,
                title: wish.title,
                artist: wish.artist,
                status: SongStatus::Learning,
                difficulty: None,
                tuning: None,
                tab_url: None,
                spotify_id: wish.spotify_id,
                notes: wish.notes,
            })
            .await?;

        self.db.delete_wishlist_song(user_id, wishlist_id).await?;

        Ok(song)
    }

    pub async fn playlists(&self, user_id: PrimaryKey) -> CollabResult<Vec<PlaylistData>> {
        Ok(self.db.list_playlists(user_id).await?)
    }

    pub async fn playlist(
        &self,
        user_id: PrimaryKey,
        playlist_id: PrimaryKey,
    ) -> CollabResult<PlaylistData> {
        Ok(self.db.playlist_by_id(user_id, playlist_id).await?)
    }

    pub async fn create_playlist(
        &self,
        user_id: PrimaryKey,
        name: String,
        description: Option<String>,
    ) -> CollabResult<PlaylistData> {
        let playlist = self
            .db
            .create_playlist(NewPlaylist {
                user_id,
                name: required(name, "Le nom est requis")?,
                description: non_blank(description),
            })
            .await?;

        Ok(playlist)
    }

    pub async fn delete_playlist(
        &self,
        user_id: PrimaryKey,
        playlist_id: PrimaryKey,
    ) -> CollabResult<()> {
        Ok(self.db.delete_playlist(user_id, playlist_id).await?)
    }

    /// Adds one of the user's songs to their playlist, adding it twice does nothing
    pub async fn add_to_playlist(
        &self,
        user_id: PrimaryKey,
        playlist_id: PrimaryKey,
        song_id: PrimaryKey,
    ) -> CollabResult<PlaylistData> {
        let playlist = self.db.playlist_by_id(user_id, playlist_id).await?;
        let song = self.db.song_by_id(user_id, song_id).await?;

        self.db.add_playlist_song(playlist.id, song.id).await?;

        self.playlist(user_id, playlist_id).await
    }

    pub async fn remove_from_playlist(
        &self,
        user_id: PrimaryKey,
        playlist_id: PrimaryKey,
        song_id: PrimaryKey,
    ) -> CollabResult<PlaylistData> {
        let playlist = self.db.playlist_by_id(user_id, playlist_id).await?;
        self.db.remove_playlist_song(playlist.id, song_id).await?;

        self.playlist(user_id, playlist_id).await
    }
}

fn required(value: String, message: &str) -> CollabResult<String> {
    non_blank(Some(value)).ok_or_else(|| CollabError::invalid(message))
}

fn check_difficulty(difficulty: Option<i32>) -> CollabResult<()> {
    match difficulty {
        Some(d) if !(1..=5).contains(&d) => Err(CollabError::invalid(
            "La difficulté doit être comprise entre 1 et 5",
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use crate::{testing::TestCollab, DatabaseError};

    use super::*;

    fn song(title: &str) -> SongInput {
        SongInput {
            title: title.to_string(),
            artist: "Django Reinhardt".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn songs_are_private_to_their_owner() {
        let test = TestCollab::new();
        let owner = test.user("owner").await;
        let other = test.user("other").await;

        let created = test
            .collab
            .library
            .create_song(owner.user.id, song("Minor Swing"))
            .await
            .unwrap();

        assert_eq!(created.status, SongStatus::Learning);

        let result = test.collab.library.song(other.user.id, created.id).await;
        assert!(matches!(
            result,
            Err(CollabError::Db(DatabaseError::NotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn rejects_out_of_range_difficulty() {
        let test = TestCollab::new();
        let owner = test.user("owner").await;

        let result = test
            .collab
            .library
            .create_song(
                owner.user.id,
                SongInput {
                    difficulty: Some(6),
                    ..song("Nuages")
                },
            )
            .await;

        assert!(matches!(result, Err(CollabError::Invalid(_))));
    }

    #[tokio::test]
    async fn promoting_moves_the_wish_into_the_library() {
        let test = TestCollab::new();
        let owner = test.user("owner").await;

        let wish = test
            .collab
            .library
            .add_to_wishlist(
                owner.user.id,
                WishlistInput {
                    title: "Nuages".to_string(),
                    artist: "Django Reinhardt".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let song = test
            .collab
            .library
            .promote(owner.user.id, wish.id)
            .await
            .unwrap();

        assert_eq!(song.title, "Nuages");
        assert_eq!(song.status, SongStatus::Learning);
        assert!(test
            .collab
            .library
            .wishlist(owner.user.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn playlists_ignore_duplicate_songs() {
        let test = TestCollab::new();
        let owner = test.user("owner").await;
        let library = &test.collab.library;

        let song = library
            .create_song(owner.user.id, song("Minor Swing"))
            .await
            .unwrap();
        let playlist = library
            .create_playlist(owner.user.id, "Gypsy jazz".to_string(), None)
            .await
            .unwrap();

        library
            .add_to_playlist(owner.user.id, playlist.id, song.id)
            .await
            .unwrap();
        let playlist = library
            .add_to_playlist(owner.user.id, playlist.id, song.id)
            .await
            .unwrap();

        assert_eq!(playlist.song_ids, vec![song.id]);
    }
}
