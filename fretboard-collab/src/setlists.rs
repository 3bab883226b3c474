use crate::{
    bands::require_member, util::non_blank, ArcedDatabase, CollabContext, CollabError,
    CollabResult, NewSetlist, PrimaryKey, SetlistData, SongData,
};

/// Ordered song lists for performing, personal or shared with a band
pub struct SetlistManager {
    db: ArcedDatabase,
}

/// A setlist with its songs resolved, in performance order
#[derive(Debug, Clone)]
pub struct SetlistDetails {
    pub setlist: SetlistData,
    pub songs: Vec<SongData>,
}

impl SetlistManager {
    const MAX_SONGS: usize = 200;

    pub fn new(context: &CollabContext) -> Self {
        Self {
            db: context.database.clone(),
        }
    }

    pub async fn create(
        &self,
        user_id: PrimaryKey,
        title: String,
        band_id: Option<PrimaryKey>,
    ) -> CollabResult<SetlistData> {
        let title =
            non_blank(Some(title)).ok_or_else(|| CollabError::invalid("Le titre est requis"))?;

        if let Some(band_id) = band_id {
            let band = self.db.band_by_id(band_id).await?;
            require_member(&band, user_id)?;
        }

        let setlist = self
            .db
            .create_setlist(NewSetlist {
                user_id,
                band_id,
                title,
            })
            .await?;

        Ok(setlist)
    }

    /// The user's own setlists and those of their bands
    pub async fn setlists(&self, user_id: PrimaryKey) -> CollabResult<Vec<SetlistData>> {
        Ok(self.db.list_setlists(user_id).await?)
    }

    pub async fn setlist(
        &self,
        user_id: PrimaryKey,
        setlist_id: PrimaryKey,
    ) -> CollabResult<SetlistDetails> {
        let setlist = self.visible_setlist(user_id, setlist_id).await?;
        let songs = self.resolve_songs(&setlist).await?;

        Ok(SetlistDetails { setlist, songs })
    }

    pub async fn rename(
        &self,
        user_id: PrimaryKey,
        setlist_id: PrimaryKey,
        title: String,
    ) -> CollabResult<SetlistData> {
        let title =
            non_blank(Some(title)).ok_or_else(|| CollabError::invalid("Le titre est requis"))?;

        self.visible_setlist(user_id, setlist_id).await?;
        Ok(self.db.rename_setlist(setlist_id, &title).await?)
    }

    /// Replaces the songs, which have to belong to the creator or, for a band setlist, to a member
    pub async fn set_songs(
        &self,
        user_id: PrimaryKey,
        setlist_id: PrimaryKey,
        song_ids: Vec<PrimaryKey>,
    ) -> CollabResult<SetlistDetails> {
        if song_ids.len() > Self::MAX_SONGS {
            return Err(CollabError::invalid("Trop de morceaux dans la setlist"));
        }

        let setlist = self.visible_setlist(user_id, setlist_id).await?;
        let library = self.library(&setlist).await?;

        if !song_ids.iter().all(|id| library.iter().any(|s| s.id == *id)) {
            return Err(CollabError::NotFound("song"));
        }

        let setlist = self.db.set_setlist_songs(setlist_id, &song_ids).await?;
        let songs = self.resolve_songs(&setlist).await?;

        Ok(SetlistDetails { setlist, songs })
    }

    /// The creator or the owner of the band may delete a setlist
    pub async fn delete(&self, user_id: PrimaryKey, setlist_id: PrimaryKey) -> CollabResult<()> {
        let setlist = self.visible_setlist(user_id, setlist_id).await?;

        let allowed = match (setlist.user_id == user_id, setlist.band_id) {
            (true, _) => true,
            (false, Some(band_id)) => self.db.band_by_id(band_id).await?.is_owner(user_id),
            (false, None) => false,
        };

        if !allowed {
            return Err(CollabError::Forbidden(
                "only the creator or the band owner can delete a setlist",
            ));
        }

        Ok(self.db.delete_setlist(setlist_id).await?)
    }

    async fn visible_setlist(
        &self,
        user_id: PrimaryKey,
        setlist_id: PrimaryKey,
    ) -> CollabResult<SetlistData> {
        let setlist = self.db.setlist_by_id(setlist_id).await?;

        if setlist.user_id == user_id {
            return Ok(setlist);
        }

        match setlist.band_id {
            Some(band_id) => {
                let band = self.db.band_by_id(band_id).await?;
                require_member(&band, user_id)?;

                Ok(setlist)
            }
            None => Err(CollabError::NotFound("setlist")),
        }
    }

    async fn resolve_songs(&self, setlist: &SetlistData) -> CollabResult<Vec<SongData>> {
        let library = self.library(setlist).await?;

        Ok(setlist
            .song_ids
            .iter()
            .filter_map(|id| library.iter().find(|s| s.id == *id).cloned())
            .collect())
    }

    /// Songs of a band setlist may belong to any member, so every owner's library is read
    async fn library(&self, setlist: &SetlistData) -> CollabResult<Vec<SongData>> {
        let mut owners = vec![setlist.user_id];

        if let Some(band_id) = setlist.band_id {
            let band = self.db.band_by_id(band_id).await?;
            owners.extend(band.members.iter().map(|m| m.user.id));
        }

        let mut library = vec![];
        for owner in owners {
            library.extend(self.db.list_songs(owner).await?);
        }

        Ok(library)
    }
}

#[cfg(test)]
mod tests {
    use crate::{testing::TestCollab, SongInput};

    use super::*;

    #[tokio::test]
    async fn keeps_song_order() {
        let test = TestCollab::new();
        let user = test.user("django").await;
        let library = &test.collab.library;

        let mut ids = vec![];
        for title in ["Nuages", "Minor Swing", "Djangology"] {
            let song = library
                .create_song(
                    user.user.id,
                    SongInput {
                        title: title.to_string(),
                        artist: "Django Reinhardt".to_string(),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
            ids.push(song.id);
        }

        let setlist = test
            .collab
            .setlists
            .create(user.user.id, "Friday gig".to_string(), None)
            .await
            .unwrap();

        ids.reverse();
        let details = test
            .collab
            .setlists
            .set_songs(user.user.id, setlist.id, ids.clone())
            .await
            .unwrap();

        let titles: Vec<_> = details.songs.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(details.setlist.song_ids, ids);
        assert_eq!(titles, ["Djangology", "Minor Swing", "Nuages"]);
    }

    #[tokio::test]
    async fn band_setlists_need_membership() {
        let test = TestCollab::new();
        let owner = test.user("owner").await;
        let outsider = test.user("outsider").await;

        let band = test
            .collab
            .bands
            .create(owner.user.id, "Hot Club".to_string())
            .await
            .unwrap();

        let result = test
            .collab
            .setlists
            .create(outsider.user.id, "Sneaky".to_string(), Some(band.id))
            .await;

        assert!(matches!(result, Err(CollabError::Forbidden(_))));
    }

    #[tokio::test]
    async fn rejects_songs_of_other_users() {
        let test = TestCollab::new();
        let user = test.user("user").await;
        let other = test.user("other").await;

        let foreign = test
            .collab
            .library
            .create_song(
                other.user.id,
                SongInput {
                    title: "Nuages".to_string(),
                    artist: "Django Reinhardt".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let setlist = test
            .collab
            .setlists
            .create(user.user.id, "Mine".to_string(), None)
            .await
            .unwrap();

        let result = test
            .collab
            .setlists
            .set_songs(user.user.id, setlist.id, vec![foreign.id])
            .await;

        assert!(matches!(result, Err(CollabError::NotFound("song"))));
    }

    #[tokio::test]
    async fn band_members_reorder_shared_setlists() {
        let test = TestCollab::new();
        let owner = test.user("owner").await;
        let member = test.user("member").await;

        let band = test
            .collab
            .bands
            .create(owner.user.id, "Hot Club".to_string())
            .await
            .unwrap();

        test.collab
            .bands
            .add_member(owner.user.id, band.id, "member")
            .await
            .unwrap();

        let mut ids = vec![];
        for title in ["Nuages", "Minor Swing"] {
            let song = test
                .collab
                .library
                .create_song(
                    owner.user.id,
                    SongInput {
                        title: title.to_string(),
                        artist: "Django Reinhardt".to_string(),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
            ids.push(song.id);
        }

        let setlist = test
            .collab
            .setlists
            .create(owner.user.id, "Saturday gig".to_string(), Some(band.id))
            .await
            .unwrap();

        test.collab
            .setlists
            .set_songs(owner.user.id, setlist.id, ids.clone())
            .await
            .unwrap();

        ids.reverse();
        let details = test
            .collab
            .setlists
            .set_songs(member.user.id, setlist.id, ids.clone())
            .await
            .unwrap();

        let titles: Vec<_> = details.songs.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(details.setlist.song_ids, ids);
        assert_eq!(titles, ["Minor Swing", "Nuages"]);
    }
}
