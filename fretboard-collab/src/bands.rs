use log::info;

use crate::{
    util::non_blank, ArcedDatabase, BandData, BandMemberData, CollabContext, CollabError,
    CollabResult, NewBand, NewBandMember, PrimaryKey,
};

/// Bands group users around shared setlists and jams.
/// The owner manages membership, everyone else is a plain member.
pub struct BandManager {
    db: ArcedDatabase,
}

impl BandManager {
    pub fn new(context: &CollabContext) -> Self {
        Self {
            db: context.database.clone(),
        }
    }

    pub async fn create(&self, user_id: PrimaryKey, name: String) -> CollabResult<BandData> {
        let name = non_blank(Some(name)).ok_or_else(|| CollabError::invalid("Le nom est requis"))?;
        let band = self.db.create_band(NewBand { name, user_id }).await?;

        info!("User {} created band {}", user_id, band.id);
        Ok(band)
    }

    pub async fn bands_of(&self, user_id: PrimaryKey) -> CollabResult<Vec<BandData>> {
        Ok(self.db.list_bands_for_user(user_id).await?)
    }

    pub async fn band(&self, user_id: PrimaryKey, band_id: PrimaryKey) -> CollabResult<BandData> {
        let band = self.db.band_by_id(band_id).await?;
        require_member(&band, user_id)?;

        Ok(band)
    }

    pub async fn add_member(
        &self,
        user_id: PrimaryKey,
        band_id: PrimaryKey,
        username: &str,
    ) -> CollabResult<BandMemberData> {
        let band = self.db.band_by_id(band_id).await?;
        require_owner(&band, user_id)?;

        let user = self.db.user_by_username(username.trim()).await?;

        let member = self
            .db
            .create_band_member(NewBandMember {
                band_id,
                user_id: user.id,
                owner: false,
            })
            .await?;

        Ok(member)
    }

    /// Owners remove others, members remove themselves. The owner can't leave.
    pub async fn remove_member(
        &self,
        user_id: PrimaryKey,
        band_id: PrimaryKey,
        member_id: PrimaryKey,
    ) -> CollabResult<()> {
        let band = self.db.band_by_id(band_id).await?;

        if member_id == user_id {
            require_member(&band, user_id)?;

            if band.is_owner(user_id) {
                return Err(CollabError::invalid(
                    "Le propriétaire ne peut pas quitter le groupe",
                ));
            }
        } else {
            require_owner(&band, user_id)?;
        }

        self.db.delete_band_member(band_id, member_id).await?;
        Ok(())
    }

    pub async fn delete(&self, user_id: PrimaryKey, band_id: PrimaryKey) -> CollabResult<()> {
        let band = self.db.band_by_id(band_id).await?;
        require_owner(&band, user_id)?;

        self.db.delete_band(band_id).await?;

        info!("User {} deleted band {}", user_id, band_id);
        Ok(())
    }
}

pub(crate) fn require_member(band: &BandData, user_id: PrimaryKey) -> CollabResult<()> {
    band.member(user_id)
        .map(|_| ())
        .ok_or(CollabError::Forbidden("only members of the band can do this"))
}

pub(crate) fn require_owner(band: &BandData, user_id: PrimaryKey) -> CollabResult<()> {
    if band.is_owner(user_id) {
        Ok(())
    } else {
        Err(CollabError::Forbidden("only the owner of the band can do this"))
    }
}

#[cfg(test)]
mod tests {
    use crate::{testing::TestCollab, DatabaseError};

    use super::*;

    #[tokio::test]
    async fn creator_owns_the_band() {
        let test = TestCollab::new();
        let owner = test.user("owner").await;

        let band = test
            .collab
            .bands
            .create(owner.user.id, "Hot Club".to_string())
            .await
            .unwrap();

        assert_eq!(band.members.len(), 1);
        assert!(band.is_owner(owner.user.id));
    }

    #[tokio::test]
    async fn only_owners_manage_members() {
        let test = TestCollab::new();
        let owner = test.user("owner").await;
        let member = test.user("member").await;
        test.user("third").await;
        let bands = &test.collab.bands;

        let band = bands.create(owner.user.id, "Hot Club".to_string()).await.unwrap();
        bands.add_member(owner.user.id, band.id, "member").await.unwrap();

        let by_member = bands.add_member(member.user.id, band.id, "third").await;
        assert!(matches!(by_member, Err(CollabError::Forbidden(_))));

        let duplicate = bands.add_member(owner.user.id, band.id, "member").await;
        assert!(matches!(
            duplicate,
            Err(CollabError::Db(DatabaseError::Conflict { .. }))
        ));
    }

    #[tokio::test]
    async fn members_leave_but_owners_stay() {
        let test = TestCollab::new();
        let owner = test.user("owner").await;
        let member = test.user("member").await;
        let bands = &test.collab.bands;

        let band = bands.create(owner.user.id, "Hot Club".to_string()).await.unwrap();
        bands.add_member(owner.user.id, band.id, "member").await.unwrap();

        let owner_leaving = bands
            .remove_member(owner.user.id, band.id, owner.user.id)
            .await;
        assert!(matches!(owner_leaving, Err(CollabError::Invalid(_))));

        bands
            .remove_member(member.user.id, band.id, member.user.id)
            .await
            .unwrap();

        let hidden = bands.band(member.user.id, band.id).await;
        assert!(matches!(hidden, Err(CollabError::Forbidden(_))));
    }
}
