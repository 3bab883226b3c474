use crate::{
    util::non_blank, ArcedDatabase, CollabContext, CollabError, CollabResult, PlanGate,
    PrimaryKey, ProfileData, UpdatedProfile,
};

pub struct ProfileManager {
    db: ArcedDatabase,
    gate: PlanGate,
}

/// Changes a user may make to their own profile
#[derive(Debug, Default)]
pub struct ProfileChanges {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl ProfileManager {
    pub fn new(context: &CollabContext) -> Self {
        Self {
            db: context.database.clone(),
            gate: PlanGate::new(context),
        }
    }

    pub async fn profile(&self, user_id: PrimaryKey) -> CollabResult<ProfileData> {
        Ok(self.db.profile_by_user_id(user_id).await?)
    }

    pub async fn update(
        &self,
        user_id: PrimaryKey,
        changes: ProfileChanges,
    ) -> CollabResult<ProfileData> {
        let display_name = match changes.display_name {
            Some(name) => Some(
                non_blank(Some(name))
                    .ok_or_else(|| CollabError::invalid("Le nom affiché ne peut pas être vide"))?,
            ),
            None => None,
        };

        let profile = self
            .db
            .update_profile(UpdatedProfile {
                user_id,
                display_name,
                avatar_url: non_blank(changes.avatar_url),
            })
            .await?;

        Ok(profile)
    }

    /// Fails with [CollabError::PlanRequired] unless the user is on a paid plan
    pub async fn require_paid(&self, user_id: PrimaryKey) -> CollabResult<ProfileData> {
        self.gate.check(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use fretboard_core::Plan;

    use crate::testing::TestCollab;

    use super::*;

    #[tokio::test]
    async fn updates_only_given_fields() {
        let test = TestCollab::new();
        let session = test.user("django").await;

        let profile = test
            .collab
            .profiles
            .update(
                session.user.id,
                ProfileChanges {
                    avatar_url: Some("https://img.example/a.png".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(profile.user.display_name, "django");
        assert_eq!(profile.avatar_url.as_deref(), Some("https://img.example/a.png"));

        let blank = test
            .collab
            .profiles
            .update(
                session.user.id,
                ProfileChanges {
                    display_name: Some("   ".to_string()),
                    ..Default::default()
                },
            )
            .await;

        assert!(matches!(blank, Err(CollabError::Invalid(_))));
    }

    #[tokio::test]
    async fn paid_plans_pass_the_gate() {
        let test = TestCollab::new();
        let free = test.user("free").await;
        let pro = test.user_with_plan("pro", Plan::Pro).await;

        assert!(matches!(
            test.collab.profiles.require_paid(free.user.id).await,
            Err(CollabError::PlanRequired)
        ));
        assert!(test.collab.profiles.require_paid(pro.user.id).await.is_ok());
    }
}
