use fretboard_core::Plan;

use crate::{ArcedDatabase, CollabContext, CollabError, CollabResult, PrimaryKey, ProfileData};

/// Guards the features only paid plans get: audio recognition, the Spotify
/// integration, tab search and audio features.
#[derive(Clone)]
pub struct PlanGate {
    db: ArcedDatabase,
}

impl PlanGate {
    pub fn new(context: &CollabContext) -> Self {
        Self {
            db: context.database.clone(),
        }
    }

    /// Returns the profile if its plan unlocks the paid features
    pub async fn check(&self, user_id: PrimaryKey) -> CollabResult<ProfileData> {
        let profile = self.db.profile_by_user_id(user_id).await?;
        require_paid(profile.plan)?;

        Ok(profile)
    }
}

/// Only the free tier is rejected, every paid tier unlocks the same features
pub fn require_paid(plan: Plan) -> CollabResult<()> {
    if plan.is_paid() {
        Ok(())
    } else {
        Err(CollabError::PlanRequired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_is_the_only_rejected_plan() {
        assert!(matches!(
            require_paid(Plan::Free),
            Err(CollabError::PlanRequired)
        ));
        assert!(require_paid(Plan::Pro).is_ok());
        assert!(require_paid(Plan::Band).is_ok());
    }
}
