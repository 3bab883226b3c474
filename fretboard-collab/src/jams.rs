use fretboard_core::PushPayload;
use log::info;

use crate::{
    bands::require_member, util::non_blank, ArcedDatabase, CollabContext, CollabError,
    CollabEvent, CollabResult, JamData, JamMessageData, JamParticipantData, NewJam,
    NewJamMessage, Notifier, PrimaryKey,
};

/// Live practice sessions several users join and chat in.
///
/// Every change is persisted first, then emitted as a [CollabEvent] so the
/// server can relay it to whoever is watching the jam.
pub struct JamManager {
    context: CollabContext,
    db: ArcedDatabase,
    notifier: Notifier,
}

#[derive(Debug, Clone)]
pub struct JamDetails {
    pub jam: JamData,
    pub participants: Vec<JamParticipantData>,
}

impl JamManager {
    const MESSAGE_LIMIT: i64 = 200;
    const MAX_MESSAGE_LENGTH: usize = 1000;

    pub fn new(context: &CollabContext) -> Self {
        Self {
            context: context.clone(),
            db: context.database.clone(),
            notifier: Notifier::new(context),
        }
    }

    /// Starts a jam with the host as its first participant, band jams notify the band
    pub async fn start(
        &self,
        user_id: PrimaryKey,
        title: String,
        band_id: Option<PrimaryKey>,
    ) -> CollabResult<JamData> {
        let title =
            non_blank(Some(title)).ok_or_else(|| CollabError::invalid("Le titre est requis"))?;

        let band = match band_id {
            Some(band_id) => {
                let band = self.db.band_by_id(band_id).await?;
                require_member(&band, user_id)?;
                Some(band)
            }
            None => None,
        };

        let jam = self
            .db
            .create_jam(NewJam {
                host_id: user_id,
                band_id,
                title,
            })
            .await?;

        self.db.join_jam(jam.id, user_id).await?;
        self.context.emit(CollabEvent::JamStarted { jam: jam.clone() });

        info!("User {} started jam {}", user_id, jam.id);

        if let Some(band) = band {
            let host = self.db.user_by_id(user_id).await?;

            for member in band.members.iter().filter(|m| m.user.id != user_id) {
                self.notifier
                    .notify_quietly(
                        member.user.id,
                        PushPayload {
                            title: format!("Jam : {}", jam.title),
                            body: format!("{} a lancé une jam avec {}", host.display_name, band.name),
                            url: Some(format!("/jams/{}", jam.id)),
                        },
                    )
                    .await;
            }
        }

        Ok(jam)
    }

    /// Active jams the user hosts, participates in, or that belong to one of their bands
    pub async fn jams(&self, user_id: PrimaryKey) -> CollabResult<Vec<JamData>> {
        Ok(self.db.list_active_jams(user_id).await?)
    }

    /// Returns the jam, joining it on the way if it's still running
    pub async fn jam(&self, user_id: PrimaryKey, jam_id: PrimaryKey) -> CollabResult<JamDetails> {
        let jam = self.visible_jam(user_id, jam_id).await?;

        if jam.is_active() {
            self.join_active(&jam, user_id).await?;
        }

        let participants = self.db.jam_participants(jam_id).await?;
        Ok(JamDetails { jam, participants })
    }

    pub async fn join(&self, user_id: PrimaryKey, jam_id: PrimaryKey) -> CollabResult<JamDetails> {
        let jam = self.visible_jam(user_id, jam_id).await?;
        require_active(&jam)?;

        self.join_active(&jam, user_id).await?;

        let participants = self.db.jam_participants(jam_id).await?;
        Ok(JamDetails { jam, participants })
    }

    pub async fn participants(
        &self,
        user_id: PrimaryKey,
        jam_id: PrimaryKey,
    ) -> CollabResult<Vec<JamParticipantData>> {
        self.visible_jam(user_id, jam_id).await?;
        Ok(self.db.jam_participants(jam_id).await?)
    }

    pub async fn leave(&self, user_id: PrimaryKey, jam_id: PrimaryKey) -> CollabResult<()> {
        self.db.jam_by_id(jam_id).await?;
        self.db.leave_jam(jam_id, user_id).await?;

        self.context
            .emit(CollabEvent::ParticipantLeft { jam_id, user_id });

        Ok(())
    }

    /// The latest messages, oldest first
    pub async fn messages(
        &self,
        user_id: PrimaryKey,
        jam_id: PrimaryKey,
    ) -> CollabResult<Vec<JamMessageData>> {
        self.visible_jam(user_id, jam_id).await?;
        Ok(self.db.jam_messages(jam_id, Self::MESSAGE_LIMIT).await?)
    }

    pub async fn post_message(
        &self,
        user_id: PrimaryKey,
        jam_id: PrimaryKey,
        content: String,
    ) -> CollabResult<JamMessageData> {
        let content = non_blank(Some(content))
            .filter(|c| c.chars().count() <= Self::MAX_MESSAGE_LENGTH)
            .ok_or_else(|| {
                CollabError::invalid("Le message doit contenir entre 1 et 1000 caractères")
            })?;

        let jam = self.db.jam_by_id(jam_id).await?;
        require_active(&jam)?;

        let participating = self
            .db
            .jam_participants(jam_id)
            .await?
            .iter()
            .any(|p| p.user.id == user_id);

        if !participating {
            return Err(CollabError::Forbidden("only participants can post messages"));
        }

        let message = self
            .db
            .create_jam_message(NewJamMessage {
                jam_id,
                user_id,
                content,
            })
            .await?;

        self.context.emit(CollabEvent::MessagePosted {
            message: message.clone(),
        });

        Ok(message)
    }

    /// Ends the jam, only the host can do this
    pub async fn end(&self, user_id: PrimaryKey, jam_id: PrimaryKey) -> CollabResult<JamData> {
        let jam = self.db.jam_by_id(jam_id).await?;

        if jam.host_id != user_id {
            return Err(CollabError::Forbidden("only the host can end a jam"));
        }

        require_active(&jam)?;

        let jam = self.db.end_jam(jam_id).await?;
        self.context.emit(CollabEvent::JamEnded { jam_id });

        info!("User {} ended jam {}", user_id, jam_id);
        Ok(jam)
    }

    /// Whether the user may see the jam, open jams are visible to everyone
    pub async fn can_view(&self, user_id: PrimaryKey, jam_id: PrimaryKey) -> CollabResult<bool> {
        match self.visible_jam(user_id, jam_id).await {
            Ok(_) => Ok(true),
            Err(CollabError::Forbidden(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn visible_jam(&self, user_id: PrimaryKey, jam_id: PrimaryKey) -> CollabResult<JamData> {
        let jam = self.db.jam_by_id(jam_id).await?;

        if let Some(band_id) = jam.band_id {
            if jam.host_id != user_id {
                let band = self.db.band_by_id(band_id).await?;
                require_member(&band, user_id)?;
            }
        }

        Ok(jam)
    }

    /// Joins idempotently, only a fresh join is announced
    async fn join_active(&self, jam: &JamData, user_id: PrimaryKey) -> CollabResult<()> {
        let joined = self.db.join_jam(jam.id, user_id).await?;

        if joined {
            let participant = self
                .db
                .jam_participants(jam.id)
                .await?
                .into_iter()
                .find(|p| p.user.id == user_id);

            if let Some(participant) = participant {
                self.context.emit(CollabEvent::ParticipantJoined {
                    jam_id: jam.id,
                    participant,
                });
            }
        }

        Ok(())
    }
}

fn require_active(jam: &JamData) -> CollabResult<()> {
    if jam.is_active() {
        Ok(())
    } else {
        Err(CollabError::invalid("Cette session est terminée"))
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::TestCollab;

    use super::*;

    #[tokio::test]
    async fn viewing_joins_once() {
        let test = TestCollab::new();
        let host = test.user("host").await;
        let guest = test.user("guest").await;
        let events = test.collab.events();

        let jam = test
            .collab
            .jams
            .start(host.user.id, "Blues in A".to_string(), None)
            .await
            .unwrap();

        test.collab.jams.jam(guest.user.id, jam.id).await.unwrap();
        let details = test.collab.jams.jam(guest.user.id, jam.id).await.unwrap();

        assert_eq!(details.participants.len(), 2);

        let joins = events
            .try_iter()
            .filter(|e| matches!(e, CollabEvent::ParticipantJoined { .. }))
            .count();

        assert_eq!(joins, 1);
    }

    #[tokio::test]
    async fn band_jams_are_for_members() {
        let test = TestCollab::new();
        let host = test.user("host").await;
        let member = test.user("member").await;
        let outsider = test.user("outsider").await;

        let band = test
            .collab
            .bands
            .create(host.user.id, "Hot Club".to_string())
            .await
            .unwrap();
        test.collab
            .bands
            .add_member(host.user.id, band.id, "member")
            .await
            .unwrap();

        test.collab
            .push
            .subscribe(
                member.user.id,
                crate::SubscriptionInput {
                    endpoint: "https://push.example/member".to_string(),
                    p256dh: "p".to_string(),
                    auth: "a".to_string(),
                },
            )
            .await
            .unwrap();

        let jam = test
            .collab
            .jams
            .start(host.user.id, "Rehearsal".to_string(), Some(band.id))
            .await
            .unwrap();

        assert_eq!(test.push.sent().len(), 1);

        let result = test.collab.jams.jam(outsider.user.id, jam.id).await;
        assert!(matches!(result, Err(CollabError::Forbidden(_))));

        let visible = test.collab.jams.jams(member.user.id).await.unwrap();
        assert_eq!(visible.len(), 1);
    }

    #[tokio::test]
    async fn ended_jams_reject_messages() {
        let test = TestCollab::new();
        let host = test.user("host").await;
        let guest = test.user("guest").await;
        let jams = &test.collab.jams;

        let jam = jams
            .start(host.user.id, "Blues in A".to_string(), None)
            .await
            .unwrap();

        let by_guest = jams.end(guest.user.id, jam.id).await;
        assert!(matches!(by_guest, Err(CollabError::Forbidden(_))));

        jams.post_message(host.user.id, jam.id, "12 bar, go".to_string())
            .await
            .unwrap();
        jams.end(host.user.id, jam.id).await.unwrap();

        let late = jams
            .post_message(host.user.id, jam.id, "one more".to_string())
            .await;
        assert!(matches!(late, Err(CollabError::Invalid(_))));

        let join = jams.join(guest.user.id, jam.id).await;
        assert!(matches!(join, Err(CollabError::Invalid(_))));

        let messages = jams.messages(host.user.id, jam.id).await.unwrap();
        assert_eq!(messages.len(), 1);
    }

    #[tokio::test]
    async fn only_participants_post() {
        let test = TestCollab::new();
        let host = test.user("host").await;
        let lurker = test.user("lurker").await;

        let jam = test
            .collab
            .jams
            .start(host.user.id, "Open jam".to_string(), None)
            .await
            .unwrap();

        let result = test
            .collab
            .jams
            .post_message(lurker.user.id, jam.id, "hi".to_string())
            .await;

        assert!(matches!(result, Err(CollabError::Forbidden(_))));
    }
}
