use std::collections::HashMap;

use chrono::{DateTime, Utc};
use fretboard_core::PushPayload;

use crate::{
    ArcedDatabase, CollabContext, CollabError, CollabResult, CoverData, DatabaseError,
    FriendRequestData, FriendRequestStatus, Notifier, PracticeSessionData, PrimaryKey, UserData,
};

/// Friendships, friend requests and the activity feed
pub struct SocialManager {
    db: ArcedDatabase,
    notifier: Notifier,
}

#[derive(Debug, Clone, Default)]
pub struct PendingRequests {
    /// Requests waiting on the user
    pub incoming: Vec<FriendRequestData>,
    /// Requests the user is waiting on
    pub outgoing: Vec<FriendRequestData>,
}

/// Something a friend did
#[derive(Debug, Clone)]
pub enum FeedItem {
    Practice {
        user: UserData,
        session: PracticeSessionData,
    },
    Cover {
        user: UserData,
        cover: CoverData,
    },
}

impl FeedItem {
    pub fn happened_at(&self) -> DateTime<Utc> {
        match self {
            Self::Practice { session, .. } => session.practiced_at,
            Self::Cover { cover, .. } => cover.created_at,
        }
    }
}

impl SocialManager {
    const FEED_LIMIT: usize = 50;

    pub fn new(context: &CollabContext) -> Self {
        Self {
            db: context.database.clone(),
            notifier: Notifier::new(context),
        }
    }

    pub async fn friends(&self, user_id: PrimaryKey) -> CollabResult<Vec<UserData>> {
        Ok(self.db.friends_of(user_id).await?)
    }

    pub async fn remove_friend(&self, user_id: PrimaryKey, friend_id: PrimaryKey) -> CollabResult<()> {
        Ok(self.db.delete_friendship(user_id, friend_id).await?)
    }

    pub async fn send_request(
        &self,
        user_id: PrimaryKey,
        username: &str,
    ) -> CollabResult<FriendRequestData> {
        let target = self.db.user_by_username(username.trim()).await?;

        if target.id == user_id {
            return Err(CollabError::invalid(
                "Vous ne pouvez pas vous ajouter vous-même",
            ));
        }

        if self.db.are_friends(user_id, target.id).await? {
            return Err(DatabaseError::Conflict {
                resource: "friendship",
                field: "username",
                value: target.username,
            }
            .into());
        }

        let request = self.db.create_friend_request(user_id, target.id).await?;

        self.notifier
            .notify_quietly(
                target.id,
                PushPayload {
                    title: "Nouvelle demande d'ami".to_string(),
                    body: format!("{} veut devenir votre ami", request.from.display_name),
                    url: Some("/friends".to_string()),
                },
            )
            .await;

        Ok(request)
    }

    pub async fn requests(&self, user_id: PrimaryKey) -> CollabResult<PendingRequests> {
        let (incoming, outgoing) = self
            .db
            .pending_friend_requests(user_id)
            .await?
            .into_iter()
            .partition(|r| r.to.id == user_id);

        Ok(PendingRequests { incoming, outgoing })
    }

    /// Accepts a request sent to the user, which makes the two friends
    pub async fn accept(
        &self,
        user_id: PrimaryKey,
        request_id: PrimaryKey,
    ) -> CollabResult<FriendRequestData> {
        self.pending_for_recipient(user_id, request_id).await?;

        let request = self.db.accept_friend_request(request_id).await?;

        self.notifier
            .notify_quietly(
                request.from.id,
                PushPayload {
                    title: "Demande acceptée".to_string(),
                    body: format!("{} a accepté votre demande d'ami", request.to.display_name),
                    url: Some("/friends".to_string()),
                },
            )
            .await;

        Ok(request)
    }

    pub async fn decline(
        &self,
        user_id: PrimaryKey,
        request_id: PrimaryKey,
    ) -> CollabResult<FriendRequestData> {
        self.pending_for_recipient(user_id, request_id).await?;
        Ok(self.db.decline_friend_request(request_id).await?)
    }

    /// Recent practice sessions and covers of the user's friends, newest first
    pub async fn feed(&self, user_id: PrimaryKey) -> CollabResult<Vec<FeedItem>> {
        let friends: HashMap<PrimaryKey, UserData> = self
            .db
            .friends_of(user_id)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        if friends.is_empty() {
            return Ok(vec![]);
        }

        let ids: Vec<PrimaryKey> = friends.keys().copied().collect();
        let limit = Self::FEED_LIMIT as i64;

        let sessions = self.db.practice_sessions_for_users(&ids, limit).await?;
        let covers = self.db.covers_for_users(&ids, limit).await?;

        let practice_items = sessions.into_iter().filter_map(|session| {
            friends.get(&session.user_id).map(|user| FeedItem::Practice {
                user: user.clone(),
                session,
            })
        });

        let cover_items = covers.into_iter().filter_map(|cover| {
            friends.get(&cover.user_id).map(|user| FeedItem::Cover {
                user: user.clone(),
                cover,
            })
        });

        let mut items: Vec<FeedItem> = practice_items.chain(cover_items).collect();

        items.sort_by(|a, b| b.happened_at().cmp(&a.happened_at()));
        items.truncate(Self::FEED_LIMIT);

        Ok(items)
    }

    async fn pending_for_recipient(
        &self,
        user_id: PrimaryKey,
        request_id: PrimaryKey,
    ) -> CollabResult<FriendRequestData> {
        let request = self.db.friend_request_by_id(request_id).await?;

        if request.to.id != user_id {
            return Err(CollabError::Forbidden(
                "only the recipient can answer a friend request",
            ));
        }

        if request.status != FriendRequestStatus::Pending {
            return Err(CollabError::invalid("Cette demande a déjà reçu une réponse"));
        }

        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use crate::{testing::TestCollab, PracticeInput};

    use super::*;

    #[tokio::test]
    async fn requests_turn_into_friendships() {
        let test = TestCollab::new();
        let a = test.user("a").await;
        let b = test.user("b").await;
        let social = &test.collab.social;

        let request = social.send_request(a.user.id, "b").await.unwrap();

        let pending = social.requests(b.user.id).await.unwrap();
        assert_eq!(pending.incoming.len(), 1);
        assert!(pending.outgoing.is_empty());

        let by_sender = social.accept(a.user.id, request.id).await;
        assert!(matches!(by_sender, Err(CollabError::Forbidden(_))));

        social.accept(b.user.id, request.id).await.unwrap();

        assert_eq!(social.friends(a.user.id).await.unwrap()[0].id, b.user.id);

        let again = social.send_request(b.user.id, "a").await;
        assert!(matches!(
            again,
            Err(CollabError::Db(DatabaseError::Conflict { .. }))
        ));
    }

    #[tokio::test]
    async fn cannot_befriend_yourself() {
        let test = TestCollab::new();
        let a = test.user("a").await;

        let result = test.collab.social.send_request(a.user.id, "a").await;
        assert!(matches!(result, Err(CollabError::Invalid(_))));
    }

    #[tokio::test]
    async fn feed_shows_friends_only() {
        let test = TestCollab::new();
        let me = test.user("me").await;
        let friend = test.user("friend").await;
        let stranger = test.user("stranger").await;

        test.befriend(&me, &friend).await;

        for user in [&friend, &stranger] {
            test.collab
                .practice
                .record(
                    user.user.id,
                    PracticeInput {
                        duration_minutes: 30,
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }

        let feed = test.collab.social.feed(me.user.id).await.unwrap();

        assert_eq!(feed.len(), 1);
        assert!(matches!(
            &feed[0],
            FeedItem::Practice { user, .. } if user.id == friend.user.id
        ));
    }
}
