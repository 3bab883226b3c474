use std::sync::Arc;

use fretboard_core::{PushOutcome, PushPayload, PushSender, PushTarget};
use log::{info, warn};

use crate::{
    util::non_blank, ArcedDatabase, CollabContext, CollabError, CollabResult,
    NewNotificationLog, NewPushSubscription, NotificationLogData, PrimaryKey,
    PushSubscriptionData,
};

pub struct PushManager {
    db: ArcedDatabase,
    notifier: Notifier,
}

/// Fans a notification out to every device of a user
#[derive(Clone)]
pub struct Notifier {
    db: ArcedDatabase,
    sender: Arc<dyn PushSender>,
}

#[derive(Debug)]
pub struct SubscriptionInput {
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
}

impl PushManager {
    const LOG_LIMIT: i64 = 50;

    pub fn new(context: &CollabContext) -> Self {
        Self {
            db: context.database.clone(),
            notifier: Notifier::new(context),
        }
    }

    /// The VAPID public key browsers need to subscribe
    pub fn public_key(&self) -> &str {
        self.notifier.sender.public_key()
    }

    /// Registers a device, an endpoint that is already known gets its owner and keys replaced
    pub async fn subscribe(
        &self,
        user_id: PrimaryKey,
        input: SubscriptionInput,
    ) -> CollabResult<PushSubscriptionData> {
        let missing = || CollabError::invalid("Abonnement push invalide");

        let subscription = self
            .db
            .upsert_push_subscription(NewPushSubscription {
                user_id,
                endpoint: non_blank(Some(input.endpoint)).ok_or_else(missing)?,
                p256dh: non_blank(Some(input.p256dh)).ok_or_else(missing)?,
                auth: non_blank(Some(input.auth)).ok_or_else(missing)?,
            })
            .await?;

        Ok(subscription)
    }

    pub async fn unsubscribe(&self, user_id: PrimaryKey, endpoint: &str) -> CollabResult<()> {
        let owned = self
            .db
            .push_subscriptions_for(user_id)
            .await?
            .into_iter()
            .any(|s| s.endpoint == endpoint);

        if !owned {
            return Err(CollabError::NotFound("push subscription"));
        }

        Ok(self.db.delete_push_subscription(endpoint).await?)
    }

    pub async fn notify(
        &self,
        user_id: PrimaryKey,
        payload: PushPayload,
    ) -> CollabResult<NotificationLogData> {
        self.notifier.notify(user_id, payload).await
    }

    pub async fn send_test(&self, user_id: PrimaryKey) -> CollabResult<NotificationLogData> {
        self.notify(
            user_id,
            PushPayload {
                title: "Fretboard".to_string(),
                body: "Les notifications fonctionnent !".to_string(),
                url: Some("/settings".to_string()),
            },
        )
        .await
    }

    /// The latest notification fan-outs, newest first
    pub async fn notifications(&self, user_id: PrimaryKey) -> CollabResult<Vec<NotificationLogData>> {
        Ok(self
            .db
            .list_notification_logs(user_id, Self::LOG_LIMIT)
            .await?)
    }
}

impl Notifier {
    pub fn new(context: &CollabContext) -> Self {
        Self {
            db: context.database.clone(),
            sender: context.providers.push.clone(),
        }
    }

    /// Sends the payload to every endpoint of the user, one after the other.
    ///
    /// Endpoints the push service reports as gone are deleted, any other
    /// failure is logged and counted. Exactly one log row is written per call.
    pub async fn notify(
        &self,
        user_id: PrimaryKey,
        payload: PushPayload,
    ) -> CollabResult<NotificationLogData> {
        let subscriptions = self.db.push_subscriptions_for(user_id).await?;

        let mut delivered = 0;
        let mut failed = 0;

        for subscription in subscriptions {
            let target = PushTarget {
                endpoint: subscription.endpoint,
                p256dh: subscription.p256dh,
                auth: subscription.auth,
            };

            match self.sender.send(&target, &payload).await {
                Ok(PushOutcome::Delivered) => delivered += 1,
                Ok(PushOutcome::Expired) => {
                    failed += 1;
                    info!("Removing expired push endpoint of user {}", user_id);

                    if let Err(e) = self.db.delete_push_subscription(&target.endpoint).await {
                        warn!("Failed to remove expired push endpoint: {}", e);
                    }
                }
                Err(e) => {
                    failed += 1;
                    warn!("Push to user {} failed: {}", user_id, e);
                }
            }
        }

        let log = self
            .db
            .create_notification_log(NewNotificationLog {
                user_id,
                title: payload.title,
                body: payload.body,
                delivered,
                failed,
            })
            .await?;

        Ok(log)
    }

    /// Notifies without failing the caller, for notifications that accompany another action
    pub async fn notify_quietly(&self, user_id: PrimaryKey, payload: PushPayload) {
        if let Err(e) = self.notify(user_id, payload).await {
            warn!("Failed to notify user {}: {}", user_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::TestCollab;

    use super::*;

    fn device(endpoint: &str) -> SubscriptionInput {
        SubscriptionInput {
            endpoint: endpoint.to_string(),
            p256dh: "p256dh".to_string(),
            auth: "auth".to_string(),
        }
    }

    fn payload() -> PushPayload {
        PushPayload {
            title: "Jam".to_string(),
            body: "Someone started a jam".to_string(),
            url: None,
        }
    }

    #[tokio::test]
    async fn expired_endpoints_are_removed() {
        let test = TestCollab::new();
        let user = test.user("django").await;
        let push = &test.collab.push;

        push.subscribe(user.user.id, device("https://push.example/alive"))
            .await
            .unwrap();
        push.subscribe(user.user.id, device("https://push.example/gone"))
            .await
            .unwrap();

        test.push.expire("https://push.example/gone");

        let log = push.notify(user.user.id, payload()).await.unwrap();
        assert_eq!((log.delivered, log.failed), (1, 1));

        let log = push.notify(user.user.id, payload()).await.unwrap();
        assert_eq!((log.delivered, log.failed), (1, 0));

        let sent_to_gone = test
            .push
            .sent()
            .iter()
            .filter(|(endpoint, _)| endpoint == "https://push.example/gone")
            .count();

        assert_eq!(sent_to_gone, 1);
    }

    #[tokio::test]
    async fn failures_are_counted_and_swallowed() {
        let test = TestCollab::new();
        let user = test.user("django").await;
        let push = &test.collab.push;

        push.subscribe(user.user.id, device("https://push.example/flaky"))
            .await
            .unwrap();
        test.push.fail("https://push.example/flaky");

        let log = push.notify(user.user.id, payload()).await.unwrap();

        assert_eq!((log.delivered, log.failed), (0, 1));
        // Other failures don't remove the endpoint
        assert_eq!(
            test.collab.push.notify(user.user.id, payload()).await.unwrap().failed,
            1
        );
    }

    #[tokio::test]
    async fn writes_one_log_per_call() {
        let test = TestCollab::new();
        let user = test.user("django").await;

        test.collab.push.send_test(user.user.id).await.unwrap();
        test.collab.push.send_test(user.user.id).await.unwrap();

        let logs = test.collab.push.notifications(user.user.id).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!((logs[0].delivered, logs[0].failed), (0, 0));
    }

    #[tokio::test]
    async fn only_own_endpoints_can_be_removed() {
        let test = TestCollab::new();
        let owner = test.user("owner").await;
        let other = test.user("other").await;

        test.collab
            .push
            .subscribe(owner.user.id, device("https://push.example/device"))
            .await
            .unwrap();

        let result = test
            .collab
            .push
            .unsubscribe(other.user.id, "https://push.example/device")
            .await;

        assert!(matches!(result, Err(CollabError::NotFound(_))));
    }
}
