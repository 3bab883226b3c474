use std::sync::Arc;

use chrono::{DateTime, Utc};
use fretboard_core::{
    Config, NewCheckout, PaymentProvider, Plan, ProrationBehavior, ProviderError, Subscription,
    SubscriptionStatus,
};
use hmac::{Hmac, Mac};
use log::{info, warn};
use serde_json::Value;
use sha2::Sha256;
use thiserror::Error;

use crate::{
    ArcedDatabase, BillingRefs, CollabContext, CollabError, CollabResult, DatabaseError,
    PrimaryKey, ProfileData,
};

type HmacSha256 = Hmac<Sha256>;

/// Plan changes through the payment provider's hosted subscriptions
pub struct BillingManager {
    db: ArcedDatabase,
    payments: Arc<dyn PaymentProvider>,
    config: Arc<Config>,
}

/// What selecting a plan should do, given the current subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingAction {
    /// Swap the price of the active subscription
    UpdateSubscription(ProrationBehavior),
    /// Send the user through a hosted checkout
    Checkout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanSelection {
    /// The subscription was changed in place
    Updated { plan: Plan },
    /// The user has to complete a checkout at this URL
    Checkout { url: String },
}

#[derive(Debug, Clone)]
pub struct BillingStatus {
    pub plan: Plan,
    pub status: Option<SubscriptionStatus>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("Malformed signature header")]
    Malformed,
    #[error("Signature timestamp is outside the tolerance")]
    OutsideTolerance,
    #[error("No signature matches the payload")]
    Mismatch,
}

/// Picks between changing the active subscription and a new checkout.
///
/// Upgrades are prorated on the next invoice, downgrades are invoiced right away.
pub fn select_billing_action(
    current: Plan,
    target: Plan,
    subscription: Option<&Subscription>,
) -> CollabResult<BillingAction> {
    if !target.is_paid() {
        return Err(CollabError::invalid(
            "Pour revenir au plan gratuit, annulez votre abonnement depuis le portail",
        ));
    }

    let active = subscription.is_some_and(|s| s.status.is_active());

    if !active {
        return Ok(BillingAction::Checkout);
    }

    if target == current {
        return Err(CollabError::invalid("Vous êtes déjà sur ce plan"));
    }

    let proration = if target.rank() > current.rank() {
        ProrationBehavior::CreateProrations
    } else {
        ProrationBehavior::AlwaysInvoice
    };

    Ok(BillingAction::UpdateSubscription(proration))
}

/// Verifies a `Stripe-Signature` header: `t=<unix time>,v1=<hex hmac>[,v1=...]`.
/// The HMAC-SHA256 is computed over `<t>.<payload>` with the endpoint secret.
pub fn verify_webhook_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
) -> Result<(), WebhookError> {
    const TOLERANCE_SECONDS: i64 = 300;

    let mut timestamp = None;
    let mut signatures = vec![];

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(WebhookError::Malformed)?;

    if signatures.is_empty() {
        return Err(WebhookError::Malformed);
    }

    if (now - timestamp).abs() > TOLERANCE_SECONDS {
        return Err(WebhookError::OutsideTolerance);
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| WebhookError::Malformed)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    let matches = signatures.iter().any(|signature| {
        hex::decode(signature).is_ok_and(|bytes| mac.clone().verify_slice(&bytes).is_ok())
    });

    if matches {
        Ok(())
    } else {
        Err(WebhookError::Mismatch)
    }
}

impl BillingManager {
    pub fn new(context: &CollabContext) -> Self {
        Self {
            db: context.database.clone(),
            payments: context.providers.payments.clone(),
            config: context.config.clone(),
        }
    }

    /// The action is settled before anything is created at the provider
    pub async fn select_plan(&self, user_id: PrimaryKey, target: Plan) -> CollabResult<PlanSelection> {
        if !target.is_paid() {
            select_billing_action(Plan::Free, target, None)?;
        }

        let profile = self.db.profile_by_user_id(user_id).await?;

        let subscription = match &profile.stripe_subscription_id {
            Some(id) => Some(self.payments.subscription(id).await?),
            None => None,
        };

        let action = select_billing_action(profile.plan, target, subscription.as_ref())?;

        let price_id = self
            .config
            .stripe
            .price_for(target)
            .ok_or(ProviderError::Unavailable)?
            .to_string();

        match action {
            BillingAction::UpdateSubscription(proration) => {
                // The action is only picked with a subscription present
                let subscription = subscription.ok_or(CollabError::NotFound("subscription"))?;

                self.payments
                    .update_subscription_price(&subscription, &price_id, proration)
                    .await?;
                self.db.update_plan(user_id, target).await?;

                info!(
                    "User {} moved from {} to {} ({})",
                    user_id,
                    profile.plan,
                    target,
                    proration.as_str()
                );

                Ok(PlanSelection::Updated { plan: target })
            }
            BillingAction::Checkout => {
                let customer_id = self.ensure_customer(&profile).await?;
                let public_url = &self.config.server.public_url;

                let url = self
                    .payments
                    .create_checkout_session(NewCheckout {
                        customer_id,
                        price_id,
                        user_id,
                        plan: target,
                        success_url: format!("{public_url}/settings?billing=success"),
                        cancel_url: format!("{public_url}/settings?billing=cancelled"),
                    })
                    .await?;

                Ok(PlanSelection::Checkout { url })
            }
        }
    }

    /// A link to the hosted billing portal
    pub async fn portal(&self, user_id: PrimaryKey) -> CollabResult<String> {
        let profile = self.db.profile_by_user_id(user_id).await?;

        let customer_id = profile
            .stripe_customer_id
            .ok_or_else(|| CollabError::invalid("Aucun compte de facturation"))?;

        let return_url = format!("{}/settings", self.config.server.public_url);

        Ok(self
            .payments
            .create_portal_session(&customer_id, &return_url)
            .await?)
    }

    pub async fn status(&self, user_id: PrimaryKey) -> CollabResult<BillingStatus> {
        let profile = self.db.profile_by_user_id(user_id).await?;

        let subscription = match &profile.stripe_subscription_id {
            Some(id) => Some(self.payments.subscription(id).await?),
            None => None,
        };

        Ok(BillingStatus {
            plan: profile.plan,
            status: subscription.as_ref().map(|s| s.status),
            current_period_end: subscription.as_ref().and_then(|s| s.current_period_end),
            cancel_at_period_end: subscription.is_some_and(|s| s.cancel_at_period_end),
        })
    }

    /// Verifies and applies a webhook event. Unknown events are acknowledged and ignored.
    pub async fn handle_webhook(&self, payload: &[u8], signature: &str) -> CollabResult<()> {
        verify_webhook_signature(
            payload,
            signature,
            &self.config.stripe.webhook_secret,
            Utc::now().timestamp(),
        )
        .map_err(|e| {
            warn!("Rejected webhook: {}", e);
            CollabError::invalid("Signature invalide")
        })?;

        let event: Value = serde_json::from_slice(payload)
            .map_err(|_| CollabError::invalid("Événement invalide"))?;

        let kind = event["type"].as_str().unwrap_or_default();
        let object = &event["data"]["object"];

        let result = match kind {
            "checkout.session.completed" => self.checkout_completed(object).await,
            "customer.subscription.updated" => self.subscription_updated(object).await,
            "customer.subscription.deleted" => self.subscription_deleted(object).await,
            other => {
                info!("Ignoring webhook event {}", other);
                Ok(())
            }
        };

        match result {
            // Events about customers we don't know are acknowledged, retrying won't help
            Err(CollabError::Db(DatabaseError::NotFound { resource, .. })) => {
                warn!("Webhook {} refers to an unknown {}", kind, resource);
                Ok(())
            }
            result => result,
        }
    }

    async fn checkout_completed(&self, object: &Value) -> CollabResult<()> {
        let metadata = &object["metadata"];

        let user_id: PrimaryKey = metadata["user_id"]
            .as_str()
            .and_then(|id| id.parse().ok())
            .ok_or_else(|| CollabError::invalid("Métadonnées manquantes"))?;

        let plan: Plan = metadata["plan"]
            .as_str()
            .and_then(|plan| plan.parse().ok())
            .ok_or_else(|| CollabError::invalid("Métadonnées manquantes"))?;

        self.db
            .update_billing(
                user_id,
                BillingRefs {
                    customer_id: object["customer"].as_str().map(String::from),
                    subscription_id: object["subscription"].as_str().map(String::from),
                },
            )
            .await?;
        self.db.update_plan(user_id, plan).await?;

        info!("User {} subscribed to {}", user_id, plan);
        Ok(())
    }

    async fn subscription_updated(&self, object: &Value) -> CollabResult<()> {
        let profile = self.profile_for_customer(object).await?;

        let status: SubscriptionStatus =
            serde_json::from_value(object["status"].clone()).unwrap_or(SubscriptionStatus::Unknown);

        let plan = if status.is_active() {
            let price_id = object["items"]["data"][0]["price"]["id"]
                .as_str()
                .unwrap_or_default();

            match self.config.stripe.plan_for_price(price_id) {
                Some(plan) => plan,
                None => {
                    warn!("Subscription uses unknown price {}", price_id);
                    return Ok(());
                }
            }
        } else {
            Plan::Free
        };

        self.db
            .update_billing(
                profile.id(),
                BillingRefs {
                    customer_id: None,
                    subscription_id: object["id"].as_str().map(String::from),
                },
            )
            .await?;
        self.db.update_plan(profile.id(), plan).await?;

        info!("User {} is now on {}", profile.id(), plan);
        Ok(())
    }

    async fn subscription_deleted(&self, object: &Value) -> CollabResult<()> {
        let profile = self.profile_for_customer(object).await?;
        self.db.update_plan(profile.id(), Plan::Free).await?;

        info!("Subscription of user {} ended", profile.id());
        Ok(())
    }

    async fn profile_for_customer(&self, object: &Value) -> CollabResult<ProfileData> {
        let customer_id = object["customer"]
            .as_str()
            .ok_or_else(|| CollabError::invalid("Client manquant"))?;

        Ok(self.db.profile_by_customer_id(customer_id).await?)
    }

    async fn ensure_customer(&self, profile: &ProfileData) -> CollabResult<String> {
        if let Some(customer_id) = &profile.stripe_customer_id {
            return Ok(customer_id.clone());
        }

        let customer_id = self
            .payments
            .create_customer(profile.id(), &profile.user.display_name)
            .await?;

        self.db
            .update_billing(
                profile.id(),
                BillingRefs {
                    customer_id: Some(customer_id.clone()),
                    subscription_id: None,
                },
            )
            .await?;

        Ok(customer_id)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::{
        testing::{sign_webhook_payload, PaymentCall, TestCollab},
        Database,
    };

    use super::*;

    fn subscription(status: SubscriptionStatus) -> Subscription {
        Subscription {
            id: "sub_1".to_string(),
            status,
            price_id: Some("price_pro".to_string()),
            item_id: Some("si_1".to_string()),
            current_period_end: None,
            cancel_at_period_end: false,
        }
    }

    #[test]
    fn upgrades_prorate_and_downgrades_invoice() {
        let active = subscription(SubscriptionStatus::Active);

        assert_eq!(
            select_billing_action(Plan::Pro, Plan::Band, Some(&active)).unwrap(),
            BillingAction::UpdateSubscription(ProrationBehavior::CreateProrations)
        );
        assert_eq!(
            select_billing_action(Plan::Band, Plan::Pro, Some(&active)).unwrap(),
            BillingAction::UpdateSubscription(ProrationBehavior::AlwaysInvoice)
        );
    }

    #[test]
    fn inactive_subscriptions_go_through_checkout() {
        let canceled = subscription(SubscriptionStatus::Canceled);
        let trialing = subscription(SubscriptionStatus::Trialing);

        assert_eq!(
            select_billing_action(Plan::Free, Plan::Pro, None).unwrap(),
            BillingAction::Checkout
        );
        assert_eq!(
            select_billing_action(Plan::Pro, Plan::Pro, Some(&canceled)).unwrap(),
            BillingAction::Checkout
        );
        assert!(matches!(
            select_billing_action(Plan::Pro, Plan::Pro, Some(&trialing)),
            Err(CollabError::Invalid(_))
        ));
    }

    #[test]
    fn free_is_never_a_target() {
        assert!(matches!(
            select_billing_action(Plan::Pro, Plan::Free, None),
            Err(CollabError::Invalid(_))
        ));
    }

    #[test]
    fn verifies_signatures() {
        let payload = br#"{"type":"ping"}"#;
        let header = sign_webhook_payload(payload, "whsec_test", 1_000);

        assert_eq!(
            verify_webhook_signature(payload, &header, "whsec_test", 1_100),
            Ok(())
        );
        assert_eq!(
            verify_webhook_signature(payload, &header, "whsec_test", 1_400),
            Err(WebhookError::OutsideTolerance)
        );
        assert_eq!(
            verify_webhook_signature(payload, &header, "whsec_other", 1_100),
            Err(WebhookError::Mismatch)
        );
        assert_eq!(
            verify_webhook_signature(payload, "v1=abc", "whsec_test", 1_100),
            Err(WebhookError::Malformed)
        );
    }

    #[tokio::test]
    async fn checkout_without_subscription() {
        let test = TestCollab::new();
        let user = test.user("django").await;

        let selection = test
            .collab
            .billing
            .select_plan(user.user.id, Plan::Pro)
            .await
            .unwrap();

        assert!(matches!(selection, PlanSelection::Checkout { .. }));

        let profile = test.collab.profiles.profile(user.user.id).await.unwrap();
        assert!(profile.stripe_customer_id.is_some());
        assert_eq!(profile.plan, Plan::Free);
    }

    #[tokio::test]
    async fn rejected_selections_create_no_customer() {
        let test = TestCollab::new();
        let user = test.user_with_plan("django", Plan::Pro).await;

        test.payments
            .set_subscription(subscription(SubscriptionStatus::Active));
        test.db
            .update_billing(
                user.user.id,
                BillingRefs {
                    customer_id: None,
                    subscription_id: Some("sub_1".to_string()),
                },
            )
            .await
            .unwrap();

        let result = test.collab.billing.select_plan(user.user.id, Plan::Pro).await;

        assert!(matches!(result, Err(CollabError::Invalid(_))));
        assert!(!test
            .payments
            .calls()
            .iter()
            .any(|c| matches!(c, PaymentCall::CreateCustomer { .. })));

        let profile = test.collab.profiles.profile(user.user.id).await.unwrap();
        assert_eq!(profile.stripe_customer_id, None);
    }

    #[tokio::test]
    async fn downgrade_is_invoiced_immediately() {
        let test = TestCollab::new();
        let user = test.user_with_plan("django", Plan::Band).await;
        test.subscribe(&user, "sub_1", SubscriptionStatus::Active).await;

        let selection = test
            .collab
            .billing
            .select_plan(user.user.id, Plan::Pro)
            .await
            .unwrap();

        assert_eq!(selection, PlanSelection::Updated { plan: Plan::Pro });
        assert!(test.payments.calls().contains(&PaymentCall::UpdatePrice {
            subscription_id: "sub_1".to_string(),
            price_id: "price_pro".to_string(),
            proration: ProrationBehavior::AlwaysInvoice,
        }));

        let profile = test.collab.profiles.profile(user.user.id).await.unwrap();
        assert_eq!(profile.plan, Plan::Pro);
    }

    #[tokio::test]
    async fn webhook_applies_completed_checkouts() {
        let test = TestCollab::new();
        let user = test.user("django").await;

        let payload = json!({
            "type": "checkout.session.completed",
            "data": { "object": {
                "customer": "cus_1",
                "subscription": "sub_1",
                "metadata": { "user_id": user.user.id.to_string(), "plan": "band" }
            }}
        })
        .to_string();

        let header = sign_webhook_payload(payload.as_bytes(), "whsec_test", Utc::now().timestamp());

        test.collab
            .billing
            .handle_webhook(payload.as_bytes(), &header)
            .await
            .unwrap();

        let profile = test.collab.profiles.profile(user.user.id).await.unwrap();
        assert_eq!(profile.plan, Plan::Band);
        assert_eq!(profile.stripe_customer_id.as_deref(), Some("cus_1"));
        assert_eq!(profile.stripe_subscription_id.as_deref(), Some("sub_1"));

        let deleted = json!({
            "type": "customer.subscription.deleted",
            "data": { "object": { "id": "sub_1", "customer": "cus_1" } }
        })
        .to_string();
        let header = sign_webhook_payload(deleted.as_bytes(), "whsec_test", Utc::now().timestamp());

        test.collab
            .billing
            .handle_webhook(deleted.as_bytes(), &header)
            .await
            .unwrap();

        let profile = test.collab.profiles.profile(user.user.id).await.unwrap();
        assert_eq!(profile.plan, Plan::Free);
    }
}
