use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fretboard_core::{
    NewCheckout, PaymentProvider, ProrationBehavior, ProviderError, ProviderResult, Subscription,
    SubscriptionStatus,
};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;

use crate::http::{json, request_error};

/// The Stripe API, reached with a secret key and form-encoded requests
pub struct StripePayments {
    client: Client,
    secret_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct StripeObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StripeSession {
    url: String,
}

#[derive(Debug, Deserialize)]
struct StripeSubscription {
    id: String,
    status: SubscriptionStatus,
    current_period_end: Option<i64>,
    #[serde(default)]
    cancel_at_period_end: bool,
    items: StripeList<StripeItem>,
}

#[derive(Debug, Deserialize)]
struct StripeList<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct StripeItem {
    id: String,
    price: StripeObject,
}

impl StripePayments {
    const API_URL: &'static str = "https://api.stripe.com/v1";

    pub fn new<S>(secret_key: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            client: Client::new(),
            secret_key: secret_key.into(),
            base_url: Self::API_URL.to_string(),
        }
    }

    fn post(&self, path: &str) -> ProviderResult<RequestBuilder> {
        self.ensure_configured()?;

        Ok(self
            .client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.secret_key))
    }

    fn get(&self, path: &str) -> ProviderResult<RequestBuilder> {
        self.ensure_configured()?;

        Ok(self
            .client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.secret_key))
    }

    fn ensure_configured(&self) -> ProviderResult<()> {
        if self.secret_key.is_empty() {
            Err(ProviderError::Unavailable)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PaymentProvider for StripePayments {
    async fn create_customer(&self, user_id: i32, name: &str) -> ProviderResult<String> {
        let user_id = user_id.to_string();
        let form = [("name", name), ("metadata[user_id]", user_id.as_str())];

        let response = self
            .post("/customers")?
            .form(&form)
            .send()
            .await
            .map_err(request_error)?;

        let customer: StripeObject = json(response).await?;
        Ok(customer.id)
    }

    async fn subscription(&self, subscription_id: &str) -> ProviderResult<Subscription> {
        let response = self
            .get(&format!("/subscriptions/{subscription_id}"))?
            .send()
            .await
            .map_err(request_error)?;

        let subscription: StripeSubscription = json(response).await?;
        Ok(subscription.into())
    }

    async fn update_subscription_price(
        &self,
        subscription: &Subscription,
        price_id: &str,
        proration: ProrationBehavior,
    ) -> ProviderResult<Subscription> {
        let item_id = subscription
            .item_id
            .as_deref()
            .ok_or_else(|| ProviderError::Parse("subscription has no item".to_string()))?;

        let form = [
            ("items[0][id]", item_id),
            ("items[0][price]", price_id),
            ("proration_behavior", proration.as_str()),
        ];

        let response = self
            .post(&format!("/subscriptions/{}", subscription.id))?
            .form(&form)
            .send()
            .await
            .map_err(request_error)?;

        let subscription: StripeSubscription = json(response).await?;
        Ok(subscription.into())
    }

    async fn create_checkout_session(&self, checkout: NewCheckout) -> ProviderResult<String> {
        let user_id = checkout.user_id.to_string();

        let form = [
            ("mode", "subscription"),
            ("customer", checkout.customer_id.as_str()),
            ("line_items[0][price]", checkout.price_id.as_str()),
            ("line_items[0][quantity]", "1"),
            ("success_url", checkout.success_url.as_str()),
            ("cancel_url", checkout.cancel_url.as_str()),
            ("metadata[user_id]", user_id.as_str()),
            ("metadata[plan]", checkout.plan.as_str()),
            ("subscription_data[metadata][user_id]", user_id.as_str()),
        ];

        let response = self
            .post("/checkout/sessions")?
            .form(&form)
            .send()
            .await
            .map_err(request_error)?;

        let session: StripeSession = json(response).await?;
        Ok(session.url)
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> ProviderResult<String> {
        let form = [("customer", customer_id), ("return_url", return_url)];

        let response = self
            .post("/billing_portal/sessions")?
            .form(&form)
            .send()
            .await
            .map_err(request_error)?;

        let session: StripeSession = json(response).await?;
        Ok(session.url)
    }
}

impl From<StripeSubscription> for Subscription {
    fn from(subscription: StripeSubscription) -> Self {
        // Subscriptions created through checkout carry a single item
        let item = subscription.items.data.into_iter().next();

        Self {
            id: subscription.id,
            status: subscription.status,
            price_id: item.as_ref().map(|i| i.price.id.clone()),
            item_id: item.map(|i| i.id),
            current_period_end: subscription
                .current_period_end
                .and_then(|t| DateTime::<Utc>::from_timestamp(t, 0)),
            cancel_at_period_end: subscription.cancel_at_period_end,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn reads_subscriptions() {
        let raw = json!({
            "id": "sub_1",
            "object": "subscription",
            "status": "past_due",
            "current_period_end": 1_717_200_000,
            "cancel_at_period_end": true,
            "items": { "object": "list", "data": [
                { "id": "si_1", "price": { "id": "price_band", "unit_amount": 1200 } }
            ]}
        });

        let subscription: Subscription = serde_json::from_value::<StripeSubscription>(raw)
            .unwrap()
            .into();

        assert_eq!(subscription.status, SubscriptionStatus::PastDue);
        assert!(!subscription.status.is_active());
        assert_eq!(subscription.price_id.as_deref(), Some("price_band"));
        assert_eq!(subscription.item_id.as_deref(), Some("si_1"));
        assert!(subscription.cancel_at_period_end);
        assert_eq!(
            subscription.current_period_end.map(|t| t.timestamp()),
            Some(1_717_200_000)
        );
    }

    #[test]
    fn unknown_statuses_are_kept_as_unknown() {
        let raw = json!({
            "id": "sub_1",
            "status": "something_new",
            "items": { "data": [] }
        });

        let subscription: Subscription = serde_json::from_value::<StripeSubscription>(raw)
            .unwrap()
            .into();

        assert_eq!(subscription.status, SubscriptionStatus::Unknown);
        assert_eq!(subscription.item_id, None);
    }

    #[tokio::test]
    async fn refuses_to_work_without_a_key() {
        let stripe = StripePayments::new("");
        let result = stripe.create_customer(1, "Django").await;

        assert!(matches!(result, Err(ProviderError::Unavailable)));
    }
}
