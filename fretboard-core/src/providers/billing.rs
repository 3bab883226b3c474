use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ProviderResult;
use crate::Plan;

/// The state of a hosted subscription, as reported by the payment provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Canceled,
    Incomplete,
    IncompleteExpired,
    Unpaid,
    Paused,
    #[serde(other)]
    Unknown,
}

impl SubscriptionStatus {
    /// Whether the subscription can have its price changed in place
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active | Self::Trialing)
    }
}

#[derive(Debug, Clone)]
pub struct Subscription {
    pub id: String,
    pub status: SubscriptionStatus,
    pub price_id: Option<String>,
    /// The subscription item carrying the price
    pub item_id: Option<String>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
}

/// How a price change on an existing subscription is billed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProrationBehavior {
    /// Prorate the difference on the next invoice
    CreateProrations,
    /// Prorate and invoice right away
    AlwaysInvoice,
}

impl ProrationBehavior {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateProrations => "create_prorations",
            Self::AlwaysInvoice => "always_invoice",
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewCheckout {
    pub customer_id: String,
    pub price_id: String,
    /// Stored in the session metadata so the webhook can find the user again
    pub user_id: i32,
    /// Also stored in the metadata, applied once checkout completes
    pub plan: Plan,
    pub success_url: String,
    pub cancel_url: String,
}

/// A payment provider with hosted customers, subscriptions, and checkout
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Creates a customer and returns its id
    async fn create_customer(&self, user_id: i32, name: &str) -> ProviderResult<String>;

    async fn subscription(&self, subscription_id: &str) -> ProviderResult<Subscription>;

    /// Swaps the price of a subscription's item
    async fn update_subscription_price(
        &self,
        subscription: &Subscription,
        price_id: &str,
        proration: ProrationBehavior,
    ) -> ProviderResult<Subscription>;

    /// Creates a hosted checkout session, returning the URL to send the user to
    async fn create_checkout_session(&self, checkout: NewCheckout) -> ProviderResult<String>;

    /// Creates a billing portal session, returning its URL
    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> ProviderResult<String>;
}
