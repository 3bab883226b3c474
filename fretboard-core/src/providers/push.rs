use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::ProviderResult;

/// A device endpoint able to receive web push messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushTarget {
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
}

/// The JSON sent to devices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    /// Page to open when the notification is clicked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Delivered,
    /// The push service reported the endpoint as gone (410), it should be forgotten
    Expired,
}

/// Sends web push messages, signed with the process-wide VAPID key pair
#[async_trait]
pub trait PushSender: Send + Sync {
    /// The VAPID public key browsers subscribe with
    fn public_key(&self) -> &str;

    async fn send(&self, target: &PushTarget, payload: &PushPayload)
        -> ProviderResult<PushOutcome>;
}
