use async_trait::async_trait;
use fretboard_core::{
    ProviderError, ProviderResult, PushOutcome, PushPayload, PushSender, PushTarget, VapidConfig,
};
use reqwest::{Client, StatusCode};
use web_push::{
    ContentEncoding, SubscriptionInfo, VapidSignatureBuilder, WebPushError, WebPushMessage,
    WebPushMessageBuilder,
};

use crate::http::{ensure_success, request_error};

/// Encrypts messages with `web-push` and delivers them to the push services.
/// Every message is signed with the same VAPID key pair.
pub struct VapidPushSender {
    client: Client,
    config: VapidConfig,
}

impl VapidPushSender {
    /// How long push services keep undelivered messages, in seconds
    const TTL: u32 = 24 * 60 * 60;

    pub fn new(config: VapidConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn build_message(&self, target: &PushTarget, payload: &[u8]) -> Result<WebPushMessage, WebPushError> {
        let subscription = SubscriptionInfo::new(&target.endpoint, &target.p256dh, &target.auth);

        let mut signature = VapidSignatureBuilder::from_base64(&self.config.private_key, web_push::URL_SAFE_NO_PAD, &subscription)?;
        signature.add_claim("sub", self.config.subject.as_str());

        let mut builder = WebPushMessageBuilder::new(&subscription);
        builder.set_ttl(Self::TTL);
        builder.set_payload(ContentEncoding::Aes128Gcm, payload);
        builder.set_vapid_signature(signature.build()?);

        builder.build()
    }
}

#[async_trait]
impl PushSender for VapidPushSender {
    fn public_key(&self) -> &str {
        &self.config.public_key
    }

    async fn send(&self, target: &PushTarget, payload: &PushPayload) -> ProviderResult<PushOutcome> {
        if self.config.private_key.is_empty() {
            return Err(ProviderError::Unavailable);
        }

        let body = serde_json::to_vec(payload).map_err(|e| ProviderError::Parse(e.to_string()))?;
        let message = self
            .build_message(target, &body)
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        let mut request = self
            .client
            .post(message.endpoint.to_string())
            .header("TTL", message.ttl.to_string());

        if let Some(payload) = message.payload {
            request = request
                .header("Content-Encoding", payload.content_encoding.to_str())
                .header("Content-Type", "application/octet-stream");

            for (name, value) in payload.crypto_headers {
                request = request.header(name, value);
            }

            request = request.body(payload.content);
        }

        let response = request.send().await.map_err(request_error)?;

        if is_gone(response.status()) {
            return Ok(PushOutcome::Expired);
        }

        ensure_success(response).await?;
        Ok(PushOutcome::Delivered)
    }
}

/// Push services answer 410 for unsubscribed endpoints, some use 404
fn is_gone(status: StatusCode) -> bool {
    matches!(status, StatusCode::GONE | StatusCode::NOT_FOUND)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gone_endpoints() {
        assert!(is_gone(StatusCode::GONE));
        assert!(is_gone(StatusCode::NOT_FOUND));
        assert!(!is_gone(StatusCode::CREATED));
        assert!(!is_gone(StatusCode::TOO_MANY_REQUESTS));
    }

    #[tokio::test]
    async fn needs_a_key_pair() {
        let sender = VapidPushSender::new(VapidConfig::default());
        let target = PushTarget {
            endpoint: "https://push.example/device".to_string(),
            p256dh: "p256dh".to_string(),
            auth: "auth".to_string(),
        };
        let payload = PushPayload {
            title: "Jam".to_string(),
            body: "Test".to_string(),
            url: None,
        };

        let result = sender.send(&target, &payload).await;
        assert!(matches!(result, Err(ProviderError::Unavailable)));
    }
}
