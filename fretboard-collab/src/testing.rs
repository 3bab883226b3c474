//! An in-memory collab system with fake providers, for tests of this crate and the ones using it.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use fretboard_core::{
    AudioFeatures, Config, ExternalPlaylist, ExternalTrack, MusicProvider, MusicTokens,
    NewCheckout, ObjectStorage, PaymentProvider, PlayedTrack, Plan, ProrationBehavior,
    ProviderError, ProviderResult, PushOutcome, PushPayload, PushSender, PushTarget,
    RecognitionMatch, Recognizer, StripeConfig, Subscription, SubscriptionStatus, TabResult,
    TabSource,
};
use hmac::{Hmac, Mac};
use parking_lot::Mutex;
use sha2::Sha256;

use crate::{
    BillingRefs, Collab, Database, MemoryDatabase, NewPlainUser, Providers, SessionData,
    SpotifyLink,
};

pub const TEST_WEBHOOK_SECRET: &str = "whsec_test";

/// A collab system over a [MemoryDatabase], with handles on every fake
pub struct TestCollab {
    pub collab: Collab,
    pub db: Arc<MemoryDatabase>,
    pub payments: Arc<FakePayments>,
    pub music: Arc<FakeMusic>,
    pub recognizer: Arc<FakeRecognizer>,
    pub push: Arc<FakePushSender>,
    pub storage: Arc<FakeStorage>,
}

impl TestCollab {
    pub fn new() -> Self {
        Self::with_tab_sources(vec![FakeTabSource::ok("songsterr", &["Minor Swing"])])
    }

    pub fn with_tab_sources(tab_sources: Vec<FakeTabSource>) -> Self {
        let db = Arc::new(MemoryDatabase::new());
        let payments = Arc::new(FakePayments::default());
        let music = Arc::new(FakeMusic::default());
        let recognizer = Arc::new(FakeRecognizer);
        let push = Arc::new(FakePushSender::default());
        let storage = Arc::new(FakeStorage::default());

        let providers = Providers {
            payments: payments.clone(),
            music: music.clone(),
            recognizer: recognizer.clone(),
            tab_sources: tab_sources
                .into_iter()
                .map(|s| Arc::new(s) as Arc<dyn TabSource>)
                .collect(),
            push: push.clone(),
            storage: storage.clone(),
        };

        let collab = Collab::with_database(db.clone(), providers, test_config());

        Self {
            collab,
            db,
            payments,
            music,
            recognizer,
            push,
            storage,
        }
    }

    /// Registers a user on the free plan
    pub async fn user(&self, username: &str) -> SessionData {
        self.collab
            .auth
            .register(NewPlainUser {
                username: username.to_string(),
                password: "password".to_string(),
                display_name: username.to_string(),
            })
            .await
            .expect("user registers")
    }

    pub async fn user_with_plan(&self, username: &str, plan: Plan) -> SessionData {
        let session = self.user(username).await;
        self.db.set_plan(session.user.id, plan);

        session
    }

    pub async fn befriend(&self, a: &SessionData, b: &SessionData) {
        let request = self
            .collab
            .social
            .send_request(a.user.id, &b.user.username)
            .await
            .expect("request is sent");

        self.collab
            .social
            .accept(b.user.id, request.id)
            .await
            .expect("request is accepted");
    }

    /// Gives the user a customer and a subscription at the payment provider
    pub async fn subscribe(&self, session: &SessionData, subscription_id: &str, status: SubscriptionStatus) {
        self.payments.set_subscription(Subscription {
            id: subscription_id.to_string(),
            status,
            price_id: None,
            item_id: Some("si_1".to_string()),
            current_period_end: Some(Utc::now() + Duration::days(30)),
            cancel_at_period_end: false,
        });

        self.db
            .update_billing(
                session.user.id,
                BillingRefs {
                    customer_id: Some(format!("cus_{}", session.user.id)),
                    subscription_id: Some(subscription_id.to_string()),
                },
            )
            .await
            .expect("billing is stored");
    }

    pub async fn link_spotify(&self, session: &SessionData, expires_at: DateTime<Utc>) {
        self.db
            .set_spotify_link(
                session.user.id,
                Some(SpotifyLink {
                    access_token: "access-token".to_string(),
                    refresh_token: "refresh-token".to_string(),
                    expires_at,
                }),
            )
            .await
            .expect("link is stored");
    }
}

impl Default for TestCollab {
    fn default() -> Self {
        Self::new()
    }
}

pub fn test_config() -> Config {
    Config {
        stripe: StripeConfig {
            secret_key: "sk_test".to_string(),
            webhook_secret: TEST_WEBHOOK_SECRET.to_string(),
            price_pro: "price_pro".to_string(),
            price_band: "price_band".to_string(),
        },
        ..Default::default()
    }
}

/// Builds a `Stripe-Signature` header for the payload
pub fn sign_webhook_payload(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("any key length works");
    mac.update(format!("{timestamp}.").as_bytes());
    mac.update(payload);

    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

pub fn track(id: &str) -> ExternalTrack {
    ExternalTrack {
        id: id.to_string(),
        title: format!("Track {id}"),
        artist: "Django Reinhardt".to_string(),
        album: None,
        artwork: None,
        duration_ms: Some(180_000),
        url: None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PaymentCall {
    CreateCustomer {
        user_id: i32,
    },
    UpdatePrice {
        subscription_id: String,
        price_id: String,
        proration: ProrationBehavior,
    },
    Checkout {
        customer_id: String,
        price_id: String,
        plan: Plan,
    },
    Portal {
        customer_id: String,
    },
}

#[derive(Default)]
pub struct FakePayments {
    calls: Mutex<Vec<PaymentCall>>,
    subscriptions: Mutex<HashMap<String, Subscription>>,
}

impl FakePayments {
    pub fn calls(&self) -> Vec<PaymentCall> {
        self.calls.lock().clone()
    }

    pub fn set_subscription(&self, subscription: Subscription) {
        self.subscriptions
            .lock()
            .insert(subscription.id.clone(), subscription);
    }
}

#[async_trait]
impl PaymentProvider for FakePayments {
    async fn create_customer(&self, user_id: i32, _name: &str) -> ProviderResult<String> {
        self.calls.lock().push(PaymentCall::CreateCustomer { user_id });
        Ok(format!("cus_{user_id}"))
    }

    async fn subscription(&self, subscription_id: &str) -> ProviderResult<Subscription> {
        self.subscriptions
            .lock()
            .get(subscription_id)
            .cloned()
            .ok_or_else(|| ProviderError::Status {
                code: 404,
                message: "No such subscription".to_string(),
            })
    }

    async fn update_subscription_price(
        &self,
        subscription: &Subscription,
        price_id: &str,
        proration: ProrationBehavior,
    ) -> ProviderResult<Subscription> {
        self.calls.lock().push(PaymentCall::UpdatePrice {
            subscription_id: subscription.id.clone(),
            price_id: price_id.to_string(),
            proration,
        });

        let updated = Subscription {
            price_id: Some(price_id.to_string()),
            ..subscription.clone()
        };
        self.set_subscription(updated.clone());

        Ok(updated)
    }

    async fn create_checkout_session(&self, checkout: NewCheckout) -> ProviderResult<String> {
        self.calls.lock().push(PaymentCall::Checkout {
            customer_id: checkout.customer_id.clone(),
            price_id: checkout.price_id.clone(),
            plan: checkout.plan,
        });

        Ok(format!("https://checkout.example/{}", checkout.customer_id))
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        _return_url: &str,
    ) -> ProviderResult<String> {
        self.calls.lock().push(PaymentCall::Portal {
            customer_id: customer_id.to_string(),
        });

        Ok(format!("https://portal.example/{customer_id}"))
    }
}

/// Hands out fixed tokens and counts refreshes
#[derive(Default)]
pub struct FakeMusic {
    refreshes: Mutex<usize>,
    played: Mutex<Vec<PlayedTrack>>,
}

impl FakeMusic {
    pub fn refresh_count(&self) -> usize {
        *self.refreshes.lock()
    }

    pub fn set_recently_played(&self, played: Vec<PlayedTrack>) {
        *self.played.lock() = played;
    }
}

#[async_trait]
impl MusicProvider for FakeMusic {
    fn authorize_url(&self, state: &str) -> String {
        format!("https://accounts.example/authorize?state={state}")
    }

    async fn exchange_code(&self, _code: &str) -> ProviderResult<MusicTokens> {
        Ok(MusicTokens {
            access_token: "access-token".to_string(),
            refresh_token: Some("refresh-token".to_string()),
            expires_at: Utc::now() + Duration::hours(1),
        })
    }

    async fn refresh(&self, _refresh_token: &str) -> ProviderResult<MusicTokens> {
        *self.refreshes.lock() += 1;

        Ok(MusicTokens {
            access_token: "refreshed-token".to_string(),
            refresh_token: None,
            expires_at: Utc::now() + Duration::hours(1),
        })
    }

    async fn search_tracks(
        &self,
        _access_token: &str,
        query: &str,
    ) -> ProviderResult<Vec<ExternalTrack>> {
        Ok(vec![track(query)])
    }

    async fn playlists(&self, _access_token: &str) -> ProviderResult<Vec<ExternalPlaylist>> {
        Ok(vec![ExternalPlaylist {
            id: "pl_1".to_string(),
            name: "Gypsy jazz".to_string(),
            track_count: 12,
            artwork: None,
            url: None,
        }])
    }

    async fn recently_played(&self, _access_token: &str) -> ProviderResult<Vec<PlayedTrack>> {
        Ok(self.played.lock().clone())
    }

    async fn audio_features(
        &self,
        _access_token: &str,
        track_id: &str,
    ) -> ProviderResult<AudioFeatures> {
        Ok(AudioFeatures {
            track_id: track_id.to_string(),
            tempo: 220.0,
            key: 9,
            mode: 0,
            time_signature: 4,
            energy: 0.7,
            danceability: 0.6,
        })
    }
}

/// Recognizes everything as the same song
pub struct FakeRecognizer;

#[async_trait]
impl Recognizer for FakeRecognizer {
    async fn recognize(
        &self,
        _audio: Bytes,
        _filename: &str,
    ) -> ProviderResult<Option<RecognitionMatch>> {
        Ok(Some(RecognitionMatch {
            title: "Minor Swing".to_string(),
            artist: "Django Reinhardt".to_string(),
            album: None,
            release_date: Some("1937".to_string()),
            timecode: Some("00:12".to_string()),
            song_link: None,
            spotify_id: None,
        }))
    }
}

pub struct FakeTabSource {
    name: &'static str,
    titles: Option<Vec<String>>,
}

impl FakeTabSource {
    pub fn ok(name: &'static str, titles: &[&str]) -> Self {
        Self {
            name,
            titles: Some(titles.iter().map(|t| t.to_string()).collect()),
        }
    }

    pub fn failing(name: &'static str) -> Self {
        Self { name, titles: None }
    }
}

#[async_trait]
impl TabSource for FakeTabSource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn search(&self, _query: &str) -> ProviderResult<Vec<TabResult>> {
        let titles = self
            .titles
            .as_ref()
            .ok_or_else(|| ProviderError::Request("connection refused".to_string()))?;

        Ok(titles
            .iter()
            .map(|title| TabResult {
                source: self.name.to_string(),
                title: title.clone(),
                artist: None,
                url: format!("https://{}.example/{}", self.name, title.replace(' ', "-")),
                has_chords: None,
            })
            .collect())
    }
}

/// Records deliveries, endpoints can be marked as expired or failing
#[derive(Default)]
pub struct FakePushSender {
    expired: Mutex<HashSet<String>>,
    failing: Mutex<HashSet<String>>,
    sent: Mutex<Vec<(String, PushPayload)>>,
}

impl FakePushSender {
    pub fn expire(&self, endpoint: &str) {
        self.expired.lock().insert(endpoint.to_string());
    }

    pub fn fail(&self, endpoint: &str) {
        self.failing.lock().insert(endpoint.to_string());
    }

    /// Every message that reached the push service, with its endpoint
    pub fn sent(&self) -> Vec<(String, PushPayload)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl PushSender for FakePushSender {
    fn public_key(&self) -> &str {
        "test-public-key"
    }

    async fn send(&self, target: &PushTarget, payload: &PushPayload) -> ProviderResult<PushOutcome> {
        if self.failing.lock().contains(&target.endpoint) {
            return Err(ProviderError::Status {
                code: 500,
                message: "push service down".to_string(),
            });
        }

        self.sent
            .lock()
            .push((target.endpoint.clone(), payload.clone()));

        if self.expired.lock().contains(&target.endpoint) {
            Ok(PushOutcome::Expired)
        } else {
            Ok(PushOutcome::Delivered)
        }
    }
}

#[derive(Default)]
pub struct FakeStorage {
    objects: Mutex<HashMap<String, Bytes>>,
}

impl FakeStorage {
    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().contains_key(key)
    }
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn upload(&self, key: &str, data: Bytes, _content_type: &str) -> ProviderResult<String> {
        self.objects.lock().insert(key.to_string(), data);
        Ok(format!("https://media.example/{key}"))
    }

    async fn delete(&self, key: &str) -> ProviderResult<()> {
        self.objects.lock().remove(key);
        Ok(())
    }
}
