use std::{env, str::FromStr};

use thiserror::Error;

use crate::Plan;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable {0}")]
    Missing(&'static str),
    #[error("Environment variable {name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// The configuration of a fretboard instance
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub stripe: StripeConfig,
    pub spotify: SpotifyConfig,
    pub audd: AuddConfig,
    pub vapid: VapidConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// The address clients reach the app on, used for redirects
    pub public_url: String,
    pub max_upload_bytes: usize,
    /// Marks cookies as `Secure`, should be on behind https
    pub secure_cookies: bool,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Default)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    pub price_pro: String,
    pub price_band: String,
}

#[derive(Debug, Clone, Default)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

#[derive(Debug, Clone, Default)]
pub struct AuddConfig {
    pub api_token: String,
}

#[derive(Debug, Clone, Default)]
pub struct VapidConfig {
    pub public_key: String,
    /// Base64 (url-safe) encoded private key
    pub private_key: String,
    /// Contact of the sender, usually a mailto: link
    pub subject: String,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Where uploaded media is written
    pub directory: String,
    /// The base of the public URLs handed out for uploads
    pub public_base_url: String,
}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads the configuration through any variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);
        let defaults = Self::default();

        let port = vars.parsed("FRETBOARD_PORT")?.unwrap_or(defaults.server.port);
        let public_url = vars
            .string("FRETBOARD_PUBLIC_URL")
            .unwrap_or_else(|| format!("http://localhost:{port}"));

        let max_upload_bytes = vars
            .parsed::<usize>("FRETBOARD_MAX_UPLOAD_MB")?
            .map(|mb| mb * 1024 * 1024)
            .unwrap_or(defaults.server.max_upload_bytes);

        let server = ServerConfig {
            port,
            public_url: public_url.trim_end_matches('/').to_string(),
            max_upload_bytes,
            secure_cookies: vars
                .parsed("FRETBOARD_SECURE_COOKIES")?
                .unwrap_or(defaults.server.secure_cookies),
        };

        let database = DatabaseConfig {
            url: vars
                .string("DATABASE_URL")
                .ok_or(ConfigError::Missing("DATABASE_URL"))?,
            max_connections: vars
                .parsed("DATABASE_MAX_CONNECTIONS")?
                .unwrap_or(defaults.database.max_connections),
        };

        let stripe = StripeConfig {
            secret_key: vars.string_or_empty("STRIPE_SECRET_KEY"),
            webhook_secret: vars.string_or_empty("STRIPE_WEBHOOK_SECRET"),
            price_pro: vars.string_or_empty("STRIPE_PRICE_PRO"),
            price_band: vars.string_or_empty("STRIPE_PRICE_BAND"),
        };

        let spotify = SpotifyConfig {
            client_id: vars.string_or_empty("SPOTIFY_CLIENT_ID"),
            client_secret: vars.string_or_empty("SPOTIFY_CLIENT_SECRET"),
            redirect_uri: vars
                .string("SPOTIFY_REDIRECT_URI")
                .unwrap_or_else(|| format!("{}/v1/spotify/callback", server.public_url)),
        };

        let audd = AuddConfig {
            api_token: vars.string_or_empty("AUDD_API_TOKEN"),
        };

        let vapid = VapidConfig {
            public_key: vars.string_or_empty("VAPID_PUBLIC_KEY"),
            private_key: vars.string_or_empty("VAPID_PRIVATE_KEY"),
            subject: vars
                .string("VAPID_SUBJECT")
                .unwrap_or_else(|| "mailto:admin@localhost".to_string()),
        };

        let storage = StorageConfig {
            directory: vars
                .string("FRETBOARD_STORAGE_DIR")
                .unwrap_or(defaults.storage.directory),
            public_base_url: format!("{}/media", server.public_url),
        };

        Ok(Self {
            server,
            database,
            stripe,
            spotify,
            audd,
            vapid,
            storage,
        })
    }

    /// Names of the integrations that are missing credentials
    pub fn unconfigured_integrations(&self) -> Vec<&'static str> {
        let mut missing = vec![];

        if self.stripe.secret_key.is_empty() {
            missing.push("stripe");
        }
        if self.spotify.client_id.is_empty() || self.spotify.client_secret.is_empty() {
            missing.push("spotify");
        }
        if self.audd.api_token.is_empty() {
            missing.push("audd");
        }
        if self.vapid.public_key.is_empty() || self.vapid.private_key.is_empty() {
            missing.push("web push");
        }

        missing
    }
}

impl StripeConfig {
    /// The price a paid plan is billed with
    pub fn price_for(&self, plan: Plan) -> Option<&str> {
        let price = match plan {
            Plan::Free => return None,
            Plan::Pro => &self.price_pro,
            Plan::Band => &self.price_band,
        };

        Some(price.as_str()).filter(|p| !p.is_empty())
    }

    /// The plan a price belongs to
    pub fn plan_for_price(&self, price_id: &str) -> Option<Plan> {
        Plan::ALL
            .into_iter()
            .find(|plan| self.price_for(*plan) == Some(price_id))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 9050,
            public_url: "http://localhost:9050".to_string(),
            // Covers are short video clips, 100MB fits most of them
            max_upload_bytes: 100 * 1024 * 1024,
            secure_cookies: false,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 5,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: "./media".to_string(),
            public_base_url: "http://localhost:9050/media".to_string(),
        }
    }
}

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &'static str) -> Option<String> {
        (self.0)(name).filter(|v| !v.trim().is_empty())
    }

    fn string_or_empty(&self, name: &'static str) -> String {
        self.string(name).unwrap_or_default()
    }

    fn parsed<T>(&self, name: &'static str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: ToString,
    {
        self.string(name)
            .map(|v| {
                v.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
                    name,
                    reason: e.to_string(),
                })
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        move |name| map.get(name).cloned()
    }

    #[test]
    fn requires_database_url() {
        let result = Config::from_lookup(lookup(&[]));
        assert!(matches!(result, Err(ConfigError::Missing("DATABASE_URL"))));
    }

    #[test]
    fn fills_in_defaults() {
        let config = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://x")])).unwrap();

        assert_eq!(config.server.port, 9050);
        assert_eq!(config.server.public_url, "http://localhost:9050");
        assert_eq!(
            config.spotify.redirect_uri,
            "http://localhost:9050/v1/spotify/callback"
        );
        assert_eq!(config.storage.public_base_url, "http://localhost:9050/media");
        assert!(config.unconfigured_integrations().contains(&"stripe"));
    }

    #[test]
    fn rejects_invalid_numbers() {
        let result = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://x"),
            ("FRETBOARD_PORT", "eighty"),
        ]));

        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                name: "FRETBOARD_PORT",
                ..
            })
        ));
    }

    #[test]
    fn maps_prices_to_plans() {
        let stripe = StripeConfig {
            price_pro: "price_pro".to_string(),
            price_band: "price_band".to_string(),
            ..Default::default()
        };

        assert_eq!(stripe.price_for(Plan::Free), None);
        assert_eq!(stripe.price_for(Plan::Band), Some("price_band"));
        assert_eq!(stripe.plan_for_price("price_pro"), Some(Plan::Pro));
        assert_eq!(stripe.plan_for_price("price_other"), None);
    }
}
