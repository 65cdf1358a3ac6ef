//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STOREFRONT_CATALOG_PATH` - Catalog document (default: crates/storefront/content/catalog.json)
//! - `STORE_NAME` - Store name used in messages (default: LUXE)
//! - `STORE_CURRENCY` - ISO currency code (default: USD)
//! - `STORE_WHATSAPP_NUMBER` - Messaging account for operator checkout
//! - `CART_STORAGE_KEY` - Cart snapshot key (default: luxe-cart)
//! - `CART_STORAGE_DIR` - Directory for file-backed cart snapshots
//! - `CHECKOUT_ENDPOINT` - Session-creation endpoint (default: `{base}/api/checkout`)
//! - `STRIPE_SECRET_KEY` - Enables hosted card checkout
//! - `STRIPE_ALLOWED_COUNTRIES` - Shipping countries (default: US,CA,GB,IT,FR,DE)
//! - `GEMINI_API_KEY` - Enables virtual try-on
//! - `TRYON_MODEL` - Image model (default: gemini-2.5-flash-image)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use luxe_core::CurrencyCode;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::checkout::MessagingTarget;
use crate::session::StoreProfile;
use crate::tryon::DEFAULT_TRYON_MODEL;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

const DEFAULT_CATALOG_PATH: &str = "crates/storefront/content/catalog.json";
const DEFAULT_ALLOWED_COUNTRIES: &str = "US,CA,GB,IT,FR,DE";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "insert",
    "put-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: Url,
    /// Catalog document location
    pub catalog_path: PathBuf,
    pub store: StoreConfig,
    pub cart: CartConfig,
    /// Where the session posts hosted checkout requests
    pub checkout_endpoint: Url,
    /// Hosted card checkout; disabled when absent
    pub stripe: Option<StripeConfig>,
    /// Virtual try-on; disabled when absent
    pub tryon: Option<TryOnConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
}

/// Store identity.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub name: String,
    pub currency: CurrencyCode,
    pub whatsapp_number: Option<String>,
}

/// Cart persistence settings.
#[derive(Debug, Clone)]
pub struct CartConfig {
    pub storage_key: String,
    /// File-backed snapshots when set, in-memory otherwise
    pub storage_dir: Option<PathBuf>,
}

/// Stripe Checkout configuration.
///
/// Implements `Debug` manually to redact the secret key.
#[derive(Clone)]
pub struct StripeConfig {
    pub secret_key: SecretString,
    pub allowed_countries: Vec<String>,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[REDACTED]")
            .field("allowed_countries", &self.allowed_countries)
            .finish()
    }
}

/// Image synthesis configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct TryOnConfig {
    pub api_key: SecretString,
    pub model: String,
}

impl std::fmt::Debug for TryOnConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TryOnConfig")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_vars(&Env(|key: &str| std::env::var(key).ok()))
    }

    fn from_vars(env: &Env<impl Fn(&str) -> Option<String>>) -> Result<Self, ConfigError> {
        let host = env
            .or_default("STOREFRONT_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("STOREFRONT_HOST".to_string(), e.to_string()))?;
        let port = env
            .or_default("STOREFRONT_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("STOREFRONT_PORT".to_string(), e.to_string()))?;
        let base_url =
            parse_base_url("STOREFRONT_BASE_URL", &env.required("STOREFRONT_BASE_URL")?)?;
        let catalog_path = PathBuf::from(env.or_default("STOREFRONT_CATALOG_PATH", DEFAULT_CATALOG_PATH));

        let checkout_endpoint = match env.optional("CHECKOUT_ENDPOINT") {
            Some(endpoint) => parse_url("CHECKOUT_ENDPOINT", &endpoint)?,
            None => base_url.join("api/checkout").map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_BASE_URL".to_string(), e.to_string())
            })?,
        };

        Ok(Self {
            host,
            port,
            base_url,
            catalog_path,
            store: StoreConfig::from_vars(env)?,
            cart: CartConfig {
                storage_key: env.or_default("CART_STORAGE_KEY", "luxe-cart"),
                storage_dir: env.optional("CART_STORAGE_DIR").map(PathBuf::from),
            },
            checkout_endpoint,
            stripe: StripeConfig::from_vars(env)?,
            tryon: TryOnConfig::from_vars(env)?,
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Store identity for customer-facing text.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if the messaging number has no digits.
    pub fn store_profile(&self) -> Result<StoreProfile, ConfigError> {
        let messaging = self
            .store
            .whatsapp_number
            .as_deref()
            .map(MessagingTarget::new)
            .transpose()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STORE_WHATSAPP_NUMBER".to_string(), e.to_string())
            })?;
        Ok(StoreProfile {
            name: self.store.name.clone(),
            currency: self.store.currency,
            messaging,
        })
    }
}

impl StoreConfig {
    fn from_vars(env: &Env<impl Fn(&str) -> Option<String>>) -> Result<Self, ConfigError> {
        let currency = env
            .or_default("STORE_CURRENCY", "USD")
            .parse::<CurrencyCode>()
            .map_err(|e| ConfigError::InvalidEnvVar("STORE_CURRENCY".to_string(), e.to_string()))?;
        Ok(Self {
            name: env.or_default("STORE_NAME", "LUXE"),
            currency,
            whatsapp_number: env.optional("STORE_WHATSAPP_NUMBER"),
        })
    }
}

impl StripeConfig {
    fn from_vars(env: &Env<impl Fn(&str) -> Option<String>>) -> Result<Option<Self>, ConfigError> {
        let Some(secret_key) = env.optional_secret("STRIPE_SECRET_KEY")? else {
            return Ok(None);
        };
        let allowed_countries = env
            .or_default("STRIPE_ALLOWED_COUNTRIES", DEFAULT_ALLOWED_COUNTRIES)
            .split(',')
            .map(|c| c.trim().to_ascii_uppercase())
            .filter(|c| !c.is_empty())
            .collect();
        Ok(Some(Self {
            secret_key,
            allowed_countries,
        }))
    }
}

impl TryOnConfig {
    fn from_vars(env: &Env<impl Fn(&str) -> Option<String>>) -> Result<Option<Self>, ConfigError> {
        Ok(env.optional_secret("GEMINI_API_KEY")?.map(|api_key| Self {
            api_key,
            model: env.or_default("TRYON_MODEL", DEFAULT_TRYON_MODEL),
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Variable lookup; the process environment outside tests.
struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    /// Get an optional variable, treating empty values as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    /// Load and validate an optional secret.
    fn optional_secret(&self, key: &str) -> Result<Option<SecretString>, ConfigError> {
        self.optional(key)
            .map(|value| {
                validate_secret_strength(&value, key)?;
                Ok(SecretString::from(value))
            })
            .transpose()
    }
}

fn parse_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse a base URL, ending its path with `/` so `Url::join` appends to it.
fn parse_base_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    if value.ends_with('/') {
        parse_url(key, value)
    } else {
        parse_url(key, &format!("{value}/"))
    }
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"
            ),
        ));
    }

    Ok(())
}
