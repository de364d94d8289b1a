//! Cartflow configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `CARTFLOW_API_URL` - REST API base URL (default: <http://localhost:8000/api/v1>)
//! - `CARTFLOW_API_TOKEN` - Bearer token for authenticated endpoints
//! - `CARTFLOW_REQUEST_TIMEOUT_SECS` - Per-request timeout (default: 10)
//! - `CARTFLOW_STORAGE_DIR` - Directory the cart is persisted in (default: .cartflow)
//! - `CARTFLOW_FREE_SHIPPING_THRESHOLD` - Subtotal above which shipping is free (default: 50000)
//! - `CARTFLOW_FLAT_SHIPPING_FEE` - Shipping fee below the threshold (default: 5000)
//! - `CARTFLOW_DEFAULT_COUNTRY` - Country for new shipping details (default: Argentina)
//! - `CARTFLOW_PHONE_PREFIX` - Required phone prefix after a leading `+` (default: +54)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use cartflow_core::ShippingPolicy;

use crate::checkout::CheckoutSettings;

const DEFAULT_API_URL: &str = "http://localhost:8000/api/v1";
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.0;

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
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Cartflow configuration.
#[derive(Debug, Clone)]
pub struct CartflowConfig {
    /// REST API connection settings
    pub api: ApiConfig,
    /// Directory holding the persisted cart
    pub storage_dir: PathBuf,
    /// Shipping fee rules
    pub shipping: ShippingPolicy,
    /// Country applied to fresh shipping details
    pub default_country: String,
    /// Phone prefix enforced after a leading `+`
    pub phone_prefix: String,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// REST API connection settings.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct ApiConfig {
    /// Base URL, always ending in `/`
    pub base_url: Url,
    /// Bearer token
    pub token: Option<SecretString>,
    /// Per-request timeout, also used for order submission
    pub timeout: Duration,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url.as_str())
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl CartflowConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an invalid value or the
    /// API token looks like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// See [`Self::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(lookup);

        let api = ApiConfig {
            base_url: parse_base_url(
                "CARTFLOW_API_URL",
                &env.get_or_default("CARTFLOW_API_URL", DEFAULT_API_URL),
            )?,
            token: env.get_validated_secret("CARTFLOW_API_TOKEN")?,
            timeout: Duration::from_secs(env.parse_or("CARTFLOW_REQUEST_TIMEOUT_SECS", 10_u64)?),
        };
        if api.timeout.is_zero() {
            return Err(ConfigError::InvalidEnvVar(
                "CARTFLOW_REQUEST_TIMEOUT_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let defaults = ShippingPolicy::default();
        let shipping = ShippingPolicy {
            free_shipping_threshold: env
                .parse_money("CARTFLOW_FREE_SHIPPING_THRESHOLD", defaults.free_shipping_threshold)?,
            flat_fee: env.parse_money("CARTFLOW_FLAT_SHIPPING_FEE", defaults.flat_fee)?,
        };

        Ok(Self {
            api,
            storage_dir: PathBuf::from(env.get_or_default("CARTFLOW_STORAGE_DIR", ".cartflow")),
            shipping,
            default_country: env.get_or_default("CARTFLOW_DEFAULT_COUNTRY", "Argentina"),
            phone_prefix: env.get_or_default("CARTFLOW_PHONE_PREFIX", "+54"),
            sentry_dsn: env.get_optional("SENTRY_DSN"),
        })
    }

    /// Settings for a new checkout.
    #[must_use]
    pub fn checkout_settings(&self) -> CheckoutSettings {
        CheckoutSettings {
            shipping: self.shipping,
            submit_timeout: self.api.timeout,
            default_country: self.default_country.clone(),
            phone_prefix: self.phone_prefix.clone(),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    /// Get an optional variable; blank values count as unset.
    fn get_optional(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Get a variable with a default value.
    fn get_or_default(&self, key: &str, default: &str) -> String {
        self.get_optional(key)
            .unwrap_or_else(|| default.to_string())
    }

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get_optional(key).map_or(Ok(default), |raw| {
            raw.parse::<T>()
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
    }

    /// Parse a non-negative amount.
    fn parse_money(&self, key: &str, default: Decimal) -> Result<Decimal, ConfigError> {
        let value = self.parse_or(key, default)?;
        if value.is_sign_negative() {
            return Err(ConfigError::InvalidEnvVar(
                key.to_string(),
                "must not be negative".to_string(),
            ));
        }
        Ok(value)
    }

    /// Load and validate an optional secret.
    fn get_validated_secret(&self, key: &str) -> Result<Option<SecretString>, ConfigError> {
        self.get_optional(key)
            .map(|value| {
                validate_secret_strength(&value, key)?;
                Ok(SecretString::from(value))
            })
            .transpose()
    }
}

/// Parse the API base URL, ensuring a trailing `/` so relative paths join
/// under it instead of replacing the last segment.
fn parse_base_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let mut url =
        Url::parse(raw).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
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
    let len = s.chars().count() as f64;
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
