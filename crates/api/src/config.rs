//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CERTPREP_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `CERTPREP_APP_URL` - Origin of the SPA (CORS and Stripe return URLs)
//! - `CERTPREP_GATEWAY_TOKEN` - Shared secret the API gateway sends with identity headers
//! - `STRIPE_SECRET_KEY` - Stripe secret API key
//! - `STRIPE_WEBHOOK_SECRET` - Stripe webhook endpoint signing secret
//! - `STRIPE_SUBSCRIPTION_PRICE` - Price ID of the all-access subscription
//!
//! ## Optional
//! - `CERTPREP_HOST` - Bind address (default: 127.0.0.1)
//! - `CERTPREP_PORT` - Listen port (default: 3000)
//! - `CERTPREP_ADMIN_GROUP` - Identity group granting admin access (default: admin)
//! - `CERTPREP_FREE_QUIZ_COUNT` - Quizzes per certification readable without purchase (default: 1)
//! - `CERTPREP_PASS_THRESHOLD` - Passing score percentage, 1-100 (default: 72)
//! - `CERTPREP_WEBHOOK_LEDGER_TTL_DAYS` - Days a processed webhook id is remembered (default: 30)
//! - `CERTPREP_LOG_FORMAT` - `json` for JSON log lines (default: human readable)
//! - `STRIPE_CERTIFICATION_PRICES` - One-time prices, `saa-c03=price_123,dva-c02=price_456`
//! - `STRIPE_API_BASE` - Stripe API base URL (default: <https://api.stripe.com/v1>)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::{BTreeMap, HashMap};
use std::net::{IpAddr, SocketAddr};

use certprep_core::CertificationId;
use secrecy::SecretString;
use thiserror::Error;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "password",
    "xxx",
    "todo",
    "fixme",
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

/// API application configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    pub host: IpAddr,
    pub port: u16,
    /// SPA origin, without trailing slash
    pub app_url: String,
    /// Shared secret proving identity headers came from the gateway
    pub gateway_token: SecretString,
    pub admin_group: String,
    pub quiz: QuizConfig,
    pub stripe: StripeConfig,
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
    pub json_logs: bool,
}

/// Quiz access and grading settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizConfig {
    pub free_quiz_count: i32,
    pub pass_threshold: u8,
    pub webhook_ledger_ttl_days: i64,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            free_quiz_count: 1,
            pass_threshold: 72,
            webhook_ledger_ttl_days: 30,
        }
    }
}

/// Stripe configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct StripeConfig {
    pub api_base: String,
    pub secret_key: SecretString,
    pub webhook_secret: SecretString,
    pub subscription_price: String,
    /// One-time price per certification
    pub certification_prices: HashMap<CertificationId, String>,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Sorted for stable output
        let prices: BTreeMap<&str, &str> = self
            .certification_prices
            .iter()
            .map(|(cert, price)| (cert.as_str(), price.as_str()))
            .collect();

        f.debug_struct("StripeConfig")
            .field("api_base", &self.api_base)
            .field("secret_key", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .field("subscription_price", &self.subscription_price)
            .field("certification_prices", &prices)
            .finish()
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("CERTPREP_DATABASE_URL")?;
        let host = parse_env_or_default::<IpAddr>("CERTPREP_HOST", "127.0.0.1")?;
        let port = parse_env_or_default::<u16>("CERTPREP_PORT", "3000")?;
        let app_url = parse_app_url(&get_required_env("CERTPREP_APP_URL")?)?;
        let gateway_token = get_validated_secret("CERTPREP_GATEWAY_TOKEN")?;
        let admin_group = get_env_or_default("CERTPREP_ADMIN_GROUP", "admin");

        let quiz = QuizConfig::from_env()?;
        let stripe = StripeConfig::from_env()?;

        let json_logs = get_optional_env("CERTPREP_LOG_FORMAT")
            .is_some_and(|format| format.eq_ignore_ascii_case("json"));

        Ok(Self {
            database_url,
            host,
            port,
            app_url,
            gateway_token,
            admin_group,
            quiz,
            stripe,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            json_logs,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl QuizConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let free_quiz_count = parse_env_or_default::<i32>("CERTPREP_FREE_QUIZ_COUNT", "1")?;
        if free_quiz_count < 0 {
            return Err(ConfigError::InvalidEnvVar(
                "CERTPREP_FREE_QUIZ_COUNT".to_string(),
                "must not be negative".to_string(),
            ));
        }

        let pass_threshold = parse_env_or_default::<u8>("CERTPREP_PASS_THRESHOLD", "72")?;
        if !(1..=100).contains(&pass_threshold) {
            return Err(ConfigError::InvalidEnvVar(
                "CERTPREP_PASS_THRESHOLD".to_string(),
                "must be between 1 and 100".to_string(),
            ));
        }

        let webhook_ledger_ttl_days =
            parse_env_or_default::<i64>("CERTPREP_WEBHOOK_LEDGER_TTL_DAYS", "30")?;
        if webhook_ledger_ttl_days < 1 {
            return Err(ConfigError::InvalidEnvVar(
                "CERTPREP_WEBHOOK_LEDGER_TTL_DAYS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            free_quiz_count,
            pass_threshold,
            webhook_ledger_ttl_days,
        })
    }
}

impl StripeConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let certification_prices = match get_optional_env("STRIPE_CERTIFICATION_PRICES") {
            Some(raw) => parse_price_map(&raw)
                .map_err(|e| ConfigError::InvalidEnvVar("STRIPE_CERTIFICATION_PRICES".into(), e))?,
            None => HashMap::new(),
        };

        Ok(Self {
            api_base: get_env_or_default("STRIPE_API_BASE", DEFAULT_STRIPE_API_BASE)
                .trim_end_matches('/')
                .to_string(),
            secret_key: get_validated_secret("STRIPE_SECRET_KEY")?,
            webhook_secret: get_validated_secret("STRIPE_WEBHOOK_SECRET")?,
            subscription_price: get_required_env("STRIPE_SUBSCRIPTION_PRICE")?,
            certification_prices,
        })
    }

    /// One-time price for a certification, if it is sold individually.
    #[must_use]
    pub fn certification_price(&self, certification: &CertificationId) -> Option<&str> {
        self.certification_prices
            .get(certification)
            .map(String::as_str)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

fn parse_env_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Validate the SPA origin and strip any trailing slash.
fn parse_app_url(raw: &str) -> Result<String, ConfigError> {
    let url = url::Url::parse(raw)
        .map_err(|e| ConfigError::InvalidEnvVar("CERTPREP_APP_URL".to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ConfigError::InvalidEnvVar(
            "CERTPREP_APP_URL".to_string(),
            "must be an http(s) URL with a host".to_string(),
        ));
    }
    Ok(raw.trim_end_matches('/').to_string())
}

/// Parse `cert=price,cert=price` into a map.
fn parse_price_map(raw: &str) -> Result<HashMap<CertificationId, String>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (cert, price) = entry
                .split_once('=')
                .ok_or_else(|| format!("expected cert=price, got '{entry}'"))?;
            let cert = CertificationId::parse(cert).map_err(|e| format!("{entry}: {e}"))?;
            let price = price.trim();
            if price.is_empty() {
                return Err(format!("missing price for {cert}"));
            }
            Ok((cert, price.to_string()))
        })
        .collect()
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
            #[allow(clippy::cast_precision_loss)]
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
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    /// A config suitable for tests that never reach external services.
    pub(crate) fn test_config() -> ApiConfig {
        let mut certification_prices = HashMap::new();
        certification_prices.insert(
            CertificationId::parse("saa-c03").unwrap(),
            "price_saa".to_string(),
        );

        ApiConfig {
            database_url: SecretString::from("postgres://localhost/certprep_test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            app_url: "http://localhost:5173".to_string(),
            gateway_token: SecretString::from("gw_9fQ2xL7mZ4pR8vK1"),
            admin_group: "admin".to_string(),
            quiz: QuizConfig::default(),
            stripe: StripeConfig {
                api_base: "http://127.0.0.1:9".to_string(),
                secret_key: SecretString::from("sk_test_4eC39HqLyjWDarjtT1zdp7dc"),
                webhook_secret: SecretString::from("whsec_t3stS1gn1ngK3y"),
                subscription_price: "price_sub".to_string(),
                certification_prices,
            },
            sentry_dsn: None,
            sentry_environment: None,
            json_logs: false,
        }
    }

    #[test]
    fn test_shannon_entropy() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.01);
        assert!(shannon_entropy("sk_live_51Hx9QmK2vR7pL4t") > 3.3);
    }

    #[test]
    fn test_validate_secret_strength() {
        assert!(matches!(
            validate_secret_strength("your-stripe-key", "TEST_VAR"),
            Err(ConfigError::InsecureSecret(_, _))
        ));
        assert!(validate_secret_strength("changeme123", "TEST_VAR").is_err());
        assert!(validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR").is_err());
        assert!(validate_secret_strength("whsec_aB3xY9mK2nL5pQ7rT0uW4zC6", "TEST_VAR").is_ok());
    }

    #[test]
    fn test_parse_price_map() {
        let map = parse_price_map(" SAA-C03=price_1 , dva-c02=price_2,").unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(
            map.get(&CertificationId::parse("saa-c03").unwrap()).unwrap(),
            "price_1"
        );

        assert!(parse_price_map("saa-c03").is_err());
        assert!(parse_price_map("saa-c03=").is_err());
        assert!(parse_price_map("bad_id=price_1").is_err());
    }

    #[test]
    fn test_parse_app_url() {
        assert_eq!(
            parse_app_url("https://app.certprep.dev/").unwrap(),
            "https://app.certprep.dev"
        );
        assert!(parse_app_url("not a url").is_err());
        assert!(parse_app_url("ftp://files.certprep.dev").is_err());
    }

    #[test]
    fn test_socket_addr() {
        let addr = test_config().socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn test_stripe_config_debug_redacts_secrets() {
        let debug_output = format!("{:?}", test_config().stripe);

        assert!(debug_output.contains("price_sub"));
        assert!(debug_output.contains("saa-c03"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("sk_test_4eC39HqLyjWDarjtT1zdp7dc"));
        assert!(!debug_output.contains("whsec_t3stS1gn1ngK3y"));
    }

    #[test]
    fn test_certification_price_lookup() {
        let config = test_config();
        let saa = CertificationId::parse("saa-c03").unwrap();
        let dva = CertificationId::parse("dva-c02").unwrap();
        assert_eq!(config.stripe.certification_price(&saa), Some("price_saa"));
        assert_eq!(config.stripe.certification_price(&dva), None);
    }
}
