//! Dashboard configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DEMO_USER_PASSWORD` - Password for the demo operator account
//!
//! ## Optional
//! - `DASHBOARD_HOST` - Bind address (default: 127.0.0.1)
//! - `DASHBOARD_PORT` - Listen port (default: 3000)
//! - `DASHBOARD_BASE_URL` - Public URL of the dashboard (default: <http://localhost:3000>)
//! - `DASHBOARD_LISTING_CACHE_TTL_SECS` - Customer listing cache TTL (default: 300)
//! - `CELCOIN_BASE_URL` - Provider API base (default: <https://api.sandbox.cel.cash/v2>)
//! - `CELCOIN_CLIENT_ID` / `CELCOIN_CLIENT_SECRET` - Provider credentials, set together
//! - `CELCOIN_TIMEOUT_SECS` - Timeout for every provider request (default: 30)
//! - `VIACEP_BASE_URL` - Postal-code lookup base (default: <https://viacep.com.br/ws>)
//! - `DEMO_USER_EMAIL` - Demo operator login (default: asoec)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` / `SENTRY_TRACES_SAMPLE_RATE` - Sentry sampling (default: 1.0)
//!
//! Without Celcoin credentials the dashboard still starts, but every data
//! route answers "cannot connect".

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const DEFAULT_CELCOIN_BASE_URL: &str = "https://api.sandbox.cel.cash/v2";
const DEFAULT_VIACEP_BASE_URL: &str = "https://viacep.com.br/ws";
const DEFAULT_DEMO_USER_EMAIL: &str = "asoec";
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
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

/// Dashboard application configuration.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL (decides whether session cookies are `Secure`)
    pub base_url: String,
    /// How long a customer listing stays cached
    pub listing_cache_ttl: Duration,
    /// Celcoin provider configuration
    pub celcoin: CelcoinConfig,
    /// `ViaCEP` base URL
    pub viacep_base_url: Url,
    /// Demo operator credentials
    pub demo_user: DemoUserConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
    pub sentry_sample_rate: f32,
    pub sentry_traces_sample_rate: f32,
}

/// Celcoin provider configuration.
#[derive(Debug, Clone)]
pub struct CelcoinConfig {
    /// API base, e.g. `https://api.sandbox.cel.cash/v2`
    pub base_url: Url,
    /// OAuth client credentials; `None` when not configured
    pub credentials: Option<CelcoinCredentials>,
    /// Timeout applied to every provider request
    pub timeout: Duration,
}

/// Celcoin OAuth client credentials.
///
/// Implements `Debug` manually to redact the secret.
#[derive(Clone)]
pub struct CelcoinCredentials {
    pub client_id: String,
    pub client_secret: SecretString,
}

impl std::fmt::Debug for CelcoinCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CelcoinCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Demo operator account.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct DemoUserConfig {
    pub email: String,
    pub password: SecretString,
}

impl std::fmt::Debug for DemoUserConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DemoUserConfig")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl DashboardConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("DASHBOARD_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("DASHBOARD_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("DASHBOARD_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("DASHBOARD_PORT".to_string(), e.to_string()))?;
        let base_url = get_env_or_default("DASHBOARD_BASE_URL", "http://localhost:3000");
        let listing_cache_ttl = get_seconds("DASHBOARD_LISTING_CACHE_TTL_SECS", 300)?;

        let celcoin = CelcoinConfig::from_env()?;
        let viacep_base_url = get_url("VIACEP_BASE_URL", DEFAULT_VIACEP_BASE_URL)?;
        let demo_user = DemoUserConfig::from_env()?;

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);

        Ok(Self {
            host,
            port,
            base_url,
            listing_cache_ttl,
            celcoin,
            viacep_base_url,
            demo_user,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Problems worth a startup warning that do not stop the server.
    ///
    /// Sandbox client secrets are sometimes short, so a weak secret is
    /// reported here rather than refused by [`Self::from_env`].
    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        match &self.celcoin.credentials {
            None => vec![
                "Celcoin credentials not configured, data routes will answer 503".to_string(),
            ],
            Some(credentials) => validate_secret_strength(
                credentials.client_secret.expose_secret(),
                "CELCOIN_CLIENT_SECRET",
            )
            .err()
            .map(|e| e.to_string())
            .into_iter()
            .collect(),
        }
    }

    /// Whether the dashboard is served over HTTPS.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl CelcoinConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: get_url("CELCOIN_BASE_URL", DEFAULT_CELCOIN_BASE_URL)?,
            credentials: CelcoinCredentials::from_env()?,
            timeout: get_seconds("CELCOIN_TIMEOUT_SECS", 30)?,
        })
    }
}

impl CelcoinCredentials {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let client_id = get_optional_env("CELCOIN_CLIENT_ID");
        let client_secret = get_optional_env("CELCOIN_CLIENT_SECRET");

        match (client_id, client_secret) {
            (Some(client_id), Some(client_secret)) => Ok(Some(Self {
                client_id,
                client_secret: SecretString::from(client_secret),
            })),
            (None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "CELCOIN_CLIENT_*".to_string(),
                "Both CELCOIN_CLIENT_ID and CELCOIN_CLIENT_SECRET must be set together"
                    .to_string(),
            )),
        }
    }
}

impl DemoUserConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            email: get_env_or_default("DEMO_USER_EMAIL", DEFAULT_DEMO_USER_EMAIL),
            password: get_required_secret("DEMO_USER_PASSWORD")?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get a duration expressed in whole seconds.
fn get_seconds(key: &str, default: u64) -> Result<Duration, ConfigError> {
    get_optional_env(key).map_or(Ok(Duration::from_secs(default)), |raw| {
        parse_seconds(key, &raw)
    })
}

fn parse_seconds(key: &str, raw: &str) -> Result<Duration, ConfigError> {
    let secs = raw
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if secs == 0 {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be greater than zero".to_string(),
        ));
    }
    Ok(Duration::from_secs(secs))
}

/// Get an HTTP(S) URL, falling back to a default.
fn get_url(key: &str, default: &str) -> Result<Url, ConfigError> {
    parse_http_url(key, &get_env_or_default(key, default))
}

fn parse_http_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let url =
        Url::parse(raw).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
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

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config() -> DashboardConfig {
        DashboardConfig {
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            listing_cache_ttl: Duration::from_secs(300),
            celcoin: CelcoinConfig {
                base_url: Url::parse(DEFAULT_CELCOIN_BASE_URL).unwrap(),
                credentials: Some(CelcoinCredentials {
                    client_id: "client_id_value".to_string(),
                    client_secret: SecretString::from("super_secret_client_secret"),
                }),
                timeout: Duration::from_secs(30),
            },
            viacep_base_url: Url::parse(DEFAULT_VIACEP_BASE_URL).unwrap(),
            demo_user: DemoUserConfig {
                email: "asoec".to_string(),
                password: SecretString::from("demo_password_value"),
            },
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 1.0,
        }
    }

    #[test]
    fn test_shannon_entropy() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.01);
        assert!(shannon_entropy("aB3$xY9!mK2@nL5#") > 3.3);
    }

    #[test]
    fn test_validate_secret_strength() {
        assert!(matches!(
            validate_secret_strength("your-client-secret", "TEST_VAR"),
            Err(ConfigError::InsecureSecret(_, _))
        ));
        assert!(validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR").is_err());
        assert!(validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR").is_ok());
    }

    #[test]
    fn test_parse_seconds() {
        assert_eq!(parse_seconds("K", "45").unwrap(), Duration::from_secs(45));
        assert!(parse_seconds("K", "0").is_err());
        assert!(parse_seconds("K", "soon").is_err());
    }

    #[test]
    fn test_parse_http_url_rejects_other_schemes() {
        assert!(parse_http_url("K", "https://api.sandbox.cel.cash/v2").is_ok());
        assert!(matches!(
            parse_http_url("K", "ftp://example.org"),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
        assert!(parse_http_url("K", "not a url").is_err());
    }

    #[test]
    fn test_socket_addr_and_security() {
        let mut config = config();
        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
        assert!(!config.is_secure());

        config.base_url = "https://cadastro.example.com".to_string();
        assert!(config.is_secure());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let debug_output = format!("{:?}", config());

        assert!(debug_output.contains("client_id_value"));
        assert!(debug_output.contains("asoec"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_client_secret"));
        assert!(!debug_output.contains("demo_password_value"));
    }

    #[test]
    fn test_warnings() {
        let mut config = config();
        // Fixture secret contains the "secret" placeholder pattern.
        assert_eq!(config.warnings().len(), 1);

        if let Some(credentials) = config.celcoin.credentials.as_mut() {
            credentials.client_secret = SecretString::from("xK9#mP2$vL5@nQ8&wR3");
        }
        assert!(config.warnings().is_empty());

        config.celcoin.credentials = None;
        assert!(config.warnings().iter().any(|w| w.contains("503")));
    }
}
