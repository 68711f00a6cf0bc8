//! Application configuration loaded from environment variables.
//!
//! Provider credentials and endpoints are resolved once at startup into
//! immutable [`ProviderConfig`] records and injected into the services that
//! need them; nothing reads the environment after `Config::from_env()`.

use crate::models::Provider;
use std::env;
use std::str::FromStr;

pub const WHOOP_AUTH_URL: &str = "https://api.prod.whoop.com/oauth/oauth2/auth";
pub const WHOOP_TOKEN_URL: &str = "https://api.prod.whoop.com/oauth/oauth2/token";
pub const WHOOP_API_BASE: &str = "https://api.prod.whoop.com/developer/v2";
pub const WHOOP_SCOPES: &str =
    "read:recovery read:sleep read:workout read:cycles read:profile read:body_measurement offline";

pub const OURA_AUTH_URL: &str = "https://cloud.ouraring.com/oauth/authorize";
pub const OURA_TOKEN_URL: &str = "https://api.ouraring.com/oauth/token";
pub const OURA_API_BASE: &str = "https://api.ouraring.com/v2/usercollection";
pub const OURA_SCOPES: &str = "daily email personal heartrate workout tag session spo2";

/// How the client secret is presented to a provider's token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientAuth {
    /// `client_id` and `client_secret` sent as form fields.
    RequestBody,
    /// HTTP Basic authentication with `client_id:client_secret`.
    BasicAuth,
}

/// Fixed OAuth + REST settings for one provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub provider: Provider,
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub token_url: String,
    pub api_base: String,
    pub scopes: String,
    pub redirect_uri: String,
    pub client_auth: ClientAuth,
}

/// Coefficients for the composite recovery and training readiness scores.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    pub whoop_weight: f64,
    pub oura_weight: f64,
    /// Points subtracted per hour of high stress.
    pub stress_penalty_per_hour: f64,
    pub stress_penalty_cap: f64,
    /// Points subtracted per degree Celsius of temperature deviation.
    pub temperature_penalty_per_degree: f64,
    pub temperature_penalty_cap: f64,
    /// SpO2 percentage below which the uncapped oxygen penalty applies.
    pub spo2_threshold: f64,
    pub spo2_penalty_per_point: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            whoop_weight: 0.5,
            oura_weight: 0.5,
            stress_penalty_per_hour: 1.25,
            stress_penalty_cap: 10.0,
            temperature_penalty_per_degree: 5.0,
            temperature_penalty_cap: 5.0,
            spo2_threshold: 95.0,
            spo2_penalty_per_point: 2.0,
        }
    }
}

/// Days an endpoint query may widen backwards when today has no record yet.
///
/// Widening trades date accuracy for availability: a value of 1 means
/// yesterday's record can stand in for today's. Zero disables widening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackPolicy {
    pub whoop_recovery_days: u32,
    pub whoop_sleep_days: u32,
    pub whoop_workout_days: u32,
    pub oura_activity_days: u32,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            whoop_recovery_days: 1,
            whoop_sleep_days: 1,
            whoop_workout_days: 0,
            oura_activity_days: 2,
        }
    }
}

/// Which storage backend to wire up at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Firestore,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(Self::Firestore),
            "memory" => Ok(Self::Memory),
            _ => Err(()),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    pub storage_backend: StorageBackend,
    /// Refresh access tokens this many seconds before they expire
    pub token_refresh_margin_secs: i64,
    /// Timeout applied to every outbound provider request
    pub http_timeout_secs: u64,
    /// Unconsumed OAuth states older than this are purged
    pub oauth_state_ttl_secs: i64,

    // --- Providers ---
    pub whoop: ProviderConfig,
    pub oura: ProviderConfig,
    pub scoring: ScoringConfig,
    pub fallback: FallbackPolicy,

    // --- Secrets ---
    /// JWT signing key for front-end session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// Shared secret expected on `/tasks/*` requests; `None` disables them
    pub tasks_token: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// A `.env` file is honored for local development.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let redirect_host = env::var("OAUTH_REDIRECT_HOST")
            .unwrap_or_else(|_| "http://localhost:8080".to_string());
        let redirect_host = redirect_host.trim_end_matches('/');

        let whoop = ProviderConfig {
            provider: Provider::Whoop,
            client_id: required("WHOOP_CLIENT_ID")?,
            client_secret: required("WHOOP_CLIENT_SECRET")?,
            auth_url: env_or_string("WHOOP_AUTH_URL", WHOOP_AUTH_URL),
            token_url: env_or_string("WHOOP_TOKEN_URL", WHOOP_TOKEN_URL),
            api_base: env_or_string("WHOOP_API_BASE", WHOOP_API_BASE),
            scopes: WHOOP_SCOPES.to_string(),
            redirect_uri: format!("{}/callback/whoop", redirect_host),
            client_auth: ClientAuth::RequestBody,
        };

        let oura = ProviderConfig {
            provider: Provider::Oura,
            client_id: required("OURA_CLIENT_ID")?,
            client_secret: required("OURA_CLIENT_SECRET")?,
            auth_url: env_or_string("OURA_AUTH_URL", OURA_AUTH_URL),
            token_url: env_or_string("OURA_TOKEN_URL", OURA_TOKEN_URL),
            api_base: env_or_string("OURA_API_BASE", OURA_API_BASE),
            scopes: OURA_SCOPES.to_string(),
            redirect_uri: format!("{}/callback/oura", redirect_host),
            client_auth: ClientAuth::BasicAuth,
        };

        let defaults = ScoringConfig::default();
        let scoring = ScoringConfig {
            whoop_weight: env_coefficient("WHOOP_WEIGHT", defaults.whoop_weight)?,
            oura_weight: env_coefficient("OURA_WEIGHT", defaults.oura_weight)?,
            stress_penalty_per_hour: env_coefficient(
                "STRESS_PENALTY_PER_HOUR",
                defaults.stress_penalty_per_hour,
            )?,
            stress_penalty_cap: env_coefficient("STRESS_PENALTY_CAP", defaults.stress_penalty_cap)?,
            temperature_penalty_per_degree: env_coefficient(
                "TEMPERATURE_PENALTY_PER_DEGREE",
                defaults.temperature_penalty_per_degree,
            )?,
            temperature_penalty_cap: env_coefficient(
                "TEMPERATURE_PENALTY_CAP",
                defaults.temperature_penalty_cap,
            )?,
            spo2_threshold: env_coefficient("SPO2_THRESHOLD", defaults.spo2_threshold)?,
            spo2_penalty_per_point: env_coefficient(
                "SPO2_PENALTY_PER_POINT",
                defaults.spo2_penalty_per_point,
            )?,
        };

        let fallback_defaults = FallbackPolicy::default();
        let fallback = FallbackPolicy {
            whoop_recovery_days: env_or(
                "WHOOP_RECOVERY_LOOKBACK_DAYS",
                fallback_defaults.whoop_recovery_days,
            )?,
            whoop_sleep_days: env_or(
                "WHOOP_SLEEP_LOOKBACK_DAYS",
                fallback_defaults.whoop_sleep_days,
            )?,
            whoop_workout_days: env_or(
                "WHOOP_WORKOUT_LOOKBACK_DAYS",
                fallback_defaults.whoop_workout_days,
            )?,
            oura_activity_days: env_or(
                "OURA_ACTIVITY_LOOKBACK_DAYS",
                fallback_defaults.oura_activity_days,
            )?,
        };

        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(value) => value.parse().map_err(|_| ConfigError::Invalid {
                name: "STORAGE_BACKEND",
                value,
            })?,
            Err(_) => StorageBackend::Firestore,
        };

        Ok(Self {
            frontend_url: env_or_string("FRONTEND_URL", "http://localhost:5173"),
            gcp_project_id: env_or_string("GCP_PROJECT_ID", "local-dev"),
            port: env_or("PORT", 8080)?,
            storage_backend,
            token_refresh_margin_secs: env_or("TOKEN_REFRESH_MARGIN_SECS", 60)?,
            http_timeout_secs: env_or("HTTP_TIMEOUT_SECS", 15)?,
            oauth_state_ttl_secs: env_or("OAUTH_STATE_TTL_SECS", 15 * 60)?,
            whoop,
            oura,
            scoring,
            fallback,
            jwt_signing_key: required("JWT_SIGNING_KEY")?.into_bytes(),
            tasks_token: env::var("TASKS_TOKEN")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
        })
    }

    /// Deterministic configuration for tests.
    pub fn test_default() -> Self {
        let provider = |provider: Provider, client_auth| ProviderConfig {
            provider,
            client_id: format!("{}_client_id", provider),
            client_secret: format!("{}_client_secret", provider),
            auth_url: format!("https://auth.example.com/{}/authorize", provider),
            token_url: format!("https://auth.example.com/{}/token", provider),
            api_base: format!("https://api.example.com/{}", provider),
            scopes: "read offline".to_string(),
            redirect_uri: format!("http://localhost:8080/callback/{}", provider),
            client_auth,
        };

        Self {
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            storage_backend: StorageBackend::Memory,
            token_refresh_margin_secs: 60,
            http_timeout_secs: 5,
            oauth_state_ttl_secs: 15 * 60,
            whoop: provider(Provider::Whoop, ClientAuth::RequestBody),
            oura: provider(Provider::Oura, ClientAuth::BasicAuth),
            scoring: ScoringConfig::default(),
            fallback: FallbackPolicy::default(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            tasks_token: Some("test_tasks_token".to_string()),
        }
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .map_err(|_| ConfigError::Missing(name))
}

fn env_or_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}

/// Scoring coefficient from the environment: finite and non-negative.
fn env_coefficient(name: &'static str, default: f64) -> Result<f64, ConfigError> {
    parse_coefficient(name, env::var(name).ok(), default)
}

fn parse_coefficient(
    name: &'static str,
    raw: Option<String>,
    default: f64,
) -> Result<f64, ConfigError> {
    let Some(value) = raw else {
        return Ok(default);
    };
    match value.trim().parse::<f64>() {
        Ok(parsed) if parsed.is_finite() && parsed >= 0.0 => Ok(parsed),
        _ => Err(ConfigError::Invalid { name, value }),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        // Set required env vars for test
        env::set_var("WHOOP_CLIENT_ID", "whoop_id");
        env::set_var("WHOOP_CLIENT_SECRET", "whoop_secret");
        env::set_var("OURA_CLIENT_ID", "oura_id");
        env::set_var("OURA_CLIENT_SECRET", "oura_secret");
        env::set_var("JWT_SIGNING_KEY", "test_jwt_key_32_bytes_minimum!!");
        env::set_var("OAUTH_REDIRECT_HOST", "https://vitals.example.com/");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.whoop.client_id, "whoop_id");
        assert_eq!(config.oura.client_secret, "oura_secret");
        assert_eq!(
            config.whoop.redirect_uri,
            "https://vitals.example.com/callback/whoop"
        );
        assert_eq!(config.oura.client_auth, ClientAuth::BasicAuth);
        assert_eq!(config.whoop.client_auth, ClientAuth::RequestBody);
        assert_eq!(config.token_refresh_margin_secs, 60);
        assert_eq!(config.scoring, ScoringConfig::default());
        assert_eq!(config.fallback.oura_activity_days, 2);
    }

    #[test]
    fn test_storage_backend_parse() {
        assert_eq!("memory".parse(), Ok(StorageBackend::Memory));
        assert_eq!(" Firestore ".parse(), Ok(StorageBackend::Firestore));
        assert!("sqlite".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn test_negative_penalty_cap_rejected() {
        let result = parse_coefficient("STRESS_PENALTY_CAP", Some("-1".to_string()), 10.0);
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                name: "STRESS_PENALTY_CAP",
                ..
            })
        ));
    }

    #[test]
    fn test_non_finite_coefficients_rejected() {
        for raw in ["NaN", "inf", "-inf", "abc"] {
            let result = parse_coefficient("TEMPERATURE_PENALTY_CAP", Some(raw.to_string()), 5.0);
            assert!(
                matches!(
                    result,
                    Err(ConfigError::Invalid {
                        name: "TEMPERATURE_PENALTY_CAP",
                        ..
                    })
                ),
                "{}",
                raw
            );
        }
    }

    #[test]
    fn test_valid_coefficients_accepted() {
        assert_eq!(parse_coefficient("WHOOP_WEIGHT", None, 0.5).unwrap(), 0.5);
        assert_eq!(
            parse_coefficient("WHOOP_WEIGHT", Some(" 0.7 ".to_string()), 0.5).unwrap(),
            0.7
        );
        assert_eq!(
            parse_coefficient("STRESS_PENALTY_CAP", Some("0".to_string()), 10.0).unwrap(),
            0.0
        );
    }
}
