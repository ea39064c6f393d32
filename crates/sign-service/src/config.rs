//! Sign service configuration.
//!
//! Configuration is loaded from environment variables. The link signing
//! secret is held in a `SecretString` and redacted in Debug output.

use axum::http::HeaderValue;
use common::jwt::{DEFAULT_EXP_LEEWAY, MAX_EXP_LEEWAY};
use secrecy::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default key-set cache TTL in seconds (12 hours).
pub const DEFAULT_JWKS_CACHE_TTL_SECONDS: u64 = 43_200;

/// Default timeout for a key-set fetch in seconds.
pub const DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 15;

/// Default expected `token_use` claim (identity tokens).
pub const DEFAULT_TOKEN_USE: &str = "id";

/// Default validity of issued content links in seconds.
pub const DEFAULT_LINK_EXPIRY_SECONDS: u64 = 3600;

/// Default timeout for a single content-store call in seconds.
pub const DEFAULT_STORE_TIMEOUT_SECONDS: u64 = 5;

/// Default number of memoized existence checks.
pub const DEFAULT_EXISTENCE_CACHE_CAPACITY: usize = 8192;

/// Default lifetime of a memoized existence check in seconds.
pub const DEFAULT_EXISTENCE_CACHE_TTL_SECONDS: u64 = 3600;

/// Default cap on clips returned for one text.
pub const DEFAULT_MAX_RETURNED_CLIPS: usize = 200;

/// Default recognition service endpoint.
pub const DEFAULT_RECOGNITION_URL: &str = "http://localhost:6000/predict";

/// Default recognition request timeout in seconds.
pub const DEFAULT_RECOGNITION_TIMEOUT_SECONDS: u64 = 60;

/// Default upload limit for sign-to-text requests (500 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 500 * 1024 * 1024;

/// Default graceful shutdown drain period in seconds.
pub const DEFAULT_DRAIN_SECONDS: u64 = 30;

/// Default CORS origin setting (any origin).
pub const DEFAULT_CORS_ORIGINS: &str = "*";

/// Placeholder substituted with the token in key patterns.
pub const TOKEN_PLACEHOLDER: &str = "{token}";

/// Default word-level content key patterns.
pub const DEFAULT_WORD_KEY_PATTERNS: &[&str] = &["videos/ar/{token}.mp4"];

/// Default letter-level content key patterns, in lookup order.
pub const DEFAULT_LETTER_KEY_PATTERNS: &[&str] = &[
    "videos/ar/letters/{token}.mp4",
    "ar/letters/{token}.mp4",
    "letters/{token}.mp4",
];

/// Origins allowed to call the API from a browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigins {
    /// `*`: any origin, without credentials.
    Any,
    /// Exact `scheme://host[:port]` origins.
    List(Vec<String>),
}

/// Sign service configuration.
#[derive(Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Identity provider issuer; compared exactly against `iss`.
    pub idp_issuer: String,

    /// App client id; compared exactly against `aud`.
    pub idp_client_id: String,

    /// Key-set document URL (default: `{issuer}/.well-known/jwks.json`).
    pub idp_jwks_url: String,

    /// Expected `token_use` claim.
    pub expected_token_use: String,

    /// Key-set cache TTL in seconds.
    pub jwks_cache_ttl_seconds: u64,

    /// Upper bound for one key-set fetch in seconds.
    pub jwks_fetch_timeout_seconds: u64,

    /// Leeway for the `exp` check in seconds.
    pub jwt_leeway_seconds: u64,

    /// Base URL HEAD checks are issued against.
    pub content_store_url: String,

    /// Base URL clients fetch media from.
    pub content_public_url: String,

    /// HMAC key for signed content links.
    pub link_signing_secret: SecretString,

    /// Validity of issued links in seconds.
    pub link_expiry_seconds: u64,

    /// Upper bound for one content-store call in seconds.
    pub store_timeout_seconds: u64,

    /// Maximum entries held by the existence cache.
    pub existence_cache_capacity: usize,

    /// Lifetime of one existence cache entry in seconds.
    pub existence_cache_ttl_seconds: u64,

    /// Maximum clips returned by one resolution.
    pub max_returned_clips: usize,

    /// Word-level content key patterns.
    pub word_key_patterns: Vec<String>,

    /// Letter-level content key patterns.
    pub letter_key_patterns: Vec<String>,

    /// Recognition service endpoint.
    pub recognition_url: String,

    /// Upper bound for one recognition request in seconds.
    pub recognition_timeout_seconds: u64,

    /// Maximum accepted upload size in bytes.
    pub max_upload_bytes: usize,

    /// Drain period after a shutdown signal in seconds (0 disables).
    pub drain_seconds: u64,

    /// Cross-origin allow-list.
    pub cors_origins: CorsOrigins,
}

/// Custom Debug implementation that redacts the signing secret.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("idp_issuer", &self.idp_issuer)
            .field("idp_client_id", &self.idp_client_id)
            .field("idp_jwks_url", &self.idp_jwks_url)
            .field("expected_token_use", &self.expected_token_use)
            .field("jwks_cache_ttl_seconds", &self.jwks_cache_ttl_seconds)
            .field(
                "jwks_fetch_timeout_seconds",
                &self.jwks_fetch_timeout_seconds,
            )
            .field("jwt_leeway_seconds", &self.jwt_leeway_seconds)
            .field("content_store_url", &self.content_store_url)
            .field("content_public_url", &self.content_public_url)
            .field("link_signing_secret", &"[REDACTED]")
            .field("link_expiry_seconds", &self.link_expiry_seconds)
            .field("store_timeout_seconds", &self.store_timeout_seconds)
            .field("existence_cache_capacity", &self.existence_cache_capacity)
            .field(
                "existence_cache_ttl_seconds",
                &self.existence_cache_ttl_seconds,
            )
            .field("max_returned_clips", &self.max_returned_clips)
            .field("word_key_patterns", &self.word_key_patterns)
            .field("letter_key_patterns", &self.letter_key_patterns)
            .field("recognition_url", &self.recognition_url)
            .field(
                "recognition_timeout_seconds",
                &self.recognition_timeout_seconds,
            )
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("drain_seconds", &self.drain_seconds)
            .field("cors_origins", &self.cors_origins)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },

    #[error("Invalid key pattern configuration: {0}")]
    InvalidKeyPattern(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let idp_issuer = required(vars, "IDP_ISSUER")?
            .trim_end_matches('/')
            .to_string();
        let idp_client_id = required(vars, "IDP_CLIENT_ID")?;
        let content_store_url = required(vars, "CONTENT_STORE_URL")?
            .trim_end_matches('/')
            .to_string();
        let link_signing_secret = required(vars, "LINK_SIGNING_SECRET")?;
        if link_signing_secret.len() < 16 {
            return Err(ConfigError::InvalidValue {
                name: "LINK_SIGNING_SECRET".to_string(),
                reason: "must be at least 16 bytes".to_string(),
            });
        }

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| "0.0.0.0:8080".to_string());

        let idp_jwks_url = vars
            .get("IDP_JWKS_URL")
            .cloned()
            .unwrap_or_else(|| format!("{}/.well-known/jwks.json", idp_issuer));

        let expected_token_use = vars
            .get("IDP_TOKEN_USE")
            .cloned()
            .unwrap_or_else(|| DEFAULT_TOKEN_USE.to_string());

        let content_public_url = vars
            .get("CONTENT_PUBLIC_URL")
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| content_store_url.clone());

        let jwt_leeway_seconds =
            parse_u64(vars, "JWT_LEEWAY_SECONDS", DEFAULT_EXP_LEEWAY.as_secs(), false)?;
        if jwt_leeway_seconds > MAX_EXP_LEEWAY.as_secs() {
            return Err(ConfigError::InvalidValue {
                name: "JWT_LEEWAY_SECONDS".to_string(),
                reason: format!(
                    "must not exceed {} seconds, got {}",
                    MAX_EXP_LEEWAY.as_secs(),
                    jwt_leeway_seconds
                ),
            });
        }

        let word_key_patterns = parse_patterns(vars, "WORD_KEY_PATTERNS", DEFAULT_WORD_KEY_PATTERNS)?;
        let letter_key_patterns =
            parse_patterns(vars, "LETTER_KEY_PATTERNS", DEFAULT_LETTER_KEY_PATTERNS)?;

        let cors_origins = parse_cors_origins(vars)?;

        Ok(Config {
            bind_address,
            idp_issuer,
            idp_client_id,
            idp_jwks_url,
            expected_token_use,
            jwks_cache_ttl_seconds: parse_u64(
                vars,
                "JWKS_CACHE_TTL_SECONDS",
                DEFAULT_JWKS_CACHE_TTL_SECONDS,
                true,
            )?,
            jwks_fetch_timeout_seconds: parse_u64(
                vars,
                "JWKS_FETCH_TIMEOUT_SECONDS",
                DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS,
                true,
            )?,
            jwt_leeway_seconds,
            content_store_url,
            content_public_url,
            link_signing_secret: SecretString::from(link_signing_secret),
            link_expiry_seconds: parse_u64(
                vars,
                "LINK_EXPIRY_SECONDS",
                DEFAULT_LINK_EXPIRY_SECONDS,
                true,
            )?,
            store_timeout_seconds: parse_u64(
                vars,
                "STORE_TIMEOUT_SECONDS",
                DEFAULT_STORE_TIMEOUT_SECONDS,
                true,
            )?,
            existence_cache_capacity: parse_usize(
                vars,
                "EXISTENCE_CACHE_CAPACITY",
                DEFAULT_EXISTENCE_CACHE_CAPACITY,
            )?,
            existence_cache_ttl_seconds: parse_u64(
                vars,
                "EXISTENCE_CACHE_TTL_SECONDS",
                DEFAULT_EXISTENCE_CACHE_TTL_SECONDS,
                true,
            )?,
            max_returned_clips: parse_usize(
                vars,
                "MAX_RETURNED_CLIPS",
                DEFAULT_MAX_RETURNED_CLIPS,
            )?,
            word_key_patterns,
            letter_key_patterns,
            recognition_url: vars
                .get("RECOGNITION_URL")
                .cloned()
                .unwrap_or_else(|| DEFAULT_RECOGNITION_URL.to_string()),
            recognition_timeout_seconds: parse_u64(
                vars,
                "RECOGNITION_TIMEOUT_SECONDS",
                DEFAULT_RECOGNITION_TIMEOUT_SECONDS,
                true,
            )?,
            max_upload_bytes: parse_usize(vars, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            drain_seconds: parse_u64(vars, "DRAIN_SECONDS", DEFAULT_DRAIN_SECONDS, false)?,
            cors_origins,
        })
    }
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .filter(|v| !v.trim().is_empty())
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn parse_u64(
    vars: &HashMap<String, String>,
    name: &str,
    default: u64,
    must_be_positive: bool,
) -> Result<u64, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: u64 = value_str.parse().map_err(|e| ConfigError::InvalidValue {
        name: name.to_string(),
        reason: format!("must be a valid non-negative integer, got '{}': {}", value_str, e),
    })?;

    if must_be_positive && value == 0 {
        return Err(ConfigError::InvalidValue {
            name: name.to_string(),
            reason: "must be greater than 0".to_string(),
        });
    }

    Ok(value)
}

fn parse_usize(
    vars: &HashMap<String, String>,
    name: &str,
    default: usize,
) -> Result<usize, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: usize = value_str.parse().map_err(|e| ConfigError::InvalidValue {
        name: name.to_string(),
        reason: format!("must be a valid positive integer, got '{}': {}", value_str, e),
    })?;

    if value == 0 {
        return Err(ConfigError::InvalidValue {
            name: name.to_string(),
            reason: "must be greater than 0".to_string(),
        });
    }

    Ok(value)
}

/// Parse a comma-separated list of key patterns; each must carry `{token}`.
fn parse_patterns(
    vars: &HashMap<String, String>,
    name: &str,
    default: &[&str],
) -> Result<Vec<String>, ConfigError> {
    let Some(raw) = vars.get(name) else {
        return Ok(default.iter().map(ToString::to_string).collect());
    };

    let patterns: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(ToString::to_string)
        .collect();

    if patterns.is_empty() {
        return Err(ConfigError::InvalidKeyPattern(format!(
            "{} must list at least one pattern",
            name
        )));
    }

    if let Some(bad) = patterns.iter().find(|p| !p.contains(TOKEN_PLACEHOLDER)) {
        return Err(ConfigError::InvalidKeyPattern(format!(
            "{} entry '{}' has no {} placeholder",
            name, bad, TOKEN_PLACEHOLDER
        )));
    }

    Ok(patterns)
}

/// `*` alone allows any origin; otherwise a comma-separated list of
/// http(s) origins.
fn parse_cors_origins(vars: &HashMap<String, String>) -> Result<CorsOrigins, ConfigError> {
    let raw = vars
        .get("CORS_ORIGINS")
        .map(|v| v.trim())
        .unwrap_or(DEFAULT_CORS_ORIGINS);

    if raw == "*" {
        return Ok(CorsOrigins::Any);
    }

    let invalid = |reason: String| ConfigError::InvalidValue {
        name: "CORS_ORIGINS".to_string(),
        reason,
    };

    let origins: Vec<String> = raw
        .split(',')
        .map(|o| o.trim().trim_end_matches('/'))
        .filter(|o| !o.is_empty())
        .map(ToString::to_string)
        .collect();

    if origins.is_empty() {
        return Err(invalid("must be '*' or list at least one origin".to_string()));
    }

    for origin in &origins {
        if origin == "*" {
            return Err(invalid("'*' cannot be combined with other origins".to_string()));
        }
        if !(origin.starts_with("http://") || origin.starts_with("https://")) {
            return Err(invalid(format!(
                "origin '{}' must start with http:// or https://",
                origin
            )));
        }
        if origin.contains(char::is_whitespace) || HeaderValue::from_str(origin).is_err() {
            return Err(invalid(format!("origin '{}' is not a valid header value", origin)));
        }
    }

    Ok(CorsOrigins::List(origins))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([
            (
                "IDP_ISSUER".to_string(),
                "https://idp.example.com/pool-1".to_string(),
            ),
            ("IDP_CLIENT_ID".to_string(), "client-abc".to_string()),
            (
                "CONTENT_STORE_URL".to_string(),
                "https://media.example.com/".to_string(),
            ),
            (
                "LINK_SIGNING_SECRET".to_string(),
                "0123456789abcdef0123456789abcdef".to_string(),
            ),
        ])
    }

    #[test]
    fn test_from_vars_success_with_defaults() {
        let config = Config::from_vars(&base_vars()).expect("Config should load successfully");

        assert_eq!(config.bind_address, "0.0.0.0:8080");
        assert_eq!(config.idp_issuer, "https://idp.example.com/pool-1");
        assert_eq!(config.idp_client_id, "client-abc");
        assert_eq!(
            config.idp_jwks_url,
            "https://idp.example.com/pool-1/.well-known/jwks.json"
        );
        assert_eq!(config.expected_token_use, "id");
        assert_eq!(config.jwks_cache_ttl_seconds, DEFAULT_JWKS_CACHE_TTL_SECONDS);
        assert_eq!(
            config.jwks_fetch_timeout_seconds,
            DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS
        );
        assert_eq!(config.jwt_leeway_seconds, 0);
        assert_eq!(config.content_store_url, "https://media.example.com");
        assert_eq!(config.content_public_url, "https://media.example.com");
        assert_eq!(config.link_expiry_seconds, DEFAULT_LINK_EXPIRY_SECONDS);
        assert_eq!(config.store_timeout_seconds, DEFAULT_STORE_TIMEOUT_SECONDS);
        assert_eq!(
            config.existence_cache_capacity,
            DEFAULT_EXISTENCE_CACHE_CAPACITY
        );
        assert_eq!(config.max_returned_clips, DEFAULT_MAX_RETURNED_CLIPS);
        assert_eq!(config.word_key_patterns, vec!["videos/ar/{token}.mp4"]);
        assert_eq!(config.letter_key_patterns.len(), 3);
        assert_eq!(config.recognition_url, DEFAULT_RECOGNITION_URL);
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert_eq!(config.drain_seconds, DEFAULT_DRAIN_SECONDS);
        assert_eq!(config.cors_origins, CorsOrigins::Any);
    }

    #[test]
    fn test_from_vars_success_with_custom_values() {
        let mut vars = base_vars();
        vars.insert("BIND_ADDRESS".to_string(), "127.0.0.1:9000".to_string());
        vars.insert(
            "IDP_JWKS_URL".to_string(),
            "http://localhost:9999/keys".to_string(),
        );
        vars.insert("IDP_TOKEN_USE".to_string(), "identity".to_string());
        vars.insert("JWKS_CACHE_TTL_SECONDS".to_string(), "60".to_string());
        vars.insert("JWT_LEEWAY_SECONDS".to_string(), "30".to_string());
        vars.insert(
            "CONTENT_PUBLIC_URL".to_string(),
            "https://cdn.example.com/".to_string(),
        );
        vars.insert("MAX_RETURNED_CLIPS".to_string(), "5".to_string());
        vars.insert(
            "LETTER_KEY_PATTERNS".to_string(),
            "a/{token}.mp4, b/{token}.webm".to_string(),
        );

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.bind_address, "127.0.0.1:9000");
        assert_eq!(config.idp_jwks_url, "http://localhost:9999/keys");
        assert_eq!(config.expected_token_use, "identity");
        assert_eq!(config.jwks_cache_ttl_seconds, 60);
        assert_eq!(config.jwt_leeway_seconds, 30);
        assert_eq!(config.content_public_url, "https://cdn.example.com");
        assert_eq!(config.max_returned_clips, 5);
        assert_eq!(
            config.letter_key_patterns,
            vec!["a/{token}.mp4", "b/{token}.webm"]
        );
    }

    #[test]
    fn test_from_vars_missing_required() {
        for name in [
            "IDP_ISSUER",
            "IDP_CLIENT_ID",
            "CONTENT_STORE_URL",
            "LINK_SIGNING_SECRET",
        ] {
            let mut vars = base_vars();
            vars.remove(name);
            let result = Config::from_vars(&vars);
            assert!(
                matches!(&result, Err(ConfigError::MissingEnvVar(v)) if v == name),
                "expected MissingEnvVar({}), got {:?}",
                name,
                result
            );
        }
    }

    #[test]
    fn test_short_signing_secret_rejected() {
        let mut vars = base_vars();
        vars.insert("LINK_SIGNING_SECRET".to_string(), "short".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidValue { name, .. }) if name == "LINK_SIGNING_SECRET")
        );
    }

    #[test]
    fn test_max_returned_clips_rejects_zero() {
        let mut vars = base_vars();
        vars.insert("MAX_RETURNED_CLIPS".to_string(), "0".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidValue { reason, .. }) if reason.contains("greater than 0"))
        );
    }

    #[test]
    fn test_ttl_rejects_non_numeric() {
        let mut vars = base_vars();
        vars.insert("JWKS_CACHE_TTL_SECONDS".to_string(), "half-day".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidValue { name, reason }) if name == "JWKS_CACHE_TTL_SECONDS" && reason.contains("valid"))
        );
    }

    #[test]
    fn test_leeway_zero_allowed_but_bounded() {
        let mut vars = base_vars();
        vars.insert("JWT_LEEWAY_SECONDS".to_string(), "0".to_string());
        assert_eq!(Config::from_vars(&vars).unwrap().jwt_leeway_seconds, 0);

        vars.insert("JWT_LEEWAY_SECONDS".to_string(), "601".to_string());
        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidValue { reason, .. }) if reason.contains("must not exceed 600"))
        );
    }

    #[test]
    fn test_pattern_without_placeholder_rejected() {
        let mut vars = base_vars();
        vars.insert(
            "WORD_KEY_PATTERNS".to_string(),
            "videos/ar/fixed.mp4".to_string(),
        );

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidKeyPattern(msg)) if msg.contains("placeholder"))
        );
    }

    #[test]
    fn test_empty_pattern_list_rejected() {
        let mut vars = base_vars();
        vars.insert("LETTER_KEY_PATTERNS".to_string(), " , ".to_string());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidKeyPattern(_))));
    }

    #[test]
    fn test_cors_origins_list() {
        let mut vars = base_vars();
        vars.insert(
            "CORS_ORIGINS".to_string(),
            " https://app.example.com/, http://localhost:3000 ,".to_string(),
        );

        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(
            config.cors_origins,
            CorsOrigins::List(vec![
                "https://app.example.com".to_string(),
                "http://localhost:3000".to_string(),
            ])
        );
    }

    #[test]
    fn test_cors_origins_rejects_bad_entries() {
        for raw in [
            " , ",
            "https://a.example.com,*",
            "app.example.com",
            "https://a.example.com,ftp://b.example.com",
        ] {
            let mut vars = base_vars();
            vars.insert("CORS_ORIGINS".to_string(), raw.to_string());
            let result = Config::from_vars(&vars);
            assert!(
                matches!(&result, Err(ConfigError::InvalidValue { name, .. }) if name == "CORS_ORIGINS"),
                "expected CORS_ORIGINS error for {:?}, got {:?}",
                raw,
                result
            );
        }
    }

    #[test]
    fn test_debug_redacts_signing_secret() {
        let config = Config::from_vars(&base_vars()).expect("Config should load successfully");

        let debug_output = format!("{:?}", config);

        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("0123456789abcdef"));
        assert_eq!(
            config.link_signing_secret.expose_secret(),
            "0123456789abcdef0123456789abcdef"
        );
    }
}
