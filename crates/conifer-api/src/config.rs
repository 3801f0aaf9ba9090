//! Server configuration loaded from `CONIFER_*` environment variables.
//!
//! Every variable has a typed parser and a default; an unparseable value is
//! an error at startup rather than a silently ignored one.

use std::fmt;
use std::path::PathBuf;

use conifer_core::{Error, Result};

/// Top-level server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen port (`CONIFER_PORT`).
    pub port: u16,
    /// Debug posture (`CONIFER_DEBUG`).
    ///
    /// In debug mode the admin principal is read from the `Api-User` header
    /// and the in-memory storage backend is allowed. In production mode a
    /// verified bearer JWT is required and so is a database path.
    pub debug: bool,
    /// `SQLite` database path (`CONIFER_DB_PATH`).
    ///
    /// When unset the server falls back to in-memory storage, which is only
    /// permitted in debug mode.
    pub db_path: Option<PathBuf>,
    /// JWT verification settings for production posture.
    pub jwt: JwtConfig,
    /// CORS settings.
    pub cors: CorsConfig,
    /// Deadline for change-notification webhook deliveries, in seconds
    /// (`CONIFER_WEBHOOK_TIMEOUT_SECS`).
    pub webhook_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            debug: false,
            db_path: None,
            jwt: JwtConfig::default(),
            cors: CorsConfig::default(),
            webhook_timeout_secs: 10,
        }
    }
}

/// JWT verification settings.
///
/// Tokens are verified with HS256 using a shared secret. The admin principal
/// is taken from a configurable claim, `sub` by default.
#[derive(Clone)]
pub struct JwtConfig {
    /// Shared HS256 secret (`CONIFER_JWT_SECRET`). Required when
    /// `debug=false`.
    pub hs256_secret: Option<String>,
    /// Expected `iss` claim, if any (`CONIFER_JWT_ISSUER`).
    pub issuer: Option<String>,
    /// Expected `aud` claim, if any (`CONIFER_JWT_AUDIENCE`).
    pub audience: Option<String>,
    /// Claim carrying the admin principal (`CONIFER_JWT_USER_CLAIM`).
    pub user_claim: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            hs256_secret: None,
            issuer: None,
            audience: None,
            user_claim: "sub".to_string(),
        }
    }
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field(
                "hs256_secret",
                &self.hs256_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("user_claim", &self.user_claim)
            .finish()
    }
}

/// CORS settings.
#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// Allowed origins (`CONIFER_CORS_ALLOWED_ORIGINS`, comma-separated).
    ///
    /// `*` must be the only entry when present, and is rejected outright
    /// when `debug=false`.
    pub allowed_origins: Vec<String>,
    /// Preflight cache duration in seconds
    /// (`CONIFER_CORS_MAX_AGE_SECONDS`).
    pub max_age_seconds: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            max_age_seconds: 3600,
        }
    }
}

impl Config {
    /// Loads configuration from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to a value its type cannot
    /// parse.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let jwt = JwtConfig {
            hs256_secret: env_string("CONIFER_JWT_SECRET"),
            issuer: env_string("CONIFER_JWT_ISSUER"),
            audience: env_string("CONIFER_JWT_AUDIENCE"),
            user_claim: env_string("CONIFER_JWT_USER_CLAIM")
                .unwrap_or(defaults.jwt.user_claim),
        };

        let cors = CorsConfig {
            allowed_origins: env_string("CONIFER_CORS_ALLOWED_ORIGINS")
                .map(|raw| split_origins(&raw))
                .unwrap_or_default(),
            max_age_seconds: env_u64("CONIFER_CORS_MAX_AGE_SECONDS")?
                .unwrap_or(defaults.cors.max_age_seconds),
        };

        Ok(Self {
            port: env_u16("CONIFER_PORT")?.unwrap_or(defaults.port),
            debug: env_bool("CONIFER_DEBUG")?.unwrap_or(defaults.debug),
            db_path: env_string("CONIFER_DB_PATH").map(PathBuf::from),
            jwt,
            cors,
            webhook_timeout_secs: env_u64("CONIFER_WEBHOOK_TIMEOUT_SECS")?
                .unwrap_or(defaults.webhook_timeout_secs),
        })
    }
}

/// Reads a string variable, treating unset, empty, and whitespace-only
/// values as absent.
fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_u16(name: &str) -> Result<Option<u16>> {
    env_string(name)
        .map(|raw| {
            raw.parse::<u16>().map_err(|_| {
                Error::InvalidInput(format!("{name} must be an integer in 0..=65535, got {raw:?}"))
            })
        })
        .transpose()
}

fn env_u64(name: &str) -> Result<Option<u64>> {
    env_string(name)
        .map(|raw| {
            raw.parse::<u64>().map_err(|_| {
                Error::InvalidInput(format!("{name} must be a non-negative integer, got {raw:?}"))
            })
        })
        .transpose()
}

fn env_bool(name: &str) -> Result<Option<bool>> {
    env_string(name)
        .map(|raw| {
            parse_bool(&raw).ok_or_else(|| {
                Error::InvalidInput(format!("{name} must be a boolean, got {raw:?}"))
            })
        })
        .transpose()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Some(true),
        "false" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.port, 8080);
        assert!(!config.debug);
        assert!(config.db_path.is_none());
        assert!(config.jwt.hs256_secret.is_none());
        assert_eq!(config.jwt.user_claim, "sub");
        assert_eq!(config.cors.max_age_seconds, 3600);
        assert_eq!(config.webhook_timeout_secs, 10);
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        for raw in ["true", "TRUE", "1", "yes", "Y"] {
            assert_eq!(parse_bool(raw), Some(true), "raw={raw}");
        }
        for raw in ["false", "FALSE", "0", "no", "N"] {
            assert_eq!(parse_bool(raw), Some(false), "raw={raw}");
        }
        assert_eq!(parse_bool("on"), None);
        assert_eq!(parse_bool(""), None);
    }

    #[test]
    fn split_origins_trims_and_drops_empty_entries() {
        let origins = split_origins(" https://ci.example.com , ,https://ui.example.com,");
        assert_eq!(
            origins,
            vec![
                "https://ci.example.com".to_string(),
                "https://ui.example.com".to_string()
            ]
        );
    }

    #[test]
    fn jwt_debug_output_redacts_the_secret() {
        let jwt = JwtConfig {
            hs256_secret: Some("super-secret".to_string()),
            ..JwtConfig::default()
        };
        let rendered = format!("{jwt:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
