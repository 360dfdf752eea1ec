//! Token configuration: settings file, secret resolution and validation.
//!
//! Built once at startup and handed to the codec and refresh store; nothing
//! here is read again at request time.

pub mod secret;

use std::path::Path;

use chrono::Duration;
use serde::Deserialize;

use crate::auth::AuthError;
pub use secret::{SecretProvider, default_providers, resolve_signing_secret};

/// Raw `jwt` settings as written in the settings file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JwtSettings {
    #[serde(default)]
    pub issuer: String,
    #[serde(default)]
    pub audience: String,
    /// Static signing key. `JWT_SECRET_KEY` overrides it.
    pub key: Option<String>,
    /// Access token lifetime in minutes.
    #[serde(default, deserialize_with = "number_or_string")]
    pub token_expiration: String,
    /// Refresh token lifetime in days.
    #[serde(default, deserialize_with = "number_or_string")]
    pub refresh_token_expiration: String,
}

/// Top-level settings file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub jwt: JwtSettings,
}

impl Settings {
    /// Read a YAML settings file.
    pub fn from_file(path: &Path) -> Result<Self, AuthError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AuthError::Configuration(format!("read {}: {e}", path.display()))
        })?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, AuthError> {
        serde_yaml::from_str(raw)
            .map_err(|e| AuthError::Configuration(format!("parse settings: {e}")))
    }
}

/// Validated token configuration.
#[derive(Clone)]
pub struct AuthConfig {
    pub issuer: String,
    pub audience: String,
    /// HMAC signing secret.
    pub signing_secret: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("signing_secret", &"<redacted>")
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .finish()
    }
}

impl AuthConfig {
    /// Validate raw settings, resolving the secret through `providers`.
    pub fn from_settings(
        settings: &JwtSettings,
        providers: &[SecretProvider],
    ) -> Result<Self, AuthError> {
        if settings.issuer.trim().is_empty() {
            return Err(AuthError::Configuration("jwt.issuer is required".into()));
        }
        if settings.audience.trim().is_empty() {
            return Err(AuthError::Configuration("jwt.audience is required".into()));
        }
        let access_token_ttl = parse_expiry_minutes(&settings.token_expiration)?;
        let refresh_token_ttl = parse_ttl_days(&settings.refresh_token_expiration)?;
        let signing_secret = resolve_signing_secret(providers)?;

        Ok(Self {
            issuer: settings.issuer.clone(),
            audience: settings.audience.clone(),
            signing_secret,
            access_token_ttl,
            refresh_token_ttl,
        })
    }

    /// Load a settings file and resolve it with the default secret providers.
    pub fn load(path: &Path) -> Result<Self, AuthError> {
        let settings = Settings::from_file(path)?;
        let providers = default_providers(settings.jwt.key.as_deref());
        Self::from_settings(&settings.jwt, &providers)
    }
}

/// Parse an access token lifetime given in (possibly fractional) minutes.
pub fn parse_expiry_minutes(raw: &str) -> Result<Duration, AuthError> {
    let minutes = parse_positive(raw, "jwt.tokenExpiration")?;
    Duration::try_milliseconds((minutes * 60_000.0).round() as i64)
        .filter(|ttl| *ttl > Duration::zero())
        .ok_or_else(|| AuthError::Configuration(format!("jwt.tokenExpiration out of range: {raw:?}")))
}

/// Parse a refresh token lifetime given in (possibly fractional) days.
pub fn parse_ttl_days(raw: &str) -> Result<Duration, AuthError> {
    let days = parse_positive(raw, "jwt.refreshTokenExpiration")?;
    Duration::try_seconds((days * 86_400.0).round() as i64)
        .filter(|ttl| *ttl > Duration::zero())
        .ok_or_else(|| {
            AuthError::Configuration(format!("jwt.refreshTokenExpiration out of range: {raw:?}"))
        })
}

fn parse_positive(raw: &str, field: &str) -> Result<f64, AuthError> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| AuthError::Configuration(format!("{field} is not a number: {raw:?}")))?;
    if !value.is_finite() || value <= 0.0 {
        return Err(AuthError::Configuration(format!(
            "{field} must be a positive number, got {raw:?}"
        )));
    }
    Ok(value)
}

/// Accept `15` and `"15"` alike for numeric settings.
fn number_or_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Float(f64),
        Text(String),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Int(n) => n.to_string(),
        Raw::Float(n) => n.to_string(),
        Raw::Text(s) => s,
    })
}
