//! Authentication domain models.
//!
//! Principals are owned by an external directory; the types here are read
//! views of them plus the artifacts minted for a session.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Profile attributes carried into access tokens for downstream consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileAttributes {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub employee_number: String,
    /// Organizational unit.
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub title: String,
}

/// An authenticated identity with its current role memberships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Stable identifier.
    pub id: String,
    /// Display / login name.
    pub user_name: String,
    #[serde(default)]
    pub profile: ProfileAttributes,
    /// Role names. Roles themselves live in the role registry.
    #[serde(default)]
    pub roles: BTreeSet<String>,
}

/// Identity and authorization claims embedded in an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimSet {
    /// Subject (principal ID).
    pub sub: String,
    /// Principal user name.
    pub name: String,
    #[serde(flatten)]
    pub profile: ProfileAttributes,
    /// One entry per role, sorted.
    #[serde(default)]
    pub roles: Vec<String>,
    /// Unique token identifier.
    pub jti: String,
}

/// Full payload of a signed access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    #[serde(flatten)]
    pub claims: ClaimSet,
    pub iss: String,
    pub aud: String,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiry (unix timestamp).
    pub exp: i64,
}

/// Claims recovered from a token that passed verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifiedToken {
    pub claims: ClaimSet,
    pub issuer: String,
    pub audience: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

/// An opaque renewal credential handed to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Refresh token record as persisted against a principal.
///
/// `token_hash` is the SHA-256 of the plaintext token; `expires_at` is
/// RFC 3339 text with nanosecond precision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRefreshToken {
    pub token_hash: String,
    pub expires_at: String,
}

/// Access/refresh pair returned by login and renewal.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub refresh_token_expiration: DateTime<Utc>,
}

/// A role known to the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
}
