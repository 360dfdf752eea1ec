//! Refresh token generation and validation.
//!
//! Each principal has at most one live refresh token. Generating a new one
//! replaces the stored record, so the previous token stops validating at
//! once. Concurrent renewals for one principal race; the last write wins.

use std::sync::Arc;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use sha2::{Digest, Sha256};
use tracing::warn;

use super::{AuthError, TokenStorage};
use crate::models::auth::{Principal, RefreshToken, StoredRefreshToken};

/// Length of a generated refresh token (alphanumeric, ~380 bits).
const REFRESH_TOKEN_LEN: usize = 64;

/// Generate a cryptographically random refresh token.
fn generate_token() -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(REFRESH_TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// SHA-256 hash a refresh token for storage.
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Render an expiry in the stored, round-trip-safe format.
pub fn format_expiry(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parse a stored expiry. `None` means the record is unusable.
pub fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|at| at.with_timezone(&Utc))
}

/// Issues and checks the per-principal refresh token.
#[derive(Clone)]
pub struct RefreshTokenStore {
    storage: Arc<dyn TokenStorage>,
    ttl: Duration,
}

impl RefreshTokenStore {
    pub fn new(storage: Arc<dyn TokenStorage>, ttl: Duration) -> Self {
        Self { storage, ttl }
    }

    /// Generate a new refresh token, overwriting any stored for `principal`.
    pub async fn generate(&self, principal: &Principal) -> Result<RefreshToken, AuthError> {
        let expires_at = Utc::now().checked_add_signed(self.ttl).ok_or_else(|| {
            AuthError::Configuration("refresh token lifetime overflows".into())
        })?;
        let token = generate_token();
        let record = StoredRefreshToken {
            token_hash: hash_token(&token),
            expires_at: format_expiry(expires_at),
        };
        self.storage.save(&principal.id, record).await?;
        Ok(RefreshToken { token, expires_at })
    }

    /// True iff a token is stored for `principal`, equals `candidate`, and
    /// has not expired. An unreadable expiry counts as expired.
    pub async fn validate(&self, principal: &Principal, candidate: &str) -> Result<bool, AuthError> {
        let Some(stored) = self.storage.load(&principal.id).await? else {
            return Ok(false);
        };
        if candidate.is_empty() || stored.token_hash != hash_token(candidate) {
            return Ok(false);
        }
        match parse_expiry(&stored.expires_at) {
            Some(expires_at) => Ok(expires_at > Utc::now()),
            None => {
                warn!(principal_id = %principal.id, "stored refresh token expiry is unreadable");
                Ok(false)
            }
        }
    }

    /// Drop the stored token for `principal`.
    pub async fn revoke(&self, principal: &Principal) -> Result<(), AuthError> {
        self.storage.remove(&principal.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::memory::InMemoryStore;
    use crate::models::auth::ProfileAttributes;

    fn principal(id: &str) -> Principal {
        Principal {
            id: id.into(),
            user_name: format!("user-{id}"),
            profile: ProfileAttributes::default(),
            roles: Default::default(),
        }
    }

    fn store() -> (Arc<InMemoryStore>, RefreshTokenStore) {
        let backing = Arc::new(InMemoryStore::new());
        let store = RefreshTokenStore::new(backing.clone(), Duration::days(7));
        (backing, store)
    }

    #[test]
    fn generated_tokens_are_long_and_distinct() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), REFRESH_TOKEN_LEN);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[test]
    fn expiry_format_round_trips() {
        let now = Utc::now();
        assert_eq!(parse_expiry(&format_expiry(now)), Some(now));
        assert_eq!(parse_expiry("yesterday"), None);
    }

    #[tokio::test]
    async fn fresh_token_validates() {
        let (_, store) = store();
        let p = principal("p1");
        let issued = store.generate(&p).await.unwrap();
        assert!(issued.expires_at > Utc::now() + Duration::days(6));
        assert!(store.validate(&p, &issued.token).await.unwrap());
    }

    #[tokio::test]
    async fn unknown_principal_does_not_validate() {
        let (_, store) = store();
        let issued = store.generate(&principal("p1")).await.unwrap();
        assert!(!store.validate(&principal("p2"), &issued.token).await.unwrap());
    }

    #[tokio::test]
    async fn mismatched_token_does_not_validate() {
        let (_, store) = store();
        let p = principal("p1");
        store.generate(&p).await.unwrap();
        assert!(!store.validate(&p, "not-the-token").await.unwrap());
        assert!(!store.validate(&p, "").await.unwrap());
    }

    #[tokio::test]
    async fn expired_token_does_not_validate() {
        let (backing, store) = store();
        let p = principal("p1");
        backing
            .save(
                &p.id,
                StoredRefreshToken {
                    token_hash: hash_token("old"),
                    expires_at: format_expiry(Utc::now() - Duration::seconds(1)),
                },
            )
            .await
            .unwrap();
        assert!(!store.validate(&p, "old").await.unwrap());
    }

    #[tokio::test]
    async fn unparseable_expiry_fails_closed() {
        let (backing, store) = store();
        let p = principal("p1");
        backing
            .save(
                &p.id,
                StoredRefreshToken {
                    token_hash: hash_token("tok"),
                    expires_at: "12/31/2999 11:59 PM".into(),
                },
            )
            .await
            .unwrap();
        assert!(!store.validate(&p, "tok").await.unwrap());
    }

    #[tokio::test]
    async fn regenerating_supersedes_previous_token() {
        let (_, store) = store();
        let p = principal("p1");
        let first = store.generate(&p).await.unwrap();
        let second = store.generate(&p).await.unwrap();
        assert!(!store.validate(&p, &first.token).await.unwrap());
        assert!(store.validate(&p, &second.token).await.unwrap());
    }

    #[tokio::test]
    async fn revoke_removes_token() {
        let (_, store) = store();
        let p = principal("p1");
        let issued = store.generate(&p).await.unwrap();
        store.revoke(&p).await.unwrap();
        assert!(!store.validate(&p, &issued.token).await.unwrap());
    }
}
