//! Session issuance: login and access-token renewal.

use std::sync::Arc;

use tracing::{info, warn};

use super::claims::build_claims;
use super::jwt::{AccessTokenCodec, Lifetime};
use super::password::verify_password;
use super::refresh::RefreshTokenStore;
use super::{AuthError, PrincipalDirectory, TokenError, TokenStorage};
use crate::config::AuthConfig;
use crate::models::auth::{Principal, SessionTokens, VerifiedToken};

/// Issues access/refresh pairs and renews them.
#[derive(Clone)]
pub struct SessionIssuer {
    directory: Arc<dyn PrincipalDirectory>,
    codec: AccessTokenCodec,
    refresh_tokens: RefreshTokenStore,
}

impl SessionIssuer {
    pub fn new(
        config: &AuthConfig,
        directory: Arc<dyn PrincipalDirectory>,
        storage: Arc<dyn TokenStorage>,
    ) -> Self {
        Self {
            directory,
            codec: AccessTokenCodec::new(config),
            refresh_tokens: RefreshTokenStore::new(storage, config.refresh_token_ttl),
        }
    }

    pub fn codec(&self) -> &AccessTokenCodec {
        &self.codec
    }

    pub fn refresh_tokens(&self) -> &RefreshTokenStore {
        &self.refresh_tokens
    }

    /// Check a user name and password, then log the principal in.
    ///
    /// Unknown users, principals without a password and wrong passwords all
    /// fail with the same `InvalidCredentials`.
    pub async fn authenticate(
        &self,
        user_name: &str,
        password: &str,
    ) -> Result<SessionTokens, AuthError> {
        let Some(principal) = self.directory.find_by_name(user_name).await? else {
            warn!("login denied: invalid credentials");
            return Err(AuthError::InvalidCredentials);
        };
        let hash = self.directory.password_hash(&principal.id).await?;
        if !hash.is_some_and(|h| verify_password(password, &h)) {
            warn!("login denied: invalid credentials");
            return Err(AuthError::InvalidCredentials);
        }
        self.login(&principal).await
    }

    /// Issue a token pair for an already-authenticated principal.
    pub async fn login(&self, principal: &Principal) -> Result<SessionTokens, AuthError> {
        let access_token = self.issue_access_token(principal)?;
        let refresh = self.refresh_tokens.generate(principal).await?;
        info!(principal_id = %principal.id, "session issued");
        Ok(SessionTokens {
            access_token,
            refresh_token: refresh.token,
            refresh_token_expiration: refresh.expires_at,
        })
    }

    /// Exchange a (possibly expired) access token and its refresh token for a
    /// new pair. Roles are re-read, so role changes apply from here on.
    pub async fn renew(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<SessionTokens, AuthError> {
        let verified = self
            .codec
            .verify(access_token, Lifetime::Ignore)
            .map_err(|e| {
                warn!(reason = %e, "renewal denied: invalid access token");
                AuthError::InvalidAccessToken(e)
            })?;

        let name = verified.claims.name.as_str();
        if name.is_empty() {
            warn!("renewal denied: token carries no principal name");
            return Err(AuthError::InvalidAccessToken(TokenError::Malformed(
                "missing principal name".into(),
            )));
        }

        let Some(principal) = self.directory.find_by_name(name).await? else {
            warn!(sub = %verified.claims.sub, "renewal denied: principal not found");
            return Err(AuthError::PrincipalNotFound);
        };

        if !self.refresh_tokens.validate(&principal, refresh_token).await? {
            warn!(principal_id = %principal.id, "renewal denied: invalid refresh token");
            return Err(AuthError::InvalidRefreshToken);
        }

        let tokens = self.login(&principal).await?;
        info!(principal_id = %principal.id, "session renewed");
        Ok(tokens)
    }

    /// Sign a fresh access token for `principal`.
    pub fn issue_access_token(&self, principal: &Principal) -> Result<String, AuthError> {
        self.codec.sign(&build_claims(principal))
    }

    /// Verify an access token, optionally accepting expired ones.
    pub fn verify_access_token(
        &self,
        token: &str,
        lifetime: Lifetime,
    ) -> Result<VerifiedToken, AuthError> {
        Ok(self.codec.verify(token, lifetime)?)
    }

    /// End the principal's session by dropping its refresh token.
    pub async fn logout(&self, principal: &Principal) -> Result<(), AuthError> {
        self.refresh_tokens.revoke(principal).await?;
        info!(principal_id = %principal.id, "session revoked");
        Ok(())
    }
}
