//! JWT access token signing and verification.
//!
//! Tokens are HS256 only. Anything signed with another algorithm, including
//! `none`, is rejected before the signature is looked at.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::Deserialize;
use tracing::debug;

use super::{AuthError, TokenError};
use crate::config::AuthConfig;
use crate::models::auth::{AccessTokenClaims, ClaimSet, VerifiedToken};

/// The single accepted signing algorithm.
pub const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// Whether verification checks the `exp` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    Enforce,
    /// Accept expired tokens; used when a renewal proves prior authentication.
    Ignore,
}

/// Signs and verifies access tokens for one issuer/audience pair.
#[derive(Clone)]
pub struct AccessTokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl AccessTokenCodec {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.signing_secret.as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            ttl: config.access_token_ttl,
        }
    }

    /// Sign `claims` into a compact token expiring after the configured lifetime.
    pub fn sign(&self, claims: &ClaimSet) -> Result<String, AuthError> {
        self.sign_at(claims, Utc::now())
    }

    pub(crate) fn sign_at(
        &self,
        claims: &ClaimSet,
        issued_at: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let expires_at = issued_at
            .checked_add_signed(self.ttl)
            .ok_or_else(|| AuthError::Configuration("access token lifetime overflows".into()))?;
        let payload = AccessTokenClaims {
            claims: claims.clone(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = encode(&Header::new(SIGNING_ALGORITHM), &payload, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))?;
        debug!(sub = %claims.sub, jti = %claims.jti, exp = payload.exp, "signed access token");
        Ok(token)
    }

    /// Verify signature, algorithm, issuer and audience, and optionally expiry.
    pub fn verify(&self, token: &str, lifetime: Lifetime) -> Result<VerifiedToken, TokenError> {
        let alg = header_algorithm(token)?;
        if alg != "HS256" {
            return Err(TokenError::AlgorithmMismatch(alg));
        }

        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.leeway = 0;
        validation.validate_exp = lifetime == Lifetime::Enforce;

        let data = decode::<AccessTokenClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| map_jwt_error(e.kind()))?;
        let payload = data.claims;
        Ok(VerifiedToken {
            claims: payload.claims,
            issuer: payload.iss,
            audience: payload.aud,
            issued_at: payload.iat,
            expires_at: payload.exp,
        })
    }
}

#[derive(Deserialize)]
struct RawHeader {
    alg: String,
}

/// Read the `alg` field of the token header without trusting anything else.
fn header_algorithm(token: &str) -> Result<String, TokenError> {
    let mut parts = token.split('.');
    let (Some(header), Some(_), Some(_), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(TokenError::Malformed("expected three segments".into()));
    };
    let bytes = URL_SAFE_NO_PAD
        .decode(header)
        .map_err(|e| TokenError::Malformed(format!("header encoding: {e}")))?;
    let raw: RawHeader = serde_json::from_slice(&bytes)
        .map_err(|e| TokenError::Malformed(format!("header json: {e}")))?;
    Ok(raw.alg)
}

fn map_jwt_error(kind: &ErrorKind) -> TokenError {
    match kind {
        ErrorKind::InvalidSignature => TokenError::InvalidSignature,
        ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
            TokenError::AlgorithmMismatch("rejected by validator".into())
        }
        ErrorKind::InvalidIssuer | ErrorKind::InvalidAudience => {
            TokenError::InvalidIssuerOrAudience
        }
        ErrorKind::MissingRequiredClaim(claim) if claim == "iss" || claim == "aud" => {
            TokenError::InvalidIssuerOrAudience
        }
        ErrorKind::ExpiredSignature => TokenError::Expired,
        other => TokenError::Malformed(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::auth::ProfileAttributes;

    fn config() -> AuthConfig {
        AuthConfig {
            issuer: "authapi".into(),
            audience: "authapi-clients".into(),
            signing_secret: "a-test-secret-that-is-long-enough-for-hs256".into(),
            access_token_ttl: Duration::minutes(15),
            refresh_token_ttl: Duration::days(7),
        }
    }

    fn claims() -> ClaimSet {
        ClaimSet {
            sub: "p-1".into(),
            name: "alice".into(),
            profile: ProfileAttributes {
                full_name: "Alice Example".into(),
                unit: "Finance".into(),
                title: "Analyst".into(),
                ..Default::default()
            },
            roles: vec!["Admin".into(), "User".into()],
            jti: "jti-1".into(),
        }
    }

    fn b64(json: &str) -> String {
        URL_SAFE_NO_PAD.encode(json)
    }

    #[test]
    fn sign_then_verify_returns_same_claims() {
        let codec = AccessTokenCodec::new(&config());
        let token = codec.sign(&claims()).unwrap();
        let verified = codec.verify(&token, Lifetime::Enforce).unwrap();
        assert_eq!(verified.claims, claims());
        assert_eq!(verified.issuer, "authapi");
        assert_eq!(verified.audience, "authapi-clients");
        assert_eq!(verified.expires_at - verified.issued_at, 15 * 60);
    }

    #[test]
    fn token_has_three_segments_and_hs256_header() {
        let codec = AccessTokenCodec::new(&config());
        let token = codec.sign(&claims()).unwrap();
        assert_eq!(token.split('.').count(), 3);
        assert_eq!(header_algorithm(&token).unwrap(), "HS256");
    }

    #[test]
    fn altering_any_signature_character_is_rejected() {
        let codec = AccessTokenCodec::new(&config());
        let token = codec.sign(&claims()).unwrap();
        let sig_start = token.rfind('.').unwrap() + 1;

        for i in sig_start..token.len() {
            let mut bytes = token.clone().into_bytes();
            bytes[i] = if bytes[i] == b'A' { b'B' } else { b'A' };
            let tampered = String::from_utf8(bytes).unwrap();
            assert_eq!(
                codec.verify(&tampered, Lifetime::Enforce),
                Err(TokenError::InvalidSignature),
                "position {i}"
            );
        }
    }

    #[test]
    fn other_hmac_algorithm_is_rejected() {
        let cfg = config();
        let codec = AccessTokenCodec::new(&cfg);
        let now = Utc::now().timestamp();
        let payload = AccessTokenClaims {
            claims: claims(),
            iss: cfg.issuer.clone(),
            aud: cfg.audience.clone(),
            iat: now,
            exp: now + 600,
        };
        let token = encode(
            &Header::new(Algorithm::HS512),
            &payload,
            &EncodingKey::from_secret(cfg.signing_secret.as_bytes()),
        )
        .unwrap();
        assert_eq!(
            codec.verify(&token, Lifetime::Enforce),
            Err(TokenError::AlgorithmMismatch("HS512".into()))
        );
    }

    #[test]
    fn unsigned_none_token_is_rejected() {
        let codec = AccessTokenCodec::new(&config());
        let exp = Utc::now().timestamp() + 600;
        let token = format!(
            "{}.{}.",
            b64(r#"{"alg":"none","typ":"JWT"}"#),
            b64(&format!(
                r#"{{"sub":"p-1","name":"alice","roles":["Admin"],"jti":"x","iss":"authapi","aud":"authapi-clients","iat":0,"exp":{exp}}}"#
            ))
        );
        assert_eq!(
            codec.verify(&token, Lifetime::Ignore),
            Err(TokenError::AlgorithmMismatch("none".into()))
        );
    }

    #[test]
    fn expired_token_verifies_only_when_lifetime_ignored() {
        let codec = AccessTokenCodec::new(&config());
        let token = codec
            .sign_at(&claims(), Utc::now() - Duration::hours(2))
            .unwrap();

        assert_eq!(
            codec.verify(&token, Lifetime::Enforce),
            Err(TokenError::Expired)
        );
        let verified = codec.verify(&token, Lifetime::Ignore).unwrap();
        assert_eq!(verified.claims, claims());
    }

    #[test]
    fn wrong_issuer_or_audience_is_rejected() {
        let token = AccessTokenCodec::new(&config()).sign(&claims()).unwrap();

        let mut other_issuer = config();
        other_issuer.issuer = "someone-else".into();
        assert_eq!(
            AccessTokenCodec::new(&other_issuer).verify(&token, Lifetime::Ignore),
            Err(TokenError::InvalidIssuerOrAudience)
        );

        let mut other_audience = config();
        other_audience.audience = "another-app".into();
        assert_eq!(
            AccessTokenCodec::new(&other_audience).verify(&token, Lifetime::Ignore),
            Err(TokenError::InvalidIssuerOrAudience)
        );
    }

    #[test]
    fn wrong_secret_is_an_invalid_signature() {
        let token = AccessTokenCodec::new(&config()).sign(&claims()).unwrap();
        let mut other = config();
        other.signing_secret = "a-completely-different-signing-secret".into();
        assert_eq!(
            AccessTokenCodec::new(&other).verify(&token, Lifetime::Enforce),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn garbage_is_malformed() {
        let codec = AccessTokenCodec::new(&config());
        for token in ["", "abc", "a.b", "a.b.c.d", "!!!.e30.sig"] {
            assert!(
                matches!(
                    codec.verify(token, Lifetime::Ignore),
                    Err(TokenError::Malformed(_))
                ),
                "accepted {token:?}"
            );
        }
    }
}
