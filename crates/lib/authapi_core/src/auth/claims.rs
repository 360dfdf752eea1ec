//! Claim set construction for access tokens.

use uuid::Uuid;

use crate::models::auth::{ClaimSet, Principal};

/// Build the claims for `principal` from its identity fields and current roles.
///
/// Every call yields a fresh `jti`. No secret material is ever copied in.
pub fn build_claims(principal: &Principal) -> ClaimSet {
    ClaimSet {
        sub: principal.id.clone(),
        name: principal.user_name.clone(),
        profile: principal.profile.clone(),
        roles: principal.roles.iter().cloned().collect(),
        jti: Uuid::new_v4().to_string(),
    }
}
