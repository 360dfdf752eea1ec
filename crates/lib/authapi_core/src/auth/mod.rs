//! Authentication and authorization logic.
//!
//! Access-token signing and verification, refresh-token storage, session
//! issuance and renewal, and the collaborator traits the core consumes.

pub mod claims;
pub mod jwt;
pub mod memory;
pub mod operations;
pub mod password;
pub mod queries;
pub mod refresh;
pub mod session;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::auth::{Principal, RoleDefinition, StoredRefreshToken};

/// Reasons an access token fails verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Unexpected signing algorithm: {0}")]
    AlgorithmMismatch(String),

    #[error("Invalid token issuer or audience")]
    InvalidIssuerOrAudience,

    #[error("Token has expired")]
    Expired,

    #[error("Malformed token: {0}")]
    Malformed(String),
}

/// Which half of a role assignment failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleUpdateStage {
    Remove,
    Add,
}

impl std::fmt::Display for RoleUpdateStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoleUpdateStage::Remove => f.write_str("remove"),
            RoleUpdateStage::Add => f.write_str("add"),
        }
    }
}

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid access token: {0}")]
    InvalidAccessToken(TokenError),

    #[error("Principal not found")]
    PrincipalNotFound,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Role '{0}' not found")]
    RoleNotFound(String),

    #[error("Role '{0}' already exists")]
    RoleExists(String),

    #[error("Role '{0}' cannot be deleted")]
    ProtectedRole(String),

    #[error("Failed to {stage} roles [{}]: {reason}", roles.join(", "))]
    RoleUpdate {
        stage: RoleUpdateStage,
        roles: Vec<String>,
        reason: String,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Read access to the principals managed by user administration.
#[async_trait]
pub trait PrincipalDirectory: Send + Sync {
    /// Look up a principal by user name, with its current roles.
    async fn find_by_name(&self, user_name: &str) -> Result<Option<Principal>, AuthError>;

    /// Look up a principal by stable identifier, with its current roles.
    async fn find_by_id(&self, id: &str) -> Result<Option<Principal>, AuthError>;

    /// Stored password hash, if the principal has one.
    async fn password_hash(&self, id: &str) -> Result<Option<String>, AuthError>;

    /// IDs of every principal, ordered by user name.
    async fn principal_ids(&self) -> Result<Vec<String>, AuthError>;

    /// Delete the principal record. Deleting an unknown ID is not an error.
    async fn delete_principal(&self, id: &str) -> Result<(), AuthError>;
}

/// Durable storage for the single refresh token of each principal.
#[async_trait]
pub trait TokenStorage: Send + Sync {
    async fn load(&self, principal_id: &str) -> Result<Option<StoredRefreshToken>, AuthError>;

    /// Store `record`, replacing whatever was stored for the principal.
    async fn save(&self, principal_id: &str, record: StoredRefreshToken) -> Result<(), AuthError>;

    async fn remove(&self, principal_id: &str) -> Result<(), AuthError>;
}

/// The role registry and role memberships.
#[async_trait]
pub trait RoleRegistry: Send + Sync {
    async fn role_exists(&self, name: &str) -> Result<bool, AuthError>;

    async fn list_roles(&self) -> Result<Vec<RoleDefinition>, AuthError>;

    async fn create_role(&self, role: &RoleDefinition) -> Result<(), AuthError>;

    async fn delete_role(&self, name: &str) -> Result<(), AuthError>;

    async fn roles_of(&self, principal_id: &str) -> Result<Vec<String>, AuthError>;

    async fn add_roles(&self, principal_id: &str, roles: &[String]) -> Result<(), AuthError>;

    async fn remove_roles(&self, principal_id: &str, roles: &[String]) -> Result<(), AuthError>;

    /// IDs of every principal holding `role`.
    async fn principals_in_role(&self, role: &str) -> Result<Vec<String>, AuthError>;
}
