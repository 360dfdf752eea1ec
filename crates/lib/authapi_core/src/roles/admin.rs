//! Administrative role management.
//!
//! Validates requests against the role registry before touching any
//! membership, and reports exactly which roles failed to apply.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::compute_role_delta;
use crate::auth::operations::ADMIN_ROLE;
use crate::auth::{AuthError, PrincipalDirectory, RoleRegistry, RoleUpdateStage, TokenStorage};
use crate::models::auth::{Principal, RoleDefinition};

/// Result of an assignment request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum RoleAssignmentOutcome {
    /// Current roles already matched; nothing was written.
    Unchanged,
    Updated {
        added: Vec<String>,
        removed: Vec<String>,
    },
}

pub struct RoleAdministration {
    registry: Arc<dyn RoleRegistry>,
    directory: Arc<dyn PrincipalDirectory>,
    tokens: Arc<dyn TokenStorage>,
}

impl RoleAdministration {
    pub fn new(
        registry: Arc<dyn RoleRegistry>,
        directory: Arc<dyn PrincipalDirectory>,
        tokens: Arc<dyn TokenStorage>,
    ) -> Self {
        Self {
            registry,
            directory,
            tokens,
        }
    }

    async fn principal(&self, user_name: &str) -> Result<Principal, AuthError> {
        self.directory
            .find_by_name(user_name)
            .await?
            .ok_or(AuthError::PrincipalNotFound)
    }

    /// Replace a principal's roles with `desired`.
    ///
    /// Every desired role must exist or nothing is applied. Removal runs
    /// before addition; a failed removal stops the request.
    pub async fn assign_roles(
        &self,
        user_name: &str,
        desired: &[String],
    ) -> Result<RoleAssignmentOutcome, AuthError> {
        let principal = self.principal(user_name).await?;

        for role in desired {
            if !self.registry.role_exists(role).await? {
                warn!(role = %role, user_name, "role assignment rejected: unknown role");
                return Err(AuthError::RoleNotFound(role.clone()));
            }
        }

        let current = self.registry.roles_of(&principal.id).await?;
        let delta = compute_role_delta(&current, desired);
        if delta.is_noop() {
            info!(user_name, "role assignment unchanged");
            return Ok(RoleAssignmentOutcome::Unchanged);
        }

        let removed: Vec<String> = delta.to_remove.into_iter().collect();
        let added: Vec<String> = delta.to_add.into_iter().collect();

        if !removed.is_empty() {
            self.registry
                .remove_roles(&principal.id, &removed)
                .await
                .map_err(|e| AuthError::RoleUpdate {
                    stage: RoleUpdateStage::Remove,
                    roles: removed.clone(),
                    reason: e.to_string(),
                })?;
        }
        if !added.is_empty() {
            self.registry
                .add_roles(&principal.id, &added)
                .await
                .map_err(|e| AuthError::RoleUpdate {
                    stage: RoleUpdateStage::Add,
                    roles: added.clone(),
                    reason: e.to_string(),
                })?;
        }

        info!(user_name, ?added, ?removed, "roles updated");
        Ok(RoleAssignmentOutcome::Updated { added, removed })
    }

    /// Create a role. The name is normalized to PascalCase.
    pub async fn create_role(
        &self,
        name: &str,
        description: &str,
    ) -> Result<RoleDefinition, AuthError> {
        let name = to_pascal_case(name);
        if name.is_empty() {
            return Err(AuthError::Validation("role name must not be empty".into()));
        }
        if self.registry.role_exists(&name).await? {
            return Err(AuthError::RoleExists(name));
        }
        let role = RoleDefinition {
            name,
            description: description.to_string(),
        };
        self.registry.create_role(&role).await?;
        info!(role = %role.name, "role created");
        Ok(role)
    }

    /// Delete a role after removing it from every principal. `Admin` is kept.
    pub async fn delete_role(&self, name: &str) -> Result<(), AuthError> {
        if name == ADMIN_ROLE {
            return Err(AuthError::ProtectedRole(name.to_string()));
        }
        if !self.registry.role_exists(name).await? {
            return Err(AuthError::RoleNotFound(name.to_string()));
        }
        let role = [name.to_string()];
        for principal_id in self.registry.principals_in_role(name).await? {
            self.registry.remove_roles(&principal_id, &role).await?;
        }
        self.registry.delete_role(name).await?;
        info!(role = name, "role deleted");
        Ok(())
    }

    /// Every principal with its current roles, ordered by user name.
    pub async fn list_principals(&self) -> Result<Vec<Principal>, AuthError> {
        let mut principals = Vec::new();
        for id in self.directory.principal_ids().await? {
            // Skip principals deleted between listing and lookup.
            if let Some(principal) = self.directory.find_by_id(&id).await? {
                principals.push(principal);
            }
        }
        Ok(principals)
    }

    /// Delete a principal.
    ///
    /// Memberships go first, then the stored refresh token, then the record.
    /// A failed membership removal leaves the principal and its token intact.
    pub async fn delete_principal(&self, user_name: &str) -> Result<(), AuthError> {
        let principal = self.principal(user_name).await?;

        let held = self.registry.roles_of(&principal.id).await?;
        if !held.is_empty() {
            self.registry
                .remove_roles(&principal.id, &held)
                .await
                .map_err(|e| AuthError::RoleUpdate {
                    stage: RoleUpdateStage::Remove,
                    roles: held.clone(),
                    reason: e.to_string(),
                })?;
        }
        self.tokens.remove(&principal.id).await?;
        self.directory.delete_principal(&principal.id).await?;

        info!(user_name, "principal deleted");
        Ok(())
    }

    pub async fn list_roles(&self) -> Result<Vec<RoleDefinition>, AuthError> {
        self.registry.list_roles().await
    }

    /// Definitions of the roles `user_name` currently holds.
    pub async fn roles_of(&self, user_name: &str) -> Result<Vec<RoleDefinition>, AuthError> {
        let principal = self.principal(user_name).await?;
        let held = self.registry.roles_of(&principal.id).await?;
        Ok(self
            .registry
            .list_roles()
            .await?
            .into_iter()
            .filter(|role| held.contains(&role.name))
            .collect())
    }
}

/// `"report viewer"`, `"report_viewer"` and `"REPORT-VIEWER"` all become `"ReportViewer"`.
pub fn to_pascal_case(input: &str) -> String {
    input
        .split([' ', '_', '-'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}
