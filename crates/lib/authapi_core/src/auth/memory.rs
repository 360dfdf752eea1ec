//! In-memory collaborator implementations.
//!
//! Backs principals, roles and refresh tokens with `DashMap`s. Used by tests
//! and by embedders that keep session state in-process.

use std::collections::BTreeSet;

use async_trait::async_trait;
use dashmap::DashMap;

use super::{AuthError, PrincipalDirectory, RoleRegistry, TokenStorage};
use crate::models::auth::{Principal, RoleDefinition, StoredRefreshToken};

#[derive(Debug, Clone)]
struct PrincipalRecord {
    principal: Principal,
    password_hash: Option<String>,
}

/// Principal directory, role registry and token storage held in memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    principals: DashMap<String, PrincipalRecord>,
    memberships: DashMap<String, BTreeSet<String>>,
    roles: DashMap<String, RoleDefinition>,
    refresh_tokens: DashMap<String, StoredRefreshToken>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a principal. Its `roles` become its memberships.
    pub fn insert_principal(&self, principal: Principal, password_hash: Option<String>) {
        self.memberships
            .insert(principal.id.clone(), principal.roles.clone());
        self.principals.insert(
            principal.id.clone(),
            PrincipalRecord {
                principal,
                password_hash,
            },
        );
    }

    /// Remove a principal together with its memberships and refresh token.
    pub fn remove_principal(&self, id: &str) {
        self.principals.remove(id);
        self.memberships.remove(id);
        self.refresh_tokens.remove(id);
    }

    /// Change a principal's user name.
    pub fn rename_principal(&self, id: &str, user_name: &str) {
        if let Some(mut record) = self.principals.get_mut(id) {
            record.principal.user_name = user_name.to_string();
        }
    }

    fn with_current_roles(&self, mut principal: Principal) -> Principal {
        principal.roles = self
            .memberships
            .get(&principal.id)
            .map(|roles| roles.value().clone())
            .unwrap_or_default();
        principal
    }
}

#[async_trait]
impl PrincipalDirectory for InMemoryStore {
    async fn find_by_name(&self, user_name: &str) -> Result<Option<Principal>, AuthError> {
        let found = self
            .principals
            .iter()
            .find(|entry| entry.principal.user_name == user_name)
            .map(|entry| entry.principal.clone());
        Ok(found.map(|p| self.with_current_roles(p)))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Principal>, AuthError> {
        let found = self.principals.get(id).map(|entry| entry.principal.clone());
        Ok(found.map(|p| self.with_current_roles(p)))
    }

    async fn password_hash(&self, id: &str) -> Result<Option<String>, AuthError> {
        Ok(self
            .principals
            .get(id)
            .and_then(|entry| entry.value().password_hash.clone()))
    }

    async fn principal_ids(&self) -> Result<Vec<String>, AuthError> {
        let mut named: Vec<(String, String)> = self
            .principals
            .iter()
            .map(|entry| (entry.principal.user_name.clone(), entry.key().clone()))
            .collect();
        named.sort();
        Ok(named.into_iter().map(|(_, id)| id).collect())
    }

    async fn delete_principal(&self, id: &str) -> Result<(), AuthError> {
        self.principals.remove(id);
        self.memberships.remove(id);
        Ok(())
    }
}

#[async_trait]
impl TokenStorage for InMemoryStore {
    async fn load(&self, principal_id: &str) -> Result<Option<StoredRefreshToken>, AuthError> {
        Ok(self
            .refresh_tokens
            .get(principal_id)
            .map(|entry| entry.value().clone()))
    }

    async fn save(&self, principal_id: &str, record: StoredRefreshToken) -> Result<(), AuthError> {
        self.refresh_tokens.insert(principal_id.to_string(), record);
        Ok(())
    }

    async fn remove(&self, principal_id: &str) -> Result<(), AuthError> {
        self.refresh_tokens.remove(principal_id);
        Ok(())
    }
}

#[async_trait]
impl RoleRegistry for InMemoryStore {
    async fn role_exists(&self, name: &str) -> Result<bool, AuthError> {
        Ok(self.roles.contains_key(name))
    }

    async fn list_roles(&self) -> Result<Vec<RoleDefinition>, AuthError> {
        let mut roles: Vec<RoleDefinition> =
            self.roles.iter().map(|entry| entry.value().clone()).collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn create_role(&self, role: &RoleDefinition) -> Result<(), AuthError> {
        if self.roles.contains_key(&role.name) {
            return Err(AuthError::RoleExists(role.name.clone()));
        }
        self.roles.insert(role.name.clone(), role.clone());
        Ok(())
    }

    async fn delete_role(&self, name: &str) -> Result<(), AuthError> {
        self.roles
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| AuthError::RoleNotFound(name.to_string()))
    }

    async fn roles_of(&self, principal_id: &str) -> Result<Vec<String>, AuthError> {
        Ok(self
            .memberships
            .get(principal_id)
            .map(|roles| roles.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn add_roles(&self, principal_id: &str, roles: &[String]) -> Result<(), AuthError> {
        if !self.principals.contains_key(principal_id) {
            return Err(AuthError::PrincipalNotFound);
        }
        self.memberships
            .entry(principal_id.to_string())
            .or_default()
            .extend(roles.iter().cloned());
        Ok(())
    }

    async fn remove_roles(&self, principal_id: &str, roles: &[String]) -> Result<(), AuthError> {
        if let Some(mut current) = self.memberships.get_mut(principal_id) {
            for role in roles {
                current.remove(role);
            }
        }
        Ok(())
    }

    async fn principals_in_role(&self, role: &str) -> Result<Vec<String>, AuthError> {
        let mut ids: Vec<String> = self
            .memberships
            .iter()
            .filter(|entry| entry.value().contains(role))
            .map(|entry| entry.key().clone())
            .collect();
        ids.sort();
        Ok(ids)
    }
}
