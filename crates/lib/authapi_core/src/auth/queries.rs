//! PostgreSQL-backed collaborators.
//!
//! `PgStore` implements the principal directory, refresh token storage and
//! role registry over the tables created by the embedded migrations.

use async_trait::async_trait;
use sqlx::PgPool;

use super::{AuthError, PrincipalDirectory, RoleRegistry, TokenStorage};
use crate::models::auth::{Principal, ProfileAttributes, RoleDefinition, StoredRefreshToken};

type PrincipalRow = (String, String, String, String, String, String);

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the schema under `authapi_core/migrations/`.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    /// Create a principal, returning its ID.
    pub async fn create_principal(
        &self,
        user_name: &str,
        email: Option<&str>,
        password_hash: &str,
        profile: &ProfileAttributes,
    ) -> Result<String, AuthError> {
        let id = sqlx::query_scalar::<_, String>(
            "INSERT INTO principals \
             (user_name, email, password_hash, full_name, employee_number, unit, title) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id::text",
        )
        .bind(user_name)
        .bind(email)
        .bind(password_hash)
        .bind(&profile.full_name)
        .bind(&profile.employee_number)
        .bind(&profile.unit)
        .bind(&profile.title)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    /// Check whether a user name is already taken.
    pub async fn user_name_exists(&self, user_name: &str) -> Result<bool, AuthError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM principals WHERE user_name = $1)",
        )
        .bind(user_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn hydrate(&self, row: Option<PrincipalRow>) -> Result<Option<Principal>, AuthError> {
        let Some((id, user_name, full_name, employee_number, unit, title)) = row else {
            return Ok(None);
        };
        let roles = self.roles_of(&id).await?;
        Ok(Some(Principal {
            id,
            user_name,
            profile: ProfileAttributes {
                full_name,
                employee_number,
                unit,
                title,
            },
            roles: roles.into_iter().collect(),
        }))
    }
}

#[async_trait]
impl PrincipalDirectory for PgStore {
    async fn find_by_name(&self, user_name: &str) -> Result<Option<Principal>, AuthError> {
        let row = sqlx::query_as::<_, PrincipalRow>(
            "SELECT id::text, user_name, full_name, employee_number, unit, title \
             FROM principals WHERE user_name = $1",
        )
        .bind(user_name)
        .fetch_optional(&self.pool)
        .await?;
        self.hydrate(row).await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Principal>, AuthError> {
        let row = sqlx::query_as::<_, PrincipalRow>(
            "SELECT id::text, user_name, full_name, employee_number, unit, title \
             FROM principals WHERE id = $1::uuid",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        self.hydrate(row).await
    }

    async fn password_hash(&self, id: &str) -> Result<Option<String>, AuthError> {
        let hash = sqlx::query_scalar::<_, Option<String>>(
            "SELECT password_hash FROM principals WHERE id = $1::uuid",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(hash.flatten())
    }

    async fn principal_ids(&self) -> Result<Vec<String>, AuthError> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT id::text FROM principals ORDER BY user_name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn delete_principal(&self, id: &str) -> Result<(), AuthError> {
        sqlx::query("DELETE FROM principals WHERE id = $1::uuid")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl TokenStorage for PgStore {
    async fn load(&self, principal_id: &str) -> Result<Option<StoredRefreshToken>, AuthError> {
        let row = sqlx::query_as::<_, (String, String)>(
            "SELECT token_hash, expires_at FROM principal_refresh_tokens \
             WHERE principal_id = $1::uuid",
        )
        .bind(principal_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(token_hash, expires_at)| StoredRefreshToken {
            token_hash,
            expires_at,
        }))
    }

    async fn save(&self, principal_id: &str, record: StoredRefreshToken) -> Result<(), AuthError> {
        sqlx::query(
            "INSERT INTO principal_refresh_tokens (principal_id, token_hash, expires_at) \
             VALUES ($1::uuid, $2, $3) \
             ON CONFLICT (principal_id) DO UPDATE \
             SET token_hash = EXCLUDED.token_hash, \
                 expires_at = EXCLUDED.expires_at, \
                 updated_at = now()",
        )
        .bind(principal_id)
        .bind(&record.token_hash)
        .bind(&record.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, principal_id: &str) -> Result<(), AuthError> {
        sqlx::query("DELETE FROM principal_refresh_tokens WHERE principal_id = $1::uuid")
            .bind(principal_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RoleRegistry for PgStore {
    async fn role_exists(&self, name: &str) -> Result<bool, AuthError> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM roles WHERE name = $1)")
                .bind(name)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn list_roles(&self) -> Result<Vec<RoleDefinition>, AuthError> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT name, description FROM roles ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(name, description)| RoleDefinition { name, description })
            .collect())
    }

    async fn create_role(&self, role: &RoleDefinition) -> Result<(), AuthError> {
        let inserted = sqlx::query(
            "INSERT INTO roles (name, description) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING",
        )
        .bind(&role.name)
        .bind(&role.description)
        .execute(&self.pool)
        .await?;
        if inserted.rows_affected() == 0 {
            return Err(AuthError::RoleExists(role.name.clone()));
        }
        Ok(())
    }

    async fn delete_role(&self, name: &str) -> Result<(), AuthError> {
        let deleted = sqlx::query("DELETE FROM roles WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(AuthError::RoleNotFound(name.to_string()));
        }
        Ok(())
    }

    async fn roles_of(&self, principal_id: &str) -> Result<Vec<String>, AuthError> {
        let rows = sqlx::query_scalar::<_, String>(
            "SELECT role_name FROM principal_roles WHERE principal_id = $1::uuid ORDER BY role_name",
        )
        .bind(principal_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn add_roles(&self, principal_id: &str, roles: &[String]) -> Result<(), AuthError> {
        let mut tx = self.pool.begin().await?;
        for role in roles {
            sqlx::query(
                "INSERT INTO principal_roles (principal_id, role_name) VALUES ($1::uuid, $2) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(principal_id)
            .bind(role)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn remove_roles(&self, principal_id: &str, roles: &[String]) -> Result<(), AuthError> {
        sqlx::query(
            "DELETE FROM principal_roles WHERE principal_id = $1::uuid AND role_name = ANY($2)",
        )
        .bind(principal_id)
        .bind(roles.to_vec())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn principals_in_role(&self, role: &str) -> Result<Vec<String>, AuthError> {
        let rows = sqlx::query_scalar::<_, String>(
            "SELECT principal_id::text FROM principal_roles WHERE role_name = $1 \
             ORDER BY principal_id",
        )
        .bind(role)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
