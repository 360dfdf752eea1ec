//! Subcommand execution.

use std::sync::Arc;
use std::time::Duration;

use authapi_core::auth::jwt::{AccessTokenCodec, Lifetime};
use authapi_core::auth::operations::OperationTable;
use authapi_core::auth::password::hash_password;
use authapi_core::auth::queries::PgStore;
use authapi_core::auth::session::SessionIssuer;
use authapi_core::auth::{AuthError, RoleRegistry};
use authapi_core::config::AuthConfig;
use authapi_core::models::auth::{ProfileAttributes, RoleDefinition};
use authapi_core::roles::admin::RoleAdministration;
use authapi_core::roles::compute_role_delta;
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::cli::{Cli, Commands};
use crate::{Error, Result};

/// Role every registered principal starts with.
const DEFAULT_ROLE: &str = "User";

pub async fn run(args: Cli) -> Result<()> {
    match args.command {
        Commands::RoleDiff { current, desired } => {
            let delta = compute_role_delta(&current, &desired);
            print_json(&serde_json::json!({
                "toAdd": delta.to_add,
                "toRemove": delta.to_remove,
                "noop": delta.is_noop(),
            }))
        }
        Commands::Operations => print_json(OperationTable::builtin().list()),
        Commands::Verify {
            token,
            ignore_lifetime,
        } => {
            let config = AuthConfig::load(&args.config)?;
            let codec = AccessTokenCodec::new(&config);
            let lifetime = if ignore_lifetime {
                Lifetime::Ignore
            } else {
                Lifetime::Enforce
            };
            let verified = codec.verify(&token, lifetime).map_err(AuthError::from)?;
            print_json(&verified)
        }
        Commands::Migrate => {
            let store = connect(&args.database_url).await?;
            info!("running database migrations");
            store.migrate().await?;
            print_json(&serde_json::json!({ "migrated": true }))
        }
        Commands::Register {
            user,
            password,
            email,
            full_name,
            employee_number,
            unit,
            title,
        } => {
            let store = connect(&args.database_url).await?;
            if store.user_name_exists(&user).await? {
                return Err(Error::Custom(format!("user '{user}' already exists")));
            }
            let profile = ProfileAttributes {
                full_name,
                employee_number,
                unit,
                title,
            };
            let id = store
                .create_principal(&user, email.as_deref(), &hash_password(&password)?, &profile)
                .await?;
            if !store.role_exists(DEFAULT_ROLE).await? {
                store
                    .create_role(&RoleDefinition {
                        name: DEFAULT_ROLE.to_string(),
                        description: String::new(),
                    })
                    .await?;
            }
            store.add_roles(&id, &[DEFAULT_ROLE.to_string()]).await?;
            info!(user = %user, "principal registered");
            print_json(&serde_json::json!({ "id": id }))
        }
        Commands::Login { user, password } => {
            let issuer = session_issuer(&args.config, &args.database_url).await?;
            print_json(&issuer.authenticate(&user, &password).await?)
        }
        Commands::Renew {
            access_token,
            refresh_token,
        } => {
            let issuer = session_issuer(&args.config, &args.database_url).await?;
            print_json(&issuer.renew(&access_token, &refresh_token).await?)
        }
        Commands::AssignRoles { user, roles } => {
            let admin = role_admin(&args.database_url).await?;
            print_json(&admin.assign_roles(&user, &roles).await?)
        }
        Commands::CreateRole { name, description } => {
            let admin = role_admin(&args.database_url).await?;
            print_json(&admin.create_role(&name, &description).await?)
        }
        Commands::DeleteRole { name } => {
            let admin = role_admin(&args.database_url).await?;
            admin.delete_role(&name).await?;
            print_json(&serde_json::json!({ "deleted": name }))
        }
        Commands::Users => {
            let admin = role_admin(&args.database_url).await?;
            print_json(&admin.list_principals().await?)
        }
        Commands::DeleteUser { user } => {
            let admin = role_admin(&args.database_url).await?;
            admin.delete_principal(&user).await?;
            print_json(&serde_json::json!({ "deleted": user }))
        }
        Commands::Roles { user } => {
            let admin = role_admin(&args.database_url).await?;
            let roles = match user {
                Some(user) => admin.roles_of(&user).await?,
                None => admin.list_roles().await?,
            };
            print_json(&roles)
        }
    }
}

async fn connect(database_url: &str) -> Result<PgStore> {
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .acquire_timeout(Duration::from_secs(30))
        .connect(database_url)
        .await?;
    Ok(PgStore::new(pool))
}

async fn session_issuer(
    config_path: &std::path::Path,
    database_url: &str,
) -> Result<SessionIssuer> {
    // Configuration problems surface before any connection is attempted.
    let config = AuthConfig::load(config_path)?;
    let store = Arc::new(connect(database_url).await?);
    Ok(SessionIssuer::new(&config, store.clone(), store))
}

async fn role_admin(database_url: &str) -> Result<RoleAdministration> {
    let store = Arc::new(connect(database_url).await?);
    Ok(RoleAdministration::new(store.clone(), store.clone(), store))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
