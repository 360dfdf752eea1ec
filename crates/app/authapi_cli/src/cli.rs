use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Issue, renew and verify session tokens; manage role assignments.
#[derive(Parser, Debug)]
#[command(name = "authapi", version, about)]
pub struct Cli {
    /// YAML settings file with a `jwt` section.
    #[arg(long, global = true, env = "AUTHAPI_CONFIG", default_value = "authapi.yaml")]
    pub config: PathBuf,

    /// PostgreSQL connection URL.
    #[arg(
        long,
        global = true,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/authapi"
    )]
    pub database_url: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run embedded database migrations.
    Migrate,

    /// Create a principal with a password and the `User` role.
    Register {
        #[arg(long)]
        user: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long, default_value = "")]
        full_name: String,
        #[arg(long, default_value = "")]
        employee_number: String,
        #[arg(long, default_value = "")]
        unit: String,
        #[arg(long, default_value = "")]
        title: String,
    },

    /// Authenticate and print a new access/refresh token pair.
    Login {
        #[arg(long)]
        user: String,
        #[arg(long)]
        password: String,
    },

    /// Exchange an access token and its refresh token for a new pair.
    Renew {
        #[arg(long)]
        access_token: String,
        #[arg(long)]
        refresh_token: String,
    },

    /// Verify an access token and print its claims.
    Verify {
        #[arg(long)]
        token: String,
        /// Accept tokens whose expiry has passed.
        #[arg(long, default_value_t = false)]
        ignore_lifetime: bool,
    },

    /// Print the roles to add and remove between two assignments.
    RoleDiff {
        #[arg(long, value_delimiter = ',', num_args = 0..)]
        current: Vec<String>,
        #[arg(long, value_delimiter = ',', num_args = 0..)]
        desired: Vec<String>,
    },

    /// Replace a principal's roles.
    AssignRoles {
        #[arg(long)]
        user: String,
        #[arg(long, value_delimiter = ',', num_args = 0..)]
        roles: Vec<String>,
    },

    /// Create a role (name is normalized to PascalCase).
    CreateRole {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },

    /// Delete a role and remove it from every principal.
    DeleteRole {
        #[arg(long)]
        name: String,
    },

    /// List all roles, or the roles of one principal.
    Roles {
        #[arg(long)]
        user: Option<String>,
    },

    /// List every principal with its roles.
    Users,

    /// Delete a principal with its role memberships and refresh token.
    DeleteUser {
        #[arg(long)]
        user: String,
    },

    /// List protected operations and the roles they require.
    Operations,
}
