use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{}", .0)]
    Custom(String),

    #[error("{}", .0)]
    Auth(#[from] authapi_core::auth::AuthError),

    #[error("Json::{}", .0)]
    Json(#[from] serde_json::Error),

    #[error("Database::{}", .0)]
    Db(#[from] sqlx::Error),

    #[error("Migrate::{}", .0)]
    Migrate(#[from] sqlx::migrate::MigrateError),
}
