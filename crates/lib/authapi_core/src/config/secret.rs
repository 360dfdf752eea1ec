//! Signing secret resolution. The environment overrides the static settings key.

use crate::auth::AuthError;

/// Environment variable that overrides the configured signing key.
pub const SECRET_ENV_VAR: &str = "JWT_SECRET_KEY";

/// One place a signing secret may come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretProvider {
    /// Read from the named environment variable.
    Env(String),
    /// A value taken from static configuration.
    Static(Option<String>),
}

impl SecretProvider {
    fn fetch(&self) -> Option<String> {
        match self {
            SecretProvider::Env(var) => std::env::var(var).ok(),
            SecretProvider::Static(value) => value.clone(),
        }
    }
}

/// Default provider order: `JWT_SECRET_KEY`, then the configured key.
pub fn default_providers(configured_key: Option<&str>) -> Vec<SecretProvider> {
    vec![
        SecretProvider::Env(SECRET_ENV_VAR.to_string()),
        SecretProvider::Static(configured_key.map(str::to_string)),
    ]
}

/// Resolve the signing secret. The first provider yielding a non-empty value wins.
pub fn resolve_signing_secret(providers: &[SecretProvider]) -> Result<String, AuthError> {
    providers
        .iter()
        .filter_map(SecretProvider::fetch)
        .find(|secret| !secret.trim().is_empty())
        .ok_or_else(|| {
            AuthError::Configuration(format!(
                "signing secret missing: set {SECRET_ENV_VAR} or jwt.key"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNSET_VAR: &str = "AUTHAPI_TEST_SECRET_THAT_IS_NEVER_SET";

    #[test]
    fn falls_back_to_static_value() {
        let providers = vec![
            SecretProvider::Env(UNSET_VAR.into()),
            SecretProvider::Static(Some("from-config".into())),
        ];
        assert_eq!(resolve_signing_secret(&providers).unwrap(), "from-config");
    }

    #[test]
    fn env_value_takes_precedence() {
        let var = "AUTHAPI_TEST_SECRET_PRECEDENCE";
        // SAFETY: the variable name is unique to this test.
        unsafe { std::env::set_var(var, "from-env") };
        let providers = vec![
            SecretProvider::Env(var.into()),
            SecretProvider::Static(Some("from-config".into())),
        ];
        assert_eq!(resolve_signing_secret(&providers).unwrap(), "from-env");
        unsafe { std::env::remove_var(var) };
    }

    #[test]
    fn empty_values_are_skipped() {
        let providers = vec![
            SecretProvider::Static(Some(String::new())),
            SecretProvider::Static(Some("second".into())),
        ];
        assert_eq!(resolve_signing_secret(&providers).unwrap(), "second");
    }

    #[test]
    fn missing_secret_is_a_configuration_error() {
        let providers = vec![
            SecretProvider::Env(UNSET_VAR.into()),
            SecretProvider::Static(None),
        ];
        assert!(matches!(
            resolve_signing_secret(&providers),
            Err(AuthError::Configuration(_))
        ));
    }
}
