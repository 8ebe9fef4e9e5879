//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::config::schema::IntegrationsConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable names recognised by [`apply_env_overrides`].
pub mod env {
    pub const LOGIN_URL: &str = "INTEGRATIONS_LOGIN_URL";
    pub const API_BASE_URL: &str = "INTEGRATIONS_API_BASE_URL";
    pub const USERNAME: &str = "INTEGRATIONS_USERNAME";
    pub const PASSWORD: &str = "INTEGRATIONS_PASSWORD";
    pub const LOOKUP_CLIENT_ID: &str = "INTEGRATIONS_LOOKUP_CLIENT_ID";
    pub const LOOKUP_BASE_URL: &str = "INTEGRATIONS_LOOKUP_BASE_URL";
    pub const LOOKUP_MAX_ATTEMPTS: &str = "INTEGRATIONS_LOOKUP_MAX_ATTEMPTS";
    pub const LOOKUP_BACKOFF_BASE_MS: &str = "INTEGRATIONS_LOOKUP_BACKOFF_BASE_MS";
    pub const LOOKUP_BACKOFF_CAP_MS: &str = "INTEGRATIONS_LOOKUP_BACKOFF_CAP_MS";
    pub const LOOKUP_CACHE_TTL_SECS: &str = "INTEGRATIONS_LOOKUP_CACHE_TTL_SECS";
}

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Env { var: String, value: String },
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Env { var, value } => {
                write!(f, "Invalid value '{}' for environment variable {}", value, var)
            }
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load a TOML file, apply environment overrides and validate.
pub fn load_config(path: &Path) -> Result<IntegrationsConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let mut config: IntegrationsConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

impl IntegrationsConfig {
    /// Defaults plus environment overrides, validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

/// Overlay environment-style settings on `config`.
///
/// `lookup` resolves a variable name to its value; empty values are ignored.
pub fn apply_env_overrides<F>(config: &mut IntegrationsConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(v) = var(env::LOGIN_URL) {
        config.session.login_url = Some(v);
    }
    if let Some(v) = var(env::API_BASE_URL) {
        config.session.base_url = Some(v);
    }
    if let Some(v) = var(env::USERNAME) {
        config.session.username = Some(v);
    }
    if let Some(v) = var(env::PASSWORD) {
        config.session.password = Some(v);
    }
    if let Some(v) = var(env::LOOKUP_CLIENT_ID) {
        config.lookup.client_id = Some(v);
    }
    if let Some(v) = var(env::LOOKUP_BASE_URL) {
        config.lookup.base_url = v;
    }
    if let Some(v) = var(env::LOOKUP_MAX_ATTEMPTS) {
        config.lookup.retry.max_attempts = parse_var(env::LOOKUP_MAX_ATTEMPTS, &v)?;
    }
    if let Some(v) = var(env::LOOKUP_BACKOFF_BASE_MS) {
        config.lookup.retry.base_delay_ms = parse_var(env::LOOKUP_BACKOFF_BASE_MS, &v)?;
    }
    if let Some(v) = var(env::LOOKUP_BACKOFF_CAP_MS) {
        config.lookup.retry.max_delay_ms = parse_var(env::LOOKUP_BACKOFF_CAP_MS, &v)?;
    }
    if let Some(v) = var(env::LOOKUP_CACHE_TTL_SECS) {
        config.lookup.cache_ttl_secs = parse_var(env::LOOKUP_CACHE_TTL_SECS, &v)?;
    }

    Ok(())
}

fn parse_var<T: FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        var: var.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let mut config = IntegrationsConfig::default();
        apply_env_overrides(
            &mut config,
            env_of(&[
                (env::LOGIN_URL, "https://carrier.test/auth/login"),
                (env::USERNAME, "portal"),
                (env::PASSWORD, "secret"),
                (env::LOOKUP_CLIENT_ID, "demo"),
                (env::LOOKUP_MAX_ATTEMPTS, "5"),
                (env::LOOKUP_BACKOFF_BASE_MS, "250"),
                (env::LOOKUP_CACHE_TTL_SECS, "3600"),
            ]),
        )
        .unwrap();

        assert_eq!(
            config.session.login_url.as_deref(),
            Some("https://carrier.test/auth/login")
        );
        assert_eq!(config.session.username.as_deref(), Some("portal"));
        assert_eq!(config.lookup.client_id.as_deref(), Some("demo"));
        assert_eq!(config.lookup.retry.max_attempts, 5);
        assert_eq!(config.lookup.retry.base_delay_ms, 250);
        assert_eq!(config.lookup.retry.max_delay_ms, 10_000);
        assert_eq!(config.lookup.cache_ttl_secs, 3600);
    }

    #[test]
    fn test_empty_env_values_are_ignored() {
        let mut config = IntegrationsConfig::default();
        apply_env_overrides(&mut config, env_of(&[(env::LOGIN_URL, "  ")])).unwrap();
        assert!(config.session.login_url.is_none());
    }

    #[test]
    fn test_invalid_numeric_override() {
        let mut config = IntegrationsConfig::default();
        let err = apply_env_overrides(
            &mut config,
            env_of(&[(env::LOOKUP_BACKOFF_CAP_MS, "ten seconds")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Env { .. }));
        assert!(err.to_string().contains(env::LOOKUP_BACKOFF_CAP_MS));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!(
            "integrations-config-{}.toml",
            uuid::Uuid::new_v4()
        ));
        fs::write(
            &path,
            r#"
                [session]
                login_url = "https://carrier.test/login"
                base_url = "https://carrier.test/api"

                [lookup]
                client_id = "portal"
                cache_ttl_secs = 86400

                [lookup.retry]
                max_attempts = 4
            "#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.lookup.cache_ttl_secs, 86_400);
        assert_eq!(config.lookup.retry.max_attempts, 4);
        assert_eq!(config.lookup.retry.base_delay_ms, 1000);
        assert!(config.lookup.endpoints.contains_key("places"));

        fs::remove_file(&path).unwrap_or_default();
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let path = std::env::temp_dir().join(format!(
            "integrations-config-{}.toml",
            uuid::Uuid::new_v4()
        ));
        fs::write(&path, "[lookup.retry]\nmax_attempts = 0\n").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));

        fs::remove_file(&path).unwrap_or_default();
    }
}
