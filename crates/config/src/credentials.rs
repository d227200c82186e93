// Source credentials
//
// Passwords are looked up in order:
// 1. `password` in the group table
// 2. The environment variable named by `password_env`, or
//    SHIPRECON_<GROUP>_PASSWORD when unset

use std::env;

use crate::error::ConfigError;
use crate::settings::GroupConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Inline,
    Environment,
}

impl CredentialSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialSource::Inline => "config",
            CredentialSource::Environment => "environment",
        }
    }
}

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub source: CredentialSource,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .field("source", &self.source)
            .finish()
    }
}

/// Default environment variable for a group's password.
pub fn env_var_name(group: &str) -> String {
    let upper: String = group
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("SHIPRECON_{upper}_PASSWORD")
}

pub fn resolve_credentials(group_id: &str, group: &GroupConfig) -> Result<Credentials, ConfigError> {
    let username = group.username.clone().unwrap_or_default();

    if let Some(password) = group.password.as_deref().filter(|p| !p.is_empty()) {
        return Ok(Credentials {
            username,
            password: password.to_string(),
            source: CredentialSource::Inline,
        });
    }

    let env_name = group
        .password_env
        .clone()
        .unwrap_or_else(|| env_var_name(group_id));
    match env::var(&env_name) {
        Ok(password) if !password.is_empty() => Ok(Credentials {
            username,
            password,
            source: CredentialSource::Environment,
        }),
        _ => Err(ConfigError::MissingCredentials {
            group: group_id.to_string(),
            env: env_name,
        }),
    }
}
