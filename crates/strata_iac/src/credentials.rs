//! Database credential resolution.
//!
//! Descriptors only carry the *names* of environment variables; the values
//! are read at build time through a [`CredentialSource`].

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::error::{IacError, IacResult};

/// Key/value lookup for credential material.
pub trait CredentialSource {
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads credentials from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl CredentialSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl CredentialSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// Resolved master credentials of a database instance.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseCredentials {
    pub username: String,
    password: String,
}

impl DatabaseCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Resolve both variables; either one missing is an error.
    pub fn resolve(
        source: &dyn CredentialSource,
        username_var: &str,
        password_var: &str,
    ) -> IacResult<Self> {
        let username = lookup(source, username_var)?;
        let password = lookup(source, password_var)?;
        debug!("Resolved database credentials from {} / {}", username_var, password_var);
        Ok(Self { username, password })
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for DatabaseCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn lookup(source: &dyn CredentialSource, variable: &str) -> IacResult<String> {
    source.get(variable).ok_or_else(|| IacError::MissingCredential {
        variable: variable.to_string(),
    })
}
