//! API key resolution
//!
//! Precedence: explicit configuration, then the environment, then an
//! interactive prompt. Blank values count as absent.

use std::fmt;
use std::io::IsTerminal;

use secrecy::{ExposeSecret, SecretString};

use crate::{Error, Result};

/// Environment variable consulted by default
pub const DEFAULT_ENV_VAR: &str = "OPENAI_API_KEY";

/// Where a credential came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Explicit,
    Environment,
    Prompt,
}

/// Resolved API key
///
/// Immutable once built. `Debug` never prints the secret.
#[derive(Clone)]
pub struct Credential {
    secret: SecretString,
    source: CredentialSource,
}

impl Credential {
    /// Which source supplied the key
    #[must_use]
    pub const fn source(&self) -> CredentialSource {
        self.source
    }

    /// The key, for handing to a transport
    #[must_use]
    pub fn secret(&self) -> SecretString {
        self.secret.clone()
    }

    /// Borrow the key material
    #[must_use]
    pub fn expose(&self) -> &str {
        self.secret.expose_secret()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("secret", &"[REDACTED]")
            .field("source", &self.source)
            .finish()
    }
}

/// Resolves the API key once per process
pub struct CredentialResolver {
    explicit: Option<String>,
    env_var: String,
    lookup: fn(&str) -> Option<String>,
    interactive: bool,
}

impl Default for CredentialResolver {
    fn default() -> Self {
        Self {
            explicit: None,
            env_var: DEFAULT_ENV_VAR.to_string(),
            lookup: |name| std::env::var(name).ok(),
            interactive: false,
        }
    }
}

impl CredentialResolver {
    /// Resolver reading `OPENAI_API_KEY` with no explicit value or prompt
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a configured key ahead of everything else
    #[must_use]
    pub fn with_explicit(mut self, key: Option<String>) -> Self {
        self.explicit = key;
        self
    }

    /// Read a different environment variable
    #[must_use]
    pub fn with_env_var(mut self, name: impl Into<String>) -> Self {
        self.env_var = name.into();
        self
    }

    /// Replace the environment lookup
    #[must_use]
    pub fn with_lookup(mut self, lookup: fn(&str) -> Option<String>) -> Self {
        self.lookup = lookup;
        self
    }

    /// Allow prompting on a terminal as the last resort
    #[must_use]
    pub const fn interactive(mut self, enabled: bool) -> Self {
        self.interactive = enabled;
        self
    }

    /// Resolve the key
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCredential`] when no source yields a key
    pub fn resolve(&self) -> Result<Credential> {
        if let Some(key) = non_blank(self.explicit.clone()) {
            return Ok(credential(key, CredentialSource::Explicit));
        }

        if let Some(key) = non_blank((self.lookup)(&self.env_var)) {
            tracing::debug!(var = %self.env_var, "API key resolved from environment");
            return Ok(credential(key, CredentialSource::Environment));
        }

        if self.interactive && std::io::stdin().is_terminal() {
            let entered = dialoguer::Password::new()
                .with_prompt("OpenAI API key")
                .interact()
                .map_err(|e| Error::MissingCredential(format!("prompt failed: {e}")))?;
            if let Some(key) = non_blank(Some(entered)) {
                return Ok(credential(key, CredentialSource::Prompt));
            }
        }

        Err(Error::MissingCredential(format!(
            "set {} or configure api_key",
            self.env_var
        )))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn credential(key: String, source: CredentialSource) -> Credential {
    Credential {
        secret: SecretString::from(key),
        source,
    }
}
