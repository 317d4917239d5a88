// Backend API token storage
//
// Tokens are looked up in:
// 1. System keychain (preferred)
// 2. SHIFTGRID_TOKEN environment variable (CI/headless)
//
// Tokens are never written to settings.json

use std::env;

#[cfg(feature = "keychain")]
use crate::ConfigError;

const KEYCHAIN_SERVICE: &str = "shiftgrid";

pub const TOKEN_ENV: &str = "SHIFTGRID_TOKEN";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Keychain,
    Environment,
    None,
}

impl TokenSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenSource::Keychain => "keychain",
            TokenSource::Environment => "environment",
            TokenSource::None => "none",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TokenLookup {
    pub token: Option<String>,
    pub source: TokenSource,
}

/// Keychain account for a backend: one token per host.
fn keychain_account(backend_url: &str) -> String {
    let host = backend_url
        .split("://")
        .nth(1)
        .unwrap_or(backend_url)
        .split('/')
        .next()
        .unwrap_or_default();
    format!("backend/{}", host.to_lowercase())
}

/// Find the API token for `backend_url`.
pub fn get_token(backend_url: &str) -> TokenLookup {
    #[cfg(feature = "keychain")]
    {
        if let Ok(entry) = keyring::Entry::new(KEYCHAIN_SERVICE, &keychain_account(backend_url)) {
            if let Ok(token) = entry.get_password() {
                return TokenLookup { token: Some(token), source: TokenSource::Keychain };
            }
        }
    }
    #[cfg(not(feature = "keychain"))]
    let _ = (KEYCHAIN_SERVICE, keychain_account(backend_url));

    match env::var(TOKEN_ENV) {
        Ok(token) if !token.is_empty() => TokenLookup { token: Some(token), source: TokenSource::Environment },
        _ => TokenLookup { token: None, source: TokenSource::None },
    }
}

#[cfg(feature = "keychain")]
pub fn set_token(backend_url: &str, token: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYCHAIN_SERVICE, &keychain_account(backend_url))
        .map_err(|e| ConfigError::Keychain(e.to_string()))?;
    entry
        .set_password(token)
        .map_err(|e| ConfigError::Keychain(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keychain_account_uses_host() {
        assert_eq!(keychain_account("https://Turnos.example.com/api"), "backend/turnos.example.com");
        assert_eq!(keychain_account("localhost:8080"), "backend/localhost:8080");
    }

    #[test]
    fn test_token_source_names() {
        assert_eq!(TokenSource::Keychain.as_str(), "keychain");
        assert_eq!(TokenSource::None.as_str(), "none");
    }
}
