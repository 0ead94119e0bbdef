//! Bearer-token providers.
//!
//! Token storage and refresh belong to whatever session layer hosts the
//! explorer; the transport only asks an [`AuthProvider`] for the current
//! token before each request.

use std::fmt;

use async_trait::async_trait;
use mmm_core::error::AuthError;

/// An opaque bearer token. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(<redacted>)")
    }
}

/// Supplies the token attached to every request.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Fails with [`AuthError::SessionMissing`] when no session exists.
    async fn token(&self) -> Result<Token, AuthError>;
}

/// Provider backed by a fixed token, typically read from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenProvider {
    token: Option<Token>,
}

impl StaticTokenProvider {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.trim().is_empty()).map(Token::new),
        }
    }

    /// A provider with no session; every request fails with `AuthError`.
    pub fn signed_out() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuthProvider for StaticTokenProvider {
    async fn token(&self) -> Result<Token, AuthError> {
        self.token.clone().ok_or(AuthError::SessionMissing)
    }
}
