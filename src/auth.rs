/// Bearer token validation
use async_trait::async_trait;
use log::{debug, warn};

use crate::error::{IngestError, Result};

/// Validates the authorization token of an incoming request
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Fails with `IngestError::InvalidToken` when the token is not accepted.
    /// An absent header is passed as an empty token.
    async fn validate(&self, token: &str) -> Result<()>;
}

/// Accepts a fixed set of tokens taken from configuration
#[derive(Debug, Clone)]
pub struct StaticTokenAuthenticator {
    tokens: Vec<String>,
}

impl StaticTokenAuthenticator {
    pub fn new(tokens: Vec<String>) -> Self {
        StaticTokenAuthenticator { tokens }
    }
}

#[async_trait]
impl Authenticator for StaticTokenAuthenticator {
    async fn validate(&self, token: &str) -> Result<()> {
        let token = token.strip_prefix("Bearer ").unwrap_or(token).trim();
        if !token.is_empty() && self.tokens.iter().any(|known| known == token) {
            debug!("Token validated");
            Ok(())
        } else {
            warn!("Rejected authorization token");
            Err(IngestError::InvalidToken)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authenticator() -> StaticTokenAuthenticator {
        StaticTokenAuthenticator::new(vec!["s3cret".into(), "other".into()])
    }

    #[tokio::test]
    async fn test_known_token_is_accepted() {
        assert!(authenticator().validate("s3cret").await.is_ok());
        assert!(authenticator().validate("Bearer other").await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_or_missing_token_is_rejected() {
        assert!(matches!(
            authenticator().validate("nope").await,
            Err(IngestError::InvalidToken)
        ));
        assert!(matches!(
            authenticator().validate("").await,
            Err(IngestError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_empty_configured_token_never_matches() {
        let auth = StaticTokenAuthenticator::new(vec![String::new()]);
        assert!(auth.validate("").await.is_err());
    }
}
