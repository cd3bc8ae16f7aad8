//! Static bearer-token authenticator.

use super::{AuthError, Authenticator, CallContext};
use crate::config::AuthConfig;
use async_trait::async_trait;
use hub_proto::UserId;
use std::collections::HashMap;

/// Maps fixed tokens to user ids, loaded from `[[auth.tokens]]`.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenAuthenticator {
    tokens: HashMap<String, UserId>,
}

impl StaticTokenAuthenticator {
    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            tokens: config
                .tokens
                .iter()
                .map(|entry| (entry.token.clone(), entry.user_id.clone()))
                .collect(),
        }
    }
}

#[async_trait]
impl Authenticator for StaticTokenAuthenticator {
    async fn validate(&self, _ctx: &CallContext, token: &str) -> Result<UserId, AuthError> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenEntry;
    use std::time::Duration;

    #[tokio::test]
    async fn resolves_known_tokens_only() {
        let auth = StaticTokenAuthenticator::from_config(&AuthConfig {
            tokens: vec![TokenEntry {
                token: "secret".to_string(),
                user_id: "alice".to_string(),
            }],
        });
        let ctx = CallContext::with_timeout(Duration::from_secs(1));
        assert_eq!(auth.validate(&ctx, "secret").await, Ok("alice".to_string()));
        assert_eq!(
            auth.validate(&ctx, "guess").await,
            Err(AuthError::InvalidToken)
        );
    }
}
