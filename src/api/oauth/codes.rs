//! Authorization code and access token issuance over the store.

use crate::models::{AccessToken, AuthorizationCode};
use crate::store::{Store, StoreBackend, StoreError};
use chrono::Utc;
use log::debug;
use rand::distributions::Alphanumeric;
use rand::Rng;
use thiserror::Error;

/// Length of an authorization code token
const CODE_LENGTH: usize = 16;
/// Length of an access token
const TOKEN_LENGTH: usize = 256;

/// Errors that can occur during code and token operations.
///
/// The three redemption failures are distinguished here for the engine's
/// own accounting; the HTTP layer collapses them into one denial so the
/// response does not reveal which field mismatched.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("authorization code not found")]
    CodeNotFound,
    #[error("authorization code was issued to a different client")]
    ClientMismatch,
    #[error("redirect URI does not match the one bound at grant time")]
    RedirectUriMismatch,
}

/// Code and token manager
#[derive(Clone)]
pub struct TokenManager {
    store: Store,
}

impl TokenManager {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Issue an authorization code bound to the grant parameters.
    pub async fn issue_code(
        &self,
        client_id: &str,
        redirect_uri: &str,
        user_id: &str,
    ) -> Result<String, TokenError> {
        let code = generate_opaque_token(CODE_LENGTH);
        self.store
            .put_code(AuthorizationCode {
                token: code.clone(),
                client_id: client_id.to_string(),
                redirect_uri: redirect_uri.to_string(),
                user_id: user_id.to_string(),
                issued_at: Utc::now(),
            })
            .await?;
        debug!("Issued authorization code for user '{user_id}' via client '{client_id}'");
        Ok(code)
    }

    /// Redeem an authorization code for an access token.
    ///
    /// The code is consumed first, in one atomic step, so redemption is
    /// exactly-once: a second attempt with the same code fails as not
    /// found whether or not the first attempt succeeded.
    pub async fn redeem_code(
        &self,
        code: &str,
        client_id: &str,
        redirect_uri: &str,
    ) -> Result<AccessToken, TokenError> {
        let auth_code = self
            .store
            .take_code(code)
            .await?
            .ok_or(TokenError::CodeNotFound)?;

        if auth_code.client_id != client_id {
            return Err(TokenError::ClientMismatch);
        }
        if auth_code.redirect_uri != redirect_uri {
            return Err(TokenError::RedirectUriMismatch);
        }

        let token = AccessToken {
            token: generate_opaque_token(TOKEN_LENGTH),
            client_id: auth_code.client_id,
            user_id: auth_code.user_id,
            issued_at: Utc::now(),
        };
        self.store.put_token(token.clone()).await?;
        debug!(
            "Issued access token for user '{}' via client '{}'",
            token.user_id, token.client_id
        );
        Ok(token)
    }

    /// Resolve a bearer token to its record; absence is not an error.
    pub async fn resolve_token(&self, token: &str) -> Result<Option<AccessToken>, TokenError> {
        Ok(self.store.token(token).await?)
    }
}

/// Generate a cryptographically random alphanumeric token
pub fn generate_opaque_token(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::create_store;

    fn manager() -> TokenManager {
        TokenManager::new(create_store())
    }

    #[tokio::test]
    async fn test_issue_and_redeem_code() {
        let manager = manager();
        let code = manager
            .issue_code("client-1", "https://example.com/cb", "user-1")
            .await
            .unwrap();
        assert_eq!(code.len(), 16);

        let token = manager
            .redeem_code(&code, "client-1", "https://example.com/cb")
            .await
            .unwrap();
        assert_eq!(token.token.len(), 256);
        assert_eq!(token.client_id, "client-1");
        assert_eq!(token.user_id, "user-1");

        // The token is immediately resolvable
        let resolved = manager.resolve_token(&token.token).await.unwrap().unwrap();
        assert_eq!(resolved.user_id, "user-1");
    }

    #[tokio::test]
    async fn test_second_redemption_fails_as_not_found() {
        let manager = manager();
        let code = manager
            .issue_code("client-1", "https://example.com/cb", "user-1")
            .await
            .unwrap();

        manager
            .redeem_code(&code, "client-1", "https://example.com/cb")
            .await
            .unwrap();
        let err = manager
            .redeem_code(&code, "client-1", "https://example.com/cb")
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::CodeNotFound));
    }

    #[tokio::test]
    async fn test_redemption_with_wrong_redirect_uri_fails() {
        let manager = manager();
        let code = manager
            .issue_code("client-1", "https://example.com/cb", "user-1")
            .await
            .unwrap();

        let err = manager
            .redeem_code(&code, "client-1", "https://evil.example.com/cb")
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::RedirectUriMismatch));

        // The failed redemption still consumed the code
        let err = manager
            .redeem_code(&code, "client-1", "https://example.com/cb")
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::CodeNotFound));
    }

    #[tokio::test]
    async fn test_redemption_by_other_client_fails() {
        let manager = manager();
        let code = manager
            .issue_code("client-1", "https://example.com/cb", "user-1")
            .await
            .unwrap();

        let err = manager
            .redeem_code(&code, "client-2", "https://example.com/cb")
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::ClientMismatch));
    }

    #[tokio::test]
    async fn test_unknown_bearer_token_resolves_to_none() {
        let manager = manager();
        assert!(manager.resolve_token("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_tokens_are_unique() {
        let a = generate_opaque_token(16);
        let b = generate_opaque_token(16);
        assert_ne!(a, b);
    }
}
