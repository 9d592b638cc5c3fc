//! OAuth 2.0 request/response structures

use serde::{Deserialize, Serialize};

/// OAuth 2.0 Authorization Request (Authorization Code Flow)
///
/// Fields are optional so an unauthenticated hit can be bounced to login
/// before the request shape is judged; presence is validated once a
/// session exists.
#[derive(Debug, Deserialize)]
pub struct AuthorizeRequest {
    /// Response type - must be "code" when supplied
    pub response_type: Option<String>,
    /// Client identifier
    pub client_id: Option<String>,
    /// Redirect URI; must exactly match the client's registered URL
    pub redirect_uri: Option<String>,
}

/// OAuth 2.0 Token Request
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    /// OAuth 2.0 grant type - only "authorization_code" is supported
    pub grant_type: String,
    /// Authorization code being redeemed
    pub code: Option<String>,
    /// Redirect URI; must match the one bound at grant time
    pub redirect_uri: Option<String>,
    /// Client identifier (body-credential mechanism)
    pub client_id: Option<String>,
    /// Client secret (body-credential mechanism)
    pub client_secret: Option<String>,
}

/// OAuth 2.0 Token Response
///
/// Tokens are opaque and non-expiring, so there is no `expires_in`.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Token type - always "Bearer"
    pub token_type: String,
}

/// OAuth 2.0 Error Response
#[derive(Debug, Serialize, Deserialize)]
pub struct OAuthError {
    /// Error code
    pub error: String,
    /// Human-readable error description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl OAuthError {
    /// Create an invalid_request error
    pub fn invalid_request(description: &str) -> Self {
        Self {
            error: "invalid_request".to_string(),
            error_description: Some(description.to_string()),
        }
    }

    /// Create an invalid_client error
    pub fn invalid_client(description: &str) -> Self {
        Self {
            error: "invalid_client".to_string(),
            error_description: Some(description.to_string()),
        }
    }

    /// Create an invalid_grant error
    pub fn invalid_grant(description: &str) -> Self {
        Self {
            error: "invalid_grant".to_string(),
            error_description: Some(description.to_string()),
        }
    }

    /// Create an access_denied error
    pub fn access_denied(description: &str) -> Self {
        Self {
            error: "access_denied".to_string(),
            error_description: Some(description.to_string()),
        }
    }

    /// Create an unsupported_grant_type error
    pub fn unsupported_grant_type() -> Self {
        Self {
            error: "unsupported_grant_type".to_string(),
            error_description: Some("Only the authorization_code grant is supported".to_string()),
        }
    }

    /// Create an unsupported_response_type error
    pub fn unsupported_response_type() -> Self {
        Self {
            error: "unsupported_response_type".to_string(),
            error_description: Some("Only the 'code' response type is supported".to_string()),
        }
    }

    /// Create a server_error
    pub fn server_error(description: &str) -> Self {
        Self {
            error: "server_error".to_string(),
            error_description: Some(description.to_string()),
        }
    }
}
