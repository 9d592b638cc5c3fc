//! OAuth client authentication.
//!
//! Two equivalent mechanisms: HTTP Basic credentials and body-embedded
//! client id/secret. Both resolve to the same check (the client exists
//! and its stored secret matches the supplied one) and fail with the
//! same outcome so callers cannot probe which mechanism was rejected.

use crate::errors::ApiError;
use crate::models::Application;
use crate::state::AppState;
use crate::store::StoreBackend;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use http::header::AUTHORIZATION;
use http::HeaderMap;
use log::warn;

/// Compare two secrets without short-circuiting on the first differing
/// byte. Length differences still return early; the length of a client
/// secret is not sensitive.
pub(crate) fn constant_time_compare(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Extract client credentials from an HTTP Basic Authorization header.
pub(crate) fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let header = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;
    let (client_id, client_secret) = credentials.split_once(':')?;
    Some((client_id.to_string(), client_secret.to_string()))
}

/// Authenticate a client by id and secret.
pub(crate) async fn authenticate_client(
    state: &AppState,
    client_id: &str,
    client_secret: &str,
) -> Result<Application, ApiError> {
    let Some(application) = state.store.application(client_id).await? else {
        warn!("Client authentication failed: unknown client '{client_id}'");
        return Err(ApiError::unauthorized("Invalid client credentials"));
    };
    if !constant_time_compare(&application.client_secret, client_secret) {
        warn!("Client authentication failed: bad secret for client '{client_id}'");
        return Err(ApiError::unauthorized("Invalid client credentials"));
    }
    Ok(application)
}

/// Authenticate a client from a request, trying HTTP Basic first and
/// falling back to body-embedded credentials.
pub(crate) async fn client_from_request(
    state: &AppState,
    headers: &HeaderMap,
    body_id: Option<&str>,
    body_secret: Option<&str>,
) -> Result<Application, ApiError> {
    if let Some((client_id, client_secret)) = basic_credentials(headers) {
        return authenticate_client(state, &client_id, &client_secret).await;
    }
    match (body_id, body_secret) {
        (Some(client_id), Some(client_secret)) => {
            authenticate_client(state, client_id, client_secret).await
        }
        _ => Err(ApiError::unauthorized("Missing client credentials")),
    }
}

/// Authenticate a client from the Authorization header alone (the
/// client-basic guard on the /api lookups).
pub(crate) async fn client_from_basic(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Application, ApiError> {
    let Some((client_id, client_secret)) = basic_credentials(headers) else {
        return Err(ApiError::unauthorized("Missing client credentials"));
    };
    authenticate_client(state, &client_id, &client_secret).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("secret", "secret"));
        assert!(!constant_time_compare("secret", "secres"));
        assert!(!constant_time_compare("secret", "secret-longer"));
        assert!(!constant_time_compare("", "x"));
        assert!(constant_time_compare("", ""));
    }

    #[test]
    fn test_basic_credentials_roundtrip() {
        let mut headers = HeaderMap::new();
        let encoded = STANDARD.encode("client-1:s3cret");
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {encoded}")).unwrap(),
        );

        let (id, secret) = basic_credentials(&headers).unwrap();
        assert_eq!(id, "client-1");
        assert_eq!(secret, "s3cret");
    }

    #[test]
    fn test_basic_credentials_rejects_other_schemes() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer token"));
        assert!(basic_credentials(&headers).is_none());

        let headers = HeaderMap::new();
        assert!(basic_credentials(&headers).is_none());
    }

    #[test]
    fn test_basic_credentials_secret_may_contain_colons() {
        let mut headers = HeaderMap::new();
        let encoded = STANDARD.encode("client-1:se:cr:et");
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {encoded}")).unwrap(),
        );

        let (_, secret) = basic_credentials(&headers).unwrap();
        assert_eq!(secret, "se:cr:et");
    }
}
