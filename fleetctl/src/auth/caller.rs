//! Request extractor for API-token-authenticated callers.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts, OriginalUri},
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::{debug, instrument, trace};

use crate::{
    AppState,
    auth::api_token,
    db::errors::DbError,
    errors::{Error, Result},
    types::{ApiTokenId, OrganizationId},
};

/// The authenticated caller of an `/api` route.
///
/// Parsed from `Authorization: {token}:{secret}`. The organization comes from the stored token,
/// never from the request, so every handler taking an `ApiCaller` is scoped to the tenant that
/// owns the credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiCaller {
    pub organization_id: OrganizationId,
    pub token_id: ApiTokenId,
}

/// Split an Authorization header value into token and secret. The secret may itself contain ':'.
fn parse_credentials(value: &str) -> Option<(&str, &str)> {
    let (token, secret) = value.trim().split_once(':')?;
    if token.is_empty() || secret.is_empty() {
        return None;
    }
    Some((token, secret))
}

/// Peer address from the connection, else the first `X-Forwarded-For` hop, else "unknown".
fn remote_ip(parts: &Parts) -> String {
    if let Some(ConnectInfo(addr)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    parts
        .headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

impl FromRequestParts<AppState> for ApiCaller {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let header = parts.headers.get(AUTHORIZATION).ok_or_else(|| Error::Unauthenticated { message: None })?;

        let header = header.to_str().map_err(|e| Error::BadRequest {
            message: format!("Invalid authorization header: {e}"),
        })?;

        let Some((token, secret)) = parse_credentials(header) else {
            trace!("Authorization header is not in token:secret form");
            return Err(Error::Unauthenticated {
                message: Some("Expected Authorization: {token}:{secret}".to_string()),
            });
        };

        let mut conn = state.db.acquire().await.map_err(DbError::from)?;
        let ip = remote_ip(parts);
        // Nested routers see the path with their prefix stripped
        let path = match parts.extensions.get::<OriginalUri>() {
            Some(OriginalUri(uri)) => uri.path().to_string(),
            None => parts.uri.path().to_string(),
        };

        match api_token::authenticate(&mut conn, &state.diagnostics, token, secret, &path, &ip).await? {
            Some(creds) => {
                debug!(token_id = %creds.id, "Authenticated API token");
                Ok(ApiCaller {
                    organization_id: creds.organization_id,
                    token_id: creds.id,
                })
            }
            None => Err(Error::Unauthenticated {
                message: Some("Invalid API token".to_string()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/api/alerts");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_parse_credentials() {
        assert_eq!(parse_credentials("abc:def"), Some(("abc", "def")));
        assert_eq!(parse_credentials(" abc:d:e:f "), Some(("abc", "d:e:f")));
        assert_eq!(parse_credentials("Bearer abc"), None);
        assert_eq!(parse_credentials(":secret"), None);
        assert_eq!(parse_credentials("token:"), None);
    }

    #[test]
    fn test_remote_ip_prefers_connection_then_forwarded_header() {
        let mut parts = parts_with(&[("x-forwarded-for", "203.0.113.9, 10.0.0.1")]);
        assert_eq!(remote_ip(&parts), "203.0.113.9");

        parts.extensions.insert(ConnectInfo("192.0.2.4:5555".parse::<SocketAddr>().unwrap()));
        assert_eq!(remote_ip(&parts), "192.0.2.4");

        assert_eq!(remote_ip(&parts_with(&[])), "unknown");
    }
}
