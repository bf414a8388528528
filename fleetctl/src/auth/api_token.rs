//! API token validation.
//!
//! A request presents a public token and its secret. The token locates the stored credentials,
//! which also determine the caller's organization; the secret is checked against the stored
//! SHA-256 digest in constant time. Every attempt, valid or not, leaves exactly one audit event.

use std::sync::Arc;

use metrics::counter;
use sqlx::PgConnection;
use tracing::instrument;

use crate::crypto;
use crate::diagnostics::DiagnosticSink;
use crate::db::{
    errors::Result,
    handlers::{ApiTokens, EventLogs},
    models::{api_tokens::ApiTokenCredentials, event_logs::EventLogCreateDBRequest},
};

/// Validate a token/secret pair and return the stored credentials when it is valid.
///
/// A known token has its `last_used` refreshed whether or not the secret matched. The audit event
/// is scoped to the token's organization when the token is known, and unscoped otherwise. Neither
/// a failed `last_used` refresh nor a failed audit write changes the outcome; an audit event the
/// database refuses goes to the diagnostic log instead.
#[instrument(skip(conn, diagnostics, secret), err)]
pub async fn authenticate(
    conn: &mut PgConnection,
    diagnostics: &Arc<DiagnosticSink>,
    token: &str,
    secret: &str,
    request_path: &str,
    remote_ip: &str,
) -> Result<Option<ApiTokenCredentials>> {
    let stored = ApiTokens::new(&mut *conn).get_credentials(token).await?;

    let validated = stored
        .as_ref()
        .is_some_and(|creds| crypto::verify_secret(secret, &creds.secret_hash));

    if let Some(creds) = &stored {
        if let Err(e) = ApiTokens::new(&mut *conn).touch_last_used(creds.id).await {
            tracing::warn!(token_id = %creds.id, error = %e, "Failed to refresh API token last_used");
        }
    }

    let message = format!("API token used.  Token: {token}.  Path: {request_path}.  Validated: {validated}.  Remote IP: {remote_ip}");
    let event = EventLogCreateDBRequest::info(stored.as_ref().map(|c| c.organization_id), message).with_source("ApiTokenAuthenticator");
    if let Err(e) = EventLogs::new(&mut *conn).write(&event).await {
        tracing::error!(error = %e, "Failed to record API token audit event");
        diagnostics
            .record_error(format!("Failed to record event \"{}\": {e}", event.message))
            .await;
    }

    counter!("fleetctl_api_token_validations_total", "validated" => validated.to_string()).increment(1);

    Ok(stored.filter(|_| validated))
}

/// Boolean form of [`authenticate`].
pub async fn validate(
    conn: &mut PgConnection,
    diagnostics: &Arc<DiagnosticSink>,
    token: &str,
    secret: &str,
    request_path: &str,
    remote_ip: &str,
) -> Result<bool> {
    Ok(authenticate(conn, diagnostics, token, secret, request_path, remote_ip).await?.is_some())
}
