//! Test utilities for integration testing (available with `test-utils` feature).

use crate::config::{AlertsConfig, Config, DatabaseConfig, DiagnosticsConfig, EmailConfig, EmailTransportConfig, PoolSettings};
use crate::db::{
    handlers::{ApiTokens, Organizations, Users},
    models::{
        api_tokens::{ApiTokenCreateDBRequest, ApiTokenCreated},
        organizations::OrganizationDBResponse,
        users::{UserCreateDBRequest, UserDBResponse},
    },
};
use crate::types::OrganizationId;
use axum_test::TestServer;
use sqlx::PgPool;
use std::time::Duration;

pub async fn create_test_app(pool: PgPool) -> (TestServer, crate::BackgroundServices) {
    create_test_app_with_config(pool, create_test_config()).await
}

pub async fn create_test_app_with_config(pool: PgPool, config: Config) -> (TestServer, crate::BackgroundServices) {
    let app = crate::Application::new_with_pool(config, Some(pool))
        .await
        .expect("Failed to create application");

    app.into_test_server()
}

/// Config with file-backed email and diagnostics under a per-process temp directory.
pub fn create_test_config() -> Config {
    let temp_dir = std::env::temp_dir().join(format!("fleetctl-test-{}", std::process::id()));

    Config {
        database_url: None,
        database: DatabaseConfig {
            pool: PoolSettings {
                max_connections: 4,
                min_connections: 0,
                ..Default::default()
            },
            ..Default::default()
        },
        alerts: AlertsConfig {
            webhook_timeout: Duration::from_secs(5),
            email_timeout: Duration::from_secs(5),
        },
        email: EmailConfig {
            transport: EmailTransportConfig::File {
                path: temp_dir.join("emails").to_string_lossy().to_string(),
            },
            ..Default::default()
        },
        diagnostics: DiagnosticsConfig {
            path: temp_dir.join("fleetctl.log").to_string_lossy().to_string(),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub async fn create_test_organization(pool: &PgPool, name: &str) -> OrganizationDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Organizations::new(&mut conn)
        .create(name)
        .await
        .expect("Failed to create test organization")
}

pub async fn create_test_api_token(pool: &PgPool, org_id: OrganizationId) -> ApiTokenCreated {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    ApiTokens::new(&mut conn)
        .create(org_id, &ApiTokenCreateDBRequest { name: "test".to_string() })
        .await
        .expect("Failed to create test API token")
}

pub async fn create_test_user(pool: &PgPool, org_id: OrganizationId, username: &str, is_administrator: bool) -> UserDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Users::new(&mut conn)
        .create(&UserCreateDBRequest {
            username: username.to_string(),
            organization_id: org_id,
            is_administrator,
            password_hash: None,
        })
        .await
        .expect("Failed to create test user")
}

/// `Authorization` header value for a freshly created token.
pub fn auth_header(created: &ApiTokenCreated) -> String {
    format!("{}:{}", created.token.token, created.secret)
}

/// An organization plus a working token for it.
pub async fn create_test_tenant(pool: &PgPool, name: &str) -> (OrganizationDBResponse, String) {
    let org = create_test_organization(pool, name).await;
    let token = create_test_api_token(pool, org.id).await;
    (org, auth_header(&token))
}
