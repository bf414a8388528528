//! # fleetctl: multi-tenant device fleet control plane
//!
//! `fleetctl` is the server side of a remote device management product. Agents on managed
//! machines report telemetry through heartbeats; operators and automation manage devices, groups,
//! users and invites through a token-authenticated REST API; alerts fan out to a stored record, an
//! email and a webhook.
//!
//! ## Tenancy
//!
//! Every piece of data belongs to exactly one organization. API callers authenticate with an API
//! token issued to an organization, and that organization scopes every query the request makes.
//! A row owned by another organization is indistinguishable from a missing one.
//!
//! ## Components
//!
//! - **Tenant store** ([`db`]): repositories over PostgreSQL, one per entity group, with explicit
//!   transactions for multi-step mutations.
//! - **Alert dispatcher** ([`alerts`]): runs the requested alert actions independently and
//!   records each failure in the organization's event log.
//! - **Retention reaper** ([`retention`]): periodically deletes event logs, command contexts and
//!   shared files past the retention window.
//! - **API token authenticator** ([`auth`]): validates `token:secret` pairs and audits every
//!   attempt.
//!
//! A bounded diagnostic log file ([`diagnostics`]) catches failures that cannot be written to the
//! database.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use fleetctl::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = fleetctl::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     fleetctl::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     Application::new(config)
//!         .await?
//!         .serve(async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await
//! }
//! ```
pub mod alerts;
pub mod api;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod db;
pub mod diagnostics;
pub mod email;
pub mod errors;
mod openapi;
pub mod retention;
pub mod telemetry;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

#[cfg(test)]
mod test;

use crate::alerts::{AlertDispatcher, AlertMailer};
use crate::config::CorsOrigin;
use crate::db::handlers::Devices;
use crate::diagnostics::DiagnosticSink;
use crate::email::EmailService;
use crate::openapi::ApiDoc;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::{
    Router, http,
    routing::{get, post, put},
};
use bon::Builder;
pub use config::Config;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::{DeviceId, OrganizationId, UserId};

/// Application state shared across all request handlers.
///
/// ```ignore
/// let state = AppState::builder()
///     .db(pool)
///     .config(config)
///     .diagnostics(diagnostics)
///     .alert_dispatcher(dispatcher)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub diagnostics: Arc<DiagnosticSink>,
    pub alert_dispatcher: Arc<AlertDispatcher>,
}

/// Get the fleetctl database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Install the process-wide rustls crypto provider. Safe to call more than once.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

#[instrument(skip_all)]
async fn setup_database(config: &Config) -> anyhow::Result<PgPool> {
    let settings = &config.database.pool;

    let mut options = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs));
    if settings.idle_timeout_secs > 0 {
        options = options.idle_timeout(Duration::from_secs(settings.idle_timeout_secs));
    }
    if settings.max_lifetime_secs > 0 {
        options = options.max_lifetime(Duration::from_secs(settings.max_lifetime_secs));
    }

    let pool = options.connect(&config.database.url).await?;
    migrator().run(&pool).await?;

    Ok(pool)
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    // tower-http rejects "*" inside an origin list
    let allow_origin = if config.cors.allowed_origins.iter().any(|o| matches!(o, CorsOrigin::Wildcard)) {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in &config.cors.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                origins.push(url.as_str().trim_end_matches('/').parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            http::Method::GET,
            http::Method::POST,
            http::Method::PUT,
            http::Method::PATCH,
            http::Method::DELETE,
        ])
        .allow_headers([http::header::AUTHORIZATION, http::header::CONTENT_TYPE]);

    if let Some(max_age) = config.cors.max_age {
        cors = cors.max_age(Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router: the `/api` surface, `/healthz`, and the API reference at
/// `/docs`, wrapped in CORS and request tracing.
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    use api::handlers::{alerts, api_tokens, command_contexts, device_groups, devices, events, invites, organizations, shared_files, users};

    let cors = create_cors_layer(&state.config)?;
    let file_upload_limit = match state.config.files.max_file_size {
        0 => DefaultBodyLimit::disable(),
        max => DefaultBodyLimit::max(usize::try_from(max).unwrap_or(usize::MAX)),
    };

    let api_routes = Router::new()
        // Agent intake (unauthenticated)
        .route("/devices/heartbeat", post(devices::heartbeat))
        .route("/devices/{id}/offline", post(devices::mark_offline))
        // Alerts
        .route("/alerts", get(alerts::list_alerts).post(alerts::create_alert))
        .route("/alerts/{id}/delete", post(alerts::delete_alert))
        // Devices
        .route("/devices", get(devices::list_devices))
        .route("/devices/remove", post(devices::remove_devices))
        .route("/devices/filter", post(devices::filter_devices))
        .route("/devices/{id}", get(devices::get_device).patch(devices::update_device))
        .route("/devices/{id}/tags", put(devices::update_device_tags))
        .route("/devices/{id}/setup", put(devices::setup_device))
        // Device groups
        .route(
            "/device-groups",
            get(device_groups::list_device_groups).post(device_groups::create_device_group),
        )
        .route("/device-groups/{id}", axum::routing::delete(device_groups::delete_device_group))
        // Invites
        .route("/invites", get(invites::list_invites).post(invites::create_invite))
        .route("/invites/{id}", axum::routing::delete(invites::delete_invite))
        .route("/invites/{id}/redeem", post(invites::redeem_invite))
        // API tokens
        .route("/api-tokens", get(api_tokens::list_api_tokens).post(api_tokens::create_api_token))
        .route(
            "/api-tokens/{id}",
            axum::routing::patch(api_tokens::rename_api_token).delete(api_tokens::delete_api_token),
        )
        // Events
        .route("/events", get(events::list_events))
        // Command contexts
        .route("/command-contexts", get(command_contexts::list_command_contexts))
        .route(
            "/command-contexts/{id}",
            get(command_contexts::get_command_context).put(command_contexts::upsert_command_context),
        )
        // Shared files
        .route("/files", post(shared_files::upload_file).layer(file_upload_limit))
        .route("/files/{id}", get(shared_files::download_file))
        // Organization and members
        .route(
            "/organization",
            get(organizations::get_organization).put(organizations::update_organization),
        )
        .route("/users", get(users::list_users))
        .route("/users/{id}", get(users::get_user))
        .route("/users/{id}/admin", put(users::set_user_admin))
        .route("/users/{id}/remove", post(users::remove_user))
        .route("/users/{id}/options", get(users::get_user_options).put(users::update_user_options))
        .route("/users/{id}/prompt", get(users::get_user_prompt))
        .with_state(state);

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .nest("/api", api_routes)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    Ok(router)
}

/// Background tasks that run alongside the HTTP server.
///
/// Dropping this cancels the shutdown token through `drop_guard`, so tasks never outlive the
/// application.
pub struct BackgroundServices {
    background_tasks: Vec<tokio::task::JoinHandle<()>>,
    shutdown_token: CancellationToken,
    // Pub so that we can disarm it if we want to
    pub drop_guard: Option<tokio_util::sync::DropGuard>,
}

impl BackgroundServices {
    /// Signal every task and wait for it to finish
    pub async fn shutdown(self) {
        self.shutdown_token.cancel();

        for handle in self.background_tasks {
            let _ = handle.await;
        }
    }
}

fn setup_background_services(pool: PgPool, config: &Config, diagnostics: Arc<DiagnosticSink>) -> BackgroundServices {
    let shutdown_token = CancellationToken::new();
    let drop_guard = shutdown_token.clone().drop_guard();
    let mut background_tasks = Vec::new();

    match config.retention_days() {
        Some(days) => info!(retention_days = days, "Data retention enabled"),
        None => info!("Data retention disabled, the reaper will idle"),
    }

    background_tasks.push(tokio::spawn(retention::run_retention_reaper(
        pool,
        config.retention.clone(),
        diagnostics,
        shutdown_token.clone(),
    )));

    BackgroundServices {
        background_tasks,
        shutdown_token,
        drop_guard: Some(drop_guard),
    }
}

pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
    diagnostics: Arc<DiagnosticSink>,
    bg_services: BackgroundServices,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        Self::new_with_pool(config, None).await
    }

    /// Like [`Self::new`], reusing an existing pool instead of connecting. Migrations still run.
    pub async fn new_with_pool(config: Config, pool: Option<PgPool>) -> anyhow::Result<Self> {
        debug!("Starting fleetctl with configuration: {:#?}", config);
        install_crypto_provider();

        let pool = match pool {
            Some(pool) => {
                migrator().run(&pool).await?;
                pool
            }
            None => setup_database(&config).await?,
        };

        let diagnostics = Arc::new(DiagnosticSink::from_config(&config.diagnostics));

        // Agents reconnect on their own; nothing is online until it says so
        let mut conn = pool.acquire().await?;
        let reset = Devices::new(&mut conn).set_all_offline().await?;
        drop(conn);
        info!(devices = reset, "Marked all devices offline");

        let mailer: Arc<dyn AlertMailer> = Arc::new(EmailService::new(&config.email)?);
        let alert_dispatcher = Arc::new(AlertDispatcher::new(pool.clone(), mailer, &config.alerts, diagnostics.clone())?);

        let bg_services = setup_background_services(pool.clone(), &config, diagnostics.clone());

        let state = AppState::builder()
            .db(pool.clone())
            .config(config.clone())
            .diagnostics(diagnostics.clone())
            .alert_dispatcher(alert_dispatcher)
            .build();
        let router = build_router(state)?;

        diagnostics.record_info("fleetctl started.".to_string()).await;

        Ok(Self {
            router,
            config,
            pool,
            diagnostics,
            bg_services,
        })
    }

    /// Convert application into a test server (for tests)
    #[cfg(any(test, feature = "test-utils"))]
    pub fn into_test_server(self) -> (axum_test::TestServer, BackgroundServices) {
        let service = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let server = axum_test::TestServer::new(service).expect("Failed to create test server");
        (server, self.bg_services)
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("fleetctl listening on http://{}", bind_addr);

        axum::serve(listener, self.router.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(shutdown)
            .await?;

        self.bg_services.shutdown().await;

        info!("Closing database connections...");
        self.pool.close().await;
        self.diagnostics.record_info("fleetctl stopped.".to_string()).await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_layer_accepts_wildcard_and_explicit_origins() {
        let mut config = Config::default();
        assert!(create_cors_layer(&config).is_ok());

        config.cors.allowed_origins = vec![
            CorsOrigin::Url("https://fleet.example.com/".parse().unwrap()),
            CorsOrigin::Url("http://localhost:5173".parse().unwrap()),
        ];
        assert!(create_cors_layer(&config).is_ok());

        config.cors.allowed_origins.push(CorsOrigin::Wildcard);
        assert!(create_cors_layer(&config).is_ok());
    }
}
