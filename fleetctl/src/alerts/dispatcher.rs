//! Alert dispatch: persist, email, webhook.
//!
//! ```text
//! dispatch(options, org)
//!   ├─ event: "Alert created.  Alert Options: {json}"
//!   ├─ should_alert            → DB: Alerts::create
//!   ├─ should_email            → mailer.send (bounded by email_timeout)
//!   └─ should_send_api_request → HTTP {method} {url} (bounded by webhook_timeout)
//!                                  └─ event: "Alert API Response Status: {status}."
//! ```
//!
//! A failed step becomes one Error event for the organization; the remaining steps still run.
//! When the event itself cannot be stored the failure lands in the diagnostic sink instead.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use sqlx::PgPool;
use tracing::instrument;

use crate::alerts::AlertMailer;
use crate::api::models::alerts::AlertOptions;
use crate::config::AlertsConfig;
use crate::db::errors::DbError;
use crate::db::handlers::{Alerts, EventLogs, Repository};
use crate::db::models::{alerts::AlertCreateDBRequest, event_logs::EventLogCreateDBRequest};
use crate::diagnostics::DiagnosticSink;
use crate::errors::Error;
use crate::types::{AlertId, OrganizationId, abbrev_uuid};

/// What happened to one action of an alert request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The flag for this action was not set
    Skipped,
    Completed,
    Failed(String),
}

impl ActionOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, ActionOutcome::Failed(_))
    }
}

/// Per-action outcome of one dispatch. Kept for logs and tests; never sent to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub alert: ActionOutcome,
    pub alert_id: Option<AlertId>,
    pub email: ActionOutcome,
    pub webhook: ActionOutcome,
}

impl DispatchReport {
    pub fn failures(&self) -> usize {
        [&self.alert, &self.email, &self.webhook].into_iter().filter(|o| o.is_failed()).count()
    }
}

/// Check the parts of an alert request that can be rejected before anything runs.
pub fn validate(options: &AlertOptions) -> Result<(), Error> {
    if options.should_email && options.email_to.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "email_to is required when should_email is set".to_string(),
        });
    }

    if options.should_send_api_request {
        reqwest::Url::parse(&options.api_request_url).map_err(|e| Error::BadRequest {
            message: format!("Invalid api_request_url: {e}"),
        })?;
        parse_method(&options.api_request_method)?;
        for (name, value) in &options.api_request_headers {
            HeaderName::from_bytes(name.as_bytes()).map_err(|_| Error::BadRequest {
                message: format!("Invalid header name: {name}"),
            })?;
            HeaderValue::from_str(value).map_err(|_| Error::BadRequest {
                message: format!("Invalid value for header {name}"),
            })?;
        }
    }

    Ok(())
}

fn parse_method(method: &str) -> Result<Method, Error> {
    let method = method.trim();
    if method.is_empty() {
        return Ok(Method::POST);
    }
    Method::from_bytes(method.to_ascii_uppercase().as_bytes()).map_err(|_| Error::BadRequest {
        message: format!("Invalid api_request_method: {method}"),
    })
}

pub struct AlertDispatcher {
    pool: PgPool,
    mailer: Arc<dyn AlertMailer>,
    http: reqwest::Client,
    email_timeout: Duration,
    diagnostics: Arc<DiagnosticSink>,
}

impl AlertDispatcher {
    pub fn new(pool: PgPool, mailer: Arc<dyn AlertMailer>, config: &AlertsConfig, diagnostics: Arc<DiagnosticSink>) -> Result<Self, Error> {
        crate::install_crypto_provider();

        let http = reqwest::Client::builder()
            .timeout(config.webhook_timeout)
            .build()
            .map_err(|e| Error::Internal {
                operation: format!("create alert webhook HTTP client: {e}"),
            })?;

        Ok(Self {
            pool,
            mailer,
            http,
            email_timeout: config.email_timeout,
            diagnostics,
        })
    }

    /// Run every requested action for `options` on behalf of `org_id`.
    #[instrument(skip(self, options), fields(org_id = %abbrev_uuid(&org_id)))]
    pub async fn dispatch(&self, options: &AlertOptions, org_id: OrganizationId) -> DispatchReport {
        counter!("fleetctl_alerts_dispatched_total").increment(1);

        let serialized = serde_json::to_string(options).unwrap_or_else(|e| format!("<unserializable: {e}>"));
        self.record(EventLogCreateDBRequest::info(Some(org_id), format!("Alert created.  Alert Options: {serialized}")))
            .await;

        let (alert, alert_id) = self.persist_alert(options, org_id).await;
        self.record_failure(org_id, "alert", &alert).await;

        let email = self.send_email(options, org_id).await;
        self.record_failure(org_id, "email", &email).await;

        let webhook = self.call_webhook(options, org_id).await;
        self.record_failure(org_id, "webhook", &webhook).await;

        let report = DispatchReport {
            alert,
            alert_id,
            email,
            webhook,
        };
        tracing::debug!(?report, "Alert dispatched");
        report
    }

    async fn persist_alert(&self, options: &AlertOptions, org_id: OrganizationId) -> (ActionOutcome, Option<AlertId>) {
        if !options.should_alert {
            return (ActionOutcome::Skipped, None);
        }

        let request = AlertCreateDBRequest {
            device_id: options.alert_device_id.clone(),
            message: options.alert_message.clone(),
        };

        let result = match self.pool.acquire().await {
            Ok(mut conn) => Alerts::new(&mut conn).create(org_id, &request).await,
            Err(e) => Err(DbError::from(e)),
        };

        match result {
            Ok(alert) => (ActionOutcome::Completed, Some(alert.id)),
            Err(e) => (ActionOutcome::Failed(e.to_string()), None),
        }
    }

    async fn send_email(&self, options: &AlertOptions, org_id: OrganizationId) -> ActionOutcome {
        if !options.should_email {
            return ActionOutcome::Skipped;
        }

        let send = self
            .mailer
            .send(&options.email_to, &options.email_subject, &options.email_body, org_id);

        match tokio::time::timeout(self.email_timeout, send).await {
            Ok(Ok(())) => ActionOutcome::Completed,
            Ok(Err(e)) => ActionOutcome::Failed(e.to_string()),
            Err(_) => ActionOutcome::Failed(format!("timed out after {}", humantime::format_duration(self.email_timeout))),
        }
    }

    async fn call_webhook(&self, options: &AlertOptions, org_id: OrganizationId) -> ActionOutcome {
        if !options.should_send_api_request {
            return ActionOutcome::Skipped;
        }

        let method = match parse_method(&options.api_request_method) {
            Ok(m) => m,
            Err(e) => return ActionOutcome::Failed(e.to_string()),
        };

        let mut request = self
            .http
            .request(method, &options.api_request_url)
            .header(CONTENT_TYPE, "application/json");
        for (name, value) in &options.api_request_headers {
            request = request.header(name.as_str(), value.as_str());
        }

        match request.body(options.api_request_body.clone()).send().await {
            Ok(response) => {
                let status = response.status();
                self.record(EventLogCreateDBRequest::info(
                    Some(org_id),
                    format!("Alert API Response Status: {status}."),
                ))
                .await;

                if status.is_success() {
                    ActionOutcome::Completed
                } else {
                    ActionOutcome::Failed(format!("HTTP {}", status.as_u16()))
                }
            }
            Err(e) => ActionOutcome::Failed(e.to_string()),
        }
    }

    async fn record_failure(&self, org_id: OrganizationId, action: &'static str, outcome: &ActionOutcome) {
        let ActionOutcome::Failed(reason) = outcome else {
            return;
        };

        counter!("fleetctl_alert_action_failures_total", "action" => action).increment(1);
        tracing::warn!(action, reason = %reason, "Alert action failed");

        self.record(
            EventLogCreateDBRequest::error(Some(org_id), format!("Alert {action} failed: {reason}"))
                .with_source(format!("AlertDispatcher::{action}")),
        )
        .await;
    }

    /// Store an event, falling back to the diagnostic sink when the database refuses it.
    async fn record(&self, event: EventLogCreateDBRequest) {
        let result = match self.pool.acquire().await {
            Ok(mut conn) => EventLogs::new(&mut conn).write(&event).await.map(|_| ()),
            Err(e) => Err(DbError::from(e)),
        };

        if let Err(e) = result {
            tracing::error!(error = %e, "Failed to record alert event");
            self.diagnostics
                .record_error(format!("Failed to record event \"{}\": {e}", event.message))
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::Organizations;
    use crate::db::models::event_logs::EventSeverity;
    use std::sync::Mutex;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait::async_trait]
    impl AlertMailer for RecordingMailer {
        async fn send(&self, to: &str, subject: &str, _body: &str, _org: OrganizationId) -> Result<(), Error> {
            self.sent.lock().unwrap().push((to.to_string(), subject.to_string()));
            Ok(())
        }
    }

    struct FailingMailer;

    #[async_trait::async_trait]
    impl AlertMailer for FailingMailer {
        async fn send(&self, _to: &str, _subject: &str, _body: &str, _org: OrganizationId) -> Result<(), Error> {
            Err(Error::Internal {
                operation: "send SMTP email: connection refused".to_string(),
            })
        }
    }

    struct StalledMailer;

    #[async_trait::async_trait]
    impl AlertMailer for StalledMailer {
        async fn send(&self, _to: &str, _subject: &str, _body: &str, _org: OrganizationId) -> Result<(), Error> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    fn dispatcher(pool: &PgPool, mailer: Arc<dyn AlertMailer>, dir: &tempfile::TempDir) -> AlertDispatcher {
        let config = AlertsConfig {
            webhook_timeout: Duration::from_secs(5),
            email_timeout: Duration::from_millis(200),
        };
        let diagnostics = Arc::new(DiagnosticSink::new(dir.path().join("diag.log"), 1024 * 1024, 10));
        AlertDispatcher::new(pool.clone(), mailer, &config, diagnostics).unwrap()
    }

    fn all_actions(webhook_url: String) -> AlertOptions {
        AlertOptions {
            should_alert: true,
            alert_device_id: Some("device-1".to_string()),
            alert_message: "Disk almost full".to_string(),
            should_email: true,
            email_to: "ops@example.com".to_string(),
            email_subject: "Disk alert".to_string(),
            email_body: "<p>Disk almost full</p>".to_string(),
            should_send_api_request: true,
            api_request_url: webhook_url,
            api_request_method: "post".to_string(),
            api_request_headers: [("X-Fleet".to_string(), "yes".to_string())].into(),
            api_request_body: r#"{"alert":"disk"}"#.to_string(),
        }
    }

    async fn events(pool: &PgPool, severity: EventSeverity) -> Vec<String> {
        sqlx::query_scalar("SELECT message FROM event_logs WHERE severity = $1 ORDER BY timestamp")
            .bind(severity)
            .fetch_all(pool)
            .await
            .unwrap()
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_failing_email_does_not_stop_other_actions(pool: PgPool) {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header("X-Fleet", "yes"))
            .and(header("content-type", "application/json"))
            .and(body_string(r#"{"alert":"disk"}"#))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut conn = pool.acquire().await.unwrap();
        let org = Organizations::new(&mut conn).create("Acme").await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = dispatcher(&pool, Arc::new(FailingMailer), &dir);

        let report = dispatcher.dispatch(&all_actions(format!("{}/hook", mock_server.uri())), org.id).await;

        assert_eq!(report.alert, ActionOutcome::Completed);
        assert!(report.email.is_failed());
        assert_eq!(report.webhook, ActionOutcome::Completed);
        assert_eq!(report.failures(), 1);

        let stored: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM alerts WHERE organization_id = $1")
            .bind(org.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(stored, 1);

        let errors = events(&pool, EventSeverity::Error).await;
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Alert email failed"));

        let infos = events(&pool, EventSeverity::Info).await;
        assert!(infos[0].starts_with("Alert created.  Alert Options: "));
        assert!(infos.contains(&"Alert API Response Status: 200 OK.".to_string()));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_webhook_error_status_is_recorded_as_failure(pool: PgPool) {
        let mock_server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let mut conn = pool.acquire().await.unwrap();
        let org = Organizations::new(&mut conn).create("Acme").await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let mailer = Arc::new(RecordingMailer::default());
        let dispatcher = dispatcher(&pool, mailer.clone(), &dir);

        let mut options = all_actions(mock_server.uri());
        options.should_alert = false;
        options.api_request_method = "PUT".to_string();

        let report = dispatcher.dispatch(&options, org.id).await;
        assert_eq!(report.alert, ActionOutcome::Skipped);
        assert_eq!(report.email, ActionOutcome::Completed);
        assert_eq!(report.webhook, ActionOutcome::Failed("HTTP 503".to_string()));
        assert_eq!(mailer.sent.lock().unwrap().as_slice(), &[("ops@example.com".to_string(), "Disk alert".to_string())]);

        let errors = events(&pool, EventSeverity::Error).await;
        assert_eq!(errors, vec!["Alert webhook failed: HTTP 503".to_string()]);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_email_timeout_is_a_failure_of_email_only(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let org = Organizations::new(&mut conn).create("Acme").await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = dispatcher(&pool, Arc::new(StalledMailer), &dir);

        let mut options = all_actions(String::new());
        options.should_send_api_request = false;

        let report = dispatcher.dispatch(&options, org.id).await;
        assert_eq!(report.alert, ActionOutcome::Completed);
        assert!(matches!(&report.email, ActionOutcome::Failed(reason) if reason.starts_with("timed out")));
        assert_eq!(report.webhook, ActionOutcome::Skipped);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_unknown_organization_fails_persist_without_panicking(pool: PgPool) {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = dispatcher(&pool, Arc::new(RecordingMailer::default()), &dir);

        let mut options = all_actions(String::new());
        options.should_email = false;
        options.should_send_api_request = false;

        let report = dispatcher.dispatch(&options, uuid::Uuid::new_v4()).await;
        assert!(report.alert.is_failed());
        assert_eq!(report.alert_id, None);
    }

    #[test]
    fn test_validate_rejects_malformed_requests() {
        let mut options = all_actions("https://hooks.example.com/fleet".to_string());
        assert!(validate(&options).is_ok());

        options.api_request_url = "not a url".to_string();
        assert!(matches!(validate(&options), Err(Error::BadRequest { .. })));

        options.api_request_url = "https://hooks.example.com/fleet".to_string();
        options.api_request_method = "GE T".to_string();
        assert!(matches!(validate(&options), Err(Error::BadRequest { .. })));

        options.api_request_method = "POST".to_string();
        options.email_to = " ".to_string();
        assert!(matches!(validate(&options), Err(Error::BadRequest { .. })));

        // Fields of disabled actions are not checked
        let options = AlertOptions {
            should_alert: true,
            alert_message: "hi".to_string(),
            ..Default::default()
        };
        assert!(validate(&options).is_ok());
    }
}
