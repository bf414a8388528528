//! End-to-end tests through the HTTP surface.

use crate::test_utils::{create_test_app, create_test_app_with_config, create_test_config, create_test_tenant, create_test_user};
use axum::http::StatusCode;
use serde_json::{Value, json};
use sqlx::PgPool;
use uuid::Uuid;

const AUTHORIZATION: &str = "authorization";

async fn event_messages(pool: &PgPool, org_id: Option<Uuid>) -> Vec<String> {
    sqlx::query_scalar("SELECT message FROM event_logs WHERE organization_id IS NOT DISTINCT FROM $1 ORDER BY timestamp")
        .bind(org_id)
        .fetch_all(pool)
        .await
        .unwrap()
}

fn heartbeat(device_id: &str, org_id: Uuid) -> Value {
    json!({
        "id": device_id,
        "organization_id": org_id,
        "device_name": "DESK-07",
        "cpu_utilization": 0.25,
        "total_memory": 16.0,
        "platform": "Windows",
        "processor_count": 8,
        "agent_version": "1.4.2"
    })
}

#[sqlx::test]
#[test_log::test]
async fn test_healthz_and_docs_are_public(pool: PgPool) {
    let (server, _bg) = create_test_app(pool).await;

    let health = server.get("/healthz").await;
    health.assert_status_ok();
    health.assert_text("OK");

    server.get("/docs").await.assert_status_ok();
}

#[sqlx::test]
#[test_log::test]
async fn test_missing_or_invalid_token_is_rejected_and_audited(pool: PgPool) {
    let (server, _bg) = create_test_app(pool.clone()).await;
    let (org, _) = create_test_tenant(&pool, "Acme").await;

    server.get("/api/devices").await.assert_status(StatusCode::UNAUTHORIZED);
    server
        .get("/api/devices")
        .add_header(AUTHORIZATION, "no-colon-here")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    // Neither request reached the authenticator
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM event_logs").fetch_one(&pool).await.unwrap();
    assert_eq!(count, 0);

    server
        .get("/api/devices")
        .add_header(AUTHORIZATION, "unknown-token:whatever")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    let unscoped = event_messages(&pool, None).await;
    assert_eq!(unscoped.len(), 1);
    assert!(unscoped[0].contains("Token: unknown-token."));
    assert!(unscoped[0].contains("Path: /api/devices."));
    assert!(unscoped[0].contains("Validated: false"));
    assert!(event_messages(&pool, Some(org.id)).await.is_empty());
}

#[sqlx::test]
#[test_log::test]
async fn test_wrong_secret_is_audited_against_the_token_org(pool: PgPool) {
    let (server, _bg) = create_test_app(pool.clone()).await;
    let (org, auth) = create_test_tenant(&pool, "Acme").await;
    let token = auth.split_once(':').unwrap().0;

    server
        .get("/api/devices")
        .add_header(AUTHORIZATION, format!("{token}:not-the-secret"))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    server.get("/api/devices").add_header(AUTHORIZATION, &auth).await.assert_status_ok();

    let messages = event_messages(&pool, Some(org.id)).await;
    assert_eq!(messages.len(), 2);
    assert!(messages[0].contains("Validated: false"));
    assert!(messages[1].contains("Validated: true"));
}

#[sqlx::test]
#[test_log::test]
async fn test_alert_runs_every_action_and_logs_failures(pool: PgPool) {
    let webhook = wiremock::MockServer::start().await;
    wiremock::Mock::given(wiremock::matchers::method("PUT"))
        .and(wiremock::matchers::path("/hooks/alert"))
        .and(wiremock::matchers::header("x-fleet", "acme"))
        .respond_with(wiremock::ResponseTemplate::new(200))
        .expect(1)
        .mount(&webhook)
        .await;

    let (server, _bg) = create_test_app(pool.clone()).await;
    let (org, auth) = create_test_tenant(&pool, "Acme").await;

    server
        .post("/api/alerts")
        .add_header(AUTHORIZATION, &auth)
        .json(&json!({
            "should_alert": true,
            "alert_device_id": "desk-07",
            "alert_message": "Disk almost full",
            "should_email": true,
            "email_to": "not an address",
            "email_subject": "Disk",
            "email_body": "<p>Disk almost full</p>",
            "should_send_api_request": true,
            "api_request_url": format!("{}/hooks/alert", webhook.uri()),
            "api_request_method": "put",
            "api_request_headers": {"x-fleet": "acme"},
            "api_request_body": "{\"disk\": 0.97}"
        }))
        .await
        .assert_status_ok();

    let alerts = server.get("/api/alerts").add_header(AUTHORIZATION, &auth).await;
    alerts.assert_status_ok();
    let alerts: Vec<Value> = alerts.json();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["message"], "Disk almost full");
    assert_eq!(alerts[0]["device_id"], "desk-07");

    let messages = event_messages(&pool, Some(org.id)).await;
    let failures: Vec<_> = messages.iter().filter(|m| m.starts_with("Alert email failed")).collect();
    assert_eq!(failures.len(), 1, "{messages:?}");
    assert!(messages.iter().any(|m| m == "Alert API Response Status: 200 OK."));
    assert!(!messages.iter().any(|m| m.starts_with("Alert webhook failed")));
}

#[sqlx::test]
#[test_log::test]
async fn test_malformed_alert_is_rejected_before_any_action(pool: PgPool) {
    let (server, _bg) = create_test_app(pool.clone()).await;
    let (_, auth) = create_test_tenant(&pool, "Acme").await;

    server
        .post("/api/alerts")
        .add_header(AUTHORIZATION, &auth)
        .json(&json!({
            "should_alert": true,
            "alert_message": "never stored",
            "should_send_api_request": true,
            "api_request_url": "not a url"
        }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM alerts").fetch_one(&pool).await.unwrap();
    assert_eq!(count, 0);
}

#[sqlx::test]
#[test_log::test]
async fn test_alert_delete_is_tenant_scoped(pool: PgPool) {
    let (server, _bg) = create_test_app(pool.clone()).await;
    let (_, acme) = create_test_tenant(&pool, "Acme").await;
    let (_, globex) = create_test_tenant(&pool, "Globex").await;

    server
        .post("/api/alerts")
        .add_header(AUTHORIZATION, &acme)
        .json(&json!({"should_alert": true, "alert_message": "Offline for 3 days"}))
        .await
        .assert_status_ok();

    let alerts: Vec<Value> = server.get("/api/alerts").add_header(AUTHORIZATION, &acme).await.json();
    let alert_id = alerts[0]["id"].as_str().unwrap().to_string();

    let globex_view: Vec<Value> = server.get("/api/alerts").add_header(AUTHORIZATION, &globex).await.json();
    assert!(globex_view.is_empty());

    server
        .post(&format!("/api/alerts/{alert_id}/delete"))
        .add_header(AUTHORIZATION, &globex)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    server
        .post(&format!("/api/alerts/{alert_id}/delete"))
        .add_header(AUTHORIZATION, &acme)
        .await
        .assert_status_ok();

    // Already gone looks the same as never visible
    server
        .post(&format!("/api/alerts/{alert_id}/delete"))
        .add_header(AUTHORIZATION, &acme)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[sqlx::test]
#[test_log::test]
async fn test_heartbeat_for_unknown_org_is_rejected(pool: PgPool) {
    let (server, _bg) = create_test_app(pool.clone()).await;

    server
        .post("/api/devices/heartbeat")
        .json(&heartbeat("desk-07", Uuid::new_v4()))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let devices: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM devices").fetch_one(&pool).await.unwrap();
    assert_eq!(devices, 0);

    let events = event_messages(&pool, None).await;
    assert_eq!(events.len(), 1);
    assert!(events[0].contains("does not exist"));
}

#[sqlx::test]
#[test_log::test]
async fn test_heartbeat_devices_are_visible_to_their_org_only(pool: PgPool) {
    let (server, _bg) = create_test_app(pool.clone()).await;
    let (org, acme) = create_test_tenant(&pool, "Acme").await;
    let (_, globex) = create_test_tenant(&pool, "Globex").await;

    let stored = server.post("/api/devices/heartbeat").json(&heartbeat("desk-07", org.id)).await;
    stored.assert_status_ok();
    let stored: Value = stored.json();
    assert_eq!(stored["is_online"], true);

    let listed: Vec<Value> = server.get("/api/devices").add_header(AUTHORIZATION, &acme).await.json();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["device_name"], "DESK-07");

    let listed: Vec<Value> = server.get("/api/devices").add_header(AUTHORIZATION, &globex).await.json();
    assert!(listed.is_empty());
    server
        .get("/api/devices/desk-07")
        .add_header(AUTHORIZATION, &globex)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    server
        .post("/api/devices/desk-07/offline")
        .await
        .assert_status(StatusCode::NO_CONTENT);
    let device: Value = server.get("/api/devices/desk-07").add_header(AUTHORIZATION, &acme).await.json();
    assert_eq!(device["is_online"], false);
}

#[sqlx::test]
#[test_log::test]
async fn test_remove_devices_ignores_other_tenants(pool: PgPool) {
    let (server, _bg) = create_test_app(pool.clone()).await;
    let (acme_org, acme) = create_test_tenant(&pool, "Acme").await;
    let (globex_org, globex) = create_test_tenant(&pool, "Globex").await;

    server.post("/api/devices/heartbeat").json(&heartbeat("acme-1", acme_org.id)).await.assert_status_ok();
    server.post("/api/devices/heartbeat").json(&heartbeat("globex-1", globex_org.id)).await.assert_status_ok();

    let removed = server
        .post("/api/devices/remove")
        .add_header(AUTHORIZATION, &acme)
        .json(&json!({"device_ids": ["acme-1", "globex-1"]}))
        .await;
    removed.assert_status_ok();
    removed.assert_json(&json!({"removed": 1}));

    let listed: Vec<Value> = server.get("/api/devices").add_header(AUTHORIZATION, &globex).await.json();
    assert_eq!(listed.len(), 1);
}

#[sqlx::test]
#[test_log::test]
async fn test_shared_file_round_trip_is_tenant_scoped(pool: PgPool) {
    let (server, _bg) = create_test_app(pool.clone()).await;
    let (_, acme) = create_test_tenant(&pool, "Acme").await;
    let (_, globex) = create_test_tenant(&pool, "Globex").await;

    let part = axum_test::multipart::Part::bytes(b"install.ps1 contents".as_slice())
        .file_name("install.ps1")
        .mime_type("text/plain");
    let uploaded = server
        .post("/api/files")
        .add_header(AUTHORIZATION, &acme)
        .multipart(axum_test::multipart::MultipartForm::new().add_part("file", part))
        .await;
    uploaded.assert_status(StatusCode::CREATED);
    let id = uploaded.json::<Value>()["id"].as_str().unwrap().to_string();

    let downloaded = server.get(&format!("/api/files/{id}")).add_header(AUTHORIZATION, &acme).await;
    downloaded.assert_status_ok();
    assert_eq!(downloaded.header("content-type"), "text/plain");
    assert_eq!(downloaded.as_bytes().as_ref(), b"install.ps1 contents");

    server
        .get(&format!("/api/files/{id}"))
        .add_header(AUTHORIZATION, &globex)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[sqlx::test]
#[test_log::test]
async fn test_upload_without_file_field_is_rejected(pool: PgPool) {
    let (server, _bg) = create_test_app(pool.clone()).await;
    let (_, acme) = create_test_tenant(&pool, "Acme").await;

    server
        .post("/api/files")
        .add_header(AUTHORIZATION, &acme)
        .multipart(axum_test::multipart::MultipartForm::new().add_text("note", "no file"))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[sqlx::test]
#[test_log::test]
async fn test_api_token_lifecycle(pool: PgPool) {
    let (server, _bg) = create_test_app(pool.clone()).await;
    let (_, acme) = create_test_tenant(&pool, "Acme").await;

    let created = server
        .post("/api/api-tokens")
        .add_header(AUTHORIZATION, &acme)
        .json(&json!({"name": "ci"}))
        .await;
    created.assert_status(StatusCode::CREATED);
    let created: Value = created.json();
    let new_auth = format!("{}:{}", created["token"].as_str().unwrap(), created["secret"].as_str().unwrap());
    let id = created["id"].as_str().unwrap().to_string();

    let tokens: Vec<Value> = server.get("/api/api-tokens").add_header(AUTHORIZATION, &new_auth).await.json();
    assert_eq!(tokens.len(), 2);
    assert!(tokens.iter().all(|t| t.get("secret").is_none()));

    server
        .delete(&format!("/api/api-tokens/{id}"))
        .add_header(AUTHORIZATION, &acme)
        .await
        .assert_status(StatusCode::NO_CONTENT);

    server
        .get("/api/api-tokens")
        .add_header(AUTHORIZATION, &new_auth)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[sqlx::test]
#[test_log::test]
async fn test_event_range_must_not_be_inverted(pool: PgPool) {
    let (server, _bg) = create_test_app(pool.clone()).await;
    let (_, acme) = create_test_tenant(&pool, "Acme").await;

    server
        .get("/api/events")
        .add_query_param("from", "2026-03-02T00:00:00Z")
        .add_query_param("to", "2026-03-01T00:00:00Z")
        .add_header(AUTHORIZATION, &acme)
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    // The audit event from this request is inside the default window
    let events: Vec<Value> = server.get("/api/events").add_header(AUTHORIZATION, &acme).await.json();
    assert!(!events.is_empty());
}

#[sqlx::test]
#[test_log::test]
async fn test_members_of_other_orgs_are_not_visible(pool: PgPool) {
    let (server, _bg) = create_test_app(pool.clone()).await;
    let (acme_org, acme) = create_test_tenant(&pool, "Acme").await;
    let (globex_org, _) = create_test_tenant(&pool, "Globex").await;
    let alice = create_test_user(&pool, acme_org.id, "alice", true).await;
    let bob = create_test_user(&pool, globex_org.id, "bob", false).await;

    let users: Vec<Value> = server.get("/api/users").add_header(AUTHORIZATION, &acme).await.json();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["username"], "alice");

    server
        .get(&format!("/api/users/{}", alice.id))
        .add_header(AUTHORIZATION, &acme)
        .await
        .assert_status_ok();
    server
        .get(&format!("/api/users/{}", bob.id))
        .add_header(AUTHORIZATION, &acme)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[sqlx::test]
#[test_log::test]
async fn test_invite_cannot_pull_in_a_member_of_another_org(pool: PgPool) {
    let (server, _bg) = create_test_app(pool.clone()).await;
    let (attacker_org, attacker) = create_test_tenant(&pool, "Attacker").await;
    let (victim_org, _) = create_test_tenant(&pool, "Victim").await;
    let victim = create_test_user(&pool, victim_org.id, "victim", false).await;

    let invite = server
        .post("/api/invites")
        .add_header(AUTHORIZATION, &attacker)
        .json(&json!({"invited_user": "victim", "is_admin": true}))
        .await;
    invite.assert_status(StatusCode::CREATED);
    let invite_id = invite.json::<Value>()["id"].as_str().unwrap().to_string();

    server
        .post(&format!("/api/invites/{invite_id}/redeem"))
        .add_header(AUTHORIZATION, &attacker)
        .json(&json!({"username": "victim"}))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    let (org_id, is_admin): (Uuid, bool) = sqlx::query_as("SELECT organization_id, is_administrator FROM users WHERE id = $1")
        .bind(victim.id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(org_id, victim_org.id);
    assert!(!is_admin);
    assert_ne!(org_id, attacker_org.id);

    let pending: Vec<Value> = server.get("/api/invites").add_header(AUTHORIZATION, &attacker).await.json();
    assert_eq!(pending.len(), 1);
}

#[sqlx::test]
#[test_log::test]
async fn test_heartbeat_for_known_device_keeps_its_org(pool: PgPool) {
    let (server, _bg) = create_test_app(pool.clone()).await;
    let (org, acme) = create_test_tenant(&pool, "Acme").await;

    server.post("/api/devices/heartbeat").json(&heartbeat("desk-07", org.id)).await.assert_status_ok();

    let mut stray = heartbeat("desk-07", Uuid::new_v4());
    stray["cpu_utilization"] = json!(0.9);
    let refreshed = server.post("/api/devices/heartbeat").json(&stray).await;
    refreshed.assert_status_ok();
    let refreshed: Value = refreshed.json();
    assert_eq!(refreshed["organization_id"], json!(org.id));
    assert_eq!(refreshed["cpu_utilization"], 0.9);

    let device: Value = server.get("/api/devices/desk-07").add_header(AUTHORIZATION, &acme).await.json();
    assert_eq!(device["cpu_utilization"], 0.9);
    assert!(event_messages(&pool, None).await.is_empty());
}

#[sqlx::test]
#[test_log::test]
async fn test_upload_larger_than_axum_default_limit(pool: PgPool) {
    let (server, _bg) = create_test_app(pool.clone()).await;
    let (_, acme) = create_test_tenant(&pool, "Acme").await;

    let payload: Vec<u8> = (0..3 * 1024 * 1024).map(|i| (i % 251) as u8).collect();
    let part = axum_test::multipart::Part::bytes(payload.clone())
        .file_name("agent-installer.msi")
        .mime_type("application/octet-stream");
    let uploaded = server
        .post("/api/files")
        .add_header(AUTHORIZATION, &acme)
        .multipart(axum_test::multipart::MultipartForm::new().add_part("file", part))
        .await;
    uploaded.assert_status(StatusCode::CREATED);
    let id = uploaded.json::<Value>()["id"].as_str().unwrap().to_string();

    let downloaded = server.get(&format!("/api/files/{id}")).add_header(AUTHORIZATION, &acme).await;
    downloaded.assert_status_ok();
    assert_eq!(downloaded.as_bytes().len(), payload.len());
    assert_eq!(downloaded.as_bytes().as_ref(), payload.as_slice());
}

#[sqlx::test]
#[test_log::test]
async fn test_upload_over_configured_limit_is_rejected(pool: PgPool) {
    let mut config = create_test_config();
    config.files.max_file_size = 64 * 1024;
    let (server, _bg) = create_test_app_with_config(pool.clone(), config).await;
    let (_, acme) = create_test_tenant(&pool, "Acme").await;

    let part = axum_test::multipart::Part::bytes(vec![7u8; 256 * 1024]).file_name("big.bin");
    let response = server
        .post("/api/files")
        .add_header(AUTHORIZATION, &acme)
        .multipart(axum_test::multipart::MultipartForm::new().add_part("file", part))
        .expect_failure()
        .await;
    assert!(response.status_code().is_client_error());

    let stored: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM shared_files").fetch_one(&pool).await.unwrap();
    assert_eq!(stored, 0);
}

#[sqlx::test]
#[test_log::test]
async fn test_missing_ids_are_not_found_but_foreign_ids_are_unauthorized(pool: PgPool) {
    let (server, _bg) = create_test_app(pool.clone()).await;
    let (_, acme) = create_test_tenant(&pool, "Acme").await;
    let (globex_org, globex) = create_test_tenant(&pool, "Globex").await;
    let bob = create_test_user(&pool, globex_org.id, "bob", false).await;
    server.post("/api/devices/heartbeat").json(&heartbeat("globex-1", globex_org.id)).await.assert_status_ok();
    let group = server
        .post("/api/device-groups")
        .add_header(AUTHORIZATION, &globex)
        .json(&json!({"name": "Lab"}))
        .await;
    group.assert_status(StatusCode::CREATED);
    let group_id = group.json::<Value>()["id"].as_str().unwrap().to_string();

    let nobody = Uuid::new_v4();
    server
        .get("/api/devices/never-seen")
        .add_header(AUTHORIZATION, &acme)
        .await
        .assert_status(StatusCode::NOT_FOUND);
    server
        .get(&format!("/api/users/{nobody}"))
        .add_header(AUTHORIZATION, &acme)
        .await
        .assert_status(StatusCode::NOT_FOUND);
    server
        .get(&format!("/api/files/{nobody}"))
        .add_header(AUTHORIZATION, &acme)
        .await
        .assert_status(StatusCode::NOT_FOUND);
    server
        .get(&format!("/api/command-contexts/{nobody}"))
        .add_header(AUTHORIZATION, &acme)
        .await
        .assert_status(StatusCode::NOT_FOUND);
    server
        .delete(&format!("/api/device-groups/{nobody}"))
        .add_header(AUTHORIZATION, &acme)
        .await
        .assert_status(StatusCode::NOT_FOUND);
    server
        .delete(&format!("/api/invites/{nobody}"))
        .add_header(AUTHORIZATION, &acme)
        .await
        .assert_status(StatusCode::NOT_FOUND);
    server
        .delete(&format!("/api/api-tokens/{nobody}"))
        .add_header(AUTHORIZATION, &acme)
        .await
        .assert_status(StatusCode::NOT_FOUND);

    server
        .get("/api/devices/globex-1")
        .add_header(AUTHORIZATION, &acme)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    server
        .put(&format!("/api/users/{}/admin", bob.id))
        .add_header(AUTHORIZATION, &acme)
        .json(&json!({"is_administrator": true}))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    server
        .delete(&format!("/api/device-groups/{group_id}"))
        .add_header(AUTHORIZATION, &acme)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    // Alerts do not distinguish the two
    server
        .post(&format!("/api/alerts/{nobody}/delete"))
        .add_header(AUTHORIZATION, &acme)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}
