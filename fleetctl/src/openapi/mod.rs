//! OpenAPI documentation for the `/api` surface, served by Scalar at `/docs`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
};

use crate::api::{handlers, models};
use crate::db::models::{devices::Drive, event_logs::EventSeverity, users::UserOptions};

/// `Authorization: {token}:{secret}` as issued by `POST /api/api-tokens`.
struct ApiTokenSecurityAddon;

impl Modify for ApiTokenSecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "ApiToken".to_string(),
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                    "Authorization",
                    "API token and secret joined by a colon:\n\n```\nAuthorization: TOKEN:SECRET\n```",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "fleetctl",
        description = "Multi-tenant device fleet control plane",
    ),
    servers((url = "/api")),
    paths(
        handlers::alerts::create_alert,
        handlers::alerts::list_alerts,
        handlers::alerts::delete_alert,
        handlers::devices::heartbeat,
        handlers::devices::mark_offline,
        handlers::devices::list_devices,
        handlers::devices::get_device,
        handlers::devices::update_device,
        handlers::devices::update_device_tags,
        handlers::devices::setup_device,
        handlers::devices::remove_devices,
        handlers::devices::filter_devices,
        handlers::device_groups::list_device_groups,
        handlers::device_groups::create_device_group,
        handlers::device_groups::delete_device_group,
        handlers::invites::list_invites,
        handlers::invites::create_invite,
        handlers::invites::delete_invite,
        handlers::invites::redeem_invite,
        handlers::api_tokens::list_api_tokens,
        handlers::api_tokens::create_api_token,
        handlers::api_tokens::rename_api_token,
        handlers::api_tokens::delete_api_token,
        handlers::events::list_events,
        handlers::command_contexts::upsert_command_context,
        handlers::command_contexts::get_command_context,
        handlers::command_contexts::list_command_contexts,
        handlers::shared_files::upload_file,
        handlers::shared_files::download_file,
        handlers::organizations::get_organization,
        handlers::organizations::update_organization,
        handlers::users::list_users,
        handlers::users::get_user,
        handlers::users::set_user_admin,
        handlers::users::remove_user,
        handlers::users::get_user_options,
        handlers::users::update_user_options,
        handlers::users::get_user_prompt,
    ),
    components(schemas(
        models::alerts::AlertOptions,
        models::alerts::AlertResponse,
        models::devices::DeviceHeartbeat,
        models::devices::DeviceResponse,
        models::devices::DeviceUpdate,
        models::devices::DeviceTagsUpdate,
        models::devices::DeviceSetupOptions,
        models::devices::RemoveDevicesRequest,
        models::devices::RemoveDevicesResponse,
        models::devices::FilterDevicesRequest,
        models::devices::FilterDevicesResponse,
        models::device_groups::DeviceGroupCreate,
        models::device_groups::DeviceGroupResponse,
        models::invites::InviteCreate,
        models::invites::InviteRedeem,
        models::invites::InviteRedeemResponse,
        models::invites::InviteResponse,
        models::api_tokens::ApiTokenCreate,
        models::api_tokens::ApiTokenUpdate,
        models::api_tokens::ApiTokenResponse,
        models::api_tokens::ApiTokenCreatedResponse,
        models::events::EventLogResponse,
        models::command_contexts::CommandContextUpsert,
        models::command_contexts::CommandContextResponse,
        models::shared_files::SharedFileUpload,
        models::shared_files::SharedFileCreatedResponse,
        models::organizations::OrganizationUpdate,
        models::organizations::OrganizationResponse,
        models::users::UserAdminUpdate,
        models::users::UserRemovedResponse,
        models::users::UserPromptResponse,
        models::users::UserResponse,
        Drive,
        EventSeverity,
        UserOptions,
    )),
    modifiers(&ApiTokenSecurityAddon),
    tags(
        (name = "alerts", description = "Alert intake and history"),
        (name = "devices", description = "Agent heartbeats and device management"),
        (name = "device-groups", description = "Device groups"),
        (name = "invites", description = "Invite links"),
        (name = "api-tokens", description = "API tokens for programmatic access"),
        (name = "events", description = "Organization event log"),
        (name = "command-contexts", description = "Command result payloads"),
        (name = "files", description = "Shared files"),
        (name = "organization", description = "The caller's organization"),
        (name = "users", description = "Organization members"),
    )
)]
pub struct ApiDoc;
