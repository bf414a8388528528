//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers, nested under `/api`
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! - **Agent intake** (`/api/devices/heartbeat`, `/api/devices/{id}/offline`): unauthenticated
//! - **Devices** (`/api/devices/*`), **Device groups** (`/api/device-groups/*`)
//! - **Alerts** (`/api/alerts/*`)
//! - **Members** (`/api/users/*`, `/api/invites/*`, `/api/organization`)
//! - **Automation** (`/api/api-tokens/*`, `/api/command-contexts/*`, `/api/files/*`)
//! - **Events** (`/api/events`)
//!
//! Everything except agent intake requires `Authorization: {token}:{secret}`, see
//! [`crate::auth::ApiCaller`].
//!
//! # OpenAPI Documentation
//!
//! Handlers are annotated with `utoipa`; the reference is served at `/docs`.

pub mod handlers;
pub mod models;
