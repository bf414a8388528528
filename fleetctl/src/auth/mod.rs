//! API token authentication.
//!
//! Programmatic callers authenticate with an API token issued to their organization, sent as
//! `Authorization: {token}:{secret}`. Validation lives in [`api_token`]; the [`caller::ApiCaller`]
//! extractor runs it for every protected route and hands the handler the caller's organization.

pub mod api_token;
pub mod caller;

pub use caller::ApiCaller;
