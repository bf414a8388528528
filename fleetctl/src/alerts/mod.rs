//! Alert intake and fan-out.
//!
//! An alert request carries up to three independent actions: store an alert record, send an
//! email, and call a webhook. [`AlertDispatcher`] runs each requested action regardless of how the
//! others went, records every failure as an Error event scoped to the organization, and never
//! reports a failed action back to the caller.
//!
//! Email goes through the [`AlertMailer`] seam so the transport can be swapped out; the
//! production implementation is [`crate::email::EmailService`].

pub mod dispatcher;

use async_trait::async_trait;

use crate::email::EmailService;
use crate::errors::Error;
use crate::types::OrganizationId;

pub use dispatcher::{ActionOutcome, AlertDispatcher, DispatchReport};

/// Outbound email for alerts.
#[async_trait]
pub trait AlertMailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str, organization_id: OrganizationId) -> Result<(), Error>;
}

#[async_trait]
impl AlertMailer for EmailService {
    async fn send(&self, to: &str, subject: &str, body: &str, organization_id: OrganizationId) -> Result<(), Error> {
        tracing::debug!(org_id = %organization_id, "Sending alert email");
        self.send_email(to, None, subject, body).await
    }
}
