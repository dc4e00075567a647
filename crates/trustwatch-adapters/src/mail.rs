// crates/trustwatch-adapters/src/mail.rs
// ============================================================================
// Module: Mail Adapter
// Description: Demo and real implementations of MailAdapter (§4.5 step 6).
// Purpose: Deliver Critical-severity alert emails without coupling the
//          change-event pipeline to a specific mail provider's API.
// Dependencies: reqwest, trustwatch-core
// ============================================================================

//! ## Overview
//! [`WebhookMailAdapter`] posts the alert as JSON to a configured webhook
//! URL — the integration shape most transactional-mail providers (and
//! generic notification relays) expose, so swapping providers is a URL and
//! auth-header change rather than a new adapter. [`DemoMailAdapter`]
//! records sent mail in memory for assertions in tests and demo runs.

use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use trustwatch_core::interfaces::AlertEmail;
use trustwatch_core::interfaces::MailAdapter;
use trustwatch_core::interfaces::MailError;

// ============================================================================
// SECTION: Real Adapter
// ============================================================================

/// Posts alert emails to a webhook endpoint as JSON.
///
/// # Invariants
/// - A non-2xx response is surfaced as [`MailError::SendFailed`].
pub struct WebhookMailAdapter {
    /// Destination webhook URL.
    webhook_url: String,
    /// Bearer token attached to outbound requests, if configured.
    auth_token: Option<String>,
    /// HTTP client used for delivery.
    client: reqwest::blocking::Client,
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    recipient: &'a str,
    subject: &'a str,
    body: &'a str,
}

impl WebhookMailAdapter {
    /// Creates a new webhook mail adapter.
    ///
    /// # Errors
    /// Returns [`MailError`] when the HTTP client cannot be constructed.
    pub fn new(webhook_url: String, auth_token: Option<String>) -> Result<Self, MailError> {
        let client = reqwest::blocking::Client::builder().build().map_err(|err| MailError::SendFailed {
            recipient: webhook_url.clone(),
            message: err.to_string(),
        })?;
        Ok(Self { webhook_url, auth_token, client })
    }
}

#[async_trait]
impl MailAdapter for WebhookMailAdapter {
    async fn send(&self, email: &AlertEmail) -> Result<(), MailError> {
        let payload = WebhookPayload { recipient: &email.recipient, subject: &email.subject, body: &email.body };
        let mut request = self.client.post(&self.webhook_url).json(&payload);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().map_err(|err| MailError::SendFailed { recipient: email.recipient.clone(), message: err.to_string() })?;
        if !response.status().is_success() {
            return Err(MailError::SendFailed {
                recipient: email.recipient.clone(),
                message: format!("webhook returned status {}", response.status()),
            });
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Demo Adapter
// ============================================================================

/// Records alert emails in memory instead of sending them.
///
/// # Invariants
/// - `sent()` returns emails in send order.
#[derive(Default)]
pub struct DemoMailAdapter {
    /// Emails accepted so far, in send order.
    sent: Mutex<Vec<AlertEmail>>,
}

impl DemoMailAdapter {
    /// Creates a new, empty demo mail adapter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every email accepted so far, in send order.
    #[must_use]
    pub fn sent(&self) -> Vec<AlertEmail> {
        self.sent.lock().map(|guard| guard.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl MailAdapter for DemoMailAdapter {
    async fn send(&self, email: &AlertEmail) -> Result<(), MailError> {
        let mut guard = self.sent.lock().map_err(|_| MailError::SendFailed {
            recipient: email.recipient.clone(),
            message: "demo mail store poisoned".to_string(),
        })?;
        guard.push(email.clone());
        Ok(())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]
mod tests {
    use super::*;

    #[tokio::test]
    async fn demo_adapter_records_sent_mail() {
        let adapter = DemoMailAdapter::new();
        let email = AlertEmail {
            recipient: "owner@acme.example".to_string(),
            subject: "Critical trust claim change".to_string(),
            body: "A monitored claim changed.".to_string(),
        };
        adapter.send(&email).await.unwrap();
        let sent = adapter.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, "owner@acme.example");
    }
}
