//! Alert dispatcher
//!
//! Delivers one SMS per request through a pluggable transport. Delivery is
//! attempted exactly once and bounded by a timeout; there is no retry. When
//! no usable transport is configured the dispatcher runs in simulation mode
//! and only logs and audits the message.

use crate::alert::Alert;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use wildwatch_core::{Error, Result};
use wildwatch_telemetry::{
    AuditEvent, AuditLog, AuditSeverity, ALERT_FAILED, ALERT_SENT, ALERT_SIMULATED,
};

pub const DEFAULT_TWILIO_API_BASE: &str = "https://api.twilio.com";
const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Outbound SMS channel
#[async_trait]
pub trait SmsTransport: Send + Sync {
    /// Send `body` to `to`, returning the provider's message id
    async fn send(&self, to: &str, body: &str) -> Result<String>;

    /// Get the transport name
    fn name(&self) -> &str;
}

/// Twilio account settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwilioCredentials {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
}

impl TwilioCredentials {
    /// Placeholder or truncated credentials are rejected before any request is made
    pub fn is_plausible(&self) -> bool {
        self.account_sid.starts_with("AC")
            && self.account_sid.len() > 30
            && self.auth_token.len() > 30
    }
}

#[derive(Debug, Deserialize)]
struct TwilioMessage {
    sid: String,
}

/// SMS through the Twilio Messages API
pub struct TwilioTransport {
    client: reqwest::Client,
    credentials: TwilioCredentials,
    api_base: String,
}

impl TwilioTransport {
    pub fn new(credentials: TwilioCredentials, client: reqwest::Client) -> Self {
        Self {
            client,
            credentials,
            api_base: DEFAULT_TWILIO_API_BASE.to_string(),
        }
    }

    /// Point at a different API host
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base, self.credentials.account_sid
        )
    }
}

#[async_trait]
impl SmsTransport for TwilioTransport {
    async fn send(&self, to: &str, body: &str) -> Result<String> {
        let form = [
            ("To", to),
            ("From", self.credentials.from_number.as_str()),
            ("Body", body),
        ];

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.credentials.account_sid, Some(&self.credentials.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::transport(format!("twilio request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::transport(format!("twilio returned {}: {}", status, detail)));
        }

        let message: TwilioMessage = response
            .json()
            .await
            .map_err(|e| Error::transport(format!("unexpected twilio response: {}", e)))?;
        Ok(message.sid)
    }

    fn name(&self) -> &str {
        "twilio"
    }
}

/// Sends composed alerts and audits every attempt
#[derive(Clone)]
pub struct AlertDispatcher {
    transport: Option<Arc<dyn SmsTransport>>,
    audit: AuditLog,
    send_timeout: Duration,
}

impl AlertDispatcher {
    pub fn new(transport: Option<Arc<dyn SmsTransport>>, audit: AuditLog) -> Self {
        Self {
            transport,
            audit,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    /// Dispatcher that never contacts a provider
    pub fn simulated(audit: AuditLog) -> Self {
        Self::new(None, audit)
    }

    /// Use Twilio when the credentials look real, otherwise simulate
    pub fn from_credentials(
        credentials: Option<TwilioCredentials>,
        client: reqwest::Client,
        audit: AuditLog,
    ) -> Self {
        match credentials {
            Some(credentials) if credentials.is_plausible() => {
                info!("Twilio transport enabled, sending from {}", credentials.from_number);
                let transport: Arc<dyn SmsTransport> =
                    Arc::new(TwilioTransport::new(credentials, client));
                Self::new(Some(transport), audit)
            }
            _ => {
                warn!("Using simulated SMS notifications (Twilio credentials not set)");
                Self::simulated(audit)
            }
        }
    }

    pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    pub fn is_simulated(&self) -> bool {
        self.transport.is_none()
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Deliver `alert` to `recipient`. Returns whether delivery succeeded;
    /// a simulated send counts as success.
    pub async fn dispatch(&self, alert: &Alert, recipient: &str) -> bool {
        let body = alert.compose_message();

        let Some(transport) = self.transport.as_ref() else {
            warn!("SIMULATED SMS to {}: {}", recipient, body);
            self.record(ALERT_SIMULATED, AuditSeverity::Info, alert, recipient, &body, None);
            return true;
        };

        let outcome = tokio::time::timeout(self.send_timeout, transport.send(recipient, &body))
            .await
            .unwrap_or(Err(Error::Timeout));

        match outcome {
            Ok(message_id) => {
                info!(
                    "Sent SMS notification to {} via {}, id: {}",
                    recipient,
                    transport.name(),
                    message_id
                );
                self.record(ALERT_SENT, AuditSeverity::High, alert, recipient, &body, None);
                true
            }
            Err(e) => {
                error!("Failed to send SMS to {}: {}", recipient, e);
                self.record(
                    ALERT_FAILED,
                    AuditSeverity::Warning,
                    alert,
                    recipient,
                    &body,
                    Some(e.to_string()),
                );
                false
            }
        }
    }

    fn record(
        &self,
        event_type: &str,
        severity: AuditSeverity,
        alert: &Alert,
        recipient: &str,
        body: &str,
        failure: Option<String>,
    ) {
        self.audit.record(
            AuditEvent::new(event_type)
                .with_severity(severity)
                .with_data(serde_json::json!({
                    "threat_type": alert.threat_type,
                    "recipient": recipient,
                    "message": body,
                    "error": failure,
                })),
        );
    }
}
