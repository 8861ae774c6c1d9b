//! HTTP mail relay client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use storefront_orders_store::{MailReceipt, Mailer, MailerError, OutgoingEmail};

use crate::config::MailerConfig;

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendEmailResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RelayErrorResponse {
    message: String,
}

/// Delivers order emails through a transactional mail relay.
///
/// Messages are posted as JSON to `{base_url}/emails` with a bearer API key.
#[derive(Clone)]
pub struct RelayMailer {
    client: Client,
    config: MailerConfig,
}

impl std::fmt::Debug for RelayMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayMailer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RelayMailer {
    /// Create a mailer.
    ///
    /// # Errors
    ///
    /// Returns `MailerError::Configuration` if the HTTP client cannot be built.
    pub fn new(config: MailerConfig) -> Result<Self, MailerError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| MailerError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Mailer for RelayMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<MailReceipt, MailerError> {
        let url = format!("{}/emails", self.config.base_url);
        let request = SendEmailRequest {
            from: &self.config.from,
            to: [&email.to],
            subject: &email.subject,
            html: &email.html,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| MailerError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<RelayErrorResponse>().await {
                Ok(body) => body.message,
                Err(_) => format!("HTTP {status}"),
            };
            return Err(MailerError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let sent: SendEmailResponse = response
            .json()
            .await
            .map_err(|e| MailerError::Transport(format!("unreadable relay response: {e}")))?;
        Ok(MailReceipt { message_id: sent.id })
    }
}
