use async_trait::async_trait;
use serde::Serialize;

use crate::config::{EmailConfig, EmailCredentials};
use crate::error::TransportError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    #[serde(rename = "text")]
    pub body: String,
}

/// Anything that can submit a single plain-text email.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, email: &OutboundEmail) -> Result<(), TransportError>;
}

/// Submits mail to an HTTP email API as a JSON document.
///
/// No retries are attempted; a non-2xx response is reported as
/// [`TransportError::Rejected`] with the provider's response body.
pub struct HttpEmailTransport {
    api_url: String,
    credentials: EmailCredentials,
    client: reqwest::Client,
}

impl HttpEmailTransport {
    pub fn new(config: &EmailConfig) -> Result<Self, TransportError> {
        if config.api_url.trim().is_empty() {
            return Err(TransportError::NotConfigured("api url is empty".into()));
        }
        Ok(Self {
            api_url: config.api_url.clone(),
            credentials: config.credentials.clone(),
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl EmailTransport for HttpEmailTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn send(&self, email: &OutboundEmail) -> Result<(), TransportError> {
        let request = self.client.post(&self.api_url).json(email);
        let request = match &self.credentials {
            EmailCredentials::ApiKey(key) => request.bearer_auth(key),
            EmailCredentials::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
        };

        let resp = request.send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Rejected { status, body });
        }

        tracing::debug!(to = %email.to, "email accepted by provider");
        Ok(())
    }
}
