//! Outbound notifier - sends a text message to one recipient
//!
//! Calls are best-effort: failures are logged and returned, never retried.

use crate::config::Config;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, error};

/// Anything that can deliver a text message to a recipient id
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipient: &str, text: &str) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    recipient: Recipient<'a>,
    message: MessageBody<'a>,
}

#[derive(Debug, Serialize)]
struct Recipient<'a> {
    id: &'a str,
}

#[derive(Debug, Serialize)]
struct MessageBody<'a> {
    text: &'a str,
}

/// Notifier backed by the Graph API send endpoint
pub struct GraphNotifier {
    http: Client,
    url: String,
    access_token: String,
}

impl GraphNotifier {
    pub fn new(config: &Config) -> Self {
        Self::with_client(Client::new(), &config.graph_api_url, &config.page_access_token)
    }

    pub fn with_client(http: Client, url: &str, access_token: &str) -> Self {
        Self {
            http,
            url: url.to_string(),
            access_token: access_token.to_string(),
        }
    }
}

#[async_trait]
impl Notifier for GraphNotifier {
    async fn send(&self, recipient: &str, text: &str) -> Result<()> {
        let body = SendRequest {
            recipient: Recipient { id: recipient },
            message: MessageBody { text },
        };

        let response = self
            .http
            .post(&self.url)
            .query(&[("access_token", self.access_token.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Error sending message to {}: {}", recipient, e);
                Error::Http(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Error sending message to {} ({}): {}", recipient, status, body);
            return Err(Error::SendRejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!("Sent message to {}", recipient);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_request_shape() {
        let body = SendRequest {
            recipient: Recipient { id: "42" },
            message: MessageBody { text: "hi" },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"recipient": {"id": "42"}, "message": {"text": "hi"}})
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_http_error() {
        // Port 9 (discard) is not listening on loopback
        let notifier = GraphNotifier::with_client(Client::new(), "http://127.0.0.1:9/me/messages", "t");
        let err = notifier.send("42", "hi").await.unwrap_err();
        assert!(matches!(err, Error::Http(_)));
    }
}
