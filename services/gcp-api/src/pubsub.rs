//! Cloud Pub/Sub API client
//!
//! Pull/acknowledge on subscriptions and publish on topics, over the
//! Pub/Sub v1 REST surface.

use crate::auth::TokenSource;
use crate::base_client::{BaseClient, ClientOptions};
use crate::error::{GcpApiError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Response of `subscriptions.pull`; an empty response carries no messages
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullResponse {
    #[serde(default)]
    pub received_messages: Vec<ReceivedMessage>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedMessage {
    pub ack_id: String,
    #[serde(default)]
    pub message: PubsubMessage,
    #[serde(default)]
    pub delivery_attempt: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PubsubMessage {
    /// Base64-encoded payload
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub publish_time: Option<String>,
}

impl PubsubMessage {
    /// Decoded payload bytes (empty when the message has no data)
    pub fn decoded_data(&self) -> Result<Vec<u8>> {
        match &self.data {
            None => Ok(Vec::new()),
            Some(data) => STANDARD
                .decode(data)
                .map_err(|e| GcpApiError::Decode(format!("Invalid message data: {}", e))),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishResponse {
    #[serde(default)]
    message_ids: Vec<String>,
}

/// Pub/Sub client
pub struct PubSubClient {
    base: BaseClient,
}

impl PubSubClient {
    pub const API_NAME: &'static str = "pubsub";

    /// Create a Pub/Sub client; uses ADC when `credentials` is `None`
    pub fn new(credentials: Option<Arc<dyn TokenSource>>) -> Result<Self> {
        Self::with_options(credentials, ClientOptions::default())
    }

    pub fn with_options(
        credentials: Option<Arc<dyn TokenSource>>,
        options: ClientOptions,
    ) -> Result<Self> {
        Ok(Self {
            base: BaseClient::new(Self::API_NAME, credentials, options)?,
        })
    }

    pub fn base(&self) -> &BaseClient {
        &self.base
    }

    /// Pull up to `max_messages` from a subscription
    ///
    /// `subscription` is the full name, `projects/{project}/subscriptions/{sub}`.
    pub async fn pull(
        &self,
        subscription: &str,
        max_messages: u32,
        return_immediately: bool,
    ) -> Result<PullResponse> {
        let request = self
            .base
            .request(Method::POST, format!("{}:pull", subscription))
            .json(json!({
                "returnImmediately": return_immediately,
                "maxMessages": max_messages,
            }));

        let response: PullResponse = self.base.execute(&request).await?;
        debug!(
            subscription = %subscription,
            messages = response.received_messages.len(),
            "Pulled from subscription"
        );
        Ok(response)
    }

    /// Acknowledge messages; does nothing for an empty id list
    pub async fn acknowledge(&self, subscription: &str, ack_ids: &[String]) -> Result<()> {
        if ack_ids.is_empty() {
            return Ok(());
        }

        let request = self
            .base
            .request(Method::POST, format!("{}:acknowledge", subscription))
            .json(json!({ "ackIds": ack_ids }));

        let _: Value = self.base.execute(&request).await?;
        debug!(subscription = %subscription, count = ack_ids.len(), "Acknowledged messages");
        Ok(())
    }

    /// Publish one message to a topic and return its message id
    ///
    /// `topic` is the full name, `projects/{project}/topics/{topic}`.
    pub async fn publish(
        &self,
        topic: &str,
        data: &[u8],
        attributes: &HashMap<String, String>,
    ) -> Result<String> {
        let mut message = json!({ "data": STANDARD.encode(data) });
        if !attributes.is_empty() {
            message["attributes"] = json!(attributes);
        }

        let request = self
            .base
            .request(Method::POST, format!("{}:publish", topic))
            .json(json!({ "messages": [message] }));

        let response: PublishResponse = self.base.execute(&request).await?;
        response
            .message_ids
            .into_iter()
            .next()
            .ok_or_else(|| GcpApiError::Decode("Publish response has no message id".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticToken;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SUBSCRIPTION: &str = "projects/forseti/subscriptions/inventory";

    fn pubsub_for(server: &MockServer) -> PubSubClient {
        let options = ClientOptions::default().root_url(server.uri());
        PubSubClient::with_options(Some(Arc::new(StaticToken::new("t"))), options).unwrap()
    }

    #[test]
    fn test_empty_pull_response() {
        let response: PullResponse = serde_json::from_str("{}").unwrap();
        assert!(response.received_messages.is_empty());
    }

    #[test]
    fn test_decoded_data() {
        let message = PubsubMessage {
            data: Some(STANDARD.encode("20170601T120000Z")),
            ..Default::default()
        };
        assert_eq!(message.decoded_data().unwrap(), b"20170601T120000Z");

        assert!(PubsubMessage::default().decoded_data().unwrap().is_empty());

        let broken = PubsubMessage {
            data: Some("***".to_string()),
            ..Default::default()
        };
        assert!(matches!(broken.decoded_data(), Err(GcpApiError::Decode(_))));
    }

    #[tokio::test]
    async fn test_pull_request_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/{}:pull", SUBSCRIPTION)))
            .and(body_json(json!({"returnImmediately": true, "maxMessages": 10})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "receivedMessages": [{
                    "ackId": "ack-1",
                    "message": {
                        "data": STANDARD.encode("snapshot"),
                        "attributes": {"kind": "inventory"},
                        "messageId": "1"
                    }
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = pubsub_for(&server);
        let response = client.pull(SUBSCRIPTION, 10, true).await.unwrap();

        assert_eq!(response.received_messages.len(), 1);
        let received = &response.received_messages[0];
        assert_eq!(received.ack_id, "ack-1");
        assert_eq!(received.message.attributes.get("kind").map(String::as_str), Some("inventory"));
        assert_eq!(received.message.decoded_data().unwrap(), b"snapshot");
    }

    #[tokio::test]
    async fn test_acknowledge() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/{}:acknowledge", SUBSCRIPTION)))
            .and(body_json(json!({"ackIds": ["a", "b"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let client = pubsub_for(&server);
        client
            .acknowledge(SUBSCRIPTION, &["a".to_string(), "b".to_string()])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_acknowledge_nothing_skips_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = pubsub_for(&server);
        client.acknowledge(SUBSCRIPTION, &[]).await.unwrap();
    }

    #[tokio::test]
    async fn test_publish() {
        let server = MockServer::start().await;
        let topic = "projects/forseti/topics/inventory";
        Mock::given(method("POST"))
            .and(path(format!("/v1/{}:publish", topic)))
            .and(body_json(json!({
                "messages": [{
                    "data": STANDARD.encode("20170601T120000Z"),
                    "attributes": {"source": "inventory"}
                }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"messageIds": ["42"]})))
            .expect(1)
            .mount(&server)
            .await;

        let client = pubsub_for(&server);
        let attributes = HashMap::from([("source".to_string(), "inventory".to_string())]);
        let id = client
            .publish(topic, b"20170601T120000Z", &attributes)
            .await
            .unwrap();
        assert_eq!(id, "42");
    }
}
