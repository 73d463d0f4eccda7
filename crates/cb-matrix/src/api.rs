//! Matrix Client-Server API client
//!
//! Only the handful of endpoints the bot needs: whoami, send, join, sync.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use tracing::{debug, error, info};
use url::Url;
use uuid::Uuid;

use crate::error::{MatrixError, Result};
use crate::types::*;

/// Matrix homeserver client authenticated as the bot account
#[derive(Clone)]
pub struct MatrixApiClient {
    client: Client,
    access_token: String,
    base_url: Url,
}

impl MatrixApiClient {
    /// Create a new client for `homeserver`
    pub fn new(homeserver: &str, access_token: &str) -> Result<Self> {
        let base_url = Url::parse(homeserver.trim())
            .map_err(|e| MatrixError::Config(format!("invalid homeserver URL: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(MatrixError::Config(format!("invalid homeserver URL: {}", homeserver)));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(MatrixError::HttpError)?;

        Ok(Self {
            client,
            access_token: access_token.to_string(),
            base_url,
        })
    }

    /// `/_matrix/client/v3/<segments>` with each segment percent-encoded
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| MatrixError::Config(format!("invalid homeserver URL: {}", self.base_url)))?
            .pop_if_empty()
            .extend(["_matrix", "client", "v3"])
            .extend(segments);
        Ok(url)
    }

    fn add_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.bearer_auth(&self.access_token)
    }

    /// Turn a non-success status into a typed error
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(MatrixError::RateLimited);
        }

        let text = response.text().await.unwrap_or_default();
        let body: Option<ErrorBody> = serde_json::from_str(&text).ok();
        error!("Matrix request failed: {} - {}", status, text);

        Err(MatrixError::ApiError {
            status: status.as_u16(),
            errcode: body.as_ref().map(|b| b.errcode.clone()).unwrap_or_default(),
            message: body.and_then(|b| b.error).unwrap_or(text),
        })
    }

    /// Account the token belongs to
    pub async fn whoami(&self) -> Result<String> {
        let url = self.endpoint(&["account", "whoami"])?;

        let response = self.add_auth(self.client.get(url)).send().await?;
        let result: WhoAmIResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| MatrixError::ParseError(e.to_string()))?;

        info!("Authenticated as {}", result.user_id);
        Ok(result.user_id)
    }

    /// Send a message event, returning its event id
    pub async fn send_message(&self, room_id: &str, message: &RoomMessage) -> Result<String> {
        let txn_id = Uuid::new_v4().to_string();
        let url = self.endpoint(&["rooms", room_id, "send", "m.room.message", &txn_id])?;

        debug!("Sending {} to room: {}", message.msgtype, room_id);

        let response = self.add_auth(self.client.put(url).json(message)).send().await?;
        let result: SendResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| MatrixError::ParseError(e.to_string()))?;

        Ok(result.event_id)
    }

    pub async fn send_text(&self, room_id: &str, body: &str) -> Result<String> {
        self.send_message(room_id, &RoomMessage::text(body)).await
    }

    pub async fn send_notice(&self, room_id: &str, body: &str) -> Result<String> {
        self.send_message(room_id, &RoomMessage::notice(body)).await
    }

    /// Accept an invite
    pub async fn join_room(&self, room_id: &str) -> Result<()> {
        let url = self.endpoint(&["join", room_id])?;

        debug!("Joining room: {}", room_id);

        let response = self
            .add_auth(self.client.post(url).json(&serde_json::json!({})))
            .send()
            .await?;
        Self::check(response).await?;

        info!("Joined room {}", room_id);
        Ok(())
    }

    /// Long-poll for new events
    ///
    /// `timeout` is how long the server may hold the request open.
    pub async fn sync(&self, since: Option<&str>, timeout: Duration) -> Result<SyncResponse> {
        let mut url = self.endpoint(&["sync"])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("timeout", &timeout.as_millis().to_string());
            if let Some(since) = since {
                query.append_pair("since", since);
            }
        }

        let response = self
            .add_auth(self.client.get(url))
            .timeout(timeout + Duration::from_secs(30))
            .send()
            .await?;

        Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| MatrixError::ParseError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path, path_regex, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_whoami() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_matrix/client/v3/account/whoami"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "user_id": "@calendarbot:example.org"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = MatrixApiClient::new(&server.uri(), "secret").unwrap();

        assert_eq!(client.whoami().await.unwrap(), "@calendarbot:example.org");
    }

    #[tokio::test]
    async fn test_send_text() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path_regex(r"^/_matrix/client/v3/rooms/!room:example\.org/send/m\.room\.message/[0-9a-f-]+$"))
            .and(body_partial_json(serde_json::json!({ "msgtype": "m.text", "body": "hello" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "event_id": "$abc" })))
            .expect(1)
            .mount(&server)
            .await;

        let client = MatrixApiClient::new(&server.uri(), "secret").unwrap();

        assert_eq!(client.send_text("!room:example.org", "hello").await.unwrap(), "$abc");
    }

    #[tokio::test]
    async fn test_api_error_is_typed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_matrix/client/v3/join/!room:example.org"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "errcode": "M_FORBIDDEN",
                "error": "You are not invited to this room."
            })))
            .mount(&server)
            .await;

        let client = MatrixApiClient::new(&server.uri(), "secret").unwrap();
        let err = client.join_room("!room:example.org").await.unwrap_err();

        match err {
            MatrixError::ApiError { status, errcode, .. } => {
                assert_eq!(status, 403);
                assert_eq!(errcode, "M_FORBIDDEN");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_matrix/client/v3/account/whoami"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = MatrixApiClient::new(&server.uri(), "secret").unwrap();

        assert!(matches!(client.whoami().await, Err(MatrixError::RateLimited)));
    }

    #[tokio::test]
    async fn test_sync_passes_since() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_matrix/client/v3/sync"))
            .and(query_param("since", "s1"))
            .and(query_param("timeout", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "next_batch": "s2" })))
            .expect(1)
            .mount(&server)
            .await;

        let client = MatrixApiClient::new(&server.uri(), "secret").unwrap();
        let sync = client.sync(Some("s1"), Duration::ZERO).await.unwrap();

        assert_eq!(sync.next_batch, "s2");
    }

    #[test]
    fn test_invalid_homeserver() {
        assert!(MatrixApiClient::new("not a url", "secret").is_err());
        assert!(MatrixApiClient::new("mailto:bot@example.org", "secret").is_err());
    }
}
