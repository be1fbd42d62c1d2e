// SPDX-FileCopyrightText: 2026 Wuzzy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! reqwest implementation of [`AnalyticsTransport`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Response, StatusCode};
use serde::Serialize;
use tracing::{debug, warn};
use wuzzy_config::model::AnalyticsConfig;
use wuzzy_core::outcome::parse_retry_after;
use wuzzy_core::types::{ErrorAction, ErrorCode};
use wuzzy_core::{
    AnalyticsError, AnalyticsTransport, BatchOutcome, ErrorEnvelope, SessionInitError,
    SessionInitRequest, SessionInitResponse, UbiQuery,
};

const HEADER_CLIENT_NAME: &str = "X-Client-Name";
const HEADER_CLIENT_VERSION: &str = "X-Client-Version";
const HEADER_WALLET_ADDRESS: &str = "X-Wallet-Address";
const HEADER_SESSION_ID: &str = "X-Session-Id";

#[derive(Serialize)]
struct SessionUpdateBody<'a> {
    wallet_address: &'a str,
}

#[derive(Serialize)]
struct BatchBody<'a> {
    queries: &'a [UbiQuery],
}

/// HTTP client for the analytics API.
#[derive(Debug, Clone)]
pub struct AnalyticsClient {
    client: reqwest::Client,
    base_url: String,
}

impl AnalyticsClient {
    /// Creates a client for the API rooted at `base_url`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AnalyticsError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AnalyticsError::Transport {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Builds a client from configuration; `None` when no API URL is set.
    pub fn from_config(config: &AnalyticsConfig) -> Result<Option<Self>, AnalyticsError> {
        config
            .base_url()
            .map(|url| Self::new(url, config.request_timeout()))
            .transpose()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

/// Reads the body and decodes the error envelope, if there is one.
async fn read_error(response: Response) -> (StatusCode, Option<Duration>, String) {
    let status = response.status();
    let retry_after = retry_after(response.headers());
    let body = response.text().await.unwrap_or_default();
    (status, retry_after, body)
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| parse_retry_after(v, Utc::now()))
}

fn classify_session_error(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
) -> SessionInitError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return SessionInitError::RateLimited { retry_after };
    }

    let envelope = serde_json::from_str::<ErrorEnvelope>(body).ok();
    let message = envelope
        .as_ref()
        .map(|e| e.message.joined())
        .unwrap_or_else(|| body.to_string());
    let is_validation = status == StatusCode::BAD_REQUEST
        || envelope.as_ref().is_some_and(|e| {
            e.action == Some(ErrorAction::FixData)
                || matches!(
                    e.error_code,
                    Some(ErrorCode::ValidationError | ErrorCode::InvalidClientName)
                )
        });

    if is_validation {
        SessionInitError::Validation { message }
    } else {
        SessionInitError::Rejected {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl AnalyticsTransport for AnalyticsClient {
    async fn init_session(
        &self,
        request: &SessionInitRequest,
    ) -> Result<SessionInitResponse, SessionInitError> {
        let mut builder = self
            .client
            .get(self.url("/session/init"))
            .header(HEADER_CLIENT_NAME, &request.client_name)
            .header(HEADER_CLIENT_VERSION, &request.client_version);
        if let Some(wallet) = &request.wallet_address {
            builder = builder.header(HEADER_WALLET_ADDRESS, wallet);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| SessionInitError::Transport(e.to_string()))?;

        if response.status().is_success() {
            let session: SessionInitResponse = response
                .json()
                .await
                .map_err(|e| SessionInitError::Transport(format!("invalid session body: {e}")))?;
            debug!(session_id = %session.session_id, "analytics session initialized");
            return Ok(session);
        }

        let (status, retry_after, body) = read_error(response).await;
        let err = classify_session_error(status, retry_after, &body);
        match &err {
            SessionInitError::RateLimited { retry_after } => {
                warn!(retry_after = ?retry_after, "analytics session init rate limited");
            }
            other => warn!(status = %status, error = %other, "analytics session init failed"),
        }
        Err(err)
    }

    async fn update_session(
        &self,
        session_id: &str,
        wallet_address: &str,
    ) -> Result<(), AnalyticsError> {
        let response = self
            .client
            .put(self.url("/session/update"))
            .header(HEADER_SESSION_ID, session_id)
            .json(&SessionUpdateBody { wallet_address })
            .send()
            .await
            .map_err(|e| AnalyticsError::Transport {
                message: format!("session update request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if status.is_success() {
            debug!("analytics session updated with wallet");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(AnalyticsError::Transport {
            message: format!("session update returned {status}: {body}"),
            source: None,
        })
    }

    async fn send_batch(&self, queries: &[UbiQuery]) -> BatchOutcome {
        let response = match self
            .client
            .post(self.url("/analytics/batch"))
            .json(&BatchBody { queries })
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "analytics batch request failed");
                return BatchOutcome::transport_failure(e);
            }
        };

        if response.status().is_success() {
            return BatchOutcome::Success;
        }

        let (status, retry_after, body) = read_error(response).await;
        let outcome = BatchOutcome::from_response(status.as_u16(), retry_after, &body);
        debug!(status = %status, outcome = ?outcome, "analytics batch rejected");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(wallet: Option<&str>) -> SessionInitRequest {
        SessionInitRequest {
            client_name: "wuzzy-site".into(),
            client_version: "1.0.0".into(),
            wallet_address: wallet.map(String::from),
        }
    }

    fn client(server: &MockServer) -> AnalyticsClient {
        AnalyticsClient::new(format!("{}/", server.uri()), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn init_session_sends_identity_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/session/init"))
            .and(header("X-Client-Name", "wuzzy-site"))
            .and(header("X-Client-Version", "1.0.0"))
            .and(header("X-Wallet-Address", "wallet123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "session_id": "sess-1",
                "client_id": "wuzzy-site@1.0.0@sess-1",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let session = client(&server)
            .init_session(&request(Some("wallet123")))
            .await
            .unwrap();
        assert_eq!(session.session_id, "sess-1");
        assert_eq!(session.message, None);
    }

    #[tokio::test]
    async fn init_session_reports_rate_limit_with_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/session/init"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "42"))
            .mount(&server)
            .await;

        let err = client(&server).init_session(&request(None)).await.unwrap_err();
        assert_eq!(
            err,
            SessionInitError::RateLimited {
                retry_after: Some(Duration::from_secs(42))
            }
        );
    }

    #[tokio::test]
    async fn init_session_distinguishes_validation_from_generic_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/session/init"))
            .and(header("X-Client-Name", "bad"))
            .respond_with(ResponseTemplate::new(422).set_body_json(serde_json::json!({
                "statusCode": 422,
                "message": "unknown client",
                "error": "Unprocessable Entity",
                "errorCode": "INVALID_CLIENT_NAME",
                "action": "FIX_DATA",
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/session/init"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let mut bad = request(None);
        bad.client_name = "bad".into();
        let err = client(&server).init_session(&bad).await.unwrap_err();
        assert!(matches!(err, SessionInitError::Validation { ref message } if message == "unknown client"));

        let err = client(&server).init_session(&request(None)).await.unwrap_err();
        assert!(matches!(err, SessionInitError::Rejected { status: 500, .. }));
    }

    #[tokio::test]
    async fn init_session_unreachable_is_transport_error() {
        let client = AnalyticsClient::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = client.init_session(&request(None)).await.unwrap_err();
        assert!(matches!(err, SessionInitError::Transport(_)));
    }

    #[tokio::test]
    async fn update_session_puts_wallet() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/session/update"))
            .and(header("X-Session-Id", "sess-1"))
            .and(body_partial_json(serde_json::json!({"wallet_address": "w1"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        client(&server).update_session("sess-1", "w1").await.unwrap();
    }

    #[tokio::test]
    async fn send_batch_posts_queries_and_classifies() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analytics/batch"))
            .and(body_partial_json(serde_json::json!({
                "queries": [{"user_query": "cat", "application": "graphql-images"}]
            })))
            .respond_with(ResponseTemplate::new(201))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/analytics/batch"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "statusCode": 401,
                "message": "Session expired",
                "error": "Unauthorized",
                "errorCode": "EXPIRED_SESSION",
                "action": "REQUEST_NEW_SESSION",
            })))
            .mount(&server)
            .await;

        let queries = vec![UbiQuery {
            application: wuzzy_core::ApplicationType::GraphqlImages,
            query_id: uuid::Uuid::new_v4(),
            client_id: "wuzzy-site@1.0.0@sess-1".into(),
            user_query: "cat".into(),
            timestamp: "2026-01-01T00:00:00.000Z".into(),
            query_response_hit_ids: vec!["a".into()],
            query_attributes: None,
        }];

        let client = client(&server);
        assert_eq!(client.send_batch(&queries).await, BatchOutcome::Success);
        assert!(matches!(
            client.send_batch(&queries).await,
            BatchOutcome::SessionExpired { .. }
        ));
    }

    #[tokio::test]
    async fn send_batch_network_failure_is_retryable() {
        let client = AnalyticsClient::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        assert!(matches!(
            client.send_batch(&[]).await,
            BatchOutcome::Retryable { retry_after: None, .. }
        ));
    }

    #[test]
    fn from_config_without_url_is_none() {
        let config = AnalyticsConfig::default();
        assert!(AnalyticsClient::from_config(&config).unwrap().is_none());

        let config = AnalyticsConfig {
            api_url: Some("https://analytics.example/".into()),
            ..AnalyticsConfig::default()
        };
        let client = AnalyticsClient::from_config(&config).unwrap().unwrap();
        assert_eq!(client.base_url(), "https://analytics.example");
    }
}
