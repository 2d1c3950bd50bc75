//! HTTP transport
//!
//! [`HttpClient`] is the seam between the order endpoints and the network.
//! [`NetworkHttpClient`] implements it over reqwest.

use crate::{ClientConfig, ClientError, ClientResult};
use async_trait::async_trait;
use reqwest::multipart::Form;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use shared::error::ErrorBody;

/// HTTP client trait
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get<T: DeserializeOwned, Q: Serialize + Sync>(
        &self,
        path: &str,
        query: &Q,
    ) -> ClientResult<T>;

    async fn post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T>;

    async fn post_multipart<T: DeserializeOwned, Q: Serialize + Sync>(
        &self,
        path: &str,
        query: &Q,
        form: Form,
    ) -> ClientResult<T>;

    fn token(&self) -> Option<&str>;
}

/// Network HTTP client
#[derive(Debug, Clone)]
pub struct NetworkHttpClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl NetworkHttpClient {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout_duration())
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    /// Set the bearer token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> ClientResult<T> {
        let response = self.authorize(req).send().await?;
        handle_response(response).await
    }
}

async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> ClientResult<T> {
    let status = response.status();
    let bytes = response.bytes().await?;

    if !status.is_success() {
        return Err(error_from_body(status, &bytes));
    }

    // Acknowledgement endpoints may answer with an empty body
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::from_slice(b"null")?);
    }
    Ok(serde_json::from_slice(&bytes)?)
}

fn error_from_body(status: StatusCode, bytes: &[u8]) -> ClientError {
    if let Ok(body) = serde_json::from_slice::<ErrorBody>(bytes) {
        return ClientError::Api {
            status,
            code: body.code,
            message: body.message,
        };
    }

    let text = String::from_utf8_lossy(bytes).trim().to_string();
    match status {
        StatusCode::UNAUTHORIZED => ClientError::Unauthorized,
        StatusCode::FORBIDDEN => ClientError::Forbidden(text),
        StatusCode::NOT_FOUND => ClientError::NotFound(text),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ClientError::Validation(text),
        _ => ClientError::Internal(format!("{status}: {text}")),
    }
}

#[async_trait]
impl HttpClient for NetworkHttpClient {
    async fn get<T: DeserializeOwned, Q: Serialize + Sync>(
        &self,
        path: &str,
        query: &Q,
    ) -> ClientResult<T> {
        let req = self.client.get(self.url(path)).query(query);
        self.send(req).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        let req = self.client.post(self.url(path)).json(body);
        self.send(req).await
    }

    async fn post_multipart<T: DeserializeOwned, Q: Serialize + Sync>(
        &self,
        path: &str,
        query: &Q,
        form: Form,
    ) -> ClientResult<T> {
        let req = self.client.post(self.url(path)).query(query).multipart(form);
        self.send(req).await
    }

    fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::error::ErrorCode;

    #[test]
    fn test_error_body_becomes_api_error() {
        let err = error_from_body(
            StatusCode::BAD_REQUEST,
            br#"{"message":"Order is not pending","code":4001}"#,
        );
        match err {
            ClientError::Api {
                status,
                code,
                message,
            } => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(code, Some(ErrorCode::InvalidTransition));
                assert_eq!(message, "Order is not pending");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_plain_bodies_fall_back_by_status() {
        assert!(matches!(
            error_from_body(StatusCode::UNAUTHORIZED, b""),
            ClientError::Unauthorized
        ));
        assert!(matches!(
            error_from_body(StatusCode::NOT_FOUND, b"no such order"),
            ClientError::NotFound(msg) if msg == "no such order"
        ));
        assert!(matches!(
            error_from_body(StatusCode::BAD_GATEWAY, b"<html>"),
            ClientError::Internal(_)
        ));
    }

    #[test]
    fn test_url_joining() {
        let client = NetworkHttpClient::new(&ClientConfig::new("http://api.example/")).unwrap();
        assert_eq!(client.base_url(), "http://api.example");
        assert_eq!(
            client.url("/api/orders/my-orders"),
            "http://api.example/api/orders/my-orders"
        );
        assert!(client.token().is_none());
        assert_eq!(client.with_token("t").token(), Some("t"));
    }
}
