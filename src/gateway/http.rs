//! HTTP 后端：以 JSON 调用远程模型服务
//!
//! - 调用：`POST {endpoint}/tools/{operation}`，请求体为参数对象
//! - 健康：`GET {endpoint}/health`，2xx 视为健康
//! - 超时：客户端不设总超时，由网关按调用方给出的单次尝试超时取消
//! - 错误映射：连接失败 / 请求超时 / 429 / 5xx → 瞬时；400 / 422 → 校验；其它 4xx 与无法解析的响应 → 拒绝

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::gateway::{Backend, BackendError};

pub struct HttpBackend {
    id: String,
    description: String,
    operations: Vec<String>,
    endpoint: String,
    client: Client,
}

impl HttpBackend {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        operations: Vec<String>,
        endpoint: &str,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(concat!("haven/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            id: id.into(),
            description: description.into(),
            operations,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn map_transport_error(err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::Timeout(err.to_string())
    } else if err.is_connect() || err.is_request() {
        BackendError::Connection(err.to_string())
    } else {
        BackendError::Rejected(err.to_string())
    }
}

/// 按状态码分类非 2xx 响应
pub fn classify_status(status: StatusCode, body: &str) -> BackendError {
    let message = format!("HTTP {}: {}", status.as_u16(), truncate(body, 200));
    match status {
        StatusCode::TOO_MANY_REQUESTS => BackendError::Connection(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => BackendError::Timeout(message),
        s if s.is_server_error() => BackendError::Connection(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            BackendError::Validation(message)
        }
        _ => BackendError::Rejected(message),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        format!("{}...", s.chars().take(max).collect::<String>())
    } else {
        s.to_string()
    }
}

#[async_trait]
impl Backend for HttpBackend {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn operations(&self) -> Vec<String> {
        self.operations.clone()
    }

    async fn call(&self, operation: &str, params: &Value) -> Result<Value, BackendError> {
        let url = format!("{}/tools/{}", self.endpoint, operation);
        let response = self
            .client
            .post(&url)
            .json(params)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| BackendError::Rejected(format!("unparsable response body: {e}")))
    }

    async fn health(&self) -> bool {
        let url = format!("{}/health", self.endpoint);
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::debug!(backend = %self.id, error = %e, "Health probe failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::FailureKind;

    #[test]
    fn test_status_classification() {
        assert_eq!(
            classify_status(StatusCode::SERVICE_UNAVAILABLE, "").kind(),
            FailureKind::Connection
        );
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, "").kind(),
            FailureKind::Connection
        );
        assert_eq!(
            classify_status(StatusCode::GATEWAY_TIMEOUT, "").kind(),
            FailureKind::Timeout
        );
        assert_eq!(
            classify_status(StatusCode::UNPROCESSABLE_ENTITY, "bad").kind(),
            FailureKind::Validation
        );
        assert_eq!(
            classify_status(StatusCode::NOT_FOUND, "").kind(),
            FailureKind::Rejected
        );
    }

    #[test]
    fn test_endpoint_trailing_slash_trimmed() {
        let backend = HttpBackend::new(
            "climada",
            "remote",
            vec!["impact_assessment".into()],
            "http://localhost:8001/",
        )
        .unwrap();
        assert_eq!(backend.endpoint(), "http://localhost:8001");
    }

    /// 延迟回复的单连接 HTTP 服务，返回监听地址
    async fn slow_server(delay: std::time::Duration, body: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            tokio::time::sleep(delay).await;
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_caller_timeout_is_not_capped_by_config() {
        use crate::gateway::{GatewaySettings, ModelGateway};
        use std::sync::Arc;
        use std::time::Duration;

        let endpoint = slow_server(Duration::from_millis(300), r#"{"ok":true}"#).await;
        let settings = GatewaySettings {
            request_timeout: Duration::from_millis(100),
            ..Default::default()
        };
        let gateway = ModelGateway::new(settings).with_backend(Arc::new(
            HttpBackend::new("lisflood", "remote", vec!["forecast".into()], &endpoint).unwrap(),
        ));

        let result = gateway
            .invoke("lisflood", "forecast", serde_json::json!({}), Duration::from_secs(5))
            .await;
        assert!(result.is_success(), "{result:?}");
        assert_eq!(result.attempts, 1);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transient() {
        let backend = HttpBackend::new(
            "climada",
            "remote",
            vec!["impact_assessment".into()],
            "http://127.0.0.1:9",
        )
        .unwrap();
        let err = backend
            .call("impact_assessment", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(err.kind().is_transient());
        assert!(!backend.health().await);
    }
}
