//! ModelGateway：统一的外部模型调用入口
//!
//! - 调用前校验 backend / operation / params，不合法直接返回失败结果（0 次尝试）
//! - 每次尝试施加硬超时；仅 timeout / connection 重试，指数退避
//! - 每个后端独立的并发许可，互不阻塞
//! - 失败编码在 ModelInvocationResult 中，从不向调用方抛错
//! - 每次调用输出一行 JSON 审计日志

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::time::{timeout, Instant};

use crate::gateway::{
    Backend, BackendError, FailureKind, InvocationOutcome, ModelInvocationResult, RetryPolicy,
};

/// 网关运行参数
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub retry: RetryPolicy,
    /// invoke_many 的默认单次尝试超时
    pub request_timeout: Duration,
    pub health_timeout: Duration,
    pub max_concurrent_per_backend: usize,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_millis(30_000),
            health_timeout: Duration::from_millis(2_000),
            max_concurrent_per_backend: 4,
        }
    }
}

/// 批量调用中的单个请求
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub backend: String,
    pub operation: String,
    pub params: Value,
}

impl ModelRequest {
    pub fn new(backend: impl Into<String>, operation: impl Into<String>, params: Value) -> Self {
        Self {
            backend: backend.into(),
            operation: operation.into(),
            params,
        }
    }
}

/// 单个后端的健康快照
#[derive(Debug, Clone, Serialize)]
pub struct BackendHealth {
    pub healthy: bool,
    pub description: String,
    pub operations: Vec<String>,
    pub last_checked: Option<DateTime<Utc>>,
}

struct BackendEntry {
    backend: Arc<dyn Backend>,
    operations: Vec<String>,
    permits: Arc<Semaphore>,
    healthy: AtomicBool,
    /// 毫秒时间戳，0 表示从未检查
    last_checked_ms: AtomicI64,
}

/// 外部模型网关；注册表在构造后只读，健康状态原子更新
pub struct ModelGateway {
    backends: HashMap<String, BackendEntry>,
    settings: GatewaySettings,
}

impl ModelGateway {
    pub fn new(settings: GatewaySettings) -> Self {
        Self {
            backends: HashMap::new(),
            settings,
        }
    }

    /// 注册后端（同 id 覆盖）；新后端默认视为健康，直到首次探测
    pub fn with_backend(mut self, backend: Arc<dyn Backend>) -> Self {
        let id = backend.id().to_string();
        let entry = BackendEntry {
            operations: backend.operations(),
            permits: Arc::new(Semaphore::new(self.settings.max_concurrent_per_backend.max(1))),
            backend,
            healthy: AtomicBool::new(true),
            last_checked_ms: AtomicI64::new(0),
        };
        self.backends.insert(id, entry);
        self
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    /// 已注册后端 id（排序）
    pub fn backend_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.backends.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn supports(&self, backend_id: &str, operation: &str) -> bool {
        self.backends
            .get(backend_id)
            .is_some_and(|e| e.operations.iter().any(|op| op == operation))
    }

    /// 调用单个操作；任何失败都编码在返回值中
    pub async fn invoke(
        &self,
        backend_id: &str,
        operation: &str,
        params: Value,
        per_attempt_timeout: Duration,
    ) -> ModelInvocationResult {
        let started = Instant::now();
        let (outcome, attempts) = self
            .dispatch(backend_id, operation, &params, per_attempt_timeout)
            .await;
        let result = ModelInvocationResult {
            backend: backend_id.to_string(),
            operation: operation.to_string(),
            params,
            outcome,
            duration_ms: started.elapsed().as_millis() as u64,
            attempts,
        };
        audit(&result);
        result
    }

    /// 并发调用，结果与请求按位置一一对应
    pub async fn invoke_many(&self, requests: Vec<ModelRequest>) -> Vec<ModelInvocationResult> {
        let per_attempt_timeout = self.settings.request_timeout;
        join_all(requests.into_iter().map(|req| async move {
            self.invoke(&req.backend, &req.operation, req.params, per_attempt_timeout)
                .await
        }))
        .await
    }

    async fn dispatch(
        &self,
        backend_id: &str,
        operation: &str,
        params: &Value,
        per_attempt_timeout: Duration,
    ) -> (InvocationOutcome, u32) {
        let Some(entry) = self.backends.get(backend_id) else {
            return (
                failure(FailureKind::UnknownBackend, format!("backend '{backend_id}' is not registered")),
                0,
            );
        };
        if !entry.operations.iter().any(|op| op == operation) {
            return (
                failure(
                    FailureKind::UnsupportedOperation,
                    format!("backend '{backend_id}' does not support '{operation}'"),
                ),
                0,
            );
        }
        if !params.is_object() {
            return (
                failure(FailureKind::Validation, "params must be a JSON object"),
                0,
            );
        }

        let max_attempts = self.settings.retry.attempts();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match attempt_once(entry, operation, params, per_attempt_timeout).await {
                Ok(payload) => return (InvocationOutcome::Success { payload }, attempt),
                Err(e) => e,
            };

            let kind = err.kind();
            if !kind.is_transient() || attempt >= max_attempts {
                return (failure(kind, err.to_string()), attempt);
            }

            let delay = self.settings.retry.delay_before_retry(attempt);
            tracing::warn!(
                backend = backend_id,
                operation,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Retrying model invocation"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// 探测单个后端并记录结果；未注册返回 false
    pub async fn health_check(&self, backend_id: &str) -> bool {
        let Some(entry) = self.backends.get(backend_id) else {
            return false;
        };
        let healthy = timeout(self.settings.health_timeout, entry.backend.health())
            .await
            .unwrap_or(false);
        entry.healthy.store(healthy, Ordering::Release);
        entry
            .last_checked_ms
            .store(Utc::now().timestamp_millis(), Ordering::Release);
        if !healthy {
            tracing::warn!(backend = backend_id, "Backend health check failed");
        }
        healthy
    }

    /// 最近一次记录的健康状态（不发起探测）
    pub fn is_healthy(&self, backend_id: &str) -> bool {
        self.backends
            .get(backend_id)
            .is_some_and(|e| e.healthy.load(Ordering::Acquire))
    }

    /// 并发探测所有后端
    pub async fn health_report(&self) -> BTreeMap<String, BackendHealth> {
        let ids = self.backend_ids();
        join_all(ids.iter().map(|id| self.health_check(id))).await;
        ids.into_iter()
            .filter_map(|id| {
                let entry = self.backends.get(&id)?;
                let checked = entry.last_checked_ms.load(Ordering::Acquire);
                let health = BackendHealth {
                    healthy: entry.healthy.load(Ordering::Acquire),
                    description: entry.backend.description().to_string(),
                    operations: entry.operations.clone(),
                    last_checked: (checked > 0)
                        .then(|| Utc.timestamp_millis_opt(checked).single())
                        .flatten(),
                };
                Some((id, health))
            })
            .collect()
    }
}

/// 单次尝试：获取该后端的许可后调用；等待许可的时间也计入超时
async fn attempt_once(
    entry: &BackendEntry,
    operation: &str,
    params: &Value,
    per_attempt_timeout: Duration,
) -> Result<Value, BackendError> {
    let call = async {
        let _permit = entry
            .permits
            .acquire()
            .await
            .map_err(|_| BackendError::Connection("backend permit pool closed".to_string()))?;
        entry.backend.call(operation, params).await
    };
    match timeout(per_attempt_timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(BackendError::Timeout(format!(
            "no response within {}ms",
            per_attempt_timeout.as_millis()
        ))),
    }
}

fn failure(kind: FailureKind, message: impl Into<String>) -> InvocationOutcome {
    InvocationOutcome::Failure {
        kind,
        message: message.into(),
    }
}

fn audit(result: &ModelInvocationResult) {
    let outcome = match &result.outcome {
        InvocationOutcome::Success { .. } => "ok",
        InvocationOutcome::Failure { kind, .. } => kind.as_str(),
    };
    let audit = serde_json::json!({
        "event": "model_audit",
        "backend": result.backend,
        "operation": result.operation,
        "ok": result.is_success(),
        "outcome": outcome,
        "attempts": result.attempts,
        "duration_ms": result.duration_ms,
        "params_preview": params_preview(&result.params),
    });
    tracing::info!(audit = %audit.to_string(), "model");
}

fn params_preview(params: &Value) -> String {
    let s = params.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{ScriptedBackend, ScriptedReply};
    use serde_json::json;

    fn gateway_with(backends: Vec<Arc<ScriptedBackend>>) -> ModelGateway {
        let mut gw = ModelGateway::new(GatewaySettings::default());
        for b in backends {
            gw = gw.with_backend(b);
        }
        gw
    }

    #[tokio::test(start_paused = true)]
    async fn test_saturated_backend_does_not_block_others() {
        let settings = GatewaySettings {
            max_concurrent_per_backend: 1,
            ..Default::default()
        };
        let gw = Arc::new(
            ModelGateway::new(settings)
                .with_backend(Arc::new(
                    ScriptedBackend::new("pangu", &["forecast"])
                        .otherwise(ScriptedReply::ok(json!({"ok": true})).after(Duration::from_secs(50))),
                ))
                .with_backend(Arc::new(ScriptedBackend::new("aurora", &["forecast"]))),
        );

        let slow = tokio::spawn({
            let gw = gw.clone();
            async move { gw.invoke("pangu", "forecast", json!({}), Duration::from_secs(100)).await }
        });
        tokio::task::yield_now().await;

        let started = Instant::now();
        let fast = gw.invoke("aurora", "forecast", json!({}), Duration::from_secs(1)).await;
        assert!(fast.is_success());
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(!slow.is_finished());

        // 同一后端的第二个调用在许可上等待，等待计入超时
        let queued = gw.invoke("pangu", "forecast", json!({}), Duration::from_secs(1)).await;
        assert_eq!(queued.failure_kind(), Some(FailureKind::Timeout));

        assert!(slow.await.unwrap().is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_validation_failure_is_not_retried() {
        let backend = Arc::new(
            ScriptedBackend::new("climada", &["impact_assessment"])
                .then(ScriptedReply::fail(BackendError::Validation("bad intensity".into()))),
        );
        let gw = gateway_with(vec![backend.clone()]);

        let result = gw
            .invoke("climada", "impact_assessment", json!({"intensity": 9}), Duration::from_secs(1))
            .await;
        assert_eq!(result.failure_kind(), Some(FailureKind::Validation));
        assert_eq!(result.attempts, 1);
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_object_params_rejected_without_call() {
        let backend = Arc::new(ScriptedBackend::new("climada", &["impact_assessment"]));
        let gw = gateway_with(vec![backend.clone()]);

        let result = gw
            .invoke("climada", "impact_assessment", json!([1, 2]), Duration::from_secs(1))
            .await;
        assert_eq!(result.failure_kind(), Some(FailureKind::Validation));
        assert_eq!(result.attempts, 0);
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_backend_and_operation() {
        let backend = Arc::new(ScriptedBackend::new("lisflood", &["simulation"]));
        let gw = gateway_with(vec![backend.clone()]);

        let unknown = gw.invoke("hydra", "simulation", json!({}), Duration::from_secs(1)).await;
        assert_eq!(unknown.failure_kind(), Some(FailureKind::UnknownBackend));
        assert_eq!(unknown.attempts, 0);

        let unsupported = gw.invoke("lisflood", "simulate", json!({}), Duration::from_secs(1)).await;
        assert_eq!(unsupported.failure_kind(), Some(FailureKind::UnsupportedOperation));
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_retry_with_growing_delay() {
        let backend = Arc::new(
            ScriptedBackend::new("cell2fire", &["simulate"])
                .then(ScriptedReply::fail(BackendError::Connection("refused".into())))
                .then(ScriptedReply::fail(BackendError::Connection("refused".into())))
                .then(ScriptedReply::ok(json!({"burned_area": 1.0}))),
        );
        let gw = gateway_with(vec![backend.clone()]);

        let result = gw
            .invoke("cell2fire", "simulate", json!({}), Duration::from_secs(1))
            .await;
        assert!(result.is_success());
        assert_eq!(result.attempts, 3);

        let instants = backend.call_instants();
        assert_eq!(instants.len(), 3);
        let first_gap = instants[1] - instants[0];
        let second_gap = instants[2] - instants[1];
        assert!(second_gap >= first_gap);
        assert_eq!(first_gap, Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_timeouts_return_failure() {
        let backend = Arc::new(
            ScriptedBackend::new("pangu", &["forecast"]).otherwise(
                ScriptedReply::ok(json!({})).after(Duration::from_secs(60)),
            ),
        );
        let gw = gateway_with(vec![backend.clone()]);

        let result = gw
            .invoke("pangu", "forecast", json!({}), Duration::from_millis(100))
            .await;
        assert_eq!(result.failure_kind(), Some(FailureKind::Timeout));
        assert_eq!(result.attempts, 3);
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invoke_many_preserves_request_order() {
        let slow = Arc::new(
            ScriptedBackend::new("slow", &["run"])
                .otherwise(ScriptedReply::ok(json!({"who": "slow"})).after(Duration::from_millis(300))),
        );
        let fast = Arc::new(
            ScriptedBackend::new("fast", &["run"])
                .otherwise(ScriptedReply::ok(json!({"who": "fast"})).after(Duration::from_millis(10))),
        );
        let gw = gateway_with(vec![slow, fast]);

        let results = gw
            .invoke_many(vec![
                ModelRequest::new("slow", "run", json!({})),
                ModelRequest::new("fast", "run", json!({})),
                ModelRequest::new("missing", "run", json!({})),
            ])
            .await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].payload(), Some(&json!({"who": "slow"})));
        assert_eq!(results[1].payload(), Some(&json!({"who": "fast"})));
        assert_eq!(results[2].failure_kind(), Some(FailureKind::UnknownBackend));
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_state_is_recorded() {
        let up = Arc::new(ScriptedBackend::new("up", &["run"]));
        let down = Arc::new(ScriptedBackend::new("down", &["run"]).unhealthy());
        let gw = gateway_with(vec![up, down]);

        let report = gw.health_report().await;
        assert!(report["up"].healthy);
        assert!(!report["down"].healthy);
        assert!(report["down"].last_checked.is_some());
        assert!(!gw.is_healthy("down"));
        assert!(!gw.health_check("nope").await);
    }
}
