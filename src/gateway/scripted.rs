//! 脚本化后端（测试替身）
//!
//! 按调用顺序依次返回预设回复，脚本耗尽后使用按操作或全局的兜底回复；
//! 记录每次调用的操作、参数与时刻（tokio 时钟，暂停时钟下可精确断言退避间隔）。

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::time::Instant;

use crate::gateway::{Backend, BackendError};

/// 一次预设回复：结果 + 延迟
#[derive(Debug, Clone)]
pub struct ScriptedReply {
    result: Result<Value, BackendError>,
    latency: Duration,
}

impl ScriptedReply {
    pub fn ok(payload: Value) -> Self {
        Self {
            result: Ok(payload),
            latency: Duration::ZERO,
        }
    }

    pub fn fail(error: BackendError) -> Self {
        Self {
            result: Err(error),
            latency: Duration::ZERO,
        }
    }

    /// 回复前等待
    pub fn after(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

/// 调用记录
#[derive(Debug, Clone)]
pub struct ScriptedCall {
    pub operation: String,
    pub params: Value,
    pub at: Instant,
}

pub struct ScriptedBackend {
    id: String,
    operations: Vec<String>,
    script: Mutex<VecDeque<ScriptedReply>>,
    by_operation: HashMap<String, ScriptedReply>,
    fallback: ScriptedReply,
    healthy: bool,
    calls: Mutex<Vec<ScriptedCall>>,
}

impl ScriptedBackend {
    pub fn new(id: &str, operations: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            operations: operations.iter().map(|s| s.to_string()).collect(),
            script: Mutex::new(VecDeque::new()),
            by_operation: HashMap::new(),
            fallback: ScriptedReply::ok(json!({ "status": "completed", "confidence": 0.8 })),
            healthy: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// 追加一条按顺序消费的回复
    pub fn then(self, reply: ScriptedReply) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(reply);
        }
        self
    }

    /// 某个操作在脚本耗尽后的回复
    pub fn on(mut self, operation: &str, reply: ScriptedReply) -> Self {
        self.by_operation.insert(operation.to_string(), reply);
        self
    }

    /// 全局兜底回复
    pub fn otherwise(mut self, reply: ScriptedReply) -> Self {
        self.fallback = reply;
        self
    }

    pub fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    pub fn calls(&self) -> Vec<ScriptedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }

    pub fn call_instants(&self) -> Vec<Instant> {
        self.calls().into_iter().map(|c| c.at).collect()
    }

    fn next_reply(&self, operation: &str) -> ScriptedReply {
        let scripted = self.script.lock().ok().and_then(|mut s| s.pop_front());
        scripted
            .or_else(|| self.by_operation.get(operation).cloned())
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        "Scripted test backend"
    }

    fn operations(&self) -> Vec<String> {
        self.operations.clone()
    }

    async fn call(&self, operation: &str, params: &Value) -> Result<Value, BackendError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(ScriptedCall {
                operation: operation.to_string(),
                params: params.clone(),
                at: Instant::now(),
            });
        }
        let reply = self.next_reply(operation);
        if !reply.latency.is_zero() {
            tokio::time::sleep(reply.latency).await;
        }
        reply.result
    }

    async fn health(&self) -> bool {
        self.healthy
    }
}
