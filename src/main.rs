//! Haven - 应急响应编排服务
//!
//! 入口：加载配置、初始化日志、装配模型网关与工作流引擎，并启动 HTTP 服务。

use std::sync::Arc;

use anyhow::Context;
use haven::api::{self, AppState};
use haven::config::load_config;
use haven::gateway::build_gateway;
use haven::observability;
use haven::WorkflowEngine;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = load_config(None).context("Failed to load config")?;
    observability::init(&cfg.log.level);

    let gateway = Arc::new(build_gateway(&cfg.gateway).context("Failed to build model gateway")?);
    tracing::info!(backends = ?gateway.backend_ids(), "Model gateway ready");

    let engine = Arc::new(WorkflowEngine::from_config(&cfg, gateway));
    let app = api::router(AppState::new(engine, cfg.app.name.clone()));

    let listener = tokio::net::TcpListener::bind(&cfg.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", cfg.server.bind))?;
    tracing::info!("Haven listening on http://{}", cfg.server.bind);

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
        }
        signal.cancel();
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("Server failed")?;

    tracing::info!("Haven stopped");
    Ok(())
}
