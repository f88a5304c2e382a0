//! 外部模型网关
//!
//! 统一封装对科学模拟后端（CLIMADA、LISFLOOD、Cell2Fire、NFDRS4、Pangu、Aurora）的调用：
//!
//! - **Backend**：后端 trait（HTTP / 进程内模拟 / 脚本化测试替身）
//! - **ModelGateway**：操作校验、超时、指数退避重试、按后端并发限制、健康状态
//! - **ModelInvocationResult**：成功载荷或失败描述，失败是合法返回值而非错误
//!
//! 由配置构建：配置了 endpoint 的后端走 HTTP，否则使用模拟实现。

mod backend;
pub mod catalog;
mod http;
mod model_gateway;
mod result;
mod retry;
pub mod scripted;
mod simulated;

use std::sync::Arc;

use thiserror::Error;

use crate::config::GatewaySection;

pub use backend::{Backend, BackendError};
pub use catalog::{CatalogEntry, CATALOG};
pub use http::HttpBackend;
pub use model_gateway::{BackendHealth, GatewaySettings, ModelGateway, ModelRequest};
pub use result::{FailureKind, InvocationOutcome, ModelInvocationResult};
pub use retry::RetryPolicy;
pub use scripted::{ScriptedBackend, ScriptedReply};
pub use simulated::SimulatedBackend;

/// 网关构建失败
#[derive(Error, Debug)]
pub enum GatewayBuildError {
    #[error("HTTP client for backend '{backend}' failed to build: {source}")]
    HttpClient {
        backend: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Backend '{0}' is not in the catalog and declares no operations")]
    UndeclaredOperations(String),

    #[error("Backend '{0}' is not in the catalog and has no endpoint")]
    MissingEndpoint(String),
}

/// 按配置构建网关：目录内后端默认启用；目录外后端须给出 endpoint 与 operations
pub fn build_gateway(section: &GatewaySection) -> Result<ModelGateway, GatewayBuildError> {
    let mut gateway = ModelGateway::new(section.settings());

    for entry in CATALOG {
        let cfg = section.backends.get(entry.id).cloned().unwrap_or_default();
        if !cfg.enabled {
            tracing::info!(backend = entry.id, "Backend disabled by configuration");
            continue;
        }
        let backend: Arc<dyn Backend> = match cfg.endpoint.as_deref() {
            Some(endpoint) => {
                let operations = if cfg.operations.is_empty() {
                    entry.operations.iter().map(|s| s.to_string()).collect()
                } else {
                    cfg.operations.clone()
                };
                let description = cfg
                    .description
                    .clone()
                    .unwrap_or_else(|| entry.description.to_string());
                tracing::info!(backend = entry.id, endpoint, "Registering HTTP backend");
                Arc::new(
                    HttpBackend::new(entry.id, description, operations, endpoint)
                        .map_err(|source| GatewayBuildError::HttpClient {
                            backend: entry.id.to_string(),
                            source,
                        })?,
                )
            }
            None => match SimulatedBackend::for_model(entry.id) {
                Some(simulated) => {
                    tracing::info!(backend = entry.id, "Registering simulated backend");
                    Arc::new(simulated)
                }
                None => continue,
            },
        };
        gateway = gateway.with_backend(backend);
    }

    for (id, cfg) in &section.backends {
        if catalog::catalog_entry(id).is_some() || !cfg.enabled {
            continue;
        }
        let endpoint = cfg
            .endpoint
            .as_deref()
            .ok_or_else(|| GatewayBuildError::MissingEndpoint(id.clone()))?;
        if cfg.operations.is_empty() {
            return Err(GatewayBuildError::UndeclaredOperations(id.clone()));
        }
        let description = cfg.description.clone().unwrap_or_else(|| id.clone());
        tracing::info!(backend = %id, endpoint, "Registering custom HTTP backend");
        let backend = HttpBackend::new(
            id.clone(),
            description,
            cfg.operations.clone(),
            endpoint,
        )
        .map_err(|source| GatewayBuildError::HttpClient {
            backend: id.clone(),
            source,
        })?;
        gateway = gateway.with_backend(Arc::new(backend));
    }

    Ok(gateway)
}
