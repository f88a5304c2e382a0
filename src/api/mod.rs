//! HTTP 接口（feature `web`）
//!
//! - `POST /process_emergency_event`：处理单个事件，返回最终报告
//! - `GET /system_health`：逐后端健康状态与总体状态
//! - `GET /`：服务信息与端点列表
//! - `GET /graph/info`：阶段顺序与入口

mod routes;
mod state;

use axum::routing::{get, post};
use axum::Router;

pub use routes::{EmergencyEventRequest, InputData};
pub use state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::index))
        .route("/process_emergency_event", post(routes::process_emergency_event))
        .route("/system_health", get(routes::system_health))
        .route("/graph/info", get(routes::graph_info))
        .with_state(state)
}
