//! 路由处理函数与请求/错误映射

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::AppState;
use crate::core::{PipelineFailure, Step, ValidationError};
use crate::incident::ObservationInput;
use crate::workflow::WorkflowEngine;

/// `POST /process_emergency_event` 请求体
#[derive(Debug, Deserialize)]
pub struct EmergencyEventRequest {
    pub input_data: InputData,
}

/// 调用方的事件描述；未给出 modality/content 时按文本观测处理 `user_question`
#[derive(Debug, Default, Deserialize)]
pub struct InputData {
    #[serde(default)]
    pub user_question: String,
    #[serde(default)]
    pub region: String,
    pub emergency_type: Option<String>,
    pub severity_level: Option<String>,
    pub timestamp: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub modality: Option<String>,
    pub content: Option<Value>,
    pub source: Option<String>,
    /// 仅记录，不参与处理
    pub model_info: Option<Value>,
    pub datasets: Option<Value>,
}

impl From<InputData> for ObservationInput {
    fn from(data: InputData) -> Self {
        ObservationInput {
            modality: data.modality.unwrap_or_else(|| "text".to_string()),
            content: data
                .content
                .unwrap_or_else(|| Value::String(data.user_question)),
            latitude: Some(data.latitude.unwrap_or(0.0)),
            longitude: Some(data.longitude.unwrap_or(0.0)),
            region: data.region,
            captured_at: data.timestamp,
            source: data.source,
            emergency_type: data.emergency_type,
            severity_level: data.severity_level,
        }
    }
}

pub(crate) enum ApiError {
    Validation(String),
    Pipeline(Box<PipelineFailure>),
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::Validation(e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::Validation(e.body_text())
    }
}

impl From<PipelineFailure> for ApiError {
    fn from(e: PipelineFailure) -> Self {
        ApiError::Pipeline(Box::new(e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(message) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "error": "validation_error", "message": message })),
            )
                .into_response(),
            ApiError::Pipeline(failure) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "pipeline_failure",
                    "phase": failure.phase.name(),
                    "message": failure.source.to_string(),
                    "processing_log": failure.partial.log(),
                })),
            )
                .into_response(),
        }
    }
}

pub(crate) async fn index(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "service": state.service_name,
        "version": env!("CARGO_PKG_VERSION"),
        "status": "operational",
        "endpoints": {
            "process": "/process_emergency_event",
            "health": "/system_health",
            "graph": "/graph/info",
        },
    }))
}

pub(crate) async fn process_emergency_event(
    State(state): State<AppState>,
    payload: Result<Json<EmergencyEventRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    let data = request.input_data;
    if data.model_info.is_some() || data.datasets.is_some() {
        tracing::debug!(
            model_info = ?data.model_info,
            datasets = ?data.datasets,
            "Request carries model metadata"
        );
    }

    let observation = ObservationInput::from(data).validate().map_err(|e| {
        tracing::warn!(error = %e, "Rejected emergency event");
        e
    })?;
    let report = state.engine.process(observation).await?;
    Ok(Json(json!({ "final_report": report })))
}

/// 全部健康为 healthy，部分健康为 degraded，无健康后端为 unhealthy
fn overall_status(healthy: usize, total: usize) -> &'static str {
    if total > 0 && healthy == total {
        "healthy"
    } else if healthy > 0 {
        "degraded"
    } else {
        "unhealthy"
    }
}

pub(crate) async fn system_health(State(state): State<AppState>) -> Json<Value> {
    let report = state.engine.gateway().health_report().await;
    let healthy = report.values().filter(|h| h.healthy).count();
    Json(json!({
        "overall_status": overall_status(healthy, report.len()),
        "timestamp": Utc::now().to_rfc3339(),
        "backends": report,
        "phases": WorkflowEngine::phase_names(),
    }))
}

pub(crate) async fn graph_info() -> Json<Value> {
    Json(json!({
        "graph_type": "EmergencyResponseWorkflow",
        "nodes": WorkflowEngine::phase_names(),
        "entry_point": Step::ALL[0].name(),
        "description": "Multi-expert emergency response workflow",
    }))
}
