//! 工作流层：灾害事件处理管线
//!
//! input_normalization → threat_detection → alert_generation → agent_coordination
//! → response_execution → damage_assessment → report_synthesis
//!
//! - **WorkflowEngine**：唯一持有 RunState 的状态机驱动者
//! - **phases**：阶段函数，只读状态、返回增量
//! - **ReportAggregator**：终止阶段把 RunState 折叠为 FinalReport

pub mod damage;
pub mod engine;
pub mod phases;
pub mod report;
pub mod response;
pub mod summary;

pub use damage::DamageAssessment;
pub use engine::WorkflowEngine;
pub use report::{
    CoordinationResults, FinalReport, IncidentSummary, ModelCallSummary, OpinionSummary,
    ReportAggregator, ReportStatus, SectionStatus,
};
pub use response::{ResponseExecution, ResponseStatus};
pub use summary::Summarizer;
