//! 事件层：观测输入校验、信号归一化、威胁评估与预警

pub mod alert;
pub mod observation;
pub mod signals;
pub mod threat;

pub use alert::{Alert, Channel};
pub use observation::{
    EmergencyObservation, GeoLocation, Modality, ObservationContent, ObservationHints,
    ObservationInput,
};
pub use signals::{thresholds, KeywordSet, Signals, Threshold};
pub use threat::{DisasterType, SeverityLevel, ThreatAssessment};
