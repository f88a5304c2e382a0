//! 紧急观测：原始输入 ObservationInput 与校验后的 EmergencyObservation
//!
//! EmergencyObservation 只能经 `ObservationInput::validate` 构造，字段私有、创建后不可变；
//! 校验失败的输入不会进入状态机。

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::ValidationError;
use crate::incident::{DisasterType, SeverityLevel};

/// 观测模态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Sensor,
    Image,
    SocialMedia,
    Text,
    Call,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Sensor => "sensor",
            Modality::Image => "image",
            Modality::SocialMedia => "social_media",
            Modality::Text => "text",
            Modality::Call => "call",
        }
    }

    /// 大小写不敏感，`-` 与 `_` 等价；`emergency_call` 视为 `call`
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "sensor" | "sensor_data" => Some(Modality::Sensor),
            "image" => Some(Modality::Image),
            "social_media" | "socialmedia" => Some(Modality::SocialMedia),
            "text" => Some(Modality::Text),
            "call" | "emergency_call" => Some(Modality::Call),
            _ => None,
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 地理位置（经纬度 + 区域名）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub region: String,
}

/// 按模态区分的观测内容
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObservationContent {
    /// 传感器读数（键已归一化为小写下划线）
    Readings { readings: BTreeMap<String, f64> },
    /// 文本 / 社交媒体 / 报警电话转写
    Text { text: String },
    Image {
        description: Option<String>,
        labels: Vec<String>,
    },
}

/// 调用方提供的类型/严重度提示（只作为加分或下限，不直接决定结果）
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ObservationHints {
    pub emergency_type: Option<DisasterType>,
    pub severity: Option<SeverityLevel>,
}

/// 原始输入（可反序列化，尚未校验）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservationInput {
    pub modality: String,
    #[serde(default)]
    pub content: Value,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(default)]
    pub region: String,
    /// RFC 3339；缺省为当前时间
    pub captured_at: Option<String>,
    pub source: Option<String>,
    pub emergency_type: Option<String>,
    pub severity_level: Option<String>,
}

/// 已校验的紧急观测
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmergencyObservation {
    modality: Modality,
    content: ObservationContent,
    location: GeoLocation,
    captured_at: DateTime<Utc>,
    source: String,
    hints: ObservationHints,
}

impl EmergencyObservation {
    pub fn modality(&self) -> Modality {
        self.modality
    }

    pub fn content(&self) -> &ObservationContent {
        &self.content
    }

    pub fn location(&self) -> &GeoLocation {
        &self.location
    }

    pub fn region(&self) -> &str {
        &self.location.region
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn hints(&self) -> &ObservationHints {
        &self.hints
    }

    /// 传感器读数；非传感器模态返回空表
    pub fn readings(&self) -> BTreeMap<String, f64> {
        match &self.content {
            ObservationContent::Readings { readings } => readings.clone(),
            _ => BTreeMap::new(),
        }
    }

    pub fn reading(&self, key: &str) -> Option<f64> {
        match &self.content {
            ObservationContent::Readings { readings } => readings.get(key).copied(),
            _ => None,
        }
    }

    /// 可用于关键词匹配的文本（图像取描述与标签）
    pub fn text(&self) -> String {
        match &self.content {
            ObservationContent::Readings { .. } => String::new(),
            ObservationContent::Text { text } => text.clone(),
            ObservationContent::Image {
                description,
                labels,
            } => {
                let mut parts: Vec<&str> = description.iter().map(String::as_str).collect();
                parts.extend(labels.iter().map(String::as_str));
                parts.join(" ")
            }
        }
    }
}

impl ObservationInput {
    pub fn validate(&self) -> Result<EmergencyObservation, ValidationError> {
        let modality = Modality::parse(&self.modality)
            .ok_or_else(|| ValidationError::UnsupportedModality(self.modality.clone()))?;

        let latitude = self.latitude.ok_or(ValidationError::MissingField("latitude"))?;
        let longitude = self
            .longitude
            .ok_or(ValidationError::MissingField("longitude"))?;
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(ValidationError::InvalidCoordinate {
                field: "latitude",
                value: latitude,
            });
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(ValidationError::InvalidCoordinate {
                field: "longitude",
                value: longitude,
            });
        }

        let region = self.region.trim();
        if region.is_empty() {
            return Err(ValidationError::MissingField("region"));
        }

        let content = parse_content(modality, &self.content)?;

        let captured_at = match self.captured_at.as_deref().map(str::trim) {
            None | Some("") => Utc::now(),
            Some(raw) => parse_timestamp(raw)?,
        };

        let source = self
            .source
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("unknown")
            .to_string();

        let emergency_type = match self.emergency_type.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(DisasterType::parse(raw).ok_or_else(|| {
                ValidationError::UnknownHint {
                    field: "emergency_type",
                    value: raw.to_string(),
                }
            })?),
        };
        let severity = match self.severity_level.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(SeverityLevel::parse(raw).ok_or_else(|| {
                ValidationError::UnknownHint {
                    field: "severity_level",
                    value: raw.to_string(),
                }
            })?),
        };

        Ok(EmergencyObservation {
            modality,
            content,
            location: GeoLocation {
                latitude,
                longitude,
                region: region.to_string(),
            },
            captured_at,
            source,
            hints: ObservationHints {
                emergency_type,
                severity,
            },
        })
    }
}

fn malformed(modality: Modality, reason: impl Into<String>) -> ValidationError {
    ValidationError::MalformedContent {
        modality: modality.as_str().to_string(),
        reason: reason.into(),
    }
}

fn parse_content(modality: Modality, raw: &Value) -> Result<ObservationContent, ValidationError> {
    match modality {
        Modality::Sensor => {
            let obj = raw
                .as_object()
                .ok_or_else(|| malformed(modality, "expected an object of readings"))?;
            let readings: BTreeMap<String, f64> = obj
                .iter()
                .filter_map(|(k, v)| {
                    let value = match v {
                        Value::Number(n) => n.as_f64(),
                        Value::String(s) => s.trim().parse::<f64>().ok(),
                        _ => None,
                    }?;
                    value.is_finite().then(|| (normalize_reading_key(k), value))
                })
                .collect();
            if readings.is_empty() {
                return Err(malformed(modality, "no numeric readings"));
            }
            Ok(ObservationContent::Readings { readings })
        }
        Modality::Text | Modality::SocialMedia | Modality::Call => {
            let text = match raw {
                Value::String(s) => Some(s.as_str()),
                Value::Object(obj) => obj
                    .get("text")
                    .or_else(|| obj.get("transcript"))
                    .and_then(Value::as_str),
                _ => None,
            }
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| malformed(modality, "expected non-empty text"))?;
            Ok(ObservationContent::Text {
                text: text.to_string(),
            })
        }
        Modality::Image => {
            let (description, labels) = match raw {
                Value::String(s) => (Some(s.trim().to_string()), Vec::new()),
                Value::Object(obj) => {
                    let description = obj
                        .get("description")
                        .and_then(Value::as_str)
                        .map(|s| s.trim().to_string());
                    let labels = obj
                        .get("labels")
                        .and_then(Value::as_array)
                        .map(|arr| {
                            arr.iter()
                                .filter_map(Value::as_str)
                                .map(|s| s.trim().to_string())
                                .filter(|s| !s.is_empty())
                                .collect()
                        })
                        .unwrap_or_default();
                    (description, labels)
                }
                _ => (None, Vec::new()),
            };
            let description = description.filter(|s| !s.is_empty());
            if description.is_none() && labels.is_empty() {
                return Err(malformed(modality, "expected description or labels"));
            }
            Ok(ObservationContent::Image {
                description,
                labels,
            })
        }
    }
}

/// 读数键归一化：小写、空格与连字符转下划线，并合并常见别名
fn normalize_reading_key(key: &str) -> String {
    let key = key.trim().to_lowercase().replace([' ', '-'], "_");
    match key.as_str() {
        "temp" | "temperature_c" | "air_temperature" => "temperature".to_string(),
        "rh" | "relative_humidity" | "humidity_pct" => "humidity".to_string(),
        "wind" | "windspeed" | "wind_kmh" => "wind_speed".to_string(),
        "rainfall" | "rain_rate" => "precipitation".to_string(),
        "water_level" | "river_stage" => "river_level".to_string(),
        "pga" => "ground_acceleration".to_string(),
        "surge" => "storm_surge".to_string(),
        _ => key,
    }
}

/// RFC 3339，或不带时区的 `YYYY-MM-DDTHH:MM:SS[.f]`（按 UTC 解释）
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, ValidationError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(naive.and_utc());
        }
    }
    Err(ValidationError::InvalidTimestamp(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sensor_input() -> ObservationInput {
        ObservationInput {
            modality: "sensor".into(),
            content: json!({"Temperature": 42.0, "RH": "15", "wind": 35, "unit": "metric"}),
            latitude: Some(34.05),
            longitude: Some(-118.24),
            region: " Los Angeles ".into(),
            captured_at: Some("2024-08-01T12:00:00Z".into()),
            source: Some("station-7".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_sensor_readings_are_normalized() {
        let obs = sensor_input().validate().unwrap();
        assert_eq!(obs.modality(), Modality::Sensor);
        assert_eq!(obs.region(), "Los Angeles");
        assert_eq!(obs.reading("temperature"), Some(42.0));
        assert_eq!(obs.reading("humidity"), Some(15.0));
        assert_eq!(obs.reading("wind_speed"), Some(35.0));
        assert_eq!(obs.readings().len(), 3);
        assert_eq!(obs.source(), "station-7");
    }

    #[test]
    fn test_garbled_modality_rejected() {
        let mut input = sensor_input();
        input.modality = "telepathy".into();
        assert_eq!(
            input.validate().unwrap_err(),
            ValidationError::UnsupportedModality("telepathy".into())
        );
    }

    #[test]
    fn test_modality_aliases() {
        assert_eq!(Modality::parse("Social-Media"), Some(Modality::SocialMedia));
        assert_eq!(Modality::parse("EMERGENCY_CALL"), Some(Modality::Call));
        assert_eq!(Modality::parse(""), None);
    }

    #[test]
    fn test_coordinates_out_of_range() {
        let mut input = sensor_input();
        input.latitude = Some(91.0);
        assert!(matches!(
            input.validate(),
            Err(ValidationError::InvalidCoordinate { field: "latitude", .. })
        ));

        let mut input = sensor_input();
        input.longitude = Some(f64::NAN);
        assert!(matches!(
            input.validate(),
            Err(ValidationError::InvalidCoordinate { field: "longitude", .. })
        ));
    }

    #[test]
    fn test_empty_region_rejected() {
        let mut input = sensor_input();
        input.region = "   ".into();
        assert_eq!(
            input.validate().unwrap_err(),
            ValidationError::MissingField("region")
        );
    }

    #[test]
    fn test_content_shape_per_modality() {
        let mut input = sensor_input();
        input.content = json!({"status": "ok"});
        assert!(matches!(
            input.validate(),
            Err(ValidationError::MalformedContent { .. })
        ));

        let mut input = sensor_input();
        input.modality = "call".into();
        input.content = json!({"transcript": "House is on fire"});
        let obs = input.validate().unwrap();
        assert_eq!(obs.text(), "House is on fire");

        let mut input = sensor_input();
        input.modality = "image".into();
        input.content = json!({"labels": ["smoke", "flames"]});
        let obs = input.validate().unwrap();
        assert_eq!(obs.text(), "smoke flames");

        let mut input = sensor_input();
        input.modality = "text".into();
        input.content = json!("");
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_hints_and_timestamps() {
        let mut input = sensor_input();
        input.emergency_type = Some("Fire".into());
        input.severity_level = Some("moderate".into());
        input.captured_at = Some("2024-08-01T12:00:00".into());
        let obs = input.validate().unwrap();
        assert_eq!(obs.hints().emergency_type, Some(DisasterType::Wildfire));
        assert_eq!(obs.hints().severity, Some(SeverityLevel::Medium));
        assert_eq!(obs.captured_at().to_rfc3339(), "2024-08-01T12:00:00+00:00");

        let mut input = sensor_input();
        input.emergency_type = Some("meteor".into());
        assert!(matches!(
            input.validate(),
            Err(ValidationError::UnknownHint { field: "emergency_type", .. })
        ));

        let mut input = sensor_input();
        input.captured_at = Some("yesterday".into());
        assert!(matches!(
            input.validate(),
            Err(ValidationError::InvalidTimestamp(_))
        ));
    }
}
