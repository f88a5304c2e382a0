//! 威胁评估：灾害类型、严重级别与置信度

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::incident::{ObservationHints, Signals};

const THRESHOLD_WEIGHT: f64 = 0.3;
const KEYWORD_WEIGHT: f64 = 0.15;
const HINT_WEIGHT: f64 = 0.3;

/// 灾害类型（闭集；新增类型需同时补充路由表）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisasterType {
    Wildfire,
    Flood,
    Earthquake,
    Hurricane,
    Other,
}

impl DisasterType {
    pub const ALL: [DisasterType; 5] = [
        DisasterType::Wildfire,
        DisasterType::Flood,
        DisasterType::Earthquake,
        DisasterType::Hurricane,
        DisasterType::Other,
    ];

    /// 可被信号检测到的类型（不含 Other）
    pub const DETECTABLE: [DisasterType; 4] = [
        DisasterType::Wildfire,
        DisasterType::Flood,
        DisasterType::Earthquake,
        DisasterType::Hurricane,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DisasterType::Wildfire => "wildfire",
            DisasterType::Flood => "flood",
            DisasterType::Earthquake => "earthquake",
            DisasterType::Hurricane => "hurricane",
            DisasterType::Other => "other",
        }
    }

    /// 宽松解析（接受 fire / storm / typhoon / seismic 等别名）
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "wildfire" | "fire" | "forest_fire" => Some(DisasterType::Wildfire),
            "flood" | "flooding" | "flash_flood" => Some(DisasterType::Flood),
            "earthquake" | "seismic" | "quake" => Some(DisasterType::Earthquake),
            "hurricane" | "storm" | "typhoon" | "cyclone" | "tropical_storm" => {
                Some(DisasterType::Hurricane)
            }
            "other" | "unknown" => Some(DisasterType::Other),
            _ => None,
        }
    }
}

impl fmt::Display for DisasterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 严重级别（有序：Low < Medium < High < Critical）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl SeverityLevel {
    pub const ALL: [SeverityLevel; 4] = [
        SeverityLevel::Low,
        SeverityLevel::Medium,
        SeverityLevel::High,
        SeverityLevel::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SeverityLevel::Low => "low",
            SeverityLevel::Medium => "medium",
            SeverityLevel::High => "high",
            SeverityLevel::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" | "minor" => Some(SeverityLevel::Low),
            "medium" | "moderate" => Some(SeverityLevel::Medium),
            "high" | "severe" => Some(SeverityLevel::High),
            "critical" | "extreme" => Some(SeverityLevel::Critical),
            _ => None,
        }
    }

    /// 由威胁得分映射严重级别
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            SeverityLevel::Critical
        } else if score >= 0.6 {
            SeverityLevel::High
        } else if score >= 0.3 {
            SeverityLevel::Medium
        } else {
            SeverityLevel::Low
        }
    }

    /// 资源分配系数
    pub fn factor(&self) -> f64 {
        match self {
            SeverityLevel::Low => 0.25,
            SeverityLevel::Medium => 0.5,
            SeverityLevel::High => 0.75,
            SeverityLevel::Critical => 1.0,
        }
    }

    pub fn is_urgent(&self) -> bool {
        matches!(self, SeverityLevel::High | SeverityLevel::Critical)
    }
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 威胁评估结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatAssessment {
    pub disaster_type: DisasterType,
    pub severity: SeverityLevel,
    /// [0, 1]
    pub confidence: f64,
    pub score: f64,
    pub indicators: Vec<String>,
}

impl ThreatAssessment {
    /// 无任何信号时的默认评估
    pub fn unclassified() -> Self {
        Self {
            disaster_type: DisasterType::Other,
            severity: SeverityLevel::Low,
            confidence: 0.2,
            score: 0.0,
            indicators: Vec::new(),
        }
    }

    /// 基于信号与提示给出评估：得分最高者胜出，平分按枚举顺序取前者
    pub fn assess(signals: &Signals, hints: &ObservationHints) -> Self {
        let mut best: Option<(DisasterType, f64)> = None;
        for dt in DisasterType::DETECTABLE {
            let mut score = THRESHOLD_WEIGHT * signals.exceedance_count(dt) as f64
                + KEYWORD_WEIGHT * signals.keyword_count(dt) as f64;
            if hints.emergency_type == Some(dt) {
                score += HINT_WEIGHT;
            }
            if score > best.map_or(0.0, |(_, s)| s) {
                best = Some((dt, score));
            }
        }

        let Some((disaster_type, score)) = best else {
            let mut unclassified = Self::unclassified();
            if let Some(hinted) = hints.severity {
                unclassified.severity = unclassified.severity.max(hinted);
            }
            return unclassified;
        };

        let mut severity = SeverityLevel::from_score(score);
        if let Some(hinted) = hints.severity {
            severity = severity.max(hinted);
        }

        let mut indicators = signals.indicators(disaster_type);
        if hints.emergency_type == Some(disaster_type) {
            indicators.push(format!("reported_type:{disaster_type}"));
        }

        Self {
            disaster_type,
            severity,
            confidence: (0.4 + 0.6 * score / (score + 0.3)).min(1.0),
            score,
            indicators,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!(DisasterType::parse("Fire"), Some(DisasterType::Wildfire));
        assert_eq!(DisasterType::parse("typhoon"), Some(DisasterType::Hurricane));
        assert_eq!(DisasterType::parse("flash-flood"), Some(DisasterType::Flood));
        assert_eq!(DisasterType::parse("volcano"), None);
        assert_eq!(SeverityLevel::parse("moderate"), Some(SeverityLevel::Medium));
    }

    #[test]
    fn test_severity_from_score() {
        assert_eq!(SeverityLevel::from_score(0.9), SeverityLevel::Critical);
        assert_eq!(SeverityLevel::from_score(0.6), SeverityLevel::High);
        assert_eq!(SeverityLevel::from_score(0.45), SeverityLevel::Medium);
        assert_eq!(SeverityLevel::from_score(0.1), SeverityLevel::Low);
        assert!(SeverityLevel::Critical > SeverityLevel::High);
    }

    fn signals_with(exceed: &[(DisasterType, usize)], words: &[(DisasterType, usize)]) -> Signals {
        let mut signals = Signals::default();
        for (dt, n) in exceed {
            signals
                .exceedances
                .insert(*dt, (0..*n).map(|i| format!("reading_{i}")).collect());
        }
        for (dt, n) in words {
            signals
                .keywords
                .insert(*dt, (0..*n).map(|i| format!("word{i}")).collect());
        }
        signals
    }

    #[test]
    fn test_assess_highest_score_wins() {
        let signals = signals_with(
            &[(DisasterType::Wildfire, 3)],
            &[(DisasterType::Flood, 1)],
        );
        let threat = ThreatAssessment::assess(&signals, &ObservationHints::default());
        assert_eq!(threat.disaster_type, DisasterType::Wildfire);
        assert_eq!(threat.severity, SeverityLevel::Critical);
        assert!((threat.score - 0.9).abs() < 1e-9);
        assert!(threat.confidence > 0.8 && threat.confidence <= 1.0);
        assert_eq!(threat.indicators.len(), 3);
    }

    #[test]
    fn test_assess_tie_uses_enum_order() {
        let signals = signals_with(&[], &[(DisasterType::Hurricane, 2), (DisasterType::Flood, 2)]);
        let threat = ThreatAssessment::assess(&signals, &ObservationHints::default());
        assert_eq!(threat.disaster_type, DisasterType::Flood);
        assert_eq!(threat.severity, SeverityLevel::Medium);
    }

    #[test]
    fn test_assess_hints() {
        let hints = ObservationHints {
            emergency_type: Some(DisasterType::Earthquake),
            severity: Some(SeverityLevel::High),
        };
        let threat = ThreatAssessment::assess(&Signals::default(), &hints);
        assert_eq!(threat.disaster_type, DisasterType::Earthquake);
        assert_eq!(threat.severity, SeverityLevel::High);
        assert_eq!(threat.indicators, vec!["reported_type:earthquake".to_string()]);

        let hints = ObservationHints {
            emergency_type: None,
            severity: Some(SeverityLevel::Low),
        };
        let signals = signals_with(&[(DisasterType::Flood, 3)], &[]);
        let threat = ThreatAssessment::assess(&signals, &hints);
        assert_eq!(threat.severity, SeverityLevel::Critical);
    }

    fn classify(text: &str) -> DisasterType {
        let obs = crate::incident::ObservationInput {
            modality: "text".into(),
            content: serde_json::json!(text),
            latitude: Some(0.0),
            longitude: Some(0.0),
            region: "Test".into(),
            ..Default::default()
        }
        .validate()
        .unwrap();
        let keywords = crate::incident::KeywordSet::shared().unwrap();
        let signals = Signals::extract(&obs, keywords);
        ThreatAssessment::assess(&signals, obs.hints()).disaster_type
    }

    #[test]
    fn test_damage_words_do_not_pull_toward_flood() {
        assert_eq!(classify("earthquake damaged buildings"), DisasterType::Earthquake);
        assert_eq!(classify("hurricane damage along the coast"), DisasterType::Hurricane);
        assert_eq!(classify("the dam is overflowing"), DisasterType::Flood);
    }

    #[test]
    fn test_assess_nothing_detected() {
        let threat = ThreatAssessment::assess(&Signals::default(), &ObservationHints::default());
        assert_eq!(threat, ThreatAssessment::unclassified());
    }
}
