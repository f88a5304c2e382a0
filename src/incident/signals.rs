//! 输入归一化：从观测中抽取读数、关键词指标与阈值越限
//!
//! 关键词按词首匹配（`flood` 命中 `flooding`）；短词（如 `dam`）只按整词匹配，允许复数 `s`，
//! 避免命中 `damage`。每个灾害类型一组正则，进程内只编译一次。

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::incident::{DisasterType, EmergencyObservation};

/// 阈值方向
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    AtLeast(f64),
    AtMost(f64),
}

/// 单项临界阈值
#[derive(Debug, Clone, Copy)]
pub struct Threshold {
    pub key: &'static str,
    pub bound: Bound,
    pub unit: &'static str,
}

impl Threshold {
    pub fn exceeded_by(&self, value: f64) -> bool {
        match self.bound {
            Bound::AtLeast(limit) => value >= limit,
            Bound::AtMost(limit) => value <= limit,
        }
    }

    fn describe(&self, value: f64) -> String {
        let (op, limit) = match self.bound {
            Bound::AtLeast(l) => (">=", l),
            Bound::AtMost(l) => ("<=", l),
        };
        format!("{} {}{} {} {}{}", self.key, value, self.unit, op, limit, self.unit)
    }
}

const WILDFIRE_THRESHOLDS: &[Threshold] = &[
    Threshold { key: "temperature", bound: Bound::AtLeast(35.0), unit: "C" },
    Threshold { key: "humidity", bound: Bound::AtMost(20.0), unit: "%" },
    Threshold { key: "wind_speed", bound: Bound::AtLeast(25.0), unit: "km/h" },
];

const FLOOD_THRESHOLDS: &[Threshold] = &[
    Threshold { key: "precipitation", bound: Bound::AtLeast(50.0), unit: "mm/h" },
    Threshold { key: "river_level", bound: Bound::AtLeast(8.5), unit: "m" },
    Threshold { key: "soil_saturation", bound: Bound::AtLeast(90.0), unit: "%" },
];

const EARTHQUAKE_THRESHOLDS: &[Threshold] = &[
    Threshold { key: "magnitude", bound: Bound::AtLeast(6.0), unit: "" },
    Threshold { key: "ground_acceleration", bound: Bound::AtLeast(0.3), unit: "g" },
];

const HURRICANE_THRESHOLDS: &[Threshold] = &[
    Threshold { key: "wind_speed", bound: Bound::AtLeast(119.0), unit: "km/h" },
    Threshold { key: "pressure", bound: Bound::AtMost(980.0), unit: "hPa" },
    Threshold { key: "storm_surge", bound: Bound::AtLeast(2.0), unit: "m" },
];

/// 各灾害类型的临界阈值表
pub fn thresholds(disaster_type: DisasterType) -> &'static [Threshold] {
    match disaster_type {
        DisasterType::Wildfire => WILDFIRE_THRESHOLDS,
        DisasterType::Flood => FLOOD_THRESHOLDS,
        DisasterType::Earthquake => EARTHQUAKE_THRESHOLDS,
        DisasterType::Hurricane => HURRICANE_THRESHOLDS,
        DisasterType::Other => &[],
    }
}

fn keyword_stems(disaster_type: DisasterType) -> &'static [&'static str] {
    match disaster_type {
        DisasterType::Wildfire => &[
            "wildfire", "fire", "smoke", "burn", "flame", "blaze", "ember", "heat",
        ],
        DisasterType::Flood => &[
            "flood", "water", "rain", "overflow", "river", "inundat", "levee",
        ],
        DisasterType::Earthquake => &[
            "earthquake", "seismic", "tremor", "shak", "collapse", "aftershock", "quake",
        ],
        DisasterType::Hurricane => &[
            "hurricane", "storm", "cyclone", "typhoon", "tornado",
        ],
        DisasterType::Other => &[],
    }
}

/// 只按整词匹配的关键词
fn whole_words(disaster_type: DisasterType) -> &'static [&'static str] {
    match disaster_type {
        DisasterType::Flood => &["dam"],
        DisasterType::Hurricane => &["gale"],
        _ => &[],
    }
}

const URGENCY_STEMS: &[&str] = &[
    "urgent", "emergency", "help", "trapped", "evacuat", "immediate", "injur", "sos",
];

/// 编译后的关键词集合
#[derive(Debug)]
pub struct KeywordSet {
    by_type: Vec<(DisasterType, Regex)>,
    urgency: Regex,
}

fn stem_pattern(stems: &[&str], words: &[&str]) -> String {
    if words.is_empty() {
        format!(r"\b({})\w*", stems.join("|"))
    } else {
        format!(r"\b(?:({})\w*|({})s?\b)", stems.join("|"), words.join("|"))
    }
}

impl KeywordSet {
    fn compile() -> Result<Self, regex::Error> {
        let mut by_type = Vec::new();
        for dt in DisasterType::DETECTABLE {
            by_type.push((dt, Regex::new(&stem_pattern(keyword_stems(dt), whole_words(dt)))?));
        }
        Ok(Self {
            by_type,
            urgency: Regex::new(&stem_pattern(URGENCY_STEMS, &[]))?,
        })
    }

    /// 进程级共享实例
    pub fn shared() -> Result<&'static KeywordSet, regex::Error> {
        static KEYWORDS: OnceLock<Result<KeywordSet, regex::Error>> = OnceLock::new();
        KEYWORDS
            .get_or_init(KeywordSet::compile)
            .as_ref()
            .map_err(Clone::clone)
    }

    fn stems_in(re: &Regex, text: &str) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();
        for cap in re.captures_iter(text) {
            if let Some(m) = cap.get(1).or_else(|| cap.get(2)) {
                if !found.iter().any(|s| s == m.as_str()) {
                    found.push(m.as_str().to_string());
                }
            }
        }
        found
    }
}

/// 归一化后的信号
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Signals {
    pub readings: BTreeMap<String, f64>,
    /// 小写且折叠空白后的文本
    pub text: String,
    /// 每个类型命中的关键词词干（去重，按出现顺序）
    pub keywords: BTreeMap<DisasterType, Vec<String>>,
    pub urgency: Vec<String>,
    /// 每个类型越限的阈值描述
    pub exceedances: BTreeMap<DisasterType, Vec<String>>,
}

impl Signals {
    pub fn extract(obs: &EmergencyObservation, keywords: &KeywordSet) -> Self {
        let readings = obs.readings();
        let text = obs
            .text()
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        let mut keyword_hits = BTreeMap::new();
        for (dt, re) in &keywords.by_type {
            let stems = KeywordSet::stems_in(re, &text);
            if !stems.is_empty() {
                keyword_hits.insert(*dt, stems);
            }
        }

        let mut exceedances = BTreeMap::new();
        for dt in DisasterType::DETECTABLE {
            let hits: Vec<String> = thresholds(dt)
                .iter()
                .filter_map(|t| {
                    let value = *readings.get(t.key)?;
                    t.exceeded_by(value).then(|| t.describe(value))
                })
                .collect();
            if !hits.is_empty() {
                exceedances.insert(dt, hits);
            }
        }

        Self {
            urgency: KeywordSet::stems_in(&keywords.urgency, &text),
            readings,
            text,
            keywords: keyword_hits,
            exceedances,
        }
    }

    pub fn keyword_count(&self, dt: DisasterType) -> usize {
        self.keywords.get(&dt).map_or(0, Vec::len)
    }

    pub fn exceedance_count(&self, dt: DisasterType) -> usize {
        self.exceedances.get(&dt).map_or(0, Vec::len)
    }

    /// 指标列表（阈值越限在前，关键词在后）
    pub fn indicators(&self, dt: DisasterType) -> Vec<String> {
        let mut out: Vec<String> = self.exceedances.get(&dt).cloned().unwrap_or_default();
        if let Some(words) = self.keywords.get(&dt) {
            out.extend(words.iter().map(|w| format!("keyword:{w}")));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incident::ObservationInput;
    use serde_json::json;

    fn observe(modality: &str, content: serde_json::Value) -> EmergencyObservation {
        ObservationInput {
            modality: modality.into(),
            content,
            latitude: Some(0.0),
            longitude: Some(0.0),
            region: "Test".into(),
            ..Default::default()
        }
        .validate()
        .unwrap()
    }

    #[test]
    fn test_wildfire_exceedances() {
        let obs = observe(
            "sensor",
            json!({"temperature": 42.0, "humidity": 15.0, "wind_speed": 35.0}),
        );
        let signals = Signals::extract(&obs, KeywordSet::shared().unwrap());
        assert_eq!(signals.exceedance_count(DisasterType::Wildfire), 3);
        assert_eq!(signals.exceedance_count(DisasterType::Hurricane), 0);
        assert!(signals.keywords.is_empty());
    }

    #[test]
    fn test_keyword_stems_deduplicated() {
        let obs = observe(
            "social_media",
            json!("FLOODING on Main St, the river   is flooding fast. Please help!"),
        );
        let signals = Signals::extract(&obs, KeywordSet::shared().unwrap());
        assert_eq!(
            signals.keywords.get(&DisasterType::Flood),
            Some(&vec!["flood".to_string(), "river".to_string()])
        );
        assert_eq!(signals.urgency, vec!["help".to_string()]);
        assert!(signals.text.contains("the river is flooding"));
    }

    #[test]
    fn test_stem_does_not_match_mid_word() {
        let obs = observe("text", json!("backfire drill scheduled"));
        let signals = Signals::extract(&obs, KeywordSet::shared().unwrap());
        assert_eq!(signals.keyword_count(DisasterType::Wildfire), 0);
    }

    #[test]
    fn test_dam_matches_whole_word_only() {
        let obs = observe("text", json!("earthquake damaged buildings, damage everywhere"));
        let signals = Signals::extract(&obs, KeywordSet::shared().unwrap());
        assert_eq!(signals.keyword_count(DisasterType::Flood), 0);

        let obs = observe("text", json!("two dams near the dam site"));
        let signals = Signals::extract(&obs, KeywordSet::shared().unwrap());
        assert_eq!(
            signals.keywords.get(&DisasterType::Flood),
            Some(&vec!["dam".to_string()])
        );
    }

    #[test]
    fn test_indicators_order() {
        let obs = observe("sensor", json!({"pressure": 950.0}));
        let signals = Signals::extract(&obs, KeywordSet::shared().unwrap());
        let indicators = signals.indicators(DisasterType::Hurricane);
        assert_eq!(indicators.len(), 1);
        assert!(indicators[0].starts_with("pressure 950"));
    }
}
