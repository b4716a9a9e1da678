//! SDLC phases, business decisions, risks, and the per-phase result record.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;

/// Output key under which phase agents publish their `SdlcPhaseResult`.
pub const PHASE_RESULT_KEY: &str = "phase_result";

/// SDLC phases, in their fixed execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Planning,
    Feasibility,
    Design,
    Implementation,
    Testing,
    Deployment,
    Maintenance,
}

impl Phase {
    /// Every phase in execution order.
    pub const ALL: [Phase; 7] = [
        Phase::Planning,
        Phase::Feasibility,
        Phase::Design,
        Phase::Implementation,
        Phase::Testing,
        Phase::Deployment,
        Phase::Maintenance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Planning => "planning",
            Phase::Feasibility => "feasibility",
            Phase::Design => "design",
            Phase::Implementation => "implementation",
            Phase::Testing => "testing",
            Phase::Deployment => "deployment",
            Phase::Maintenance => "maintenance",
        }
    }

    /// Position in the fixed phase order.
    pub fn index(&self) -> usize {
        Phase::ALL.iter().position(|p| p == self).unwrap_or(0)
    }

    /// The phase whose result must exist before this one may run.
    ///
    /// Implementation is performed by people, so testing depends on design.
    pub fn prerequisite(&self) -> Option<Phase> {
        match self {
            Phase::Feasibility => Some(Phase::Planning),
            Phase::Design => Some(Phase::Feasibility),
            Phase::Testing => Some(Phase::Design),
            Phase::Deployment => Some(Phase::Testing),
            Phase::Planning | Phase::Implementation | Phase::Maintenance => None,
        }
    }

    /// Phases from `start` to `end`, inclusive. Empty when `start > end`.
    pub fn range(start: Phase, end: Phase) -> Vec<Phase> {
        Phase::ALL
            .iter()
            .copied()
            .filter(|p| *p >= start && *p <= end)
            .collect()
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Phase {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| CoreError::InvalidPhase(s.to_string()))
    }
}

/// The business outcome of a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    #[serde(rename = "go")]
    Go,
    #[serde(rename = "no-go")]
    NoGo,
    #[serde(rename = "review")]
    Review,
    #[serde(rename = "blocked")]
    Blocked,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Go => "go",
            Decision::NoGo => "no-go",
            Decision::Review => "review",
            Decision::Blocked => "blocked",
        }
    }

    /// Whether this decision stops every later phase.
    pub fn halts(&self) -> bool {
        matches!(self, Decision::NoGo | Decision::Blocked)
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Decision {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "go" => Ok(Decision::Go),
            "no-go" | "no_go" | "nogo" => Ok(Decision::NoGo),
            "review" => Ok(Decision::Review),
            "blocked" => Ok(Decision::Blocked),
            other => Err(CoreError::InvalidDecision(other.to_string())),
        }
    }
}

/// Risk severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Likelihood that a risk materializes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Likelihood {
    Low,
    Medium,
    High,
}

impl Likelihood {
    pub fn as_str(&self) -> &'static str {
        match self {
            Likelihood::Low => "low",
            Likelihood::Medium => "medium",
            Likelihood::High => "high",
        }
    }
}

/// A risk raised by a phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Risk {
    #[serde(rename = "type")]
    pub risk_type: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<Likelihood>,
    pub description: String,
    #[serde(default)]
    pub mitigation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<String>,
    /// Phase that raised the risk; set during cross-phase aggregation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_phase: Option<Phase>,
}

impl Risk {
    pub fn new(risk_type: impl Into<String>, severity: Severity, description: impl Into<String>) -> Self {
        Self {
            risk_type: risk_type.into(),
            severity,
            probability: None,
            description: description.into(),
            mitigation: String::new(),
            impact: None,
            source_phase: None,
        }
    }

    pub fn with_probability(mut self, probability: Likelihood) -> Self {
        self.probability = Some(probability);
        self
    }

    pub fn with_mitigation(mut self, mitigation: impl Into<String>) -> Self {
        self.mitigation = mitigation.into();
        self
    }

    pub fn with_impact(mut self, impact: impl Into<String>) -> Self {
        self.impact = Some(impact.into());
        self
    }

    pub fn from_phase(mut self, phase: Phase) -> Self {
        self.source_phase = Some(phase);
        self
    }
}

/// The standardized record every phase agent publishes under [`PHASE_RESULT_KEY`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdlcPhaseResult {
    pub phase: Phase,
    pub decision: Decision,
    #[serde(deserialize_with = "deserialize_confidence")]
    confidence: f64,
    #[serde(default)]
    pub artifacts: Vec<PathBuf>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub risks: Vec<Risk>,
    #[serde(default)]
    pub next_steps: Vec<String>,
}

impl SdlcPhaseResult {
    /// Create a result. Confidence is clamped into `[0.0, 1.0]`.
    pub fn new(phase: Phase, decision: Decision, confidence: f64) -> Self {
        Self {
            phase,
            decision,
            confidence: clamp_confidence(confidence),
            artifacts: Vec::new(),
            recommendations: Vec::new(),
            risks: Vec::new(),
            next_steps: Vec::new(),
        }
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn with_artifact(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifacts.push(path.into());
        self
    }

    pub fn with_artifacts(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.artifacts.extend(paths);
        self
    }

    pub fn with_recommendations(mut self, recommendations: impl IntoIterator<Item = String>) -> Self {
        self.recommendations.extend(recommendations);
        self
    }

    pub fn with_risks(mut self, risks: impl IntoIterator<Item = Risk>) -> Self {
        self.risks.extend(risks);
        self
    }

    pub fn with_next_steps(mut self, steps: impl IntoIterator<Item = String>) -> Self {
        self.next_steps.extend(steps);
        self
    }

    /// Read the phase result embedded in an agent output, if any.
    pub fn from_output(output: &Map<String, Value>) -> Option<Self> {
        output
            .get(PHASE_RESULT_KEY)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

fn deserialize_confidence<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    f64::deserialize(deserializer).map(clamp_confidence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_phase_order_and_parse() {
        assert!(Phase::Planning < Phase::Deployment);
        assert_eq!(Phase::Testing.index(), 4);
        assert_eq!("Design".parse::<Phase>().unwrap(), Phase::Design);
        assert!("release".parse::<Phase>().is_err());
    }

    #[test]
    fn test_phase_range() {
        assert_eq!(
            Phase::range(Phase::Design, Phase::Testing),
            vec![Phase::Design, Phase::Implementation, Phase::Testing]
        );
        assert!(Phase::range(Phase::Testing, Phase::Design).is_empty());
    }

    #[test]
    fn test_prerequisites() {
        assert_eq!(Phase::Planning.prerequisite(), None);
        assert_eq!(Phase::Design.prerequisite(), Some(Phase::Feasibility));
        assert_eq!(Phase::Testing.prerequisite(), Some(Phase::Design));
    }

    #[test]
    fn test_decision_serialization() {
        assert_eq!(serde_json::to_value(Decision::NoGo).unwrap(), json!("no-go"));
        assert_eq!("NO-GO".parse::<Decision>().unwrap(), Decision::NoGo);
        assert!(Decision::NoGo.halts());
        assert!(!Decision::Review.halts());
    }

    #[test]
    fn test_confidence_clamped() {
        assert_eq!(SdlcPhaseResult::new(Phase::Design, Decision::Go, 1.7).confidence(), 1.0);
        assert_eq!(SdlcPhaseResult::new(Phase::Design, Decision::Go, -0.2).confidence(), 0.0);
        assert_eq!(SdlcPhaseResult::new(Phase::Design, Decision::Go, f64::NAN).confidence(), 0.0);

        let parsed: SdlcPhaseResult = serde_json::from_value(json!({
            "phase": "testing",
            "decision": "review",
            "confidence": 3.0
        }))
        .unwrap();
        assert_eq!(parsed.confidence(), 1.0);
        assert!(parsed.artifacts.is_empty());
    }

    #[test]
    fn test_from_output() {
        let result = SdlcPhaseResult::new(Phase::Feasibility, Decision::NoGo, 0.4)
            .with_risks(vec![Risk::new("technical", Severity::Critical, "Blocked by constraint")]);
        let mut output = Map::new();
        output.insert(PHASE_RESULT_KEY.to_string(), result.to_value());

        let read = SdlcPhaseResult::from_output(&output).unwrap();
        assert_eq!(read.decision, Decision::NoGo);
        assert_eq!(read.risks[0].severity, Severity::Critical);
        assert!(SdlcPhaseResult::from_output(&Map::new()).is_none());
    }

    #[test]
    fn test_risk_type_field_name() {
        let risk = Risk::new("schedule", Severity::High, "Tight deadline").from_phase(Phase::Feasibility);
        let value = serde_json::to_value(&risk).unwrap();
        assert_eq!(value["type"], json!("schedule"));
        assert_eq!(value["source_phase"], json!("feasibility"));
    }
}
