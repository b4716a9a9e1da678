//! Whether to continue from one phase to the next.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use phaseflow_core::{Decision, Phase, SdlcPhaseResult, Severity};
use phaseflow_llm::{complete_structured, LlmClient};

use crate::error::StrategyError;
use crate::strategy::DecisionStrategy;

/// Confidence under which a `review` result does not continue on its own.
const REVIEW_CONFIDENCE_FLOOR: f64 = 0.5;
const PROMPT_RISK_LIMIT: usize = 5;

/// A finished phase and the phase that would run next.
#[derive(Debug, Clone)]
pub struct TransitionInput {
    pub phase: Phase,
    pub next_phase: Phase,
    pub result: SdlcPhaseResult,
}

fn default_verdict_confidence() -> f64 {
    0.8
}

/// Verdict on continuing to the next phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionVerdict {
    pub should_proceed: bool,
    #[serde(default = "default_verdict_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
}

/// Rule-based verdict: stop on `no-go`, and on `review` with low confidence.
pub fn heuristic_transition(input: &TransitionInput) -> TransitionVerdict {
    let result = &input.result;
    let (should_proceed, reasoning) = match result.decision {
        Decision::NoGo | Decision::Blocked => (
            false,
            format!("{} decided {}", input.phase, result.decision),
        ),
        Decision::Review if result.confidence() < REVIEW_CONFIDENCE_FLOOR => (
            false,
            format!(
                "{} needs review and confidence {:.2} is below {:.2}",
                input.phase,
                result.confidence(),
                REVIEW_CONFIDENCE_FLOOR
            ),
        ),
        _ => (
            true,
            format!("{} decided {}; continuing to {}", input.phase, result.decision, input.next_phase),
        ),
    };

    TransitionVerdict {
        should_proceed,
        confidence: result.confidence(),
        reasoning,
    }
}

/// Asks the model whether to continue.
pub struct LlmTransitionStrategy {
    client: Arc<dyn LlmClient>,
}

impl LlmTransitionStrategy {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    pub fn prompt(input: &TransitionInput) -> String {
        let result = &input.result;
        let risks: Vec<String> = result
            .risks
            .iter()
            .take(PROMPT_RISK_LIMIT)
            .map(|r| format!("- [{}] {}: {}", r.severity, r.risk_type, r.description))
            .collect();
        let critical = result
            .risks
            .iter()
            .filter(|r| r.severity == Severity::Critical)
            .count();

        format!(
            "Decide whether an SDLC pipeline should proceed from the {phase} phase to the {next} phase.\n\n\
             Phase decision: {decision}\n\
             Confidence: {confidence:.0}%\n\
             Risks identified: {count} ({critical} critical)\n\
             {risks}\n\n\
             Guidelines:\n\
             1. A no-go decision must not proceed.\n\
             2. Critical risks without mitigation should stop the pipeline.\n\
             3. Confidence below 40% should be reviewed before proceeding.\n\
             4. A review decision may proceed with caution.\n\n\
             Respond with JSON only:\n\
             {{\"should_proceed\": true, \"confidence\": 0.0, \"reasoning\": \"...\"}}",
            phase = input.phase,
            next = input.next_phase,
            decision = result.decision,
            confidence = result.confidence() * 100.0,
            count = result.risks.len(),
            critical = critical,
            risks = if risks.is_empty() { "None".to_string() } else { risks.join("\n") },
        )
    }
}

#[async_trait]
impl DecisionStrategy<TransitionInput, TransitionVerdict> for LlmTransitionStrategy {
    fn name(&self) -> &str {
        "llm-transition"
    }

    async fn decide(&self, input: &TransitionInput) -> Result<TransitionVerdict, StrategyError> {
        let mut verdict: TransitionVerdict =
            complete_structured(self.client.as_ref(), &Self::prompt(input)).await?;
        if !verdict.confidence.is_finite() {
            return Err(StrategyError::Rejected("confidence is not a number".to_string()));
        }
        verdict.confidence = verdict.confidence.clamp(0.0, 1.0);
        Ok(verdict)
    }
}
