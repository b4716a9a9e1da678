//! Recommendation synthesis across phases.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use phaseflow_core::{Phase, SdlcPhaseResult};
use phaseflow_llm::{complete_structured, LlmClient};

use crate::error::StrategyError;
use crate::request::PhaseResults;
use crate::strategy::DecisionStrategy;

pub const MAX_RECOMMENDATIONS: usize = 7;
const LOW_FEASIBILITY_CONFIDENCE: f64 = 0.7;
const UNIT_SHARE_TARGET: f64 = 60.0;
const ALL_CLEAR: &str = "All indicators are positive; proceed with confidence";

fn phase_recommendations(phase_results: &PhaseResults) -> BTreeMap<Phase, Vec<String>> {
    phase_results
        .iter()
        .filter_map(|(phase, output)| SdlcPhaseResult::from_output(output).map(|r| (*phase, r.recommendations)))
        .filter(|(_, recommendations)| !recommendations.is_empty())
        .collect()
}

/// Indicator checks first, then each phase's own recommendations, deduplicated.
pub fn heuristic_recommendations(phase_results: &PhaseResults) -> Vec<String> {
    let mut recommendations = Vec::new();

    if let Some(result) = phase_results.get(&Phase::Feasibility).and_then(SdlcPhaseResult::from_output) {
        if result.confidence() < LOW_FEASIBILITY_CONFIDENCE {
            recommendations.push(format!(
                "Feasibility confidence is low ({:.0}%); review the identified risks",
                result.confidence() * 100.0
            ));
        }
    }

    if let Some(testing) = phase_results.get(&Phase::Testing) {
        let unit_share = testing
            .get("test_pyramid")
            .and_then(|p| p.get("unit_tests"))
            .and_then(|u| u.get("percentage"))
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        if unit_share < UNIT_SHARE_TARGET {
            recommendations.push(format!(
                "Raise the unit test share (currently {:.0}%, target {:.0}%)",
                unit_share, UNIT_SHARE_TARGET
            ));
        }
    }

    for recommendation in phase_recommendations(phase_results).into_values().flatten() {
        if !recommendations.contains(&recommendation) {
            recommendations.push(recommendation);
        }
    }

    if recommendations.is_empty() {
        recommendations.push(ALL_CLEAR.to_string());
    }
    recommendations.truncate(MAX_RECOMMENDATIONS);
    recommendations
}

fn pretty<T: Serialize>(value: &T) -> Result<String, StrategyError> {
    serde_json::to_string_pretty(value).map_err(|e| StrategyError::Rejected(e.to_string()))
}

#[derive(Debug, Deserialize)]
struct Synthesized {
    recommendations: Vec<String>,
}

/// Asks the model for a short, prioritized list.
pub struct LlmRecommendationStrategy {
    client: Arc<dyn LlmClient>,
}

impl LlmRecommendationStrategy {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    pub fn prompt(phase_results: &PhaseResults) -> Result<String, StrategyError> {
        let by_phase = phase_recommendations(phase_results);
        let decisions: BTreeMap<Phase, Value> = phase_results
            .iter()
            .filter_map(|(phase, output)| {
                SdlcPhaseResult::from_output(output)
                    .map(|r| (*phase, json!({ "decision": r.decision, "confidence": r.confidence() })))
            })
            .collect();

        Ok(format!(
            "Synthesize the recommendations from several SDLC phases into one coherent list.\n\n\
             Recommendations by phase:\n{recommendations}\n\n\
             Phase results:\n{decisions}\n\n\
             Tasks:\n\
             1. Remove duplicated or conflicting recommendations.\n\
             2. Prioritize by impact and group related items.\n\
             3. Return 3 to {max} actionable recommendations, most important first.\n\n\
             Respond with JSON only:\n\
             {{\"recommendations\": [\"...\"], \"priority\": \"high|medium|low\"}}",
            recommendations = pretty(&by_phase)?,
            decisions = pretty(&decisions)?,
            max = MAX_RECOMMENDATIONS,
        ))
    }
}

#[async_trait]
impl DecisionStrategy<PhaseResults, Vec<String>> for LlmRecommendationStrategy {
    fn name(&self) -> &str {
        "llm-recommendations"
    }

    async fn decide(&self, phase_results: &PhaseResults) -> Result<Vec<String>, StrategyError> {
        // Nothing to synthesize; the indicator checks still apply.
        if phase_recommendations(phase_results).is_empty() {
            return Ok(heuristic_recommendations(phase_results));
        }

        let response: Synthesized =
            complete_structured(self.client.as_ref(), &Self::prompt(phase_results)?).await?;

        let mut recommendations: Vec<String> = response
            .recommendations
            .into_iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();
        if recommendations.is_empty() {
            return Err(StrategyError::Rejected("no recommendations in response".to_string()));
        }
        recommendations.truncate(MAX_RECOMMENDATIONS);
        Ok(recommendations)
    }
}
