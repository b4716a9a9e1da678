//! Cross-phase risk aggregation.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use phaseflow_core::{Risk, SdlcPhaseResult};
use phaseflow_llm::{complete_structured, LlmClient};

use crate::error::StrategyError;
use crate::request::PhaseResults;
use crate::strategy::DecisionStrategy;

/// Every phase's risks in phase order. Risks without a source are tagged with their phase.
pub fn flatten_risks(phase_results: &PhaseResults) -> Vec<Risk> {
    phase_results
        .iter()
        .filter_map(|(phase, output)| SdlcPhaseResult::from_output(output).map(|r| (*phase, r)))
        .flat_map(|(phase, result)| {
            result.risks.into_iter().map(move |risk| match risk.source_phase {
                Some(_) => risk,
                None => risk.from_phase(phase),
            })
        })
        .collect()
}

/// Lossless aggregation: the flattened list, unchanged.
pub fn heuristic_risks(phase_results: &PhaseResults) -> Vec<Risk> {
    flatten_risks(phase_results)
}

#[derive(Debug, Deserialize)]
struct AggregatedRisks {
    aggregated_risks: Vec<Risk>,
}

/// Lets the model merge and re-rank the flattened list.
///
/// The response replaces the list only if it parses into a non-empty list of
/// risks that each carry a description.
pub struct LlmRiskStrategy {
    client: Arc<dyn LlmClient>,
}

impl LlmRiskStrategy {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    pub fn prompt(risks: &[Risk]) -> Result<String, StrategyError> {
        let listed = serde_json::to_string_pretty(risks)
            .map_err(|e| StrategyError::Rejected(e.to_string()))?;
        Ok(format!(
            "Aggregate the risks identified across the phases of an SDLC pipeline.\n\n\
             Total risks: {count}\n\n\
             Risks by phase:\n{listed}\n\n\
             Tasks:\n\
             1. Identify duplicated or related risks across phases.\n\
             2. Merge similar risks into one.\n\
             3. Rank by severity and cumulative impact.\n\
             4. Adjust severity where a pattern spans several phases.\n\n\
             Respond with JSON only:\n\
             {{\"aggregated_risks\": [{{\"type\": \"technical|schedule|requirements|business\", \
             \"severity\": \"critical|high|medium|low\", \"description\": \"...\", \
             \"mitigation\": \"...\", \"source_phase\": \"feasibility\"}}]}}",
            count = risks.len(),
            listed = listed,
        ))
    }
}

#[async_trait]
impl DecisionStrategy<PhaseResults, Vec<Risk>> for LlmRiskStrategy {
    fn name(&self) -> &str {
        "llm-risk-aggregation"
    }

    async fn decide(&self, phase_results: &PhaseResults) -> Result<Vec<Risk>, StrategyError> {
        let risks = flatten_risks(phase_results);
        if risks.is_empty() {
            return Ok(risks);
        }

        let response: AggregatedRisks =
            complete_structured(self.client.as_ref(), &Self::prompt(&risks)?).await?;

        if response.aggregated_risks.is_empty() {
            return Err(StrategyError::Rejected("aggregated risk list is empty".to_string()));
        }
        if response.aggregated_risks.iter().any(|r| r.description.trim().is_empty()) {
            return Err(StrategyError::Rejected("aggregated risk without a description".to_string()));
        }
        Ok(response.aggregated_risks)
    }
}
