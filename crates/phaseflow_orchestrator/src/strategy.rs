//! Decision strategies: a fallible primary tried first, a heuristic always available.
//!
//! Phase transitions, risk aggregation, and recommendation synthesis all go
//! through [`with_fallback`]. A primary failure of any kind is logged and the
//! heuristic answer is used instead; callers never see the error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StrategyError;

/// Which path produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestrationMethod {
    Llm,
    Heuristic,
}

impl OrchestrationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrchestrationMethod::Llm => "llm",
            OrchestrationMethod::Heuristic => "heuristic",
        }
    }

    /// `Llm` only when every decision came from the model.
    pub fn combine(decisions: impl IntoIterator<Item = OrchestrationMethod>) -> Self {
        let mut any = false;
        for method in decisions {
            if method == OrchestrationMethod::Heuristic {
                return OrchestrationMethod::Heuristic;
            }
            any = true;
        }
        if any {
            OrchestrationMethod::Llm
        } else {
            OrchestrationMethod::Heuristic
        }
    }
}

impl std::fmt::Display for OrchestrationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A strategy that may fail, such as one backed by an LLM.
#[async_trait]
pub trait DecisionStrategy<I, O>: Send + Sync
where
    I: Sync + ?Sized,
{
    fn name(&self) -> &str;

    async fn decide(&self, input: &I) -> Result<O, StrategyError>;
}

/// A deterministic strategy that always has an answer.
pub trait HeuristicStrategy<I, O>: Send + Sync
where
    I: ?Sized,
{
    fn decide(&self, input: &I) -> O;
}

impl<I, O, F> HeuristicStrategy<I, O> for F
where
    I: ?Sized,
    F: Fn(&I) -> O + Send + Sync,
{
    fn decide(&self, input: &I) -> O {
        self(input)
    }
}

/// A value and the path that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Decided<O> {
    pub value: O,
    pub method: OrchestrationMethod,
}

/// Primary strategy with a heuristic fallback.
pub struct WithFallback<I: Sync + ?Sized, O> {
    label: &'static str,
    primary: Option<Box<dyn DecisionStrategy<I, O>>>,
    fallback: Box<dyn HeuristicStrategy<I, O>>,
}

/// Combine an optional primary strategy with a heuristic fallback.
///
/// With no primary, every decision is heuristic.
pub fn with_fallback<I, O>(
    label: &'static str,
    primary: Option<Box<dyn DecisionStrategy<I, O>>>,
    fallback: impl HeuristicStrategy<I, O> + 'static,
) -> WithFallback<I, O>
where
    I: Sync + ?Sized,
{
    WithFallback {
        label,
        primary,
        fallback: Box::new(fallback),
    }
}

impl<I, O> WithFallback<I, O>
where
    I: Sync + ?Sized,
{
    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn has_primary(&self) -> bool {
        self.primary.is_some()
    }

    pub async fn decide(&self, input: &I) -> Decided<O> {
        if let Some(primary) = &self.primary {
            match primary.decide(input).await {
                Ok(value) => {
                    debug!("{} decided by {}", self.label, primary.name());
                    return Decided {
                        value,
                        method: OrchestrationMethod::Llm,
                    };
                }
                Err(e) => {
                    warn!("{} via {} failed, using heuristics: {}", self.label, primary.name(), e);
                }
            }
        }

        Decided {
            value: self.fallback.decide(input),
            method: OrchestrationMethod::Heuristic,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Result<u32, &'static str>);

    #[async_trait]
    impl DecisionStrategy<u32, u32> for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn decide(&self, _input: &u32) -> Result<u32, StrategyError> {
            self.0.map_err(|e| StrategyError::Rejected(e.to_string()))
        }
    }

    #[tokio::test]
    async fn test_primary_wins_when_it_succeeds() {
        let strategy = with_fallback::<u32, u32>("double", Some(Box::new(Fixed(Ok(7)))), |x: &u32| x * 2);

        let decided = strategy.decide(&5).await;
        assert_eq!(decided, Decided { value: 7, method: OrchestrationMethod::Llm });
    }

    #[tokio::test]
    async fn test_primary_failure_uses_fallback() {
        let strategy = with_fallback::<u32, u32>("double", Some(Box::new(Fixed(Err("bad json")))), |x: &u32| x * 2);

        let decided = strategy.decide(&5).await;
        assert_eq!(decided, Decided { value: 10, method: OrchestrationMethod::Heuristic });
    }

    #[tokio::test]
    async fn test_no_primary_is_heuristic() {
        let strategy = with_fallback::<u32, u32>("double", None, |x: &u32| x * 2);

        assert!(!strategy.has_primary());
        assert_eq!(strategy.decide(&1).await.method, OrchestrationMethod::Heuristic);
    }

    #[test]
    fn test_combine() {
        use OrchestrationMethod::*;
        assert_eq!(OrchestrationMethod::combine([Llm, Llm]), Llm);
        assert_eq!(OrchestrationMethod::combine([Llm, Heuristic, Llm]), Heuristic);
        assert_eq!(OrchestrationMethod::combine([]), Heuristic);
    }
}
