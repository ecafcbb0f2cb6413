//! Budgeted AI decision processing.
//!
//! Each tier gets a quarterly allowance of model-backed decisions. While
//! the allowance lasts, decisions go to the [`DecisionModel`]; once it is
//! spent, or when the model fails, the instant rule-based fallback
//! answers instead. The allowance is refilled at every quarter tick.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use galactic_types::{
    Action, ActionId, ActionPayload, AiTier, Decision, DecisionMethod, PlayerId,
};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::config::AiBudgetConfig;

/// Confidence reported by rule-based decisions.
pub const RULE_BASED_CONFIDENCE: f64 = 0.5;

/// Errors produced by a decision model.
#[derive(Debug, thiserror::Error)]
pub enum DecisionError {
    /// The model is switched off.
    #[error("decision model is disabled")]
    Disabled,

    /// The model failed to answer.
    #[error("decision model failed: {message}")]
    Model {
        /// Description of the failure.
        message: String,
    },
}

/// What a decision is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionRequest {
    /// The action that asked for the decision.
    pub action_id: ActionId,
    /// The player the decision is for.
    pub player_id: PlayerId,
    /// Situation summary.
    pub context: String,
}

impl DecisionRequest {
    /// Extract a request from an `ai-decision` action.
    pub fn from_action(action: &Action) -> Option<Self> {
        match &action.payload {
            ActionPayload::AiDecision(payload) => Some(Self {
                action_id: action.id,
                player_id: payload.player_id,
                context: payload.context.clone(),
            }),
            _ => None,
        }
    }
}

/// Raw answer from a decision model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelAnswer {
    /// Decision text.
    pub decision: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
}

/// Relative effort spent on a decision for each tier.
pub const fn tier_complexity(tier: AiTier) -> f64 {
    match tier {
        AiTier::Tier1 => 0.9,
        AiTier::Tier2 => 0.6,
        AiTier::Tier3 => 0.3,
    }
}

// ---------------------------------------------------------------------------
// Decision models
// ---------------------------------------------------------------------------

/// Stand-in for an external AI service.
///
/// Waits `complexity x 100ms` to mimic inference latency and answers with
/// confidence equal to the tier complexity.
#[derive(Debug, Clone)]
pub struct SimulatedModel {
    latency_per_complexity: Duration,
}

impl SimulatedModel {
    /// Strategic stances the simulated model chooses between.
    const STANCES: [&'static str; 6] = [
        "expand colonies",
        "invest in research",
        "strengthen fleet",
        "pursue trade agreements",
        "consolidate economy",
        "open diplomatic channels",
    ];

    /// Create a model with the default 100ms latency scale.
    pub const fn new() -> Self {
        Self {
            latency_per_complexity: Duration::from_millis(100),
        }
    }

    /// Create a model with a custom latency scale.
    pub const fn with_latency(latency_per_complexity: Duration) -> Self {
        Self {
            latency_per_complexity,
        }
    }

    async fn decide(&self, request: &DecisionRequest, tier: AiTier) -> ModelAnswer {
        let complexity = tier_complexity(tier);
        let stance_index = rand::rng().random_range(0..Self::STANCES.len());
        tokio::time::sleep(self.latency_per_complexity.mul_f64(complexity)).await;
        let stance = Self::STANCES.get(stance_index).copied().unwrap_or("hold position");
        ModelAnswer {
            decision: format!("{stance} ({})", request.context),
            confidence: complexity,
        }
    }
}

impl Default for SimulatedModel {
    fn default() -> Self {
        Self::new()
    }
}

/// The model behind AI-backed decisions.
///
/// Uses enum dispatch instead of trait objects because async methods
/// are not dyn-compatible in Rust.
#[derive(Debug, Clone)]
pub enum DecisionModel {
    /// Latency-simulating stand-in.
    Simulated(SimulatedModel),
    /// Always fails, so every decision degrades to the rule-based path.
    Disabled,
}

impl DecisionModel {
    /// Ask the model for a decision.
    ///
    /// # Errors
    ///
    /// Returns [`DecisionError`] if the model cannot answer.
    pub async fn decide(
        &self,
        request: &DecisionRequest,
        tier: AiTier,
    ) -> Result<ModelAnswer, DecisionError> {
        match self {
            Self::Simulated(model) => Ok(model.decide(request, tier).await),
            Self::Disabled => Err(DecisionError::Disabled),
        }
    }

    /// Human-readable name for logging.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Simulated(_) => "simulated",
            Self::Disabled => "disabled",
        }
    }
}

impl Default for DecisionModel {
    fn default() -> Self {
        Self::Simulated(SimulatedModel::new())
    }
}

// ---------------------------------------------------------------------------
// Rule-based fallback
// ---------------------------------------------------------------------------

/// Keyword rules checked in order; the first match decides.
const RULES: [(&str, &str); 5] = [
    ("attack", "fortify defenses"),
    ("war", "fortify defenses"),
    ("famine", "ration resources"),
    ("shortage", "ration resources"),
    ("trade", "accept balanced trade"),
];

/// Fallback stance when no rule matches.
const DEFAULT_RULE: &str = "maintain current policy";

fn rule_based_answer(context: &str) -> &'static str {
    let lowered = context.to_lowercase();
    RULES
        .iter()
        .find(|(keyword, _)| lowered.contains(keyword))
        .map_or(DEFAULT_RULE, |(_, decision)| decision)
}

// ---------------------------------------------------------------------------
// Processor
// ---------------------------------------------------------------------------

/// Rations model-backed decisions per tier and quarter.
#[derive(Debug)]
pub struct AdaptiveAiProcessor {
    budgets: AiBudgetConfig,
    remaining: [AtomicU32; 3],
    ai_calls: [AtomicU64; 3],
    rule_based_calls: AtomicU64,
    model: DecisionModel,
}

impl AdaptiveAiProcessor {
    /// Create a processor with full budgets.
    pub fn new(budgets: AiBudgetConfig, model: DecisionModel) -> Self {
        let remaining = AiTier::ALL.map(|tier| AtomicU32::new(budgets.for_tier(tier)));
        Self {
            budgets,
            remaining,
            ai_calls: Default::default(),
            rule_based_calls: AtomicU64::new(0),
            model,
        }
    }

    /// Log the configured budgets.
    pub fn initialize(&self) {
        info!(
            model = self.model.name(),
            tier1 = self.budgets.tier1,
            tier2 = self.budgets.tier2,
            tier3 = self.budgets.tier3,
            rule_based_unlimited = self.budgets.rule_based_unlimited,
            "AI processor initialized"
        );
    }

    fn slot(&self, tier: AiTier) -> Option<&AtomicU32> {
        self.remaining.get(tier.index())
    }

    /// Decisions left for a tier this quarter.
    pub fn remaining_budget(&self, tier: AiTier) -> u32 {
        self.slot(tier).map_or(0, |slot| slot.load(Ordering::Acquire))
    }

    /// Refill every tier to its configured maximum and zero the
    /// per-quarter counters.
    pub fn reset_quarterly_budgets(&self) {
        for tier in AiTier::ALL {
            if let Some(slot) = self.slot(tier) {
                slot.store(self.budgets.for_tier(tier), Ordering::Release);
            }
            if let Some(calls) = self.ai_calls.get(tier.index()) {
                calls.store(0, Ordering::Relaxed);
            }
        }
        self.rule_based_calls.store(0, Ordering::Relaxed);
        debug!("Quarterly AI budgets reset");
    }

    /// Take one unit of budget. Returns `false` when the tier is spent.
    fn try_consume(&self, tier: AiTier) -> bool {
        self.slot(tier).is_some_and(|slot| {
            slot.fetch_update(Ordering::AcqRel, Ordering::Acquire, |left| {
                left.checked_sub(1)
            })
            .is_ok()
        })
    }

    /// Resolve a decision, spending budget when any is left.
    ///
    /// Model failures are logged and answered by the rule-based path;
    /// the spent budget unit is not refunded.
    pub async fn process_decision(&self, request: &DecisionRequest, tier: AiTier) -> Decision {
        if !self.try_consume(tier) {
            return self.process_rule_based_decision(request, tier);
        }
        if let Some(calls) = self.ai_calls.get(tier.index()) {
            calls.fetch_add(1, Ordering::Relaxed);
        }
        match self.model.decide(request, tier).await {
            Ok(answer) => Decision {
                action_id: request.action_id,
                player_id: request.player_id,
                tier,
                decision: answer.decision,
                confidence: answer.confidence.clamp(0.0, 1.0),
                method: DecisionMethod::Ai,
            },
            Err(e) => {
                warn!(
                    player_id = %request.player_id,
                    tier = %tier,
                    error = %e,
                    "AI decision failed, using rules"
                );
                self.process_rule_based_decision(request, tier)
            }
        }
    }

    /// Answer instantly from the keyword rules.
    pub fn process_rule_based_decision(&self, request: &DecisionRequest, tier: AiTier) -> Decision {
        self.rule_based_calls.fetch_add(1, Ordering::Relaxed);
        Decision {
            action_id: request.action_id,
            player_id: request.player_id,
            tier,
            decision: rule_based_answer(&request.context).to_owned(),
            confidence: RULE_BASED_CONFIDENCE,
            method: DecisionMethod::Rules,
        }
    }

    /// Model-backed calls spent this quarter, keyed by tier label.
    pub fn ai_calls_this_quarter(&self) -> BTreeMap<String, u64> {
        AiTier::ALL
            .iter()
            .map(|tier| {
                let calls = self
                    .ai_calls
                    .get(tier.index())
                    .map_or(0, |c| c.load(Ordering::Relaxed));
                (tier.as_str().to_owned(), calls)
            })
            .collect()
    }

    /// Rule-based decisions made this quarter.
    pub fn rule_based_decisions_this_quarter(&self) -> u64 {
        self.rule_based_calls.load(Ordering::Relaxed)
    }
}
