//! Extension points through which domain modules receive engine work.
//!
//! The engine schedules and rations; what a player command or a quarterly
//! roll-up actually *does* belongs to the embedding game. Every method has
//! a no-op default so implementations only override what they need.

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::{self, BoxFuture};
use galactic_types::{Decision, EconomicUpdatePayload, GalaxyRegion, Player, PlayerActionPayload};

/// Error returned by a hook. Logged by the engine; never fatal.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    /// The domain module rejected the work.
    #[error("rejected: {reason}")]
    Rejected {
        /// Why the work was rejected.
        reason: String,
    },

    /// The domain module failed while handling the work.
    #[error("hook failed: {message}")]
    Failed {
        /// Description of the failure.
        message: String,
    },
}

/// Passed to [`EngineHooks::on_daily_update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyContext {
    /// The game day being processed.
    pub game_day: u64,
    /// Players active within the activity threshold.
    pub active_players: usize,
    /// All registered players.
    pub total_players: usize,
    /// Wall-clock time of processing.
    pub processed_at: DateTime<Utc>,
}

/// Passed to [`EngineHooks::on_quarterly_update`].
#[derive(Debug, Clone, PartialEq)]
pub struct QuarterlyContext {
    /// The quarter being processed.
    pub quarter: u64,
    /// Game day at processing time.
    pub game_day: u64,
    /// Region state at processing time.
    pub regions: Vec<GalaxyRegion>,
}

/// Domain callbacks invoked by the dispatcher.
///
/// Hook futures run inside batch tasks, so a slow hook delays its own
/// batch only.
pub trait EngineHooks: Send + Sync {
    /// Apply a player command.
    fn on_player_action<'a>(
        &'a self,
        _player: &'a Player,
        _action: &'a PlayerActionPayload,
    ) -> BoxFuture<'a, Result<(), HookError>> {
        future::ready(Ok(())).boxed()
    }

    /// Receive a resolved AI decision.
    fn on_decision<'a>(&'a self, _decision: &'a Decision) -> BoxFuture<'a, Result<(), HookError>> {
        future::ready(Ok(())).boxed()
    }

    /// Recalculate an economy.
    fn on_economic_update<'a>(
        &'a self,
        _update: &'a EconomicUpdatePayload,
    ) -> BoxFuture<'a, Result<(), HookError>> {
        future::ready(Ok(())).boxed()
    }

    /// Run per-day domain work.
    fn on_daily_update<'a>(
        &'a self,
        _context: &'a DailyContext,
    ) -> BoxFuture<'a, Result<(), HookError>> {
        future::ready(Ok(())).boxed()
    }

    /// Run per-quarter domain work.
    fn on_quarterly_update<'a>(
        &'a self,
        _context: &'a QuarterlyContext,
    ) -> BoxFuture<'a, Result<(), HookError>> {
        future::ready(Ok(())).boxed()
    }
}

/// Hooks that accept everything and do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpHooks;

impl EngineHooks for NoOpHooks {}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use galactic_types::{ActionId, AiTier, DecisionMethod, PlayerId};

    use super::*;

    #[tokio::test]
    async fn no_op_hooks_accept_everything() {
        let hooks = NoOpHooks;
        let decision = Decision {
            action_id: ActionId::new(),
            player_id: PlayerId::new(),
            tier: AiTier::Tier3,
            decision: "hold".to_owned(),
            confidence: 0.5,
            method: DecisionMethod::Rules,
        };
        assert!(hooks.on_decision(&decision).await.is_ok());
        let context = QuarterlyContext {
            quarter: 1,
            game_day: 90,
            regions: Vec::new(),
        };
        assert!(hooks.on_quarterly_update(&context).await.is_ok());
    }
}
