//! Per-kind handlers run inside batch tasks.

use std::collections::BTreeMap;

use chrono::Utc;
use futures::future::join_all;
use galactic_types::{
    Action, ActionKind, ActionPayload, AiTier, Decision, DecisionMethod, Player, PlayerActionPayload,
    PlayerId, RegionId,
};
use tracing::{debug, info, warn};

use crate::ai::DecisionRequest;
use crate::engine::{EMA_ALPHA, EngineInner, lock};
use crate::hooks::{DailyContext, QuarterlyContext};

impl EngineInner {
    /// Route a batch to the handler for its kind. Returns the number of
    /// actions handled.
    pub(crate) async fn process_action_group(&self, kind: ActionKind, actions: Vec<Action>) -> usize {
        match kind {
            ActionKind::PlayerAction => self.process_player_actions(actions).await,
            ActionKind::AiDecision => self.process_ai_decisions(actions).await.len(),
            ActionKind::EconomicUpdate => self.process_economic_updates(actions).await,
            ActionKind::DailyUpdate => self.process_daily_updates(actions).await,
            ActionKind::QuarterlyUpdate => self.process_quarterly_updates(actions).await,
        }
    }

    // -----------------------------------------------------------------------
    // Player actions
    // -----------------------------------------------------------------------

    async fn process_player_actions(&self, actions: Vec<Action>) -> usize {
        let mut by_player: BTreeMap<PlayerId, Vec<PlayerActionPayload>> = BTreeMap::new();
        for action in actions {
            if let ActionPayload::PlayerAction(payload) = action.payload {
                by_player.entry(payload.player_id).or_default().push(payload);
            }
        }
        join_all(
            by_player
                .into_iter()
                .map(|(player_id, payloads)| self.process_player_action_group(player_id, payloads)),
        )
        .await
        .into_iter()
        .sum()
    }

    /// Apply one player's actions in order. A failing action is logged and
    /// the rest still run.
    async fn process_player_action_group(
        &self,
        player_id: PlayerId,
        payloads: Vec<PlayerActionPayload>,
    ) -> usize {
        let Some(player) = self.record_activity(player_id, payloads.len()).await else {
            debug!(player_id = %player_id, dropped = payloads.len(), "Actions for unknown player dropped");
            return 0;
        };
        for payload in &payloads {
            if let Err(e) = self.hooks.on_player_action(&player, payload).await {
                warn!(
                    player_id = %player_id,
                    command = %payload.command,
                    error = %e,
                    "Player action failed"
                );
            }
        }
        payloads.len()
    }

    /// Update activity counters and return a copy of the player.
    async fn record_activity(&self, player_id: PlayerId, count: usize) -> Option<Player> {
        let mut registry = self.registry.write().await;
        let player = registry.players.get_mut(&player_id)?;
        let now = Utc::now();
        let gap_ms = now
            .signed_duration_since(player.last_action_time)
            .num_milliseconds()
            .max(0);
        #[allow(clippy::cast_precision_loss)]
        let gap_ms = gap_ms as f64;
        player.average_action_interval_ms = if player.action_count == 0 {
            gap_ms
        } else {
            player
                .average_action_interval_ms
                .mul_add(1.0 - EMA_ALPHA, gap_ms * EMA_ALPHA)
        };
        player.action_count = player
            .action_count
            .saturating_add(u64::try_from(count).unwrap_or(u64::MAX));
        player.last_action_time = now;
        player.last_activity = now;
        Some(player.clone())
    }

    // -----------------------------------------------------------------------
    // AI decisions
    // -----------------------------------------------------------------------

    /// Resolve every decision request, one decision per request whose
    /// player is known.
    pub(crate) async fn process_ai_decisions(&self, actions: Vec<Action>) -> Vec<Decision> {
        let mut by_tier: BTreeMap<AiTier, Vec<(DecisionRequest, RegionId)>> = BTreeMap::new();
        {
            let registry = self.registry.read().await;
            for action in &actions {
                let Some(request) = DecisionRequest::from_action(action) else {
                    continue;
                };
                match registry.players.get(&request.player_id) {
                    Some(player) => by_tier
                        .entry(player.ai_tier)
                        .or_default()
                        .push((request, player.region_id.clone())),
                    None => {
                        debug!(player_id = %request.player_id, "Decision for unknown player dropped");
                    }
                }
            }
        }

        let decisions: Vec<Decision> = join_all(
            by_tier
                .into_iter()
                .map(|(tier, requests)| self.process_tier_decisions(tier, requests)),
        )
        .await
        .into_iter()
        .flatten()
        .collect();

        for decision in &decisions {
            if let Err(e) = self.hooks.on_decision(decision).await {
                warn!(player_id = %decision.player_id, error = %e, "Decision hook failed");
            }
        }
        decisions
    }

    /// Send up to the remaining budget through the AI path and the rest
    /// through the rules.
    async fn process_tier_decisions(
        &self,
        tier: AiTier,
        requests: Vec<(DecisionRequest, RegionId)>,
    ) -> Vec<Decision> {
        let budget = usize::try_from(self.ai.remaining_budget(tier)).unwrap_or(usize::MAX);
        let ai_count = budget.min(requests.len());
        debug!(
            tier = %tier,
            requests = requests.len(),
            ai = ai_count,
            "Processing tier decisions"
        );
        join_all(requests.into_iter().enumerate().map(|(i, (request, region))| async move {
            if i < ai_count {
                self.decide_with_ai(tier, request, &region).await
            } else {
                self.ai.process_rule_based_decision(&request, tier)
            }
        }))
        .await
    }

    /// Cache first, then the budgeted model.
    async fn decide_with_ai(&self, tier: AiTier, request: DecisionRequest, region: &RegionId) -> Decision {
        let key = format!("{tier}:{}", request.context);
        let cached = lock(&self.cache).get(&key);
        if let Some(hit) = cached {
            return Decision {
                action_id: request.action_id,
                player_id: request.player_id,
                method: DecisionMethod::Cached,
                ..hit
            };
        }

        let decision = self.ai.process_decision(&request, tier).await;
        if decision.method == DecisionMethod::Ai {
            lock(&self.cache).set(key, decision.clone());
            self.registry
                .write()
                .await
                .shards
                .add_ai_load(region, self.config.ai_load_per_call);
        }
        decision
    }

    // -----------------------------------------------------------------------
    // Economic, daily and quarterly updates
    // -----------------------------------------------------------------------

    async fn process_economic_updates(&self, actions: Vec<Action>) -> usize {
        for action in &actions {
            let ActionPayload::EconomicUpdate(update) = &action.payload else {
                continue;
            };
            if let Err(e) = self.hooks.on_economic_update(update).await {
                warn!(region = ?update.region_id, error = %e, "Economic update failed");
            }
        }
        actions.len()
    }

    async fn process_daily_updates(&self, actions: Vec<Action>) -> usize {
        for action in &actions {
            let ActionPayload::DailyUpdate(update) = &action.payload else {
                continue;
            };
            let context = {
                let registry = self.registry.read().await;
                let now = Utc::now();
                DailyContext {
                    game_day: update.game_day,
                    active_players: registry.count_active(now, self.config.active_player_threshold()),
                    total_players: registry.players.len(),
                    processed_at: now,
                }
            };
            debug!(
                game_day = context.game_day,
                active_players = context.active_players,
                "Daily update"
            );
            if let Err(e) = self.hooks.on_daily_update(&context).await {
                warn!(game_day = context.game_day, error = %e, "Daily update failed");
            }
        }
        actions.len()
    }

    async fn process_quarterly_updates(&self, actions: Vec<Action>) -> usize {
        for action in &actions {
            let ActionPayload::QuarterlyUpdate(update) = &action.payload else {
                continue;
            };
            let context = {
                let registry = self.registry.read().await;
                QuarterlyContext {
                    quarter: update.quarter,
                    game_day: registry.clock.current_game_day(),
                    regions: registry.shards.to_vec(),
                }
            };
            for region in &context.regions {
                info!(
                    quarter = context.quarter,
                    region = %region.id,
                    players = region.player_count,
                    civilizations = region.civilization_count,
                    load = region.load(),
                    "Quarterly region summary"
                );
            }
            if let Err(e) = self.hooks.on_quarterly_update(&context).await {
                warn!(quarter = context.quarter, error = %e, "Quarterly update failed");
            }
        }
        actions.len()
    }
}
