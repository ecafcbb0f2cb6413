//! Groups drained actions into batches that can be dispatched together.
//!
//! Actions sharing a kind, a priority and a region land in the same batch.
//! Each batch carries a deadline derived from its priority's latency
//! target; the engine counts batches that finish late.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use galactic_types::{Action, ActionKind, Priority, RegionId};
use tokio::time::Instant;

use crate::config::ProcessingPriorities;

/// Identity of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BatchKey {
    /// Action kind shared by every member.
    pub kind: ActionKind,
    /// Priority shared by every member.
    pub priority: Priority,
    /// Region shared by every member; `None` means galaxy-wide.
    pub region_id: Option<RegionId>,
}

impl BatchKey {
    fn for_action(action: &Action) -> Self {
        Self {
            kind: action.kind(),
            priority: action.priority,
            region_id: action.region_id.clone(),
        }
    }
}

impl fmt::Display for BatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.region_id {
            Some(region) => write!(f, "{}_{}_{}", self.kind, self.priority, region),
            None => write!(f, "{}_{}_global", self.kind, self.priority),
        }
    }
}

/// A group of actions dispatched as one unit.
#[derive(Debug)]
pub struct ActionBatch {
    /// Shared identity of the members.
    pub key: BatchKey,
    /// Members in arrival order.
    pub actions: Vec<Action>,
    /// Instant by which the batch should be finished.
    pub deadline: Instant,
}

/// Accumulates actions into keyed batches.
#[derive(Debug)]
pub struct IntelligentBatcher {
    deadlines: [Duration; 5],
    batches: Vec<ActionBatch>,
    index: HashMap<BatchKey, usize>,
}

impl IntelligentBatcher {
    /// Create a batcher whose deadlines follow the priorities' latency
    /// targets.
    pub fn new(priorities: &ProcessingPriorities) -> Self {
        Self {
            deadlines: Priority::ALL.map(|p| priorities.get(p).max_latency()),
            batches: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Deadline offset for a priority.
    pub fn deadline_for(&self, priority: Priority) -> Duration {
        self.deadlines
            .get(priority.index())
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    /// Add an action, opening a new batch on first use of its key.
    pub fn add_action(&mut self, action: Action) {
        self.add_action_at(action, Instant::now());
    }

    /// Add an action using `now` as the reference for a new batch's
    /// deadline.
    pub fn add_action_at(&mut self, action: Action, now: Instant) {
        let key = BatchKey::for_action(&action);
        if let Some(batch) = self.index.get(&key).and_then(|&i| self.batches.get_mut(i)) {
            batch.actions.push(action);
            return;
        }
        let deadline = now
            .checked_add(self.deadline_for(key.priority))
            .unwrap_or(now);
        self.index.insert(key.clone(), self.batches.len());
        self.batches.push(ActionBatch {
            key,
            actions: vec![action],
            deadline,
        });
    }

    /// Whether no actions have been added since the last drain.
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Take every open batch, in first-seen order.
    pub fn drain(&mut self) -> Vec<ActionBatch> {
        self.index.clear();
        std::mem::take(&mut self.batches)
    }
}

impl Default for IntelligentBatcher {
    fn default() -> Self {
        Self::new(&ProcessingPriorities::default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use galactic_types::{
        ActionId, ActionPayload, EconomicUpdatePayload, PlayerActionPayload, PlayerId,
    };

    use super::*;

    fn economic(priority: Priority, region: Option<&str>) -> Action {
        Action {
            id: ActionId::new(),
            priority,
            region_id: region.map(RegionId::new),
            payload: ActionPayload::EconomicUpdate(EconomicUpdatePayload {
                region_id: None,
                indicators: serde_json::Value::Null,
            }),
            enqueued_at: Utc::now(),
            game_day: 0,
        }
    }

    #[test]
    fn same_key_shares_a_batch() {
        let mut batcher = IntelligentBatcher::default();
        batcher.add_action(economic(Priority::High, Some("outer-rim")));
        batcher.add_action(economic(Priority::High, Some("outer-rim")));
        batcher.add_action(economic(Priority::High, None));
        batcher.add_action(economic(Priority::Low, Some("outer-rim")));

        let batches = batcher.drain();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].actions.len(), 2);
        assert_eq!(batches[0].key.to_string(), "economic-update_high_outer-rim");
        assert_eq!(batches[1].key.to_string(), "economic-update_high_global");
        assert!(batcher.is_empty());
    }

    #[test]
    fn kinds_are_batched_separately() {
        let mut batcher = IntelligentBatcher::default();
        batcher.add_action(economic(Priority::Critical, None));
        batcher.add_action(Action {
            id: ActionId::new(),
            priority: Priority::Critical,
            region_id: None,
            payload: ActionPayload::PlayerAction(PlayerActionPayload {
                player_id: PlayerId::new(),
                command: "scan".to_owned(),
                params: serde_json::Value::Null,
            }),
            enqueued_at: Utc::now(),
            game_day: 0,
        });
        assert_eq!(batcher.drain().len(), 2);
    }

    #[test]
    fn deadline_follows_priority() {
        let mut batcher = IntelligentBatcher::default();
        let now = Instant::now();
        batcher.add_action_at(economic(Priority::Critical, None), now);
        batcher.add_action_at(economic(Priority::Batch, None), now);
        let batches = batcher.drain();
        assert_eq!(batches[0].deadline, now + Duration::from_millis(100));
        assert_eq!(batches[1].deadline, now + Duration::from_secs(90));
    }

    #[test]
    fn later_members_keep_first_deadline() {
        let mut batcher = IntelligentBatcher::default();
        let now = Instant::now();
        batcher.add_action_at(economic(Priority::High, None), now);
        batcher.add_action_at(economic(Priority::High, None), now + Duration::from_secs(5));
        let batches = batcher.drain();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].deadline, now + Duration::from_secs(1));
    }
}
