//! Bounded FIFO queues, one per priority class.

use std::collections::VecDeque;

use galactic_types::{Action, ActionId, Priority, QueueDepths};
use serde::Serialize;

use crate::config::ProcessingPriorities;

/// Result of submitting an action to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EnqueueOutcome {
    /// The action is waiting in its queue.
    Queued {
        /// Identifier stamped on the action.
        action_id: ActionId,
        /// Queue it was placed in.
        priority: Priority,
        /// Depth of that queue after the push.
        depth: usize,
    },
    /// The priority name was not recognised; nothing was queued.
    UnknownPriority {
        /// The rejected name.
        name: String,
    },
    /// The queue was full; the action was dropped.
    Shed {
        /// Queue that was full.
        priority: Priority,
    },
}

impl EnqueueOutcome {
    /// Whether the action made it into a queue.
    pub const fn is_queued(&self) -> bool {
        matches!(self, Self::Queued { .. })
    }
}

/// Five FIFO queues indexed by [`Priority`].
#[derive(Debug)]
pub struct PriorityQueues {
    queues: [VecDeque<Action>; 5],
    capacities: [usize; 5],
}

impl PriorityQueues {
    /// Create empty queues with the configured capacities.
    pub fn new(priorities: &ProcessingPriorities) -> Self {
        Self {
            queues: Default::default(),
            capacities: Priority::ALL.map(|p| priorities.get(p).capacity),
        }
    }

    /// Append an action to the back of its queue.
    ///
    /// Returns the action back when the queue is at capacity.
    pub fn push(&mut self, action: Action) -> Result<usize, Action> {
        let index = action.priority.index();
        let capacity = self.capacities.get(index).copied().unwrap_or(0);
        let Some(queue) = self.queues.get_mut(index) else {
            return Err(action);
        };
        if queue.len() >= capacity {
            return Err(action);
        }
        queue.push_back(action);
        Ok(queue.len())
    }

    /// Remove up to `max` actions from the front of a queue.
    pub fn pop_batch(&mut self, priority: Priority, max: usize) -> Vec<Action> {
        let Some(queue) = self.queues.get_mut(priority.index()) else {
            return Vec::new();
        };
        let take = max.min(queue.len());
        queue.drain(..take).collect()
    }

    /// Number of actions waiting in one queue.
    pub fn len(&self, priority: Priority) -> usize {
        self.queues.get(priority.index()).map_or(0, VecDeque::len)
    }

    /// Number of actions waiting across all queues.
    pub fn total(&self) -> usize {
        self.queues.iter().map(VecDeque::len).sum()
    }

    /// Whether every queue is empty.
    pub fn is_empty(&self) -> bool {
        self.queues.iter().all(VecDeque::is_empty)
    }

    /// Per-priority depths.
    pub fn depths(&self) -> QueueDepths {
        let mut depths = QueueDepths::default();
        for priority in Priority::ALL {
            *depths.get_mut(priority) = self.len(priority);
        }
        depths
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use galactic_types::{ActionPayload, DailyUpdatePayload};

    use super::*;

    fn action(priority: Priority, game_day: u64) -> Action {
        Action {
            id: ActionId::new(),
            priority,
            region_id: None,
            payload: ActionPayload::DailyUpdate(DailyUpdatePayload { game_day }),
            enqueued_at: Utc::now(),
            game_day,
        }
    }

    #[test]
    fn each_priority_is_fifo() {
        let mut queues = PriorityQueues::new(&ProcessingPriorities::default());
        for priority in Priority::ALL {
            for day in 0..3 {
                queues.push(action(priority, day)).unwrap();
            }
        }
        assert_eq!(queues.total(), 15);
        for priority in Priority::ALL {
            let popped = queues.pop_batch(priority, 10);
            let days: Vec<u64> = popped.iter().map(|a| a.game_day).collect();
            assert_eq!(days, vec![0, 1, 2]);
            assert!(popped.iter().all(|a| a.priority == priority));
        }
        assert!(queues.is_empty());
    }

    #[test]
    fn pop_batch_respects_max() {
        let mut queues = PriorityQueues::new(&ProcessingPriorities::default());
        for day in 0..5 {
            queues.push(action(Priority::Low, day)).unwrap();
        }
        assert_eq!(queues.pop_batch(Priority::Low, 2).len(), 2);
        assert_eq!(queues.len(Priority::Low), 3);
        assert!(queues.pop_batch(Priority::High, 2).is_empty());
    }

    #[test]
    fn full_queue_returns_action() {
        let mut priorities = ProcessingPriorities::default();
        priorities.critical.capacity = 1;
        let mut queues = PriorityQueues::new(&priorities);
        assert_eq!(queues.push(action(Priority::Critical, 1)), Ok(1));
        let rejected = queues.push(action(Priority::Critical, 2)).unwrap_err();
        assert_eq!(rejected.game_day, 2);
        assert_eq!(queues.len(Priority::Critical), 1);
        assert!(queues.push(action(Priority::High, 3)).is_ok());
    }

    #[test]
    fn depths_reflect_each_queue() {
        let mut queues = PriorityQueues::new(&ProcessingPriorities::default());
        queues.push(action(Priority::Critical, 1)).unwrap();
        queues.push(action(Priority::Batch, 1)).unwrap();
        queues.push(action(Priority::Batch, 2)).unwrap();
        let depths = queues.depths();
        assert_eq!(depths.critical, 1);
        assert_eq!(depths.batch, 2);
        assert_eq!(depths.total(), 3);
    }
}
