// 2.5: withdrawal queue. ordered strategy identities, governance-mutable,
// defines liquidation priority. bounded so a withdrawal traversal has a fixed
// worst case.

use crate::types::StrategyId;
use serde::{Deserialize, Serialize};

pub const MAX_QUEUE_LEN: usize = 32;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalQueue {
    order: Vec<StrategyId>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("withdrawal queue is full (capacity {capacity})")]
    Full { capacity: usize },

    #[error("strategy {0:?} already queued")]
    Duplicate(StrategyId),

    #[error("strategy {0:?} not in queue")]
    NotQueued(StrategyId),
}

impl WithdrawalQueue {
    pub fn new() -> Self {
        Self { order: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.order.len() >= MAX_QUEUE_LEN
    }

    pub fn contains(&self, id: StrategyId) -> bool {
        self.order.contains(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = StrategyId> + '_ {
        self.order.iter().copied()
    }

    pub fn as_slice(&self) -> &[StrategyId] {
        &self.order
    }

    pub fn push(&mut self, id: StrategyId) -> Result<(), QueueError> {
        if self.is_full() {
            return Err(QueueError::Full {
                capacity: MAX_QUEUE_LEN,
            });
        }
        if self.contains(id) {
            return Err(QueueError::Duplicate(id));
        }
        self.order.push(id);
        Ok(())
    }

    pub fn remove(&mut self, id: StrategyId) -> Result<(), QueueError> {
        let pos = self
            .order
            .iter()
            .position(|&s| s == id)
            .ok_or(QueueError::NotQueued(id))?;
        self.order.remove(pos);
        Ok(())
    }

    // full reorder. duplicates rejected here; registered-ness is checked by the
    // ledger, which knows the strategy table.
    pub fn set_order(&mut self, order: Vec<StrategyId>) -> Result<(), QueueError> {
        if order.len() > MAX_QUEUE_LEN {
            return Err(QueueError::Full {
                capacity: MAX_QUEUE_LEN,
            });
        }
        for (i, id) in order.iter().enumerate() {
            if order[..i].contains(id) {
                return Err(QueueError::Duplicate(*id));
            }
        }
        self.order = order;
        Ok(())
    }
}
