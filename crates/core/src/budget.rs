//! Daily production budget.
//!
//! The count is computed against "today" on every call, so the budget resets at
//! UTC midnight without any reset job.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::item::{ItemError, ItemStore};

/// Snapshot of today's budget usage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BudgetStatus {
    pub completed_today: u32,
    pub in_flight: u32,
    pub daily_limit: u32,
}

impl BudgetStatus {
    /// Whether one more item may start production.
    pub fn has_capacity(&self) -> bool {
        self.completed_today.saturating_add(self.in_flight) < self.daily_limit
    }

    pub fn remaining(&self) -> u32 {
        self.daily_limit
            .saturating_sub(self.completed_today.saturating_add(self.in_flight))
    }
}

/// Blocks production once the daily cap is reached.
#[derive(Clone)]
pub struct BudgetLimiter {
    store: Arc<dyn ItemStore>,
}

impl BudgetLimiter {
    pub fn new(store: Arc<dyn ItemStore>) -> Self {
        Self { store }
    }

    /// Current usage, counting items already in production.
    pub fn status(&self, daily_limit: u32, in_flight: u32) -> Result<BudgetStatus, ItemError> {
        Ok(BudgetStatus {
            completed_today: self.store.count_completed_today()?,
            in_flight,
            daily_limit,
        })
    }

    /// `completed_today + in_flight < daily_limit`.
    pub fn is_under_budget(&self, daily_limit: u32, in_flight: u32) -> Result<bool, ItemError> {
        Ok(self.status(daily_limit, in_flight)?.has_capacity())
    }
}
