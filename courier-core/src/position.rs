//! Leverage-based entry position.
//!
//! Strong relationships push an obligation toward the back of the queue
//! (the sender trusts you to get to it), debt pulls it toward the front, and
//! an active standing obligation always wins. The calculation is a pure
//! function of the sender's balances and whether a standing obligation is
//! active, so the same inputs always give the same position and reason.

use crate::config::QueueConfig;
use crate::obligation::{PositioningReason, TokenCategory};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where an obligation should enter, and why.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    /// 1-based target slot.
    pub position: usize,
    pub reason: PositioningReason,
    /// Largest positive balance with the sender (0 if none).
    pub highest_positive: i32,
    /// Largest debt with the sender, as a positive number (0 if none).
    pub worst_negative: i32,
}

/// Computes entry positions for a queue of fixed capacity.
#[derive(Debug, Clone, Copy)]
pub struct PositionCalculator {
    capacity: usize,
    commerce_debt_threshold: i32,
    commerce_debt_position: usize,
}

impl PositionCalculator {
    pub fn new(config: &QueueConfig) -> Self {
        Self {
            capacity: config.capacity,
            commerce_debt_threshold: config.commerce_debt_threshold,
            commerce_debt_position: config.commerce_debt_position,
        }
    }

    /// Placement for an obligation whose sender could not be resolved.
    pub fn neutral(&self) -> Placement {
        Placement {
            position: self.capacity,
            reason: PositioningReason::Neutral,
            highest_positive: 0,
            worst_negative: 0,
        }
    }

    /// Compute the target slot from the sender's balances.
    ///
    /// Precedence: standing obligation, then Commerce debt, then
    /// `capacity - highest_positive + worst_negative`, clamped to the queue.
    pub fn compute(
        &self,
        balances: &BTreeMap<TokenCategory, i32>,
        has_standing_obligation: bool,
    ) -> Placement {
        let highest_positive = highest_positive(balances);
        let worst_negative = worst_negative(balances);

        let position = if has_standing_obligation {
            1
        } else if self.in_commerce_debt(balances) {
            self.commerce_debt_position as i64
        } else {
            self.capacity as i64 - highest_positive as i64 + worst_negative as i64
        };

        Placement {
            position: position.clamp(1, self.capacity as i64) as usize,
            reason: self.reason(balances, has_standing_obligation),
            highest_positive,
            worst_negative,
        }
    }

    /// The positioning tag for these inputs, by rule precedence.
    pub fn reason(
        &self,
        balances: &BTreeMap<TokenCategory, i32>,
        has_standing_obligation: bool,
    ) -> PositioningReason {
        if has_standing_obligation {
            PositioningReason::Obligation
        } else if self.in_commerce_debt(balances) {
            PositioningReason::CommerceDebt
        } else if worst_negative(balances) > 0 {
            PositioningReason::PoorStanding
        } else if highest_positive(balances) > 0 {
            PositioningReason::GoodStanding
        } else {
            PositioningReason::Neutral
        }
    }

    fn in_commerce_debt(&self, balances: &BTreeMap<TokenCategory, i32>) -> bool {
        balances
            .get(&TokenCategory::Commerce)
            .is_some_and(|&balance| balance <= self.commerce_debt_threshold)
    }
}

/// Largest positive balance across all categories, or 0.
fn highest_positive(balances: &BTreeMap<TokenCategory, i32>) -> i32 {
    balances.values().copied().filter(|&v| v > 0).max().unwrap_or(0)
}

/// Largest absolute negative balance across all categories, or 0.
///
/// Debt in any category counts, not only the obligation's own.
fn worst_negative(balances: &BTreeMap<TokenCategory, i32>) -> i32 {
    balances
        .values()
        .copied()
        .filter(|&v| v < 0)
        .map(|v| v.saturating_neg())
        .max()
        .unwrap_or(0)
}
