//! Insertion and displacement.
//!
//! Three ways an obligation can push others around:
//!
//! - **Leverage insertion**: the obligation enters at the slot computed from
//!   the sender's balances and cascades everyone behind it down. Whoever
//!   falls off the end is dropped with the same penalty as a missed deadline.
//! - **Forced displacement**: an obligation with a [`PriorityCause`] claims
//!   the forced slot. Every occupant from there back moves down one and
//!   loses tokens; the last one falls off with an extra penalty.
//! - **Paid displacement**: the player moves an obligation forward and pays
//!   each jumped-over sender. Previewing is free; executing re-checks the
//!   preview against the live queue.

use crate::engine::ObligationQueue;
use crate::error::{QueueError, ValidationFailure};
use crate::events::QueueEvent;
use crate::obligation::{
    DeliveryObligation, NpcId, ObligationId, PositioningReason, PriorityCause, TokenCategory,
};
use crate::queue::SlotMove;
use crate::standing::QueueAction;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};

/// Result of inserting an obligation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertOutcome {
    pub obligation_id: ObligationId,
    /// Final 1-based slot.
    pub position: usize,
    pub reason: PositioningReason,
    /// Set when the obligation forced its way in.
    pub forced_by: Option<PriorityCause>,
    /// Occupants that moved to make room.
    pub moves: Vec<SlotMove>,
    /// Occupants pushed out of the queue, already penalised.
    pub overflowed: Vec<DeliveryObligation>,
}

// ============================================================================
// Paid displacement types
// ============================================================================

/// What one jumped-over obligation costs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplacementCharge {
    pub obligation_id: ObligationId,
    /// The sender who is paid.
    pub npc_id: NpcId,
    pub category: TokenCategory,
    pub from: usize,
    pub to: usize,
    pub tokens: u32,
}

/// Why a previewed displacement cannot go ahead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisplacementBlocker {
    /// The target is not in front of the obligation.
    NotForward { from: usize, to: usize },
    InsufficientTokens {
        npc_id: NpcId,
        category: TokenCategory,
        required: u32,
        available: i32,
    },
    Vetoed { reason: String },
}

/// Cost of moving an obligation forward, computed without touching state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplacementPreview {
    pub obligation_id: ObligationId,
    pub from: usize,
    pub to: usize,
    pub feasible: bool,
    pub total_tokens: u32,
    /// One entry per jumped-over obligation, front first.
    pub charges: Vec<DisplacementCharge>,
    pub blockers: Vec<DisplacementBlocker>,
}

impl DisplacementPreview {
    /// Tokens owed per (sender, category).
    pub fn per_npc(&self) -> BTreeMap<(NpcId, TokenCategory), u32> {
        let mut totals = BTreeMap::new();
        for charge in &self.charges {
            *totals
                .entry((charge.npc_id.clone(), charge.category))
                .or_insert(0u32) += charge.tokens;
        }
        totals
    }
}

/// Result of an executed displacement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplacementReceipt {
    pub obligation_id: ObligationId,
    pub from: usize,
    pub to: usize,
    pub total_tokens: u32,
    pub npcs_charged: usize,
    pub moves: Vec<SlotMove>,
}

impl ObligationQueue {
    // ========================================================================
    // Insertion
    // ========================================================================

    /// Insert a new obligation.
    ///
    /// Deadline bonuses from standing obligations are applied first; an
    /// obligation still at or past its deadline is rejected. An obligation
    /// with a priority cause is forced in; anything else takes its
    /// leverage position. A full queue never rejects: the tail overflows.
    #[instrument(skip(self, obligation), fields(obligation_id = %obligation.id, sender = %obligation.sender_id))]
    pub fn insert(&mut self, mut obligation: DeliveryObligation) -> Result<InsertOutcome, QueueError> {
        if self.store.contains(&obligation.id) {
            return Err(ValidationFailure::DuplicateObligation(obligation.id).into());
        }

        let bonus = self.standing.apply_deadline_bonus(&mut obligation);
        if obligation.is_expired() {
            return Err(ValidationFailure::AlreadyExpired {
                id: obligation.id,
                deadline: obligation.deadline,
            }
            .into());
        }
        if bonus != 0 {
            debug!(bonus, deadline = obligation.deadline, "Standing obligation deadline bonus");
            self.emit(QueueEvent::DeadlineBonusApplied {
                obligation_id: obligation.id,
                bonus,
            });
        }

        self.store.stamp(&mut obligation);

        let outcome = match obligation.priority_cause() {
            Some(cause) => self.force_in(obligation, cause),
            None => self.insert_by_leverage(obligation),
        };
        Ok(outcome)
    }

    fn insert_by_leverage(&mut self, mut obligation: DeliveryObligation) -> InsertOutcome {
        let placement = self.placement_for(&obligation);
        let target = placement.position;

        obligation.positioning_reason = placement.reason;
        obligation.record_leverage(target, self.config.neutral_position());

        let obligation_id = obligation.id;
        let sender_id = obligation.sender_id.clone();
        let leverage_boost = obligation.leverage_boost;
        let shift = self.store.insert_at(obligation, target);

        info!(
            %obligation_id,
            position = target,
            reason = ?placement.reason,
            leverage_boost,
            "Obligation inserted"
        );
        self.emit(QueueEvent::Inserted {
            obligation_id,
            sender_id,
            position: target,
            reason: placement.reason,
            leverage_boost,
        });
        self.emit_moves(&shift.moves);

        let penalty = self.config.overflow_penalty;
        for dropped in &shift.overflowed {
            warn!(obligation_id = %dropped.id, sender = %dropped.sender_id, penalty, "Obligation pushed out of the queue");
            self.penalise_sender(dropped, penalty);
            self.emit(QueueEvent::Overflowed {
                obligation_id: dropped.id,
                sender_id: dropped.sender_id.clone(),
                category: dropped.category,
                penalty,
                forced: false,
            });
        }

        InsertOutcome {
            obligation_id,
            position: target,
            reason: placement.reason,
            forced_by: None,
            moves: shift.moves,
            overflowed: shift.overflowed,
        }
    }

    /// Automatic forced displacement into `config.forced_position`.
    ///
    /// Occupants only move when the forced slot is taken. Each displaced
    /// sender loses up to `forced_burn_cap` tokens (never more than they hold)
    /// and the one pushed off the end also takes `forced_overflow_penalty`.
    fn force_in(&mut self, mut obligation: DeliveryObligation, cause: PriorityCause) -> InsertOutcome {
        let target = self.config.forced_position;
        let shift = if self.store.obligation_at(target).is_some() {
            self.store.shift_down_from(target)
        } else {
            Default::default()
        };

        let reason = cause.positioning_reason();
        obligation.positioning_reason = reason;
        let obligation_id = obligation.id;
        let sender_id = obligation.sender_id.clone();
        self.store.place(target, obligation);

        let displaced = shift.moves.len() + shift.overflowed.len();
        info!(%obligation_id, position = target, ?cause, displaced, "Obligation forced in");
        self.emit(QueueEvent::ForcedIn {
            obligation_id,
            sender_id,
            position: target,
            cause,
            displaced,
        });
        self.emit_moves(&shift.moves);

        for moved in &shift.moves {
            self.burn_for_displacement(&moved.sender_id, moved.category, moved.distance());
        }

        let penalty = self.config.forced_overflow_penalty;
        for dropped in &shift.overflowed {
            self.burn_for_displacement(&dropped.sender_id, dropped.category, 1);
            warn!(obligation_id = %dropped.id, sender = %dropped.sender_id, penalty, "Obligation forced out of the queue");
            self.penalise_sender(dropped, penalty);
            self.emit(QueueEvent::Overflowed {
                obligation_id: dropped.id,
                sender_id: dropped.sender_id.clone(),
                category: dropped.category,
                penalty,
                forced: true,
            });
        }

        InsertOutcome {
            obligation_id,
            position: target,
            reason,
            forced_by: Some(cause),
            moves: shift.moves,
            overflowed: shift.overflowed,
        }
    }

    /// Burn `min(cap, shifted)` tokens, or whatever positive balance is
    /// left if that is less. Each burned token leaves a burden marker.
    fn burn_for_displacement(&mut self, npc_id: &NpcId, category: TokenCategory, shifted: usize) -> u32 {
        let due = self
            .config
            .forced_burn_cap
            .min(u32::try_from(shifted).unwrap_or(u32::MAX));
        let available = self.ledger.balance(npc_id, category);
        let burned = if i64::from(available) >= i64::from(due) {
            due
        } else {
            u32::try_from(available).unwrap_or(0)
        };
        if burned == 0 {
            return 0;
        }

        self.ledger.remove(category, burned, npc_id);
        debug!(npc = %npc_id, %category, burned, "Tokens burned by forced displacement");
        self.emit(QueueEvent::TokensBurned {
            npc_id: npc_id.clone(),
            category,
            amount: burned,
        });
        for _ in 0..burned {
            self.emit(QueueEvent::BurdenAdded {
                npc_id: npc_id.clone(),
                category,
            });
        }
        burned
    }

    // ========================================================================
    // Paid displacement
    // ========================================================================

    /// Price a forward move of `obligation_id` to `target` without changing
    /// anything.
    ///
    /// Every obligation currently in `target..from` is jumped over and its
    /// sender is owed `from - target` tokens in that obligation's category.
    /// An unknown obligation or an out-of-range target is an error; a
    /// backward move, a veto or a shortfall yields an infeasible preview.
    pub fn preview_displacement(
        &self,
        obligation_id: ObligationId,
        target: usize,
    ) -> Result<DisplacementPreview, QueueError> {
        self.store.check_position(target)?;
        let from = self
            .store
            .position_of(&obligation_id)
            .ok_or(QueueError::NotFound(obligation_id))?;

        let mut preview = DisplacementPreview {
            obligation_id,
            from,
            to: target,
            feasible: false,
            total_tokens: 0,
            charges: Vec::new(),
            blockers: Vec::new(),
        };

        if from <= target {
            preview.blockers.push(DisplacementBlocker::NotForward { from, to: target });
            return Ok(preview);
        }

        if let Some(moving) = self.store.obligation_at(from) {
            if let Some(reason) = self.standing.is_action_forbidden(QueueAction::Displace, moving) {
                preview.blockers.push(DisplacementBlocker::Vetoed { reason });
            }
        }

        let jumped = u32::try_from(from - target).unwrap_or(u32::MAX);
        for position in target..from {
            if let Some(occupant) = self.store.obligation_at(position) {
                preview.charges.push(DisplacementCharge {
                    obligation_id: occupant.id,
                    npc_id: occupant.sender_id.clone(),
                    category: occupant.category,
                    from: position,
                    to: position + 1,
                    tokens: jumped,
                });
                preview.total_tokens = preview.total_tokens.saturating_add(jumped);
            }
        }

        for ((npc_id, category), required) in preview.per_npc() {
            let available = self.ledger.balance(&npc_id, category);
            if i64::from(available) < i64::from(required) {
                preview.blockers.push(DisplacementBlocker::InsufficientTokens {
                    npc_id,
                    category,
                    required,
                    available,
                });
            }
        }

        preview.feasible = preview.blockers.is_empty();
        Ok(preview)
    }

    /// Carry out a previewed displacement.
    ///
    /// The preview is recomputed against the live queue and must match
    /// exactly; otherwise [`QueueError::StalePreview`] is returned and nothing
    /// changes.
    #[instrument(skip(self, preview), fields(obligation_id = %preview.obligation_id, from = preview.from, to = preview.to))]
    pub fn execute_displacement(
        &mut self,
        preview: &DisplacementPreview,
    ) -> Result<DisplacementReceipt, QueueError> {
        let current = self.preview_displacement(preview.obligation_id, preview.to)?;
        if current != *preview {
            return Err(QueueError::StalePreview);
        }
        if let Some(blocker) = current.blockers.into_iter().next() {
            return Err(match blocker {
                DisplacementBlocker::NotForward { from, to } => {
                    ValidationFailure::CannotMoveBackward { from, to }.into()
                }
                DisplacementBlocker::InsufficientTokens {
                    npc_id,
                    category,
                    required,
                    available,
                } => QueueError::InsufficientTokens {
                    npc_id,
                    category,
                    required,
                    available,
                },
                DisplacementBlocker::Vetoed { reason } => QueueError::Vetoed {
                    action: QueueAction::Displace,
                    reason,
                },
            });
        }

        let per_npc = preview.per_npc();
        let charges: Vec<(NpcId, TokenCategory, u32)> = per_npc
            .iter()
            .map(|((npc_id, category), tokens)| (npc_id.clone(), *category, *tokens))
            .collect();
        self.spend_all(&charges)?;

        let moves = self.store.move_forward(preview.from, preview.to);

        info!(
            total_tokens = preview.total_tokens,
            npcs_charged = per_npc.len(),
            "Displacement executed"
        );
        self.emit(QueueEvent::DisplacementExecuted {
            obligation_id: preview.obligation_id,
            from: preview.from,
            to: preview.to,
            total_tokens: preview.total_tokens,
            npcs_charged: per_npc.len(),
        });
        self.emit_moves(&moves);

        Ok(DisplacementReceipt {
            obligation_id: preview.obligation_id,
            from: preview.from,
            to: preview.to,
            total_tokens: preview.total_tokens,
            npcs_charged: per_npc.len(),
            moves,
        })
    }
}
