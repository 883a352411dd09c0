//! Errors returned by queue operations.
//!
//! Every variant is recoverable and is returned before any state changes.
//! Overflow is not an error; it is reported through events.

use crate::clock::TimeWindow;
use crate::obligation::{NpcId, ObligationId, TokenCategory};
use crate::standing::QueueAction;
use thiserror::Error;

/// A command was rejected on its arguments or on game state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    #[error("position {position} is outside 1..={capacity}")]
    PositionOutOfRange { position: usize, capacity: usize },

    #[error("positions {first} and {second} are not adjacent")]
    NotAdjacent { first: usize, second: usize },

    #[error("free swaps are only allowed at {required}, it is {current}")]
    WrongTimeWindow {
        required: TimeWindow,
        current: TimeWindow,
    },

    #[error("the free swap was already used on day {day}")]
    SwapAlreadyUsedToday { day: u32 },

    #[error("both positions {first} and {second} are empty")]
    BothSlotsEmpty { first: usize, second: usize },

    #[error("no obligation at position {position}")]
    EmptySlot { position: usize },

    #[error("position 1 is already occupied")]
    FrontOccupied,

    #[error("obligation is already at position 1")]
    AlreadyAtFront,

    #[error("cannot move from position {from} back to {to}")]
    CannotMoveBackward { from: usize, to: usize },

    #[error("obligation {0} is already queued")]
    DuplicateObligation(ObligationId),

    #[error("obligation {id} has already expired (deadline {deadline})")]
    AlreadyExpired { id: ObligationId, deadline: i32 },

    #[error("payment must total exactly {required} tokens, got {offered}")]
    WrongPaymentTotal { required: u32, offered: u32 },

    #[error("unknown NPC {0}")]
    UnknownNpc(NpcId),

    #[error("obligation is already addressed to {0}")]
    SameRecipient(NpcId),

    #[error("need {required} total tokens with {npc_id} to cancel, have {available}")]
    RelationshipTooWeak {
        npc_id: NpcId,
        required: i32,
        available: i32,
    },
}

/// Errors from queue operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("Invalid command: {0}")]
    Validation(#[from] ValidationFailure),

    #[error("Insufficient {category} tokens with {npc_id}: need {required}, have {available}")]
    InsufficientTokens {
        npc_id: NpcId,
        category: TokenCategory,
        required: u32,
        available: i32,
    },

    #[error("Cannot {action}: {reason}")]
    Vetoed { action: QueueAction, reason: String },

    #[error("Obligation {0} is not in the queue")]
    NotFound(ObligationId),

    #[error("Displacement preview no longer matches the queue")]
    StalePreview,
}

impl QueueError {
    /// Whether the failure was a token shortfall.
    pub fn is_insufficient_tokens(&self) -> bool {
        matches!(self, QueueError::InsufficientTokens { .. })
    }
}
