//! Serializable player commands.
//!
//! The surrounding game loop can script, log or replay queue interaction as
//! a stream of [`QueueCommand`]s and feed each one to
//! [`ObligationQueue::apply`].

use crate::decay::DecayReport;
use crate::displacement::{DisplacementPreview, DisplacementReceipt, InsertOutcome};
use crate::engine::{DeliveryReceipt, ObligationQueue};
use crate::error::QueueError;
use crate::manipulation::FrontMove;
use crate::obligation::{DeliveryObligation, NpcId, ObligationId, TokenCategory};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One operation on the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueCommand {
    Insert {
        obligation: DeliveryObligation,
    },
    AdvanceTime {
        units: u32,
    },
    DeliverFromFront,
    Deliver {
        obligation_id: ObligationId,
    },
    PreviewDisplacement {
        obligation_id: ObligationId,
        target: usize,
    },
    /// Preview and execute in one step.
    Displace {
        obligation_id: ObligationId,
        target: usize,
    },
    MorningSwap {
        first: usize,
        second: usize,
    },
    Purge {
        payment: BTreeMap<TokenCategory, u32>,
    },
    PriorityMove {
        position: usize,
    },
    ExtendDeadline {
        position: usize,
    },
    Skip {
        position: usize,
    },
    Transfer {
        obligation_id: ObligationId,
        new_recipient: NpcId,
    },
    Cancel {
        obligation_id: ObligationId,
    },
}

/// What a successfully applied command produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandOutcome {
    Inserted(InsertOutcome),
    TimeAdvanced(DecayReport),
    Delivered(DeliveryReceipt),
    Previewed(DisplacementPreview),
    Displaced(DisplacementReceipt),
    Swapped,
    Purged { obligation: DeliveryObligation },
    MovedToFront(FrontMove),
    DeadlineExtended { deadline: i32 },
    Transferred,
    Cancelled { obligation: DeliveryObligation },
}

impl ObligationQueue {
    /// Run one command.
    pub fn apply(&mut self, command: QueueCommand) -> Result<CommandOutcome, QueueError> {
        let outcome = match command {
            QueueCommand::Insert { obligation } => CommandOutcome::Inserted(self.insert(obligation)?),
            QueueCommand::AdvanceTime { units } => {
                CommandOutcome::TimeAdvanced(self.advance_time(units))
            }
            QueueCommand::DeliverFromFront => CommandOutcome::Delivered(self.deliver_from_front()?),
            QueueCommand::Deliver { obligation_id } => {
                CommandOutcome::Delivered(self.deliver(obligation_id)?)
            }
            QueueCommand::PreviewDisplacement {
                obligation_id,
                target,
            } => CommandOutcome::Previewed(self.preview_displacement(obligation_id, target)?),
            QueueCommand::Displace {
                obligation_id,
                target,
            } => {
                let preview = self.preview_displacement(obligation_id, target)?;
                CommandOutcome::Displaced(self.execute_displacement(&preview)?)
            }
            QueueCommand::MorningSwap { first, second } => {
                self.morning_swap(first, second)?;
                CommandOutcome::Swapped
            }
            QueueCommand::Purge { payment } => CommandOutcome::Purged {
                obligation: self.purge(&payment)?,
            },
            QueueCommand::PriorityMove { position } => {
                CommandOutcome::MovedToFront(self.priority_move(position)?)
            }
            QueueCommand::ExtendDeadline { position } => CommandOutcome::DeadlineExtended {
                deadline: self.extend_deadline(position)?,
            },
            QueueCommand::Skip { position } => CommandOutcome::MovedToFront(self.skip(position)?),
            QueueCommand::Transfer {
                obligation_id,
                new_recipient,
            } => {
                self.transfer(obligation_id, &new_recipient)?;
                CommandOutcome::Transferred
            }
            QueueCommand::Cancel { obligation_id } => CommandOutcome::Cancelled {
                obligation: self.cancel(obligation_id)?,
            },
        };
        Ok(outcome)
    }
}
