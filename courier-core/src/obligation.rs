//! Delivery obligations and the enums that describe them.
//!
//! A [`DeliveryObligation`] is created by an external generator (the
//! conversation or letter system) and handed to the queue for insertion.
//! While queued it is owned exclusively by the [`QueueStore`](crate::queue::QueueStore).

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for an obligation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObligationId(pub Uuid);

impl ObligationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ObligationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObligationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for an NPC, as issued by the NPC directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NpcId(pub String);

impl NpcId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NpcId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NpcId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for NpcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Token Categories
// ============================================================================

/// The relationship dimension a token balance (and an obligation) is
/// denominated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TokenCategory {
    Trust,
    Commerce,
    Status,
    Shadow,
}

impl TokenCategory {
    pub fn name(&self) -> &'static str {
        match self {
            TokenCategory::Trust => "Trust",
            TokenCategory::Commerce => "Commerce",
            TokenCategory::Status => "Status",
            TokenCategory::Shadow => "Shadow",
        }
    }

    pub fn all() -> [TokenCategory; 4] {
        [
            TokenCategory::Trust,
            TokenCategory::Commerce,
            TokenCategory::Status,
            TokenCategory::Shadow,
        ]
    }
}

impl fmt::Display for TokenCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Positioning and Priority
// ============================================================================

/// Why an obligation landed where it did. Set once per insertion or forced
/// displacement; the UI translates it into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PositioningReason {
    /// An active standing obligation with the sender.
    Obligation,
    /// Commerce debt past the threshold.
    CommerceDebt,
    /// Some negative balance with the sender.
    PoorStanding,
    /// Some positive balance with the sender.
    GoodStanding,
    #[default]
    Neutral,
}

/// Emotional weight the sender attached to the obligation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EmotionalFocus {
    Low,
    #[default]
    Medium,
    High,
    /// The sender is disconnected; the obligation forces its way to the front.
    Critical,
}

/// How the generator came to create the obligation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ObligationOrigin {
    #[default]
    Standard,
    /// The player failed to negotiate terms; the sender's terms are final.
    FailedNegotiation,
    /// A proud or high-status sender who will not wait.
    ProudSender,
    /// Urgent circumstances outside either party's control.
    Urgent,
}

/// The single cause that entitles an obligation to automatic forced
/// displacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriorityCause {
    FailedNegotiation,
    ProudSender,
    Disconnected,
    Urgent,
}

impl PriorityCause {
    /// The positioning tag recorded on an obligation forced in by this cause.
    pub fn positioning_reason(&self) -> PositioningReason {
        match self {
            PriorityCause::FailedNegotiation => PositioningReason::PoorStanding,
            // Status is expressed as leverage over the player.
            PriorityCause::ProudSender => PositioningReason::CommerceDebt,
            PriorityCause::Disconnected | PriorityCause::Urgent => PositioningReason::Neutral,
        }
    }
}

// ============================================================================
// Delivery Obligation
// ============================================================================

/// A pending delivery occupying (or about to occupy) a queue slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryObligation {
    /// Stable identity.
    pub id: ObligationId,

    pub sender_id: NpcId,
    pub sender_name: String,
    pub recipient_id: NpcId,
    pub recipient_name: String,

    /// The currency this obligation is denominated in, and the currency
    /// required to manipulate it.
    pub category: TokenCategory,

    /// Counts down as time passes; at or below zero the obligation has expired.
    pub deadline: i32,

    /// Coins paid on delivery.
    pub payment: u32,

    /// 1-based slot, or 0 when not queued.
    pub queue_position: usize,

    /// Neutral slot the obligation would have taken without leverage.
    pub original_queue_position: usize,

    /// How many slots leverage moved it forward.
    pub leverage_boost: usize,

    pub positioning_reason: PositioningReason,

    /// Free-form label from the generator. Never used for branching.
    pub generation_reason: Option<String>,

    pub emotional_focus: EmotionalFocus,

    pub origin: ObligationOrigin,

    /// Order in which the obligation entered the store.
    #[serde(default)]
    pub sequence: u64,
}

impl DeliveryObligation {
    /// Create a new obligation from sender to recipient. Names default to the ids.
    pub fn new(
        sender_id: impl Into<NpcId>,
        recipient_id: impl Into<NpcId>,
        category: TokenCategory,
    ) -> Self {
        let sender_id = sender_id.into();
        let recipient_id = recipient_id.into();
        Self {
            id: ObligationId::new(),
            sender_name: sender_id.0.clone(),
            recipient_name: recipient_id.0.clone(),
            sender_id,
            recipient_id,
            category,
            deadline: 24,
            payment: 0,
            queue_position: 0,
            original_queue_position: 0,
            leverage_boost: 0,
            positioning_reason: PositioningReason::Neutral,
            generation_reason: None,
            emotional_focus: EmotionalFocus::Medium,
            origin: ObligationOrigin::Standard,
            sequence: 0,
        }
    }

    pub fn with_sender_name(mut self, name: impl Into<String>) -> Self {
        self.sender_name = name.into();
        self
    }

    pub fn with_recipient_name(mut self, name: impl Into<String>) -> Self {
        self.recipient_name = name.into();
        self
    }

    pub fn with_deadline(mut self, deadline: i32) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_payment(mut self, payment: u32) -> Self {
        self.payment = payment;
        self
    }

    pub fn with_origin(mut self, origin: ObligationOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_emotional_focus(mut self, focus: EmotionalFocus) -> Self {
        self.emotional_focus = focus;
        self
    }

    pub fn with_generation_reason(mut self, reason: impl Into<String>) -> Self {
        self.generation_reason = Some(reason.into());
        self
    }

    pub fn is_queued(&self) -> bool {
        self.queue_position > 0
    }

    pub fn is_expired(&self) -> bool {
        self.deadline <= 0
    }

    /// The cause entitling this obligation to forced displacement, if any.
    ///
    /// Origin takes precedence over emotional focus.
    pub fn priority_cause(&self) -> Option<PriorityCause> {
        match self.origin {
            ObligationOrigin::FailedNegotiation => Some(PriorityCause::FailedNegotiation),
            ObligationOrigin::ProudSender => Some(PriorityCause::ProudSender),
            ObligationOrigin::Urgent => Some(PriorityCause::Urgent),
            ObligationOrigin::Standard => {
                (self.emotional_focus == EmotionalFocus::Critical)
                    .then_some(PriorityCause::Disconnected)
            }
        }
    }

    /// Record leverage provenance relative to the neutral slot.
    pub(crate) fn record_leverage(&mut self, position: usize, neutral_position: usize) {
        if position < neutral_position {
            self.original_queue_position = neutral_position;
            self.leverage_boost = neutral_position - position;
        } else {
            self.original_queue_position = 0;
            self.leverage_boost = 0;
        }
    }
}
