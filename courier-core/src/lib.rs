//! Obligation queue engine for a letter-carrier game.
//!
//! This crate provides:
//! - A fixed-capacity delivery queue whose entry positions come from the
//!   player's token balances with each sender
//! - Cascading, forced and player-paid displacement
//! - Deadline decay with penalties and stable compaction
//! - Token-gated queue manipulations (swap, purge, priority move, extend,
//!   skip, transfer, cancel)
//! - Structured events for the host game to render
//!
//! # Quick Start
//!
//! ```
//! use courier_core::{
//!     DeliveryObligation, InMemoryLedger, Npc, NpcRoster, ObligationQueue, QueueConfig,
//!     StandingRegistry, TokenCategory,
//! };
//!
//! let ledger = InMemoryLedger::new().with_balance("elena", TokenCategory::Trust, 3);
//! let npcs = NpcRoster::new()
//!     .with_npc(Npc::new("elena", "Elena"))
//!     .with_npc(Npc::new("marcus", "Marcus"));
//!
//! let mut queue =
//!     ObligationQueue::new(QueueConfig::default(), ledger, npcs, StandingRegistry::new())?;
//!
//! let letter = DeliveryObligation::new("elena", "marcus", TokenCategory::Trust).with_deadline(12);
//! let outcome = queue.insert(letter)?;
//! assert_eq!(outcome.position, 5);
//!
//! let report = queue.advance_time(4);
//! assert!(report.expired.is_empty());
//!
//! for event in queue.take_events() {
//!     println!("{event:?}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod clock;
pub mod command;
pub mod config;
pub mod decay;
pub mod displacement;
pub mod engine;
pub mod error;
pub mod events;
pub mod history;
pub mod ledger;
pub mod manipulation;
pub mod npc;
pub mod obligation;
pub mod position;
pub mod queue;
pub mod standing;
pub mod testing;

// Primary public API
pub use clock::{GameClock, TimeWindow};
pub use command::{CommandOutcome, QueueCommand};
pub use config::{ConfigError, QueueConfig};
pub use decay::{DecayReport, Urgency, UrgencyStats};
pub use displacement::{
    DisplacementBlocker, DisplacementCharge, DisplacementPreview, DisplacementReceipt,
    InsertOutcome,
};
pub use engine::{DeliveryReceipt, ObligationQueue};
pub use error::{QueueError, ValidationFailure};
pub use events::{EventCategory, EventOutbox, QueueEvent};
pub use history::{HistoryBook, LetterHistory};
pub use ledger::{InMemoryLedger, TokenLedger};
pub use manipulation::FrontMove;
pub use npc::{Npc, NpcDirectory, NpcRoster};
pub use obligation::{
    DeliveryObligation, EmotionalFocus, NpcId, ObligationId, ObligationOrigin, PositioningReason,
    PriorityCause, TokenCategory,
};
pub use position::{Placement, PositionCalculator};
pub use queue::{QueueStore, SlotMove};
pub use standing::{QueueAction, StandingObligation, StandingObligations, StandingRegistry};
pub use testing::TestHarness;
