//! Per-NPC delivery history.
//!
//! Counters only ever increase, and an NPC's entry is created lazily on
//! its first recorded event and never removed.

use crate::obligation::NpcId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Delivery outcomes recorded against one sender.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LetterHistory {
    pub delivered: u32,
    pub skipped: u32,
    pub expired: u32,
}

impl LetterHistory {
    pub fn record_delivery(&mut self) {
        self.delivered = self.delivered.saturating_add(1);
    }

    pub fn record_skip(&mut self) {
        self.skipped = self.skipped.saturating_add(1);
    }

    pub fn record_expiry(&mut self) {
        self.expired = self.expired.saturating_add(1);
    }

    /// Total failures (skips and expiries).
    pub fn failures(&self) -> u32 {
        self.skipped.saturating_add(self.expired)
    }
}

/// Histories for every NPC the player has dealt with.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryBook {
    entries: HashMap<NpcId, LetterHistory>,
}

impl HistoryBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, npc_id: &NpcId) -> Option<&LetterHistory> {
        self.entries.get(npc_id)
    }

    fn entry(&mut self, npc_id: &NpcId) -> &mut LetterHistory {
        self.entries.entry(npc_id.clone()).or_default()
    }

    pub fn record_delivery(&mut self, npc_id: &NpcId) {
        self.entry(npc_id).record_delivery();
    }

    pub fn record_skip(&mut self, npc_id: &NpcId) {
        self.entry(npc_id).record_skip();
    }

    pub fn record_expiry(&mut self, npc_id: &NpcId) {
        self.entry(npc_id).record_expiry();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
