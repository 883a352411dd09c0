//! NPC lookup.

use crate::obligation::NpcId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The minimum the queue needs to know about an NPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Npc {
    pub id: NpcId,
    pub name: String,
}

impl Npc {
    pub fn new(id: impl Into<NpcId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Resolves NPCs by id or display name.
pub trait NpcDirectory {
    fn by_id(&self, id: &NpcId) -> Option<&Npc>;
    fn by_name(&self, name: &str) -> Option<&Npc>;
}

/// In-memory NPC directory with a case-insensitive name index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NpcRoster {
    npcs: HashMap<NpcId, Npc>,
    name_index: HashMap<String, NpcId>,
}

impl NpcRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_npc(mut self, npc: Npc) -> Self {
        self.add(npc);
        self
    }

    pub fn add(&mut self, npc: Npc) {
        self.name_index.insert(npc.name.to_lowercase(), npc.id.clone());
        self.npcs.insert(npc.id.clone(), npc);
    }

    pub fn len(&self) -> usize {
        self.npcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.npcs.is_empty()
    }
}

impl NpcDirectory for NpcRoster {
    fn by_id(&self, id: &NpcId) -> Option<&Npc> {
        self.npcs.get(id)
    }

    fn by_name(&self, name: &str) -> Option<&Npc> {
        self.name_index
            .get(&name.to_lowercase())
            .and_then(|id| self.npcs.get(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_id_and_name() {
        let roster = NpcRoster::new()
            .with_npc(Npc::new("elena", "Elena"))
            .with_npc(Npc::new("blackwood", "Lord Blackwood"));

        assert_eq!(roster.len(), 2);
        assert_eq!(
            roster.by_id(&NpcId::from("elena")).map(|n| n.name.as_str()),
            Some("Elena")
        );
        assert_eq!(
            roster.by_name("lord blackwood").map(|n| n.id.clone()),
            Some(NpcId::from("blackwood"))
        );
        assert!(roster.by_name("Marcus").is_none());
    }
}
