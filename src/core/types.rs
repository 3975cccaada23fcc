//! Core type definitions used throughout the engine

use serde::{Deserialize, Serialize};

/// Arena handle for a cohort within its army
///
/// Cohorts live in a per-army arena; the frontline, reserve and defeated
/// collections hold these handles, so moving a cohort is an index update and
/// cloning an army copies only small mutable state records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CohortId(pub u32);

impl CohortId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Identifier for a unit kind (archers, horse archers, ...)
///
/// Kinds are data-driven; the properties behind a kind come from the external
/// attribute-value store, already flattened to plain numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitKindId(pub u32);

/// Identifier for an army-wide tactic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TacticId(pub u32);

/// Which of the two sides of a battle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SideId {
    A,
    B,
}

impl SideId {
    pub fn opponent(self) -> SideId {
        match self {
            SideId::A => SideId::B,
            SideId::B => SideId::A,
        }
    }

    pub fn index(self) -> usize {
        match self {
            SideId::A => 0,
            SideId::B => 1,
        }
    }
}

/// Deployment role of a cohort
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Front,
    Flank,
    Support,
}

/// Combat phase, selects which damage-table column applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatPhase {
    Fire,
    Shock,
}

/// Battle round counter
pub type Round = u32;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_opponent() {
        assert_eq!(SideId::A.opponent(), SideId::B);
        assert_eq!(SideId::B.opponent(), SideId::A);
        assert_eq!(SideId::A.opponent().opponent(), SideId::A);
    }

    #[test]
    fn test_cohort_id_as_index() {
        assert_eq!(CohortId(7).index(), 7);
    }

    #[test]
    fn test_ids_hash_and_compare() {
        use std::collections::HashMap;
        let mut map: HashMap<UnitKindId, &str> = HashMap::new();
        map.insert(UnitKindId(1), "archers");
        assert_eq!(map.get(&UnitKindId(1)), Some(&"archers"));
        assert_ne!(UnitKindId(1), UnitKindId(2));
    }
}
