//! Formation data model: frontline grid, reserve queues, defeated list
//!
//! An `Army` owns an arena of cohorts; the frontline, reserve and defeated
//! collections hold arena handles. Every live cohort id appears in exactly
//! one of the three at any instant.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::combat::cohort::{Cohort, CohortProps};
use crate::core::config::Settings;
use crate::core::types::{CohortId, CombatPhase, Role, Round, SideId, TacticId, UnitKindId};

/// Number of ranks in the frontline: row 0 engages, row 1 supports
pub const RANKS: usize = 2;

/// Positional grid of engaged cohorts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frontline {
    width: usize,
    rows: Vec<Vec<Option<CohortId>>>,
}

impl Frontline {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            rows: vec![vec![None; width]; RANKS],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn get(&self, row: usize, col: usize) -> Option<CohortId> {
        self.rows.get(row).and_then(|r| r.get(col)).copied().flatten()
    }

    pub fn set(&mut self, row: usize, col: usize, id: CohortId) {
        debug_assert!(self.rows[row][col].is_none(), "slot already occupied");
        self.rows[row][col] = Some(id);
    }

    pub fn take(&mut self, row: usize, col: usize) -> Option<CohortId> {
        self.rows[row][col].take()
    }

    pub fn is_free(&self, row: usize, col: usize) -> bool {
        self.rows[row][col].is_none()
    }

    /// Position of a cohort, if deployed
    pub fn position_of(&self, id: CohortId) -> Option<(usize, usize)> {
        for (row, slots) in self.rows.iter().enumerate() {
            for (col, slot) in slots.iter().enumerate() {
                if *slot == Some(id) {
                    return Some((row, col));
                }
            }
        }
        None
    }

    /// All deployed cohort ids with their positions
    pub fn occupied(&self) -> Vec<(usize, usize, CohortId)> {
        let mut out = Vec::new();
        for (row, slots) in self.rows.iter().enumerate() {
            for (col, slot) in slots.iter().enumerate() {
                if let Some(id) = slot {
                    out.push((row, col, *id));
                }
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|r| r.iter().all(|s| s.is_none()))
    }

    pub fn count(&self) -> usize {
        self.rows
            .iter()
            .map(|r| r.iter().filter(|s| s.is_some()).count())
            .sum()
    }

    /// Shrink or grow to a new width; overflow ids are returned for the army
    /// to truncate into defeated. The row length invariant always holds.
    pub fn resize(&mut self, new_width: usize) -> Vec<CohortId> {
        let mut overflow = Vec::new();
        for row in &mut self.rows {
            if new_width < row.len() {
                for slot in row.drain(new_width..) {
                    if let Some(id) = slot {
                        overflow.push(id);
                    }
                }
            } else {
                row.resize(new_width, None);
            }
        }
        self.width = new_width;
        overflow
    }
}

/// Three ordered queues supplying cohorts to the frontline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Reserve {
    pub front: Vec<CohortId>,
    pub flank: Vec<CohortId>,
    pub support: Vec<CohortId>,
}

impl Reserve {
    pub fn total(&self) -> usize {
        self.front.len() + self.flank.len() + self.support.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn push(&mut self, role: Role, id: CohortId) {
        match role {
            Role::Front => self.front.push(id),
            Role::Flank => self.flank.push(id),
            Role::Support => self.support.push(id),
        }
    }

    pub fn remove(&mut self, id: CohortId) {
        self.front.retain(|&c| c != id);
        self.flank.retain(|&c| c != id);
        self.support.retain(|&c| c != id);
    }
}

/// One side's formation: cohort arena plus the three placement collections
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Army {
    pub cohorts: Vec<Cohort>,
    pub frontline: Frontline,
    pub reserve: Reserve,
    pub defeated: Vec<CohortId>,
}

impl Army {
    pub fn new(width: usize) -> Self {
        Self {
            cohorts: Vec::new(),
            frontline: Frontline::new(width),
            reserve: Reserve::default(),
            defeated: Vec::new(),
        }
    }

    /// Create a cohort in reserve; this is the only way cohorts enter play
    pub fn recruit(&mut self, role: Role, props: std::sync::Arc<CohortProps>) -> CohortId {
        let id = CohortId(self.cohorts.len() as u32);
        self.cohorts.push(Cohort::new(id, role, props));
        self.reserve.push(role, id);
        id
    }

    pub fn cohort(&self, id: CohortId) -> &Cohort {
        &self.cohorts[id.index()]
    }

    pub fn cohort_mut(&mut self, id: CohortId) -> &mut Cohort {
        &mut self.cohorts[id.index()]
    }

    /// Total strength of non-defeated cohorts
    pub fn live_strength(&self) -> f64 {
        self.cohorts
            .iter()
            .filter(|c| !c.state.defeated)
            .map(|c| c.state.strength)
            .sum()
    }

    /// Strength currently standing in the frontline
    pub fn fielded_strength(&self) -> f64 {
        self.frontline
            .occupied()
            .iter()
            .map(|&(_, _, id)| self.cohort(id).state.strength)
            .sum()
    }

    /// Strength in the frontline split by role: (flank-role, other)
    pub fn flank_front_strength(&self) -> (f64, f64) {
        let mut flank = 0.0;
        let mut front = 0.0;
        for (_, _, id) in self.frontline.occupied() {
            let cohort = self.cohort(id);
            match cohort.role {
                Role::Flank => flank += cohort.state.strength,
                _ => front += cohort.state.strength,
            }
        }
        (flank, front)
    }

    /// Cohorts anywhere that could still fight
    pub fn has_forces(&self) -> bool {
        self.cohorts.iter().any(|c| c.can_fight())
    }

    /// Can this side put anything on the field?
    pub fn can_field(&self) -> bool {
        !self.frontline.is_empty() || !self.reserve.is_empty()
    }

    /// Average morale fraction over non-defeated cohorts; defeated-only
    /// armies report the fraction of their defeated cohorts instead, so the
    /// wipe threshold still sees the state they collapsed in.
    pub fn morale_fraction(&self) -> f64 {
        let live: Vec<&Cohort> = self.cohorts.iter().filter(|c| !c.state.destroyed).collect();
        if live.is_empty() {
            return 0.0;
        }
        live.iter().map(|c| c.morale_fraction()).sum::<f64>() / live.len() as f64
    }

    /// Move a frontline or reserve cohort into the defeated list
    pub fn move_to_defeated(&mut self, id: CohortId) {
        if let Some((row, col)) = self.frontline.position_of(id) {
            self.frontline.take(row, col);
        }
        self.reserve.remove(id);
        let cohort = self.cohort_mut(id);
        cohort.state.defeated = true;
        cohort.target = None;
        self.defeated.push(id);
        self.debug_validate();
    }

    /// Change combat width, truncating overflow cohorts into defeated
    pub fn resize_width(&mut self, new_width: usize) {
        let overflow = self.frontline.resize(new_width);
        for id in overflow {
            let cohort = self.cohort_mut(id);
            cohort.state.defeated = true;
            cohort.target = None;
            self.defeated.push(id);
        }
        self.debug_validate();
    }

    /// Single-ownership check: every cohort id in exactly one collection
    ///
    /// Programmer-error detection only; compiled out of release builds.
    pub fn debug_validate(&self) {
        #[cfg(debug_assertions)]
        {
            for cohort in &self.cohorts {
                let id = cohort.id;
                let deployed = self.frontline.position_of(id).is_some() as usize;
                let reserved = (self.reserve.front.contains(&id)
                    || self.reserve.flank.contains(&id)
                    || self.reserve.support.contains(&id)) as usize;
                let defeated = self.defeated.contains(&id) as usize;
                debug_assert_eq!(
                    deployed + reserved + defeated,
                    1,
                    "cohort {:?} owned by {} collections",
                    id,
                    deployed + reserved + defeated
                );
            }
        }
    }
}

/// Per-side unit-type preferences driving deployment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnitPreferences {
    /// Favoured main-line kind; sorted to the centre.
    pub primary: Option<UnitKindId>,
    /// Deprioritised main-line kind; sorted outward.
    pub secondary: Option<UnitKindId>,
    /// Kind forced into the flank group regardless of its intrinsic flag.
    pub flank: Option<UnitKindId>,
    /// Preferred flank width per side of the line.
    pub preferred_flank_size: usize,
}

/// General skill attributes; the pip bonus comes from the gap between the
/// two generals in the active phase
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct General {
    pub fire: i32,
    pub shock: i32,
}

impl General {
    pub fn skill(&self, phase: CombatPhase) -> i32 {
        match phase {
            CombatPhase::Fire => self.fire,
            CombatPhase::Shock => self.shock,
        }
    }
}

/// Army-wide tactic with counter relationships against other tactics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tactic {
    pub id: TacticId,
    pub name: String,
    pub strength: f64,
    pub counters: AHashMap<TacticId, f64>,
}

impl Tactic {
    pub fn neutral(id: TacticId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            strength: 1.0,
            counters: AHashMap::new(),
        }
    }

    /// Effectiveness against an opposing tactic
    pub fn against(&self, other: TacticId) -> f64 {
        self.strength * self.counters.get(&other).copied().unwrap_or(1.0)
    }
}

/// Round-scoped results for one side
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RoundResult {
    pub dice: i32,
    pub bonus_pips: i32,
    pub tactic_bonus: f64,
    pub defeated: bool,
}

/// One belligerent: formation plus tactic, general and preferences
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Side {
    pub name: String,
    pub army: Army,
    pub tactic: Tactic,
    pub general: General,
    pub prefs: UnitPreferences,
    pub round: RoundResult,
}

impl Side {
    pub fn new(name: impl Into<String>, width: usize) -> Self {
        Self {
            name: name.into(),
            army: Army::new(width),
            tactic: Tactic::neutral(TacticId(0), "none"),
            general: General::default(),
            prefs: UnitPreferences::default(),
            round: RoundResult::default(),
        }
    }
}

/// Active terrain feature; modifies the attacker's roll
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Terrain {
    pub name: String,
    pub attacker_roll_modifier: i32,
}

/// Shared per-battle context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Battlefield {
    pub round: Round,
    pub attacker: SideId,
    pub terrain: Vec<Terrain>,
    pub settings: Settings,
}

impl Battlefield {
    pub fn new(settings: Settings) -> Self {
        Self {
            round: 0,
            attacker: SideId::A,
            terrain: Vec::new(),
            settings,
        }
    }

    /// Damage-table phase for the current round
    pub fn phase(&self) -> CombatPhase {
        if self.round < self.settings.phase_transition {
            CombatPhase::Fire
        } else {
            CombatPhase::Shock
        }
    }

    /// Sum of terrain roll modifiers, applied to the attacker only
    pub fn terrain_pips(&self, side: SideId) -> i32 {
        if side == self.attacker {
            self.terrain.iter().map(|t| t.attacker_roll_modifier).sum()
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn army_with(n: usize, role: Role) -> Army {
        let mut army = Army::new(10);
        let props = Arc::new(CohortProps::base(UnitKindId(0), "test"));
        for _ in 0..n {
            army.recruit(role, props.clone());
        }
        army
    }

    #[test]
    fn test_recruit_lands_in_reserve() {
        let army = army_with(3, Role::Front);
        assert_eq!(army.reserve.front.len(), 3);
        assert!(army.frontline.is_empty());
        army.debug_validate();
    }

    #[test]
    fn test_move_to_defeated_is_single_owner() {
        let mut army = army_with(2, Role::Front);
        let id = army.reserve.front[0];
        army.move_to_defeated(id);
        assert!(army.cohort(id).state.defeated);
        assert_eq!(army.reserve.front.len(), 1);
        assert_eq!(army.defeated, vec![id]);
    }

    #[test]
    fn test_resize_truncates_into_defeated() {
        let mut army = army_with(2, Role::Front);
        let a = army.reserve.front[0];
        let b = army.reserve.front[1];
        army.reserve.remove(a);
        army.reserve.remove(b);
        army.frontline.set(0, 2, a);
        army.frontline.set(0, 8, b);

        army.resize_width(5);

        assert_eq!(army.frontline.width(), 5);
        assert_eq!(army.frontline.get(0, 2), Some(a));
        assert!(army.cohort(b).state.defeated);
        assert_eq!(army.defeated, vec![b]);
    }

    #[test]
    fn test_flank_front_strength_split() {
        let mut army = Army::new(6);
        let props = Arc::new(CohortProps::base(UnitKindId(0), "test"));
        let f = army.recruit(Role::Front, props.clone());
        let k = army.recruit(Role::Flank, props.clone());
        army.reserve.remove(f);
        army.reserve.remove(k);
        army.frontline.set(0, 2, f);
        army.frontline.set(0, 0, k);

        let (flank, front) = army.flank_front_strength();
        assert_eq!(flank, 1.0);
        assert_eq!(front, 1.0);
    }

    #[test]
    fn test_phase_transition() {
        let mut field = Battlefield::new(Settings::default());
        field.round = 0;
        assert_eq!(field.phase(), CombatPhase::Fire);
        field.round = field.settings.phase_transition;
        assert_eq!(field.phase(), CombatPhase::Shock);
    }

    #[test]
    fn test_terrain_pips_attacker_only() {
        let mut field = Battlefield::new(Settings::default());
        field.terrain.push(Terrain {
            name: "river crossing".into(),
            attacker_roll_modifier: -2,
        });
        assert_eq!(field.terrain_pips(SideId::A), -2);
        assert_eq!(field.terrain_pips(SideId::B), 0);
    }

    #[test]
    fn test_tactic_counters() {
        let mut tactic = Tactic::neutral(TacticId(1), "envelopment");
        tactic.strength = 1.5;
        tactic.counters.insert(TacticId(2), 2.0);
        assert_eq!(tactic.against(TacticId(2)), 3.0);
        assert_eq!(tactic.against(TacticId(3)), 1.5);
    }
}
