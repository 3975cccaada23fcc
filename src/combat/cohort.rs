//! Cohorts: one deployable unit instance each
//!
//! A cohort pairs an immutable properties snapshot (resolved by the external
//! attribute-value store and shared behind an `Arc`) with a small mutable
//! state record. Cloning a cohort copies only the mutable record; the
//! projector relies on this when it snapshots formations at every branch.

use std::sync::Arc;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::core::types::{CohortId, CombatPhase, Role, UnitKindId};

/// Strength fraction below which a cohort is flagged weak
pub const WEAK_STRENGTH_FRACTION: f64 = 0.25;

/// Morale fraction below which a cohort is flagged weak
pub const WEAK_MORALE_FRACTION: f64 = 0.25;

/// Per-phase damage values against one defender kind
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PhaseDamage {
    pub fire: f64,
    pub shock: f64,
}

impl PhaseDamage {
    pub fn uniform(value: f64) -> Self {
        Self {
            fire: value,
            shock: value,
        }
    }

    pub fn get(&self, phase: CombatPhase) -> f64 {
        match phase {
            CombatPhase::Fire => self.fire,
            CombatPhase::Shock => self.shock,
        }
    }
}

/// Damage table keyed by defender kind, with a fallback for unlisted kinds
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DamageTable {
    pub by_kind: AHashMap<UnitKindId, PhaseDamage>,
    pub default: PhaseDamage,
}

impl DamageTable {
    pub fn flat(value: f64) -> Self {
        Self {
            by_kind: AHashMap::new(),
            default: PhaseDamage::uniform(value),
        }
    }

    pub fn against(&self, kind: UnitKindId, phase: CombatPhase) -> f64 {
        self.by_kind.get(&kind).unwrap_or(&self.default).get(phase)
    }
}

/// Immutable per-cohort properties
///
/// Supplied flat by the external attribute-value store; the engine never
/// re-derives these from layered definitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohortProps {
    pub kind: UnitKindId,
    pub kind_name: String,

    pub offense: f64,
    pub defense: f64,
    pub maneuver: f64,
    pub deploy_cost: f64,
    pub flank_capable: bool,

    /// Damage share dealt when attacking from the support rank; zero means
    /// the cohort never fires from the rear.
    pub offensive_support: f64,

    pub discipline: f64,
    pub damage_done: f64,
    pub damage_taken: f64,
    pub strength_mult: f64,
    pub morale_mult: f64,

    pub max_strength: f64,
    pub max_morale: f64,

    /// Fraction of flat idle morale loss this cohort shrugs off, 0..1.
    pub morale_loss_resist: f64,

    pub capture_chance: f64,
    pub capture_resist: f64,

    pub repair_cost: f64,
    pub maintenance_cost: f64,
    pub value: f64,

    pub strength_damage: DamageTable,
    pub morale_damage: DamageTable,
}

impl CohortProps {
    /// Neutral properties for a kind; scenario loading overrides fields
    pub fn base(kind: UnitKindId, kind_name: impl Into<String>) -> Self {
        Self {
            kind,
            kind_name: kind_name.into(),
            offense: 0.0,
            defense: 0.0,
            maneuver: 1.0,
            deploy_cost: 1.0,
            flank_capable: false,
            offensive_support: 0.0,
            discipline: 1.0,
            damage_done: 1.0,
            damage_taken: 1.0,
            strength_mult: 1.0,
            morale_mult: 1.0,
            max_strength: 1.0,
            max_morale: 3.0,
            morale_loss_resist: 0.0,
            capture_chance: 0.0,
            capture_resist: 0.0,
            repair_cost: 0.0,
            maintenance_cost: 0.0,
            value: 0.0,
            strength_damage: DamageTable::flat(0.01),
            morale_damage: DamageTable::flat(0.01),
        }
    }
}

/// Losses accumulated against a cohort during one round's attack pass
///
/// Applied to strength/morale only after every attack has been computed, so
/// mutual same-round attacks both read pre-round stats. Also doubles as the
/// per-round explanation ledger.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LossLedger {
    pub strength: f64,
    pub morale: f64,
}

impl LossLedger {
    pub fn clear(&mut self) {
        self.strength = 0.0;
        self.morale = 0.0;
    }
}

/// One cohort's target assignment for the current round
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TargetAssignment {
    /// The enemy cohort taking this cohort's direct damage.
    pub main: CohortId,
    /// Column of the main target in the enemy frontline.
    pub column: usize,
    /// The enemy directly behind the main target, if any; receives the
    /// morale carry-over.
    pub support: Option<CohortId>,
    /// Set when the target was found by the outward scan rather than
    /// directly opposite.
    pub flanking: bool,
}

/// Mutable per-round state of a cohort
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohortState {
    pub strength: f64,
    pub morale: f64,
    pub is_weak: bool,
    pub defeated: bool,
    pub destroyed: bool,
    /// Consecutive rounds spent at or below the defeat threshold.
    pub rounds_below: u32,
    /// Expected capture probability recorded at defeat time.
    pub capture_odds: f64,
    pub round_losses: LossLedger,
}

/// One deployable unit instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cohort {
    pub id: CohortId,
    pub role: Role,
    pub props: Arc<CohortProps>,
    pub state: CohortState,
    pub target: Option<TargetAssignment>,
    /// Enemy cohorts that claimed this cohort this round; used for capture
    /// odds and defeat attribution.
    pub targeted_by: Vec<CohortId>,
}

impl Cohort {
    pub fn new(id: CohortId, role: Role, props: Arc<CohortProps>) -> Self {
        let state = CohortState {
            strength: props.max_strength,
            morale: props.max_morale,
            is_weak: false,
            defeated: false,
            destroyed: false,
            rounds_below: 0,
            capture_odds: 0.0,
            round_losses: LossLedger::default(),
        };
        Self {
            id,
            role,
            props,
            state,
            target: None,
            targeted_by: Vec::new(),
        }
    }

    pub fn kind(&self) -> UnitKindId {
        self.props.kind
    }

    /// Can this cohort still fight?
    pub fn can_fight(&self) -> bool {
        !self.state.defeated && !self.state.destroyed && self.state.strength > 0.0
    }

    /// Refresh the weak flag from current strength and morale
    pub fn update_weak_flag(&mut self) {
        let low_strength = self.state.strength < self.props.max_strength * WEAK_STRENGTH_FRACTION;
        let low_morale = self.state.morale < self.props.max_morale * WEAK_MORALE_FRACTION;
        self.state.is_weak = low_strength || low_morale;
    }

    /// Morale as a fraction of maximum, guarded against zero maximums
    pub fn morale_fraction(&self) -> f64 {
        if self.props.max_morale > 0.0 {
            self.state.morale / self.props.max_morale
        } else {
            0.0
        }
    }
}
