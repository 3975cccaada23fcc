//! Battle engine: formations, round resolution and win-rate projection
//!
//! The engine is deterministic: dice are supplied from outside, so the same
//! scenario and dice sequence always produce the same battle. The projector
//! exploits this by branching over every future dice pair.

pub mod cohort;
pub mod damage;
pub mod deployment;
pub mod formation;
pub mod projector;
pub mod reinforcement;
pub mod round;
pub mod targeting;

pub use cohort::{Cohort, CohortProps, DamageTable, PhaseDamage};
pub use formation::{Army, Battlefield, General, Side, Tactic, Terrain, UnitPreferences};
pub use projector::{calculate_win_rate, CancelToken, ProjectedLosses, WinRateProjector, WinRateReport};
pub use round::{Battle, BattleOutcome, RoundState};
