//! battlecast: land-battle resolution and win-rate projection
//!
//! A deterministic battle engine for wide-frontline land combat: armies
//! deploy cohorts onto a two-rank frontline, fight dice-driven rounds of
//! fire and shock, and retreat or collapse into stack wipes. On top of the
//! round resolver sits an exhaustive projector that walks every future dice
//! outcome to estimate win rates and expected losses before a battle is
//! committed.
//!
//! Dice are an input, never rolled internally by the engine; callers supply
//! them per phase, which is what makes the projection exact rather than
//! sampled.

pub mod combat;
pub mod core;
pub mod scenario;

pub use combat::{Battle, BattleOutcome, CancelToken, WinRateProjector, WinRateReport};
pub use core::{BattleError, Result, Settings};
pub use scenario::load_scenario;
