//! Shared support types: errors, configuration, ids

pub mod config;
pub mod error;
pub mod types;

pub use config::Settings;
pub use error::{BattleError, Result};
pub use types::{CohortId, CombatPhase, Role, Round, SideId, TacticId, UnitKindId};
