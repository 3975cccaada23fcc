//! Battle settings bundle
//!
//! Every tunable the engine reads lives here, with an explanation of its
//! purpose. The bundle is supplied flat by the caller (UI layer or scenario
//! file) and validated once at entry.

use serde::{Deserialize, Serialize};

use crate::core::error::{BattleError, Result};

/// Flat settings bundle for a battle and its projection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // === BATTLEFIELD GEOMETRY ===
    /// Number of files in the frontline; both armies share this width.
    pub combat_width: usize,

    // === DICE ===
    /// Lowest face of the combat die (inclusive).
    pub dice_min: i32,

    /// Highest face of the combat die (inclusive).
    pub dice_max: i32,

    /// Rounds fought under a single dice roll before re-rolling.
    ///
    /// The projector branches once per this many rounds; a run of rounds
    /// sharing one roll is called a phase.
    pub roll_frequency: u32,

    /// Round at which the damage tables switch from fire to shock.
    pub phase_transition: u32,

    // === PIPS ===
    /// Constant added to the pip total when converting pips to damage.
    pub base_pips: i32,

    /// Upper clamp on the pip total (dice + general gap + terrain).
    pub max_pips: i32,

    // === NUMERIC PARITY ===
    /// Fixed-point precision for loss values.
    ///
    /// Every computed loss is floored to this precision
    /// (`floor(x * precision) / precision`) before being applied. The floor
    /// must happen exactly once per loss for parity with in-game results.
    pub precision: f64,

    // === THRESHOLDS ===
    /// Morale at or below which a cohort counts as broken.
    pub min_morale: f64,

    /// Strength at or below which a cohort counts as destroyed in place.
    pub min_strength: f64,

    /// Rounds a cohort may sit below threshold before it actually retreats.
    ///
    /// Anti-flicker window: crossing the threshold starts a counter, and
    /// recovery above threshold resets it.
    pub retreat_delay: u32,

    /// Rounds from battle start within which a collapse becomes a stack wipe.
    pub stack_wipe_rounds: u32,

    /// Morale fraction below which a collapsing side is wiped outright.
    pub stack_wipe_threshold: f64,

    // === DAMAGE SHAPE ===
    /// Extra damage multiplier against a force whose flank-to-front strength
    /// ratio exceeds its own preferred flank share.
    pub flank_ratio_penalty: f64,

    /// Per-round damage growth; round `n` multiplies damage by
    /// `1 + daily_increase * n`.
    pub daily_increase: f64,

    /// Flat morale a cohort with no target loses each round, before its
    /// morale-loss resistance is applied.
    pub idle_morale_loss: f64,

    /// Band `[lo, hi]` the tactic bonus is clamped into.
    pub tactic_band: (f64, f64),

    // === RULE TOGGLES ===
    /// Apply tactic effectiveness to damage.
    pub tactics: bool,

    /// Multiply damage by the attacker's discipline.
    pub discipline: bool,

    /// Apply the `1 + offense - defense` term.
    pub offense_defense: bool,

    /// Apply attacker damage-done and defender damage-taken multipliers.
    pub damage_done_taken: bool,

    /// Net the two sides' bonus pips (floored at zero) instead of using each
    /// side's bonus independently.
    pub relative_pips: bool,

    /// When the attacker is wiped but the defender still has forces, swap
    /// attacker identity and restart the round counter.
    pub attacker_swap: bool,

    /// Allow support-rank cohorts to retreat (and therefore be defeated).
    pub back_row_retreat: bool,

    /// Recompute target assignments every round instead of keeping
    /// still-valid ones.
    pub dynamic_targeting: bool,

    /// Restrict the outward target scan to leftward within a cohort's own
    /// half of the line.
    pub fixed_targeting: bool,

    /// Grow flank zones to cover the line's excess over the enemy army size;
    /// when off, only the preferred flank size applies.
    pub dynamic_flanking: bool,

    /// Divide strength losses by the target's strength.
    pub scaled_strength_losses: bool,

    /// Scale damage by the attacker's morale shortfall.
    pub low_morale_penalty: bool,

    // === PROJECTOR ===
    /// Node expansions per scheduling chunk.
    pub chunk_size: usize,

    /// Maximum phases resolved along one branch; deeper branches are
    /// recorded as incomplete.
    pub max_depth: u32,

    /// Use every other dice face below the root depth to bound branching.
    pub halve_deep_rolls: bool,

    /// Aggregate casualty and economic-loss projections.
    pub track_casualties: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            combat_width: 30,

            dice_min: 0,
            dice_max: 9,
            roll_frequency: 3,
            phase_transition: 3,

            base_pips: 15,
            max_pips: 18,

            precision: 10_000.0,

            min_morale: 0.0,
            min_strength: 0.0,
            retreat_delay: 1,
            stack_wipe_rounds: 4,
            stack_wipe_threshold: 0.26,

            flank_ratio_penalty: 0.25,
            daily_increase: 0.01,
            idle_morale_loss: 0.01,
            tactic_band: (0.5, 2.0),

            tactics: true,
            discipline: true,
            offense_defense: true,
            damage_done_taken: true,
            relative_pips: false,
            attacker_swap: true,
            back_row_retreat: false,
            dynamic_targeting: true,
            fixed_targeting: false,
            dynamic_flanking: true,
            scaled_strength_losses: false,
            low_morale_penalty: false,

            chunk_size: 32,
            max_depth: 4,
            halve_deep_rolls: false,
            track_casualties: true,
        }
    }
}

impl Settings {
    /// Validate the bundle for internal consistency
    ///
    /// Malformed configuration fails fast here; nothing else in the engine
    /// re-checks these.
    pub fn validate(&self) -> Result<()> {
        if self.combat_width == 0 {
            return Err(BattleError::InvalidConfig(
                "combat_width must be positive".into(),
            ));
        }
        if self.dice_max < self.dice_min {
            return Err(BattleError::InvalidConfig(format!(
                "dice_max ({}) must be >= dice_min ({})",
                self.dice_max, self.dice_min
            )));
        }
        if self.roll_frequency == 0 {
            return Err(BattleError::InvalidConfig(
                "roll_frequency must be positive".into(),
            ));
        }
        if self.precision <= 0.0 {
            return Err(BattleError::InvalidConfig(
                "precision must be positive".into(),
            ));
        }
        if self.tactic_band.0 > self.tactic_band.1 {
            return Err(BattleError::InvalidConfig(format!(
                "tactic_band lo ({}) must be <= hi ({})",
                self.tactic_band.0, self.tactic_band.1
            )));
        }
        if self.chunk_size == 0 {
            return Err(BattleError::InvalidConfig(
                "chunk_size must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.stack_wipe_threshold) {
            return Err(BattleError::InvalidConfig(format!(
                "stack_wipe_threshold ({}) must be within [0, 1]",
                self.stack_wipe_threshold
            )));
        }
        Ok(())
    }

    /// Number of distinct dice faces
    pub fn dice_faces(&self) -> usize {
        (self.dice_max - self.dice_min + 1) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn test_zero_width_rejected() {
        let settings = Settings {
            combat_width: 0,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_inverted_dice_range_rejected() {
        let settings = Settings {
            dice_min: 6,
            dice_max: 1,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_dice_faces() {
        let settings = Settings {
            dice_min: 0,
            dice_max: 9,
            ..Settings::default()
        };
        assert_eq!(settings.dice_faces(), 10);
    }
}
