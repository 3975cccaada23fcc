//! Pip and damage computation
//!
//! Pure functions over pre-round state. Every loss value goes through the
//! fixed-point floor exactly once before it is accumulated; that floor is
//! the numeric parity contract with in-game results and must not be
//! reordered or repeated.

use serde::{Deserialize, Serialize};

use crate::combat::cohort::{Cohort, LossLedger};
use crate::combat::formation::{Battlefield, Side};
use crate::core::config::Settings;
use crate::core::types::{CombatPhase, SideId};

/// Scale applied to the offense-defense gap before it enters the multiplier
pub const OFFENSE_DEFENSE_SCALE: f64 = 0.1;

/// Share of a morale loss carried over to the target's support rank
pub const SUPPORT_MORALE_CARRY: f64 = 0.5;

/// Floor a value at the configured fixed-point precision
///
/// `floor(x * precision) / precision`. The integer floor step must match
/// the in-game rounding bit-for-bit.
pub fn fixed_floor(x: f64, precision: f64) -> f64 {
    (x * precision).floor() / precision
}

/// Pip totals for both sides of one round
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RoundPips {
    pub a: i32,
    pub b: i32,
}

impl RoundPips {
    pub fn of(&self, side: SideId) -> i32 {
        match side {
            SideId::A => self.a,
            SideId::B => self.b,
        }
    }
}

/// Compute both sides' pips for the round
///
/// Each side's bonus is its general-skill gap over the opponent plus its
/// terrain roll modifiers. Relative-pips mode nets the two bonuses, flooring
/// the loser's at zero, before the dice are added. The total is clamped to
/// `[0, max_pips]`.
pub fn compute_pips(field: &Battlefield, a: &Side, b: &Side) -> RoundPips {
    let phase = field.phase();
    let settings = &field.settings;

    let gap_a = a.general.skill(phase) - b.general.skill(phase);
    let bonus_a = gap_a + field.terrain_pips(SideId::A);
    let bonus_b = -gap_a + field.terrain_pips(SideId::B);

    let (bonus_a, bonus_b) = if settings.relative_pips {
        ((bonus_a - bonus_b).max(0), (bonus_b - bonus_a).max(0))
    } else {
        (bonus_a, bonus_b)
    };

    RoundPips {
        a: (a.round.dice + bonus_a).clamp(0, settings.max_pips),
        b: (b.round.dice + bonus_b).clamp(0, settings.max_pips),
    }
}

/// Strength-weighted tactic effectiveness, clamped to the configured band
///
/// A zero or empty opposing force is a neutral matchup, never a division.
pub fn tactic_bonus(own: &Side, enemy: &Side, settings: &Settings) -> f64 {
    if !settings.tactics {
        return 1.0;
    }
    let own_eff = own.tactic.against(enemy.tactic.id) * own.army.live_strength();
    let enemy_eff = enemy.tactic.against(own.tactic.id) * enemy.army.live_strength();
    if enemy_eff <= 0.0 {
        return 1.0;
    }
    (own_eff / enemy_eff).clamp(settings.tactic_band.0, settings.tactic_band.1)
}

/// Extra damage against a force whose flank share outgrew its preference
///
/// Compares the target's flank-to-front strength ratio against the ratio its
/// own preferred flank size implies. Zero front strength yields no penalty.
pub fn flank_ratio_penalty(target: &Side, settings: &Settings) -> f64 {
    let (flank, front) = target.army.flank_front_strength();
    if front <= 0.0 || flank <= 0.0 {
        return 1.0;
    }
    let width = settings.combat_width;
    let preferred_cols = 2 * target.prefs.preferred_flank_size;
    if preferred_cols >= width {
        return 1.0;
    }
    let preferred_ratio = preferred_cols as f64 / (width - preferred_cols) as f64;
    if flank / front > preferred_ratio {
        1.0 + settings.flank_ratio_penalty
    } else {
        1.0
    }
}

/// Everything an attack needs besides the two cohorts
#[derive(Debug, Clone, Copy)]
pub struct AttackContext {
    pub phase: CombatPhase,
    pub round: u32,
    pub pips: i32,
    pub tactic_bonus: f64,
    /// Flank-ratio penalty of the *target* side.
    pub target_flank_penalty: f64,
    /// Attacking from the support rank.
    pub from_support: bool,
}

/// Compute one attacker's losses against one defender
///
/// Reads pre-round state only; the caller accumulates the result into the
/// defender's ledger and applies it after every attack has been computed.
pub fn compute_losses(
    attacker: &Cohort,
    defender: &Cohort,
    ctx: &AttackContext,
    settings: &Settings,
) -> LossLedger {
    let a = &attacker.props;
    let d = &defender.props;

    let mut mult = attacker.state.strength;
    if settings.offense_defense {
        mult *= (1.0 + (a.offense - d.defense) * OFFENSE_DEFENSE_SCALE).max(0.0);
    }
    if ctx.from_support {
        mult *= a.offensive_support;
    }
    mult *= ctx.target_flank_penalty;
    mult *= ctx.tactic_bonus;
    mult *= 1.0 + settings.daily_increase * ctx.round as f64;
    if settings.low_morale_penalty {
        mult *= attacker.morale_fraction();
    }
    if settings.discipline {
        mult *= a.discipline;
    }
    if settings.damage_done_taken {
        mult *= a.damage_done * d.damage_taken;
    }

    let base = (settings.base_pips + ctx.pips) as f64;

    let mut strength = base * mult * a.strength_damage.against(d.kind, ctx.phase) * a.strength_mult;
    if settings.scaled_strength_losses && defender.state.strength > 0.0 {
        strength /= defender.state.strength;
    }
    let morale = base * mult * a.morale_damage.against(d.kind, ctx.phase) * a.morale_mult;

    LossLedger {
        strength: fixed_floor(strength, settings.precision),
        morale: fixed_floor(morale, settings.precision),
    }
}

/// Flat morale loss for a cohort that found no target this round
pub fn idle_morale_loss(cohort: &Cohort, settings: &Settings) -> f64 {
    let resist = cohort.props.morale_loss_resist.clamp(0.0, 1.0);
    fixed_floor(settings.idle_morale_loss * (1.0 - resist), settings.precision)
}
