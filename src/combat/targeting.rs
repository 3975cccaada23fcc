//! Per-round target assignment
//!
//! Every engaged-rank cohort, plus every support-rank cohort with offensive
//! support, gets at most one main target (and the enemy directly behind it
//! as a morale carry-over target). Every fightable defender offers its
//! column's primary claim; a weak defender additionally offers the
//! secondary claim, so a weakened defender may absorb two attackers.

use crate::combat::cohort::TargetAssignment;
use crate::combat::formation::{Army, Battlefield};
use crate::core::types::CohortId;

/// Claim bookkeeping for one pass over a target frontline
#[derive(Debug)]
struct Claims {
    primary: Vec<bool>,
    secondary: Vec<bool>,
}

impl Claims {
    fn new(width: usize) -> Self {
        Self {
            primary: vec![false; width],
            secondary: vec![false; width],
        }
    }
}

/// Assign targets for every eligible cohort of `source` against `target`
///
/// Deterministic and idempotent: repeated calls without intervening mutation
/// produce identical assignments.
pub fn pick_targets(field: &Battlefield, source: &mut Army, target: &mut Army) {
    let width = field.settings.combat_width;
    let mut claims = Claims::new(width);

    // This army is the target of exactly one pass per round.
    for cohort in &mut target.cohorts {
        cohort.targeted_by.clear();
    }

    // Engaged rank first, then support-rank cohorts able to fire overhead.
    let mut attackers: Vec<(usize, CohortId)> = Vec::new();
    for col in 0..width {
        if let Some(id) = source.frontline.get(0, col) {
            attackers.push((col, id));
        }
    }
    for col in 0..width {
        if let Some(id) = source.frontline.get(1, col) {
            if source.cohort(id).props.offensive_support > 0.0 {
                attackers.push((col, id));
            }
        }
    }

    for (col, id) in attackers {
        let kept = try_keep_existing(field, source, target, &mut claims, id);
        if kept {
            continue;
        }

        let assignment = find_target(field, source, target, &mut claims, col, id);
        source.cohort_mut(id).target = assignment;
        if let Some(a) = assignment {
            target.cohort_mut(a.main).targeted_by.push(id);
        }
    }
}

/// Without dynamic targeting, a still-valid assignment is kept as-is
fn try_keep_existing(
    field: &Battlefield,
    source: &mut Army,
    target: &mut Army,
    claims: &mut Claims,
    id: CohortId,
) -> bool {
    if field.settings.dynamic_targeting {
        return false;
    }
    let Some(mut assignment) = source.cohort(id).target else {
        return false;
    };

    let still_there = target.frontline.get(0, assignment.column) == Some(assignment.main)
        && target.cohort(assignment.main).can_fight();
    if !still_there {
        source.cohort_mut(id).target = None;
        return false;
    }

    // Re-claim the column and refresh the carry-over target behind it.
    let col = assignment.column;
    if !claims.primary[col] {
        claims.primary[col] = true;
    } else if target.cohort(assignment.main).state.is_weak && !claims.secondary[col] {
        claims.secondary[col] = true;
    } else {
        source.cohort_mut(id).target = None;
        return false;
    }
    assignment.support = support_behind(target, assignment.column);
    source.cohort_mut(id).target = Some(assignment);
    target.cohort_mut(assignment.main).targeted_by.push(id);
    true
}

fn support_behind(target: &Army, col: usize) -> Option<CohortId> {
    target
        .frontline
        .get(1, col)
        .filter(|&id| target.cohort(id).can_fight())
}

/// Claim a column for an attacker, if it has an open claim
///
/// Any fightable defender serves its column's primary claim; only a weak
/// defender serves the secondary one on top of it.
fn try_claim(
    target: &Army,
    claims: &mut Claims,
    col: usize,
    primary_only: bool,
) -> Option<CohortId> {
    let id = target.frontline.get(0, col)?;
    let defender = target.cohort(id);
    if !defender.can_fight() {
        return None;
    }
    if !claims.primary[col] {
        claims.primary[col] = true;
        return Some(id);
    }
    if !primary_only && defender.state.is_weak && !claims.secondary[col] {
        claims.secondary[col] = true;
        return Some(id);
    }
    None
}

fn find_target(
    field: &Battlefield,
    source: &Army,
    target: &mut Army,
    claims: &mut Claims,
    col: usize,
    id: CohortId,
) -> Option<TargetAssignment> {
    let width = field.settings.combat_width;
    let cohort = source.cohort(id);

    // Priority 1: the directly-opposite enemy.
    if let Some(main) = try_claim(target, claims, col, false) {
        return Some(TargetAssignment {
            main,
            column: col,
            support: support_behind(target, col),
            flanking: false,
        });
    }

    // Priority 2: outward scan within maneuver radius. Rightward by
    // default; leftward within the cohort's own half under fixed targeting.
    let radius = cohort.props.maneuver.max(0.0) as i64;
    let leftward = field.settings.fixed_targeting && col < width / 2;

    // Open primary claims beat open secondary claims at any distance.
    for primary_only in [true, false] {
        for dist in 1..=radius {
            let scan = if leftward {
                col as i64 - dist
            } else {
                col as i64 + dist
            };
            if scan < 0 || scan >= width as i64 {
                break;
            }
            let scan = scan as usize;
            if let Some(main) = try_claim(target, claims, scan, primary_only) {
                return Some(TargetAssignment {
                    main,
                    column: scan,
                    support: support_behind(target, scan),
                    flanking: true,
                });
            }
        }
    }

    // Priority 3: nothing in reach; the cohort sits this round out.
    None
}
