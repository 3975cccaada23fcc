//! Initial placement from reserve into the frontline
//!
//! Runs once at round 0 per side, independently; each side sizes its flanks
//! against the opponent's pre-deployment army size. The walk order, the
//! priority sorts and the flank-width rule are parity-critical.

use ordered_float::OrderedFloat;

use crate::combat::formation::Side;
use crate::core::config::Settings;
use crate::core::types::{CohortId, Role, UnitKindId};

/// Priority bump that pins a preferred kind to one end of a sort
const PREFERENCE_WEIGHT: f64 = 1_000_000.0;

/// Alternating centre-out slot walk
///
/// Starting at `width / 2`, visits slots in the order centre, centre-1,
/// centre+1, centre-2, ... via `next(i) = i < c ? i + 2(c-i) : i - 2(i-c) - 1`.
pub fn center_walk(width: usize) -> Vec<usize> {
    let mut order = Vec::with_capacity(width);
    if width == 0 {
        return order;
    }
    let center = width / 2;
    let mut i = center;
    for _ in 0..width {
        order.push(i);
        i = if i < center {
            i + 2 * (center - i)
        } else {
            (i - 2 * (i - center)).wrapping_sub(1)
        };
    }
    order
}

/// Per-side flank widths for this deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlankWidths {
    pub left: usize,
    pub right: usize,
}

impl FlankWidths {
    /// Is this column inside the flank zone?
    pub fn contains(&self, col: usize, width: usize) -> bool {
        col < self.left || col >= width - self.right
    }
}

/// Compute the flank zone widths
///
/// The preferred size only takes effect when the army outnumbers the line by
/// more than 2 (kept exactly as-is; regression-tested quirk). With dynamic
/// flanking, each side also gets at least half the line's excess over the
/// enemy army. Neither flank may cross the centre.
pub fn flank_widths(
    own_size: usize,
    enemy_size: usize,
    preferred: usize,
    width: usize,
    dynamic: bool,
) -> FlankWidths {
    let preferred = if own_size > width + 2 { preferred } else { 0 };

    let excess = if dynamic {
        width as i64 - enemy_size as i64
    } else {
        0
    };
    let left_dyn = if excess > 0 {
        ((excess as f64) / 2.0).ceil() as usize
    } else {
        0
    };
    let right_dyn = if excess > 0 { (excess / 2) as usize } else { 0 };

    let half_left = width / 2;
    let half_right = width - half_left;
    FlankWidths {
        left: preferred.max(left_dyn).min(half_left),
        right: preferred.max(right_dyn).min(half_right),
    }
}

/// Does this cohort belong to the flank group?
///
/// Explicit preferences override the intrinsic flank-capable flag: the
/// flank-preference kind always flanks, the primary/secondary kinds never do.
fn is_flank_group(kind: UnitKindId, flank_capable: bool, side: &Side) -> bool {
    if side.prefs.flank == Some(kind) {
        return true;
    }
    if side.prefs.primary == Some(kind) || side.prefs.secondary == Some(kind) {
        return false;
    }
    flank_capable
}

/// Split the non-support reserve into sorted main and flank groups
///
/// Main sorts descending by deployment cost then current strength, with the
/// primary-preference kind pulled to the front and the secondary kind pushed
/// to the back. Flank sorts descending by maneuver then strength, with the
/// flank-preference kind pulled forward. Ties keep reserve order (stable
/// sorts).
pub fn partition_reserve(side: &Side) -> (Vec<CohortId>, Vec<CohortId>) {
    let mut main = Vec::new();
    let mut flank = Vec::new();

    for &id in side.army.reserve.front.iter().chain(&side.army.reserve.flank) {
        let cohort = side.army.cohort(id);
        if is_flank_group(cohort.kind(), cohort.props.flank_capable, side) {
            flank.push(id);
        } else {
            main.push(id);
        }
    }

    let prefs = &side.prefs;
    main.sort_by(|&x, &y| {
        let score = |id: CohortId| {
            let c = side.army.cohort(id);
            let mut s = c.props.deploy_cost;
            if prefs.primary == Some(c.kind()) {
                s += PREFERENCE_WEIGHT;
            }
            if prefs.secondary == Some(c.kind()) {
                s -= PREFERENCE_WEIGHT;
            }
            (OrderedFloat(s), OrderedFloat(c.state.strength))
        };
        score(y).cmp(&score(x))
    });

    flank.sort_by(|&x, &y| {
        let score = |id: CohortId| {
            let c = side.army.cohort(id);
            let mut s = c.props.maneuver;
            if prefs.flank == Some(c.kind()) {
                s += PREFERENCE_WEIGHT;
            }
            (OrderedFloat(s), OrderedFloat(c.state.strength))
        };
        score(y).cmp(&score(x))
    });

    (main, flank)
}

/// Sorted support-rank queue: descending cost then strength
pub fn sorted_support(side: &Side) -> Vec<CohortId> {
    let mut support = side.army.reserve.support.clone();
    support.sort_by(|&x, &y| {
        let score = |id: CohortId| {
            let c = side.army.cohort(id);
            (OrderedFloat(c.props.deploy_cost), OrderedFloat(c.state.strength))
        };
        score(y).cmp(&score(x))
    });
    support
}

/// One-time initial placement for a side
///
/// `enemy_size` is the opponent's pre-deployment army size (front-eligible
/// cohorts), captured before either side deploys.
pub fn deploy(side: &mut Side, enemy_size: usize, settings: &Settings) {
    let width = settings.combat_width;
    let own_size = side.army.reserve.total();
    let zone = flank_widths(
        own_size,
        enemy_size,
        side.prefs.preferred_flank_size,
        width,
        settings.dynamic_flanking,
    );

    let (main, flank) = partition_reserve(side);
    let support = sorted_support(side);
    let mut main = std::collections::VecDeque::from(main);
    let mut flank = std::collections::VecDeque::from(flank);
    let mut support = std::collections::VecDeque::from(support);

    // Engaged rank: zone preference with cross-group fallback.
    for col in center_walk(width) {
        if main.is_empty() && flank.is_empty() {
            break;
        }
        let pick = if zone.contains(col, width) {
            flank.pop_front().or_else(|| main.pop_front())
        } else {
            main.pop_front().or_else(|| flank.pop_front())
        };
        if let Some(id) = pick {
            side.army.reserve.remove(id);
            side.army.frontline.set(0, col, id);
        }
    }

    // Support rank: same walk, support queue only.
    for col in center_walk(width) {
        let Some(id) = support.pop_front() else { break };
        side.army.reserve.remove(id);
        side.army.frontline.set(1, col, id);
    }

    // Leftovers stay in reserve, flank group first, then main.
    side.army.reserve.front.clear();
    side.army.reserve.flank.clear();
    for id in flank {
        side.army.reserve.flank.push(id);
    }
    for id in main {
        side.army.reserve.front.push(id);
    }

    side.army.debug_validate();
}

/// Front-eligible army size used when the opponent sizes its flanks
pub fn pre_deployment_size(side: &Side) -> usize {
    side.army.reserve.front.len() + side.army.reserve.flank.len()
}
