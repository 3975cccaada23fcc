//! Per-round refill and centre-ward compaction
//!
//! Every round after round 0, reserves refill empty slots via the same
//! partition, sorts and centre-out walk as deployment, but with no flank
//! zone: the flank-size rule is deployment-only. A compaction pass then
//! slides cohorts toward the centre to close gaps left by casualties.

use crate::combat::deployment::{center_walk, partition_reserve, sorted_support};
use crate::combat::formation::Side;
use crate::core::config::Settings;

/// Refill the frontline from reserve, then compact toward the centre
///
/// Returns the destination columns of compaction moves; the occupant of
/// such a column changed, so any enemy target assignment referencing one
/// must be invalidated and recomputed.
pub fn reinforce(side: &mut Side, settings: &Settings) -> Vec<usize> {
    let width = settings.combat_width;

    let (main, flank) = partition_reserve(side);
    let support = sorted_support(side);
    let mut main = std::collections::VecDeque::from(main);
    let mut flank = std::collections::VecDeque::from(flank);
    let mut support = std::collections::VecDeque::from(support);

    // Engaged rank: any empty slot, main group first.
    for col in center_walk(width) {
        if !side.army.frontline.is_free(0, col) {
            continue;
        }
        let Some(id) = main.pop_front().or_else(|| flank.pop_front()) else {
            break;
        };
        side.army.reserve.remove(id);
        side.army.frontline.set(0, col, id);
    }

    // Support rank.
    for col in center_walk(width) {
        if !side.army.frontline.is_free(1, col) {
            continue;
        }
        let Some(id) = support.pop_front() else { break };
        side.army.reserve.remove(id);
        side.army.frontline.set(1, col, id);
    }

    let moved = compact(side, width);

    // A moved cohort's own claim is column-relative; drop it too.
    for &(row, col) in &moved {
        if let Some(id) = side.army.frontline.get(row, col) {
            side.army.cohort_mut(id).target = None;
        }
    }

    side.army.debug_validate();
    moved.into_iter().map(|(_, col)| col).collect()
}

/// Slide cohorts one step toward the centre to close gaps
///
/// Left half is scanned right-to-left sliding right; right half is scanned
/// left-to-right sliding left. One adjacent step per cohort per round, on
/// both ranks. Returns the destination (row, col) of every move.
fn compact(side: &mut Side, width: usize) -> Vec<(usize, usize)> {
    let center = width / 2;
    let mut moved = Vec::new();

    for row in 0..2 {
        // Left half: columns centre-1 .. 0.
        for col in (0..center).rev() {
            if side.army.frontline.is_free(row, col) {
                continue;
            }
            if side.army.frontline.is_free(row, col + 1) {
                let id = side.army.frontline.take(row, col).unwrap();
                side.army.frontline.set(row, col + 1, id);
                moved.push((row, col + 1));
            }
        }
        // Right half: columns centre+1 .. width-1.
        for col in center + 1..width {
            if side.army.frontline.is_free(row, col) {
                continue;
            }
            if side.army.frontline.is_free(row, col - 1) {
                let id = side.army.frontline.take(row, col).unwrap();
                side.army.frontline.set(row, col - 1, id);
                moved.push((row, col - 1));
            }
        }
    }

    moved
}
