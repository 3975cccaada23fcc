//! Exhaustive dice-outcome win-rate projection
//!
//! Explores the tree of future dice pairs with an explicit node stack
//! instead of recursion. Each branch fixes one dice pair for a block of
//! rounds; branch weights multiply down the tree so the recorded outcome
//! mass always sums to the explored probability mass. Work is chunked so a
//! caller can interleave projection with other duties and cancel between
//! chunks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::combat::round::{Battle, BattleOutcome};
use crate::core::config::Settings;
use crate::core::error::{BattleError, Result};
use crate::core::types::SideId;

/// Shared cancellation flag, checked between chunks
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// One dice pair with its probability mass within its grid
#[derive(Debug, Clone, Copy)]
struct RollPair {
    attacker: i32,
    defender: i32,
    weight: f64,
}

/// Full attacker-defender dice grid, widest roll gaps first
///
/// Exploring lopsided pairs first front-loads decisive branches, so an
/// early-cancelled projection still covers the informative outcomes. With
/// `coarse`, only every second face is sampled; the weights still sum to 1.
fn roll_pairs(settings: &Settings, coarse: bool) -> Vec<RollPair> {
    let step = if coarse { 2 } else { 1 };
    let faces: Vec<i32> = (settings.dice_min..=settings.dice_max)
        .step_by(step)
        .collect();
    let weight = 1.0 / (faces.len() * faces.len()) as f64;

    let mut pairs = Vec::with_capacity(faces.len() * faces.len());
    for &attacker in &faces {
        for &defender in &faces {
            pairs.push(RollPair {
                attacker,
                defender,
                weight,
            });
        }
    }
    pairs.sort_by_key(|p| -(p.attacker - p.defender).abs());
    pairs
}

/// One frame of the explicit exploration stack
#[derive(Debug, Clone)]
struct Node {
    battle: Battle,
    /// Index of the next dice pair to expand from this frame.
    next_branch: usize,
    depth: u32,
    /// Probability mass of reaching this frame.
    weight: f64,
}

/// Projected material outcome for one side, weighted over explored branches
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ProjectedLosses {
    /// Expected strength lost relative to the starting army.
    pub strength_lost: f64,
    /// Expected cost of repairing surviving cohorts back to full strength.
    pub repair_cost: f64,
    /// Expected maintenance paid over the battle's duration.
    pub maintenance_cost: f64,
    /// Expected count of own cohorts captured by the enemy.
    pub cohorts_captured: f64,
    /// Expected value of enemy cohorts captured by this side.
    pub value_captured: f64,
}

/// Aggregated projection results
///
/// All masses are absolute probabilities; they sum to `progress`, which
/// reaches 1.0 only when the tree was explored to completion. Use
/// [`WinRateReport::normalized`] for shares of the explored mass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WinRateReport {
    pub attacker_win: f64,
    pub defender_win: f64,
    pub draw: f64,
    /// Mass of branches still undecided at the depth limit.
    pub incomplete: f64,
    /// Explored probability mass, monotonically non-decreasing.
    pub progress: f64,
    /// Mean battle length over decided branches.
    pub avg_rounds: f64,
    /// Outcome mass by round of decision; index is `rounds_elapsed`.
    pub round_histogram: Vec<f64>,
    /// Per-side material projection, `[attacker, defender]`.
    pub losses: Option<[ProjectedLosses; 2]>,
}

impl WinRateReport {
    /// Rescale outcome masses to shares of the explored mass
    pub fn normalized(&self) -> WinRateReport {
        if self.progress <= 0.0 {
            return self.clone();
        }
        let p = self.progress;
        WinRateReport {
            attacker_win: self.attacker_win / p,
            defender_win: self.defender_win / p,
            draw: self.draw / p,
            incomplete: self.incomplete / p,
            progress: self.progress,
            avg_rounds: self.avg_rounds,
            round_histogram: self.round_histogram.iter().map(|m| m / p).collect(),
            losses: self.losses,
        }
    }
}

/// Incremental exhaustive projection over future dice outcomes
#[derive(Debug)]
pub struct WinRateProjector {
    stack: Vec<Node>,
    pairs_root: Vec<RollPair>,
    pairs_deep: Vec<RollPair>,
    settings: Settings,
    /// Attacker identity at projection start; swaps during a branch do not
    /// reattribute its outcome.
    initial_attacker: SideId,
    initial_strength: [f64; 2],
    wins: [f64; 2],
    draw: f64,
    incomplete: f64,
    recorded: f64,
    rounds_weighted: f64,
    round_histogram: Vec<f64>,
    losses: [ProjectedLosses; 2],
    done: bool,
}

impl WinRateProjector {
    pub fn new(battle: Battle) -> Result<Self> {
        let settings = battle.field.settings.clone();
        settings.validate()?;
        if settings.max_depth == 0 {
            return Err(BattleError::InvalidConfig(
                "projection depth must be at least 1".into(),
            ));
        }

        let pairs_root = roll_pairs(&settings, false);
        let pairs_deep = roll_pairs(&settings, settings.halve_deep_rolls);
        let initial_attacker = battle.field.attacker;
        let initial_strength = [
            battle.sides[0].army.live_strength(),
            battle.sides[1].army.live_strength(),
        ];

        Ok(Self {
            stack: vec![Node {
                battle,
                next_branch: 0,
                depth: 0,
                weight: 1.0,
            }],
            pairs_root,
            pairs_deep,
            settings,
            initial_attacker,
            initial_strength,
            wins: [0.0; 2],
            draw: 0.0,
            incomplete: 0.0,
            recorded: 0.0,
            rounds_weighted: 0.0,
            round_histogram: Vec::new(),
            losses: [ProjectedLosses::default(); 2],
            done: false,
        })
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Explored probability mass so far
    pub fn progress(&self) -> f64 {
        self.recorded
    }

    /// Run one chunk of branch expansions; returns true when finished
    pub fn run_chunk(&mut self) -> bool {
        for _ in 0..self.settings.chunk_size.max(1) {
            if self.done {
                break;
            }
            self.step();
        }
        self.done
    }

    /// Expand one branch of the top stack frame
    fn step(&mut self) {
        let Some(top) = self.stack.last_mut() else {
            self.done = true;
            return;
        };

        let pairs = if top.depth == 0 {
            &self.pairs_root
        } else {
            &self.pairs_deep
        };
        let Some(&pair) = pairs.get(top.next_branch) else {
            self.stack.pop();
            if self.stack.is_empty() {
                self.done = true;
                tracing::debug!(progress = self.recorded, "projection complete");
            }
            return;
        };
        top.next_branch += 1;

        let weight = top.weight * pair.weight;
        let depth = top.depth + 1;
        let mut battle = top.battle.clone();

        battle.set_dice(pair.attacker, pair.defender);
        let mut outcome = BattleOutcome::Undecided;
        for _ in 0..self.settings.roll_frequency.max(1) {
            outcome = battle.resolve_round();
            if outcome != BattleOutcome::Undecided {
                break;
            }
        }

        match outcome {
            BattleOutcome::Undecided if depth < self.settings.max_depth => {
                self.stack.push(Node {
                    battle,
                    next_branch: 0,
                    depth,
                    weight,
                });
            }
            BattleOutcome::Undecided => {
                self.incomplete += weight;
                self.recorded += weight;
            }
            decided => self.record(decided, &battle, weight),
        }
    }

    fn record(&mut self, outcome: BattleOutcome, battle: &Battle, weight: f64) {
        match outcome {
            BattleOutcome::Victory(side) => self.wins[side.index()] += weight,
            BattleOutcome::Draw => self.draw += weight,
            BattleOutcome::Undecided => unreachable!("recording undecided branch"),
        }
        self.recorded += weight;

        let rounds = battle.rounds_elapsed as usize;
        self.rounds_weighted += weight * rounds as f64;
        if self.round_histogram.len() <= rounds {
            self.round_histogram.resize(rounds + 1, 0.0);
        }
        self.round_histogram[rounds] += weight;

        if self.settings.track_casualties {
            self.record_losses(battle, weight);
        }
    }

    fn record_losses(&mut self, battle: &Battle, weight: f64) {
        let rounds = battle.rounds_elapsed as f64;
        for i in 0..2 {
            let army = &battle.sides[i].army;
            let mut remaining = 0.0;
            let mut repair = 0.0;
            let mut maintenance = 0.0;
            let mut captured = 0.0;
            let mut value_lost = 0.0;
            for cohort in &army.cohorts {
                remaining += cohort.state.strength;
                maintenance += cohort.props.maintenance_cost;
                // Capture odds were fixed at defeat time; a later stack wipe
                // does not undo them.
                captured += cohort.state.capture_odds;
                value_lost += cohort.state.capture_odds * cohort.props.value;
                if !cohort.state.destroyed {
                    repair += (cohort.props.max_strength - cohort.state.strength).max(0.0)
                        * cohort.props.repair_cost;
                }
            }
            let own = &mut self.losses[i];
            own.strength_lost += weight * (self.initial_strength[i] - remaining).max(0.0);
            own.repair_cost += weight * repair;
            own.maintenance_cost += weight * maintenance * rounds;
            own.cohorts_captured += weight * captured;
            // Value captured accrues to the opposing side.
            self.losses[1 - i].value_captured += weight * value_lost;
        }
    }

    /// Snapshot the projection; valid at any point, partial or complete
    pub fn report(&self) -> WinRateReport {
        let decided = self.wins[0] + self.wins[1] + self.draw;
        let attacker = self.initial_attacker.index();
        let defender = self.initial_attacker.opponent().index();
        WinRateReport {
            attacker_win: self.wins[attacker],
            defender_win: self.wins[defender],
            draw: self.draw,
            incomplete: self.incomplete,
            progress: self.recorded,
            avg_rounds: if decided > 0.0 {
                self.rounds_weighted / decided
            } else {
                0.0
            },
            round_histogram: self.round_histogram.clone(),
            losses: if self.settings.track_casualties {
                Some([self.losses[attacker], self.losses[defender]])
            } else {
                None
            },
        }
    }
}

/// Run a projection to completion or cancellation
///
/// `progress` is called after every chunk with the explored mass so far.
pub fn calculate_win_rate(
    battle: Battle,
    cancel: &CancelToken,
    mut progress: impl FnMut(f64),
) -> Result<WinRateReport> {
    let mut projector = WinRateProjector::new(battle)?;
    while !projector.run_chunk() {
        progress(projector.progress());
        if cancel.is_cancelled() {
            tracing::debug!(progress = projector.progress(), "projection cancelled");
            break;
        }
    }
    progress(projector.progress());
    Ok(projector.report())
}
