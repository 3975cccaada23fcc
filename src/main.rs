//! Command-line front end: load a scenario, then project or fight it

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use battlecast::combat::projector::calculate_win_rate;
use battlecast::combat::round::{Battle, BattleOutcome};
use battlecast::core::error::Result;
use battlecast::CancelToken;

#[derive(Parser)]
#[command(name = "battlecast", version, about = "Deterministic battle engine and win-rate projector")]
struct Cli {
    /// Scenario file (TOML)
    scenario: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Exhaustively project win rates over every future dice outcome
    Project {
        /// Report outcome shares of the explored mass instead of absolute
        /// probabilities.
        #[arg(long)]
        normalized: bool,
    },
    /// Fight a single battle with seeded dice
    Single {
        /// Dice seed; the same seed always replays the same battle.
        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Stop an undecided battle after this many rounds.
        #[arg(long, default_value_t = 200)]
        max_rounds: u32,
    },
}

#[derive(Serialize)]
struct SideSummary {
    name: String,
    remaining_strength: f64,
    morale_fraction: f64,
    defeated_cohorts: usize,
}

/// One line of the round ledger printed by single mode
#[derive(Serialize)]
struct RoundEntry {
    round: u32,
    dice: (i32, i32),
    strength: [f64; 2],
    fielded: [usize; 2],
}

#[derive(Serialize)]
struct SingleResult {
    outcome: BattleOutcome,
    rounds: u32,
    ledger: Vec<RoundEntry>,
    sides: [SideSummary; 2],
}

fn run_single(mut battle: Battle, seed: u64, max_rounds: u32) -> SingleResult {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let settings = battle.field.settings.clone();
    let faces = settings.dice_min..=settings.dice_max;

    let mut dice = (0, 0);
    let mut ledger = Vec::new();
    let mut outcome = BattleOutcome::Undecided;
    for round in 0..max_rounds {
        if round % settings.roll_frequency.max(1) == 0 {
            dice = (rng.gen_range(faces.clone()), rng.gen_range(faces.clone()));
            battle.set_dice(dice.0, dice.1);
            tracing::debug!(round, attacker = dice.0, defender = dice.1, "new dice phase");
        }
        outcome = battle.resolve_round();
        ledger.push(RoundEntry {
            round,
            dice,
            strength: [
                battle.sides[0].army.live_strength(),
                battle.sides[1].army.live_strength(),
            ],
            fielded: [
                battle.sides[0].army.frontline.count(),
                battle.sides[1].army.frontline.count(),
            ],
        });
        if outcome != BattleOutcome::Undecided {
            break;
        }
    }

    let sides = [0usize, 1].map(|i| {
        let side = &battle.sides[i];
        SideSummary {
            name: side.name.clone(),
            remaining_strength: side.army.live_strength(),
            morale_fraction: side.army.morale_fraction(),
            defeated_cohorts: side.army.defeated.len(),
        }
    });
    SingleResult {
        outcome,
        rounds: battle.rounds_elapsed,
        ledger,
        sides,
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let battle = battlecast::load_scenario(&cli.scenario)?;

    match cli.command.unwrap_or(Command::Project { normalized: false }) {
        Command::Project { normalized } => {
            let cancel = CancelToken::new();
            let report = calculate_win_rate(battle, &cancel, |progress| {
                tracing::info!(progress, "projecting");
            })?;
            let report = if normalized { report.normalized() } else { report };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Single { seed, max_rounds } => {
            let result = run_single(battle, seed, max_rounds);
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }
    Ok(())
}
