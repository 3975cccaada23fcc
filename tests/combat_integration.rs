//! End-to-end battle resolution tests against known formations

use std::sync::Arc;

use battlecast::combat::cohort::{CohortProps, DamageTable};
use battlecast::combat::deployment::deploy;
use battlecast::combat::formation::{Battlefield, Side};
use battlecast::combat::round::{Battle, BattleOutcome};
use battlecast::core::config::Settings;
use battlecast::core::types::{Role, SideId, UnitKindId};
use battlecast::scenario::parse_scenario;

use proptest::prelude::*;

const ARCHERS: u32 = 0;
const HORSE_ARCHERS: u32 = 1;

fn archers() -> Arc<CohortProps> {
    let mut p = CohortProps::base(UnitKindId(ARCHERS), "archers");
    p.maneuver = 2.0;
    Arc::new(p)
}

fn horse_archers() -> Arc<CohortProps> {
    let mut p = CohortProps::base(UnitKindId(HORSE_ARCHERS), "horse archers");
    p.maneuver = 4.0;
    p.flank_capable = true;
    Arc::new(p)
}

fn kinds_at(side: &Side, row: usize, cols: std::ops::Range<usize>) -> Vec<u32> {
    cols.map(|col| {
        let id = side
            .army
            .frontline
            .get(row, col)
            .unwrap_or_else(|| panic!("column {} empty", col));
        side.army.cohort(id).kind().0
    })
    .collect()
}

#[test]
fn test_lone_cohort_deploys_at_the_center() {
    let settings = Settings::default();
    let mut side = Side::new("solo", settings.combat_width);
    side.army.recruit(Role::Front, archers());

    deploy(&mut side, 0, &settings);

    assert!(side.army.frontline.get(0, 15).is_some());
    assert_eq!(side.army.frontline.count(), 1);
    assert!(side.army.reserve.is_empty());
}

/// 30 archers and 10 horse archers against a 10-cohort enemy, preferred
/// flank size 5. The enemy shortfall widens each flank to 10 files, the
/// horse archers take the innermost flank files, and archers backfill the
/// outermost ones.
#[test]
fn test_flank_sizing_against_smaller_enemy() {
    let settings = Settings::default();
    let mut side = Side::new("host", settings.combat_width);
    side.prefs.preferred_flank_size = 5;
    for _ in 0..30 {
        side.army.recruit(Role::Front, archers());
    }
    for _ in 0..10 {
        side.army.recruit(Role::Flank, horse_archers());
    }

    deploy(&mut side, 10, &settings);

    assert_eq!(kinds_at(&side, 0, 0..5), vec![ARCHERS; 5]);
    assert_eq!(kinds_at(&side, 0, 5..10), vec![HORSE_ARCHERS; 5]);
    assert_eq!(kinds_at(&side, 0, 10..20), vec![ARCHERS; 10]);
    assert_eq!(kinds_at(&side, 0, 20..25), vec![HORSE_ARCHERS; 5]);
    assert_eq!(kinds_at(&side, 0, 25..30), vec![ARCHERS; 5]);
    assert_eq!(side.army.reserve.front.len(), 10);
}

/// Same army with dynamic flanking off: only the preferred width applies,
/// so the horse archers sit in the outermost five files per side.
#[test]
fn test_flank_sizing_with_static_preference() {
    let settings = Settings {
        dynamic_flanking: false,
        ..Settings::default()
    };
    let mut side = Side::new("host", settings.combat_width);
    side.prefs.preferred_flank_size = 5;
    for _ in 0..30 {
        side.army.recruit(Role::Front, archers());
    }
    for _ in 0..10 {
        side.army.recruit(Role::Flank, horse_archers());
    }

    deploy(&mut side, 10, &settings);

    assert_eq!(kinds_at(&side, 0, 0..5), vec![HORSE_ARCHERS; 5]);
    assert_eq!(kinds_at(&side, 0, 5..25), vec![ARCHERS; 20]);
    assert_eq!(kinds_at(&side, 0, 25..30), vec![HORSE_ARCHERS; 5]);
    assert_eq!(side.army.reserve.front.len(), 10);
}

const WIPE_SCENARIO: &str = r#"
    [settings]
    combat_width = 4

    [kinds.guard]
    [kinds.guard.morale_damage]
    default = 1.0

    [kinds.levy]
    [kinds.levy.morale_damage]
    default = 0.001

    [attacker]
    name = "red"
    units = [{ kind = "guard", count = 2 }]

    [defender]
    name = "blue"
    units = [{ kind = "levy", count = 2 }]
"#;

#[test]
fn test_early_collapse_is_a_stack_wipe() {
    let mut battle = parse_scenario(WIPE_SCENARIO).unwrap();

    let mut outcome = BattleOutcome::Undecided;
    for _ in 0..10 {
        battle.set_dice(5, 5);
        outcome = battle.resolve_round();
        if outcome != BattleOutcome::Undecided {
            break;
        }
    }

    assert_eq!(outcome, BattleOutcome::Victory(SideId::A));
    for cohort in &battle.sides[1].army.cohorts {
        assert!(cohort.state.destroyed);
        assert_eq!(cohort.state.strength, 0.0);
        assert_eq!(cohort.state.morale, 0.0);
    }
    assert!(battle.sides[0].army.has_forces());
}

fn line_kind(kind: u32, strength_damage: f64, morale_damage: f64) -> Arc<CohortProps> {
    let mut p = CohortProps::base(UnitKindId(kind), "line");
    p.strength_damage = DamageTable::flat(strength_damage);
    p.morale_damage = DamageTable::flat(morale_damage);
    Arc::new(p)
}

fn duel(attacker: Arc<CohortProps>, defender: Arc<CohortProps>) -> Battle {
    let settings = Settings {
        combat_width: 4,
        ..Settings::default()
    };
    let width = settings.combat_width;
    let field = Battlefield::new(settings);
    let mut a = Side::new("a", width);
    let mut b = Side::new("b", width);
    a.army.recruit(Role::Front, attacker);
    b.army.recruit(Role::Front, defender);
    Battle::new(field, a, b)
}

fn fight_out(battle: &mut Battle) -> BattleOutcome {
    let mut outcome = BattleOutcome::Undecided;
    for _ in 0..30 {
        battle.set_dice(0, 0);
        outcome = battle.resolve_round();
        if outcome != BattleOutcome::Undecided {
            break;
        }
    }
    outcome
}

/// A slow morale grind collapses the defender well after the stack-wipe
/// round window, but broken below the morale threshold: still a wipe.
#[test]
fn test_late_collapse_below_morale_threshold_is_wiped() {
    let mut battle = duel(line_kind(0, 0.001, 0.04), line_kind(1, 0.001, 0.0001));
    let outcome = fight_out(&mut battle);

    assert_eq!(outcome, BattleOutcome::Victory(SideId::A));
    assert!(battle.rounds_elapsed > battle.field.settings.stack_wipe_rounds);

    let loser = &battle.sides[1].army.cohorts[0];
    assert!(loser.state.destroyed);
    assert_eq!(loser.state.strength, 0.0);
    assert_eq!(loser.state.morale, 0.0);
}

/// A strength grind leaves the defender's morale intact, so a late collapse
/// is an orderly defeat: the cohorts retreat instead of being destroyed.
#[test]
fn test_late_collapse_with_intact_morale_is_not_wiped() {
    let mut battle = duel(line_kind(0, 0.01, 0.0001), line_kind(1, 0.0001, 0.0001));
    let outcome = fight_out(&mut battle);

    assert_eq!(outcome, BattleOutcome::Victory(SideId::A));
    assert!(battle.rounds_elapsed > battle.field.settings.stack_wipe_rounds);

    let loser = &battle.sides[1].army.cohorts[0];
    assert!(loser.state.defeated);
    assert!(!loser.state.destroyed);
    assert!(loser.state.morale > 2.0);
}

#[test]
fn test_cohorts_always_in_exactly_one_collection() {
    let mut battle = parse_scenario(WIPE_SCENARIO).unwrap();
    for _ in 0..6 {
        battle.set_dice(3, 6);
        battle.resolve_round();

        for side in &battle.sides {
            for cohort in &side.army.cohorts {
                let deployed = side.army.frontline.position_of(cohort.id).is_some() as usize;
                let reserved = (side.army.reserve.front.contains(&cohort.id)
                    || side.army.reserve.flank.contains(&cohort.id)
                    || side.army.reserve.support.contains(&cohort.id))
                    as usize;
                let defeated = side.army.defeated.contains(&cohort.id) as usize;
                assert_eq!(deployed + reserved + defeated, 1);
            }
        }
    }
}

#[test]
fn test_full_scenario_runs_to_a_decision() {
    let text = r#"
        [settings]
        combat_width = 10

        [[terrain]]
        name = "hills"
        attacker_roll_modifier = -1

        [kinds.infantry]
        offense = 1.0
        defense = 1.0
        [kinds.infantry.morale_damage]
        default = { fire = 0.08, shock = 0.15 }

        [kinds.hussars]
        maneuver = 4.0
        flank_capable = true
        capture_chance = 0.3
        [kinds.hussars.morale_damage]
        default = { fire = 0.04, shock = 0.2 }

        [tactics.assault]
        strength = 1.3
        counters = { delay = 1.4 }

        [tactics.delay]

        [attacker]
        name = "red"
        tactic = "assault"
        general = { fire = 2, shock = 4 }
        prefs = { flank = "hussars", preferred_flank_size = 2 }
        units = [
            { kind = "infantry", count = 8 },
            { kind = "hussars", count = 4, role = "flank" },
        ]

        [defender]
        name = "blue"
        tactic = "delay"
        units = [{ kind = "infantry", count = 6 }]
    "#;
    let mut battle = parse_scenario(text).unwrap();

    let mut outcome = BattleOutcome::Undecided;
    for round in 0..400 {
        if round % 3 == 0 {
            battle.set_dice((round % 10) as i32, ((round * 7) % 10) as i32);
        }
        outcome = battle.resolve_round();
        if outcome != BattleOutcome::Undecided {
            break;
        }
    }

    assert_ne!(outcome, BattleOutcome::Undecided);
    assert!(battle.rounds_elapsed > 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Strength only ever leaves a battle, and stats stay inside their
    /// configured bounds, whatever the army sizes and dice.
    #[test]
    fn test_strength_never_increases(
        n_a in 1usize..6,
        n_b in 1usize..6,
        dice in proptest::collection::vec((0i32..10, 0i32..10), 8),
    ) {
        let settings = Settings { combat_width: 6, ..Settings::default() };
        let width = settings.combat_width;
        let field = battlecast::combat::formation::Battlefield::new(settings);
        let mut a = Side::new("a", width);
        let mut b = Side::new("b", width);
        for _ in 0..n_a {
            a.army.recruit(Role::Front, archers());
        }
        for _ in 0..n_b {
            b.army.recruit(Role::Front, archers());
        }
        let mut battle = battlecast::combat::round::Battle::new(field, a, b);

        let mut last = [n_a as f64, n_b as f64];
        for (da, db) in dice {
            battle.set_dice(da, db);
            if battle.resolve_round() != BattleOutcome::Undecided {
                break;
            }
            for i in 0..2 {
                let total: f64 = battle.sides[i].army.cohorts.iter()
                    .map(|c| c.state.strength)
                    .sum();
                prop_assert!(total <= last[i] + 1e-12);
                last[i] = total;
                for cohort in &battle.sides[i].army.cohorts {
                    prop_assert!(cohort.state.strength >= 0.0);
                    prop_assert!(cohort.state.strength <= cohort.props.max_strength);
                    prop_assert!(cohort.state.morale >= 0.0);
                    prop_assert!(cohort.state.morale <= cohort.props.max_morale);
                }
            }
        }
    }
}
