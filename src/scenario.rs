//! TOML scenario files
//!
//! A scenario declares the settings, terrain, unit kinds, tactics and both
//! orders of battle by name; loading resolves every name to an engine id and
//! yields a ready-to-run [`Battle`]. Kind and tactic ids are assigned in
//! name order, so a scenario always resolves identically.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::combat::cohort::{CohortProps, DamageTable, PhaseDamage};
use crate::combat::formation::{Battlefield, General, Side, Tactic, Terrain, UnitPreferences};
use crate::combat::round::Battle;
use crate::core::config::Settings;
use crate::core::error::{BattleError, Result};
use crate::core::types::{Role, TacticId, UnitKindId};

/// Damage value, either flat or split by phase
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
enum DamageSpec {
    Flat(f64),
    Phased { fire: f64, shock: f64 },
}

impl DamageSpec {
    fn resolve(self) -> PhaseDamage {
        match self {
            DamageSpec::Flat(value) => PhaseDamage::uniform(value),
            DamageSpec::Phased { fire, shock } => PhaseDamage { fire, shock },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct DamageTableSpec {
    default: DamageSpec,
    #[serde(default)]
    by_kind: BTreeMap<String, DamageSpec>,
}

/// One unit kind's flattened properties
///
/// Every field defaults to the neutral base value, so a scenario only names
/// what it changes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct KindSpec {
    offense: f64,
    defense: f64,
    maneuver: f64,
    deploy_cost: f64,
    flank_capable: bool,
    offensive_support: f64,
    discipline: f64,
    damage_done: f64,
    damage_taken: f64,
    strength_mult: f64,
    morale_mult: f64,
    max_strength: f64,
    max_morale: f64,
    morale_loss_resist: f64,
    capture_chance: f64,
    capture_resist: f64,
    repair_cost: f64,
    maintenance_cost: f64,
    value: f64,
    strength_damage: Option<DamageTableSpec>,
    morale_damage: Option<DamageTableSpec>,
}

impl Default for KindSpec {
    fn default() -> Self {
        let base = CohortProps::base(UnitKindId(0), "");
        Self {
            offense: base.offense,
            defense: base.defense,
            maneuver: base.maneuver,
            deploy_cost: base.deploy_cost,
            flank_capable: base.flank_capable,
            offensive_support: base.offensive_support,
            discipline: base.discipline,
            damage_done: base.damage_done,
            damage_taken: base.damage_taken,
            strength_mult: base.strength_mult,
            morale_mult: base.morale_mult,
            max_strength: base.max_strength,
            max_morale: base.max_morale,
            morale_loss_resist: base.morale_loss_resist,
            capture_chance: base.capture_chance,
            capture_resist: base.capture_resist,
            repair_cost: base.repair_cost,
            maintenance_cost: base.maintenance_cost,
            value: base.value,
            strength_damage: None,
            morale_damage: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct TacticSpec {
    strength: f64,
    #[serde(default)]
    counters: BTreeMap<String, f64>,
}

impl Default for TacticSpec {
    fn default() -> Self {
        Self {
            strength: 1.0,
            counters: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct UnitSpec {
    kind: String,
    #[serde(default = "one")]
    count: u32,
    #[serde(default = "front")]
    role: Role,
}

fn one() -> u32 {
    1
}

fn front() -> Role {
    Role::Front
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct PrefsSpec {
    primary: Option<String>,
    secondary: Option<String>,
    flank: Option<String>,
    preferred_flank_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
struct SideSpec {
    name: String,
    #[serde(default)]
    tactic: Option<String>,
    #[serde(default)]
    general: General,
    #[serde(default)]
    prefs: PrefsSpec,
    units: Vec<UnitSpec>,
}

/// Raw scenario file schema
#[derive(Debug, Clone, Deserialize)]
struct ScenarioFile {
    #[serde(default)]
    settings: Settings,
    #[serde(default)]
    terrain: Vec<Terrain>,
    kinds: BTreeMap<String, KindSpec>,
    #[serde(default)]
    tactics: BTreeMap<String, TacticSpec>,
    attacker: SideSpec,
    defender: SideSpec,
}

/// Name-to-id resolution tables built from the kind and tactic maps
struct Registry {
    kinds: BTreeMap<String, (UnitKindId, Arc<CohortProps>)>,
    tactics: BTreeMap<String, Tactic>,
}

impl Registry {
    fn kind(&self, name: &str) -> Result<&(UnitKindId, Arc<CohortProps>)> {
        self.kinds
            .get(name)
            .ok_or_else(|| BattleError::UnknownKind(name.into()))
    }

    fn kind_id(&self, name: &str) -> Result<UnitKindId> {
        Ok(self.kind(name)?.0)
    }

    fn tactic(&self, name: &str) -> Result<Tactic> {
        self.tactics
            .get(name)
            .cloned()
            .ok_or_else(|| BattleError::UnknownTactic(name.into()))
    }
}

fn resolve_damage_table(
    spec: Option<&DamageTableSpec>,
    fallback: DamageTable,
    kind_ids: &BTreeMap<String, UnitKindId>,
) -> Result<DamageTable> {
    let Some(spec) = spec else {
        return Ok(fallback);
    };
    let mut table = DamageTable {
        by_kind: Default::default(),
        default: spec.default.resolve(),
    };
    for (name, damage) in &spec.by_kind {
        let id = kind_ids
            .get(name)
            .ok_or_else(|| BattleError::UnknownKind(name.clone()))?;
        table.by_kind.insert(*id, damage.resolve());
    }
    Ok(table)
}

fn build_registry(file: &ScenarioFile) -> Result<Registry> {
    let kind_ids: BTreeMap<String, UnitKindId> = file
        .kinds
        .keys()
        .enumerate()
        .map(|(i, name)| (name.clone(), UnitKindId(i as u32)))
        .collect();

    let mut kinds = BTreeMap::new();
    for (name, spec) in &file.kinds {
        let id = kind_ids[name];
        let base = CohortProps::base(id, name.clone());
        let props = CohortProps {
            kind: id,
            kind_name: name.clone(),
            offense: spec.offense,
            defense: spec.defense,
            maneuver: spec.maneuver,
            deploy_cost: spec.deploy_cost,
            flank_capable: spec.flank_capable,
            offensive_support: spec.offensive_support,
            discipline: spec.discipline,
            damage_done: spec.damage_done,
            damage_taken: spec.damage_taken,
            strength_mult: spec.strength_mult,
            morale_mult: spec.morale_mult,
            max_strength: spec.max_strength,
            max_morale: spec.max_morale,
            morale_loss_resist: spec.morale_loss_resist,
            capture_chance: spec.capture_chance,
            capture_resist: spec.capture_resist,
            repair_cost: spec.repair_cost,
            maintenance_cost: spec.maintenance_cost,
            value: spec.value,
            strength_damage: resolve_damage_table(
                spec.strength_damage.as_ref(),
                base.strength_damage.clone(),
                &kind_ids,
            )?,
            morale_damage: resolve_damage_table(
                spec.morale_damage.as_ref(),
                base.morale_damage.clone(),
                &kind_ids,
            )?,
        };
        kinds.insert(name.clone(), (id, Arc::new(props)));
    }

    let tactic_ids: BTreeMap<String, TacticId> = file
        .tactics
        .keys()
        .enumerate()
        .map(|(i, name)| (name.clone(), TacticId(i as u32 + 1)))
        .collect();
    let mut tactics = BTreeMap::new();
    for (name, spec) in &file.tactics {
        let mut tactic = Tactic::neutral(tactic_ids[name], name.clone());
        tactic.strength = spec.strength;
        for (other, mult) in &spec.counters {
            let id = tactic_ids
                .get(other)
                .ok_or_else(|| BattleError::UnknownTactic(other.clone()))?;
            tactic.counters.insert(*id, *mult);
        }
        tactics.insert(name.clone(), tactic);
    }

    Ok(Registry { kinds, tactics })
}

fn build_side(spec: &SideSpec, registry: &Registry, width: usize) -> Result<Side> {
    if spec.units.is_empty() {
        return Err(BattleError::InvalidScenario(format!(
            "side '{}' has no units",
            spec.name
        )));
    }

    let mut side = Side::new(spec.name.clone(), width);
    side.general = spec.general;
    if let Some(name) = &spec.tactic {
        side.tactic = registry.tactic(name)?;
    }

    let prefs = &spec.prefs;
    side.prefs = UnitPreferences {
        primary: prefs
            .primary
            .as_deref()
            .map(|n| registry.kind_id(n))
            .transpose()?,
        secondary: prefs
            .secondary
            .as_deref()
            .map(|n| registry.kind_id(n))
            .transpose()?,
        flank: prefs
            .flank
            .as_deref()
            .map(|n| registry.kind_id(n))
            .transpose()?,
        preferred_flank_size: prefs.preferred_flank_size,
    };

    for unit in &spec.units {
        let (_, props) = registry.kind(&unit.kind)?;
        for _ in 0..unit.count {
            side.army.recruit(unit.role, props.clone());
        }
    }
    Ok(side)
}

/// Build a battle from parsed scenario text
pub fn parse_scenario(text: &str) -> Result<Battle> {
    let file: ScenarioFile = toml::from_str(text)?;
    file.settings.validate()?;

    let registry = build_registry(&file)?;
    let width = file.settings.combat_width;
    let attacker = build_side(&file.attacker, &registry, width)?;
    let defender = build_side(&file.defender, &registry, width)?;

    let mut field = Battlefield::new(file.settings);
    field.terrain = file.terrain;
    Ok(Battle::new(field, attacker, defender))
}

/// Load a battle from a scenario file
pub fn load_scenario(path: impl AsRef<Path>) -> Result<Battle> {
    let text = std::fs::read_to_string(path)?;
    parse_scenario(&text)
}
