//! Scenario configuration
//!
//! A scenario is written in map units (one unit = one visibility tile) and
//! milliseconds, loaded from TOML, validated, and converted once into the
//! fixed-point [`Scenario`] snapshot the simulation owns.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path as FsPath;

use serde::{Deserialize, Serialize};

use crate::core::error::{Result, SimError};
use crate::core::fp::{self, FpVector};
use crate::core::types::{PlayerId, Time, UnitTypeId};
use crate::player::Player;
use crate::timeline::unit::UnitType;

/// Scenario file contents
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Width and height of the square map, in tiles
    pub map_size: f64,
    /// Milliseconds between periodic update events
    pub update_interval: Time,
    /// Sight radius of every unit, in tiles
    pub visibility_radius: f64,
    #[serde(default)]
    pub resources: Vec<String>,
    pub players: Vec<PlayerConfig>,
    pub unit_types: Vec<UnitTypeConfig>,
    /// Initial unit placements
    #[serde(default)]
    pub paths: Vec<PathConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlayerConfig {
    pub name: String,
    #[serde(default = "default_true")]
    pub is_user: bool,
    #[serde(default)]
    pub population_limit: Option<u32>,
    #[serde(default)]
    pub start_resources: BTreeMap<String, f64>,
    /// Names of players this player's units may attack
    #[serde(default)]
    pub can_attack: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnitTypeConfig {
    pub name: String,
    pub max_health: u32,
    /// Tiles per millisecond
    pub speed: f64,
    /// Milliseconds between attacks
    #[serde(default)]
    pub reload: Time,
    /// Attack range in tiles
    #[serde(default)]
    pub range: f64,
    /// Spacing between members of a tight formation, in tiles
    #[serde(default)]
    pub tight_spacing: f64,
    /// Health removed per attack, keyed by target unit type
    #[serde(default)]
    pub damage: BTreeMap<String, u32>,
    #[serde(default)]
    pub cost: BTreeMap<String, f64>,
    /// Resources gathered per millisecond alive
    #[serde(default)]
    pub collect_rate: BTreeMap<String, f64>,
    /// Unit types this type can produce
    #[serde(default)]
    pub can_make: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathConfig {
    pub player: String,
    pub units: Vec<String>,
    pub pos: [f64; 2],
}

fn default_true() -> bool {
    true
}

/// Immutable simulation parameters, in fixed point
#[derive(Debug, Clone)]
pub struct Rules {
    pub map_size: i64,
    pub update_interval: Time,
    pub visibility_radius: i64,
    pub tile_vis_radius: i32,
    pub resource_names: Vec<String>,
    /// Speed of the fastest unit type, never below one raw unit per ms
    pub max_speed: i64,
}

impl Rules {
    /// Number of tiles along each side of the grid
    pub fn tile_len(&self) -> i32 {
        fp::to_tile(self.map_size) + 1
    }

    /// Time the fastest unit needs to cross one tile
    pub fn tile_cross_time(&self) -> Time {
        (fp::ONE / self.max_speed).max(1)
    }

    /// Whether a unit could see a tile at the given tile offset
    pub fn in_vis(&self, dx: i32, dy: i32) -> bool {
        let dx = fp::from_int(dx as i64) as i128;
        let dy = fp::from_int(dy as i64) as i128;
        let r = self.visibility_radius as i128;
        dx * dx + dy * dy <= r * r
    }
}

/// Initial placement of one path
#[derive(Debug, Clone)]
pub struct InitialPath {
    pub player: PlayerId,
    pub units: Vec<UnitTypeId>,
    pub pos: FpVector,
}

/// Validated scenario converted into runtime form
#[derive(Debug, Clone)]
pub struct Scenario {
    pub rules: Rules,
    pub unit_types: Vec<UnitType>,
    pub players: Vec<Player>,
    pub paths: Vec<InitialPath>,
}

impl ScenarioConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: ScenarioConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<FsPath>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Check the scenario for internal consistency
    pub fn validate(&self) -> Result<()> {
        if !(self.map_size > 0.0) {
            return Err(invalid("map_size must be positive"));
        }
        if self.update_interval <= 0 {
            return Err(invalid("update_interval must be positive"));
        }
        if !(self.visibility_radius > 0.0) {
            return Err(invalid("visibility_radius must be positive"));
        }
        if self.players.is_empty() {
            return Err(invalid("scenario needs at least one player"));
        }
        unique_names("resource", self.resources.iter())?;
        unique_names("player", self.players.iter().map(|p| &p.name))?;
        unique_names("unit type", self.unit_types.iter().map(|t| &t.name))?;

        let resources: BTreeSet<&str> = self.resources.iter().map(String::as_str).collect();
        let players: BTreeSet<&str> = self.players.iter().map(|p| p.name.as_str()).collect();
        let types: BTreeMap<&str, &UnitTypeConfig> = self
            .unit_types
            .iter()
            .map(|t| (t.name.as_str(), t))
            .collect();
        let type_names: BTreeSet<&str> = types.keys().copied().collect();

        for player in &self.players {
            known(&resources, player.start_resources.keys(), "resource", &player.name)?;
            known(&players, player.can_attack.iter(), "player", &player.name)?;
        }
        for unit_type in &self.unit_types {
            if unit_type.max_health == 0 {
                return Err(invalid(format!("unit type {} has no health", unit_type.name)));
            }
            if unit_type.speed < 0.0 || unit_type.range < 0.0 || unit_type.reload < 0 {
                return Err(invalid(format!(
                    "unit type {} has a negative speed, range or reload",
                    unit_type.name
                )));
            }
            known(&resources, unit_type.cost.keys(), "resource", &unit_type.name)?;
            known(&resources, unit_type.collect_rate.keys(), "resource", &unit_type.name)?;
            known(&type_names, unit_type.damage.keys(), "unit type", &unit_type.name)?;
            known(&type_names, unit_type.can_make.iter(), "unit type", &unit_type.name)?;
        }
        for (i, path) in self.paths.iter().enumerate() {
            if !players.contains(path.player.as_str()) {
                return Err(invalid(format!("path {} has unknown player {}", i, path.player)));
            }
            if path.units.is_empty() {
                return Err(invalid(format!("path {} has no units", i)));
            }
            let mut speeds = BTreeSet::new();
            for name in &path.units {
                let unit_type = types
                    .get(name.as_str())
                    .ok_or_else(|| invalid(format!("path {} has unknown unit type {}", i, name)))?;
                speeds.insert(fp::from_f64(unit_type.speed));
            }
            if speeds.len() > 1 {
                return Err(invalid(format!("path {} mixes unit speeds", i)));
            }
            let [x, y] = path.pos;
            if x < 0.0 || y < 0.0 || x > self.map_size || y > self.map_size {
                return Err(invalid(format!("path {} starts off the map", i)));
            }
        }
        Ok(())
    }

    /// Convert into the fixed-point snapshot used at runtime
    pub fn build(&self) -> Result<Scenario> {
        self.validate()?;
        let resource_index = |name: &str| self.resources.iter().position(|r| r == name);
        let player_index = |name: &str| self.players.iter().position(|p| p.name == name);
        let type_index = |name: &str| self.unit_types.iter().position(|t| t.name == name);
        let n_rsc = self.resources.len();
        let n_types = self.unit_types.len();

        let per_resource = |table: &BTreeMap<String, f64>| {
            let mut out = vec![0; n_rsc];
            for (name, value) in table {
                if let Some(i) = resource_index(name) {
                    out[i] = fp::from_f64(*value);
                }
            }
            out
        };

        let unit_types: Vec<UnitType> = self
            .unit_types
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let mut damage = vec![0; n_types];
                for (name, amount) in &t.damage {
                    if let Some(j) = type_index(name) {
                        damage[j] = *amount;
                    }
                }
                let mut can_make = vec![false; n_types];
                for name in &t.can_make {
                    if let Some(j) = type_index(name) {
                        can_make[j] = true;
                    }
                }
                UnitType {
                    id: UnitTypeId::new(i),
                    name: t.name.clone(),
                    max_health: t.max_health,
                    speed: fp::from_f64(t.speed),
                    reload: t.reload,
                    range: fp::from_f64(t.range),
                    tight_spacing: fp::from_f64(t.tight_spacing),
                    damage,
                    cost: per_resource(&t.cost),
                    collect_rate: per_resource(&t.collect_rate),
                    can_make,
                }
            })
            .collect();

        let n_players = self.players.len();
        let players = self
            .players
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let mut can_attack = vec![false; n_players];
                for name in &p.can_attack {
                    if let Some(j) = player_index(name) {
                        can_attack[j] = true;
                    }
                }
                Player::new(
                    PlayerId::new(i),
                    p.name.clone(),
                    p.is_user,
                    p.population_limit,
                    per_resource(&p.start_resources),
                    can_attack,
                )
            })
            .collect();

        let mut paths = Vec::with_capacity(self.paths.len());
        for path in &self.paths {
            let player = player_index(&path.player)
                .ok_or_else(|| invalid(format!("unknown player {}", path.player)))?;
            let units = path
                .units
                .iter()
                .map(|name| {
                    type_index(name)
                        .map(UnitTypeId::new)
                        .ok_or_else(|| invalid(format!("unknown unit type {}", name)))
                })
                .collect::<Result<Vec<_>>>()?;
            paths.push(InitialPath {
                player: PlayerId::new(player),
                units,
                pos: FpVector::from_f64(path.pos[0], path.pos[1]),
            });
        }

        let visibility_radius = fp::from_f64(self.visibility_radius);
        let max_speed = unit_types.iter().map(|t| t.speed).max().unwrap_or(0).max(1);
        let rules = Rules {
            map_size: fp::from_f64(self.map_size),
            update_interval: self.update_interval,
            visibility_radius,
            tile_vis_radius: fp::to_tile(visibility_radius),
            resource_names: self.resources.clone(),
            max_speed,
        };

        Ok(Scenario {
            rules,
            unit_types,
            players,
            paths,
        })
    }
}

fn invalid(message: impl Into<String>) -> SimError {
    SimError::Config(message.into())
}

fn unique_names<'a>(kind: &str, names: impl Iterator<Item = &'a String>) -> Result<()> {
    let mut seen = BTreeSet::new();
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(invalid(format!("duplicate {} name {}", kind, name)));
        }
    }
    Ok(())
}

fn known<'a>(
    names: &BTreeSet<&str>,
    mut refs: impl Iterator<Item = &'a String>,
    kind: &str,
    owner: &str,
) -> Result<()> {
    match refs.find(|r| !names.contains(r.as_str())) {
        Some(missing) => Err(invalid(format!(
            "{} refers to unknown {} {}",
            owner, kind, missing
        ))),
        None => Ok(()),
    }
}
