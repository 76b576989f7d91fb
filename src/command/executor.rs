//! Command execution - applies a command's edits to the timeline

use crate::command::resolver::{ResolvedSelection, SelectionResolver};
use crate::command::{Command, CommandKind};
use crate::core::error::{Rejection, SimError};
use crate::core::fp::{self, FpVector};
use crate::core::types::{PathId, Time, UnitTypeId};
use crate::sim::Sim;
use crate::timeline::formation::{self, Formation};
use crate::timeline::SegmentUnit;

/// Applies commands to a simulation
pub struct CommandExecutor;

/// Result of executing a command
#[derive(Debug)]
pub enum ExecutionResult {
    /// The command changed the timeline; lists the paths it touched
    Applied { paths: Vec<PathId> },
    /// Illegal edit; nothing changed
    Rejected(Rejection),
    /// Internal failure
    Failed(SimError),
}

impl From<SimError> for ExecutionResult {
    fn from(err: SimError) -> Self {
        match err {
            SimError::Rejected(reason) => ExecutionResult::Rejected(reason),
            other => ExecutionResult::Failed(other),
        }
    }
}

impl CommandExecutor {
    /// Execute a command at the current simulation time
    pub fn execute(sim: &mut Sim, cmd: &Command) -> ExecutionResult {
        let time = cmd.time_cmd.min(sim.time_sim);
        let resolved = match cmd.kind.selection() {
            Some(selection) => {
                let resolved = SelectionResolver::new(sim).resolve(cmd.player, selection, time);
                if resolved.is_empty() {
                    return ExecutionResult::Rejected(Rejection::EmptySelection);
                }
                resolved
            }
            None => ResolvedSelection::default(),
        };

        match &cmd.kind {
            CommandKind::Move { pos, formation, .. } => {
                move_selection(sim, &resolved, time, *pos, *formation)
            }
            CommandKind::MakeUnit { unit_type, pos, .. } => {
                make_unit(sim, &resolved, time, *unit_type, *pos)
            }
            CommandKind::MakePath { pos, .. } => make_paths(sim, &resolved, time, *pos),
            CommandKind::DeletePath { .. } => delete_paths(sim, &resolved, time),
            CommandKind::DeleteOtherPaths { .. } => {
                let units = segment_units(sim, &resolved, time);
                if sim.delete_other_paths(&units) {
                    ExecutionResult::Applied {
                        paths: resolved.paths().collect(),
                    }
                } else {
                    ExecutionResult::Rejected(Rejection::Observed(units[0].unit))
                }
            }
            CommandKind::Stack { .. } => {
                let paths: Vec<PathId> = resolved.paths().collect();
                if paths.len() < 2 {
                    return ExecutionResult::Rejected(Rejection::StackNotAllowed);
                }
                sim.add_stack_events(&paths);
                ExecutionResult::Applied { paths }
            }
            CommandKind::GoLive => {
                sim.players[cmd.player.index()].time_go_live_failed_attempt = None;
                let now = sim.time_sim;
                sim.reconcile(cmd.player, now);
                ExecutionResult::Applied { paths: Vec::new() }
            }
        }
    }
}

/// Distance between formation members
fn formation_spacing(sim: &Sim, resolved: &ResolvedSelection, formation: Formation) -> i64 {
    let vis = sim.rules.visibility_radius;
    match formation {
        Formation::Tight => resolved
            .entries
            .iter()
            .flat_map(|(_, units)| units.iter())
            .map(|&u| sim.unit_type_of(u).tight_spacing)
            .max()
            .unwrap_or(0),
        Formation::Loose => (fp::mul(vis, fp::SQRT2) >> fp::PRECISION) << fp::PRECISION,
        Formation::Ring => ((((vis * 2) >> fp::PRECISION) - 1) << fp::PRECISION).max(fp::ONE),
    }
}

fn move_selection(
    sim: &mut Sim,
    resolved: &ResolvedSelection,
    time: Time,
    pos: FpVector,
    formation: Formation,
) -> ExecutionResult {
    let movable: Vec<&(PathId, Vec<_>)> = resolved
        .entries
        .iter()
        .filter(|(path, _)| sim.can_move(*path, time))
        .collect();
    if movable.is_empty() {
        return ExecutionResult::Rejected(Rejection::CannotMove);
    }
    let spacing = formation_spacing(sim, resolved, formation);
    let goals = formation::layout(formation, pos, movable.len(), spacing, sim.rules.map_size);

    let mut moved = Vec::new();
    let mut last_rejection = None;
    for ((path, units), goal) in movable.into_iter().zip(goals) {
        match sim.move_units(*path, time, units, goal) {
            Ok(p) => moved.push(p),
            Err(SimError::Rejected(reason)) => last_rejection = Some(reason),
            Err(err) => return ExecutionResult::Failed(err),
        }
    }
    applied_or(moved, last_rejection)
}

fn make_unit(
    sim: &mut Sim,
    resolved: &ResolvedSelection,
    time: Time,
    unit_type: UnitTypeId,
    pos: Option<FpVector>,
) -> ExecutionResult {
    if unit_type.index() >= sim.unit_types.len() {
        return ExecutionResult::Rejected(Rejection::CannotMakeType(unit_type));
    }
    let mut last_rejection = Rejection::CannotMakeType(unit_type);
    for path in resolved.paths() {
        if !sim.can_make_unit_type(path, time, unit_type) {
            continue;
        }
        let player = sim.timeline.paths[path.index()].player;
        let unit = sim.push_unit(unit_type, player);
        match sim.make_path(path, time, &[unit]) {
            Ok(made) => {
                if let Some(pos) = pos {
                    if let Err(err) = sim.move_to(made, time, pos) {
                        return err.into();
                    }
                }
                tracing::debug!(%path, %unit, %made, time, "unit made");
                return ExecutionResult::Applied { paths: vec![made] };
            }
            Err(SimError::Rejected(reason)) => {
                sim.units.pop();
                last_rejection = reason;
            }
            Err(err) => {
                sim.units.pop();
                return ExecutionResult::Failed(err);
            }
        }
    }
    ExecutionResult::Rejected(last_rejection)
}

fn make_paths(
    sim: &mut Sim,
    resolved: &ResolvedSelection,
    time: Time,
    pos: Option<FpVector>,
) -> ExecutionResult {
    let mut made = Vec::new();
    let mut last_rejection = None;
    for (path, units) in &resolved.entries {
        let new_path = match sim.make_path(*path, time, units) {
            Ok(p) => p,
            Err(SimError::Rejected(reason)) => {
                last_rejection = Some(reason);
                continue;
            }
            Err(err) => return ExecutionResult::Failed(err),
        };
        sim.remove_units_from(*path, new_path, time, units);
        if let Some(pos) = pos {
            if let Err(err) = sim.move_to(new_path, time, pos) {
                return err.into();
            }
        }
        made.push(new_path);
    }
    applied_or(made, last_rejection)
}

fn delete_paths(sim: &mut Sim, resolved: &ResolvedSelection, time: Time) -> ExecutionResult {
    let mut touched = Vec::new();
    let mut refused = None;
    for (path, units) in &resolved.entries {
        let Some(segment) = sim.timeline.insert_segment(*path, time) else {
            continue;
        };
        let mut any = false;
        for &unit in units {
            if SegmentUnit::new(segment, unit).delete(sim) {
                any = true;
            } else {
                refused = Some(Rejection::Observed(unit));
            }
        }
        if any {
            touched.push(*path);
        }
    }
    applied_or(touched, refused)
}

fn segment_units(sim: &Sim, resolved: &ResolvedSelection, time: Time) -> Vec<SegmentUnit> {
    let mut out = Vec::new();
    for (path, units) in &resolved.entries {
        if let Some(segment) = sim.timeline.active_segment(*path, time) {
            out.extend(units.iter().map(|&u| SegmentUnit::new(segment, u)));
        }
    }
    out
}

fn applied_or(paths: Vec<PathId>, rejection: Option<Rejection>) -> ExecutionResult {
    match (paths.is_empty(), rejection) {
        (true, Some(reason)) => ExecutionResult::Rejected(reason),
        (true, None) => ExecutionResult::Rejected(Rejection::EmptySelection),
        (false, _) => ExecutionResult::Applied { paths },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::select;
    use crate::core::config::ScenarioConfig;
    use crate::core::types::{PlayerId, UnitId};

    const SOLO: &str = r#"
        map_size = 32.0
        update_interval = 100
        visibility_radius = 3.0
        resources = ["gold"]

        [[players]]
        name = "Red"
        start_resources = { gold = 5.0 }

        [[unit_types]]
        name = "worker"
        max_health = 1
        speed = 0.002
        cost = { gold = 2.0 }
        can_make = ["worker"]

        [[paths]]
        player = "Red"
        units = ["worker", "worker"]
        pos = [8.0, 8.0]
    "#;

    fn sim() -> Sim {
        let mut sim = Sim::new(&ScenarioConfig::from_toml_str(SOLO).unwrap()).unwrap();
        sim.advance(100).unwrap();
        sim
    }

    #[test]
    fn test_move_whole_path_in_present() {
        let mut sim = sim();
        let goal = FpVector::new(fp::from_int(12), fp::from_int(8));
        let cmd = Command::now(
            PlayerId(0),
            100,
            CommandKind::Move {
                paths: select([(PathId(0), vec![])]),
                pos: goal,
                formation: Formation::Tight,
            },
        );
        let result = CommandExecutor::execute(&mut sim, &cmd);
        assert!(matches!(result, ExecutionResult::Applied { ref paths } if paths == &[PathId(0)]));
        let end = sim.timeline.paths[0].moves.last().unwrap().end;
        assert_eq!(end, goal);
    }

    #[test]
    fn test_make_unit_spends_resources() {
        let mut sim = sim();
        let cmd = Command::now(
            PlayerId(0),
            100,
            CommandKind::MakeUnit {
                paths: select([(PathId(0), vec![])]),
                unit_type: UnitTypeId(0),
                pos: None,
            },
        );
        let result = CommandExecutor::execute(&mut sim, &cmd);
        assert!(matches!(result, ExecutionResult::Applied { .. }));
        assert_eq!(sim.units.len(), 3);
        assert_eq!(sim.resource(PlayerId(0), 100, 0, false), fp::from_int(3));
    }

    #[test]
    fn test_make_unit_without_funds_rejected() {
        let mut sim = sim();
        for _ in 0..2 {
            let cmd = Command::now(
                PlayerId(0),
                100,
                CommandKind::MakeUnit {
                    paths: select([(PathId(0), vec![])]),
                    unit_type: UnitTypeId(0),
                    pos: None,
                },
            );
            assert!(matches!(
                CommandExecutor::execute(&mut sim, &cmd),
                ExecutionResult::Applied { .. }
            ));
        }
        let cmd = Command::now(
            PlayerId(0),
            100,
            CommandKind::MakeUnit {
                paths: select([(PathId(0), vec![])]),
                unit_type: UnitTypeId(0),
                pos: None,
            },
        );
        let result = CommandExecutor::execute(&mut sim, &cmd);
        assert!(matches!(
            result,
            ExecutionResult::Rejected(Rejection::InsufficientResources)
        ));
        assert_eq!(sim.units.len(), 4);
    }

    #[test]
    fn test_make_path_needs_unambiguous_parent() {
        let mut sim = sim();
        let cmd = Command::at(
            PlayerId(0),
            100,
            0,
            CommandKind::MakePath {
                paths: select([(PathId(0), vec![UnitId(0)])]),
                pos: None,
            },
        );
        let result = CommandExecutor::execute(&mut sim, &cmd);
        assert!(matches!(
            result,
            ExecutionResult::Rejected(Rejection::AmbiguousParent(UnitId(0)))
        ));
    }

    #[test]
    fn test_empty_selection_rejected() {
        let mut sim = sim();
        let cmd = Command::now(
            PlayerId(0),
            100,
            CommandKind::DeletePath {
                paths: select([(PathId(5), vec![])]),
            },
        );
        assert!(matches!(
            CommandExecutor::execute(&mut sim, &cmd),
            ExecutionResult::Rejected(Rejection::EmptySelection)
        ));
    }

    #[test]
    fn test_stack_merges_colocated_paths() {
        let mut sim = sim();
        let made = CommandExecutor::execute(
            &mut sim,
            &Command::now(
                PlayerId(0),
                100,
                CommandKind::MakeUnit {
                    paths: select([(PathId(0), vec![])]),
                    unit_type: UnitTypeId(0),
                    pos: None,
                },
            ),
        );
        assert!(matches!(made, ExecutionResult::Applied { ref paths } if paths == &[PathId(1)]));

        let lone = Command::now(
            PlayerId(0),
            100,
            CommandKind::Stack {
                paths: select([(PathId(0), vec![])]),
            },
        );
        assert!(matches!(
            CommandExecutor::execute(&mut sim, &lone),
            ExecutionResult::Rejected(Rejection::StackNotAllowed)
        ));

        let both = Command::now(
            PlayerId(0),
            100,
            CommandKind::Stack {
                paths: select([(PathId(0), vec![]), (PathId(1), vec![])]),
            },
        );
        assert!(matches!(
            CommandExecutor::execute(&mut sim, &both),
            ExecutionResult::Applied { .. }
        ));
        sim.advance(300).unwrap();
        assert_eq!(sim.path_units_at(PathId(0), 300).unwrap().len(), 3);
        assert!(sim.path_units_at(PathId(1), 300).unwrap().is_empty());
    }

    #[test]
    fn test_delete_other_paths_without_alternatives() {
        let mut sim = sim();
        let cmd = Command::now(
            PlayerId(0),
            100,
            CommandKind::DeleteOtherPaths {
                paths: select([(PathId(0), vec![])]),
            },
        );
        assert!(matches!(
            CommandExecutor::execute(&mut sim, &cmd),
            ExecutionResult::Applied { .. }
        ));
        assert_eq!(sim.path_units_at(PathId(0), 100).unwrap().len(), 2);
    }
}
