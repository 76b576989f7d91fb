//! Resolve a raw selection against the timeline
//!
//! A selection arriving over the wire may name paths the player does not own
//! or units that are no longer on a path; the resolver drops those so the
//! executor only ever sees units that exist where claimed.

use crate::command::Selection;
use crate::core::types::{PathId, PlayerId, Time, UnitId};
use crate::sim::Sim;

/// Selection filtered to the issuing player's units active at one time,
/// ordered by path id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedSelection {
    pub entries: Vec<(PathId, Vec<UnitId>)>,
}

impl ResolvedSelection {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = PathId> + '_ {
        self.entries.iter().map(|(p, _)| *p)
    }

    pub fn unit_count(&self) -> usize {
        self.entries.iter().map(|(_, u)| u.len()).sum()
    }
}

/// Resolves selections against one simulation state
pub struct SelectionResolver<'a> {
    sim: &'a Sim,
}

impl<'a> SelectionResolver<'a> {
    pub fn new(sim: &'a Sim) -> Self {
        Self { sim }
    }

    /// An empty unit list selects every unit on the path
    pub fn resolve(&self, player: PlayerId, selection: &Selection, time: Time) -> ResolvedSelection {
        let sim = self.sim;
        let mut entries: Vec<(PathId, Vec<UnitId>)> = Vec::new();
        for (path_id, wanted) in selection {
            let Some(path) = sim.timeline.path(*path_id) else {
                continue;
            };
            if path.player != player {
                continue;
            }
            let Some(segment) = sim.timeline.active_segment(*path_id, time) else {
                continue;
            };
            let members = &sim.timeline.segment(segment).units;
            let units: Vec<UnitId> = members
                .iter()
                .copied()
                .filter(|u| wanted.is_empty() || wanted.contains(u))
                .collect();
            if units.is_empty() {
                continue;
            }
            match entries.iter_mut().find(|(p, _)| p == path_id) {
                Some((_, existing)) => {
                    for u in units {
                        if !existing.contains(&u) {
                            existing.push(u);
                        }
                    }
                }
                None => entries.push((*path_id, units)),
            }
        }
        entries.sort_by_key(|(p, _)| *p);
        ResolvedSelection { entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::select;
    use crate::core::config::ScenarioConfig;

    const TWO_SIDES: &str = r#"
        map_size = 16.0
        update_interval = 100
        visibility_radius = 2.0

        [[players]]
        name = "Red"

        [[players]]
        name = "Blue"

        [[unit_types]]
        name = "scout"
        max_health = 1
        speed = 0.004

        [[paths]]
        player = "Red"
        units = ["scout", "scout"]
        pos = [2.0, 2.0]

        [[paths]]
        player = "Blue"
        units = ["scout"]
        pos = [12.0, 12.0]
    "#;

    #[test]
    fn test_foreign_and_missing_entries_dropped() {
        let config = ScenarioConfig::from_toml_str(TWO_SIDES).unwrap();
        let sim = Sim::new(&config).unwrap();
        let selection = select([
            (PathId(1), vec![]),
            (PathId(0), vec![UnitId(1), UnitId(2)]),
            (PathId(9), vec![]),
        ]);
        let resolved = SelectionResolver::new(&sim).resolve(PlayerId(0), &selection, 0);
        assert_eq!(resolved.entries, vec![(PathId(0), vec![UnitId(1)])]);
    }

    #[test]
    fn test_empty_unit_list_selects_whole_path() {
        let config = ScenarioConfig::from_toml_str(TWO_SIDES).unwrap();
        let sim = Sim::new(&config).unwrap();
        let resolved = SelectionResolver::new(&sim).resolve(PlayerId(0), &select([(PathId(0), vec![])]), 0);
        assert_eq!(resolved.unit_count(), 2);
    }
}
