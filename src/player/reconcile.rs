//! Going live: folding a player's time-traveling paths back into history

use std::collections::VecDeque;

use crate::core::types::{PathId, PlayerId, Time};
use crate::sim::Sim;
use crate::timeline::SegmentUnit;

impl Sim {
    /// Verify the player's non-live paths up to `cur_time`, then try to make
    /// them live
    pub fn reconcile(&mut self, player: PlayerId, cur_time: Time) {
        if !self.players[player.index()].has_non_live_paths {
            return;
        }
        for path in self.non_live_paths(player) {
            self.update_past(path, cur_time);
        }

        let retry_at = self.players[player.index()]
            .time_go_live_failed_attempt
            .map_or(Time::MIN, |t| t.saturating_add(self.rules.update_interval));
        if cur_time < self.time_sim || self.time_sim < retry_at {
            return;
        }

        let non_live = self.non_live_paths(player);
        let travel_start = non_live.iter().map(|&p| self.first_segment_time(p)).min();
        if let Some(start) = travel_start {
            let problem = self
                .check_negative_resources_since(player, start, true)
                .or_else(|| self.check_population_since(player, start));
            if let Some(problem) = problem {
                let p = &mut self.players[player.index()];
                p.time_go_live_failed_attempt = Some(self.time_sim);
                p.time_go_live_problem = Some(problem);
                tracing::warn!(%player, problem, time = self.time_sim, "go live rejected");
                return;
            }
            for path in non_live {
                if !self.timeline.paths[path.index()].is_live() {
                    self.promote(path);
                }
            }
        }

        let stacks = {
            let p = &mut self.players[player.index()];
            p.has_non_live_paths = false;
            p.time_go_live_failed_attempt = None;
            p.time_go_live_problem = None;
            std::mem::take(&mut p.go_live_stack_paths)
        };
        if !stacks.is_empty() {
            let paths: Vec<PathId> = stacks.into_iter().collect();
            self.add_stack_events(&paths);
        }
    }

    fn non_live_paths(&self, player: PlayerId) -> Vec<PathId> {
        self.timeline
            .paths
            .iter()
            .filter(|p| p.player == player && !p.is_live())
            .map(|p| p.id)
            .collect()
    }

    /// Make `path` live along with every non-live path it continues from or
    /// was produced by, then drop the alternatives it replaces
    fn promote(&mut self, path: PathId) {
        self.go_live(path);
        let mut queue: VecDeque<SegmentUnit> = self.timeline.paths[path.index()]
            .segments
            .clone()
            .into_iter()
            .flat_map(|s| self.timeline.segment_units(s))
            .collect();
        let mut non_live_child = None;

        while let Some(su) = queue.pop_front() {
            let mut origins = su.prev(self);
            origins.extend(su.parents(self));
            for origin in origins {
                let origin_path = self.timeline.segment(origin.segment).path;
                if !self.timeline.paths[origin_path.index()].is_live() {
                    self.go_live(origin_path);
                    queue.push_back(origin);
                }
            }
            if non_live_child.is_none() && !su.children(self).is_empty() {
                non_live_child = Some(su);
            }
        }
        tracing::info!(%path, time = self.time_sim, "path went live");

        if let Some(child) = non_live_child {
            if !self.delete_other_paths(&[child]) {
                tracing::debug!(%path, "alternatives of producing unit kept");
            }
        }
        let first = self.timeline.paths[path.index()].segments[0];
        let arrivals = self.timeline.segment_units(first);
        if !self.delete_other_paths(&arrivals) {
            tracing::debug!(%path, "alternatives of promoted units kept");
        }
    }
}
