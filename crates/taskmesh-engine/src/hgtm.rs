//! HGTM: hierarchical group task migration.
//!
//! The master strategy composes six phases in fixed order: leader
//! election with backups and replacement, contextual loads, potential
//! fields, bag formation over the faulted agents, receiver preparation
//! through a nested MPFTM shedding pass, and the grouped migration
//! itself.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use tracing::debug;

use taskmesh_core::survival::sig;
use taskmesh_core::{AgentId, DistanceOracle, Graph, MigrationRecord, World};

use crate::mpftm::Mpftm;
use crate::{leaders, EngineResult, MigrationStrategy, StrategyParams};

/// Hierarchical group task migration strategy.
#[derive(Debug, Clone, Copy)]
pub struct Hgtm {
    params: StrategyParams,
}

/// A set of co-migrating faulted agents and the neighbor their tasks will
/// be routed to.
type TargetedBag = (Vec<AgentId>, Option<AgentId>);

impl Hgtm {
    /// Creates the strategy with the given parameters.
    #[must_use]
    pub fn new(params: StrategyParams) -> Self {
        Self { params }
    }

    // -----------------------------------------------------------------
    // Phase 6a: bag formation
    // -----------------------------------------------------------------

    /// Forms migration bags: one singleton per faulted agent in a led
    /// group, then greedy pop-and-reinsert merging while a merge beats
    /// the sum of its parts.
    fn form_bags(&self, world: &World, graph: &Graph) -> Vec<TargetedBag> {
        let mut heap: BinaryHeap<BagEntry> = BinaryHeap::new();
        for id in world.faulted_agents() {
            let group = &world.groups[&world.agents[&id].group_id];
            if group.leader.is_none() {
                continue; // leaderless groups contribute no migrations
            }
            heap.push(BagEntry::new(world, vec![id]));
        }

        let mut finalized: Vec<TargetedBag> = Vec::new();
        while let Some(entry) = heap.pop() {
            let bag_m = entry.members;
            let (ben_m, target_m) = self.ben_intra(world, graph, &bag_m);

            let mut rest: Vec<BagEntry> = Vec::new();
            while let Some(other) = heap.pop() {
                rest.push(other);
            }

            let mut accepted: Option<(usize, Vec<AgentId>)> = None;
            for (i, other) in rest.iter().enumerate() {
                let mut union = other.members.clone();
                union.extend(bag_m.iter().copied());
                let (ben_union, _) = self.ben_intra(world, graph, &union);
                let (ben_n, _) = self.ben_intra(world, graph, &other.members);
                if ben_union > ben_m + ben_n {
                    accepted = Some((i, union));
                    break;
                }
            }

            match accepted {
                Some((i, union)) => {
                    rest.remove(i);
                    heap.push(BagEntry::new(world, union));
                    heap.extend(rest);
                }
                None => {
                    finalized.push((bag_m, target_m));
                    heap.extend(rest);
                }
            }
        }
        finalized
    }

    /// Best-neighbor benefit of migrating the whole bag, and its argmax
    /// neighbor. Candidates are the non-faulted same-group graph
    /// neighbors of the bag members, visited in ascending id order.
    fn ben_intra(
        &self,
        world: &World,
        graph: &Graph,
        bag: &[AgentId],
    ) -> (f64, Option<AgentId>) {
        let mut candidates: BTreeSet<AgentId> = BTreeSet::new();
        for &member in bag {
            let member_group = world.agents[&member].group_id;
            for &(neighbor_id, _) in graph.neighbors(member) {
                let Some(neighbor) = world.agents.get(&neighbor_id) else {
                    continue;
                };
                if neighbor.fault_functional || neighbor.group_id != member_group {
                    continue;
                }
                candidates.insert(neighbor_id);
            }
        }

        let mut best = f64::NEG_INFINITY;
        let mut target = None;
        for candidate in candidates {
            let ben = self.ben_for_neighbor(world, graph, bag, candidate);
            if ben > best {
                best = ben;
                target = Some(candidate);
            }
        }
        (best, target)
    }

    /// The benefit of handing the bag to one specific neighbor: completion
    /// probability against congestion-and-distance cost increase.
    fn ben_for_neighbor(
        &self,
        world: &World,
        graph: &Graph,
        bag: &[AgentId],
        neighbor_id: AgentId,
    ) -> f64 {
        let neighbor = &world.agents[&neighbor_id];
        let interaction_level = world.groups[&neighbor.group_id].interaction_level;

        let mut congestion = 0.0;
        let mut mean_ratio = 0.0;
        let mut count = 0usize;
        for &(peer_id, weight) in graph.neighbors(neighbor_id) {
            let Some(peer) = world.agents.get(&peer_id) else {
                continue;
            };
            if peer.group_id != neighbor.group_id {
                continue;
            }
            congestion += weight * peer.tasks.len() as f64;
            mean_ratio += peer.load_ratio();
            count += 1;
        }
        if count > 0 {
            congestion /= count as f64;
            mean_ratio /= count as f64;
        }

        let load_in_bag: f64 = bag.iter().map(|id| world.agents[id].load).sum();
        congestion += load_in_bag;
        for &member in bag {
            if let Some(weight) = graph.edge_weight(member, neighbor_id) {
                congestion += weight;
            }
        }

        let cost_increase = if mean_ratio > 0.0 {
            congestion / mean_ratio
        } else {
            0.0
        };
        let complete = 1.0 - (sig(load_in_bag) * interaction_level).max(0.5);
        self.params.target.survival * complete - self.params.target.cost * cost_increase
    }

    // -----------------------------------------------------------------
    // Phase 6b: receiver preparation and migration
    // -----------------------------------------------------------------

    /// Marks receiving agents, runs the MPFTM shedding pass under swapped
    /// fault flags, restores the receivers, then routes every bag to its
    /// target.
    fn migrate_bags(
        &self,
        world: &mut World,
        oracle: &DistanceOracle,
        bags: &[TargetedBag],
    ) -> EngineResult<Vec<MigrationRecord>> {
        // Receiver test: enough headroom relative to the incoming bag.
        let mut receivers: Vec<AgentId> = Vec::new();
        for (bag, target) in bags {
            let Some(target) = *target else { continue };
            let incoming: usize = bag.iter().map(|id| world.agents[id].tasks.len()).sum();
            let queued = world.agents[&target].tasks.len();
            let rl = world.groups[&world.agents[&target].group_id].interaction_level;
            if incoming as f64 * (1.0 - rl) * 2.0 > queued as f64 {
                receivers.push(target);
            }
        }
        receivers.sort_unstable();
        receivers.dedup();
        debug!(
            bags = bags.len(),
            receivers = receivers.len(),
            "bags formed, receivers prepared"
        );

        // Swap fault flags: sources step aside, receivers shed.
        let sources = world.faulted_agents();
        for &source in &sources {
            if let Some(agent) = world.agents.get_mut(&source) {
                agent.fault_functional = false;
                agent.fault_overload = 1.0;
            }
        }
        let mut saved: BTreeMap<AgentId, f64> = BTreeMap::new();
        for &receiver in &receivers {
            if let Some(agent) = world.agents.get_mut(&receiver) {
                saved.insert(receiver, agent.fault_overload);
                agent.fault_functional = true;
                agent.fault_overload = 0.0;
            }
        }

        let mut records = Mpftm::new(self.params).migrate(world, oracle)?;

        for &receiver in &receivers {
            if let Some(agent) = world.agents.get_mut(&receiver) {
                agent.fault_functional = false;
                if let Some(&overload) = saved.get(&receiver) {
                    agent.fault_overload = overload;
                }
            }
        }

        // Route every bag to its target, one record per task.
        for (bag, target) in bags {
            let Some(target) = *target else { continue };
            for &member in bag {
                while !world.agents[&member].tasks.is_empty() {
                    let record = world.transfer_task(member, target, 0)?;
                    records.push(record);
                }
            }
        }
        Ok(records)
    }
}

impl MigrationStrategy for Hgtm {
    fn name(&self) -> &'static str {
        "hgtm"
    }

    fn run(
        &self,
        world: &mut World,
        oracle: &DistanceOracle,
    ) -> EngineResult<Vec<MigrationRecord>> {
        leaders::elect_leaders(world, oracle.graph());
        let bags = self.form_bags(world, oracle.graph());
        self.migrate_bags(world, oracle, &bags)
    }
}

/// Max-heap entry keyed by the bag's total task count, ties broken toward
/// the smallest member id.
#[derive(Debug, Clone)]
struct BagEntry {
    tasks: usize,
    min_id: AgentId,
    members: Vec<AgentId>,
}

impl BagEntry {
    fn new(world: &World, members: Vec<AgentId>) -> Self {
        let tasks = members.iter().map(|id| world.agents[id].tasks.len()).sum();
        let min_id = members.iter().copied().min().unwrap_or_default();
        Self {
            tasks,
            min_id,
            members,
        }
    }
}

impl PartialEq for BagEntry {
    fn eq(&self, other: &Self) -> bool {
        self.tasks == other.tasks && self.min_id == other.min_id
    }
}

impl Eq for BagEntry {}

impl Ord for BagEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.tasks
            .cmp(&other.tasks)
            .then_with(|| other.min_id.cmp(&self.min_id))
    }
}

impl PartialOrd for BagEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskmesh_core::{Agent, GroupId, Task, TaskId, ARRIVE_AT_START};

    fn id(v: u32) -> AgentId {
        AgentId::new(v)
    }

    fn fully_connected_world(n: u32, faulted: &[u32]) -> (World, DistanceOracle) {
        let agents: Vec<Agent> = (0..n)
            .map(|i| {
                let mut agent = Agent::new(id(i), 10.0, GroupId::new(0));
                agent.fault_functional = faulted.contains(&i);
                agent
            })
            .collect();
        let mut world = World::from_inputs(Vec::new(), agents).expect("world");
        for group in world.groups.values_mut() {
            group.interaction_level = 0.1;
        }
        let mut graph = Graph::new();
        for u in 0..n {
            for v in (u + 1)..n {
                graph.add_edge(id(u), id(v), 1.0);
            }
        }
        (world, DistanceOracle::new(graph))
    }

    #[test]
    fn singleton_bag_routes_all_tasks_to_best_neighbor() {
        let (mut world, oracle) = fully_connected_world(3, &[0]);
        world.place_task(id(0), Task::new(TaskId::new(0), 4.0, ARRIVE_AT_START));
        world.place_task(id(0), Task::new(TaskId::new(1), 2.0, ARRIVE_AT_START));

        let records = Hgtm::new(StrategyParams::default())
            .run(&mut world, &oracle)
            .expect("run");

        assert!(world.agents[&id(0)].tasks.is_empty());
        // Equal benefit for agents 1 and 2; the smaller id receives.
        let bag_moves: Vec<_> = records
            .iter()
            .filter(|r| r.from == id(0))
            .collect();
        assert_eq!(bag_moves.len(), 2);
        assert!(bag_moves.iter().all(|r| r.to == id(1)));
    }

    #[test]
    fn leaderless_group_contributes_no_migrations() {
        let (mut world, oracle) = fully_connected_world(2, &[0, 1]);
        world.place_task(id(0), Task::new(TaskId::new(0), 4.0, ARRIVE_AT_START));

        let records = Hgtm::new(StrategyParams::default())
            .run(&mut world, &oracle)
            .expect("run");

        assert!(records.is_empty());
        assert_eq!(world.agents[&id(0)].tasks.len(), 1);
    }

    #[test]
    fn bag_merge_requires_superadditive_benefit() {
        let (world, oracle) = fully_connected_world(4, &[0, 2]);
        let hgtm = Hgtm::new(StrategyParams::default());
        let bags = hgtm.form_bags(&world, oracle.graph());

        // Benefit here is dominated by the shared cost term, so merging
        // never beats the sum of the singletons: both bags stay alone.
        assert_eq!(bags.len(), 2);
        for (bag, target) in &bags {
            assert_eq!(bag.len(), 1);
            assert!(target.is_some());
        }
    }

    #[test]
    fn task_count_conserved_across_run() {
        let (mut world, oracle) = fully_connected_world(5, &[1, 3]);
        for i in 0..6 {
            world.place_task(
                id(i % 5),
                Task::new(TaskId::new(i), f64::from(i + 1), ARRIVE_AT_START),
            );
        }
        let total_before = world.total_load();
        let count_before = world.placed_task_count();

        Hgtm::new(StrategyParams::default())
            .run(&mut world, &oracle)
            .expect("run");

        assert!((world.total_load() - total_before).abs() < 1e-9);
        assert_eq!(world.placed_task_count(), count_before);
    }
}
