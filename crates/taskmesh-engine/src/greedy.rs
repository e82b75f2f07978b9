//! GBMA and MMLMA: single-pass greedy migration per group.
//!
//! Both walk the faulted agents in ascending id order and try to hand
//! over each task to a non-faulted member of the same group, refusing any
//! destination the task would overload. GBMA picks the closest candidate
//! by shortest-path weight; MMLMA the one with the most remaining
//! capacity and does not consult the graph at all, so it may legally
//! select an unreachable destination (diagnosed by the evaluator).

use tracing::debug;

use taskmesh_core::{AgentId, DistanceOracle, MigrationRecord, World};

use crate::{EngineResult, MigrationStrategy};

/// Greedy shortest-path migration.
#[derive(Debug, Clone, Copy, Default)]
pub struct Gbma;

impl Gbma {
    /// Creates the strategy.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl MigrationStrategy for Gbma {
    fn name(&self) -> &'static str {
        "gbma"
    }

    fn run(
        &self,
        world: &mut World,
        oracle: &DistanceOracle,
    ) -> EngineResult<Vec<MigrationRecord>> {
        let records = greedy_migrate(world, |world, source, task_size| {
            let mut best: Option<(AgentId, f64)> = None;
            for candidate in eligible_members(world, source, task_size) {
                let distance = oracle.distance(source, candidate);
                if !distance.is_finite() {
                    continue;
                }
                let better = match best {
                    Some((_, best_distance)) => distance < best_distance,
                    None => true,
                };
                if better {
                    best = Some((candidate, distance));
                }
            }
            best.map(|(id, _)| id)
        })?;
        debug!(migrations = records.len(), "shortest-path pass done");
        Ok(records)
    }
}

/// Greedy max-remaining-capacity migration.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mmlma;

impl Mmlma {
    /// Creates the strategy.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl MigrationStrategy for Mmlma {
    fn name(&self) -> &'static str {
        "mmlma"
    }

    fn run(
        &self,
        world: &mut World,
        _oracle: &DistanceOracle,
    ) -> EngineResult<Vec<MigrationRecord>> {
        let records = greedy_migrate(world, |world, source, task_size| {
            let mut best: Option<(AgentId, f64)> = None;
            for candidate in eligible_members(world, source, task_size) {
                let headroom = world.agents[&candidate].headroom();
                let better = match best {
                    Some((_, best_headroom)) => headroom > best_headroom,
                    None => true,
                };
                if better {
                    best = Some((candidate, headroom));
                }
            }
            best.map(|(id, _)| id)
        })?;
        debug!(migrations = records.len(), "max-headroom pass done");
        Ok(records)
    }
}

/// Shared per-task loop: for every faulted agent, offer each task to the
/// destination picked by `select`; a task without a destination stays.
fn greedy_migrate(
    world: &mut World,
    select: impl Fn(&World, AgentId, f64) -> Option<AgentId>,
) -> EngineResult<Vec<MigrationRecord>> {
    let mut records = Vec::new();
    for source in world.faulted_agents() {
        let mut index = 0;
        while index < world.agents[&source].tasks.len() {
            let task_size = world.agents[&source].tasks[index].size;
            match select(world, source, task_size) {
                Some(destination) => {
                    records.push(world.transfer_task(source, destination, index)?);
                    // The next task slid into this index.
                }
                None => index += 1,
            }
        }
    }
    Ok(records)
}

/// Same-group, non-faulted members with room for the task, ascending id.
/// Candidates the task would overload are refused here.
fn eligible_members(
    world: &World,
    source: AgentId,
    task_size: f64,
) -> impl Iterator<Item = AgentId> + '_ {
    let group_id = world.agents[&source].group_id;
    world.groups[&group_id]
        .members
        .iter()
        .copied()
        .filter(move |&id| {
            if id == source {
                return false;
            }
            let agent = &world.agents[&id];
            !agent.fault_functional && agent.load + task_size <= agent.capacity
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskmesh_core::{Agent, Graph, GroupId, Task, TaskId, ARRIVE_AT_START};

    fn id(v: u32) -> AgentId {
        AgentId::new(v)
    }

    fn world_with(agents: Vec<Agent>) -> World {
        World::from_inputs(Vec::new(), agents).expect("world")
    }

    fn task(idx: u32, size: f64) -> Task {
        Task::new(TaskId::new(idx), size, ARRIVE_AT_START)
    }

    #[test]
    fn gbma_picks_nearest_candidate() {
        let mut source = Agent::new(id(0), 10.0, GroupId::new(0));
        source.fault_functional = true;
        let mut world = world_with(vec![
            source,
            Agent::new(id(1), 10.0, GroupId::new(0)),
            Agent::new(id(2), 10.0, GroupId::new(0)),
        ]);
        world.place_task(id(0), task(0, 3.0));

        // Agent 2 is nearer than agent 1.
        let mut graph = Graph::new();
        graph.add_edge(id(0), id(1), 5.0);
        graph.add_edge(id(0), id(2), 1.0);
        let oracle = DistanceOracle::new(graph);

        let records = Gbma::new().run(&mut world, &oracle).expect("run");
        assert_eq!(records, vec![MigrationRecord::new(id(0), id(2))]);
    }

    #[test]
    fn mmlma_picks_largest_headroom() {
        let mut source = Agent::new(id(0), 10.0, GroupId::new(0));
        source.fault_functional = true;
        let mut world = world_with(vec![
            source,
            Agent::new(id(1), 6.0, GroupId::new(0)),
            Agent::new(id(2), 20.0, GroupId::new(0)),
        ]);
        world.place_task(id(0), task(0, 3.0));

        let oracle = DistanceOracle::new(Graph::new());
        let records = Mmlma::new().run(&mut world, &oracle).expect("run");
        assert_eq!(records, vec![MigrationRecord::new(id(0), id(2))]);
    }

    #[test]
    fn overflow_candidates_are_refused() {
        let mut source = Agent::new(id(0), 10.0, GroupId::new(0));
        source.fault_functional = true;
        let mut tight = Agent::new(id(1), 3.0, GroupId::new(0));
        tight.push_task(task(9, 2.0));
        let mut world = world_with(vec![source, tight]);
        world.place_task(id(0), task(0, 3.0));

        let mut graph = Graph::new();
        graph.add_edge(id(0), id(1), 1.0);
        let oracle = DistanceOracle::new(graph);

        // 2 + 3 > 3: both strategies must leave the task in place.
        let records = Gbma::new().run(&mut world, &oracle).expect("run");
        assert!(records.is_empty());
        let records = Mmlma::new().run(&mut world, &oracle).expect("run");
        assert!(records.is_empty());
        assert_eq!(world.agents[&id(0)].tasks.len(), 1);
    }

    #[test]
    fn destinations_never_exceed_capacity() {
        let mut source = Agent::new(id(0), 10.0, GroupId::new(0));
        source.fault_functional = true;
        let mut world = world_with(vec![
            source,
            Agent::new(id(1), 5.0, GroupId::new(0)),
            Agent::new(id(2), 5.0, GroupId::new(0)),
        ]);
        for i in 0..4 {
            world.place_task(id(0), task(i, 2.5));
        }

        let mut graph = Graph::new();
        graph.add_edge(id(0), id(1), 1.0);
        graph.add_edge(id(0), id(2), 1.0);
        let oracle = DistanceOracle::new(graph);

        let records = Mmlma::new().run(&mut world, &oracle).expect("run");
        assert_eq!(records.len(), 4);
        for agent in world.agents.values() {
            assert!(agent.load <= agent.capacity + 1e-12);
        }
    }

    #[test]
    fn ties_resolve_to_lowest_id() {
        let mut source = Agent::new(id(0), 10.0, GroupId::new(0));
        source.fault_functional = true;
        let mut world = world_with(vec![
            source,
            Agent::new(id(1), 10.0, GroupId::new(0)),
            Agent::new(id(2), 10.0, GroupId::new(0)),
        ]);
        world.place_task(id(0), task(0, 3.0));

        let mut graph = Graph::new();
        graph.add_edge(id(0), id(1), 1.0);
        graph.add_edge(id(0), id(2), 1.0);
        let oracle = DistanceOracle::new(graph);

        let records = Gbma::new().run(&mut world.clone(), &oracle).expect("run");
        assert_eq!(records[0].to, id(1));
        let records = Mmlma::new().run(&mut world, &oracle).expect("run");
        assert_eq!(records[0].to, id(1));
    }
}
