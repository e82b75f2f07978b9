//! World state: agents, groups, pending tasks, and its initialization.
//!
//! A [`World`] is built once from parsed inputs and cloned fresh for every
//! strategy run. [`World::initialize`] performs the initial task matching
//! and the deterministic fault injection; after that, only migration
//! strategies mutate it, and only through [`World::transfer_task`].

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::survival::individual_survivability;
use crate::types::{Agent, AgentId, Group, GroupId, MigrationRecord, Task};

/// Default fraction of agents declared functionally failed.
pub const DEFAULT_FAULT_RATIO: f64 = 0.3;

/// The two values the per-group interaction level is drawn from.
pub const INTERACTION_LEVELS: [f64; 2] = [0.1, 0.2];

/// Initialization parameters of a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WorldConfig {
    /// Fraction of agents to fault (default 0.3)
    pub fault_ratio: f64,
    /// Seed of the interaction-level draw, the only randomness in a run
    pub seed: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            fault_ratio: DEFAULT_FAULT_RATIO,
            seed: 0,
        }
    }
}

/// The complete mutable state of one simulation run.
#[derive(Debug, Clone, Default)]
pub struct World {
    /// Tasks not yet placed (initial tasks are drained by
    /// [`World::initialize`]; later arrivals remain here untouched)
    pub tasks: Vec<Task>,
    /// Agents by id, ascending
    pub agents: BTreeMap<AgentId, Agent>,
    /// Groups by id, ascending
    pub groups: BTreeMap<GroupId, Group>,
}

impl World {
    /// Builds a world from parsed inputs, deriving the group partition
    /// from the agents' group ids.
    ///
    /// # Errors
    ///
    /// Fails when two agents share an id.
    pub fn from_inputs(tasks: Vec<Task>, agents: Vec<Agent>) -> CoreResult<Self> {
        let mut agent_map: BTreeMap<AgentId, Agent> = BTreeMap::new();
        let mut groups: BTreeMap<GroupId, Group> = BTreeMap::new();

        for agent in agents {
            let group = groups
                .entry(agent.group_id)
                .or_insert_with(|| Group::new(agent.group_id));
            group.members.insert(agent.id);
            if agent_map.insert(agent.id, agent).is_some() {
                return Err(CoreError::validation("duplicate agent id in input"));
            }
        }

        Ok(Self {
            tasks,
            agents: agent_map,
            groups,
        })
    }

    /// Looks up an agent.
    ///
    /// # Errors
    ///
    /// Fails when the id is unknown.
    pub fn agent(&self, id: AgentId) -> CoreResult<&Agent> {
        self.agents
            .get(&id)
            .ok_or_else(|| CoreError::unknown_id("agent", id.value()))
    }

    /// Total load across all agents.
    #[must_use]
    pub fn total_load(&self) -> f64 {
        self.agents.values().map(|a| a.load).sum()
    }

    /// Total number of placed tasks.
    #[must_use]
    pub fn placed_task_count(&self) -> usize {
        self.agents.values().map(|a| a.tasks.len()).sum()
    }

    /// Functionally faulted agents in ascending id order.
    #[must_use]
    pub fn faulted_agents(&self) -> Vec<AgentId> {
        self.agents
            .values()
            .filter(|a| a.fault_functional)
            .map(|a| a.id)
            .collect()
    }

    /// Runs initial task matching followed by fault injection.
    pub fn initialize(&mut self, config: &WorldConfig) {
        self.assign_initial_tasks(config.seed);
        self.inject_faults(config.fault_ratio);
    }

    /// Matches every initially-present task (`arrive_time == -1`) to an
    /// agent: largest tasks to the highest-capacity agents first, then
    /// repeatedly to whichever agent has the smallest load ratio.
    fn assign_initial_tasks(&mut self, seed: u64) {
        let mut pre_tasks: Vec<Task> = Vec::new();
        self.tasks.retain(|task| {
            if task.is_initial() {
                pre_tasks.push(task.clone());
                false
            } else {
                true
            }
        });
        pre_tasks.sort_by(|x, y| y.size.total_cmp(&x.size).then_with(|| x.id.cmp(&y.id)));
        let mut pre_tasks = pre_tasks.into_iter();

        // One task per agent, highest capacity first.
        let mut by_capacity: Vec<AgentId> = self.agents.keys().copied().collect();
        by_capacity.sort_by(|x, y| {
            self.agents[y]
                .capacity
                .total_cmp(&self.agents[x].capacity)
                .then_with(|| x.cmp(y))
        });
        for &agent_id in &by_capacity {
            let Some(task) = pre_tasks.next() else { break };
            self.place_task(agent_id, task);
        }

        // Remaining tasks go to the least-loaded agent, one at a time.
        let mut heap: BinaryHeap<LoadEntry> = self
            .agents
            .values()
            .map(|a| LoadEntry {
                ratio: a.load_ratio(),
                id: a.id,
            })
            .collect();
        for task in pre_tasks {
            let Some(entry) = heap.pop() else { break };
            self.place_task(entry.id, task);
            heap.push(LoadEntry {
                ratio: self.agents[&entry.id].load_ratio(),
                id: entry.id,
            });
        }

        // Group capacities and seeded interaction levels.
        let mut rng = StdRng::seed_from_u64(seed);
        let member_capacity: BTreeMap<GroupId, f64> = self
            .groups
            .iter()
            .map(|(&gid, group)| {
                let sum = group
                    .members
                    .iter()
                    .map(|m| self.agents[m].capacity)
                    .sum::<f64>();
                (gid, sum)
            })
            .collect();
        for (gid, group) in &mut self.groups {
            group.capacity = member_capacity[gid];
            group.interaction_level = INTERACTION_LEVELS[rng.gen_range(0..2usize)];
        }
    }

    /// Deterministic fault injection: with `k = max(1, floor(p * n))` and
    /// `step = floor(n / k)`, an agent faults iff `id % step == 1`. Every
    /// agent's overload-fault probability becomes `1 - IS`.
    fn inject_faults(&mut self, ratio: f64) {
        let n = self.agents.len();
        if n == 0 {
            return;
        }
        let k = ((ratio * n as f64) as usize).max(1);
        let step = (n / k).max(1) as u32;

        let ids: Vec<AgentId> = self.agents.keys().copied().collect();
        for id in ids {
            if id.value() % step == 1 {
                let (capacity, group_id) = {
                    let agent = &self.agents[&id];
                    (agent.capacity, agent.group_id)
                };
                if let Some(agent) = self.agents.get_mut(&id) {
                    agent.fault_functional = true;
                }
                if let Some(group) = self.groups.get_mut(&group_id) {
                    group.capacity -= capacity;
                }
            }
        }

        self.refresh_overload_faults();
    }

    /// Recomputes every agent's overload-fault probability from its
    /// current load (`1 - IS`).
    pub fn refresh_overload_faults(&mut self) {
        let ids: Vec<AgentId> = self.agents.keys().copied().collect();
        for id in ids {
            let is = {
                let agent = &self.agents[&id];
                individual_survivability(agent, &self.groups[&agent.group_id])
            };
            if let Some(agent) = self.agents.get_mut(&id) {
                agent.fault_overload = 1.0 - is;
            }
        }
    }

    /// Places a task on an agent, maintaining agent and group loads.
    pub fn place_task(&mut self, agent_id: AgentId, task: Task) {
        let size = task.size;
        let Some(agent) = self.agents.get_mut(&agent_id) else {
            return;
        };
        let group_id = agent.group_id;
        agent.push_task(task);
        if let Some(group) = self.groups.get_mut(&group_id) {
            group.load += size;
        }
    }

    /// Moves the task at `task_index` from one agent to another,
    /// maintaining agent loads, group loads, and task lists.
    ///
    /// # Errors
    ///
    /// Fails when either agent id is unknown or the index is out of range.
    pub fn transfer_task(
        &mut self,
        from: AgentId,
        to: AgentId,
        task_index: usize,
    ) -> CoreResult<MigrationRecord> {
        let to_group = self
            .agents
            .get(&to)
            .map(|agent| agent.group_id)
            .ok_or_else(|| CoreError::unknown_id("agent", to.value()))?;
        let (task, from_group) = {
            let agent = self
                .agents
                .get_mut(&from)
                .ok_or_else(|| CoreError::unknown_id("agent", from.value()))?;
            if task_index >= agent.tasks.len() {
                return Err(CoreError::validation(format!(
                    "task index {task_index} out of range for agent {from}"
                )));
            }
            (agent.remove_task(task_index), agent.group_id)
        };

        let size = task.size;
        if let Some(agent) = self.agents.get_mut(&to) {
            agent.push_task(task);
        }

        if from_group != to_group {
            if let Some(group) = self.groups.get_mut(&from_group) {
                group.load -= size;
            }
            if let Some(group) = self.groups.get_mut(&to_group) {
                group.load += size;
            }
        }

        Ok(MigrationRecord::new(from, to))
    }
}

/// Min-heap entry: smallest load ratio first, ties to the smallest id.
#[derive(Debug, Clone, Copy, PartialEq)]
struct LoadEntry {
    ratio: f64,
    id: AgentId,
}

impl Eq for LoadEntry {}

impl Ord for LoadEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap pops the maximum; invert both keys.
        other
            .ratio
            .total_cmp(&self.ratio)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for LoadEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
