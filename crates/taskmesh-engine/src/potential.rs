//! Potential-field construction over the current world state.
//!
//! Fields are plain read-only maps from agent id to a scalar, rebuilt from
//! scratch after every executed migration; nothing is patched
//! incrementally. The intra field scores an agent against its same-group
//! neighborhood, the global field against its whole neighborhood, and
//! consumers of the intra field treat functionally faulted agents as
//! must-leave sources rather than destinations.

use std::collections::BTreeMap;

use taskmesh_core::survival::{contextual_load, individual_survivability};
use taskmesh_core::{AgentId, DistanceOracle, World};

use crate::StrategyParams;

/// One snapshot of both potential fields.
#[derive(Debug, Clone)]
pub struct PotentialFields {
    /// Per-group (intra) field: each agent's contextual load
    pub intra: BTreeMap<AgentId, f64>,
    /// Global (inter) field: the cross-group analogue
    pub global: BTreeMap<AgentId, f64>,
}

impl PotentialFields {
    /// Computes both fields from the current world state and refreshes
    /// every agent's overload-fault probability along the way.
    #[must_use]
    pub fn compute(world: &mut World, oracle: &DistanceOracle, params: &StrategyParams) -> Self {
        let a = params.target.cost;
        let b = params.target.survival;

        let mut intra = BTreeMap::new();
        let mut global = BTreeMap::new();
        let ids: Vec<AgentId> = world.agents.keys().copied().collect();
        for id in ids {
            let agent = &world.agents[&id];
            let leader = world.groups[&agent.group_id].leader;
            intra.insert(id, contextual_load(world, oracle, leader, agent, a, b));
            global.insert(id, global_contextual(world, oracle, leader, id, a, b));
        }

        world.refresh_overload_faults();
        Self { intra, global }
    }
}

/// Cross-group analogue of the contextual load: the neighborhood terms run
/// over every neighbor regardless of group.
fn global_contextual(
    world: &World,
    oracle: &DistanceOracle,
    leader: Option<AgentId>,
    agent_id: AgentId,
    a: f64,
    b: f64,
) -> f64 {
    let agent = &world.agents[&agent_id];
    let group = &world.groups[&agent.group_id];
    let own = a * agent.load_ratio() - b * individual_survivability(agent, group);

    let mut domain = 0.0;
    let mut cost_sum = 0.0;
    for &(neighbor_id, weight) in oracle.graph().neighbors(agent_id) {
        let Some(neighbor) = world.agents.get(&neighbor_id) else {
            continue;
        };
        let neighbor_group = &world.groups[&neighbor.group_id];
        cost_sum += weight;
        domain +=
            a * neighbor.load_ratio() - b * individual_survivability(neighbor, neighbor_group);
    }

    if let Some(leader_id) = leader {
        let d = oracle.distance(leader_id, agent_id);
        if d.is_finite() {
            cost_sum += d;
        }
    }

    let degree = oracle.graph().degree(agent_id) as f64;
    own + 0.1 * (domain / (degree + 2.0) + cost_sum / (degree + 1.0))
}
