//! Survivability functions and the contextual-load scalar.
//!
//! Both the evaluator and the potential fields consume the clamped
//! monotone-decreasing survivability functions defined here. The sigmoid
//! is `tanh(ln(x + 1))`, not the logistic function; the clamps below
//! depend on exactly this shape.

use crate::graph::DistanceOracle;
use crate::types::{Agent, AgentId, Group};
use crate::world::World;

/// Load divisor of the group survivability curve.
pub const GROUP_LOAD_SCALE: f64 = 200.0;

/// Load divisor of the individual survivability curve.
pub const AGENT_LOAD_SCALE: f64 = 60.0;

/// Lower clamp of group survivability.
pub const GROUP_SURVIVABILITY_FLOOR: f64 = 0.6;

/// Lower clamp of individual survivability.
pub const AGENT_SURVIVABILITY_FLOOR: f64 = 0.3;

/// Saturating sigmoid `tanh(ln(x + 1))`, mapping `[0, inf)` onto `[0, 1)`.
#[must_use]
pub fn sig(x: f64) -> f64 {
    (x + 1.0).ln().tanh()
}

/// Group survivability `GS`, clamped to `[0.6, 1]`.
#[must_use]
pub fn group_survivability(group: &Group) -> f64 {
    let members = group.member_count().max(1) as f64;
    (1.0 - sig(group.load / (members * GROUP_LOAD_SCALE))).max(GROUP_SURVIVABILITY_FLOOR)
}

/// Individual survivability `IS`, clamped to `[0.3, 1]`.
#[must_use]
pub fn individual_survivability(agent: &Agent, group: &Group) -> f64 {
    let gs = group_survivability(group);
    (gs * (1.0 - sig(agent.load / AGENT_LOAD_SCALE))).max(AGENT_SURVIVABILITY_FLOOR)
}

/// Contextual load of `agent`: its own weighted load, its same-group
/// neighborhood's, and its distance to the group leader folded into one
/// scalar.
///
/// `leader` is the agent's group leader; `None` (leaderless group) makes
/// the leader-distance term vanish, as does an unreachable leader.
#[must_use]
pub fn contextual_load(
    world: &World,
    oracle: &DistanceOracle,
    leader: Option<AgentId>,
    agent: &Agent,
    a: f64,
    b: f64,
) -> f64 {
    let group = &world.groups[&agent.group_id];
    let own = a * agent.load_ratio() - b * individual_survivability(agent, group);

    let mut domain = 0.0;
    let mut cost_sum = 0.0;
    for &(neighbor_id, weight) in oracle.graph().neighbors(agent.id) {
        let Some(neighbor) = world.agents.get(&neighbor_id) else {
            continue;
        };
        if neighbor.group_id != agent.group_id {
            continue;
        }
        let neighbor_group = &world.groups[&neighbor.group_id];
        cost_sum += weight;
        domain +=
            a * neighbor.load_ratio() - b * individual_survivability(neighbor, neighbor_group);
    }

    if let Some(leader_id) = leader {
        let d = oracle.distance(leader_id, agent.id);
        if d.is_finite() {
            cost_sum += d;
        }
    }

    let degree = oracle.graph().degree(agent.id) as f64;
    own + 0.1 * (domain / (degree + 2.0) + cost_sum / (degree + 1.0))
}
