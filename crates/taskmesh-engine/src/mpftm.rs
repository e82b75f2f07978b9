//! MPFTM: potential-field task migration.
//!
//! Each faulted agent sheds one task at a time down the potential
//! gradient: same-group neighbors are scored with the intra field,
//! other groups' leaders with the global field scaled by the destination
//! group's interaction level, and every score carries an
//! `alpha * distance` travel term. A move must strictly improve on the
//! source's own field value; fields are rebuilt after every move.

use tracing::debug;

use taskmesh_core::{AgentId, DistanceOracle, MigrationRecord, World};

use crate::potential::PotentialFields;
use crate::{leaders, EngineResult, MigrationStrategy, StrategyParams};

/// Potential-field task migration strategy.
#[derive(Debug, Clone, Copy)]
pub struct Mpftm {
    params: StrategyParams,
}

impl Mpftm {
    /// Creates the strategy with the given parameters.
    #[must_use]
    pub fn new(params: StrategyParams) -> Self {
        Self { params }
    }

    /// The migration loop without leader election, reused verbatim as
    /// HGTM's receiver-shedding pass (leaders are already in place and
    /// must not be re-evaluated against the temporarily swapped fault
    /// flags there).
    pub(crate) fn migrate(
        &self,
        world: &mut World,
        oracle: &DistanceOracle,
    ) -> EngineResult<Vec<MigrationRecord>> {
        let mut records = Vec::new();
        let mut fields = PotentialFields::compute(world, oracle, &self.params);

        for source in world.faulted_agents() {
            loop {
                let Some(task_index) = world.agents[&source].largest_task_index() else {
                    break;
                };
                let Some((destination, score)) =
                    self.best_destination(world, oracle, &fields, source)
                else {
                    break;
                };
                // Gradient step must be a strict improvement.
                if score >= fields.intra[&source] {
                    break;
                }

                let record = world.transfer_task(source, destination, task_index)?;
                records.push(record);
                fields = PotentialFields::compute(world, oracle, &self.params);
            }
        }

        debug!(migrations = records.len(), "potential-field pass done");
        Ok(records)
    }

    /// Lowest-scoring legal destination for one task of `source`; ties go
    /// to the smallest id. Unreachable candidates score infinite and thus
    /// never pass the improvement check.
    fn best_destination(
        &self,
        world: &World,
        oracle: &DistanceOracle,
        fields: &PotentialFields,
        source: AgentId,
    ) -> Option<(AgentId, f64)> {
        let source_group = world.agents[&source].group_id;
        let alpha = self.params.distance_weight;
        let mut best: Option<(AgentId, f64)> = None;

        // Intra-group candidates: non-faulted same-group neighbors.
        for &(neighbor_id, _) in oracle.graph().neighbors(source) {
            let Some(neighbor) = world.agents.get(&neighbor_id) else {
                continue;
            };
            if neighbor.group_id != source_group || neighbor.fault_functional {
                continue;
            }
            let score =
                fields.intra[&neighbor_id] + alpha * oracle.distance(source, neighbor_id);
            consider(&mut best, neighbor_id, score);
        }

        // Inter-group candidates: other groups' non-faulted leaders,
        // attraction scaled by the destination group's interaction level.
        for (&group_id, group) in &world.groups {
            if group_id == source_group {
                continue;
            }
            let Some(leader_id) = group.leader else {
                continue;
            };
            if world.agents[&leader_id].fault_functional {
                continue;
            }
            let score = fields.global[&leader_id] * group.interaction_level
                + alpha * oracle.distance(source, leader_id);
            consider(&mut best, leader_id, score);
        }

        best
    }
}

fn consider(best: &mut Option<(AgentId, f64)>, candidate: AgentId, score: f64) {
    match best {
        Some((best_id, best_score)) => {
            if score < *best_score || (score == *best_score && candidate < *best_id) {
                *best = Some((candidate, score));
            }
        }
        None => *best = Some((candidate, score)),
    }
}

impl MigrationStrategy for Mpftm {
    fn name(&self) -> &'static str {
        "mpftm"
    }

    fn run(
        &self,
        world: &mut World,
        oracle: &DistanceOracle,
    ) -> EngineResult<Vec<MigrationRecord>> {
        leaders::elect_leaders(world, oracle.graph());
        self.migrate(world, oracle)
    }
}
