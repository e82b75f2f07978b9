//! Evaluation of a finished run: costs, survival rate, composite target.
//!
//! Evaluation is a pure function of the final world state and the
//! migration record list; running it twice yields identical numbers.

use serde::{Deserialize, Serialize};

use crate::graph::DistanceOracle;
use crate::types::{Agent, MigrationRecord, Task};
use crate::world::World;

/// Weights of the composite target `cost * (exec + mig) - survival * rate`.
///
/// The defaults make survival rate dominate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TargetWeights {
    /// Weight of the summed execution and migration costs (`a`)
    pub cost: f64,
    /// Weight of the mean survival rate (`b`)
    pub survival: f64,
}

impl Default for TargetWeights {
    fn default() -> Self {
        Self {
            cost: 0.1,
            survival: 0.9,
        }
    }
}

/// The four evaluation figures of one run, plus the unreachable-migration
/// diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Sum over agents of `load / capacity`
    pub exec_cost: f64,
    /// Sum over records of the shortest-path distance travelled
    pub migration_cost: f64,
    /// Mean over agents of `(1 - fault_functional) * (1 - fault_overload)`
    pub survival_rate: f64,
    /// `cost * (exec_cost + migration_cost) - survival * survival_rate`
    pub target_opt: f64,
    /// Records whose endpoints are disconnected (contributing 0 cost)
    pub unreachable_migrations: usize,
}

/// Evaluates a finished world state against its migration records.
#[must_use]
pub fn evaluate(
    world: &World,
    oracle: &DistanceOracle,
    records: &[MigrationRecord],
    weights: &TargetWeights,
) -> Evaluation {
    let exec_cost: f64 = world.agents.values().map(Agent::load_ratio).sum();

    let mut migration_cost = 0.0;
    let mut unreachable_migrations = 0;
    for record in records {
        let distance = oracle.distance(record.from, record.to);
        if distance.is_finite() {
            migration_cost += distance;
        } else {
            unreachable_migrations += 1;
        }
    }

    let survival_rate = if world.agents.is_empty() {
        0.0
    } else {
        let total: f64 = world
            .agents
            .values()
            .map(|a| {
                let functional = if a.fault_functional { 0.0 } else { 1.0 };
                functional * (1.0 - a.fault_overload)
            })
            .sum();
        total / world.agents.len() as f64
    };

    let target_opt =
        weights.cost * (exec_cost + migration_cost) - weights.survival * survival_rate;

    Evaluation {
        exec_cost,
        migration_cost,
        survival_rate,
        target_opt,
        unreachable_migrations,
    }
}

/// Mean of a sample; 0 when empty.
#[must_use]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation; 0 when empty.
#[must_use]
pub fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let sum_sq: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (sum_sq / values.len() as f64).sqrt()
}

/// Descriptive statistics of one input case, computed before any run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct InputStats {
    /// Mean agent capacity
    pub mean_capacity: f64,
    /// Population standard deviation of agent capacity
    pub capacity_std: f64,
    /// Mean task size
    pub mean_task_size: f64,
    /// Population standard deviation of task size
    pub task_size_std: f64,
}

impl InputStats {
    /// Computes input statistics from loaded tasks and agents.
    #[must_use]
    pub fn from_inputs(tasks: &[Task], agents: &[Agent]) -> Self {
        let capacities: Vec<f64> = agents.iter().map(|a| a.capacity).collect();
        let sizes: Vec<f64> = tasks.iter().map(|t| t.size).collect();
        Self {
            mean_capacity: mean(&capacities),
            capacity_std: population_std(&capacities),
            mean_task_size: mean(&sizes),
            task_size_std: population_std(&sizes),
        }
    }
}

/// One row of the batch report: everything measured about a single run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Strategy name
    pub algorithm: String,
    /// Sum over agents of `load / capacity`
    pub exec_cost: f64,
    /// Total shortest-path distance of all migrations
    pub migration_cost: f64,
    /// Composite optimization target
    pub target_opt: f64,
    /// Mean agent survival rate
    pub survival_rate: f64,
    /// Number of migration records emitted
    pub migrations: usize,
    /// Records whose endpoints were disconnected
    pub unreachable_migrations: usize,
    /// Wall-clock time of initialize + run + evaluate
    pub elapsed_millis: f64,
    /// Population standard deviation of agent capacity
    pub capacity_std: f64,
    /// Population standard deviation of task size
    pub task_size_std: f64,
    /// Mean agent capacity
    pub mean_capacity: f64,
    /// Mean task size
    pub mean_task_size: f64,
}

impl RunResult {
    /// Assembles a result row from its parts.
    #[must_use]
    pub fn new(
        algorithm: impl Into<String>,
        evaluation: &Evaluation,
        stats: &InputStats,
        migrations: usize,
        elapsed_millis: f64,
    ) -> Self {
        Self {
            algorithm: algorithm.into(),
            exec_cost: evaluation.exec_cost,
            migration_cost: evaluation.migration_cost,
            target_opt: evaluation.target_opt,
            survival_rate: evaluation.survival_rate,
            migrations,
            unreachable_migrations: evaluation.unreachable_migrations,
            elapsed_millis,
            capacity_std: stats.capacity_std,
            task_size_std: stats.task_size_std,
            mean_capacity: stats.mean_capacity,
            mean_task_size: stats.mean_task_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;
    use crate::types::{AgentId, GroupId, TaskId, ARRIVE_AT_START};

    fn small_world() -> (World, DistanceOracle, Vec<MigrationRecord>) {
        let agents = vec![
            Agent::new(AgentId::new(0), 10.0, GroupId::new(0)),
            Agent::new(AgentId::new(1), 10.0, GroupId::new(0)),
        ];
        let mut world = World::from_inputs(Vec::new(), agents).expect("world");
        world.place_task(
            AgentId::new(1),
            Task::new(TaskId::new(0), 5.0, ARRIVE_AT_START),
        );

        let mut graph = Graph::new();
        graph.add_edge(AgentId::new(0), AgentId::new(1), 1.0);
        let oracle = DistanceOracle::new(graph);
        let records = vec![MigrationRecord::new(AgentId::new(0), AgentId::new(1))];
        (world, oracle, records)
    }

    #[test]
    fn costs_and_target_follow_definitions() {
        let (world, oracle, records) = small_world();
        let weights = TargetWeights::default();
        let eval = evaluate(&world, &oracle, &records, &weights);

        assert!((eval.exec_cost - 0.5).abs() < 1e-12);
        assert!((eval.migration_cost - 1.0).abs() < 1e-12);
        assert_eq!(eval.unreachable_migrations, 0);
        let expected = 0.1 * (0.5 + 1.0) - 0.9 * eval.survival_rate;
        assert!((eval.target_opt - expected).abs() < 1e-12);
    }

    #[test]
    fn evaluation_is_idempotent() {
        let (world, oracle, records) = small_world();
        let weights = TargetWeights::default();
        let first = evaluate(&world, &oracle, &records, &weights);
        let second = evaluate(&world, &oracle, &records, &weights);
        assert_eq!(first, second);
    }

    #[test]
    fn unreachable_records_count_but_cost_zero() {
        let (world, _, _) = small_world();
        // Oracle over an empty graph: every pair is disconnected.
        let oracle = DistanceOracle::new(Graph::new());
        let records = vec![MigrationRecord::new(AgentId::new(0), AgentId::new(1))];
        let eval = evaluate(&world, &oracle, &records, &TargetWeights::default());
        assert_eq!(eval.unreachable_migrations, 1);
        assert!((eval.migration_cost - 0.0).abs() < 1e-12);
    }

    #[test]
    fn survival_rate_within_unit_interval() {
        let (mut world, oracle, records) = small_world();
        if let Some(agent) = world.agents.get_mut(&AgentId::new(0)) {
            agent.fault_functional = true;
            agent.fault_overload = 0.4;
        }
        let eval = evaluate(&world, &oracle, &records, &TargetWeights::default());
        assert!((0.0..=1.0).contains(&eval.survival_rate));
    }

    #[test]
    fn population_std_matches_hand_computation() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((population_std(&values) - 2.0).abs() < 1e-12);
        assert!((mean(&values) - 5.0).abs() < 1e-12);
    }
}
