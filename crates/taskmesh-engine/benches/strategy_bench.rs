//! Performance benchmarks for the taskmesh migration strategies.
//!
//! Run with: cargo bench --package taskmesh-engine
//!
//! Benchmarks cover:
//! - Distance-oracle queries on cold and warm caches
//! - Group-restricted betweenness centrality
//! - Full strategy runs at several network sizes

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use taskmesh_core::prelude::*;
use taskmesh_engine::{Algorithm, StrategyParams};

/// Deterministic mesh: a ring with chords, grouped agents, and initial
/// tasks matched by the world initializer.
fn synthetic_case(agent_count: u32, task_count: u32, seed: u64) -> (World, Graph) {
    let mut rng = StdRng::seed_from_u64(seed);
    let agents: Vec<Agent> = (0..agent_count)
        .map(|i| {
            Agent::new(
                AgentId::new(i),
                rng.gen_range(40.0..120.0),
                GroupId::new(i % 8),
            )
        })
        .collect();
    let tasks: Vec<Task> = (0..task_count)
        .map(|i| Task::new(TaskId::new(i), rng.gen_range(0.5..8.0), ARRIVE_AT_START))
        .collect();

    let mut graph = Graph::new();
    for i in 0..agent_count {
        graph.add_edge(
            AgentId::new(i),
            AgentId::new((i + 1) % agent_count),
            rng.gen_range(0.5..4.0),
        );
    }
    for _ in 0..(agent_count * 2) {
        let u = rng.gen_range(0..agent_count);
        let v = rng.gen_range(0..agent_count);
        if u != v {
            graph.add_edge(AgentId::new(u), AgentId::new(v), rng.gen_range(0.5..4.0));
        }
    }

    let mut world = World::from_inputs(tasks, agents).expect("world");
    world.initialize(&WorldConfig {
        fault_ratio: 0.3,
        seed,
    });
    (world, graph)
}

fn bench_oracle(c: &mut Criterion) {
    let (_, graph) = synthetic_case(400, 0, 11);
    let mut group = c.benchmark_group("oracle");

    group.bench_function("cold_distance", |b| {
        b.iter_with_setup(
            || DistanceOracle::new(graph.clone()),
            |oracle| black_box(oracle.distance(AgentId::new(0), AgentId::new(399))),
        );
    });

    let warm = DistanceOracle::new(graph.clone());
    warm.prewarm();
    group.bench_function("warm_distance", |b| {
        b.iter(|| black_box(warm.distance(AgentId::new(0), AgentId::new(399))));
    });

    group.finish();
}

fn bench_betweenness(c: &mut Criterion) {
    let (world, graph) = synthetic_case(400, 0, 11);
    let mut group = c.benchmark_group("betweenness");

    for group_id in [0u32, 4] {
        let members = world.groups[&GroupId::new(group_id)].members.clone();
        group.bench_with_input(
            BenchmarkId::new("group", group_id),
            &members,
            |b, members| {
                b.iter(|| black_box(graph.betweenness(members)));
            },
        );
    }
    group.finish();
}

fn bench_strategies(c: &mut Criterion) {
    let mut group = c.benchmark_group("strategies");
    group.sample_size(10);

    for &agent_count in &[50u32, 200] {
        let (world, graph) = synthetic_case(agent_count, agent_count * 4, 23);
        for algorithm in Algorithm::all() {
            group.bench_with_input(
                BenchmarkId::new(algorithm.name(), agent_count),
                &world,
                |b, world| {
                    b.iter_with_setup(
                        || (world.clone(), DistanceOracle::new(graph.clone())),
                        |(mut fresh, oracle)| {
                            let strategy = algorithm.strategy(StrategyParams::default());
                            black_box(strategy.run(&mut fresh, &oracle).expect("run"))
                        },
                    );
                },
            );
        }
    }
    group.finish();
}

criterion_group!(benches, bench_oracle, bench_betweenness, bench_strategies);
criterion_main!(benches);
