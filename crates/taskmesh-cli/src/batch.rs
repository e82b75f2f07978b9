//! Batch driver: cases x algorithms x repetitions, CSV reports.
//!
//! Every run gets a freshly built and initialized world; runs execute in
//! parallel (rayon) but results are reported in deterministic case,
//! algorithm, repetition order. Output is `runs.csv` (one row per run),
//! `summary.csv` (per-algorithm means) and `metadata.json`.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::Args;
use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use taskmesh_core::{
    evaluate, loader, DistanceOracle, InputStats, RunResult, TargetWeights, World, WorldConfig,
};
use taskmesh_engine::{Algorithm, StrategyParams};

/// Arguments of the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Task files, one per case (zipped with --agents and --graphs)
    #[arg(long = "tasks", required = true, num_args = 1..)]
    pub tasks: Vec<PathBuf>,

    /// Agent files, one per case
    #[arg(long = "agents", required = true, num_args = 1..)]
    pub agents: Vec<PathBuf>,

    /// Graph files, one per case
    #[arg(long = "graphs", required = true, num_args = 1..)]
    pub graphs: Vec<PathBuf>,

    /// Algorithms to compare
    #[arg(long, value_delimiter = ',', default_value = "hgtm,mpftm,gbma,mmlma")]
    pub algorithms: Vec<Algorithm>,

    /// Fraction of agents declared functionally failed
    #[arg(long, default_value_t = 0.3)]
    pub fault_ratio: f64,

    /// Base seed of the interaction-level draw; repetition `i` runs with
    /// `seed + i`
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Weight of the summed costs in the composite target (`a`)
    #[arg(long, default_value_t = 0.1)]
    pub cost_weight: f64,

    /// Weight of the survival rate in the composite target (`b`)
    #[arg(long, default_value_t = 0.9)]
    pub survival_weight: f64,

    /// Balance between field value and travel distance in MPFTM
    #[arg(long, default_value_t = 0.1)]
    pub alpha: f64,

    /// Repetitions per case and algorithm
    #[arg(long, default_value_t = 1)]
    pub repeat: u64,

    /// Output directory
    #[arg(long, default_value = "results")]
    pub out: PathBuf,
}

/// One loaded input triple, shared by all its runs.
struct Case {
    name: String,
    task_file: PathBuf,
    agent_file: PathBuf,
    graph_file: PathBuf,
    tasks: Vec<taskmesh_core::Task>,
    agents: Vec<taskmesh_core::Agent>,
    oracle: Arc<DistanceOracle>,
    stats: InputStats,
}

/// One row of `runs.csv`.
#[derive(Debug, Serialize)]
struct RunRow {
    case: String,
    repeat: u64,
    algorithm: String,
    exec_cost: f64,
    migration_cost: f64,
    target_opt: f64,
    survival_rate: f64,
    migrations: usize,
    unreachable_migrations: usize,
    elapsed_millis: f64,
    capacity_std: f64,
    task_size_std: f64,
    mean_capacity: f64,
    mean_task_size: f64,
}

impl RunRow {
    fn new(case: &str, repeat: u64, result: RunResult) -> Self {
        Self {
            case: case.to_string(),
            repeat,
            algorithm: result.algorithm,
            exec_cost: result.exec_cost,
            migration_cost: result.migration_cost,
            target_opt: result.target_opt,
            survival_rate: result.survival_rate,
            migrations: result.migrations,
            unreachable_migrations: result.unreachable_migrations,
            elapsed_millis: result.elapsed_millis,
            capacity_std: result.capacity_std,
            task_size_std: result.task_size_std,
            mean_capacity: result.mean_capacity,
            mean_task_size: result.mean_task_size,
        }
    }
}

/// One row of `summary.csv`.
#[derive(Debug, Serialize)]
struct SummaryRow {
    algorithm: String,
    runs: usize,
    mean_exec_cost: f64,
    mean_migration_cost: f64,
    mean_target_opt: f64,
    mean_survival_rate: f64,
    mean_elapsed_millis: f64,
    total_migrations: usize,
    total_unreachable: usize,
}

#[derive(Debug, Serialize)]
struct CaseMetadata {
    name: String,
    task_file: PathBuf,
    agent_file: PathBuf,
    graph_file: PathBuf,
    tasks: usize,
    agents: usize,
    edges: usize,
    stats: InputStats,
}

#[derive(Debug, Serialize)]
struct Metadata {
    generated_at: String,
    fault_ratio: f64,
    seed: u64,
    repeat: u64,
    algorithms: Vec<String>,
    cases: Vec<CaseMetadata>,
}

/// Runs the batch and writes the reports.
///
/// # Errors
///
/// Fails before any run starts when a case list is unbalanced or an input
/// file is missing or malformed; the process then exits non-zero.
pub fn execute(args: RunArgs) -> anyhow::Result<()> {
    if args.tasks.len() != args.agents.len() || args.tasks.len() != args.graphs.len() {
        bail!(
            "unbalanced case lists: {} task, {} agent, {} graph files",
            args.tasks.len(),
            args.agents.len(),
            args.graphs.len()
        );
    }
    if args.algorithms.is_empty() {
        bail!("no algorithms selected");
    }

    let cases = load_cases(&args)?;
    let params = StrategyParams {
        target: TargetWeights {
            cost: args.cost_weight,
            survival: args.survival_weight,
        },
        distance_weight: args.alpha,
    };
    let weights = params.target;

    // Enumerate every (case, algorithm, repetition) run up front so rayon
    // can chew through them while the output order stays fixed.
    let mut specs: Vec<(usize, Algorithm, u64)> = Vec::new();
    for case_index in 0..cases.len() {
        for &algorithm in &args.algorithms {
            for repetition in 0..args.repeat.max(1) {
                specs.push((case_index, algorithm, repetition));
            }
        }
    }
    info!(cases = cases.len(), runs = specs.len(), "starting batch");

    let rows: Vec<RunRow> = specs
        .par_iter()
        .map(|&(case_index, algorithm, repetition)| {
            let case = &cases[case_index];
            let config = WorldConfig {
                fault_ratio: args.fault_ratio,
                seed: args.seed + repetition,
            };

            let started = Instant::now();
            let mut world = World::from_inputs(case.tasks.clone(), case.agents.clone())?;
            world.initialize(&config);
            let records = algorithm.strategy(params).run(&mut world, &case.oracle)?;
            let evaluation = evaluate(&world, &case.oracle, &records, &weights);
            let elapsed_millis = started.elapsed().as_secs_f64() * 1_000.0;

            let result = RunResult::new(
                algorithm.name(),
                &evaluation,
                &case.stats,
                records.len(),
                elapsed_millis,
            );
            Ok(RunRow::new(&case.name, repetition, result))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    fs::create_dir_all(&args.out)
        .with_context(|| format!("creating output directory {}", args.out.display()))?;
    write_runs(&args.out.join("runs.csv"), &rows)?;
    write_summary(&args.out.join("summary.csv"), &args.algorithms, &rows)?;
    write_metadata(&args.out.join("metadata.json"), &args, &cases)?;

    info!(out = %args.out.display(), "batch finished");
    Ok(())
}

fn load_cases(args: &RunArgs) -> anyhow::Result<Vec<Case>> {
    let mut cases = Vec::new();
    for ((task_file, agent_file), graph_file) in
        args.tasks.iter().zip(&args.agents).zip(&args.graphs)
    {
        let tasks = loader::load_tasks(task_file)?;
        let agents = loader::load_agents(agent_file)?;
        let graph = loader::load_graph(graph_file)?;
        let stats = InputStats::from_inputs(&tasks, &agents);
        let name = task_file
            .file_stem()
            .map_or_else(|| "case".to_string(), |s| s.to_string_lossy().into_owned());
        info!(
            case = %name,
            tasks = tasks.len(),
            agents = agents.len(),
            edges = graph.edge_count(),
            "loaded case"
        );
        cases.push(Case {
            name,
            task_file: task_file.clone(),
            agent_file: agent_file.clone(),
            graph_file: graph_file.clone(),
            tasks,
            agents,
            oracle: Arc::new(DistanceOracle::new(graph)),
            stats,
        });
    }
    Ok(cases)
}

fn write_runs(path: &PathBuf, rows: &[RunRow]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_summary(
    path: &PathBuf,
    algorithms: &[Algorithm],
    rows: &[RunRow],
) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    for algorithm in algorithms {
        let name = algorithm.name();
        let selected: Vec<&RunRow> = rows.iter().filter(|r| r.algorithm == name).collect();
        if selected.is_empty() {
            continue;
        }
        let count = selected.len() as f64;
        let mean = |f: fn(&RunRow) -> f64| selected.iter().map(|r| f(r)).sum::<f64>() / count;
        writer.serialize(SummaryRow {
            algorithm: name.to_string(),
            runs: selected.len(),
            mean_exec_cost: mean(|r| r.exec_cost),
            mean_migration_cost: mean(|r| r.migration_cost),
            mean_target_opt: mean(|r| r.target_opt),
            mean_survival_rate: mean(|r| r.survival_rate),
            mean_elapsed_millis: mean(|r| r.elapsed_millis),
            total_migrations: selected.iter().map(|r| r.migrations).sum(),
            total_unreachable: selected.iter().map(|r| r.unreachable_migrations).sum(),
        })?;
    }
    writer.flush()?;
    Ok(())
}

fn write_metadata(path: &PathBuf, args: &RunArgs, cases: &[Case]) -> anyhow::Result<()> {
    let metadata = Metadata {
        generated_at: Utc::now().to_rfc3339(),
        fault_ratio: args.fault_ratio,
        seed: args.seed,
        repeat: args.repeat,
        algorithms: args.algorithms.iter().map(|a| a.name().to_string()).collect(),
        cases: cases
            .iter()
            .map(|case| CaseMetadata {
                name: case.name.clone(),
                task_file: case.task_file.clone(),
                agent_file: case.agent_file.clone(),
                graph_file: case.graph_file.clone(),
                tasks: case.tasks.len(),
                agents: case.agents.len(),
                edges: case.oracle.graph().edge_count(),
                stats: case.stats,
            })
            .collect(),
    };
    fs::write(path, serde_json::to_string_pretty(&metadata)?)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
