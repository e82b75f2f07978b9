//! Supply-chain network builder.
//!
//! Pure preprocessing: turns three CSV tables describing a real
//! semiconductor supply chain (providers, inputs, provision
//! relationships) into the text-format task / agent / graph files the
//! engine consumes, plus a JSON metadata sidecar.
//!
//! Mapping:
//! - providers become agents; countries draw a higher capacity range
//!   than companies, and groups are assigned round-robin over the
//!   provider list;
//! - inputs become tasks sized by their stage multiplier (`S3` means
//!   stage 3; later stages are more complex) with staggered arrival
//!   times;
//! - providers provisioning the same input are linked, weight
//!   `max(1, 10 - combined_share * 9)` averaged over all shared inputs,
//!   and disconnected components are joined through their
//!   highest-degree nodes.
//!
//! Provider ids are remapped to dense numeric agent ids, since the text
//! formats carry integers.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

/// Base task size before the stage multiplier.
const BASE_TASK_SIZE: f64 = 10.0;

/// Stage multiplier used when an input has no parseable stage id.
const DEFAULT_STAGE_MULTIPLIER: f64 = 2.0;

/// Capacity range of country-level providers.
const COUNTRY_CAPACITY: (f64, f64) = (80.0, 150.0);

/// Capacity range of company providers.
const COMPANY_CAPACITY: (f64, f64) = (30.0, 100.0);

/// Smallest co-provision edge weight; stronger shared supply means a
/// cheaper link, floored here.
const MIN_EDGE_WEIGHT: f64 = 1.0;

/// Weight of the edges inserted to join disconnected components.
const COMPONENT_BRIDGE_WEIGHT: f64 = 5.0;

/// Arguments of the `build` subcommand.
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Provider table: provider_id, provider_name, provider_type, country
    #[arg(long)]
    pub providers: PathBuf,

    /// Input table: input_id, input_name, stage_id, stage_name
    #[arg(long)]
    pub inputs: PathBuf,

    /// Provision table: provider_id, provided_id, share_provided
    #[arg(long)]
    pub provision: PathBuf,

    /// Number of agent groups to assign round-robin
    #[arg(long, default_value_t = 10)]
    pub num_groups: u32,

    /// Seed of the capacity and task-size draws
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Prefix of the emitted files
    #[arg(long, default_value = "supply")]
    pub out_prefix: String,

    /// Output directory
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct ProviderRow {
    provider_id: String,
    #[allow(dead_code)]
    provider_name: String,
    provider_type: String,
    #[allow(dead_code)]
    country: String,
}

#[derive(Debug, Deserialize)]
struct InputRow {
    #[allow(dead_code)]
    input_id: String,
    #[allow(dead_code)]
    input_name: String,
    stage_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProvisionRow {
    provider_id: Option<String>,
    provided_id: Option<String>,
    share_provided: Option<f64>,
}

/// Builds the three text files and the metadata sidecar.
///
/// # Errors
///
/// Fails on unreadable CSV tables or unwritable outputs; provision rows
/// with missing endpoints or unknown provider references are skipped
/// with a warning.
pub fn execute(args: BuildArgs) -> anyhow::Result<()> {
    let providers = read_csv::<ProviderRow>(&args.providers)?;
    let inputs = read_csv::<InputRow>(&args.inputs)?;
    let provision = read_csv::<ProvisionRow>(&args.provision)?;
    let mut rng = StdRng::seed_from_u64(args.seed);

    // Providers become agents with dense numeric ids; groups go
    // round-robin over the provider list.
    let mut provider_ids: BTreeMap<&str, u32> = BTreeMap::new();
    let mut agents_text = String::new();
    for (index, provider) in providers.iter().enumerate() {
        let (low, high) = if provider.provider_type == "Country" {
            COUNTRY_CAPACITY
        } else {
            COMPANY_CAPACITY
        };
        let capacity = round2(rng.gen_range(low..high));
        let group = index as u32 % args.num_groups.max(1);
        provider_ids.insert(provider.provider_id.as_str(), index as u32);
        let _ = writeln!(agents_text, "{index} {capacity} {group}");
    }

    // Inputs become tasks, earliest stages first; later stages are more
    // complex and arrive later.
    let mut staged: Vec<(f64, &InputRow)> = inputs
        .iter()
        .map(|input| (stage_multiplier(input.stage_id.as_deref()), input))
        .collect();
    staged.sort_by(|x, y| x.0.total_cmp(&y.0));

    let mut tasks_text = String::new();
    for (task_id, &(multiplier, _)) in staged.iter().enumerate() {
        let size = round2(BASE_TASK_SIZE * multiplier * rng.gen_range(0.8..1.5));
        let arrive_time = (task_id % 10) as i64 + ((multiplier - 1.0) * 5.0) as i64;
        let _ = writeln!(tasks_text, "{task_id} {size} {arrive_time}");
    }

    // Providers provisioning the same input are supply-chain partners;
    // a higher combined market share means a stronger (cheaper) link.
    let mut suppliers: BTreeMap<&str, Vec<(u32, f64)>> = BTreeMap::new();
    for row in &provision {
        let (Some(provider), Some(input)) = (row.provider_id.as_deref(), row.provided_id.as_deref())
        else {
            warn!("provision row with missing endpoint; skipping");
            continue;
        };
        let Some(&provider) = provider_ids.get(provider) else {
            warn!(provider, "provision row names unknown provider; skipping");
            continue;
        };
        suppliers
            .entry(input)
            .or_default()
            .push((provider, row.share_provided.unwrap_or(1.0)));
    }

    let mut edge_weights: BTreeMap<(u32, u32), Vec<f64>> = BTreeMap::new();
    for partners in suppliers.values() {
        for (i, &(u, share_u)) in partners.iter().enumerate() {
            for &(v, share_v) in &partners[i + 1..] {
                if u == v {
                    continue;
                }
                let combined_share = (share_u + share_v) / 2.0;
                let weight = (10.0 - combined_share * 9.0).max(MIN_EDGE_WEIGHT);
                edge_weights.entry((u.min(v), u.max(v))).or_default().push(weight);
            }
        }
    }

    // One edge per pair, weight averaged over every shared input.
    let mut edges: BTreeMap<(u32, u32), f64> = edge_weights
        .iter()
        .map(|(&pair, weights)| {
            (pair, weights.iter().sum::<f64>() / weights.len() as f64)
        })
        .collect();
    bridge_components(&mut edges, providers.len() as u32);

    let mut graph_text = String::new();
    for (&(u, v), &weight) in &edges {
        let _ = writeln!(graph_text, "{u} {v} {weight}");
    }

    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating output directory {}", args.out_dir.display()))?;
    let task_file = args.out_dir.join(format!("{}_tasks.txt", args.out_prefix));
    let agent_file = args.out_dir.join(format!("{}_agents.txt", args.out_prefix));
    let graph_file = args.out_dir.join(format!("{}_graph.txt", args.out_prefix));
    fs::write(&task_file, tasks_text)?;
    fs::write(&agent_file, agents_text)?;
    fs::write(&graph_file, graph_text)?;

    let metadata = json!({
        "providers": providers.len(),
        "inputs": inputs.len(),
        "provision_rows": provision.len(),
        "groups": args.num_groups,
        "edges": edges.len(),
        "seed": args.seed,
        "files": {
            "tasks": task_file,
            "agents": agent_file,
            "graph": graph_file,
        },
    });
    let metadata_file = args
        .out_dir
        .join(format!("{}_metadata.json", args.out_prefix));
    fs::write(&metadata_file, serde_json::to_string_pretty(&metadata)?)?;

    info!(
        agents = providers.len(),
        tasks = inputs.len(),
        edges = edges.len(),
        prefix = %args.out_prefix,
        "supply-chain inputs written"
    );
    Ok(())
}

/// Numeric part of a stage id like `S3`; inputs without one default to
/// the middle of the chain.
fn stage_multiplier(stage_id: Option<&str>) -> f64 {
    stage_id
        .and_then(|s| s.trim_start_matches(['S', 's']).parse::<f64>().ok())
        .unwrap_or(DEFAULT_STAGE_MULTIPLIER)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Joins disconnected components of the emitted edge set through their
/// highest-degree vertices (ties to the lowest id).
fn bridge_components(edges: &mut BTreeMap<(u32, u32), f64>, vertex_count: u32) {
    if vertex_count == 0 {
        return;
    }
    let mut degree: BTreeMap<u32, usize> = (0..vertex_count).map(|v| (v, 0)).collect();
    let mut adjacency: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
    for &(u, v) in edges.keys() {
        *degree.entry(u).or_insert(0) += 1;
        *degree.entry(v).or_insert(0) += 1;
        adjacency.entry(u).or_default().push(v);
        adjacency.entry(v).or_default().push(u);
    }

    let mut seen: BTreeMap<u32, bool> = BTreeMap::new();
    let mut components: Vec<Vec<u32>> = Vec::new();
    for start in 0..vertex_count {
        if seen.get(&start).copied().unwrap_or(false) {
            continue;
        }
        let mut component = Vec::new();
        let mut stack = vec![start];
        seen.insert(start, true);
        while let Some(v) = stack.pop() {
            component.push(v);
            for &n in adjacency.get(&v).map_or(&[][..], Vec::as_slice) {
                if !seen.get(&n).copied().unwrap_or(false) {
                    seen.insert(n, true);
                    stack.push(n);
                }
            }
        }
        components.push(component);
    }

    if components.len() < 2 {
        return;
    }
    let hub = |component: &[u32]| {
        component
            .iter()
            .copied()
            .max_by(|x, y| {
                degree[x]
                    .cmp(&degree[y])
                    .then_with(|| y.cmp(x))
            })
            .unwrap_or(0)
    };
    for pair in components.windows(2) {
        let u = hub(&pair[0]);
        let v = hub(&pair[1]);
        warn!(from = u, to = v, "provision graph is disconnected; bridging components");
        edges.insert((u.min(v), u.max(v)), COMPONENT_BRIDGE_WEIGHT);
    }
}

fn read_csv<T: for<'de> Deserialize<'de>>(path: &Path) -> anyhow::Result<Vec<T>> {
    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("reading {}", path.display()))?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row.with_context(|| format!("parsing {}", path.display()))?);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskmesh_core::loader;

    fn write(path: &Path, content: &str) {
        fs::write(path, content).expect("write");
    }

    #[test]
    fn stage_multiplier_parses_and_defaults() {
        assert!((stage_multiplier(Some("S3")) - 3.0).abs() < 1e-12);
        assert!((stage_multiplier(Some("s1")) - 1.0).abs() < 1e-12);
        assert!((stage_multiplier(Some("junk")) - DEFAULT_STAGE_MULTIPLIER).abs() < 1e-12);
        assert!((stage_multiplier(None) - DEFAULT_STAGE_MULTIPLIER).abs() < 1e-12);
    }

    #[test]
    fn build_emits_loadable_inputs() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(
            &dir.path().join("providers.csv"),
            "provider_id,provider_name,provider_type,country\n\
             p1,Alpha,Company,US\n\
             p2,Beta,Company,DE\n\
             p3,Gamma,Country,TW\n",
        );
        write(
            &dir.path().join("inputs.csv"),
            "input_id,input_name,stage_id,stage_name\n\
             i1,Wafer,S1,Materials\n\
             i2,Lithography,S4,Fabrication\n\
             i3,Resin,,Unknown\n",
        );
        write(
            &dir.path().join("provision.csv"),
            "provider_id,provided_id,share_provided\n\
             p1,i1,0.6\n\
             p2,i1,0.4\n\
             p3,i2,1.0\n\
             missing,i1,0.5\n\
             p1,,0.2\n",
        );

        execute(BuildArgs {
            providers: dir.path().join("providers.csv"),
            inputs: dir.path().join("inputs.csv"),
            provision: dir.path().join("provision.csv"),
            num_groups: 2,
            seed: 7,
            out_prefix: "test".to_string(),
            out_dir: dir.path().to_path_buf(),
        })
        .expect("build");

        // The emitted files parse through the core loader.
        let tasks = loader::load_tasks(dir.path().join("test_tasks.txt")).expect("tasks");
        assert_eq!(tasks.len(), 3);
        // Stage 1 sorts first and arrives earliest; stage 4 is the most
        // complex and sized accordingly (base 10 x multiplier x [0.8, 1.5)).
        assert_eq!(tasks[0].arrive_time, 0);
        let stage4 = tasks.last().expect("stage 4 task");
        assert!(stage4.size >= 32.0 && stage4.size <= 60.0);
        assert_eq!(stage4.arrive_time, 2 + 15);

        let agents = loader::load_agents(dir.path().join("test_agents.txt")).expect("agents");
        assert_eq!(agents.len(), 3);
        // Round-robin grouping over two groups.
        let groups: Vec<u32> = agents.iter().map(|a| a.group_id.value()).collect();
        assert_eq!(groups, vec![0, 1, 0]);
        // p3 is a country: its capacity draw comes from the higher range.
        assert!(agents[2].capacity >= COUNTRY_CAPACITY.0);
        for agent in &agents {
            assert!(agent.capacity > 0.0);
        }

        // p1 and p2 co-provision i1: combined share 0.5 gives weight
        // max(1, 10 - 4.5) = 5.5; p3 is disconnected and gets bridged.
        let graph = loader::load_graph(dir.path().join("test_graph.txt")).expect("graph");
        assert_eq!(
            graph.edge_weight(
                taskmesh_core::AgentId::new(0),
                taskmesh_core::AgentId::new(1)
            ),
            Some(5.5)
        );
        assert_eq!(graph.components().len(), 1);

        let metadata =
            fs::read_to_string(dir.path().join("test_metadata.json")).expect("metadata");
        assert!(metadata.contains("\"providers\": 3"));
    }
}
