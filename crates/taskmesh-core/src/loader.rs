//! Line-oriented input readers for tasks, agents and graph edges.
//!
//! All three formats are whitespace-separated, one record per line.
//! Lines with too few tokens are skipped with a warning; a token that must
//! be numeric but is not, a negative capacity, or a negative task size
//! aborts the load (see [`crate::error::CoreError`]).

use std::fs;
use std::path::Path;

use tracing::warn;

use crate::error::{CoreError, CoreResult};
use crate::graph::Graph;
use crate::types::{Agent, AgentId, GroupId, Task, TaskId};

/// Weight of the bridge edges inserted to connect the components of the
/// edge file.
pub const BRIDGE_WEIGHT: f64 = 1.0e-3;

/// Reads tasks from `id size arrive_time` lines.
///
/// # Errors
///
/// Fails on an unreadable file, a non-numeric token, or a negative size.
pub fn load_tasks(path: impl AsRef<Path>) -> CoreResult<Vec<Task>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;

    let mut tasks = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let Some([id, size, arrive]) = fields(path, idx, line) else {
            continue;
        };
        let id = parse_u32(path, idx, id)?;
        let size = parse_f64(path, idx, size)?;
        let arrive_time = parse_i64(path, idx, arrive)?;
        if size < 0.0 {
            return Err(CoreError::validation(format!(
                "{}:{}: task {id} has negative size {size}",
                path.display(),
                idx + 1
            )));
        }
        tasks.push(Task::new(TaskId::new(id), size, arrive_time));
    }
    Ok(tasks)
}

/// Reads agents from `id capacity group_id` lines.
///
/// # Errors
///
/// Fails on an unreadable file, a non-numeric token, or a non-positive
/// capacity.
pub fn load_agents(path: impl AsRef<Path>) -> CoreResult<Vec<Agent>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;

    let mut agents = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let Some([id, capacity, group]) = fields(path, idx, line) else {
            continue;
        };
        let id = parse_u32(path, idx, id)?;
        let capacity = parse_f64(path, idx, capacity)?;
        let group = parse_u32(path, idx, group)?;
        if capacity <= 0.0 {
            return Err(CoreError::validation(format!(
                "{}:{}: agent {id} has non-positive capacity {capacity}",
                path.display(),
                idx + 1
            )));
        }
        agents.push(Agent::new(AgentId::new(id), capacity, GroupId::new(group)));
    }
    Ok(agents)
}

/// Reads an undirected weighted graph from `u v weight` lines.
///
/// Duplicate edges keep the first weight read. After reading, the
/// components of the edge set are connected by [`BRIDGE_WEIGHT`] bridges
/// between the smallest vertex of each component, so the loaded topology
/// is always connected. Agents missing from the file stay isolated.
///
/// # Errors
///
/// Fails on an unreadable file or a non-numeric token.
pub fn load_graph(path: impl AsRef<Path>) -> CoreResult<Graph> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;

    let mut graph = Graph::new();
    for (idx, line) in content.lines().enumerate() {
        let Some([u, v, weight]) = fields(path, idx, line) else {
            continue;
        };
        let u = parse_u32(path, idx, u)?;
        let v = parse_u32(path, idx, v)?;
        let weight = parse_f64(path, idx, weight)?;
        graph.add_vertex(AgentId::new(u));
        graph.add_vertex(AgentId::new(v));
        graph.add_edge(AgentId::new(u), AgentId::new(v), weight);
    }

    bridge_components(&mut graph);
    Ok(graph)
}

/// Connects all components of the edge set to the first one.
fn bridge_components(graph: &mut Graph) {
    let components = graph.components();
    if components.len() < 2 {
        return;
    }
    let anchor = components[0][0];
    for component in &components[1..] {
        let representative = component[0];
        warn!(
            from = %anchor,
            to = %representative,
            "edge file is disconnected; inserting low-weight bridge"
        );
        graph.add_edge(anchor, representative, BRIDGE_WEIGHT);
    }
}

/// Splits a line into exactly `N` leading whitespace-separated tokens,
/// warning and skipping when fewer are present. Extra tokens are ignored.
fn fields<'a, const N: usize>(path: &Path, idx: usize, line: &'a str) -> Option<[&'a str; N]> {
    let mut out = [""; N];
    let mut tokens = line.split_whitespace();
    for slot in &mut out {
        match tokens.next() {
            Some(token) => *slot = token,
            None => {
                if !line.trim().is_empty() {
                    warn!(
                        path = %path.display(),
                        line = idx + 1,
                        "skipping malformed line"
                    );
                }
                return None;
            }
        }
    }
    Some(out)
}

fn parse_u32(path: &Path, idx: usize, token: &str) -> CoreResult<u32> {
    token
        .parse()
        .map_err(|_| CoreError::numeric_token(path, idx + 1, token))
}

fn parse_i64(path: &Path, idx: usize, token: &str) -> CoreResult<i64> {
    token
        .parse()
        .map_err(|_| CoreError::numeric_token(path, idx + 1, token))
}

fn parse_f64(path: &Path, idx: usize, token: &str) -> CoreResult<f64> {
    token
        .parse()
        .map_err(|_| CoreError::numeric_token(path, idx + 1, token))
}
