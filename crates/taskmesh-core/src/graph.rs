//! Weighted undirected graph and the shortest-path oracle.
//!
//! The graph is fixed after loading; all distance queries during a run go
//! through [`DistanceOracle`], which memoizes one Dijkstra tree per
//! requested source. Weighted betweenness centrality (Brandes) over
//! arbitrary vertex subsets lives here too, because leader election runs
//! it on group-induced subgraphs.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::types::AgentId;

/// Two weighted path lengths closer than this are treated as equal when
/// counting shortest paths in Brandes' algorithm.
const PATH_EPSILON: f64 = 1e-9;

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

/// Undirected weighted graph over agent ids, without parallel edges.
///
/// The first weight read for a vertex pair wins; later duplicates are
/// ignored. Self-loops are rejected.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    adjacency: BTreeMap<AgentId, Vec<(AgentId, f64)>>,
    edge_count: usize,
}

impl Graph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensures a vertex exists, even when isolated.
    pub fn add_vertex(&mut self, v: AgentId) {
        self.adjacency.entry(v).or_default();
    }

    /// Adds an undirected edge. Returns `false` (and keeps the existing
    /// weight) when the edge is already present or `u == v`.
    pub fn add_edge(&mut self, u: AgentId, v: AgentId, weight: f64) -> bool {
        if u == v || self.edge_weight(u, v).is_some() {
            return false;
        }
        self.adjacency.entry(u).or_default().push((v, weight));
        self.adjacency.entry(v).or_default().push((u, weight));
        self.edge_count += 1;
        true
    }

    /// Returns the weight of the edge `u - v`, if present.
    #[must_use]
    pub fn edge_weight(&self, u: AgentId, v: AgentId) -> Option<f64> {
        self.adjacency
            .get(&u)?
            .iter()
            .find(|(n, _)| *n == v)
            .map(|(_, w)| *w)
    }

    /// Returns `true` if the vertex is known to the graph.
    #[must_use]
    pub fn contains(&self, v: AgentId) -> bool {
        self.adjacency.contains_key(&v)
    }

    /// Neighbors of `v` with edge weights, in insertion order. Unknown
    /// vertices have no neighbors.
    #[must_use]
    pub fn neighbors(&self, v: AgentId) -> &[(AgentId, f64)] {
        self.adjacency.get(&v).map_or(&[], Vec::as_slice)
    }

    /// Degree of `v`.
    #[must_use]
    pub fn degree(&self, v: AgentId) -> usize {
        self.neighbors(v).len()
    }

    /// All vertices in ascending id order.
    pub fn vertices(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.adjacency.keys().copied()
    }

    /// Number of vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Number of undirected edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Connected components, each sorted ascending, ordered by smallest
    /// member id.
    #[must_use]
    pub fn components(&self) -> Vec<Vec<AgentId>> {
        let mut seen: BTreeSet<AgentId> = BTreeSet::new();
        let mut components = Vec::new();
        for start in self.adjacency.keys().copied() {
            if seen.contains(&start) {
                continue;
            }
            let mut component = Vec::new();
            let mut stack = vec![start];
            seen.insert(start);
            while let Some(v) = stack.pop() {
                component.push(v);
                for &(n, _) in self.neighbors(v) {
                    if seen.insert(n) {
                        stack.push(n);
                    }
                }
            }
            component.sort_unstable();
            components.push(component);
        }
        components
    }

    /// Weighted betweenness centrality (Brandes) restricted to the
    /// subgraph induced by `vertices`.
    ///
    /// Scores are relative (unnormalized, halved for the undirected
    /// double-count); only the ranking matters to callers.
    #[must_use]
    pub fn betweenness(&self, vertices: &BTreeSet<AgentId>) -> BTreeMap<AgentId, f64> {
        let mut centrality: BTreeMap<AgentId, f64> =
            vertices.iter().map(|&v| (v, 0.0)).collect();

        for &source in vertices {
            // Single-source shortest paths over the induced subgraph,
            // tracking path counts and predecessor lists.
            let mut dist: HashMap<AgentId, f64> = HashMap::new();
            let mut sigma: HashMap<AgentId, f64> = HashMap::new();
            let mut preds: HashMap<AgentId, Vec<AgentId>> = HashMap::new();
            let mut settled: Vec<AgentId> = Vec::new();
            let mut done: BTreeSet<AgentId> = BTreeSet::new();
            let mut heap: BinaryHeap<MinCost> = BinaryHeap::new();

            dist.insert(source, 0.0);
            sigma.insert(source, 1.0);
            heap.push(MinCost {
                cost: 0.0,
                vertex: source,
            });

            while let Some(MinCost { cost, vertex }) = heap.pop() {
                if cost > dist[&vertex] + PATH_EPSILON || !done.insert(vertex) {
                    continue; // stale heap entry
                }
                settled.push(vertex);

                for &(next, weight) in self.neighbors(vertex) {
                    if !vertices.contains(&next) {
                        continue;
                    }
                    let candidate = cost + weight;
                    let known = dist.get(&next).copied().unwrap_or(f64::INFINITY);
                    if candidate + PATH_EPSILON < known {
                        dist.insert(next, candidate);
                        sigma.insert(next, sigma[&vertex]);
                        preds.insert(next, vec![vertex]);
                        heap.push(MinCost {
                            cost: candidate,
                            vertex: next,
                        });
                    } else if (candidate - known).abs() <= PATH_EPSILON {
                        *sigma.entry(next).or_insert(0.0) += sigma[&vertex];
                        preds.entry(next).or_default().push(vertex);
                    }
                }
            }

            // Dependency accumulation in reverse settle order.
            let mut delta: HashMap<AgentId, f64> = HashMap::new();
            for &w in settled.iter().rev() {
                let coeff = (1.0 + delta.get(&w).copied().unwrap_or(0.0)) / sigma[&w];
                if let Some(ps) = preds.get(&w) {
                    for &p in ps {
                        *delta.entry(p).or_insert(0.0) += sigma[&p] * coeff;
                    }
                }
                if w != source {
                    if let Some(score) = centrality.get_mut(&w) {
                        *score += delta.get(&w).copied().unwrap_or(0.0);
                    }
                }
            }
        }

        // Each undirected pair was counted from both endpoints.
        for score in centrality.values_mut() {
            *score /= 2.0;
        }
        centrality
    }
}

/// Min-heap entry ordered by cost (total order over f64), then vertex id.
#[derive(Debug, Clone, Copy, PartialEq)]
struct MinCost {
    cost: f64,
    vertex: AgentId,
}

impl Eq for MinCost {}

impl Ord for MinCost {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; invert for min-by-cost behavior.
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.vertex.cmp(&self.vertex))
    }
}

impl PartialOrd for MinCost {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// ---------------------------------------------------------------------------
// DistanceOracle
// ---------------------------------------------------------------------------

/// One Dijkstra tree: distances and predecessors from a fixed source.
#[derive(Debug)]
struct ShortestPathTree {
    dist: HashMap<AgentId, f64>,
    prev: HashMap<AgentId, AgentId>,
}

/// Shortest-path oracle over the immutable run graph.
///
/// Queries memoize one [`ShortestPathTree`] per source behind a read-write
/// lock, so `&self` access stays cheap and the oracle is `Sync` for
/// parallel batch drivers. Unreachable pairs report `f64::INFINITY`
/// distance and an empty path; callers treat that as "skip this pair".
#[derive(Debug)]
pub struct DistanceOracle {
    graph: Graph,
    trees: RwLock<HashMap<AgentId, Arc<ShortestPathTree>>>,
}

impl DistanceOracle {
    /// Wraps a loaded graph.
    #[must_use]
    pub fn new(graph: Graph) -> Self {
        Self {
            graph,
            trees: RwLock::new(HashMap::new()),
        }
    }

    /// The underlying graph.
    #[must_use]
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Shortest-path distance from `u` to `v`; `f64::INFINITY` when
    /// unreachable. `distance(v, v)` is 0 even for isolated vertices.
    #[must_use]
    pub fn distance(&self, u: AgentId, v: AgentId) -> f64 {
        if u == v {
            return 0.0;
        }
        self.tree(u)
            .dist
            .get(&v)
            .copied()
            .unwrap_or(f64::INFINITY)
    }

    /// Shortest path from `u` to `v` inclusive of both endpoints; empty
    /// when unreachable.
    #[must_use]
    pub fn path(&self, u: AgentId, v: AgentId) -> Vec<AgentId> {
        if u == v {
            return vec![u];
        }
        let tree = self.tree(u);
        if !tree.dist.contains_key(&v) {
            return Vec::new();
        }
        let mut path = vec![v];
        let mut current = v;
        while current != u {
            current = tree.prev[&current];
            path.push(current);
        }
        path.reverse();
        path
    }

    /// Computes Dijkstra trees for every vertex up front. Useful before
    /// phases that query most pairs anyway.
    pub fn prewarm(&self) {
        for v in self.graph.vertices() {
            let _ = self.tree(v);
        }
    }

    fn tree(&self, source: AgentId) -> Arc<ShortestPathTree> {
        if let Some(tree) = self.trees.read().get(&source) {
            return Arc::clone(tree);
        }
        let tree = Arc::new(self.dijkstra(source));
        self.trees.write().insert(source, Arc::clone(&tree));
        tree
    }

    fn dijkstra(&self, source: AgentId) -> ShortestPathTree {
        let mut dist: HashMap<AgentId, f64> = HashMap::new();
        let mut prev: HashMap<AgentId, AgentId> = HashMap::new();
        let mut heap: BinaryHeap<MinCost> = BinaryHeap::new();

        if self.graph.contains(source) {
            dist.insert(source, 0.0);
            heap.push(MinCost {
                cost: 0.0,
                vertex: source,
            });
        }

        while let Some(MinCost { cost, vertex }) = heap.pop() {
            if cost > dist[&vertex] {
                continue; // stale entry
            }
            for &(next, weight) in self.graph.neighbors(vertex) {
                let candidate = cost + weight;
                if candidate < dist.get(&next).copied().unwrap_or(f64::INFINITY) {
                    dist.insert(next, candidate);
                    prev.insert(next, vertex);
                    heap.push(MinCost {
                        cost: candidate,
                        vertex: next,
                    });
                }
            }
        }

        ShortestPathTree { dist, prev }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(v: u32) -> AgentId {
        AgentId::new(v)
    }

    fn diamond() -> Graph {
        // 0 - 1 - 3 plus the slower direct 0 - 3
        let mut g = Graph::new();
        g.add_edge(id(0), id(1), 1.0);
        g.add_edge(id(1), id(3), 1.0);
        g.add_edge(id(0), id(3), 5.0);
        g.add_edge(id(1), id(2), 2.0);
        g
    }

    #[test]
    fn duplicate_edges_keep_first_weight() {
        let mut g = Graph::new();
        assert!(g.add_edge(id(0), id(1), 2.5));
        assert!(!g.add_edge(id(1), id(0), 9.0));
        assert_eq!(g.edge_weight(id(0), id(1)), Some(2.5));
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn self_loops_rejected() {
        let mut g = Graph::new();
        assert!(!g.add_edge(id(4), id(4), 1.0));
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn dijkstra_prefers_cheaper_multi_hop_route() {
        let oracle = DistanceOracle::new(diamond());
        assert!((oracle.distance(id(0), id(3)) - 2.0).abs() < 1e-12);
        assert_eq!(oracle.path(id(0), id(3)), vec![id(0), id(1), id(3)]);
    }

    #[test]
    fn unreachable_pairs_report_infinity_and_empty_path() {
        let mut g = diamond();
        g.add_vertex(id(9));
        let oracle = DistanceOracle::new(g);
        assert!(oracle.distance(id(0), id(9)).is_infinite());
        assert!(oracle.path(id(0), id(9)).is_empty());
        // Missing vertices behave like isolated ones.
        assert!(oracle.distance(id(0), id(77)).is_infinite());
        assert!((oracle.distance(id(77), id(77)) - 0.0).abs() < 1e-12);
    }

    #[test]
    fn components_split_and_sort() {
        let mut g = Graph::new();
        g.add_edge(id(0), id(1), 1.0);
        g.add_edge(id(5), id(4), 1.0);
        g.add_vertex(id(9));
        let comps = g.components();
        assert_eq!(comps, vec![vec![id(0), id(1)], vec![id(4), id(5)], vec![id(9)]]);
    }

    #[test]
    fn betweenness_ranks_path_center_highest() {
        // Path 0 - 1 - 2: all pairs route through 1.
        let mut g = Graph::new();
        g.add_edge(id(0), id(1), 1.0);
        g.add_edge(id(1), id(2), 1.0);
        let verts: BTreeSet<AgentId> = [id(0), id(1), id(2)].into_iter().collect();
        let bc = g.betweenness(&verts);
        assert!(bc[&id(1)] > bc[&id(0)]);
        assert!(bc[&id(1)] > bc[&id(2)]);
        assert!((bc[&id(0)] - 0.0).abs() < 1e-12);
    }

    #[test]
    fn betweenness_respects_induced_subgraph() {
        // 1 is central in the full graph, but excluded from the subset.
        let mut g = Graph::new();
        g.add_edge(id(0), id(1), 1.0);
        g.add_edge(id(1), id(2), 1.0);
        g.add_edge(id(0), id(2), 10.0);
        let verts: BTreeSet<AgentId> = [id(0), id(2)].into_iter().collect();
        let bc = g.betweenness(&verts);
        // Only the direct (heavy) edge exists inside the subset.
        assert!((bc[&id(0)] - 0.0).abs() < 1e-12);
        assert!((bc[&id(2)] - 0.0).abs() < 1e-12);
    }

    #[test]
    fn betweenness_counts_equal_weight_paths() {
        // Square 0-1-3, 0-2-3 with equal weights: 1 and 2 split the credit.
        let mut g = Graph::new();
        g.add_edge(id(0), id(1), 1.0);
        g.add_edge(id(1), id(3), 1.0);
        g.add_edge(id(0), id(2), 1.0);
        g.add_edge(id(2), id(3), 1.0);
        let verts: BTreeSet<AgentId> = (0..4).map(id).collect();
        let bc = g.betweenness(&verts);
        assert!((bc[&id(1)] - bc[&id(2)]).abs() < 1e-9);
        assert!(bc[&id(1)] > 0.0);
    }
}
