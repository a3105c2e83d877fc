use fnv::FnvHashMap;
use std::time::Instant;
use tracing::{debug, info};

use crate::errors::{MapError, Result};
use crate::geo::Point;
use crate::graph::{AdjacencyMap, Cost, Graph, VertexId};
use crate::heap::IndexedMinHeap;

#[derive(Clone, Debug, PartialEq)]
pub struct PathResult {
    /// Vertex ids from source to target, both included.
    pub path: Vec<VertexId>,
    /// Unrounded sum of the edge weights along `path`.
    pub distance: Cost,
    /// Number of vertices taken off the frontier before the target was reached.
    pub settled: usize,
}

impl PathResult {
    /// Map coordinates of the path, for drawing it.
    pub fn coordinates(&self, graph: &Graph) -> Vec<Point> {
        self.path
            .iter()
            .filter_map(|&id| graph.vertex(id).map(|v| v.point()))
            .collect()
    }

    /// Distance from the source at every step of the path, summed from the
    /// edge weights in the same order the search added them. The last value
    /// equals `distance`.
    pub fn cumulative_distances(&self, graph: &Graph) -> Vec<Cost> {
        let mut total = 0.0;
        let mut out = Vec::with_capacity(self.path.len());
        out.push(total);
        for hop in self.path.windows(2) {
            total += graph.edge_weight(hop[0], hop[1]).unwrap_or(Cost::INFINITY);
            out.push(total);
        }
        out
    }
}

pub fn shortest_path(graph: &Graph, source: VertexId, target: VertexId) -> Result<PathResult> {
    find_path(&graph.adjacency, source, target)
}

/// Dijkstra from `source`, stopping as soon as `target` leaves the frontier.
/// Every call builds its own distance table, predecessor table and heap.
pub fn find_path(adjacency: &AdjacencyMap, source: VertexId, target: VertexId) -> Result<PathResult> {
    for id in [source, target] {
        if !adjacency.contains_key(&id) {
            return Err(MapError::Validation { id });
        }
    }
    if source == target {
        return Ok(PathResult {
            path: vec![source],
            distance: 0.0,
            settled: 0,
        });
    }

    let now = Instant::now();
    let mut dist: FnvHashMap<VertexId, Cost> = FnvHashMap::default();
    let mut prev: FnvHashMap<VertexId, VertexId> = FnvHashMap::default();
    let mut frontier = IndexedMinHeap::new();

    dist.insert(source, 0.0);
    frontier.insert(source, 0.0);

    let mut settled = 0;
    let mut reached = false;
    while let Some(u) = frontier.extract_min() {
        settled += 1;
        if u == target {
            reached = true;
            break;
        }
        let cost = dist[&u];
        for edge in adjacency.get(&u).into_iter().flatten() {
            let alt = cost + edge.weight;
            if alt < dist.get(&edge.to).copied().unwrap_or(Cost::INFINITY) {
                dist.insert(edge.to, alt);
                prev.insert(edge.to, u);
                if frontier.contains(edge.to) {
                    frontier.decrease_key(edge.to, alt);
                } else {
                    frontier.insert(edge.to, alt);
                }
            }
        }
    }

    if !reached {
        debug!(source, target, settled, "target unreachable");
        return Err(MapError::NoPath { from: source, to: target });
    }

    let path = reconstruct_path(&prev, source, target)?;
    let distance = dist[&target];
    info!(
        source,
        target,
        distance,
        hops = path.len() - 1,
        settled,
        elapsed_us = now.elapsed().as_micros() as u64,
        "found shortest path"
    );
    Ok(PathResult {
        path,
        distance,
        settled,
    })
}

/// Walks the predecessor chain back from `target` and returns it in source-to-target order.
fn reconstruct_path(
    prev: &FnvHashMap<VertexId, VertexId>,
    source: VertexId,
    target: VertexId,
) -> Result<Vec<VertexId>> {
    let mut path = vec![target];
    let mut current = target;
    while current != source {
        current = *prev.get(&current).ok_or(MapError::NoPath {
            from: source,
            to: target,
        })?;
        path.push(current);
    }
    path.reverse();
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Edge;

    fn adjacency(edges: &[(VertexId, VertexId, Cost)]) -> AdjacencyMap {
        let mut adj = AdjacencyMap::default();
        for &(a, b, w) in edges {
            adj.entry(a).or_default().push(Edge { to: b, weight: w });
            adj.entry(b).or_default().push(Edge { to: a, weight: w });
        }
        adj
    }

    #[test]
    fn picks_cheaper_of_two_routes() {
        let adj = adjacency(&[(1, 2, 3.0), (2, 3, 4.0), (1, 3, 5.0), (3, 4, 3.0)]);
        let result = find_path(&adj, 1, 4).unwrap();
        assert_eq!(result.path, vec![1, 3, 4]);
        assert_eq!(result.distance, 8.0);
    }

    #[test]
    fn decrease_key_updates_route() {
        // 3 is first queued via the direct edge (10) and later improved via 2 (1 + 1)
        let adj = adjacency(&[(1, 3, 10.0), (1, 2, 1.0), (2, 3, 1.0), (3, 4, 1.0)]);
        let result = find_path(&adj, 1, 4).unwrap();
        assert_eq!(result.path, vec![1, 2, 3, 4]);
        assert_eq!(result.distance, 3.0);
    }

    #[test]
    fn stops_once_target_is_settled() {
        let adj = adjacency(&[(1, 2, 1.0), (1, 3, 5.0), (3, 4, 1.0), (4, 5, 1.0)]);
        let result = find_path(&adj, 1, 2).unwrap();
        assert_eq!(result.path, vec![1, 2]);
        assert_eq!(result.settled, 2);
    }

    #[test]
    fn zero_weight_edges() {
        let adj = adjacency(&[(1, 2, 0.0), (2, 3, 0.0), (1, 3, 1.0)]);
        let result = find_path(&adj, 1, 3).unwrap();
        assert_eq!(result.path, vec![1, 2, 3]);
        assert_eq!(result.distance, 0.0);
    }

    #[test]
    fn source_equals_target() {
        let adj = adjacency(&[(1, 2, 3.0)]);
        let result = find_path(&adj, 2, 2).unwrap();
        assert_eq!(result.path, vec![2]);
        assert_eq!(result.distance, 0.0);
    }

    #[test]
    fn unknown_ids_fail_validation() {
        let adj = adjacency(&[(1, 2, 3.0)]);
        assert!(matches!(find_path(&adj, 9, 1), Err(MapError::Validation { id: 9 })));
        assert!(matches!(find_path(&adj, 1, 9), Err(MapError::Validation { id: 9 })));
        assert!(matches!(find_path(&adj, 8, 9), Err(MapError::Validation { id: 8 })));
        assert!(matches!(find_path(&adj, 9, 9), Err(MapError::Validation { id: 9 })));
    }

    #[test]
    fn disconnected_target_has_no_path() {
        let mut adj = adjacency(&[(1, 2, 3.0), (3, 4, 1.0)]);
        adj.insert(5, Vec::new());
        assert!(matches!(find_path(&adj, 1, 4), Err(MapError::NoPath { from: 1, to: 4 })));
        assert!(matches!(find_path(&adj, 5, 1), Err(MapError::NoPath { from: 5, to: 1 })));
    }

    #[test]
    fn cumulative_distances_end_at_the_reported_distance() {
        let graph = crate::parser::parse("4\n1 0 0\n2 0.1 0.2\n3 0.3 0.7\n4 1.1 0.9\n1 2\n2 3\n3 4\n").unwrap();
        let result = shortest_path(&graph, 1, 4).unwrap();
        let steps = result.cumulative_distances(&graph);
        assert_eq!(steps.len(), 4);
        assert_eq!(steps[0], 0.0);
        assert_eq!(steps[3], result.distance);
        assert!(steps.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn broken_predecessor_chain_is_no_path() {
        let mut prev = FnvHashMap::default();
        prev.insert(3, 2);
        assert_eq!(reconstruct_path(&prev, 2, 3).unwrap(), vec![2, 3]);
        assert!(matches!(reconstruct_path(&prev, 1, 3), Err(MapError::NoPath { .. })));
    }
}
