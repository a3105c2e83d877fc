use fnv::FnvHashMap;

use crate::geo::Point;

pub type VertexId = i64;
pub type Cost = f64;

/// Outgoing edges per vertex. Undirected edges are stored once in each direction.
pub type AdjacencyMap = FnvHashMap<VertexId, Vec<Edge>>;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Vertex {
    pub id: VertexId,
    pub x: f64,
    pub y: f64,
}

impl Vertex {
    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Edge {
    pub to: VertexId,
    /// Euclidean length of the edge, fixed when the map is loaded.
    pub weight: Cost,
}

/// A loaded map. Read-only once built; share it behind an `Arc` to query from several threads.
#[derive(Clone, Debug, Default)]
pub struct Graph {
    pub vertices: Vec<Vertex>,
    pub adjacency: AdjacencyMap,
    /// Edge records dropped because an endpoint was not defined.
    pub skipped_edges: usize,
    index: FnvHashMap<VertexId, usize>,
}

impl Graph {
    pub(crate) fn with_capacity(vertex_count: usize) -> Self {
        let mut adjacency = AdjacencyMap::default();
        adjacency.reserve(vertex_count);
        let mut index = FnvHashMap::default();
        index.reserve(vertex_count);
        Self {
            vertices: Vec::with_capacity(vertex_count),
            adjacency,
            skipped_edges: 0,
            index,
        }
    }

    /// Adds a vertex with no edges. Returns false if the id is already taken.
    pub(crate) fn add_vertex(&mut self, vertex: Vertex) -> bool {
        if self.index.contains_key(&vertex.id) {
            return false;
        }
        self.index.insert(vertex.id, self.vertices.len());
        self.adjacency.insert(vertex.id, Vec::new());
        self.vertices.push(vertex);
        true
    }

    /// Adds the undirected edge `a - b`. Returns the weight, or the first
    /// endpoint that is not a vertex of this graph.
    pub(crate) fn add_edge(&mut self, a: VertexId, b: VertexId) -> Result<Cost, VertexId> {
        let pa = self.vertex(a).ok_or(a)?.point();
        let pb = self.vertex(b).ok_or(b)?.point();
        let weight = pa.distance_to(&pb);
        if let Some(edges) = self.adjacency.get_mut(&a) {
            edges.push(Edge { to: b, weight });
        }
        if let Some(edges) = self.adjacency.get_mut(&b) {
            edges.push(Edge { to: a, weight });
        }
        Ok(weight)
    }

    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.index.get(&id).map(|&i| &self.vertices[i])
    }

    pub fn contains(&self, id: VertexId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn neighbors(&self, id: VertexId) -> &[Edge] {
        self.adjacency.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Weight of the edge `a -> b`, if there is one.
    pub fn edge_weight(&self, a: VertexId, b: VertexId) -> Option<Cost> {
        self.neighbors(a).iter().find(|e| e.to == b).map(|e| e.weight)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of undirected edges, i.e. half the directed entries.
    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(Vec::len).sum::<usize>() / 2
    }

    /// Smallest and largest vertex id, for "valid range" messages.
    pub fn id_range(&self) -> Option<(VertexId, VertexId)> {
        let min = self.vertices.iter().map(|v| v.id).min()?;
        let max = self.vertices.iter().map(|v| v.id).max()?;
        Some((min, max))
    }

    /// Vertex nearest to `point`, e.g. the vertex under a click on the map.
    pub fn closest_vertex(&self, point: &Point) -> Option<&Vertex> {
        self.vertices.iter().min_by(|a, b| {
            a.point()
                .distance_to(point)
                .total_cmp(&b.point().distance_to(point))
        })
    }

    /// Copy of this graph with every edge touching `id` removed.
    pub fn without_edges_of(&self, id: VertexId) -> Graph {
        let mut graph = self.clone();
        for (&from, edges) in graph.adjacency.iter_mut() {
            if from == id {
                edges.clear();
            } else {
                edges.retain(|e| e.to != id);
            }
        }
        graph
    }
}
