pub mod dijkstra;
pub mod errors;
pub mod geo;
pub mod graph;
pub mod heap;
pub mod parser;
pub mod worker;

pub use dijkstra::{find_path, shortest_path, PathResult};
pub use errors::{MapError, Result};
pub use graph::{AdjacencyMap, Cost, Edge, Graph, Vertex, VertexId};
pub use heap::IndexedMinHeap;
pub use parser::{parse, parse_with_progress, GraphParser, ParseEvent, ParseOptions};
