/*
Map file parsing.

    <vertexCount> [ignored...]
    <id> <x> <y>        vertexCount times
    <from> <to>         one undirected edge per remaining line

`GraphParser` is an iterator: every call to `next` consumes one chunk of
records and yields the progress reached so far, so a caller can interleave
parsing with other work. `finish` runs whatever is left and hands back the
graph. Chunking only changes how often progress is reported, never the result.
*/

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::str::FromStr;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::errors::{MapError, Result};
use crate::graph::{Graph, Vertex, VertexId};

#[derive(Clone, Debug)]
pub struct ParseOptions {
    /// Negate y so that "up" on the map is up on screen.
    pub flip_y: bool,
    /// Fail on edges with an undefined endpoint instead of skipping them.
    pub strict: bool,
    pub vertex_chunk: usize,
    pub edge_chunk: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            flip_y: true,
            strict: false,
            vertex_chunk: 5000,
            edge_chunk: 10000,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ParseEvent {
    /// Percentage of the file processed, in `[0, 100]`, never decreasing.
    Progress(u8),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Phase {
    Header,
    Vertices,
    Edges,
    Done,
}

pub struct GraphParser<'a> {
    lines: Vec<&'a str>,
    options: ParseOptions,
    phase: Phase,
    vertex_count: usize,
    /// Index into `lines` of the next record to read.
    cursor: usize,
    graph: Graph,
    progress: u8,
    failed: bool,
    started: Instant,
}

impl<'a> GraphParser<'a> {
    pub fn new(text: &'a str, options: ParseOptions) -> Self {
        Self {
            lines: text.trim_end().lines().collect(),
            options,
            phase: Phase::Header,
            vertex_count: 0,
            cursor: 0,
            graph: Graph::default(),
            progress: 0,
            failed: false,
            started: Instant::now(),
        }
    }

    /// Parses the rest of the input and returns the graph.
    pub fn finish(mut self) -> Result<Graph> {
        while let Some(event) = self.next() {
            event?;
        }
        Ok(self.graph)
    }

    fn edge_count(&self) -> usize {
        self.lines.len().saturating_sub(1 + self.vertex_count)
    }

    fn read_header(&mut self) -> Result<()> {
        let header = self
            .lines
            .first()
            .ok_or_else(|| MapError::malformed(1, "missing vertex count"))?;
        let count = header
            .split_whitespace()
            .next()
            .ok_or_else(|| MapError::malformed(1, "missing vertex count"))?;
        self.vertex_count = count
            .parse()
            .map_err(|_| MapError::malformed(1, format!("invalid vertex count {:?}", count)))?;
        let needed = self.vertex_count.checked_add(1).ok_or_else(|| {
            MapError::malformed(1, format!("vertex count {} is too large", count))
        })?;
        if self.lines.len() < needed {
            return Err(MapError::malformed(
                self.lines.len() + 1,
                format!("expected {} vertex records", self.vertex_count),
            ));
        }
        self.graph = Graph::with_capacity(self.vertex_count);
        self.cursor = 1;
        Ok(())
    }

    fn read_vertex_chunk(&mut self) -> Result<u8> {
        let end = (self.cursor + self.options.vertex_chunk.max(1)).min(1 + self.vertex_count);
        for i in self.cursor..end {
            let line = i + 1;
            let record = self.lines[i];
            let mut fields = record.split_whitespace();
            let id: VertexId = field(&mut fields, line, "vertex id")?;
            let x = coordinate(&mut fields, line, "x coordinate")?;
            let y = coordinate(&mut fields, line, "y coordinate")?;
            let y = if self.options.flip_y { -y } else { y };
            if !self.graph.add_vertex(Vertex { id, x, y }) {
                return Err(MapError::malformed(line, format!("duplicate vertex id {}", id)));
            }
        }
        self.cursor = end;
        let done = end - 1;
        debug!(done, total = self.vertex_count, "read vertex chunk");
        Ok(percent(done, self.vertex_count, 0))
    }

    fn read_edge_chunk(&mut self) -> Result<u8> {
        let end = (self.cursor + self.options.edge_chunk.max(1)).min(self.lines.len());
        for i in self.cursor..end {
            let line = i + 1;
            let record = self.lines[i];
            let mut fields = record.split_whitespace();
            let from: VertexId = field(&mut fields, line, "edge source")?;
            let to: VertexId = field(&mut fields, line, "edge target")?;
            if let Err(id) = self.graph.add_edge(from, to) {
                if self.options.strict {
                    return Err(MapError::DanglingEdge { line, id });
                }
                debug!(line, id, "skipping edge with unknown endpoint");
                self.graph.skipped_edges += 1;
            }
        }
        self.cursor = end;
        let first_edge = 1 + self.vertex_count;
        debug!(done = end - first_edge, total = self.edge_count(), "read edge chunk");
        Ok(percent(end - first_edge, self.edge_count(), 50))
    }

    fn step(&mut self) -> Result<u8> {
        match self.phase {
            Phase::Header => {
                self.read_header()?;
                self.phase = Phase::Vertices;
                self.step()
            }
            Phase::Vertices => {
                let progress = self.read_vertex_chunk()?;
                if self.cursor == 1 + self.vertex_count {
                    self.phase = Phase::Edges;
                }
                Ok(progress)
            }
            Phase::Edges => {
                let progress = self.read_edge_chunk()?;
                if self.cursor == self.lines.len() {
                    self.phase = Phase::Done;
                    info!(
                        vertices = self.graph.vertex_count(),
                        edges = self.graph.edge_count(),
                        skipped = self.graph.skipped_edges,
                        elapsed_ms = self.started.elapsed().as_millis() as u64,
                        "parsed map"
                    );
                }
                Ok(progress)
            }
            Phase::Done => Ok(100),
        }
    }
}

impl<'a> Iterator for GraphParser<'a> {
    type Item = Result<ParseEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.phase == Phase::Done {
            return None;
        }
        match self.step() {
            Ok(progress) => {
                self.progress = self.progress.max(progress);
                Some(Ok(ParseEvent::Progress(self.progress)))
            }
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

/// Share of `done` out of `total` mapped onto `[offset, offset + 50]`.
fn percent(done: usize, total: usize, offset: u8) -> u8 {
    if total == 0 {
        return offset + 50;
    }
    offset + ((done.min(total) * 50) / total) as u8
}

fn field<'s, T: FromStr>(
    fields: &mut impl Iterator<Item = &'s str>,
    line: usize,
    name: &str,
) -> Result<T> {
    let raw = fields
        .next()
        .ok_or_else(|| MapError::malformed(line, format!("missing {}", name)))?;
    raw.parse()
        .map_err(|_| MapError::malformed(line, format!("invalid {} {:?}", name, raw)))
}

/// Like `field`, but `nan` and `inf` are rejected: weights must be real distances.
fn coordinate<'s>(fields: &mut impl Iterator<Item = &'s str>, line: usize, name: &str) -> Result<f64> {
    let value: f64 = field(fields, line, name)?;
    if !value.is_finite() {
        return Err(MapError::malformed(line, format!("non-finite {} {}", name, value)));
    }
    Ok(value)
}

/// Parses a map with default options.
pub fn parse(text: &str) -> Result<Graph> {
    GraphParser::new(text, ParseOptions::default()).finish()
}

/// Parses a map, reporting progress after every chunk. A panicking callback
/// is logged and otherwise ignored.
pub fn parse_with_progress<F: FnMut(u8)>(
    text: &str,
    options: ParseOptions,
    mut on_progress: F,
) -> Result<Graph> {
    let mut parser = GraphParser::new(text, options);
    while let Some(event) = parser.next() {
        let ParseEvent::Progress(p) = event?;
        if panic::catch_unwind(AssertUnwindSafe(|| on_progress(p))).is_err() {
            warn!(progress = p, "progress callback panicked");
        }
    }
    Ok(parser.graph)
}

/// Reads a map file into memory.
pub fn read_map_file(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    std::fs::read_to_string(path).map_err(|source| MapError::Io {
        path: path.to_path_buf(),
        source,
    })
}
