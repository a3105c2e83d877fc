/*
Background workers for loading and querying, so an interactive caller never
blocks on a large map. Spawning a worker is the "start" request. The worker
then sends zero or more progress messages followed by exactly one terminal
message. There is no cancellation: a caller that loses interest drops the
receiver, and the worker's remaining sends fail silently.
*/

use std::sync::mpsc::{channel, Receiver};
use std::sync::Arc;
use std::thread;

use tracing::debug;

use crate::dijkstra::{shortest_path, PathResult};
use crate::errors::MapError;
use crate::graph::{Graph, VertexId};
use crate::parser::{parse_with_progress, ParseOptions};

#[derive(Debug)]
pub enum LoadMessage {
    Progress(u8),
    Complete(Graph),
    Failed(MapError),
}

#[derive(Debug)]
pub enum QueryMessage {
    Complete(PathResult),
    Failed(MapError),
}

/// Parses `text` on a worker thread.
pub fn spawn_load(text: String, options: ParseOptions) -> Receiver<LoadMessage> {
    let (tx, rx) = channel();
    thread::spawn(move || {
        let progress_tx = tx.clone();
        let result = parse_with_progress(&text, options, |p| {
            let _ = progress_tx.send(LoadMessage::Progress(p));
        });
        let message = match result {
            Ok(graph) => LoadMessage::Complete(graph),
            Err(err) => LoadMessage::Failed(err),
        };
        if tx.send(message).is_err() {
            debug!("load result dropped, receiver gone");
        }
    });
    rx
}

/// Runs one shortest-path query on a worker thread. The graph is only read.
pub fn spawn_query(graph: Arc<Graph>, source: VertexId, target: VertexId) -> Receiver<QueryMessage> {
    let (tx, rx) = channel();
    thread::spawn(move || {
        let message = match shortest_path(&graph, source, target) {
            Ok(result) => QueryMessage::Complete(result),
            Err(err) => QueryMessage::Failed(err),
        };
        if tx.send(message).is_err() {
            debug!(source, target, "query result dropped, receiver gone");
        }
    });
    rx
}
