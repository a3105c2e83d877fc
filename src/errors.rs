use std::path::PathBuf;
use thiserror::Error;

use crate::graph::VertexId;

pub type Result<T> = std::result::Result<T, MapError>;

#[derive(Debug, Error)]
pub enum MapError {
    /// A line of the map file does not have the shape its section requires.
    #[error("malformed record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    /// Edge endpoint that no vertex record defines. Only raised in strict mode.
    #[error("edge at line {line} references unknown vertex {id}")]
    DanglingEdge { line: usize, id: VertexId },

    /// Query endpoint that is not part of the loaded map.
    #[error("vertex {id} is not part of the map")]
    Validation { id: VertexId },

    #[error("no path from {from} to {to}")]
    NoPath { from: VertexId, to: VertexId },

    #[error("failed to read map file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MapError {
    pub(crate) fn malformed(line: usize, reason: impl Into<String>) -> Self {
        MapError::MalformedRecord {
            line,
            reason: reason.into(),
        }
    }
}
