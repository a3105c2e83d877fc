use anyhow::{bail, Context, Result};
use clap::Parser;
use csv::{ReaderBuilder, Writer};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use mappath::parser::read_map_file;
use mappath::worker::{spawn_load, spawn_query, LoadMessage, QueryMessage};
use mappath::{Graph, MapError, ParseOptions, PathResult, VertexId};

#[derive(Parser, Debug)]
#[command(name = "mappath")]
#[command(about = "Load a map (vertex coordinates + edges) and find shortest paths between vertex ids.", long_about = None)]
struct Cli {
    /// Path to the map file
    #[arg(short, long)]
    map: String,

    /// Source vertex id. Defaults to the first vertex of the map.
    #[arg(short, long)]
    source: Option<VertexId>,

    /// Target vertex id. Defaults to the second vertex of the map.
    #[arg(short, long)]
    target: Option<VertexId>,

    /// CSV file with a header and one `source,target` pair per row. Overrides --source/--target.
    #[arg(short, long)]
    queries: Option<String>,

    /// Output CSV (query, step, vertex_id, x, y, cumulative_distance).
    #[arg(short, long)]
    out: Option<String>,

    /// Fail on edges that reference undefined vertices instead of skipping them
    #[arg(long, default_value_t = false)]
    strict: bool,

    /// Keep y coordinates as written instead of negating them
    #[arg(long, default_value_t = false)]
    no_flip_y: bool,

    /// Remove every edge of this vertex before querying
    #[arg(long)]
    isolate: Option<VertexId>,

    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("mappath=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mappath=info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_graph(cli: &Cli) -> Result<Graph> {
    let text = read_map_file(&cli.map)?;
    let options = ParseOptions {
        flip_y: !cli.no_flip_y,
        strict: cli.strict,
        ..ParseOptions::default()
    };
    for message in spawn_load(text, options) {
        match message {
            LoadMessage::Progress(p) => debug!(progress = p, "loading map"),
            LoadMessage::Complete(graph) => return Ok(graph),
            LoadMessage::Failed(err) => return Err(err).with_context(|| format!("parsing {}", &cli.map)),
        }
    }
    bail!("map loader stopped without a result")
}

fn parse_queries(path: &str) -> Result<Vec<(VertexId, VertexId)>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("opening {}", path))?;

    let mut queries = Vec::new();
    for result in rdr.records() {
        let record = result?;
        if record.len() < 2 {
            bail!("query row {:?} needs a source and a target", record);
        }
        let source: VertexId = record[0].parse().with_context(|| format!("source id {:?}", &record[0]))?;
        let target: VertexId = record[1].parse().with_context(|| format!("target id {:?}", &record[1]))?;
        queries.push((source, target));
    }
    Ok(queries)
}

fn default_query(cli: &Cli, graph: &Graph) -> Result<(VertexId, VertexId)> {
    let first = graph.vertices.first().map(|v| v.id);
    let second = graph.vertices.get(1).map(|v| v.id).or(first);
    match (cli.source.or(first), cli.target.or(second)) {
        (Some(source), Some(target)) => Ok((source, target)),
        _ => bail!("map has no vertices to query"),
    }
}

fn isolate(graph: Graph, id: VertexId) -> Result<Graph> {
    if !graph.contains(id) {
        bail!("cannot isolate vertex {}: it is not part of the map", id);
    }
    let graph = graph.without_edges_of(id);
    info!(id, "removed all edges of vertex");
    Ok(graph)
}

fn path_rows(query: usize, graph: &Graph, result: &PathResult) -> Vec<[String; 6]> {
    let points = result.coordinates(graph);
    let cumulative = result.cumulative_distances(graph);
    result
        .path
        .iter()
        .zip(&points)
        .zip(&cumulative)
        .enumerate()
        .map(|(step, ((id, point), distance))| {
            [
                query.to_string(),
                step.to_string(),
                id.to_string(),
                point.x.to_string(),
                point.y.to_string(),
                format!("{:.6}", distance),
            ]
        })
        .collect()
}

fn write_path(wtr: &mut Writer<std::fs::File>, query: usize, graph: &Graph, result: &PathResult) -> Result<()> {
    for row in path_rows(query, graph, result) {
        wtr.write_record(&row)?;
    }
    Ok(())
}

/// Runs one query on a worker thread and waits for its answer.
fn run_query(graph: &Arc<Graph>, source: VertexId, target: VertexId) -> Result<std::result::Result<PathResult, MapError>> {
    match spawn_query(Arc::clone(graph), source, target).recv() {
        Ok(QueryMessage::Complete(result)) => Ok(Ok(result)),
        Ok(QueryMessage::Failed(err)) => Ok(Err(err)),
        Err(_) => bail!("query worker for {} -> {} stopped without a result", source, target),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut graph = load_graph(&cli)?;
    if graph.skipped_edges > 0 {
        warn!(skipped = graph.skipped_edges, "edges with unknown endpoints were dropped");
    }
    if let Some(id) = cli.isolate {
        graph = isolate(graph, id)?;
    }
    let graph = Arc::new(graph);

    let queries = match &cli.queries {
        Some(path) => parse_queries(path)?,
        None => vec![default_query(&cli, &graph)?],
    };

    let mut wtr = match &cli.out {
        Some(out_path) => Some(
            Writer::from_path(out_path).with_context(|| format!("creating CSV {}", out_path))?,
        ),
        None => None,
    };
    if let Some(wtr) = wtr.as_mut() {
        wtr.write_record(["query", "step", "vertex_id", "x", "y", "cumulative_distance"])?;
    }

    let mut failures = 0;
    let mut duration_millis = Vec::new();
    for (i, &(source, target)) in queries.iter().enumerate() {
        let now = SystemTime::now();
        let outcome = run_query(&graph, source, target)?;
        if let Ok(elapsed) = now.elapsed() {
            duration_millis.push(elapsed.as_secs_f64() * 1000.0);
        }
        match outcome {
            Ok(result) => {
                let hops: Vec<String> = result.path.iter().map(|id| id.to_string()).collect();
                println!("Shortest path {} -> {}: {}", source, target, hops.join(" -> "));
                println!("Total distance: {:.2}", result.distance);
                if let Some(wtr) = wtr.as_mut() {
                    write_path(wtr, i, &graph, &result)?;
                }
            }
            Err(MapError::Validation { id }) => {
                failures += 1;
                match graph.id_range() {
                    Some((lo, hi)) => println!("Invalid vertex {}. Valid range: {} to {}", id, lo, hi),
                    None => println!("Invalid vertex {}. The map is empty", id),
                }
            }
            Err(err) => {
                failures += 1;
                println!("{}", err);
            }
        }
    }

    if let Some(mut wtr) = wtr {
        wtr.flush()?;
        if let Some(out_path) = &cli.out {
            println!("Wrote paths for {} queries to {}", queries.len() - failures, out_path);
        }
    }
    debug!(?duration_millis, "query timings");

    if !queries.is_empty() && failures == queries.len() {
        bail!("no query produced a path");
    }
    Ok(())
}
