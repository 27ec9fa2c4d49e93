use crate::errors::{ArgusError, ArgusResult};
use crate::node::Pdg;
use crate::utils::Config;
use crate::{ast, cfg, dfg, esprima};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Produce the full dependency graph of one JavaScript file: external parse,
/// AST ingestion, control-flow edges, then data-flow edges under the
/// configured wall-clock cap.
pub fn build_pdg(config: &Config, file: &Path) -> ArgusResult<Pdg> {
    let start = Instant::now();
    let ast_doc = esprima::parse_ast(&config.parser, file)?;
    let mut graph = ast::ast_to_pdg(&ast_doc)?;
    cfg::build_cfg(&mut graph);
    let timeout = config.analyzer.file_timeout_secs.map(Duration::from_secs);
    let unknown = dfg::add_data_flow(&mut graph, file, timeout)?;
    if !unknown.is_empty() {
        debug!(
            target: "pdg",
            "{}: {} uses never found a definition",
            file.display(),
            unknown.len()
        );
    }
    debug!(
        target: "pdg",
        "built {} ({} nodes) in {:.3}s",
        file.display(),
        graph.len(),
        start.elapsed().as_secs_f32()
    );
    Ok(graph)
}

/// Persist a graph next to its siblings, atomically: the document is written
/// to a temporary sibling and renamed into place, and a failed write never
/// leaves a partial artifact behind.
pub fn store_pdg(graph: &Pdg, dir: &Path, source: &Path) -> ArgusResult<PathBuf> {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| ArgusError::Serialization(format!("unusable name {}", source.display())))?;
    let target = dir.join(format!("{stem}.pdg"));
    let staging = dir.join(format!("{stem}.pdg.tmp"));

    let result = write_graph(graph, &staging).and_then(|()| {
        fs::rename(&staging, &target)
            .map_err(|e| ArgusError::Serialization(format!("{}: {e}", target.display())))
    });
    if result.is_err() {
        let _ = fs::remove_file(&staging);
    }
    result.map(|()| target)
}

fn write_graph(graph: &Pdg, path: &Path) -> ArgusResult<()> {
    let file = fs::File::create(path)
        .map_err(|e| ArgusError::Serialization(format!("{}: {e}", path.display())))?;
    serde_json::to_writer(std::io::BufWriter::new(file), graph)
        .map_err(|e| ArgusError::Serialization(format!("{}: {e}", path.display())))
}

/// Load a stored graph, or `None` when it exceeds the size ceiling (huge
/// graphs drown feature extraction; the file is skipped, not failed).
pub fn load_pdg(path: &Path, max_bytes: u64) -> ArgusResult<Option<Pdg>> {
    let size = fs::metadata(path)?.len();
    if max_bytes > 0 && size > max_bytes {
        warn!(
            target: "pdg",
            "{} is {size} bytes, over the {max_bytes} ceiling; skipped",
            path.display()
        );
        return Ok(None);
    }
    let file = fs::File::open(path)?;
    let graph = serde_json::from_reader(std::io::BufReader::new(file))?;
    Ok(Some(graph))
}
