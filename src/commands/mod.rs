pub mod classify;
pub mod learn;
pub mod pdgs;

use crate::analysis::{Analysis, Label};
use crate::cli::Commands;
use crate::errors::{ArgusError, ArgusResult};
use crate::features::space::SparseMatrix;
use crate::utils::Config;
use std::fs;
use std::path::{Path, PathBuf};

pub fn handle_command(command: Commands, config: &Config) -> ArgusResult<()> {
    match command {
        Commands::Pdgs { path, output } => pdgs::handle(&path, output, config),
        Commands::Learn(opts) => learn::handle(opts, config),
        Commands::Classify(opts) => classify::handle(opts, config),
    }
}

/// The files of one corpus directory, in path order.
pub(crate) fn enumerate_dir(dir: &Path, label: Label) -> ArgusResult<Vec<Analysis>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            out.push(Analysis::new(entry.path(), label));
        }
    }
    out.sort_by(|a, b| a.pdg_path.cmp(&b.pdg_path));
    Ok(out)
}

/// Stack the vectorized analyses into one matrix, dropping files that
/// yielded no row.
pub(crate) fn stack_rows(results: Vec<Analysis>) -> ArgusResult<(Vec<Analysis>, SparseMatrix)> {
    let mut kept = Vec::new();
    let mut matrix = SparseMatrix::new();
    for analysis in results {
        if let Some(row) = &analysis.row {
            matrix.push_row(row)?;
            kept.push(analysis);
        }
    }
    Ok((kept, matrix))
}

pub(crate) fn report_errors(errors: &[(PathBuf, ArgusError)]) {
    for (path, error) in errors {
        tracing::warn!("{}: {error}", path.display());
    }
}
