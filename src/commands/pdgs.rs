use crate::errors::ArgusResult;
use crate::pdg;
use crate::utils::Config;
use crate::walk::spawn_senders;
use console::style;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Sweep a folder and store one dependency graph per JavaScript file.
/// Per-file failures (parse errors, timeouts) are logged and counted, never
/// fatal to the sweep.
pub fn handle(path: &str, output: Option<PathBuf>, config: &Config) -> ArgusResult<()> {
    let root = Path::new(path).canonicalize()?;
    let store = output.unwrap_or_else(|| root.join("analysis").join("pdg"));
    fs::create_dir_all(&store)?;

    println!(
        "{} {}...\n",
        style("Analyzing").green().bold(),
        root.display()
    );

    let built = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);

    let rx = spawn_senders(&root, config);
    rx.into_iter().flatten().par_bridge().for_each(|file| {
        let outcome = pdg::build_pdg(config, &file)
            .and_then(|graph| pdg::store_pdg(&graph, &store, &file));
        match outcome {
            Ok(_) => {
                built.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::warn!("{}: {e}", file.display());
                failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    });

    println!(
        "{} {} graphs in {} ({} failed).",
        style("Stored").green().bold(),
        built.load(Ordering::Relaxed),
        store.display(),
        failed.load(Ordering::Relaxed)
    );
    Ok(())
}
