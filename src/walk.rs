use crate::utils::Config;
use crossbeam_channel::{Receiver, Sender, bounded};
use ignore::overrides::{Override, OverrideBuilder};
use ignore::{DirEntry, WalkBuilder, WalkState};
use std::mem;
use std::path::{Path, PathBuf};
use std::thread;
use tracing::{debug, error, warn};

/// Collects paths into fixed-size batches for the channel. Each walker
/// thread owns one; the tail batch goes out when the thread drops it.
struct Batcher {
    out: Sender<Vec<PathBuf>>,
    pending: Vec<PathBuf>,
    cap: usize,
}

impl Batcher {
    fn new(out: Sender<Vec<PathBuf>>, cap: usize) -> Self {
        Self {
            out,
            pending: Vec::with_capacity(cap),
            cap,
        }
    }

    fn add(&mut self, path: PathBuf) {
        self.pending.push(path);
        if self.pending.len() >= self.cap {
            let full = mem::replace(&mut self.pending, Vec::with_capacity(self.cap));
            let _ = self.out.send(full);
        }
    }
}

impl Drop for Batcher {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            let _ = self.out.send(mem::take(&mut self.pending));
        }
    }
}

/// Keep the sweep on JavaScript sources and out of the excluded
/// directories. Later globs win, so the exclusions trump the whitelist.
fn sweep_overrides(root: &Path, cfg: &Config) -> Override {
    let mut builder = OverrideBuilder::new(root);
    if let Err(e) = builder.add("*.js") {
        warn!("invalid source pattern: {e}");
    }
    for dir in &cfg.walker.excluded_directories {
        if let Err(e) = builder.add(&format!("!**/{dir}/**")) {
            warn!("invalid exclude-dir pattern '{dir}': {e}");
        }
    }
    builder.build().unwrap_or_else(|e| {
        error!("failed to build sweep overrides: {e}");
        Override::empty()
    })
}

fn within_size(entry: &DirEntry, max_bytes: Option<u64>) -> bool {
    match max_bytes {
        None => true,
        Some(cap) => entry.metadata().map(|m| m.len() <= cap).unwrap_or(true),
    }
}

/// Walk `root` in the background and stream batches of JavaScript file
/// paths through the returned channel.
pub fn spawn_senders(root: &Path, cfg: &Config) -> Receiver<Vec<PathBuf>> {
    let overrides = sweep_overrides(root, cfg);
    let threads = cfg.performance.walker_threads.unwrap_or_else(num_cpus::get);
    let (tx, rx) = bounded(threads * cfg.performance.channel_multiplier);

    let root = root.to_path_buf();
    let batch_size = cfg.performance.batch_size.max(1);
    let scan_hidden = cfg.walker.scan_hidden_files;
    let follow = cfg.walker.follow_symlinks;
    let max_bytes = cfg.walker.max_file_size_mb.map(|mb| mb * 1_048_576);

    thread::spawn(move || {
        debug!(root = ?root, threads, batch_size, "starting the source sweep");
        WalkBuilder::new(&root)
            .hidden(!scan_hidden)
            .follow_links(follow)
            .threads(threads)
            .overrides(overrides)
            .build_parallel()
            .run(move || {
                let mut batcher = Batcher::new(tx.clone(), batch_size);
                Box::new(move |entry| {
                    let Ok(entry) = entry else {
                        return WalkState::Continue;
                    };
                    if entry.file_type().is_some_and(|t| t.is_file())
                        && within_size(&entry, max_bytes)
                    {
                        batcher.add(entry.into_path());
                    }
                    WalkState::Continue
                })
            });
        debug!("source sweep complete");
    });

    rx
}

#[test]
fn walker_keeps_only_javascript() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("keep.js"), "var x = 1;").unwrap();
    std::fs::write(tmp.path().join("skip.txt"), "ignored").unwrap();

    let mut cfg = Config::default();
    cfg.performance.walker_threads = Some(1);
    cfg.performance.channel_multiplier = 1;
    cfg.performance.batch_size = 2;

    let rx = spawn_senders(tmp.path(), &cfg);
    let all: Vec<_> = rx.into_iter().flatten().collect();

    assert!(all.iter().any(|p| p.ends_with("keep.js")));
    assert!(all.iter().all(|p| !p.ends_with("skip.txt")));
}

#[test]
fn walker_skips_excluded_directories() {
    let tmp = tempfile::tempdir().unwrap();
    let nested = tmp.path().join("node_modules").join("lib");
    std::fs::create_dir_all(&nested).unwrap();
    std::fs::write(nested.join("dep.js"), "var x = 1;").unwrap();
    std::fs::write(tmp.path().join("app.js"), "var y = 2;").unwrap();

    let mut cfg = Config::default();
    cfg.performance.walker_threads = Some(1);

    let rx = spawn_senders(tmp.path(), &cfg);
    let all: Vec<_> = rx.into_iter().flatten().collect();

    assert!(all.iter().any(|p| p.ends_with("app.js")));
    assert!(all.iter().all(|p| !p.to_string_lossy().contains("node_modules")));
}
