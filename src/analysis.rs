use crate::errors::{ArgusError, ArgusResult};
use crate::features::space::{FeatureDict, SparseRow, features_vector};
use crate::features::{Feature, FeatureKind, Level, file_features};
use crate::utils::Config;
use clap::ValueEnum;
use crossbeam_channel::unbounded;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Benign,
    Malicious,
    /// No ground truth.
    #[value(name = "?")]
    Unknown,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Label::Benign => "benign",
            Label::Malicious => "malicious",
            Label::Unknown => "?",
        };
        f.write_str(s)
    }
}

/// One file's trip through the pipeline.
#[derive(Debug, Clone)]
pub struct Analysis {
    /// The stored graph (or, at the `tokens` level, the source file).
    pub pdg_path: PathBuf,
    pub label: Label,
    /// Feature bag and total atom count, once extracted.
    pub features: Option<(HashMap<Feature, u32>, usize)>,
    /// Sparse vector, once a dictionary was applied.
    pub row: Option<SparseRow>,
    pub prediction: Option<Label>,
}

impl Analysis {
    pub fn new(pdg_path: PathBuf, label: Label) -> Self {
        Self {
            pdg_path,
            label,
            features: None,
            row: None,
            prediction: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FeatureOptions {
    pub level: Level,
    pub kind: FeatureKind,
    pub n: usize,
}

/// Run feature extraction (and vectorization, when a dictionary is given)
/// for every analysis on a shared-nothing worker pool.
///
/// Workers pull jobs from one queue and push results on another; failures
/// travel on their own channel and never unwind across threads. The result
/// queue is drained until every worker has hung up, and only then are the
/// workers joined. Results come back sorted by path so downstream artifacts
/// are reproducible.
pub fn collect_features(
    analyses: Vec<Analysis>,
    opts: FeatureOptions,
    dict: Option<Arc<FeatureDict>>,
    config: &Config,
) -> (Vec<Analysis>, Vec<(PathBuf, ArgusError)>) {
    let workers = config.analyzer.workers.max(1);
    let (job_tx, job_rx) = unbounded::<Analysis>();
    let (out_tx, out_rx) = unbounded::<Analysis>();
    let (err_tx, err_rx) = unbounded::<(PathBuf, ArgusError)>();

    debug!(workers, jobs = analyses.len(), "starting feature workers");
    for analysis in analyses {
        let _ = job_tx.send(analysis);
    }
    drop(job_tx);

    let mut handles = Vec::with_capacity(workers);
    for i in 0..workers {
        let job_rx = job_rx.clone();
        let out_tx = out_tx.clone();
        let err_tx = err_tx.clone();
        let dict = dict.clone();
        let config = config.clone();
        let handle = thread::Builder::new()
            .name(format!("argus-worker-{i}"))
            .stack_size(config.performance.worker_stack_size)
            .spawn(move || {
                for mut analysis in job_rx.iter() {
                    match file_features(&analysis.pdg_path, opts.level, opts.kind, opts.n, &config)
                    {
                        Ok(features) => {
                            if let (Some((counts, total)), Some(dict)) = (&features, &dict) {
                                analysis.row = Some(features_vector(counts, *total, dict));
                            }
                            analysis.features = features;
                            let _ = out_tx.send(analysis);
                        }
                        Err(e) => {
                            let _ = err_tx.send((analysis.pdg_path, e));
                        }
                    }
                }
            })
            .expect("spawn feature worker");
        handles.push(handle);
    }
    drop(out_tx);
    drop(err_tx);

    // draining until disconnect is what lets the workers finish: joining
    // first would deadlock with results still in flight
    let mut results: Vec<Analysis> = out_rx.iter().collect();
    for handle in handles {
        let _ = handle.join();
    }
    let errors: Vec<(PathBuf, ArgusError)> = err_rx.iter().collect();

    results.sort_by(|a, b| a.pdg_path.cmp(&b.pdg_path));
    (results, errors)
}
