use super::{enumerate_dir, report_errors, stack_rows};
use crate::analysis::{Analysis, FeatureOptions, Label, collect_features};
use crate::cli::ClassifyOpts;
use crate::errors::{ArgusError, ArgusResult};
use crate::features::space::FeatureDict;
use crate::ml::{self, ForestModel};
use crate::utils::Config;
use std::sync::Arc;
use tracing::warn;

/// Vectorize the inputs against the persisted dictionary and run them
/// through the stored forest. A successful classification exits zero
/// whatever the labels; only configuration mistakes are fatal.
pub fn handle(opts: ClassifyOpts, config: &Config) -> ArgusResult<()> {
    if opts.dirs.is_empty() && opts.files.is_empty() {
        return Err(ArgusError::Config(
            "indicate at least a directory (--d) or a file (--f) to analyze".into(),
        ));
    }
    if !opts.dir_labels.is_empty() && opts.dir_labels.len() != opts.dirs.len() {
        return Err(ArgusError::Config(format!(
            "{} directories (--d) but {} labels (--l)",
            opts.dirs.len(),
            opts.dir_labels.len()
        )));
    }
    if !opts.file_labels.is_empty() && opts.file_labels.len() != opts.files.len() {
        return Err(ArgusError::Config(format!(
            "{} files (--f) but {} labels (--lf)",
            opts.files.len(),
            opts.file_labels.len()
        )));
    }
    if !(0.0..=1.0).contains(&opts.threshold) {
        return Err(ArgusError::Config(format!(
            "the decision threshold must sit in [0, 1], got {}",
            opts.threshold
        )));
    }

    let fopts = FeatureOptions {
        level: opts.features.level,
        kind: opts.features.features,
        n: opts.features.n,
    };
    let dict_path = opts
        .analysis
        .analysis_path
        .join(fopts.kind.as_str())
        .join(format!(
            "{}_selected_features_{}.json",
            fopts.level.as_str(),
            opts.confidence
        ));
    let dict = FeatureDict::load(&dict_path).map_err(|_| {
        ArgusError::Config(format!(
            "no selection dictionary at {}; run `argus learn` first",
            dict_path.display()
        ))
    })?;

    let mut jobs = Vec::new();
    for (i, file) in opts.files.iter().enumerate() {
        let label = opts.file_labels.get(i).copied().unwrap_or(Label::Unknown);
        jobs.push(Analysis::new(file.clone(), label));
    }
    for (i, dir) in opts.dirs.iter().enumerate() {
        let label = opts.dir_labels.get(i).copied().unwrap_or(Label::Unknown);
        jobs.extend(enumerate_dir(dir, label)?);
    }

    let (results, errors) = collect_features(jobs, fopts, Some(Arc::new(dict)), config);
    report_errors(&errors);
    let (mut kept, matrix) = stack_rows(results)?;
    if kept.is_empty() {
        warn!("no valid graph found for the analysis");
        return Ok(());
    }

    let model = ForestModel::load(&opts.model)?;
    if model.meta.level != fopts.level
        || model.meta.features != fopts.kind
        || model.meta.n != fopts.n
    {
        warn!(
            "the model was trained at level {} / {} / n={}, not the requested options",
            model.meta.level.as_str(),
            model.meta.features.as_str(),
            model.meta.n
        );
    }

    let probas = model.predict_proba(&matrix)?;
    let predicted = ml::predict_labels(&probas, opts.threshold);
    for (analysis, &label) in kept.iter_mut().zip(&predicted) {
        analysis.prediction = Some(label);
    }
    ml::print_results(&kept, &probas);
    let labels: Vec<Label> = kept.iter().map(|a| a.label).collect();
    ml::print_score(&labels, &predicted);
    Ok(())
}
