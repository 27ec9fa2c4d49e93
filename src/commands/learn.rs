use super::{enumerate_dir, report_errors, stack_rows};
use crate::analysis::{Analysis, FeatureOptions, Label, collect_features};
use crate::cli::LearnOpts;
use crate::errors::{ArgusError, ArgusResult};
use crate::features::selection;
use crate::features::space::FeatureTable;
use crate::ml::{self, ForestModel, ModelMeta};
use crate::utils::Config;
use console::style;
use std::fs;
use std::sync::Arc;

/// Select features on the validation corpora, vectorize the training
/// corpora, fit the forest, persist everything under the analysis path.
pub fn handle(opts: LearnOpts, config: &Config) -> ArgusResult<()> {
    if opts.dirs.len() != opts.labels.len() {
        return Err(ArgusError::Config(format!(
            "{} directories (--d) but {} labels (--l)",
            opts.dirs.len(),
            opts.labels.len()
        )));
    }
    let vl = &opts.validation_labels;
    if !(vl.contains(&Label::Benign) && vl.contains(&Label::Malicious)) {
        return Err(ArgusError::Config(
            "feature selection needs one benign and one malicious directory (--vd/--vl)".into(),
        ));
    }
    // fail on an unsupported confidence before any work happens
    selection::chi_critical(opts.confidence)?;

    let fopts = FeatureOptions {
        level: opts.features.level,
        kind: opts.features.features,
        n: opts.features.n,
    };
    let level = fopts.level.as_str();
    let features_dir = opts.analysis.analysis_path.join(fopts.kind.as_str());
    fs::create_dir_all(&features_dir)?;

    // 1. every feature seen per corpus, with the number of files carrying it
    let mut corpora: Vec<(Vec<Analysis>, Label)> = Vec::new();
    let mut all_tables: Vec<FeatureTable<u32>> = Vec::new();
    for (dir, &label) in opts.validation_dirs.iter().zip(vl) {
        println!(
            "{} {} ({label})...",
            style("Profiling").green().bold(),
            dir.display()
        );
        let jobs = enumerate_dir(dir, label)?;
        let (results, errors) = collect_features(jobs, fopts, None, config);
        report_errors(&errors);

        let table_path = features_dir.join(format!("{level}_all_features_{label}.json"));
        let mut table = if table_path.exists() {
            FeatureTable::load(&table_path)?
        } else {
            FeatureTable::new()
        };
        for analysis in &results {
            if let Some((bag, _)) = &analysis.features {
                for feature in bag.keys() {
                    *table.entry(feature, 0) += 1;
                }
            }
        }
        table.save(&table_path)?;
        corpora.push((results, label));
        all_tables.push(table);
    }

    // 2. tally presence/absence of every popular feature per class
    let benign_at = vl
        .iter()
        .position(|&l| l == Label::Benign)
        .expect("checked above");
    let mut analyzed = selection::init_analyzed(&all_tables[benign_at], &all_tables[1 - benign_at]);
    for (results, label) in &corpora {
        for analysis in results {
            if let Some((bag, _)) = &analysis.features {
                selection::analyze_sample(&mut analyzed, bag, *label);
            }
        }
    }
    analyzed.save(&features_dir.join(format!("{level}_analyzed_features.json")))?;

    // 3. chi-square selection
    let selected = selection::select_features(&analyzed, opts.confidence)?;
    println!(
        "{} {} features at {}% confidence.",
        style("Selected").green().bold(),
        selected.len(),
        opts.confidence
    );
    selected.save(&features_dir.join(format!(
        "{level}_selected_features_{}.json",
        opts.confidence
    )))?;
    if selected.is_empty() {
        return Err(ArgusError::Config(
            "no feature survived the selection; the corpora are too small or too alike".into(),
        ));
    }

    // 4. vectorize the training corpora against the fresh dictionary
    let mut jobs = Vec::new();
    for (dir, &label) in opts.dirs.iter().zip(&opts.labels) {
        jobs.extend(enumerate_dir(dir, label)?);
    }
    let (results, errors) = collect_features(jobs, fopts, Some(Arc::new(selected)), config);
    report_errors(&errors);
    let (kept, matrix) = stack_rows(results)?;
    if kept.is_empty() {
        return Err(ArgusError::Config(
            "no analyzable graph found in the training directories".into(),
        ));
    }
    let labels: Vec<Label> = kept.iter().map(|a| a.label).collect();

    // 5. fit and persist
    let meta = ModelMeta {
        level: fopts.level,
        features: fopts.kind,
        n: fopts.n,
        trees: opts.trees,
    };
    let model = ForestModel::train(&matrix, &labels, meta)?;
    let model_path = opts.model_dir.join(&opts.model_name);
    model.save(&model_path)?;
    println!(
        "{} {} trees over {} files, stored in {}.",
        style("Trained").green().bold(),
        opts.trees,
        kept.len(),
        model_path.display()
    );

    if opts.score {
        let probas = model.predict_proba(&matrix)?;
        ml::print_score(&labels, &ml::predict_labels(&probas, 0.5));
    }
    Ok(())
}
