pub mod counting;
pub mod extract;
pub mod selection;
pub mod space;

use crate::errors::ArgusResult;
use crate::esprima;
use crate::pdg;
use crate::syntax::{AST_UNITS, TOKENS};
use crate::utils::Config;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Which view of the file the feature stream is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Level {
    /// Lexical units from the external tokenizer.
    Tokens,
    /// Depth-first pre-order over syntactic children.
    Ast,
    /// Control edges, with an outer sweep for unreachable code.
    Cfg,
    /// Data edges only.
    PdgDfg,
    /// Data pass, then control pass, each with its own visited set.
    Pdg,
    /// `pdg`, then a syntactic pass over nodes not yet emitted.
    PdgCfgAst,
    /// Data pass, then a syntactic pass over nodes not yet emitted.
    PdgAst,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Tokens => "tokens",
            Level::Ast => "ast",
            Level::Cfg => "cfg",
            Level::PdgDfg => "pdg-dfg",
            Level::Pdg => "pdg",
            Level::PdgCfgAst => "pdg-cfg-ast",
            Level::PdgAst => "pdg-ast",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FeatureKind {
    /// Fixed-length windows of unit ids.
    Ngrams,
    /// `(context, value)` pairs.
    Value,
    /// Fixed-length windows of `(context, value)` pairs.
    NgramValue,
}

impl FeatureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureKind::Ngrams => "ngrams",
            FeatureKind::Value => "value",
            FeatureKind::NgramValue => "ngram-value",
        }
    }
}

/// One feature atom group, the key of every dictionary and vector column.
/// Window features always have length `n`; a stream shorter than the window
/// fills the tail slots with `None`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feature {
    Ngram(Vec<Option<u16>>),
    Pair(u16, Option<String>),
    PairNgram(Vec<(Option<u16>, Option<String>)>),
}

/// Map unit names onto their dictionary integers; unknown units (e.g. token
/// nodes hanging off `Program`) are dropped with a debug line.
fn map_units(units: &[String], dict: &HashMap<&'static str, u16>) -> Vec<u16> {
    units
        .iter()
        .filter_map(|u| {
            let mapped = dict.get(u.as_str()).copied();
            if mapped.is_none() {
                debug!(target: "features", "unit {} not in the dictionary", u);
            }
            mapped
        })
        .collect()
}

fn map_value_units(
    units: Vec<(String, Option<String>)>,
    dict: &HashMap<&'static str, u16>,
) -> Vec<(u16, Option<String>)> {
    units
        .into_iter()
        .filter_map(|(context, value)| {
            let mapped = dict.get(context.as_str()).copied();
            if mapped.is_none() {
                debug!(target: "features", "unit {} not in the dictionary", context);
            }
            mapped.map(|m| (m, value))
        })
        .collect()
}

/// Per-file feature counts: `(bag, total atom count)`, or `None` when the
/// file yields nothing (empty, oversized or unreadable representation).
pub fn file_features(
    repr: &Path,
    level: Level,
    kind: FeatureKind,
    n: usize,
    config: &Config,
) -> ArgusResult<Option<(HashMap<Feature, u32>, usize)>> {
    match level {
        Level::Tokens => {
            let with_values = kind != FeatureKind::Ngrams;
            let tokens = esprima::tokens(&config.parser, repr, with_values)?;
            if tokens.is_empty() {
                return Ok(None);
            }
            if with_values {
                let pairs = map_value_units(tokens, &TOKENS);
                Ok(counted_pairs(pairs, kind, n))
            } else {
                let names: Vec<String> = tokens.into_iter().map(|(k, _)| k).collect();
                let ints = map_units(&names, &TOKENS);
                Ok(counting::count_ngrams(ints, n))
            }
        }
        _ => {
            let max_bytes = config.analyzer.max_pdg_size_mb * 1_048_576;
            let Some(graph) = pdg::load_pdg(repr, max_bytes)? else {
                return Ok(None);
            };
            match kind {
                FeatureKind::Ngrams => {
                    let units = extract::syntactic_units(&graph, level);
                    let ints = map_units(&units, &AST_UNITS);
                    Ok(counting::count_ngrams(ints, n))
                }
                _ => {
                    let units = extract::value_units(&graph, level);
                    let pairs = map_value_units(units, &AST_UNITS);
                    Ok(counted_pairs(pairs, kind, n))
                }
            }
        }
    }
}

fn counted_pairs(
    pairs: Vec<(u16, Option<String>)>,
    kind: FeatureKind,
    n: usize,
) -> Option<(HashMap<Feature, u32>, usize)> {
    match kind {
        FeatureKind::Value => counting::count_values(pairs),
        _ => counting::count_ngram_values(pairs, n),
    }
}
