use super::Feature;
use super::space::{FeatureDict, FeatureTable};
use crate::analysis::Label;
use crate::errors::{ArgusError, ArgusResult};
use std::collections::HashMap;
use tracing::{debug, error};

/// Per-feature presence/absence tally: `[benign with, benign without,
/// malicious with, malicious without]`.
pub type Tally = [u32; 4];

/// A feature must be seen in more than this many files of a corpus before
/// the chi-square test is worth running on it.
const POPULARITY_FLOOR: u32 = 10;

/// Critical chi-square values for one degree of freedom, by confidence in
/// percent.
const CHI_CRITICAL: &[(u32, f64)] = &[(90, 2.71), (95, 3.84), (98, 5.41), (99, 6.63)];

pub fn chi_critical(confidence: u32) -> ArgusResult<f64> {
    CHI_CRITICAL
        .iter()
        .find(|&&(c, _)| c == confidence)
        .map(|&(_, v)| v)
        .ok_or_else(|| {
            ArgusError::Config(format!(
                "unsupported chi-square confidence {confidence}, pick one of 90/95/98/99"
            ))
        })
}

/// Seed the tally table with every feature popular in either corpus.
pub fn init_analyzed(
    benign_all: &FeatureTable<u32>,
    malicious_all: &FeatureTable<u32>,
) -> FeatureTable<Tally> {
    let mut analyzed = FeatureTable::new();
    for (feature, seen) in benign_all.iter() {
        if *seen > POPULARITY_FLOOR {
            analyzed.insert(feature.clone(), [0; 4]);
        }
    }
    for (feature, seen) in malicious_all.iter() {
        if *seen > POPULARITY_FLOOR && !analyzed.contains(feature) {
            analyzed.insert(feature.clone(), [0; 4]);
        }
    }
    analyzed
}

/// Fold one labeled sample into the tally table.
pub fn analyze_sample(
    analyzed: &mut FeatureTable<Tally>,
    sample: &HashMap<Feature, u32>,
    label: Label,
) {
    let offset = match label {
        Label::Benign => 0,
        Label::Malicious => 2,
        Label::Unknown => {
            error!("selection needs labeled samples, got '?'");
            return;
        }
    };
    let absent: Vec<Feature> = analyzed
        .iter()
        .filter(|(f, _)| !sample.contains_key(f))
        .map(|(f, _)| f.clone())
        .collect();
    for feature in sample.keys() {
        if let Some(tally) = analyzed.get_mut(feature) {
            tally[offset] += 1;
        }
    }
    for feature in &absent {
        if let Some(tally) = analyzed.get_mut(feature) {
            tally[offset + 1] += 1;
        }
    }
}

/// Yates-corrected chi-square statistic of a 2x2 contingency table. A zero
/// marginal makes the test undefined; those tables score zero.
pub fn chi_square(tally: &Tally) -> f64 {
    let o = [
        [f64::from(tally[0]), f64::from(tally[1])],
        [f64::from(tally[2]), f64::from(tally[3])],
    ];
    let rows = [o[0][0] + o[0][1], o[1][0] + o[1][1]];
    let cols = [o[0][0] + o[1][0], o[0][1] + o[1][1]];
    let n = rows[0] + rows[1];
    if rows.contains(&0.0) || cols.contains(&0.0) {
        return 0.0;
    }
    let mut chi = 0.0;
    for (i, row) in o.iter().enumerate() {
        for (j, &observed) in row.iter().enumerate() {
            let expected = rows[i] * cols[j] / n;
            let diff = ((observed - expected).abs() - 0.5).max(0.0);
            chi += diff * diff / expected;
        }
    }
    chi
}

/// Keep features whose presence depends on the label at the given
/// confidence, assigning each survivor its column in tally order.
pub fn select_features(
    analyzed: &FeatureTable<Tally>,
    confidence: u32,
) -> ArgusResult<FeatureDict> {
    let critical = chi_critical(confidence)?;
    let mut selected = FeatureDict::new();
    let mut position = 0;
    for (feature, tally) in analyzed.iter() {
        let chi = chi_square(tally);
        if chi >= critical {
            debug!(
                target: "selection",
                chi, "feature presence and classification are dependent"
            );
            selected.insert(feature.clone(), position);
            position += 1;
        }
    }
    Ok(selected)
}
