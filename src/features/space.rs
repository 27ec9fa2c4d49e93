use super::Feature;
use crate::errors::{ArgusError, ArgusResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// An ordered feature table. Entries keep insertion order (column numbers
/// are positions in the selection pass), the index gives O(1) lookup, and
/// persistence goes through JSON entry lists because features are not valid
/// object keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureTable<V> {
    entries: Vec<(Feature, V)>,
    #[serde(skip)]
    index: HashMap<Feature, usize>,
}

impl<V> Default for FeatureTable<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<V> FeatureTable<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, feature: &Feature) -> Option<&V> {
        self.index.get(feature).map(|&i| &self.entries[i].1)
    }

    pub fn get_mut(&mut self, feature: &Feature) -> Option<&mut V> {
        self.index.get(feature).map(|&i| &mut self.entries[i].1)
    }

    pub fn contains(&self, feature: &Feature) -> bool {
        self.index.contains_key(feature)
    }

    pub fn insert(&mut self, feature: Feature, value: V) {
        if let Some(&i) = self.index.get(&feature) {
            self.entries[i].1 = value;
        } else {
            self.index.insert(feature.clone(), self.entries.len());
            self.entries.push((feature, value));
        }
    }

    /// Mutable access to a feature's slot, seeding new features with
    /// `default`.
    pub fn entry(&mut self, feature: &Feature, default: V) -> &mut V {
        let index = if let Some(&i) = self.index.get(feature) {
            i
        } else {
            let i = self.entries.len();
            self.index.insert(feature.clone(), i);
            self.entries.push((feature.clone(), default));
            i
        };
        &mut self.entries[index].1
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Feature, V)> {
        self.entries.iter()
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, (f, _))| (f.clone(), i))
            .collect();
    }
}

impl<V: Serialize + DeserializeOwned> FeatureTable<V> {
    pub fn load(path: &Path) -> ArgusResult<Self> {
        let file = fs::File::open(path)?;
        let mut table: Self = serde_json::from_reader(std::io::BufReader::new(file))?;
        table.rebuild_index();
        Ok(table)
    }

    pub fn save(&self, path: &Path) -> ArgusResult<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let file = fs::File::create(path).map_err(|e| {
            ArgusError::Serialization(format!("{}: {e}", path.display()))
        })?;
        serde_json::to_writer(std::io::BufWriter::new(file), self)
            .map_err(|e| ArgusError::Serialization(format!("{}: {e}", path.display())))
    }
}

/// Feature -> column dictionary produced by the selection stage.
pub type FeatureDict = FeatureTable<usize>;

/// One file's sparse vector: column `i` holds `count_i / total`; the extra
/// trailing column keeps otherwise-empty rows representable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SparseRow {
    pub ncols: usize,
    pub indices: Vec<usize>,
    pub values: Vec<f64>,
}

/// Project a feature bag onto the dictionary's vector space.
pub fn features_vector(
    counts: &HashMap<Feature, u32>,
    total: usize,
    dict: &FeatureDict,
) -> SparseRow {
    let ncols = dict.len() + 1;
    let mut cells: Vec<(usize, f64)> = counts
        .iter()
        .filter_map(|(feature, &count)| {
            dict.get(feature)
                .map(|&col| (col, f64::from(count) / total as f64))
        })
        .collect();
    cells.sort_unstable_by_key(|&(col, _)| col);
    if cells.is_empty() {
        // an all-zero row cannot be stacked, flag it in the spare column
        cells.push((ncols - 1, 1.0));
    }
    SparseRow {
        ncols,
        indices: cells.iter().map(|&(c, _)| c).collect(),
        values: cells.iter().map(|&(_, v)| v).collect(),
    }
}

/// Compressed-row stack of per-file vectors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SparseMatrix {
    pub nrows: usize,
    pub ncols: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    values: Vec<f64>,
}

impl SparseMatrix {
    pub fn new() -> Self {
        Self {
            indptr: vec![0],
            ..Self::default()
        }
    }

    pub fn push_row(&mut self, row: &SparseRow) -> ArgusResult<()> {
        if self.nrows == 0 {
            self.ncols = row.ncols;
        } else if row.ncols != self.ncols {
            return Err(ArgusError::MalformedGraph(format!(
                "row width {} does not match the matrix width {}",
                row.ncols, self.ncols
            )));
        }
        self.indices.extend_from_slice(&row.indices);
        self.values.extend_from_slice(&row.values);
        self.indptr.push(self.indices.len());
        self.nrows += 1;
        Ok(())
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    pub fn row(&self, i: usize) -> (&[usize], &[f64]) {
        let (lo, hi) = (self.indptr[i], self.indptr[i + 1]);
        (&self.indices[lo..hi], &self.values[lo..hi])
    }

    /// Dense rows for the classifier adapter.
    pub fn to_dense(&self) -> Vec<Vec<f64>> {
        (0..self.nrows)
            .map(|i| {
                let mut dense = vec![0.0; self.ncols];
                let (cols, vals) = self.row(i);
                for (&c, &v) in cols.iter().zip(vals) {
                    dense[c] = v;
                }
                dense
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gram(ids: &[u16]) -> Feature {
        Feature::Ngram(ids.iter().map(|&i| Some(i)).collect())
    }

    fn dict(features: &[Feature]) -> FeatureDict {
        let mut d = FeatureDict::new();
        for (i, f) in features.iter().enumerate() {
            d.insert(f.clone(), i);
        }
        d
    }

    #[test]
    fn covered_rows_sum_to_one() {
        let f1 = gram(&[1, 2]);
        let f2 = gram(&[2, 3]);
        let d = dict(&[f1.clone(), f2.clone()]);
        let counts = HashMap::from([(f1, 3), (f2, 1)]);
        let row = features_vector(&counts, 4, &d);
        let sum: f64 = row.values.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!(row.values.iter().all(|&v| v <= 1.0));
    }

    #[test]
    fn uncovered_features_shrink_the_sum() {
        let f1 = gram(&[1, 2]);
        let stranger = gram(&[9, 9]);
        let d = dict(&[f1.clone()]);
        let counts = HashMap::from([(f1, 1), (stranger, 3)]);
        let row = features_vector(&counts, 4, &d);
        let sum: f64 = row.values.iter().sum();
        assert!(sum < 1.0);
    }

    #[test]
    fn unknown_only_rows_use_the_spare_column() {
        let d = dict(&[gram(&[1])]);
        let counts = HashMap::from([(gram(&[5]), 2)]);
        let row = features_vector(&counts, 2, &d);
        assert_eq!(row.indices, [d.len()]);
        assert_eq!(row.values, [1.0]);
    }

    #[test]
    fn matrix_stacks_and_densifies() {
        let f = gram(&[1]);
        let d = dict(&[f.clone()]);
        let mut m = SparseMatrix::new();
        m.push_row(&features_vector(&HashMap::from([(f, 2)]), 2, &d))
            .unwrap();
        m.push_row(&features_vector(&HashMap::new(), 1, &d)).unwrap();
        assert_eq!(m.nrows, 2);
        assert_eq!(m.to_dense(), vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn entry_seeds_and_accumulates() {
        let mut t: FeatureTable<u32> = FeatureTable::new();
        let f = gram(&[4]);
        *t.entry(&f, 0) += 1;
        *t.entry(&f, 0) += 1;
        assert_eq!(t.get(&f), Some(&2));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn tables_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dict.json");
        let mut d = FeatureDict::new();
        d.insert(Feature::Pair(29, Some("x".to_owned())), 0);
        d.insert(gram(&[1, 2, 3]), 1);
        d.save(&path).unwrap();
        let loaded = FeatureDict::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get(&gram(&[1, 2, 3])), Some(&1));
    }
}
