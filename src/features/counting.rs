use super::Feature;
use std::collections::HashMap;
use tracing::warn;

/// Slide a window of width `n` over the units. Windows always come out at
/// length `n`: a stream shorter than the window yields one window whose tail
/// slots are `None`. An empty stream yields nothing.
fn ngram_windows<T: Clone>(units: Vec<T>, n: usize) -> Option<Vec<Vec<Option<T>>>> {
    if units.is_empty() {
        return None;
    }
    if n < 1 {
        warn!("the window width must be positive, got {n}");
        return None;
    }
    if n > units.len() {
        let mut window: Vec<Option<T>> = Vec::with_capacity(n);
        window.extend(units.into_iter().map(Some));
        window.resize(n, None);
        return Some(vec![window]);
    }
    Some(
        units
            .windows(n)
            .map(|w| w.iter().cloned().map(Some).collect())
            .collect(),
    )
}

fn count<I: IntoIterator<Item = Feature>>(features: I) -> (HashMap<Feature, u32>, usize) {
    let mut bag = HashMap::new();
    let mut total = 0;
    for feature in features {
        *bag.entry(feature).or_insert(0) += 1;
        total += 1;
    }
    (bag, total)
}

/// Count n-grams of unit ids. The total is the number of windows.
pub fn count_ngrams(ints: Vec<u16>, n: usize) -> Option<(HashMap<Feature, u32>, usize)> {
    let windows = ngram_windows(ints, n)?;
    Some(count(windows.into_iter().map(Feature::Ngram)))
}

/// Count `(context, value)` pairs. The total is the stream length.
pub fn count_values(pairs: Vec<(u16, Option<String>)>) -> Option<(HashMap<Feature, u32>, usize)> {
    if pairs.is_empty() {
        return None;
    }
    Some(count(pairs.into_iter().map(|(c, v)| Feature::Pair(c, v))))
}

/// Count n-grams of `(context, value)` pairs; padding slots carry neither a
/// context nor a value.
pub fn count_ngram_values(
    pairs: Vec<(u16, Option<String>)>,
    n: usize,
) -> Option<(HashMap<Feature, u32>, usize)> {
    let windows = ngram_windows(pairs, n)?;
    Some(count(windows.into_iter().map(|window| {
        Feature::PairNgram(
            window
                .into_iter()
                .map(|slot| match slot {
                    Some((context, value)) => (Some(context), value),
                    None => (None, None),
                })
                .collect(),
        )
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gram(ids: &[u16]) -> Feature {
        Feature::Ngram(ids.iter().map(|&i| Some(i)).collect())
    }

    #[test]
    fn bigrams_over_a_small_stream() {
        let (bag, total) = count_ngrams(vec![62, 63, 29, 37], 2).unwrap();
        assert_eq!(total, 3);
        assert_eq!(bag[&gram(&[62, 63])], 1);
        assert_eq!(bag[&gram(&[63, 29])], 1);
        assert_eq!(bag[&gram(&[29, 37])], 1);
    }

    #[test]
    fn repeated_windows_accumulate() {
        let (bag, total) = count_ngrams(vec![1, 2, 1, 2, 1], 2).unwrap();
        assert_eq!(total, 4);
        assert_eq!(bag[&gram(&[1, 2])], 2);
        assert_eq!(bag[&gram(&[2, 1])], 2);
    }

    #[test]
    fn short_streams_pad_to_the_window_width() {
        let (bag, total) = count_ngrams(vec![7], 4).unwrap();
        assert_eq!(total, 1);
        assert_eq!(bag[&Feature::Ngram(vec![Some(7), None, None, None])], 1);
    }

    #[test]
    fn short_pair_streams_pad_both_slots() {
        let pairs = vec![(29, Some("x".to_owned()))];
        let (bag, total) = count_ngram_values(pairs, 2).unwrap();
        assert_eq!(total, 1);
        assert_eq!(
            bag[&Feature::PairNgram(vec![
                (Some(29), Some("x".to_owned())),
                (None, None),
            ])],
            1
        );
    }

    #[test]
    fn empty_and_degenerate_inputs() {
        assert!(count_ngrams(vec![], 2).is_none());
        assert!(count_ngrams(vec![1, 2], 0).is_none());
        assert!(count_values(vec![]).is_none());
    }

    #[test]
    fn value_totals_count_every_atom() {
        let pairs = vec![
            (29, Some("x".to_owned())),
            (29, Some("x".to_owned())),
            (37, None),
        ];
        let (bag, total) = count_values(pairs).unwrap();
        assert_eq!(total, 3);
        assert_eq!(bag[&Feature::Pair(29, Some("x".to_owned()))], 2);
    }
}
