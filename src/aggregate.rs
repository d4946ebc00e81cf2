use std::collections::{BTreeMap, HashMap};

use crate::error::{FeatureError, FeatureResult};
use crate::history::{HistoryEntry, StatFields};

#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    Mean(f64),
    Mode(String),
}

impl FeatureValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FeatureValue::Mean(v) => Some(*v),
            FeatureValue::Mode(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FeatureValue::Mode(s) => Some(s),
            FeatureValue::Mean(_) => None,
        }
    }
}

/// `<field>_<slot>` to aggregated value; `None` means no observation.
pub type FeatureVector = BTreeMap<String, Option<FeatureValue>>;

/// Summarises a player's form before `query_time`.
///
/// Only entries with `start_time < query_time` are considered, so the match
/// being predicted never contributes. Of those, the latest `window_size` are
/// kept. Numeric fields average their non-missing values; categorical fields
/// take the most frequent value, ties going to the value seen first in
/// ascending time order. A field with no observations stays `None`.
pub fn aggregate(
    history: &[HistoryEntry],
    query_time: i64,
    window_size: usize,
    fields: &StatFields,
    slot: usize,
) -> FeatureResult<FeatureVector> {
    if window_size == 0 {
        return Err(FeatureError::InvalidWindow { size: window_size });
    }

    let mut prior = history
        .iter()
        .filter(|(t, _)| *t < query_time)
        .collect::<Vec<_>>();
    prior.sort_by_key(|(t, _)| *t);
    let window = &prior[prior.len().saturating_sub(window_size)..];

    let mut out = FeatureVector::new();
    for field in &fields.numeric {
        let values = window
            .iter()
            .filter_map(|(_, snapshot)| snapshot.numeric.get(field).copied())
            .collect::<Vec<_>>();
        let mean = (!values.is_empty())
            .then(|| FeatureValue::Mean(values.iter().sum::<f64>() / values.len() as f64));
        out.insert(feature_name(field, slot), mean);
    }
    for field in &fields.categorical {
        let mode = mode(
            window
                .iter()
                .filter_map(|(_, snapshot)| snapshot.categorical.get(field)),
        )
        .map(FeatureValue::Mode);
        out.insert(feature_name(field, slot), mode);
    }
    Ok(out)
}

pub fn feature_name(field: &str, slot: usize) -> String {
    format!("{field}_{slot}")
}

fn mode<'a>(values: impl Iterator<Item = &'a String>) -> Option<String> {
    // value -> (count, first position)
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (pos, v) in values.enumerate() {
        counts.entry(v.as_str()).or_insert((0, pos)).0 += 1;
    }
    counts
        .into_iter()
        .max_by(|(_, (ca, pa)), (_, (cb, pb))| ca.cmp(cb).then(pb.cmp(pa)))
        .map(|(v, _)| v.to_string())
}
