use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::catalog::{Column, ColumnType, IntWidth};
use crate::error::{FeatureError, FeatureResult};
use crate::payload::as_i64_any;

const MAX_REPORTED_VALUE: usize = 64;

/// Typed storage for one column. `Category` and `Text` columns share `Text`.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Int(Vec<Option<i64>>),
    Bool(Vec<Option<bool>>),
    Float(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
    Timestamp(Vec<Option<DateTime<Utc>>>),
}

impl ColumnData {
    pub fn new(ty: ColumnType) -> Self {
        Self::with_capacity(ty, 0)
    }

    pub fn with_capacity(ty: ColumnType, n: usize) -> Self {
        match ty {
            ColumnType::Int(_) => ColumnData::Int(Vec::with_capacity(n)),
            ColumnType::Bool => ColumnData::Bool(Vec::with_capacity(n)),
            ColumnType::Float => ColumnData::Float(Vec::with_capacity(n)),
            ColumnType::Category | ColumnType::Text => ColumnData::Text(Vec::with_capacity(n)),
            ColumnType::Timestamp => ColumnData::Timestamp(Vec::with_capacity(n)),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnData::Int(v) => v.len(),
            ColumnData::Bool(v) => v.len(),
            ColumnData::Float(v) => v.len(),
            ColumnData::Text(v) => v.len(),
            ColumnData::Timestamp(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn null_count(&self) -> usize {
        match self {
            ColumnData::Int(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnData::Bool(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnData::Float(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnData::Text(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnData::Timestamp(v) => v.iter().filter(|x| x.is_none()).count(),
        }
    }

    pub fn is_null(&self, row: usize) -> bool {
        match self {
            ColumnData::Int(v) => v.get(row).is_none_or(Option::is_none),
            ColumnData::Bool(v) => v.get(row).is_none_or(Option::is_none),
            ColumnData::Float(v) => v.get(row).is_none_or(Option::is_none),
            ColumnData::Text(v) => v.get(row).is_none_or(Option::is_none),
            ColumnData::Timestamp(v) => v.get(row).is_none_or(Option::is_none),
        }
    }

    pub(crate) fn append(&mut self, other: ColumnData) {
        match (self, other) {
            (ColumnData::Int(a), ColumnData::Int(b)) => a.extend(b),
            (ColumnData::Bool(a), ColumnData::Bool(b)) => a.extend(b),
            (ColumnData::Float(a), ColumnData::Float(b)) => a.extend(b),
            (ColumnData::Text(a), ColumnData::Text(b)) => a.extend(b),
            (ColumnData::Timestamp(a), ColumnData::Timestamp(b)) => a.extend(b),
            _ => unreachable!("column storage is derived from the same catalog type"),
        }
    }
}

/// Coerces every value of one column. The first failing value aborts the
/// column and is reported with the column name.
pub fn coerce_column<'a, I>(column: &Column, values: I) -> FeatureResult<ColumnData>
where
    I: ExactSizeIterator<Item = &'a Value>,
{
    let mut data = ColumnData::with_capacity(column.ty, values.len());
    for value in values {
        let pushed = match (&mut data, column.ty) {
            (ColumnData::Int(out), ColumnType::Int(width)) => {
                coerce_int(value, width).map(|v| out.push(v))
            }
            (ColumnData::Bool(out), _) => coerce_bool(value).map(|v| out.push(v)),
            (ColumnData::Float(out), _) => coerce_float(value).map(|v| out.push(v)),
            (ColumnData::Text(out), _) => coerce_text(value).map(|v| out.push(v)),
            (ColumnData::Timestamp(out), _) => coerce_timestamp(value).map(|v| out.push(v)),
            _ => None,
        };
        if pushed.is_none() {
            return Err(FeatureError::ColumnCoercion {
                column: column.name.clone(),
                value: render(value),
                expected: column.ty.label().to_string(),
            });
        }
    }
    Ok(data)
}

// Each coercer returns `None` on failure and `Some(None)` for a missing cell.

pub fn coerce_int(v: &Value, width: IntWidth) -> Option<Option<i64>> {
    match v {
        Value::Null => Some(None),
        Value::Number(_) | Value::String(_) => {
            let n = as_i64_any(v).or_else(|| {
                let f = v.as_str()?.trim().parse::<f64>().ok()?;
                (f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                    .then_some(f as i64)
            })?;
            width.contains(n).then_some(Some(n))
        }
        _ => None,
    }
}

pub fn coerce_bool(v: &Value) -> Option<Option<bool>> {
    match v {
        Value::Null => Some(None),
        Value::Bool(b) => Some(Some(*b)),
        _ => None,
    }
}

pub fn coerce_float(v: &Value) -> Option<Option<f64>> {
    match v {
        Value::Null => Some(None),
        Value::Number(n) => n.as_f64().map(Some),
        Value::String(s) => s.trim().parse::<f64>().ok().map(Some),
        _ => None,
    }
}

pub fn coerce_text(v: &Value) -> Option<Option<String>> {
    match v {
        Value::Null => Some(None),
        Value::String(s) => Some(Some(s.clone())),
        Value::Number(n) => Some(Some(n.to_string())),
        Value::Bool(b) => Some(Some(b.to_string())),
        Value::Array(_) | Value::Object(_) => None,
    }
}

pub fn coerce_timestamp(v: &Value) -> Option<Option<DateTime<Utc>>> {
    match v {
        Value::Null => Some(None),
        Value::Number(_) => DateTime::from_timestamp(as_i64_any(v)?, 0).map(Some),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(secs) = s.parse::<i64>() {
                return DateTime::from_timestamp(secs, 0).map(Some);
            }
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| Some(dt.with_timezone(&Utc)))
        }
        _ => None,
    }
}

fn render(v: &Value) -> String {
    let mut s = v.to_string();
    if s.len() > MAX_REPORTED_VALUE {
        let mut cut = MAX_REPORTED_VALUE;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
        s.push_str("...");
    }
    s
}
