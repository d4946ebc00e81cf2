use serde_json::{Map, Value};

use crate::error::{FeatureError, FeatureResult};

const SENTINEL: &str = "-1";

/// One entry of a fetched batch: either a usable record or the marker the
/// fetcher stores for matches it could not retrieve.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchPayload {
    Invalid,
    Match(RawMatch),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawMatch {
    fields: Map<String, Value>,
    draft: Vec<Map<String, Value>>,
    players: Vec<Map<String, Value>>,
}

impl MatchPayload {
    pub fn from_json(raw: &str) -> FeatureResult<Self> {
        let value = serde_json::from_str::<Value>(raw.trim())
            .map_err(|err| FeatureError::invalid_match(format!("malformed json: {err}")))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> FeatureResult<Self> {
        match value {
            Value::Null => Ok(MatchPayload::Invalid),
            Value::String(s) if s.trim() == SENTINEL => Ok(MatchPayload::Invalid),
            Value::Number(n) if n.as_i64() == Some(-1) => Ok(MatchPayload::Invalid),
            Value::Object(map) => RawMatch::from_object(map).map(MatchPayload::Match),
            other => Err(FeatureError::invalid_match(format!(
                "expected an object, got {}",
                kind_of(&other)
            ))),
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, MatchPayload::Invalid)
    }

    pub fn as_match(&self) -> Option<&RawMatch> {
        match self {
            MatchPayload::Match(m) => Some(m),
            MatchPayload::Invalid => None,
        }
    }
}

impl RawMatch {
    pub fn from_object(mut fields: Map<String, Value>) -> FeatureResult<Self> {
        let draft = take_object_list(&mut fields, "draft_timings")?;
        let players = take_object_list(&mut fields, "players")?;
        Ok(Self {
            fields,
            draft,
            players,
        })
    }

    /// Top-level value, `None` when absent or null.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).filter(|v| !v.is_null())
    }

    pub fn series(&self, name: &str) -> &[Value] {
        self.fields
            .get(name)
            .and_then(|v| v.as_array())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn draft_events(&self) -> &[Map<String, Value>] {
        &self.draft
    }

    pub fn players(&self) -> &[Map<String, Value>] {
        &self.players
    }

    pub fn match_id(&self) -> Option<i64> {
        self.field("match_id").and_then(as_i64_any)
    }

    pub fn game_mode(&self) -> Option<i64> {
        self.field("game_mode").and_then(as_i64_any)
    }
}

fn take_object_list(
    fields: &mut Map<String, Value>,
    key: &str,
) -> FeatureResult<Vec<Map<String, Value>>> {
    match fields.remove(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| match item {
                Value::Object(map) => Ok(map),
                other => Err(FeatureError::invalid_match(format!(
                    "{key}[{idx}] is {}, expected an object",
                    kind_of(&other)
                ))),
            })
            .collect(),
        Some(other) => Err(FeatureError::invalid_match(format!(
            "{key} is {}, expected a list",
            kind_of(&other)
        ))),
    }
}

pub(crate) fn as_i64_any(v: &Value) -> Option<i64> {
    if let Some(n) = v.as_i64() {
        return Some(n);
    }
    if let Some(f) = v.as_f64()
        && f.fract() == 0.0
        && f >= i64::MIN as f64
        && f <= i64::MAX as f64
    {
        return Some(f as i64);
    }
    v.as_str()?.trim().parse::<i64>().ok()
}

pub(crate) fn as_f64_any(v: &Value) -> Option<f64> {
    if let Some(n) = v.as_f64() {
        return Some(n);
    }
    v.as_str()?.trim().parse::<f64>().ok()
}

pub(crate) fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sentinel_forms_are_invalid() {
        assert!(MatchPayload::from_json("\"-1\"").unwrap().is_invalid());
        assert!(MatchPayload::from_json("-1").unwrap().is_invalid());
        assert!(MatchPayload::from_json("null").unwrap().is_invalid());
    }

    #[test]
    fn non_object_payload_is_rejected() {
        let err = MatchPayload::from_value(json!([1, 2])).unwrap_err();
        assert!(matches!(err, FeatureError::InvalidMatch { .. }));
    }

    #[test]
    fn repeated_sections_are_split_out() {
        let payload = MatchPayload::from_value(json!({
            "match_id": "77",
            "game_mode": 22,
            "draft_timings": null,
            "players": [{"player_slot": 0}],
            "radiant_gold_adv": [1, 2, 3]
        }))
        .unwrap();
        let m = payload.as_match().unwrap();
        assert_eq!(m.match_id(), Some(77));
        assert_eq!(m.game_mode(), Some(22));
        assert!(m.draft_events().is_empty());
        assert_eq!(m.players().len(), 1);
        assert_eq!(m.series("radiant_gold_adv").len(), 3);
        assert!(m.series("radiant_xp_adv").is_empty());
        assert!(m.field("players").is_none());
    }

    #[test]
    fn player_entries_must_be_objects() {
        let err = MatchPayload::from_value(json!({"players": [1]})).unwrap_err();
        assert!(matches!(err, FeatureError::InvalidMatch { reason } if reason.contains("players[0]")));
    }
}
