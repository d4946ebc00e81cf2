use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::{ColumnCatalog, GroupKind};
use crate::error::{FeatureError, FeatureResult};
use crate::flatten::FlatRow;
use crate::payload::{as_f64_any, as_i64_any};

pub const NUMERIC_STATS: [&str; 42] = [
    "assists",
    "camps_stacked",
    "deaths",
    "gold",
    "gold_per_min",
    "gold_spent",
    "hero_damage",
    "hero_healing",
    "kills",
    "last_hits",
    "level",
    "obs_placed",
    "pings",
    "rune_pickups",
    "sen_placed",
    "stuns",
    "tower_damage",
    "xp_per_min",
    "total_gold",
    "total_xp",
    "kills_per_min",
    "kda",
    "abandons",
    "neutral_kills",
    "tower_kills",
    "courier_kills",
    "lane_kills",
    "hero_kills",
    "observer_kills",
    "sentry_kills",
    "roshan_kills",
    "necronomicon_kills",
    "ancient_kills",
    "buyback_count",
    "observer_uses",
    "sentry_uses",
    "lane_efficiency",
    "lane_efficiency_pct",
    "purchase_tpscroll",
    "actions_per_min",
    "life_state_dead",
    "rank_tier",
];

pub const CATEGORY_STATS: [&str; 10] = [
    "hero_id",
    "item_0",
    "item_1",
    "item_2",
    "item_3",
    "item_4",
    "item_5",
    "isRadiant",
    "lane",
    "lane_role",
];

/// Which per-match player stats are tracked over time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatFields {
    pub numeric: Vec<String>,
    pub categorical: Vec<String>,
}

impl Default for StatFields {
    fn default() -> Self {
        Self {
            numeric: NUMERIC_STATS.iter().map(|s| s.to_string()).collect(),
            categorical: CATEGORY_STATS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// One player's stats in one match. Fields absent from a map are missing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StatSnapshot {
    #[serde(default)]
    pub numeric: BTreeMap<String, f64>,
    #[serde(default)]
    pub categorical: BTreeMap<String, String>,
}

impl StatSnapshot {
    pub fn with_numeric(mut self, field: &str, v: f64) -> Self {
        self.numeric.insert(field.to_string(), v);
        self
    }

    pub fn with_category(mut self, field: &str, v: &str) -> Self {
        self.categorical.insert(field.to_string(), v.to_string());
        self
    }

    /// Pulls the tracked fields of `slot` out of a flattened match.
    pub fn from_row(
        row: &FlatRow,
        catalog: &ColumnCatalog,
        fields: &StatFields,
        slot: usize,
    ) -> FeatureResult<Self> {
        let players = catalog
            .group(GroupKind::Players)
            .ok_or_else(|| FeatureError::unknown_column("players"))?;
        let mut snapshot = StatSnapshot::default();
        for field in &fields.numeric {
            let v = row.get(catalog, &players.column_name(field, slot))?;
            if let Some(n) = as_f64_any(v).filter(|n| n.is_finite()) {
                snapshot.numeric.insert(field.clone(), n);
            }
        }
        for field in &fields.categorical {
            let v = row.get(catalog, &players.column_name(field, slot))?;
            if let Some(s) = category_text(v) {
                snapshot.categorical.insert(field.clone(), s);
            }
        }
        Ok(snapshot)
    }
}

fn category_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub type HistoryEntry = (i64, StatSnapshot);

type Timeline = BTreeMap<i64, StatSnapshot>;

/// Append-only per-account match history. Each account's timeline has its
/// own lock, so concurrent ingestion of different players never contends and
/// appends for one player are serialized.
#[derive(Debug, Default)]
pub struct HistoryStore {
    timelines: RwLock<HashMap<i64, Arc<Mutex<Timeline>>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlotIngest {
    pub slot: usize,
    pub account_id: i64,
    pub result: FeatureResult<()>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(
        &self,
        account_id: i64,
        start_time: i64,
        snapshot: StatSnapshot,
    ) -> FeatureResult<()> {
        let timeline = self.timeline(account_id);
        let mut timeline = timeline.lock().expect("history timeline lock poisoned");
        if timeline.contains_key(&start_time) {
            return Err(FeatureError::DuplicateTimestamp {
                account_id,
                start_time,
            });
        }
        timeline.insert(start_time, snapshot);
        Ok(())
    }

    /// Entries ascending by start time. Unknown accounts have no history.
    pub fn get_history(&self, account_id: i64) -> Vec<HistoryEntry> {
        let timeline = {
            let guard = self.timelines.read().expect("history index lock poisoned");
            guard.get(&account_id).cloned()
        };
        let Some(timeline) = timeline else {
            return Vec::new();
        };
        let timeline = timeline.lock().expect("history timeline lock poisoned");
        timeline
            .iter()
            .map(|(t, snapshot)| (*t, snapshot.clone()))
            .collect()
    }

    pub fn accounts(&self) -> Vec<i64> {
        let guard = self.timelines.read().expect("history index lock poisoned");
        let mut ids = guard.keys().copied().collect::<Vec<_>>();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        let guard = self.timelines.read().expect("history index lock poisoned");
        guard
            .values()
            .map(|t| t.lock().expect("history timeline lock poisoned").len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records a snapshot for every occupied slot of a flattened match that
    /// carries an account id. Slots without one (anonymous players) are
    /// skipped; per-slot failures are returned rather than dropped.
    pub fn ingest_match(
        &self,
        row: &FlatRow,
        catalog: &ColumnCatalog,
        fields: &StatFields,
    ) -> FeatureResult<Vec<SlotIngest>> {
        let start_time = as_i64_any(row.get(catalog, "start_time")?).ok_or_else(|| {
            FeatureError::invalid_match("match has no start_time to key history by")
        })?;
        let players = catalog
            .group(GroupKind::Players)
            .ok_or_else(|| FeatureError::unknown_column("players"))?;

        let mut out = Vec::new();
        for slot in players.slots() {
            let account = row.get(catalog, &players.column_name("account_id", slot))?;
            let Some(account_id) = as_i64_any(account) else {
                continue;
            };
            let snapshot = StatSnapshot::from_row(row, catalog, fields, slot)?;
            out.push(SlotIngest {
                slot,
                account_id,
                result: self.append(account_id, start_time, snapshot),
            });
        }
        Ok(out)
    }

    fn timeline(&self, account_id: i64) -> Arc<Mutex<Timeline>> {
        {
            let guard = self.timelines.read().expect("history index lock poisoned");
            if let Some(t) = guard.get(&account_id) {
                return Arc::clone(t);
            }
        }
        let mut guard = self.timelines.write().expect("history index lock poisoned");
        Arc::clone(guard.entry(account_id).or_default())
    }
}
