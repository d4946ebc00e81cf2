use serde_json::{Map, Value};

use crate::catalog::{ColumnCatalog, GroupKind, RepeatedGroup};
use crate::error::{FeatureError, FeatureResult};
use crate::payload::{MatchPayload, RawMatch, as_i64_any};

// The match API tags Dire players 128..=132; they follow the five Radiant slots.
const DIRE_SLOT_BASE: i64 = 128;
const RADIANT_SLOTS: i64 = 5;

/// One match as a fixed-width row: a cell per catalog column, in catalog
/// order, `Value::Null` where the record had nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatRow {
    cells: Vec<Value>,
}

impl FlatRow {
    pub fn empty(catalog: &ColumnCatalog) -> Self {
        Self {
            cells: vec![Value::Null; catalog.len()],
        }
    }

    pub fn from_cells(cells: Vec<Value>) -> Self {
        Self { cells }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[Value] {
        &self.cells
    }

    pub fn get(&self, catalog: &ColumnCatalog, name: &str) -> FeatureResult<&Value> {
        let idx = catalog.index_of(name)?;
        self.cells.get(idx).ok_or(FeatureError::SchemaMismatch {
            expected: catalog.len(),
            found: self.cells.len(),
        })
    }

    pub(crate) fn set(
        &mut self,
        catalog: &ColumnCatalog,
        name: &str,
        value: Value,
    ) -> FeatureResult<()> {
        let idx = catalog.index_of(name)?;
        let found = self.cells.len();
        let cell = self.cells.get_mut(idx).ok_or(FeatureError::SchemaMismatch {
            expected: catalog.len(),
            found,
        })?;
        *cell = value;
        Ok(())
    }

    /// Name-keyed view, mostly for inspection and debugging dumps.
    pub fn to_object(&self, catalog: &ColumnCatalog) -> Map<String, Value> {
        catalog
            .names()
            .zip(self.cells.iter())
            .map(|(name, v)| (name.to_string(), v.clone()))
            .collect()
    }
}

pub fn flatten(payload: &MatchPayload, catalog: &ColumnCatalog) -> FeatureResult<FlatRow> {
    let MatchPayload::Match(raw) = payload else {
        return Err(FeatureError::invalid_match(
            "payload is the invalid-match marker",
        ));
    };
    flatten_match(raw, catalog)
}

pub fn flatten_match(raw: &RawMatch, catalog: &ColumnCatalog) -> FeatureResult<FlatRow> {
    let mut row = FlatRow::empty(catalog);

    for (idx, column) in catalog.scalars().iter().enumerate() {
        if let Some(v) = raw.field(&column.name) {
            row.cells[idx] = v.clone();
        }
    }

    for group in catalog.groups() {
        match group.kind() {
            GroupKind::Draft => write_draft(&mut row, group, raw)?,
            GroupKind::Advantage => write_series(&mut row, group, raw),
            GroupKind::Players => write_players(&mut row, group, raw)?,
        }
    }

    Ok(row)
}

fn write_draft(row: &mut FlatRow, group: &RepeatedGroup, raw: &RawMatch) -> FeatureResult<()> {
    let events = sorted_draft(raw.draft_events())?;
    for (slot, event) in events.into_iter().take(group.capacity()).enumerate() {
        write_object(row, group, slot, event);
    }
    Ok(())
}

fn sorted_draft(events: &[Map<String, Value>]) -> FeatureResult<Vec<&Map<String, Value>>> {
    let mut keyed = Vec::with_capacity(events.len());
    for (idx, event) in events.iter().enumerate() {
        let order = event.get("order").and_then(as_i64_any).ok_or_else(|| {
            FeatureError::invalid_match(format!("draft event {idx} has no integer order"))
        })?;
        keyed.push((order, event));
    }
    keyed.sort_by_key(|(order, _)| *order);
    if let Some(pair) = keyed.windows(2).find(|pair| pair[0].0 == pair[1].0) {
        return Err(FeatureError::invalid_match(format!(
            "draft order {} appears more than once",
            pair[0].0
        )));
    }
    Ok(keyed.into_iter().map(|(_, event)| event).collect())
}

fn write_series(row: &mut FlatRow, group: &RepeatedGroup, raw: &RawMatch) {
    for (field_idx, series) in group.fields().enumerate() {
        // Samples past capacity are dropped; the schema does not grow.
        for (minute, v) in raw.series(series).iter().take(group.capacity()).enumerate() {
            row.cells[group.cell_index(minute, field_idx)] = v.clone();
        }
    }
}

fn write_players(row: &mut FlatRow, group: &RepeatedGroup, raw: &RawMatch) -> FeatureResult<()> {
    let mut taken = vec![false; group.capacity()];
    for (idx, player) in raw.players().iter().enumerate() {
        let slot = output_slot(player, group.capacity())
            .map_err(|reason| FeatureError::invalid_match(format!("player {idx}: {reason}")))?;
        if std::mem::replace(&mut taken[slot], true) {
            return Err(FeatureError::invalid_match(format!(
                "player {idx}: slot {slot} is already occupied"
            )));
        }
        write_object(row, group, slot, player);
    }
    Ok(())
}

fn output_slot(player: &Map<String, Value>, capacity: usize) -> Result<usize, String> {
    let tag = player
        .get("player_slot")
        .and_then(as_i64_any)
        .ok_or_else(|| "missing player_slot".to_string())?;
    let slot = if tag >= DIRE_SLOT_BASE {
        tag - DIRE_SLOT_BASE + RADIANT_SLOTS
    } else {
        tag
    };
    usize::try_from(slot)
        .ok()
        .filter(|s| *s < capacity)
        .ok_or_else(|| format!("player_slot {tag} is out of range"))
}

fn write_object(row: &mut FlatRow, group: &RepeatedGroup, slot: usize, obj: &Map<String, Value>) {
    for (field_idx, field) in group.fields().enumerate() {
        if let Some(v) = obj.get(field) {
            row.cells[group.cell_index(slot, field_idx)] = v.clone();
        }
    }
}
