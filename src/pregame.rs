use serde_json::{Number, Value};

use crate::aggregate::{FeatureValue, aggregate};
use crate::catalog::{
    CatalogBuilder, ColumnCatalog, ColumnType, GroupKind, IntWidth, PLAYER_SLOTS, RepeatedGroup,
};
use crate::error::{FeatureError, FeatureResult};
use crate::flatten::FlatRow;
use crate::history::{HistoryStore, StatFields};
use crate::payload::as_i64_any;

const KEY_COLUMNS: [(&str, ColumnType); 3] = [
    ("match_id", ColumnType::Int(IntWidth::I64)),
    ("start_time", ColumnType::Timestamp),
    ("radiant_win", ColumnType::Bool),
];

/// Schema of the pre-game table: match keys plus every tracked stat, per
/// slot, as it looked before kickoff.
pub fn pregame_catalog(fields: &StatFields) -> FeatureResult<ColumnCatalog> {
    let stats = fields
        .numeric
        .iter()
        .map(|f| (f.as_str(), ColumnType::Float))
        .chain(
            fields
                .categorical
                .iter()
                .map(|f| (f.as_str(), ColumnType::Category)),
        )
        .collect::<Vec<_>>();
    CatalogBuilder::new()
        .scalars(&KEY_COLUMNS)
        .group(RepeatedGroup::new(
            GroupKind::Players,
            "",
            &stats,
            PLAYER_SLOTS,
        ))
        .build()
}

/// Builds the pre-game row for one flattened match from the players'
/// histories, looked up strictly before the match start.
pub fn pregame_row(
    row: &FlatRow,
    catalog: &ColumnCatalog,
    store: &HistoryStore,
    fields: &StatFields,
    window_size: usize,
    pregame: &ColumnCatalog,
) -> FeatureResult<FlatRow> {
    let mut out = FlatRow::empty(pregame);
    for (name, _) in KEY_COLUMNS {
        out.set(pregame, name, row.get(catalog, name)?.clone())?;
    }

    let start_time = as_i64_any(row.get(catalog, "start_time")?)
        .ok_or_else(|| FeatureError::invalid_match("match has no start_time"))?;
    let players = catalog
        .group(GroupKind::Players)
        .ok_or_else(|| FeatureError::unknown_column("players"))?;

    for slot in players.slots() {
        let account = row.get(catalog, &players.column_name("account_id", slot))?;
        let Some(account_id) = as_i64_any(account) else {
            continue;
        };
        let history = store.get_history(account_id);
        let features = aggregate(&history, start_time, window_size, fields, slot)?;
        for (name, value) in features {
            let cell = match value {
                Some(FeatureValue::Mean(v)) => Number::from_f64(v).map_or(Value::Null, Value::Number),
                Some(FeatureValue::Mode(s)) => Value::String(s),
                None => Value::Null,
            };
            out.set(pregame, &name, cell)?;
        }
    }
    Ok(out)
}
