use std::collections::HashMap;
use std::ops::Range;

use crate::error::{FeatureError, FeatureResult};

pub const DRAFT_SLOTS: usize = 25;
pub const ADVANTAGE_SAMPLES: usize = 180;
pub const PLAYER_SLOTS: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntWidth {
    I8,
    I16,
    I32,
    I64,
}

impl IntWidth {
    pub fn bounds(self) -> (i64, i64) {
        match self {
            IntWidth::I8 => (i8::MIN as i64, i8::MAX as i64),
            IntWidth::I16 => (i16::MIN as i64, i16::MAX as i64),
            IntWidth::I32 => (i32::MIN as i64, i32::MAX as i64),
            IntWidth::I64 => (i64::MIN, i64::MAX),
        }
    }

    pub fn contains(self, v: i64) -> bool {
        let (lo, hi) = self.bounds();
        (lo..=hi).contains(&v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Int(IntWidth),
    Bool,
    Float,
    Category,
    Text,
    Timestamp,
}

impl ColumnType {
    pub fn label(self) -> &'static str {
        match self {
            ColumnType::Int(IntWidth::I8) => "int8",
            ColumnType::Int(IntWidth::I16) => "int16",
            ColumnType::Int(IntWidth::I32) => "int32",
            ColumnType::Int(IntWidth::I64) => "int64",
            ColumnType::Bool => "bool",
            ColumnType::Float => "float64",
            ColumnType::Category => "category",
            ColumnType::Text => "string",
            ColumnType::Timestamp => "timestamp",
        }
    }
}

const I8: ColumnType = ColumnType::Int(IntWidth::I8);
const I16: ColumnType = ColumnType::Int(IntWidth::I16);
const I32: ColumnType = ColumnType::Int(IntWidth::I32);
const I64: ColumnType = ColumnType::Int(IntWidth::I64);
const BOOL: ColumnType = ColumnType::Bool;
const F64: ColumnType = ColumnType::Float;
const CAT: ColumnType = ColumnType::Category;
const TEXT: ColumnType = ColumnType::Text;
const TS: ColumnType = ColumnType::Timestamp;

pub const MATCH_FIELDS: [(&str, ColumnType); 32] = [
    ("match_id", I64),
    ("barracks_status_dire", I16),
    ("barracks_status_radiant", I16),
    ("cluster", I32),
    ("dire_score", I16),
    ("duration", I64),
    ("engine", I8),
    ("first_blood_time", I64),
    ("game_mode", I8),
    ("human_players", I8),
    ("leagueid", I64),
    ("lobby_type", I32),
    ("match_seq_num", I64),
    ("negative_votes", I16),
    ("positive_votes", I16),
    ("radiant_score", I16),
    ("radiant_win", BOOL),
    ("start_time", TS),
    ("tower_status_dire", I16),
    ("tower_status_radiant", I16),
    ("version", I16),
    ("replay_salt", I32),
    ("series_id", I64),
    ("series_type", I64),
    ("skill", CAT),
    ("patch", I32),
    ("region", I32),
    ("throw", I64),
    ("comeback", I32),
    ("loss", I64),
    ("win", I16),
    ("replay_url", TEXT),
];

pub const DRAFT_FIELDS: [(&str, ColumnType); 7] = [
    ("order", I8),
    ("pick", BOOL),
    ("active_team", I8),
    ("hero_id", I16),
    ("player_slot", I16),
    ("extra_time", I32),
    ("total_time_taken", I16),
];

pub const ADVANTAGE_SERIES: [(&str, ColumnType); 2] =
    [("radiant_gold_adv", I32), ("radiant_xp_adv", I32)];

pub const PLAYER_FIELDS: [(&str, ColumnType); 62] = [
    ("player_slot", I16),
    ("account_id", I64),
    ("assists", I8),
    ("camps_stacked", I8),
    ("deaths", I8),
    ("denies", I16),
    ("gold", I32),
    ("gold_per_min", I32),
    ("gold_spent", I32),
    ("hero_damage", I32),
    ("hero_healing", I32),
    ("hero_id", CAT),
    ("item_0", CAT),
    ("item_1", CAT),
    ("item_2", CAT),
    ("item_3", CAT),
    ("item_4", CAT),
    ("item_5", CAT),
    ("kills", I8),
    ("last_hits", I16),
    ("leaver_status", CAT),
    ("level", I8),
    ("obs_placed", I8),
    ("party_id", I32),
    ("hero_variant", I64),
    ("pings", I16),
    ("rune_pickups", I8),
    ("sen_placed", I8),
    ("stuns", F64),
    ("tower_damage", I32),
    ("xp_per_min", I16),
    ("personaname", TEXT),
    ("name", TEXT),
    ("last_login", TEXT),
    ("isRadiant", BOOL),
    ("total_gold", I32),
    ("total_xp", I32),
    ("kills_per_min", F64),
    ("kda", F64),
    ("abandons", I8),
    ("neutral_kills", I16),
    ("tower_kills", I8),
    ("courier_kills", I8),
    ("lane_kills", I16),
    ("hero_kills", I16),
    ("observer_kills", I8),
    ("sentry_kills", I8),
    ("roshan_kills", I8),
    ("necronomicon_kills", I8),
    ("ancient_kills", I64),
    ("buyback_count", I8),
    ("observer_uses", I8),
    ("sentry_uses", I8),
    ("lane_efficiency", F64),
    ("lane_efficiency_pct", F64),
    ("lane", CAT),
    ("lane_role", CAT),
    ("is_roaming", BOOL),
    ("purchase_tpscroll", I16),
    ("actions_per_min", I16),
    ("life_state_dead", I64),
    ("rank_tier", I16),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupKind {
    Draft,
    Advantage,
    Players,
}

/// A structure that repeats up to `capacity` times in the source record and
/// is unrolled into `capacity * fields.len()` contiguous columns.
#[derive(Debug, Clone)]
pub struct RepeatedGroup {
    kind: GroupKind,
    prefix: String,
    fields: Vec<(String, ColumnType)>,
    capacity: usize,
    offset: usize,
}

impl RepeatedGroup {
    pub fn new(
        kind: GroupKind,
        prefix: &str,
        fields: &[(&str, ColumnType)],
        capacity: usize,
    ) -> Self {
        Self {
            kind,
            prefix: prefix.to_string(),
            fields: fields
                .iter()
                .map(|(name, ty)| (name.to_string(), *ty))
                .collect(),
            capacity,
            offset: 0,
        }
    }

    pub fn kind(&self) -> GroupKind {
        self.kind
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn slots(&self) -> Range<usize> {
        0..self.capacity
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn column_name(&self, field: &str, slot: usize) -> String {
        format!("{}{}_{}", self.prefix, field, slot)
    }

    /// Position in the catalog of `field_idx` at `slot`.
    pub fn cell_index(&self, slot: usize, field_idx: usize) -> usize {
        debug_assert!(slot < self.capacity && field_idx < self.fields.len());
        self.offset + slot * self.fields.len() + field_idx
    }

    fn expand(&self) -> impl Iterator<Item = Column> + '_ {
        self.slots().flat_map(move |slot| {
            self.fields.iter().map(move |(field, ty)| Column {
                name: self.column_name(field, slot),
                ty: *ty,
            })
        })
    }
}

#[derive(Debug, Default)]
pub struct CatalogBuilder {
    scalars: Vec<Column>,
    groups: Vec<RepeatedGroup>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scalars(mut self, fields: &[(&str, ColumnType)]) -> Self {
        self.scalars.extend(fields.iter().map(|(name, ty)| Column {
            name: name.to_string(),
            ty: *ty,
        }));
        self
    }

    pub fn group(mut self, group: RepeatedGroup) -> Self {
        self.groups.push(group);
        self
    }

    pub fn build(self) -> FeatureResult<ColumnCatalog> {
        let scalar_count = self.scalars.len();
        let mut columns = self.scalars;
        let mut groups = Vec::with_capacity(self.groups.len());
        for mut group in self.groups {
            group.offset = columns.len();
            columns.extend(group.expand());
            groups.push(group);
        }

        let mut index = HashMap::with_capacity(columns.len());
        for (idx, column) in columns.iter().enumerate() {
            if index.insert(column.name.clone(), idx).is_some() {
                return Err(FeatureError::DuplicateColumn {
                    name: column.name.clone(),
                });
            }
        }

        Ok(ColumnCatalog {
            columns,
            index,
            groups,
            scalar_count,
        })
    }
}

/// The fixed target schema. Built once and passed by reference to every
/// stage that needs it.
#[derive(Debug, Clone)]
pub struct ColumnCatalog {
    columns: Vec<Column>,
    index: HashMap<String, usize>,
    groups: Vec<RepeatedGroup>,
    scalar_count: usize,
}

impl ColumnCatalog {
    /// Schema for detailed match payloads of the public match API.
    pub fn standard() -> FeatureResult<Self> {
        CatalogBuilder::new()
            .scalars(&MATCH_FIELDS)
            .group(RepeatedGroup::new(
                GroupKind::Draft,
                "draft_",
                &DRAFT_FIELDS,
                DRAFT_SLOTS,
            ))
            .group(RepeatedGroup::new(
                GroupKind::Advantage,
                "",
                &ADVANTAGE_SERIES,
                ADVANTAGE_SAMPLES,
            ))
            .group(RepeatedGroup::new(
                GroupKind::Players,
                "",
                &PLAYER_FIELDS,
                PLAYER_SLOTS,
            ))
            .build()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn scalars(&self) -> &[Column] {
        &self.columns[..self.scalar_count]
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn index_of(&self, name: &str) -> FeatureResult<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| FeatureError::unknown_column(name))
    }

    pub fn column_type(&self, name: &str) -> FeatureResult<ColumnType> {
        let idx = self.index_of(name)?;
        Ok(self.columns[idx].ty)
    }

    pub fn group(&self, kind: GroupKind) -> Option<&RepeatedGroup> {
        self.groups.iter().find(|g| g.kind == kind)
    }

    pub fn groups(&self) -> &[RepeatedGroup] {
        &self.groups
    }
}
