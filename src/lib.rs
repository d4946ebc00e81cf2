pub mod aggregate;
pub mod catalog;
pub mod coerce;
pub mod config;
pub mod error;
pub mod export;
pub mod flatten;
pub mod history;
pub mod history_db;
pub mod payload;
pub mod pipeline;
pub mod pregame;
pub mod table;

pub use aggregate::{FeatureValue, FeatureVector, aggregate};
pub use catalog::{ColumnCatalog, ColumnType, GroupKind};
pub use error::{FeatureError, FeatureResult};
pub use flatten::{FlatRow, flatten};
pub use history::{HistoryStore, StatFields, StatSnapshot};
pub use payload::{MatchPayload, RawMatch};
pub use table::{TypedTable, assemble};
