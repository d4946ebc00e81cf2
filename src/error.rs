use thiserror::Error;

pub type FeatureResult<T> = Result<T, FeatureError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeatureError {
    #[error("invalid match: {reason}")]
    InvalidMatch { reason: String },

    #[error("unknown column: {name}")]
    UnknownColumn { name: String },

    #[error("column '{column}' cannot hold {value} as {expected}")]
    ColumnCoercion {
        column: String,
        value: String,
        expected: String,
    },

    #[error("player {account_id} already has a match at start_time {start_time}")]
    DuplicateTimestamp { account_id: i64, start_time: i64 },

    #[error("window size must be positive, got {size}")]
    InvalidWindow { size: usize },

    #[error("row has {found} cells but the catalog declares {expected} columns")]
    SchemaMismatch { expected: usize, found: usize },

    #[error("column declared twice: {name}")]
    DuplicateColumn { name: String },
}

impl FeatureError {
    pub(crate) fn invalid_match(reason: impl Into<String>) -> Self {
        FeatureError::InvalidMatch {
            reason: reason.into(),
        }
    }

    pub(crate) fn unknown_column(name: &str) -> Self {
        FeatureError::UnknownColumn {
            name: name.to_string(),
        }
    }

    /// The column a coercion failure is attributed to, if any.
    pub fn column(&self) -> Option<&str> {
        match self {
            FeatureError::ColumnCoercion { column, .. } => Some(column),
            FeatureError::UnknownColumn { name } => Some(name),
            _ => None,
        }
    }
}
