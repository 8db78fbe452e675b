use std::io;

use thiserror::Error;

pub type ImportResult<T> = Result<T, ImportError>;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Nothing to import: the pasted content has no header row")]
    EmptyInput,

    #[error("Duplicate column names found in the header: {}", .0.join(", "))]
    DuplicateHeaders(Vec<String>),

    #[error("Only one column may be imported as {kind}; found {}", .columns.join(", "))]
    ConflictingMappings { kind: String, columns: Vec<String> },

    #[error("Row {row}: '{value}' is not a valid card number")]
    InvalidIdentifier { row: usize, value: String },

    #[error("Card number {number} appears more than once (rows {})", .rows.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "))]
    DuplicateIdentifier { number: u64, rows: Vec<usize> },

    #[error("Row {row}: card number {number} exceeds the maximum of {max}")]
    IdentifierTooLarge { row: usize, number: u64, max: u64 },

    #[error("No card number is left to assign after {0}")]
    CardNumbersExhausted(u64),

    #[error("Values longer than {limit} characters: {}", .cells.join("; "))]
    FieldTooLong { limit: usize, cells: Vec<String> },

    #[error("Only project administrators can create card types: {}", .0.join(", "))]
    UnauthorizedCardTypes(Vec<String>),

    #[error("'{name}' cannot be used as a property name: {reason}")]
    InvalidPropertyName { name: String, reason: String },

    #[error("Column '{column}' is mapped as {kind} but no matching tree property exists")]
    UnknownTreeProperty { column: String, kind: String },

    #[error("The project has no tree named '{0}'")]
    UnknownTree(String),

    #[error("Unknown import kind '{0}'")]
    UnknownKind(String),

    #[error("Project rejected schema change: {0}")]
    Schema(String),

    #[error("Row index {index} is outside the {len} materialized row(s)")]
    RowOutOfRange { index: usize, len: usize },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("Writing row store: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("Reading row store: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PropertyValueError {
    #[error("Property value ignored, invalid user: '{value}' is not a team member ({property})")]
    InvalidUser { property: String, value: String },

    #[error("{property}: '{value}' is not a number")]
    InvalidNumber { property: String, value: String },

    #[error("{property}: '{value}' is not a valid date")]
    InvalidDate { property: String, value: String },

    #[error("{property}: '{value}' is not a card reference")]
    InvalidCardReference { property: String, value: String },

    #[error("{property}: '{value}' should be yes or no")]
    InvalidBelonging { property: String, value: String },
}
