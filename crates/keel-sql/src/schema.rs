//! Column and foreign-key descriptors.

use serde::{Deserialize, Serialize};

/// Normalized column type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ColumnType {
    /// Integer with its representable range.
    Integer {
        /// Smallest value, 0 for unsigned columns
        min: i64,
        /// Largest value
        max: u64,
    },
    /// Boolean flag stored as an integer or 0/1 enum.
    Bool,
    /// Short text with a maximum length.
    Text {
        /// Maximum length
        size: u64,
    },
    /// Long text with a maximum length.
    TextArea {
        /// Maximum length
        size: u64,
    },
    /// Decimal or floating point number.
    Float,
    /// Time of day.
    Time,
    /// Calendar date.
    Date,
    /// Date and time.
    DateTime,
    /// One of a fixed set of values.
    Enum {
        /// Allowed values in declaration order
        members: Vec<String>,
    },
    /// Any subset of a fixed set of values.
    Set {
        /// Allowed values in declaration order
        members: Vec<String>,
    },
}

/// One table column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    /// Owning table
    pub table: String,
    /// Column name
    pub name: String,
    /// 1-based position in the table
    pub position: u32,
    /// Accepts NULL
    pub nullable: bool,
    /// Part of the primary key
    pub primary_key: bool,
    /// Has a unique index
    pub unique: bool,
    /// Type as declared in the database, e.g. `int(10) unsigned`
    pub declared_type: String,
    /// Default value expression
    pub default: Option<String>,
    /// Maximum character length for string columns
    pub length: Option<u64>,
    /// Filled by the database on insert
    pub autoincrement: bool,
    /// Normalized type, `None` when the declared type is not recognized
    pub kind: Option<ColumnType>,
}

impl Column {
    /// A column with only a name and declared type.
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            ..Self::default()
        }
    }

    /// Sets the maximum character length.
    #[must_use]
    pub fn with_length(mut self, length: u64) -> Self {
        self.length = Some(length);
        self
    }
}

/// One side of a foreign key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyColumn {
    /// Table name
    pub table: String,
    /// Column name
    pub column: String,
}

/// A foreign-key constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Constraint name
    pub name: String,
    /// Referenced side
    pub primary: KeyColumn,
    /// Referencing side
    pub secondary: KeyColumn,
}

/// Bind-parameter syntax of a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placeholder {
    /// Placeholder character, e.g. `?` or `$`
    pub character: char,
    /// Placeholders are numbered (`$1`, `$2`)
    pub numeric: bool,
}

impl Placeholder {
    /// Placeholder text for the 1-based argument `index`.
    pub fn render(&self, index: usize) -> String {
        if self.numeric {
            format!("{}{index}", self.character)
        } else {
            self.character.to_string()
        }
    }
}
