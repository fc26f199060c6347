//! Allow-listed SQL identifiers.
//!
//! Table, column, index and schema names are the only text ever interpolated
//! into a statement. They are accepted only through [`Identifier::new`], which
//! admits lowercase ASCII letters, digits and underscores, and are always
//! emitted double-quoted.

use std::fmt;

use crate::error::{DataError, DataResult};

/// Longest identifier Postgres keeps without truncation (NAMEDATALEN - 1).
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// A validated SQL identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(String);

impl Identifier {
    /// Validate a name against the identifier allow-list.
    pub fn new(name: impl Into<String>) -> DataResult<Self> {
        let name = name.into();
        validate(&name)?;
        Ok(Self(name))
    }

    /// Get the raw (unquoted) name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The name as a double-quoted SQL identifier.
    pub fn quoted(&self) -> String {
        quote(&self.0)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Identifier {
    type Error = DataError;

    fn try_from(value: &str) -> DataResult<Self> {
        Self::new(value)
    }
}

impl TryFrom<String> for Identifier {
    type Error = DataError;

    fn try_from(value: String) -> DataResult<Self> {
        Self::new(value)
    }
}

fn validate(name: &str) -> DataResult<()> {
    if name.is_empty() {
        return Err(DataError::invalid_identifier(name, "must not be empty"));
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(DataError::invalid_identifier(
            name,
            format!("longer than {} bytes", MAX_IDENTIFIER_LEN),
        ));
    }
    let mut chars = name.chars();
    let first = chars.next().unwrap_or('_');
    if !(first.is_ascii_lowercase() || first == '_') {
        return Err(DataError::invalid_identifier(
            name,
            "must start with a lowercase letter or underscore",
        ));
    }
    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
        return Err(DataError::invalid_identifier(
            name,
            "only lowercase letters, digits and underscores are allowed",
        ));
    }
    Ok(())
}

/// Double-quote an identifier, doubling embedded quotes.
pub fn quote(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a string as a SQL literal, doubling embedded single quotes.
///
/// Only used for literals fixed in table definitions (defaults, CHECK lists).
pub(crate) fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
