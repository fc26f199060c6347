//! Schema-placeholder SQL templates.
//!
//! Domain code writes `${schema}.table_name` wherever it means "this tenant's
//! copy of the table". A template is parsed once into text and placeholder
//! pieces; rendering walks the pieces a single time, inserting the quoted
//! schema identifier, so substituted text is never rescanned and nothing else
//! in the statement is rewritten.
//!
//! ```rust
//! use lexdata_core::{Identifier, SqlTemplate};
//!
//! let template = SqlTemplate::parse("SELECT * FROM ${schema}.publications WHERE id = $1").unwrap();
//! let schema = Identifier::new("tenant_acme").unwrap();
//! assert_eq!(
//!     template.render(&schema),
//!     "SELECT * FROM \"tenant_acme\".publications WHERE id = $1"
//! );
//! ```

use std::fmt;

use crate::error::{DataError, DataResult};
use crate::ident::Identifier;

/// The reserved token standing for the tenant's schema.
pub const SCHEMA_PLACEHOLDER: &str = "${schema}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Piece {
    Text(String),
    Schema,
}

/// A parsed SQL template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlTemplate {
    source: String,
    pieces: Vec<Piece>,
}

impl SqlTemplate {
    /// Parse a template.
    ///
    /// Fails if the template never references `${schema}` (it would not be
    /// tenant-qualified) or contains any other `${...}` token.
    pub fn parse(template: impl Into<String>) -> DataResult<Self> {
        let source = template.into();
        let mut pieces = Vec::new();
        let mut rest = source.as_str();

        while let Some(start) = rest.find("${") {
            let (text, tail) = rest.split_at(start);
            if !text.is_empty() {
                pieces.push(Piece::Text(text.to_string()));
            }
            if let Some(after) = tail.strip_prefix(SCHEMA_PLACEHOLDER) {
                pieces.push(Piece::Schema);
                rest = after;
            } else {
                let token: String = tail.chars().take_while(|c| *c != '}').take(32).collect();
                return Err(DataError::invalid_template(format!(
                    "unknown placeholder '{}}}'",
                    token
                ))
                .with_sql(source.clone()));
            }
        }
        if !rest.is_empty() {
            pieces.push(Piece::Text(rest.to_string()));
        }

        if !pieces.iter().any(|p| matches!(p, Piece::Schema)) {
            return Err(DataError::invalid_template(format!(
                "statement does not reference {}",
                SCHEMA_PLACEHOLDER
            ))
            .with_sql(source));
        }

        Ok(Self { source, pieces })
    }

    /// Assemble a template from pieces generated inside the crate.
    ///
    /// Generated statements carry quoted literals (defaults, CHECK lists)
    /// that must not be scanned for placeholders.
    pub(crate) fn from_pieces(pieces: Vec<Piece>) -> Self {
        let source = pieces
            .iter()
            .map(|p| match p {
                Piece::Text(text) => text.as_str(),
                Piece::Schema => SCHEMA_PLACEHOLDER,
            })
            .collect();
        Self { source, pieces }
    }

    /// The template as written.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Number of schema placeholders in the template.
    pub fn placeholder_count(&self) -> usize {
        self.pieces.iter().filter(|p| matches!(p, Piece::Schema)).count()
    }

    /// Substitute the tenant schema and produce executable SQL.
    pub fn render(&self, schema: &Identifier) -> String {
        let quoted = schema.quoted();
        let mut sql = String::with_capacity(self.source.len() + quoted.len() * 2);
        for piece in &self.pieces {
            match piece {
                Piece::Text(text) => sql.push_str(text),
                Piece::Schema => sql.push_str(&quoted),
            }
        }
        sql
    }
}

impl fmt::Display for SqlTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl TryFrom<&str> for SqlTemplate {
    type Error = DataError;

    fn try_from(value: &str) -> DataResult<Self> {
        Self::parse(value)
    }
}

impl TryFrom<String> for SqlTemplate {
    type Error = DataError;

    fn try_from(value: String) -> DataResult<Self> {
        Self::parse(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorCode;
    use pretty_assertions::assert_eq;

    fn schema() -> Identifier {
        Identifier::new("tenant_acme").unwrap()
    }

    #[test]
    fn test_render_multiple_placeholders() {
        let t = SqlTemplate::parse(
            "SELECT e.* FROM ${schema}.estimates e JOIN ${schema}.estimate_items i ON i.estimate_id = e.id",
        )
        .unwrap();
        assert_eq!(t.placeholder_count(), 2);
        assert_eq!(
            t.render(&schema()),
            "SELECT e.* FROM \"tenant_acme\".estimates e JOIN \"tenant_acme\".estimate_items i ON i.estimate_id = e.id"
        );
    }

    #[test]
    fn test_positional_params_untouched() {
        let t = SqlTemplate::parse("UPDATE ${schema}.t SET a = $1 WHERE id = $2 AND b = $$x$$").unwrap();
        assert_eq!(
            t.render(&schema()),
            "UPDATE \"tenant_acme\".t SET a = $1 WHERE id = $2 AND b = $$x$$"
        );
    }

    #[test]
    fn test_requires_placeholder() {
        let err = SqlTemplate::parse("SELECT * FROM public.tenants").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidTemplate);
    }

    #[test]
    fn test_rejects_unknown_placeholder() {
        let err = SqlTemplate::parse("SELECT * FROM ${schema}.t WHERE x = '${user}'").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidTemplate);
        assert!(err.message.contains("${user}"));
    }

    #[test]
    fn test_no_rescan_of_substitution() {
        // A rendered template must not be fed back through parse; render is one pass.
        let t = SqlTemplate::parse("${schema}").unwrap();
        assert_eq!(t.render(&schema()), "\"tenant_acme\"");
    }
}
