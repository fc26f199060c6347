//! Statement assembly.
//!
//! [`SqlBuilder`] writes schema-placeholder statements piece by piece. Values
//! always go through [`SqlBuilder::push_param`], which emits a `$n` marker and
//! records the value; identifiers go through [`SqlBuilder::push_identifier`],
//! which quotes them. The result is a [`Statement`]: a template plus its
//! positional parameters.

use std::fmt;

use crate::error::DataResult;
use crate::ident::{quote, Identifier};
use crate::template::{Piece, SqlTemplate};
use crate::value::Value;

/// A schema-placeholder template together with its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    template: SqlTemplate,
    params: Vec<Value>,
}

impl Statement {
    /// Parse a hand-written template and attach parameters.
    pub fn new(template: &str, params: Vec<Value>) -> DataResult<Self> {
        Ok(Self {
            template: SqlTemplate::parse(template)?,
            params,
        })
    }

    /// Attach parameters to an already parsed template.
    pub fn from_template(template: SqlTemplate, params: Vec<Value>) -> Self {
        Self { template, params }
    }

    /// The template.
    pub fn template(&self) -> &SqlTemplate {
        &self.template
    }

    /// The bound parameters, in `$1..$n` order.
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Render the SQL for a schema.
    pub fn render(&self, schema: &Identifier) -> String {
        self.template.render(schema)
    }

    /// Split into template and parameters.
    pub fn into_parts(self) -> (SqlTemplate, Vec<Value>) {
        (self.template, self.params)
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.template)
    }
}

/// A SQL builder for schema-qualified statements.
#[derive(Debug, Clone, Default)]
pub struct SqlBuilder {
    pieces: Vec<Piece>,
    text: String,
    params: Vec<Value>,
}

impl SqlBuilder {
    /// Create a new SQL builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a literal SQL string.
    pub fn push(&mut self, sql: impl AsRef<str>) -> &mut Self {
        self.text.push_str(sql.as_ref());
        self
    }

    /// Push the tenant schema placeholder.
    pub fn push_schema(&mut self) -> &mut Self {
        self.flush();
        self.pieces.push(Piece::Schema);
        self
    }

    /// Push a schema-qualified table reference.
    pub fn push_table(&mut self, table: &Identifier) -> &mut Self {
        self.push_schema();
        self.text.push('.');
        self.text.push_str(&table.quoted());
        self
    }

    /// Push a quoted identifier.
    ///
    /// Callers pass names that were validated when their `TableSchema` was built.
    pub fn push_identifier(&mut self, name: &str) -> &mut Self {
        self.text.push_str(&quote(name));
        self
    }

    /// Push a parameter placeholder and record its value.
    pub fn push_param(&mut self, value: impl Into<Value>) -> &mut Self {
        self.params.push(value.into());
        let marker = format!("${}", self.params.len());
        self.text.push_str(&marker);
        self
    }

    /// Push a separator between parts.
    pub fn push_sep(&mut self, sep: &str) -> &mut Self {
        self.text.push_str(sep);
        self
    }

    /// Get the next parameter index.
    pub fn next_param_index(&self) -> usize {
        self.params.len() + 1
    }

    /// Get the current parameters.
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Build the final statement.
    pub fn build(mut self) -> Statement {
        self.flush();
        Statement {
            template: SqlTemplate::from_pieces(self.pieces),
            params: self.params,
        }
    }

    fn flush(&mut self) {
        if !self.text.is_empty() {
            self.pieces.push(Piece::Text(std::mem::take(&mut self.text)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sql_builder() {
        let table = Identifier::new("publications").unwrap();
        let mut builder = SqlBuilder::new();
        builder
            .push("SELECT * FROM ")
            .push_table(&table)
            .push(" WHERE ")
            .push_identifier("user_id")
            .push(" = ")
            .push_param("u1")
            .push(" AND ")
            .push_identifier("status")
            .push(" = ")
            .push_param("nova");

        assert_eq!(builder.next_param_index(), 3);
        let stmt = builder.build();
        assert_eq!(
            stmt.template().source(),
            "SELECT * FROM ${schema}.\"publications\" WHERE \"user_id\" = $1 AND \"status\" = $2"
        );
        assert_eq!(
            stmt.render(&Identifier::new("tenant_acme").unwrap()),
            "SELECT * FROM \"tenant_acme\".\"publications\" WHERE \"user_id\" = $1 AND \"status\" = $2"
        );
        assert_eq!(stmt.params(), &[Value::from("u1"), Value::from("nova")]);
    }

    #[test]
    fn test_params_are_never_inlined() {
        let table = Identifier::new("t").unwrap();
        let mut builder = SqlBuilder::new();
        builder
            .push("SELECT 1 FROM ")
            .push_table(&table)
            .push(" WHERE a = ")
            .push_param("'; DROP TABLE t; --");
        let stmt = builder.build();
        assert!(!stmt.template().source().contains("DROP"));
    }

    #[test]
    fn test_generated_literals_are_not_placeholders() {
        let table = Identifier::new("t").unwrap();
        let mut builder = SqlBuilder::new();
        builder
            .push("CREATE TABLE ")
            .push_table(&table)
            .push(" (note TEXT DEFAULT '${schema}')");
        let stmt = builder.build();
        assert_eq!(stmt.template().placeholder_count(), 1);
    }

    #[test]
    fn test_statement_from_hand_written_template() {
        let stmt = Statement::new(
            "SELECT * FROM ${schema}.estimates WHERE user_id = $1",
            vec![Value::from("u1")],
        )
        .unwrap();
        assert_eq!(stmt.params().len(), 1);
        assert!(Statement::new("SELECT 1", vec![]).is_err());
    }
}
