//! Lazy, idempotent table provisioning.
//!
//! [`SchemaProvisioner::ensure`] brings a tenant's table up to its declared
//! shape: schema, table, additive columns, indexes. Every step is an
//! `IF NOT EXISTS` statement run in its own implicit transaction, so requests
//! touching a fresh table at the same time converge on the same result. When
//! two of them collide inside the catalog, the loser's "already exists" error
//! is absorbed and logged; any other failure surfaces as `ProvisionFailed`.

use std::collections::HashMap;
use std::iter;
use std::time::Instant;

use lexdata_core::config::ProvisioningConfig;
use lexdata_core::ddl::{self, DdlKind, DdlStep};
use lexdata_core::{DataError, DataResult, Identifier, TableSchema};
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::context::TenantContext;
use crate::error::is_benign_ddl_race;
use crate::executor::TenantSession;

/// Runs provisioning DDL and remembers which tables are already in shape.
///
/// The memory is keyed by schema and table and holds the definition that was
/// ensured, so a changed definition (say, a new additive column) runs its
/// plan again.
#[derive(Debug)]
pub struct SchemaProvisioner {
    cache_ensured: bool,
    ensured: RwLock<HashMap<(Identifier, String), TableSchema>>,
}

impl Default for SchemaProvisioner {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaProvisioner {
    /// A provisioner that skips tables it has already ensured in this process.
    pub fn new() -> Self {
        Self {
            cache_ensured: true,
            ensured: RwLock::new(HashMap::new()),
        }
    }

    /// A provisioner that runs the full plan on every call.
    pub fn uncached() -> Self {
        Self {
            cache_ensured: false,
            ..Self::new()
        }
    }

    /// Build from the `[provisioning]` section of `lexdata.toml`.
    pub fn from_config(config: &ProvisioningConfig) -> Self {
        if config.cache_ensured {
            Self::new()
        } else {
            Self::uncached()
        }
    }

    /// Ensure `table` exists in the context's schema with every declared
    /// column and index.
    ///
    /// Runs outside any transaction: a failed DDL statement would otherwise
    /// abort the caller's work.
    pub async fn ensure(&self, ctx: &TenantContext, table: &TableSchema) -> DataResult<()> {
        let schema = ctx.schema();
        let tenant = ctx.tenant().id.as_str();

        if self.is_current(schema, table) {
            return Ok(());
        }

        let started = Instant::now();
        let steps = iter::once(DdlStep {
            kind: DdlKind::Schema,
            object: schema.as_str().to_string(),
            statement: ddl::create_schema(),
        })
        .chain(ddl::plan(table));

        let mut executed = 0usize;
        let mut absorbed = 0usize;
        for step in steps {
            let sql = step.statement.render(schema);
            match ctx.batch_execute(&sql).await {
                Ok(()) => executed += 1,
                Err(e) if is_benign_ddl_race(&e) => {
                    debug!(
                        tenant,
                        table = table.table(),
                        object = %step.object,
                        error = %e,
                        "Absorbed concurrent provisioning race"
                    );
                    absorbed += 1;
                }
                // Deadline, cancellation and connection loss keep their own codes.
                Err(e) if e.is_abandoned() || e.is_connection_error() => {
                    return Err(e.with_table(table.table()));
                }
                Err(e) => {
                    return Err(DataError::provision(
                        table.table(),
                        format!("{} '{}': {}", kind_label(step.kind), step.object, e.message),
                    )
                    .with_tenant(tenant)
                    .with_sql(sql)
                    .with_source(e));
                }
            }
        }

        info!(
            tenant,
            schema = schema.as_str(),
            table = table.table(),
            executed,
            absorbed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Table ensured"
        );

        if self.cache_ensured {
            self.ensured
                .write()
                .insert((schema.clone(), table.table().to_string()), table.clone());
        }
        Ok(())
    }

    /// Whether some definition of `table` is known to be ensured in `schema`.
    pub fn is_ensured(&self, schema: &Identifier, table: &str) -> bool {
        self.cache_ensured
            && self
                .ensured
                .read()
                .contains_key(&(schema.clone(), table.to_string()))
    }

    /// Whether exactly this definition of `table` is ensured in `schema`.
    fn is_current(&self, schema: &Identifier, table: &TableSchema) -> bool {
        self.cache_ensured
            && self
                .ensured
                .read()
                .get(&(schema.clone(), table.table().to_string()))
                .is_some_and(|ensured| ensured == table)
    }

    /// Forget one table so the next [`ensure`](Self::ensure) re-runs its plan.
    pub fn forget(&self, schema: &Identifier, table: &str) -> bool {
        self.ensured
            .write()
            .remove(&(schema.clone(), table.to_string()))
            .is_some()
    }

    /// Forget every ensured table.
    pub fn clear(&self) {
        self.ensured.write().clear();
    }

    /// Number of remembered (schema, table) pairs.
    pub fn len(&self) -> usize {
        self.ensured.read().len()
    }

    /// Check if nothing is remembered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn kind_label(kind: DdlKind) -> &'static str {
    match kind {
        DdlKind::Schema => "creating schema",
        DdlKind::Table => "creating table",
        DdlKind::Column => "adding column",
        DdlKind::Index => "creating index",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use lexdata_core::{ColumnDef, ColumnType, IdentityKind};

    fn schema(name: &str) -> Identifier {
        Identifier::new(name).unwrap()
    }

    fn notes(extra: Option<&str>) -> TableSchema {
        let mut builder = TableSchema::builder("notes")
            .id("id", IdentityKind::Uuid)
            .column(ColumnDef::new("body", ColumnType::Text));
        if let Some(extra) = extra {
            builder = builder.column(ColumnDef::new(extra, ColumnType::Text).additive());
        }
        builder.timestamps().build().unwrap()
    }

    fn remember(provisioner: &SchemaProvisioner, schema: &Identifier, table: TableSchema) {
        provisioner
            .ensured
            .write()
            .insert((schema.clone(), table.table().to_string()), table);
    }

    #[test]
    fn test_cache_bookkeeping() {
        let provisioner = SchemaProvisioner::new();
        let acme = schema("tenant_acme");
        assert!(!provisioner.is_ensured(&acme, "publications"));

        remember(&provisioner, &acme, lexdata_core::catalog::publications().unwrap());
        assert!(provisioner.is_ensured(&acme, "publications"));
        assert!(!provisioner.is_ensured(&schema("tenant_globex"), "publications"));
        assert_eq!(provisioner.len(), 1);

        assert!(provisioner.forget(&acme, "publications"));
        assert!(!provisioner.forget(&acme, "publications"));
        assert!(provisioner.is_empty());
    }

    #[test]
    fn test_uncached_never_reports_ensured() {
        let provisioner = SchemaProvisioner::from_config(&ProvisioningConfig {
            cache_ensured: false,
        });
        let acme = schema("tenant_acme");
        let estimates = lexdata_core::catalog::estimates().unwrap();
        remember(&provisioner, &acme, estimates.clone());
        assert!(!provisioner.is_ensured(&acme, "estimates"));
        assert!(!provisioner.is_current(&acme, &estimates));
    }

    #[test]
    fn test_changed_definition_is_not_current() {
        let provisioner = SchemaProvisioner::new();
        let acme = schema("tenant_acme");
        remember(&provisioner, &acme, notes(None));

        assert!(provisioner.is_current(&acme, &notes(None)));
        assert!(provisioner.is_ensured(&acme, "notes"));
        assert!(!provisioner.is_current(&acme, &notes(Some("tags"))));
        assert!(!provisioner.is_current(&schema("tenant_globex"), &notes(None)));
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(kind_label(DdlKind::Column), "adding column");
        assert_eq!(kind_label(DdlKind::Index), "creating index");
    }
}
