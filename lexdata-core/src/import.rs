//! Partial-failure reporting for bulk imports.
//!
//! A bulk import inserts records one at a time. Whether a failed record stops
//! the batch is decided by an [`ImportPolicy`]; whatever happens, the caller
//! gets an [`ImportReport`] saying how many rows landed and which ones did not.

use crate::error::DataError;

/// What to do when one record of a batch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportPolicy {
    /// Skip records that violate a constraint (typically duplicates), stop
    /// on anything else.
    #[default]
    SkipConstraintViolations,
    /// Skip every failed record, except tenant and connection failures which
    /// would fail every remaining record too.
    SkipAll,
    /// Stop at the first failure.
    FailFast,
}

impl ImportPolicy {
    /// Whether the batch continues after this error.
    pub fn continues_after(&self, error: &DataError) -> bool {
        match self {
            Self::SkipConstraintViolations => error.is_constraint_violation(),
            Self::SkipAll => {
                !(error.is_tenant_error() || error.is_connection_error() || error.is_abandoned())
            }
            Self::FailFast => false,
        }
    }
}

/// One record that was not imported.
#[derive(Debug)]
pub struct ImportFailure {
    /// Position of the record in the input.
    pub index: usize,
    /// The record's key, if it carried one (primary key or external id).
    pub key: Option<String>,
    /// Why it failed.
    pub error: DataError,
}

/// Outcome of a bulk import.
#[derive(Debug, Default)]
pub struct ImportReport {
    /// Records inserted.
    pub inserted: usize,
    /// Records that failed, in input order.
    pub failures: Vec<ImportFailure>,
    /// Set when the policy stopped the batch early.
    pub aborted: bool,
}

impl ImportReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful insert.
    pub fn record_success(&mut self) {
        self.inserted += 1;
    }

    /// Record a failure. Returns whether the batch should continue.
    pub fn record_failure(
        &mut self,
        policy: ImportPolicy,
        index: usize,
        key: Option<String>,
        error: DataError,
    ) -> bool {
        let proceed = policy.continues_after(&error);
        self.failures.push(ImportFailure { index, key, error });
        if !proceed {
            self.aborted = true;
        }
        proceed
    }

    /// Number of failed records.
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Whether every attempted record was inserted.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && !self.aborted
    }

    /// Records skipped because they duplicated an existing row.
    pub fn duplicates(&self) -> usize {
        self.failures
            .iter()
            .filter(|f| f.error.is_unique_violation())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn dup() -> DataError {
        DataError::constraint_violation(ErrorCode::UniqueConstraint, "duplicate key")
    }

    #[test]
    fn test_default_policy_skips_duplicates_only() {
        let policy = ImportPolicy::default();
        assert!(policy.continues_after(&dup()));
        assert!(!policy.continues_after(&DataError::decode("bad")));
    }

    #[test]
    fn test_skip_all_stops_on_connection_loss() {
        let policy = ImportPolicy::SkipAll;
        assert!(policy.continues_after(&DataError::encode("bad value")));
        assert!(!policy.continues_after(&DataError::connection("reset")));
        assert!(!policy.continues_after(&DataError::tenant_inactive("acme")));
    }

    #[test]
    fn test_report() {
        let mut report = ImportReport::new();
        report.record_success();
        assert!(report.record_failure(ImportPolicy::default(), 1, Some("ext-1".into()), dup()));
        report.record_success();
        assert_eq!(report.inserted, 2);
        assert_eq!(report.duplicates(), 1);
        assert!(!report.is_complete());
        assert!(!report.aborted);

        assert!(!report.record_failure(ImportPolicy::FailFast, 3, None, dup()));
        assert!(report.aborted);
        assert_eq!(report.failed(), 2);
    }
}
