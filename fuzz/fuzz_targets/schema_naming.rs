//! Fuzz target for tenant schema naming.
//!
//! Any tenant id either maps to a valid, quotable identifier or is refused.
//! Two different ids never map to the same schema.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_schema_naming
//! ```

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use lexdata_core::{Identifier, SchemaNaming, TenantId};

#[derive(Debug, Arbitrary)]
struct Input {
    first: String,
    second: String,
}

fuzz_target!(|input: Input| {
    let naming = SchemaNaming::default();
    let first = naming.schema_for(&TenantId::new(input.first.as_str()));
    let second = naming.schema_for(&TenantId::new(input.second.as_str()));

    if let Ok(schema) = &first {
        assert!(Identifier::new(schema.as_str()).is_ok());
        assert!(schema.quoted().starts_with('"'));
    }
    if let (Ok(a), Ok(b)) = (&first, &second) {
        assert_eq!(a == b, input.first == input.second);
    }
});
