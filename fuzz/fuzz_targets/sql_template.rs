//! Fuzz target for `${schema}` statement templates.
//!
//! Parsing never panics, and a rendered template never contains the raw
//! placeholder.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_sql_template
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;
use lexdata_core::{Identifier, SqlTemplate};

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(template) = SqlTemplate::parse(input) {
        let schema = Identifier::new("tenant_fuzz").expect("valid schema");
        let rendered = template.render(&schema);
        assert!(template.placeholder_count() > 0);
        assert!(rendered.contains("\"tenant_fuzz\""));
    }
});
