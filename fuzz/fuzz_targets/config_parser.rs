//! Fuzz target for the `lexdata.toml` parser.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_config_parser
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;
use lexdata_core::LexdataConfig;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Accepted configs must also pass the derived accessors.
        if let Ok(config) = LexdataConfig::from_str(input) {
            let _ = config.tenancy.schema_naming();
            let _ = config.tenancy.cache_ttl();
            let _ = config.debug.statement_timeout();
        }
    }
});
