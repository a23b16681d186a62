//! ## Logging Configuration
//!
//! This module sets up logging automatically at program startup using the `ctor` crate.
//! Logging behavior is controlled by the `DEBUG_BIKERENTAL` environment variable:
//!
//! - **Disabled** (default): If the variable is unset, empty, or explicitly set to `"0"` or `"false"`,
//!   no logging will be initialized.
//! - **Enabled**: Any other value enables logging with a maximum log level of `DEBUG`.
//!
//! Learned transformer parameters (bounds, fill values, categories, scaler statistics) are
//! logged at `DEBUG`, so enabling this is the quickest way to see what a fit produced.
//!
//! ### Usage Example
//!
//! ```sh
//! export DEBUG_BIKERENTAL=true
//! ```

use ctor::ctor;
use tracing::Level;

fn logging_enabled(value: Result<String, std::env::VarError>) -> bool {
    !value.map_or(true, |v| v == "0" || v == "false" || v.is_empty())
}

#[ctor]
fn set_debug_level() {
    if logging_enabled(std::env::var("DEBUG_BIKERENTAL")) {
        // A host application may already own the global subscriber.
        let _ = tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_switch() {
        assert!(!logging_enabled(Err(std::env::VarError::NotPresent)));
        assert!(!logging_enabled(Ok(String::new())));
        assert!(!logging_enabled(Ok("0".into())));
        assert!(!logging_enabled(Ok("false".into())));
        assert!(logging_enabled(Ok("true".into())));
        assert!(logging_enabled(Ok("1".into())));
    }
}
