//! Reloadable tracing setup: a bootstrap filter carries startup logging
//! until the settings file is parsed, then the configured filter takes
//! over through the reload handle.

mod logger;
pub use logger::*;

pub use tracing::{debug, error, info, trace, warn};
