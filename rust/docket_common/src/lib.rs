//! `docket_common`: wiring shared by every docket entry point.
//!
//! - `config`       `AppConfig`, flags with `DOCKET_*` env fallbacks
//! - `permissions`  the default permission catalog
//! - `context`      `AppContext::bootstrap` and access/conversion helpers

pub mod config;
pub mod context;
pub mod error;
pub mod permissions;

pub use config::AppConfig;
pub use context::AppContext;
pub use error::{CommonError, Result};
