pub mod config;
pub mod error;
pub mod naming;
pub mod retention;
pub mod types;

pub use error::{RbackupError, Result};
pub use retention::{Pattern, RetentionPolicy, select_for_deletion};
pub use types::{Artifact, BackendKind};
