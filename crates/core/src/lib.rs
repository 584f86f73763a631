mod alert;
mod lifecycle;
mod preferences;
mod reading;
mod scheduler;
mod store;
mod thresholds;

pub use alert::*;
pub use lifecycle::*;
pub use preferences::*;
pub use reading::*;
pub use scheduler::*;
pub use store::*;
pub use thresholds::*;

use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Fetch failed: {0}")]
    FetchFailed(String),
    #[error("Duplicate alert id: {0}")]
    DuplicateId(String),
    #[error("Alert not found: {0}")]
    NotFound(String),
    #[error("Alert store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// Current wall clock as epoch milliseconds.
pub fn epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
