//! Time-series storage for temperature readings
//!
//! Readings are appended to one delimited file per calendar month and the
//! current month is mirrored to a fixed file name for the dashboard.
//!
//! ## Usage
//!
//! ```no_run
//! use chrono::Local;
//! use minilide_monitor::{Reading, storage::MonthlyStore};
//!
//! fn main() -> anyhow::Result<()> {
//!     let store = MonthlyStore::new("./data");
//!     let now = Local::now().naive_local();
//!     store.record(&[Reading::new(now, "Sensor 1", 21.5)], now)?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod monthly;
pub mod schema;
pub mod summary;

pub use error::{StorageError, StorageResult};
pub use monthly::{AppendOutcome, MonthlyStore, RecordOutcome};
pub use schema::MonthKey;
pub use summary::{SensorSummary, summarize};
