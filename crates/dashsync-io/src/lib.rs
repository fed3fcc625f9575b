//! Tabular store used by the dashsync reconciler.
//!
//! Backends implement [`SpreadsheetReader`] / [`SpreadsheetWriter`]. The
//! reconciler never talks to a backend cell by cell: a [`Sheet`] is read once,
//! mutated in memory, and its changes are persisted through a
//! [`WriteTransaction`] only when the whole pass succeeded.

pub mod backends;
pub mod error;
pub mod sheet;
pub mod traits;
pub mod transaction;

pub use backends::JsonAdapter;
#[cfg(feature = "umya")]
pub use backends::UmyaAdapter;
pub use error::{IoError, cell_ref, col_to_a1};
pub use sheet::Sheet;
pub use traits::{
    CellData, IntoCellValue, SaveDestination, SheetData, SpreadsheetIO, SpreadsheetReader,
    SpreadsheetWriter,
};
pub use transaction::{WriteOp, WriteTransaction};

// Re-export for convenience
pub use dashsync_common::CellValue;
