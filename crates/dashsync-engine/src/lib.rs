//! Dashboard reconciliation engine.
//!
//! A sheet's header row declares what each column holds. The engine binds
//! those labels to [`columns::ColumnRule`]s, asks the configured providers
//! for the missing values and writes them back under the fill policy in
//! [`policy`]: historical cells are written once their window has elapsed,
//! live cells are refreshed on every run.

pub mod cache;
pub mod columns;
pub mod error;
pub mod format;
pub mod links;
pub mod path;
pub mod policy;
pub mod providers;
pub mod sheets;
pub mod sync;

pub use cache::{CacheScope, CachedRow, ResultCache};
pub use columns::{BoundColumn, ColumnRule, RuleSet, Span, bind_headers};
pub use error::{ProviderError, ReconcileError};
pub use links::MergedClicks;
pub use path::FieldPath;
#[cfg(feature = "system-clock")]
pub use policy::SystemClock;
pub use policy::{Clock, FillDecision, FillMode, FixedClock, Window, decide};
pub use providers::{
    AnalyticsProvider, AnalyticsQuery, AnalyticsReport, CampaignEmail, ClickDetails, ClickRecord,
    LinkShortener, Providers,
};
pub use sheets::{SheetPass, SheetSummary};
pub use sync::{sync_sheet, sync_workbook};
