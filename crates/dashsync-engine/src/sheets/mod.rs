//! Per-sheet reconcilers.
//!
//! Every reconciler works on an in-memory [`Sheet`]; the caller persists the
//! recorded changes only when the reconciler returned `Ok`.

pub mod analytics;
pub mod blog_articles;
pub mod campaigns;
pub mod newsletter_links;
pub mod newsletters;
mod page;

use chrono::NaiveDate;
use dashsync_common::CellValue;
use dashsync_io::{Sheet, cell_ref};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::columns::{BoundColumn, ColumnRule};
use crate::error::ReconcileError;
use crate::policy::{FillDecision, FillMode, Window, decide};
use crate::providers::{AnalyticsQuery, AnalyticsReport, ClickDetails, Providers};

/// What one reconciliation pass did to a sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SheetSummary {
    pub sheet: String,
    pub cells_written: usize,
    /// Cells left blank because their window is still open.
    pub cells_deferred: usize,
    pub provider_calls: usize,
}

/// Mutable state of one pass: the sheet, the provider handles and the counters.
pub struct SheetPass<'a, 'p> {
    pub sheet: &'a mut Sheet,
    pub providers: &'a mut Providers<'p>,
    pub today: NaiveDate,
    pub summary: SheetSummary,
}

impl<'a, 'p> SheetPass<'a, 'p> {
    pub fn new(sheet: &'a mut Sheet, providers: &'a mut Providers<'p>, today: NaiveDate) -> Self {
        let summary = SheetSummary {
            sheet: sheet.name().to_string(),
            ..SheetSummary::default()
        };
        Self {
            sheet,
            providers,
            today,
            summary,
        }
    }

    pub fn into_summary(self) -> SheetSummary {
        self.summary
    }

    /// Sheet name and A1 reference, for error context.
    pub(crate) fn at(&self, row: u32, col: u32) -> (String, String) {
        (self.sheet.name().to_string(), cell_ref(row, col))
    }

    /// Apply the fill policy to one cell, counting deferrals.
    pub(crate) fn decide(&mut self, row: u32, col: u32, mode: FillMode, gate: Option<&Window>) -> FillDecision {
        let present = !self.sheet.is_blank(row, col);
        let decision = decide(present, mode, gate, self.today);
        if decision == FillDecision::Defer {
            self.summary.cells_deferred += 1;
        }
        decision
    }

    /// Write `value` under `mode`. Returns whether the cell changed.
    ///
    /// Blank values are never written; `Once` cells are only written while
    /// blank; `Live` cells only when the value differs.
    pub(crate) fn put(&mut self, row: u32, col: u32, mode: FillMode, value: CellValue) -> bool {
        if value.is_blank() {
            return false;
        }
        let unchanged = match (mode, self.sheet.get(row, col)) {
            (FillMode::Once, _) => !self.sheet.is_blank(row, col),
            (FillMode::Live, Some(current)) => same_value(current, &value),
            (FillMode::Live, None) => false,
        };
        if unchanged {
            return false;
        }
        debug!(sheet = %self.sheet.name(), cell = %cell_ref(row, col), value = %value, "fill");
        self.sheet.set(row, col, value);
        self.summary.cells_written += 1;
        true
    }

    /// Text of another column of the same row, or `MissingInput` naming both columns.
    pub(crate) fn require(
        &self,
        columns: &[BoundColumn],
        row: u32,
        needed_by: &BoundColumn,
        input: &ColumnRule,
        input_label: &str,
    ) -> Result<String, ReconcileError> {
        columns
            .iter()
            .find(|c| &c.rule == input)
            .and_then(|c| self.sheet.text(row, c.col))
            .ok_or_else(|| {
                let (sheet, cell) = self.at(row, needed_by.col);
                ReconcileError::MissingInput {
                    sheet,
                    cell,
                    column: needed_by.label.clone(),
                    input: input_label.to_string(),
                }
            })
    }

    pub(crate) fn query(&mut self, query: &AnalyticsQuery) -> Result<AnalyticsReport, ReconcileError> {
        let provider = self.providers.analytics(self.sheet.name())?;
        self.summary.provider_calls += 1;
        debug!(
            sheet = %self.sheet.name(),
            profile = %query.profile_id,
            window = %query.window,
            metrics = %query.metrics,
            filters = query.filters.as_deref().unwrap_or(""),
            "analytics query"
        );
        Ok(provider.query(query)?)
    }

    pub(crate) fn total_clicks(&mut self, short_url: &str) -> Result<i64, ReconcileError> {
        let provider = self.providers.links(self.sheet.name())?;
        self.summary.provider_calls += 1;
        debug!(sheet = %self.sheet.name(), short_url, "link clicks");
        Ok(provider.total_clicks(short_url)?)
    }

    pub(crate) fn target_url(&mut self, short_url: &str) -> Result<String, ReconcileError> {
        let provider = self.providers.links(self.sheet.name())?;
        self.summary.provider_calls += 1;
        debug!(sheet = %self.sheet.name(), short_url, "expand link");
        Ok(provider.target_url(short_url)?)
    }

    pub(crate) fn create_or_get(&mut self, long_url: &str) -> Result<String, ReconcileError> {
        let provider = self.providers.links(self.sheet.name())?;
        self.summary.provider_calls += 1;
        debug!(sheet = %self.sheet.name(), long_url, "shorten link");
        Ok(provider.create_or_get(long_url)?)
    }

    /// Campaign document, checked to be the one that was asked for.
    pub(crate) fn campaign(&mut self, campaign_id: &str, row: u32, col: u32) -> Result<Value, ReconcileError> {
        let provider = self.providers.email(self.sheet.name())?;
        self.summary.provider_calls += 1;
        debug!(sheet = %self.sheet.name(), campaign_id, "get campaign");
        let campaign = provider.get_campaign(campaign_id)?;
        let found = campaign.get("id").and_then(Value::as_str).unwrap_or_default();
        if found != campaign_id {
            let (sheet, cell) = self.at(row, col);
            return Err(ReconcileError::CampaignMismatch {
                sheet,
                cell,
                requested: campaign_id.to_string(),
                found: found.to_string(),
            });
        }
        Ok(campaign)
    }

    pub(crate) fn campaign_report(&mut self, campaign_id: &str) -> Result<Value, ReconcileError> {
        let provider = self.providers.email(self.sheet.name())?;
        self.summary.provider_calls += 1;
        debug!(sheet = %self.sheet.name(), campaign_id, "get campaign report");
        Ok(provider.get_campaign_report(campaign_id)?)
    }

    pub(crate) fn click_details(
        &mut self,
        campaign_id: &str,
        row: u32,
        col: u32,
    ) -> Result<ClickDetails, ReconcileError> {
        let provider = self.providers.email(self.sheet.name())?;
        self.summary.provider_calls += 1;
        debug!(sheet = %self.sheet.name(), campaign_id, "get click details");
        let details = provider.get_campaign_click_details(campaign_id)?;
        if details.campaign_id != campaign_id {
            let (sheet, cell) = self.at(row, col);
            return Err(ReconcileError::CampaignMismatch {
                sheet,
                cell,
                requested: campaign_id.to_string(),
                found: details.campaign_id,
            });
        }
        Ok(details)
    }
}

/// Numbers compare numerically, everything else by its text.
fn same_value(current: &CellValue, fresh: &CellValue) -> bool {
    match (current, fresh) {
        (CellValue::Int(_) | CellValue::Number(_), CellValue::Int(_) | CellValue::Number(_)) => {
            current.as_f64() == fresh.as_f64()
        }
        _ => current.as_text() == fresh.as_text(),
    }
}

/// Campaign documents fetched at most once per row.
#[derive(Default)]
pub(crate) struct CampaignDocs {
    campaign: Option<Value>,
    report: Option<Value>,
}

impl CampaignDocs {
    pub(crate) fn campaign(
        &mut self,
        pass: &mut SheetPass<'_, '_>,
        campaign_id: &str,
        row: u32,
        col: u32,
    ) -> Result<&Value, ReconcileError> {
        if self.campaign.is_none() {
            self.campaign = Some(pass.campaign(campaign_id, row, col)?);
        }
        Ok(self.campaign.get_or_insert(Value::Null))
    }

    pub(crate) fn report(&mut self, pass: &mut SheetPass<'_, '_>, campaign_id: &str) -> Result<&Value, ReconcileError> {
        if self.report.is_none() {
            self.report = Some(pass.campaign_report(campaign_id)?);
        }
        Ok(self.report.get_or_insert(Value::Null))
    }

    /// Resolve a campaign-document rule; `None` for rules that are not about campaign documents.
    pub(crate) fn resolve(
        &mut self,
        pass: &mut SheetPass<'_, '_>,
        rule: &ColumnRule,
        campaign_id: &str,
        row: u32,
        col: u32,
    ) -> Result<Option<CellValue>, ReconcileError> {
        Ok(match rule {
            ColumnRule::CampaignField(path) => Some(path.resolve(self.campaign(pass, campaign_id, row, col)?)),
            ColumnRule::ReportField(path) => Some(path.resolve(self.report(pass, campaign_id)?)),
            ColumnRule::AbTested => Some(CellValue::Boolean(
                self.campaign(pass, campaign_id, row, col)?
                    .get("variate_settings")
                    .is_some(),
            )),
            _ => None,
        })
    }
}
