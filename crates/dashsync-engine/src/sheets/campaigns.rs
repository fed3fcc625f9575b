//! Campaigns sheet: date rows open a campaign, `type|identifier` rows report on it.

use chrono::NaiveDate;
use dashsync_common::{CellValue, ISO_DATE_WIDTH};
use dashsync_config::Website;

use crate::columns::{BoundColumn, ColumnRule, RuleSet, bind_headers};
use crate::error::ReconcileError;
use crate::format::url_path;
use crate::policy::FillDecision;
use crate::sheets::page::PageStats;
use crate::sheets::{CampaignDocs, SheetPass};

const HEADER_ROWS: u32 = 3;
const FIRST_DATA_ROW: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowType {
    Bitly,
    Mailchimp,
    Analytics,
}

impl RowType {
    fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "bitly" => Some(RowType::Bitly),
            "mailchimp" => Some(RowType::Mailchimp),
            "analytics" => Some(RowType::Analytics),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            RowType::Bitly => "bitly",
            RowType::Mailchimp => "mailchimp",
            RowType::Analytics => "analytics",
        }
    }

    fn rules(self) -> RuleSet {
        match self {
            RowType::Bitly => RuleSet::Bitly,
            RowType::Mailchimp => RuleSet::Mailchimp,
            RowType::Analytics => RuleSet::Analytics,
        }
    }
}

#[derive(Debug, Default)]
struct Headers {
    bitly: Option<Vec<BoundColumn>>,
    mailchimp: Option<Vec<BoundColumn>>,
    analytics: Option<Vec<BoundColumn>>,
}

impl Headers {
    fn slot(&mut self, kind: RowType) -> &mut Option<Vec<BoundColumn>> {
        match kind {
            RowType::Bitly => &mut self.bitly,
            RowType::Mailchimp => &mut self.mailchimp,
            RowType::Analytics => &mut self.analytics,
        }
    }

    fn get(&self, kind: RowType) -> Option<&[BoundColumn]> {
        match kind {
            RowType::Bitly => self.bitly.as_deref(),
            RowType::Mailchimp => self.mailchimp.as_deref(),
            RowType::Analytics => self.analytics.as_deref(),
        }
    }
}

/// The campaign opened by the latest date row.
#[derive(Debug, Clone, Copy)]
struct Campaign {
    start: NaiveDate,
    duration_days: u32,
}

enum RowShape {
    Date(NaiveDate),
    Typed(RowType, String),
}

fn read_headers(pass: &SheetPass<'_, '_>) -> Result<Headers, ReconcileError> {
    let mut headers = Headers::default();
    for row in 1..=HEADER_ROWS {
        let Some(first) = pass.sheet.text(row, 1) else {
            continue;
        };
        let kind = RowType::parse(&first).ok_or_else(|| {
            let (sheet, cell) = pass.at(row, 1);
            ReconcileError::UnrecognizedRow {
                sheet,
                cell,
                value: first.clone(),
            }
        })?;
        *headers.slot(kind) = Some(bind_headers(&*pass.sheet, row, 2, kind.rules())?);
    }
    Ok(headers)
}

fn classify(pass: &SheetPass<'_, '_>, row: u32, first: &CellValue) -> Result<RowShape, ReconcileError> {
    let unrecognized = || {
        let (sheet, cell) = pass.at(row, 1);
        ReconcileError::UnrecognizedRow {
            sheet,
            cell,
            value: first.to_string(),
        }
    };
    match first {
        CellValue::Text(text) => {
            let text = text.trim();
            if let Some((kind, id)) = text.split_once('|') {
                let kind = RowType::parse(kind).ok_or_else(unrecognized)?;
                return Ok(RowShape::Typed(kind, id.trim().to_string()));
            }
            if text.len() == ISO_DATE_WIDTH {
                if let Some(date) = first.as_date() {
                    return Ok(RowShape::Date(date));
                }
            }
            Err(unrecognized())
        }
        other => other.as_date().map(RowShape::Date).ok_or_else(unrecognized),
    }
}

pub fn reconcile(pass: &mut SheetPass<'_, '_>, website: &Website) -> Result<(), ReconcileError> {
    let headers = read_headers(pass)?;
    let mut campaign: Option<Campaign> = None;

    for row in FIRST_DATA_ROW..=pass.sheet.max_row() {
        let Some(first) = pass.sheet.get(row, 1).filter(|v| v.as_text().is_some()).cloned() else {
            continue;
        };
        let (kind, id) = match classify(pass, row, &first)? {
            RowShape::Date(start) => {
                let duration_days = pass
                    .sheet
                    .get(row, 3)
                    .and_then(CellValue::as_i64)
                    .unwrap_or(0)
                    .clamp(0, i64::from(u32::MAX)) as u32;
                campaign = Some(Campaign { start, duration_days });
                continue;
            }
            RowShape::Typed(kind, id) => (kind, id),
        };
        let columns = headers.get(kind).ok_or_else(|| ReconcileError::MissingHeaderRow {
            sheet: pass.sheet.name().to_string(),
            kind: kind.as_str().to_string(),
        })?;
        match kind {
            RowType::Bitly => bitly_row(pass, columns, row, &id)?,
            RowType::Mailchimp => mailchimp_row(pass, columns, row, &id)?,
            RowType::Analytics => {
                let Some(campaign) = campaign else {
                    let (sheet, cell) = pass.at(row, 1);
                    return Err(ReconcileError::MissingCampaignContext { sheet, cell });
                };
                analytics_row(pass, columns, row, &id, campaign, website)?
            }
        }
    }
    Ok(())
}

fn bitly_row(
    pass: &mut SheetPass<'_, '_>,
    columns: &[BoundColumn],
    row: u32,
    short_url: &str,
) -> Result<(), ReconcileError> {
    for column in columns {
        let mode = column.rule.fill_mode();
        if pass.decide(row, column.col, mode, None) != FillDecision::Fill {
            continue;
        }
        let value = match column.rule {
            ColumnRule::TotalClicks => CellValue::Int(pass.total_clicks(short_url)?),
            ColumnRule::TargetUrl => CellValue::Text(pass.target_url(short_url)?),
            _ => continue,
        };
        pass.put(row, column.col, mode, value);
    }
    Ok(())
}

fn mailchimp_row(
    pass: &mut SheetPass<'_, '_>,
    columns: &[BoundColumn],
    row: u32,
    campaign_id: &str,
) -> Result<(), ReconcileError> {
    let mut docs = CampaignDocs::default();
    for column in columns {
        let mode = column.rule.fill_mode();
        if pass.decide(row, column.col, mode, None) != FillDecision::Fill {
            continue;
        }
        if let Some(value) = docs.resolve(pass, &column.rule, campaign_id, row, column.col)? {
            pass.put(row, column.col, mode, value);
        }
    }
    Ok(())
}

fn analytics_row(
    pass: &mut SheetPass<'_, '_>,
    columns: &[BoundColumn],
    row: u32,
    url: &str,
    campaign: Campaign,
    website: &Website,
) -> Result<(), ReconcileError> {
    let mut stats: Option<PageStats<'_>> = None;
    for column in columns {
        let ColumnRule::Page { stat, span } = column.rule else {
            continue;
        };
        let window = span.window(campaign.start, campaign.duration_days, pass.today);
        let mode = span.fill_mode();
        if pass.decide(row, column.col, mode, Some(&window)) != FillDecision::Fill {
            continue;
        }
        if stats.is_none() {
            let path = url_path(url).map_err(|e| {
                let (sheet, cell) = pass.at(row, 1);
                ReconcileError::InvalidUrl {
                    sheet,
                    cell,
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            })?;
            stats = Some(PageStats::new(&website.analytics_profile_id, path));
        }
        if let Some(stats) = stats.as_mut() {
            let value = stats.value(pass, stat, window)?;
            pass.put(row, column.col, mode, value);
        }
    }
    Ok(())
}
