//! Blog articles sheet: one article per row, statistics gathered from its
//! publication date on.

use std::collections::HashMap;

use chrono::NaiveDate;
use dashsync_common::CellValue;
use dashsync_config::{BlogSettings, Website};

use crate::columns::{BoundColumn, ColumnRule, RuleSet, Span, bind_headers};
use crate::error::ReconcileError;
use crate::format::{self, NOT_FOUND};
use crate::policy::{FillDecision, Window};
use crate::providers::AnalyticsQuery;
use crate::sheets::SheetPass;
use crate::sheets::page::PageStats;

const HEADER_ROW: u32 = 1;

/// Row-local state: provider results reused by several columns of one article.
struct Article<'r> {
    page: Option<PageStats<'r>>,
    /// `(total users, new users)` per window.
    users: HashMap<Window, (CellValue, CellValue)>,
}

pub fn reconcile(
    pass: &mut SheetPass<'_, '_>,
    website: &Website,
    settings: &BlogSettings,
) -> Result<(), ReconcileError> {
    let columns = bind_headers(&*pass.sheet, HEADER_ROW, 1, RuleSet::BlogArticles)?;

    for row in HEADER_ROW + 1..=pass.sheet.max_row() {
        if columns.iter().all(|c| pass.sheet.text(row, c.col).is_none()) {
            continue;
        }
        let mut article = Article {
            page: None,
            users: HashMap::new(),
        };
        for column in &columns {
            article_cell(pass, &columns, column, row, website, settings, &mut article)?;
        }
    }
    Ok(())
}

fn start_date(
    pass: &SheetPass<'_, '_>,
    columns: &[BoundColumn],
    row: u32,
    needed_by: &BoundColumn,
) -> Result<NaiveDate, ReconcileError> {
    columns
        .iter()
        .find(|c| c.rule == ColumnRule::Date)
        .and_then(|c| pass.sheet.get(row, c.col))
        .and_then(CellValue::as_date)
        .ok_or_else(|| {
            let (sheet, cell) = pass.at(row, needed_by.col);
            ReconcileError::MissingInput {
                sheet,
                cell,
                column: needed_by.label.clone(),
                input: "date".to_string(),
            }
        })
}

/// Window behind a span column, or `None` when the fill policy says to leave the cell.
fn gated_window(
    pass: &mut SheetPass<'_, '_>,
    columns: &[BoundColumn],
    column: &BoundColumn,
    row: u32,
    span: Span,
    settings: &BlogSettings,
) -> Result<Option<Window>, ReconcileError> {
    let mode = span.fill_mode();
    if pass.decide(row, column.col, mode, None) == FillDecision::Skip {
        return Ok(None);
    }
    let start = start_date(pass, columns, row, column)?;
    let window = span.window(start, settings.window_days, pass.today);
    // the first check above only filtered present Once cells
    if pass.decide(row, column.col, mode, Some(&window)) != FillDecision::Fill {
        return Ok(None);
    }
    Ok(Some(window))
}

#[allow(clippy::too_many_arguments)]
fn article_cell<'r>(
    pass: &mut SheetPass<'_, '_>,
    columns: &[BoundColumn],
    column: &BoundColumn,
    row: u32,
    website: &'r Website,
    settings: &BlogSettings,
    article: &mut Article<'r>,
) -> Result<(), ReconcileError> {
    let col = column.col;
    if column.rule.is_input() {
        return Ok(());
    }
    let mode = column.rule.fill_mode();

    let value = match column.rule {
        ColumnRule::Campaign => {
            if pass.decide(row, col, mode, None) != FillDecision::Fill {
                return Ok(());
            }
            let name = pass.require(columns, row, column, &ColumnRule::Name, "name")?;
            let author = pass.require(columns, row, column, &ColumnRule::Author, "author")?;
            CellValue::Text(format::article_campaign(&name, &author))
        }
        ColumnRule::GoogleUrl => {
            if pass.decide(row, col, mode, None) != FillDecision::Fill {
                return Ok(());
            }
            let url = pass.require(columns, row, column, &ColumnRule::Url, "url")?;
            let source = pass.require(columns, row, column, &ColumnRule::Source, "source")?;
            let medium = pass.require(columns, row, column, &ColumnRule::Medium, "medium")?;
            let campaign = pass.require(columns, row, column, &ColumnRule::Campaign, "campaign")?;
            let google_url = format::google_url(&url, &source, &medium, &campaign).map_err(|e| {
                let (sheet, cell) = pass.at(row, col);
                ReconcileError::InvalidUrl {
                    sheet,
                    cell,
                    url: url.clone(),
                    reason: e.to_string(),
                }
            })?;
            CellValue::Text(google_url)
        }
        ColumnRule::ShortLink => {
            if pass.decide(row, col, mode, None) != FillDecision::Fill {
                return Ok(());
            }
            let google_url = pass.require(columns, row, column, &ColumnRule::GoogleUrl, "Google Url")?;
            CellValue::Text(pass.create_or_get(&google_url)?)
        }
        ColumnRule::Page { stat, span } => {
            let Some(window) = gated_window(pass, columns, column, row, span, settings)? else {
                return Ok(());
            };
            if article.page.is_none() {
                let url = pass.require(columns, row, column, &ColumnRule::Url, "url")?;
                let path = format::url_path(&url).map_err(|e| {
                    let (sheet, cell) = pass.at(row, col);
                    ReconcileError::InvalidUrl {
                        sheet,
                        cell,
                        url: url.clone(),
                        reason: e.to_string(),
                    }
                })?;
                article.page = Some(PageStats::new(&website.analytics_profile_id, path));
            }
            match article.page.as_mut() {
                Some(page) => page.value(pass, stat, window)?,
                None => return Ok(()),
            }
        }
        ColumnRule::CampaignUsers { new_users, span } => {
            let Some(window) = gated_window(pass, columns, column, row, span, settings)? else {
                return Ok(());
            };
            if !article.users.contains_key(&window) {
                let campaign = pass.require(columns, row, column, &ColumnRule::Campaign, "campaign")?;
                let users = campaign_users(pass, website, window, &campaign)?;
                article.users.insert(window, users);
            }
            match article.users.get(&window) {
                Some((_, new)) if new_users => new.clone(),
                Some((total, _)) => total.clone(),
                None => return Ok(()),
            }
        }
        ColumnRule::BitlyClicks(span) => {
            if gated_window(pass, columns, column, row, span, settings)?.is_none() {
                return Ok(());
            }
            let short_link = pass.require(columns, row, column, &ColumnRule::ShortLink, "bitly")?;
            CellValue::Int(pass.total_clicks(&short_link)?)
        }
        _ => return Ok(()),
    };
    pass.put(row, col, mode, value);
    Ok(())
}

/// Users who arrived through the article's campaign tag.
///
/// A campaign the profile refuses to filter on reads as `Not Found`.
fn campaign_users(
    pass: &mut SheetPass<'_, '_>,
    website: &Website,
    window: Window,
    campaign: &str,
) -> Result<(CellValue, CellValue), ReconcileError> {
    let query = AnalyticsQuery::new(&website.analytics_profile_id, window, "ga:users,ga:newUsers")
        .filters(format!("ga:campaign=={campaign}"));
    let report = match pass.query(&query) {
        Ok(report) => report,
        Err(ReconcileError::Provider(e)) if e.is_rejected() => {
            return Ok((CellValue::text(NOT_FOUND), CellValue::text(NOT_FOUND)));
        }
        Err(e) => return Err(e),
    };
    let total = |metric: &str| {
        report
            .total(metric)
            .and_then(CellValue::from_numeric_str)
            .unwrap_or_else(|| CellValue::text(NOT_FOUND))
    };
    Ok((total("ga:users"), total("ga:newUsers")))
}
