//! Newsletter link sheet: one row per link of a newsletter, grouped under the
//! row that names the newsletter's campaign id.

use dashsync_common::CellValue;
use dashsync_config::{NewsletterSettings, Website};
use tracing::debug;

use crate::columns::{BoundColumn, ColumnRule, RuleSet, bind_headers};
use crate::error::ReconcileError;
use crate::format::{self, UrlError};
use crate::links::MergedClicks;
use crate::policy::{FillDecision, FillMode};
use crate::sheets::SheetPass;

const HEADER_ROW: u32 = 1;

/// Ids this short are placeholders for newsletters that were never sent.
const PLACEHOLDER_ID_LEN: usize = 3;

struct Newsletter {
    id: String,
    /// Campaign name for links to the account's own site.
    account_campaign: Option<String>,
    clicks: Option<MergedClicks>,
}

impl Newsletter {
    fn has_click_data(&self) -> bool {
        self.id.chars().count() > PLACEHOLDER_ID_LEN
    }
}

pub fn reconcile(
    pass: &mut SheetPass<'_, '_>,
    website: &Website,
    settings: &NewsletterSettings,
) -> Result<(), ReconcileError> {
    let columns = bind_headers(&*pass.sheet, HEADER_ROW, 1, RuleSet::NewsletterLinks)?;
    let id_col = columns
        .iter()
        .find(|c| c.rule == ColumnRule::NewsletterId)
        .map(|c| c.col);
    let mut newsletter: Option<Newsletter> = None;

    for row in HEADER_ROW + 1..=pass.sheet.max_row() {
        if columns.iter().all(|c| pass.sheet.text(row, c.col).is_none()) {
            continue;
        }
        if let Some(id) = id_col.and_then(|col| pass.sheet.text(row, col)) {
            let account_campaign = id_col
                .and_then(|col| pass.sheet.text(row, col + 1))
                .map(|name| name.replace(' ', "-"));
            debug!(sheet = %pass.sheet.name(), row, newsletter = %id, "newsletter");
            newsletter = Some(Newsletter {
                id,
                account_campaign,
                clicks: None,
            });
            continue;
        }
        for column in &columns {
            link_cell(pass, &columns, column, row, website, settings, newsletter.as_mut())?;
        }
    }
    Ok(())
}

fn invalid_url(pass: &SheetPass<'_, '_>, row: u32, col: u32, url: &str, err: UrlError) -> ReconcileError {
    let (sheet, cell) = pass.at(row, col);
    ReconcileError::InvalidUrl {
        sheet,
        cell,
        url: url.to_string(),
        reason: err.to_string(),
    }
}

fn link_cell(
    pass: &mut SheetPass<'_, '_>,
    columns: &[BoundColumn],
    column: &BoundColumn,
    row: u32,
    website: &Website,
    settings: &NewsletterSettings,
    newsletter: Option<&mut Newsletter>,
) -> Result<(), ReconcileError> {
    let col = column.col;
    if column.rule == ColumnRule::Link {
        if let Some(link) = pass.sheet.text(row, col).filter(|l| !l.ends_with('/')) {
            pass.put(row, col, FillMode::Live, CellValue::Text(format!("{link}/")));
        }
        return Ok(());
    }
    if column.rule.is_input() {
        return Ok(());
    }
    let mode = column.rule.fill_mode();
    if pass.decide(row, col, mode, None) != FillDecision::Fill {
        return Ok(());
    }

    let value = match &column.rule {
        ColumnRule::GoogleUrl => {
            let link = pass.require(columns, row, column, &ColumnRule::Link, "link")?;
            let campaign = if format::is_account_domain(&link, &website.name) {
                newsletter
                    .and_then(|n| n.account_campaign.clone())
                    .ok_or_else(|| missing(pass, row, column, "newsletter_campaign_id"))?
            } else {
                website.name.clone()
            };
            let url = format::google_url(&link, &settings.source, &settings.medium, &campaign)
                .map_err(|e| invalid_url(pass, row, col, &link, e))?;
            CellValue::Text(url)
        }
        ColumnRule::HeaderChars => {
            let header = pass.require(columns, row, column, &ColumnRule::Header, "header")?;
            CellValue::Int(header.chars().count() as i64)
        }
        ColumnRule::TextChars => {
            let text = pass.require(columns, row, column, &ColumnRule::Text, "text")?;
            CellValue::Int(text.chars().count() as i64)
        }
        ColumnRule::MailchimpHtml => {
            let link = pass.require(columns, row, column, &ColumnRule::Link, "link")?;
            let header = pass.require(columns, row, column, &ColumnRule::Header, "header")?;
            let text = pass.require(columns, row, column, &ColumnRule::Text, "text")?;
            let html = format::encode_html(&link, &header, &text)
                .map_err(|e| invalid_url(pass, row, col, &link, e))?;
            CellValue::Text(html)
        }
        ColumnRule::IsDomain => {
            let link = pass.require(columns, row, column, &ColumnRule::Link, "link")?;
            CellValue::Boolean(format::is_account_domain(&link, &website.name))
        }
        ColumnRule::LinkClicks(field) => {
            let newsletter = newsletter.ok_or_else(|| missing(pass, row, column, "newsletter_campaign_id"))?;
            if !newsletter.has_click_data() {
                return Ok(());
            }
            if newsletter.clicks.is_none() {
                let details = pass.click_details(&newsletter.id, row, col)?;
                newsletter.clicks = Some(MergedClicks::merge(details));
            }
            let Some(clicks) = newsletter.clicks.as_ref().filter(|c| !c.is_empty()) else {
                return Ok(());
            };
            let google_url = pass.require(columns, row, column, &ColumnRule::GoogleUrl, "google_url")?;
            let record = clicks.lookup(&google_url).ok_or_else(|| {
                let (sheet, cell) = pass.at(row, col);
                ReconcileError::ClickNotFound {
                    sheet,
                    cell,
                    url: format::tracked_click_url(&google_url, clicks.campaign_id()),
                }
            })?;
            match record.field(field) {
                Some(value) => value,
                None => return Ok(()),
            }
        }
        _ => return Ok(()),
    };
    pass.put(row, col, mode, value);
    Ok(())
}

fn missing(pass: &SheetPass<'_, '_>, row: u32, column: &BoundColumn, input: &str) -> ReconcileError {
    let (sheet, cell) = pass.at(row, column.col);
    ReconcileError::MissingInput {
        sheet,
        cell,
        column: column.label.clone(),
        input: input.to_string(),
    }
}
