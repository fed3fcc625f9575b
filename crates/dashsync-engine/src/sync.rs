//! Reconcile every configured sheet of one account's workbook.

use chrono::NaiveDate;
use dashsync_config::{Account, SheetKind, Website};
use dashsync_io::{IoError, Sheet, SpreadsheetIO, WriteTransaction};
use tracing::{info, info_span, warn};

use crate::error::ReconcileError;
use crate::policy::Clock;
use crate::providers::Providers;
use crate::sheets::{
    SheetPass, SheetSummary, analytics, blog_articles, campaigns, newsletter_links, newsletters,
};

const STORE: &str = "workbook";

/// Run every sheet the account enables, in [`SheetKind::ALL`] order.
///
/// Each sheet is committed on its own as soon as its pass succeeds, so a
/// failing sheet leaves the sheets before it persisted and the failing one
/// untouched. Sheets missing from the workbook are skipped.
pub fn sync_workbook<S: SpreadsheetIO>(
    store: &mut S,
    account: &Account,
    providers: &mut Providers<'_>,
    clock: &dyn Clock,
) -> Result<Vec<SheetSummary>, ReconcileError> {
    let _span = info_span!("account", account = %account.name).entered();
    let today = clock.today();
    let mut summaries = Vec::new();

    for kind in SheetKind::ALL {
        if !account.sheets.contains(&kind) {
            continue;
        }
        if kind == SheetKind::Website {
            for website in &account.websites {
                let summary = sync_sheet(store, &website.name, providers, today, |pass| {
                    analytics::reconcile(pass, website)
                })?;
                summaries.extend(summary);
            }
            continue;
        }

        let website = primary_website(account)?;
        let Some(name) = kind.sheet_name() else {
            continue;
        };
        let summary = sync_sheet(store, name, providers, today, |pass| match kind {
            SheetKind::Campaigns => campaigns::reconcile(pass, website),
            SheetKind::Newsletters => newsletters::reconcile(pass),
            SheetKind::NewsletterLinks => {
                newsletter_links::reconcile(pass, website, &account.newsletter)
            }
            SheetKind::BlogArticles => blog_articles::reconcile(pass, website, &account.blog),
            SheetKind::Website => Ok(()),
        })?;
        summaries.extend(summary);
    }
    Ok(summaries)
}

fn primary_website(account: &Account) -> Result<&Website, ReconcileError> {
    account
        .primary_website()
        .ok_or_else(|| ReconcileError::NoWebsite {
            account: account.name.clone(),
        })
}

/// Load one sheet, reconcile it in memory and commit its changes.
///
/// Returns `None` when the workbook has no sheet of that name.
pub fn sync_sheet<S, F>(
    store: &mut S,
    name: &str,
    providers: &mut Providers<'_>,
    today: NaiveDate,
    reconcile: F,
) -> Result<Option<SheetSummary>, ReconcileError>
where
    S: SpreadsheetIO,
    F: FnOnce(&mut SheetPass<'_, '_>) -> Result<(), ReconcileError>,
{
    let _span = info_span!("sheet", sheet = %name).entered();
    let present = store
        .has_sheet(name)
        .map_err(|e| IoError::from_backend(STORE, e))?;
    if !present {
        warn!(sheet = %name, "sheet not found in workbook, skipping");
        return Ok(None);
    }

    let mut sheet = Sheet::load(store, name).map_err(|e| IoError::from_backend(STORE, e))?;
    let mut pass = SheetPass::new(&mut sheet, providers, today);
    reconcile(&mut pass)?;
    let summary = pass.into_summary();

    let mut tx = WriteTransaction::new(store);
    sheet.stage(&mut tx);
    let committed = tx.commit().map_err(|e| IoError::from_backend(STORE, e))?;
    info!(
        sheet = %summary.sheet,
        written = summary.cells_written,
        deferred = summary.cells_deferred,
        provider_calls = summary.provider_calls,
        committed,
        "sheet reconciled"
    );
    Ok(Some(summary))
}
