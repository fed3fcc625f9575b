use std::path::Path;

use anyhow::{Context, Result, bail};
use dashsync_config::{Account, Settings, SheetKind};
use dashsync_engine::{SheetSummary, SystemClock, sync_workbook};
use dashsync_io::{JsonAdapter, SpreadsheetIO, SpreadsheetReader, UmyaAdapter};
use dashsync_providers::AccountClients;
use tracing::{error, info};

/// Reconcile the selected accounts. A failing account is reported and the
/// remaining ones still run; the command fails if any account did.
pub fn execute(config: &Path, accounts: &[String], sheets: &[SheetKind]) -> Result<()> {
    let settings = dashsync_config::load_validated(config)
        .with_context(|| format!("failed to load settings from {}", config.display()))?;
    let selected = select(&settings, accounts)?;

    let mut failed = Vec::new();
    for account in &selected {
        let account = restrict(account, sheets);
        match sync_account(&account) {
            Ok(summaries) => {
                let written: usize = summaries.iter().map(|s| s.cells_written).sum();
                info!(
                    account = %account.name,
                    sheets = summaries.len(),
                    written,
                    "account reconciled"
                );
            }
            Err(err) => {
                error!(account = %account.name, "{err:#}");
                failed.push(account.name.clone());
            }
        }
    }

    if !failed.is_empty() {
        bail!(
            "{} of {} account(s) failed: {}",
            failed.len(),
            selected.len(),
            failed.join(", ")
        );
    }
    Ok(())
}

fn select<'s>(settings: &'s Settings, names: &[String]) -> Result<Vec<&'s Account>> {
    if names.is_empty() {
        return Ok(settings.accounts.iter().collect());
    }
    names
        .iter()
        .map(|name| {
            settings
                .account(name)
                .with_context(|| format!("no account named `{name}` in settings"))
        })
        .collect()
}

/// The account with only the sheet kinds requested on the command line.
fn restrict(account: &Account, sheets: &[SheetKind]) -> Account {
    let mut account = account.clone();
    if !sheets.is_empty() {
        account.sheets.retain(|kind| sheets.contains(kind));
    }
    account
}

enum WorkbookFormat {
    Json,
    Xlsx,
}

fn workbook_format(path: &Path) -> Result<WorkbookFormat> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("json") => Ok(WorkbookFormat::Json),
        Some("xlsx") | Some("xlsm") => Ok(WorkbookFormat::Xlsx),
        _ => bail!(
            "unsupported workbook {}: expected a .xlsx or .json file",
            path.display()
        ),
    }
}

fn sync_account(account: &Account) -> Result<Vec<SheetSummary>> {
    let path = account.workbook.as_path();
    let format = workbook_format(path)?;
    let mut clients = AccountClients::connect(account).context("failed to set up provider clients")?;
    match format {
        WorkbookFormat::Json => {
            let store = JsonAdapter::open_path(path)
                .with_context(|| format!("failed to open workbook {}", path.display()))?;
            sync_store(store, account, &mut clients)
        }
        WorkbookFormat::Xlsx => {
            let store = UmyaAdapter::open_path(path)
                .with_context(|| format!("failed to open workbook {}", path.display()))?;
            sync_store(store, account, &mut clients)
        }
    }
}

fn sync_store<S: SpreadsheetIO>(
    mut store: S,
    account: &Account,
    clients: &mut AccountClients,
) -> Result<Vec<SheetSummary>> {
    let mut providers = clients.providers();
    sync_workbook(&mut store, account, &mut providers, &SystemClock)
        .with_context(|| format!("failed to reconcile {}", account.workbook.display()))
}
