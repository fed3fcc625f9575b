use dashsync_common::CellValue;
use dashsync_config::SheetKind;
use dashsync_engine::{Providers, ReconcileError, sync_workbook};
use dashsync_io::{JsonAdapter, Sheet, SpreadsheetReader};
use dashsync_testkit::{
    FakeAnalytics, FakeEmail, account, clock, json_store, json_workbook_file, reload, report,
    sheet, text_at, value_at,
};
use serde_json::json;

fn dashboard() -> Sheet {
    sheet(
        "example.org",
        &[
            &["metrics", "dimensions", "sort", "filters", "max_results", "display_dimension", "index", "2024-01"],
            &["ga:sessions"],
            &["ga:users"],
        ],
    )
}

fn newsletters() -> Sheet {
    sheet("newsletters", &[&["id", "emails_sent"], &["c1"]])
}

fn analytics() -> FakeAnalytics {
    FakeAnalytics::new(|q| {
        let total = if q.metrics == "ga:sessions" { "1200" } else { "800" };
        Ok(report(&[], &[(q.metrics.as_str(), total)]))
    })
}

fn email() -> FakeEmail {
    FakeEmail::new().with_campaign("c1", json!({"id": "c1", "emails_sent": 512}))
}

#[test]
fn sync_persists_every_enabled_sheet() {
    let (_dir, path) = json_workbook_file(&[dashboard(), newsletters()]);
    let acct = account(
        &path,
        &["example.org"],
        &[SheetKind::Website, SheetKind::Newsletters, SheetKind::BlogArticles],
    );
    let mut store = JsonAdapter::open_path(&path).unwrap();
    let mut analytics = analytics();
    let mut email = email();
    let mut providers = Providers::new()
        .with_analytics(&mut analytics)
        .with_email(&mut email);

    let summaries = sync_workbook(&mut store, &acct, &mut providers, &clock(2024, 2, 10)).unwrap();

    // the blog sheet is enabled but absent from the workbook
    let names: Vec<_> = summaries.iter().map(|s| s.sheet.as_str()).collect();
    assert_eq!(names, ["example.org", "newsletters"]);
    assert_eq!(summaries[0].cells_written, 2);
    assert_eq!(summaries[1].cells_written, 1);

    let mut reopened = JsonAdapter::open_path(&path).unwrap();
    let site = reload(&mut reopened, "example.org");
    assert_eq!(value_at(&site, "H2"), CellValue::Int(1200));
    assert_eq!(value_at(&site, "H3"), CellValue::Int(800));
    let letters = reload(&mut reopened, "newsletters");
    assert_eq!(value_at(&letters, "B2"), CellValue::Int(512));
}

#[test]
fn a_second_sync_changes_nothing() {
    let (_dir, path) = json_workbook_file(&[dashboard(), newsletters()]);
    let acct = account(&path, &["example.org"], &[SheetKind::Website, SheetKind::Newsletters]);
    {
        let mut store = JsonAdapter::open_path(&path).unwrap();
        let mut analytics = analytics();
        let mut email = email();
        let mut providers = Providers::new()
            .with_analytics(&mut analytics)
            .with_email(&mut email);
        sync_workbook(&mut store, &acct, &mut providers, &clock(2024, 2, 10)).unwrap();
    }
    let before = std::fs::read_to_string(&path).unwrap();

    let mut store = JsonAdapter::open_path(&path).unwrap();
    let mut analytics = FakeAnalytics::unreachable();
    let mut email = FakeEmail::new();
    let mut providers = Providers::new()
        .with_analytics(&mut analytics)
        .with_email(&mut email);
    let summaries = sync_workbook(&mut store, &acct, &mut providers, &clock(2024, 2, 11)).unwrap();

    assert!(summaries.iter().all(|s| s.cells_written == 0 && s.provider_calls == 0));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
}

#[test]
fn a_failing_sheet_keeps_earlier_sheets_and_writes_nothing_itself() {
    let letters = sheet(
        "newsletters",
        &[&["id", "settings/title", "emails_sent"], &["c1"]],
    );
    let (_dir, path) = json_workbook_file(&[dashboard(), letters]);
    let acct = account(&path, &["example.org"], &[SheetKind::Website, SheetKind::Newsletters]);
    let mut store = JsonAdapter::open_path(&path).unwrap();
    let mut analytics = analytics();
    // no email provider: the newsletters pass fails on its first campaign cell
    let mut providers = Providers::new().with_analytics(&mut analytics);

    let err = sync_workbook(&mut store, &acct, &mut providers, &clock(2024, 2, 10)).unwrap_err();
    assert!(matches!(err, ReconcileError::MissingProvider { ref sheet, .. } if sheet == "newsletters"));

    let mut reopened = JsonAdapter::open_path(&path).unwrap();
    let site = reload(&mut reopened, "example.org");
    assert_eq!(value_at(&site, "H2"), CellValue::Int(1200));
    let letters = reload(&mut reopened, "newsletters");
    assert_eq!(text_at(&letters, "B2"), None);
    assert_eq!(text_at(&letters, "C2"), None);
}

#[test]
fn every_website_gets_its_own_sheet() {
    let other = sheet(
        "example.net",
        &[
            &["metrics", "dimensions", "sort", "filters", "max_results", "display_dimension", "index", "2024-01"],
            &["ga:sessions"],
        ],
    );
    let mut store = json_store(&[dashboard(), other]);
    let acct = account(
        std::path::Path::new("unused.json"),
        &["example.org", "example.net"],
        &[SheetKind::Website],
    );
    let mut analytics = analytics();
    let mut providers = Providers::new().with_analytics(&mut analytics);

    let summaries = sync_workbook(&mut store, &acct, &mut providers, &clock(2024, 2, 10)).unwrap();
    drop(providers);

    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[1].sheet, "example.net");
    assert_eq!(analytics.call_count(), 3);
    let net = reload(&mut store, "example.net");
    assert_eq!(value_at(&net, "H2"), CellValue::Int(1200));
}

#[test]
fn sheets_that_need_a_website_fail_without_one() {
    let mut store = json_store(&[newsletters()]);
    let acct = account(std::path::Path::new("unused.json"), &[], &[SheetKind::Campaigns]);
    let mut providers = Providers::new();
    let err = sync_workbook(&mut store, &acct, &mut providers, &clock(2024, 2, 10)).unwrap_err();
    assert!(matches!(err, ReconcileError::NoWebsite { .. }));
}
