//! Fixtures shared by the dashsync test suites.
//!
//! The provider fakes answer from canned data and record every request, so
//! tests can assert both what was written and how many calls it took.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use dashsync_common::CellValue;
use dashsync_config::{Account, BlogSettings, NewsletterSettings, SheetKind, Website};
use dashsync_engine::{
    AnalyticsProvider, AnalyticsQuery, AnalyticsReport, CampaignEmail, ClickDetails, ClickRecord,
    FixedClock, LinkShortener, ProviderError,
};
use dashsync_io::{
    CellData, JsonAdapter, SaveDestination, Sheet, SpreadsheetReader, SpreadsheetWriter,
};
use rustc_hash::FxHashMap;
use serde_json::Value;
use tempfile::TempDir;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
}

pub fn clock(y: i32, m: u32, d: u32) -> FixedClock {
    FixedClock(date(y, m, d))
}

pub fn website(name: &str) -> Website {
    Website {
        name: name.to_string(),
        analytics_profile_id: "12345".to_string(),
    }
}

/// Account without credentials; the tests inject providers directly.
pub fn account(workbook: &Path, websites: &[&str], sheets: &[SheetKind]) -> Account {
    Account {
        name: "acme".to_string(),
        workbook: workbook.to_path_buf(),
        analytics: None,
        bitly: None,
        mailchimp: None,
        websites: websites.iter().map(|w| website(w)).collect(),
        newsletter: NewsletterSettings::default(),
        blog: BlogSettings::default(),
        sheets: sheets.to_vec(),
    }
}

/* ─────────────── cells and sheets ─────────────── */

/// Parse a literal the way a user would type it: integers, decimals, `TRUE`/`FALSE`, else text.
pub fn cell(raw: &str) -> CellValue {
    if raw.is_empty() {
        return CellValue::Empty;
    }
    if let Ok(i) = raw.parse::<i64>() {
        return CellValue::Int(i);
    }
    if let Ok(n) = raw.parse::<f64>() {
        return CellValue::Number(n);
    }
    match raw {
        "TRUE" => CellValue::Boolean(true),
        "FALSE" => CellValue::Boolean(false),
        _ => CellValue::text(raw),
    }
}

/// Sheet from literal rows; `""` leaves a cell blank.
pub fn sheet(name: &str, rows: &[&[&str]]) -> Sheet {
    Sheet::from_rows(
        name,
        rows.iter().map(|row| row.iter().map(|raw| cell(raw)).collect::<Vec<_>>()),
    )
}

/// Value of a cell by A1 reference, `Empty` when absent.
pub fn value_at(sheet: &Sheet, a1: &str) -> CellValue {
    let (row, col) = parse_a1(a1).expect("bad A1 ref in value_at");
    sheet.get(row, col).cloned().unwrap_or(CellValue::Empty)
}

pub fn text_at(sheet: &Sheet, a1: &str) -> Option<String> {
    value_at(sheet, a1).as_text()
}

fn parse_a1(a1: &str) -> Option<(u32, u32)> {
    let split = a1.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = a1.split_at(split);
    if letters.is_empty() {
        return None;
    }
    let mut col = 0u32;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        col = col * 26 + (ch.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }
    let row = digits.parse().ok()?;
    Some((row, col))
}

/* ─────────────── workbooks ─────────────── */

/// In-memory JSON workbook holding the given sheets.
pub fn json_store(sheets: &[Sheet]) -> JsonAdapter {
    let mut store = JsonAdapter::new();
    for sheet in sheets {
        store.create_sheet(sheet.name()).expect("create sheet");
        for row in 1..=sheet.max_row() {
            for col in 1..=sheet.max_col() {
                if let Some(value) = sheet.get(row, col) {
                    store
                        .write_cell(sheet.name(), row, col, CellData::from_value(value.clone()))
                        .expect("write fixture cell");
                }
            }
        }
    }
    store
}

/// A JSON workbook saved under a fresh temp dir. Keep the `TempDir` alive for the test.
pub fn json_workbook_file(sheets: &[Sheet]) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("dashboard.json");
    let mut store = json_store(sheets);
    store
        .save_to(SaveDestination::Path(&path))
        .expect("save fixture workbook");
    (dir, path)
}

/// Re-read a sheet from a store, as a later run would see it.
pub fn reload<R: SpreadsheetReader>(store: &mut R, name: &str) -> Sheet {
    Sheet::load(store, name).unwrap_or_else(|_| panic!("sheet {name} should load"))
}

/* ─────────────── analytics ─────────────── */

/// Report from literal rows and `(metric, total)` pairs.
pub fn report(rows: &[&[&str]], totals: &[(&str, &str)]) -> AnalyticsReport {
    AnalyticsReport {
        rows: rows
            .iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect(),
        totals: totals
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    }
}

type Handler = Box<dyn FnMut(&AnalyticsQuery) -> Result<AnalyticsReport, ProviderError>>;

/// Analytics fake driven by a closure; every query is recorded.
pub struct FakeAnalytics {
    handler: Handler,
    pub calls: Vec<AnalyticsQuery>,
}

impl FakeAnalytics {
    pub fn new(
        handler: impl FnMut(&AnalyticsQuery) -> Result<AnalyticsReport, ProviderError> + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            calls: Vec::new(),
        }
    }

    /// Answers every query with the same report.
    pub fn fixed(report: AnalyticsReport) -> Self {
        Self::new(move |_| Ok(report.clone()))
    }

    /// Answers queries in order; panics when the script runs out.
    pub fn scripted(reports: Vec<AnalyticsReport>) -> Self {
        let mut queue: VecDeque<_> = reports.into();
        Self::new(move |q| {
            Ok(queue
                .pop_front()
                .unwrap_or_else(|| panic!("unexpected analytics query: {q:?}")))
        })
    }

    /// Fails the test if it is ever queried.
    pub fn unreachable() -> Self {
        Self::new(|q| panic!("analytics should not be queried: {q:?}"))
    }

    pub fn call_count(&self) -> usize {
        self.calls.len()
    }
}

impl AnalyticsProvider for FakeAnalytics {
    fn query(&mut self, query: &AnalyticsQuery) -> Result<AnalyticsReport, ProviderError> {
        self.calls.push(query.clone());
        (self.handler)(query)
    }
}

pub fn rejected(provider: &'static str, message: &str) -> ProviderError {
    ProviderError::Rejected {
        provider,
        message: message.to_string(),
    }
}

/* ─────────────── links ─────────────── */

#[derive(Default)]
pub struct FakeShortener {
    clicks: FxHashMap<String, i64>,
    targets: FxHashMap<String, String>,
    short_links: FxHashMap<String, String>,
    pub created: Vec<String>,
    pub calls: usize,
}

impl FakeShortener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_link(mut self, short_url: &str, target: &str, clicks: i64) -> Self {
        self.clicks.insert(short_url.to_string(), clicks);
        self.targets.insert(short_url.to_string(), target.to_string());
        self.short_links
            .insert(target.to_string(), short_url.to_string());
        self
    }

    fn unknown(short_url: &str) -> ProviderError {
        rejected("bitly", &format!("NOT_FOUND: {short_url}"))
    }
}

impl LinkShortener for FakeShortener {
    fn total_clicks(&mut self, short_url: &str) -> Result<i64, ProviderError> {
        self.calls += 1;
        self.clicks
            .get(short_url)
            .copied()
            .ok_or_else(|| Self::unknown(short_url))
    }

    fn target_url(&mut self, short_url: &str) -> Result<String, ProviderError> {
        self.calls += 1;
        self.targets
            .get(short_url)
            .cloned()
            .ok_or_else(|| Self::unknown(short_url))
    }

    fn create_or_get(&mut self, long_url: &str) -> Result<String, ProviderError> {
        self.calls += 1;
        if let Some(short) = self.short_links.get(long_url) {
            return Ok(short.clone());
        }
        let short = format!("https://bit.ly/t{}", self.short_links.len() + 1);
        self.short_links.insert(long_url.to_string(), short.clone());
        self.clicks.insert(short.clone(), 0);
        self.targets.insert(short.clone(), long_url.to_string());
        self.created.push(long_url.to_string());
        Ok(short)
    }
}

/* ─────────────── email ─────────────── */

#[derive(Default)]
pub struct FakeEmail {
    campaigns: FxHashMap<String, Value>,
    reports: FxHashMap<String, Value>,
    clicks: FxHashMap<String, ClickDetails>,
    pub calls: Vec<String>,
}

impl FakeEmail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_campaign(mut self, id: &str, campaign: Value) -> Self {
        self.campaigns.insert(id.to_string(), campaign);
        self
    }

    pub fn with_report(mut self, id: &str, report: Value) -> Self {
        self.reports.insert(id.to_string(), report);
        self
    }

    pub fn with_clicks(mut self, id: &str, records: Vec<ClickRecord>) -> Self {
        self.clicks.insert(
            id.to_string(),
            ClickDetails {
                campaign_id: id.to_string(),
                urls_clicked: records,
            },
        );
        self
    }

    /// Click details that claim to belong to another campaign.
    pub fn with_foreign_clicks(mut self, id: &str, other_id: &str) -> Self {
        self.clicks.insert(
            id.to_string(),
            ClickDetails {
                campaign_id: other_id.to_string(),
                urls_clicked: Vec::new(),
            },
        );
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.len()
    }

    fn unknown(id: &str) -> ProviderError {
        rejected("mailchimp", &format!("Resource Not Found: {id}"))
    }
}

impl CampaignEmail for FakeEmail {
    fn get_campaign(&mut self, campaign_id: &str) -> Result<Value, ProviderError> {
        self.calls.push(format!("campaign:{campaign_id}"));
        self.campaigns
            .get(campaign_id)
            .cloned()
            .ok_or_else(|| Self::unknown(campaign_id))
    }

    fn get_campaign_report(&mut self, campaign_id: &str) -> Result<Value, ProviderError> {
        self.calls.push(format!("report:{campaign_id}"));
        self.reports
            .get(campaign_id)
            .cloned()
            .ok_or_else(|| Self::unknown(campaign_id))
    }

    fn get_campaign_click_details(
        &mut self,
        campaign_id: &str,
    ) -> Result<ClickDetails, ProviderError> {
        self.calls.push(format!("clicks:{campaign_id}"));
        self.clicks
            .get(campaign_id)
            .cloned()
            .ok_or_else(|| Self::unknown(campaign_id))
    }
}

pub fn click(url: &str, total: i64, pct: f64, unique: i64, unique_pct: f64) -> ClickRecord {
    ClickRecord {
        url: url.to_string(),
        total_clicks: total,
        click_percentage: pct,
        unique_clicks: unique,
        unique_click_percentage: unique_pct,
    }
}
