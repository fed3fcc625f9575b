//! Page statistics shared by the campaigns and blog sheets.

use std::collections::HashMap;

use dashsync_common::CellValue;

use crate::columns::{PAGE_METRICS, PageStat};
use crate::error::ReconcileError;
use crate::format::{NOT_FOUND, format_duration_str};
use crate::policy::Window;
use crate::providers::{AnalyticsQuery, AnalyticsReport};
use crate::sheets::SheetPass;

const REFERRAL_METRICS: &str = "ga:pageviews,ga:uniquePageviews,ga:entrances";

/// Referral breakdown of one page over one window.
struct Referrals {
    unique_page_views: Option<i64>,
    /// `"<source / medium>: <entrances>"`, busiest first.
    sources: Vec<String>,
}

impl Referrals {
    fn from_report(report: &AnalyticsReport) -> Self {
        let mut rows: Vec<&Vec<String>> = report
            .rows
            .iter()
            .filter(|row| row.len() >= 4 && !row[0].trim().is_empty())
            .collect();
        rows.sort_by_key(|row| std::cmp::Reverse(row[1].trim().parse::<i64>().unwrap_or(0)));
        let unique_page_views = if report.rows.is_empty() {
            None
        } else {
            report
                .total("ga:uniquePageviews")
                .and_then(|t| t.trim().parse::<i64>().ok())
                .filter(|n| *n != 0)
        };
        Self {
            unique_page_views,
            sources: rows.iter().map(|row| format!("{}: {}", row[0], row[3])).collect(),
        }
    }
}

/// Page statistics of one row, fetched at most once per window.
pub(crate) struct PageStats<'r> {
    profile_id: &'r str,
    path: String,
    totals: HashMap<Window, AnalyticsReport>,
    referrals: HashMap<Window, Referrals>,
}

impl<'r> PageStats<'r> {
    pub(crate) fn new(profile_id: &'r str, path: String) -> Self {
        Self {
            profile_id,
            path,
            totals: HashMap::new(),
            referrals: HashMap::new(),
        }
    }

    fn filter(&self) -> String {
        format!("ga:pagePath=={}", self.path)
    }

    pub(crate) fn value(
        &mut self,
        pass: &mut SheetPass<'_, '_>,
        stat: PageStat,
        window: Window,
    ) -> Result<CellValue, ReconcileError> {
        match stat {
            PageStat::Metric(metric) => {
                if !self.totals.contains_key(&window) {
                    let query = AnalyticsQuery::new(self.profile_id, window, PAGE_METRICS.join(","))
                        .filters(self.filter());
                    let report = pass.query(&query)?;
                    self.totals.insert(window, report);
                }
                let raw = self.totals.get(&window).and_then(|r| r.total(metric));
                Ok(match raw {
                    Some(raw) => metric_value(metric, raw),
                    None => CellValue::text(NOT_FOUND),
                })
            }
            PageStat::SourceUniquePageViews | PageStat::TopSource | PageStat::SecondSource => {
                if !self.referrals.contains_key(&window) {
                    let query = AnalyticsQuery::new(self.profile_id, window, REFERRAL_METRICS)
                        .dimensions("ga:sourceMedium")
                        .filters(self.filter());
                    let report = pass.query(&query)?;
                    self.referrals.insert(window, Referrals::from_report(&report));
                }
                let referrals = self.referrals.get(&window);
                let found = referrals.and_then(|r| match stat {
                    PageStat::SourceUniquePageViews => r.unique_page_views.map(CellValue::Int),
                    PageStat::TopSource => r.sources.first().cloned().map(CellValue::Text),
                    _ => r.sources.get(1).cloned().map(CellValue::Text),
                });
                Ok(found.unwrap_or_else(|| CellValue::text(NOT_FOUND)))
            }
        }
    }
}

/// Cell value of one page metric total.
pub(crate) fn metric_value(metric: &str, raw: &str) -> CellValue {
    if metric.eq_ignore_ascii_case("ga:bounceRate") {
        return match raw.trim().parse::<f64>() {
            Ok(rate) => CellValue::from_f64(rate / 100.0),
            Err(_) => CellValue::text(raw),
        };
    }
    if metric.eq_ignore_ascii_case("ga:avgTimeOnPage") {
        return CellValue::text(format_duration_str(raw).unwrap_or_else(|| raw.to_string()));
    }
    CellValue::from_numeric_str(raw).unwrap_or_else(|| CellValue::text(raw))
}
