//! Short-lived cache for multi-row analytics results read by `index` rows.

use crate::providers::AnalyticsReport;

/// One row of a cached result, with its share of the grand total.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedRow {
    /// Dimension values joined by `" / "`.
    pub label: String,
    /// First metric value, verbatim.
    pub raw_count: String,
    pub share: f64,
}

impl CachedRow {
    /// `"{percent}% - {label} ({raw_count})"`.
    ///
    /// Halves round to even, the way the dashboards have always been rendered.
    pub fn render(&self) -> String {
        let percent = (self.share * 100.0).round_ties_even() as i64;
        format!("{percent}% - {} ({})", self.label, self.raw_count)
    }
}

/// Build cached rows from a report with `dimensions` leading columns.
///
/// Shares are computed against the total of `metric`; a zero or missing total
/// yields a share of 0.
pub fn rows_from_report(report: &AnalyticsReport, dimensions: usize, metric: &str) -> Vec<CachedRow> {
    let total = report
        .total(metric)
        .and_then(|t| t.trim().parse::<f64>().ok())
        .unwrap_or(0.0);
    report
        .rows
        .iter()
        .filter(|row| row.len() > dimensions)
        .map(|row| {
            let raw_count = row[dimensions].clone();
            let raw = raw_count.trim().parse::<f64>().unwrap_or(0.0);
            CachedRow {
                label: row[..dimensions].join(" / "),
                raw_count,
                share: if total == 0.0 { 0.0 } else { raw / total },
            }
        })
        .collect()
}

/// Where a cached set came from: a period column and the row that opened the group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheScope {
    pub col: u32,
    pub group_row: u32,
}

/// A single mutable slot, replaced each time a new group is fetched.
#[derive(Debug, Default)]
pub struct ResultCache {
    scope: Option<CacheScope>,
    rows: Vec<CachedRow>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, scope: CacheScope, rows: Vec<CachedRow>) {
        self.scope = Some(scope);
        self.rows = rows;
    }

    /// Rows cached for `scope`, or `None` when the slot holds another group.
    pub fn get(&self, scope: CacheScope) -> Option<&[CachedRow]> {
        (self.scope == Some(scope)).then_some(self.rows.as_slice())
    }

    /// The `index`-th cached row (1-based) of `scope`.
    pub fn row(&self, scope: CacheScope, index: usize) -> Option<&CachedRow> {
        index.checked_sub(1).and_then(|i| self.get(scope)?.get(i))
    }

    pub fn clear(&mut self) {
        self.scope = None;
        self.rows.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.scope.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> AnalyticsReport {
        let mut report = AnalyticsReport {
            rows: vec![
                vec!["google".into(), "organic".into(), "60".into()],
                vec!["(direct)".into(), "(none)".into(), "25".into()],
                vec!["bing".into(), "organic".into(), "15".into()],
            ],
            ..Default::default()
        };
        report.totals.insert("ga:sessions".into(), "100".into());
        report
    }

    #[test]
    fn shares_and_rendering() {
        let rows = rows_from_report(&report(), 2, "ga:sessions");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].label, "google / organic");
        assert_eq!(rows[0].render(), "60% - google / organic (60)");
        assert_eq!(rows[2].render(), "15% - bing / organic (15)");
    }

    #[test]
    fn zero_total_gives_zero_share() {
        let mut r = report();
        r.totals.insert("ga:sessions".into(), "0".into());
        let rows = rows_from_report(&r, 2, "ga:sessions");
        assert!(rows.iter().all(|row| row.share == 0.0));
    }

    #[test]
    fn halves_round_to_even() {
        let row = CachedRow {
            label: "x".into(),
            raw_count: "1".into(),
            share: 0.125,
        };
        assert_eq!(row.render(), "12% - x (1)");
    }

    #[test]
    fn lookups_are_scoped() {
        let mut cache = ResultCache::new();
        let scope = CacheScope { col: 9, group_row: 4 };
        assert!(cache.is_empty());
        cache.set(scope, rows_from_report(&report(), 2, "ga:sessions"));
        assert_eq!(cache.row(scope, 1).map(|r| r.raw_count.as_str()), Some("60"));
        assert!(cache.row(scope, 0).is_none());
        assert!(cache.row(scope, 4).is_none());
        assert!(cache.row(CacheScope { col: 10, group_row: 4 }, 1).is_none());
        cache.clear();
        assert!(cache.get(scope).is_none());
    }
}
