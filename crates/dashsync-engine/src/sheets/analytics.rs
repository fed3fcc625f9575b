//! Website analytics sheet: a block of query templates on the left, one
//! column per month on the right.

use dashsync_common::CellValue;
use dashsync_config::Website;
use tracing::{debug, warn};

use crate::cache::{CacheScope, ResultCache, rows_from_report};
use crate::error::ReconcileError;
use crate::policy::{FillMode, Window};
use crate::providers::{AnalyticsQuery, split_list};
use crate::sheets::SheetPass;

const HEADER_ROW: u32 = 1;

/// Columns of the query template block, in tuple order.
pub const TEMPLATE_COLUMNS: [&str; 7] = [
    "metrics",
    "dimensions",
    "sort",
    "filters",
    "max_results",
    "display_dimension",
    "index",
];

/// Row template read from the configuration block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryTemplate {
    pub row: u32,
    pub metrics: Option<String>,
    pub dimensions: Option<String>,
    pub sort: Option<String>,
    pub filters: Option<String>,
    pub max_results: Option<u32>,
    pub display_dimension: Option<String>,
    pub index: Option<usize>,
}

impl QueryTemplate {
    fn is_index_only(&self) -> bool {
        self.metrics.is_none() && self.index.is_some()
    }

    fn opens_group(&self) -> bool {
        self.metrics.is_some() && self.max_results.is_some()
    }

    /// Writes a cell of its own (as opposed to feeding the cache or nothing).
    fn writes(&self) -> bool {
        self.index.is_some() || (self.metrics.is_some() && self.max_results.is_none())
    }

    fn query(&self, website: &Website, window: Window, metrics: &str) -> AnalyticsQuery {
        let mut query = AnalyticsQuery::new(&website.analytics_profile_id, window, metrics);
        query.dimensions = self.dimensions.clone();
        query.sort = self.sort.clone();
        query.filters = self.filters.clone();
        query.max_results = self.max_results;
        query
    }
}

/// Header layout: where the template columns are and which months follow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub template: [u32; 7],
    pub periods: Vec<(u32, Window)>,
}

pub fn bind_layout(pass: &SheetPass<'_, '_>) -> Result<Layout, ReconcileError> {
    let sheet = &*pass.sheet;
    let mut template: [Option<u32>; 7] = [None; 7];
    let mut periods = Vec::new();
    for col in 1..=sheet.max_col() {
        let Some(label) = sheet.text(HEADER_ROW, col) else {
            continue;
        };
        let lower = label.to_ascii_lowercase();
        if let Some(i) = TEMPLATE_COLUMNS.iter().position(|c| *c == lower) {
            template[i] = Some(col);
            continue;
        }
        if lower == "description" {
            continue;
        }
        let window = sheet
            .get(HEADER_ROW, col)
            .and_then(CellValue::as_month)
            .and_then(Window::containing_month)
            .ok_or_else(|| {
                let (sheet, cell) = pass.at(HEADER_ROW, col);
                ReconcileError::InvalidPeriod {
                    sheet,
                    cell,
                    value: label.clone(),
                }
            })?;
        periods.push((col, window));
    }
    let mut cols = [0u32; 7];
    for (i, col) in template.iter().enumerate() {
        cols[i] = col.ok_or_else(|| ReconcileError::MissingTemplateColumn {
            sheet: sheet.name().to_string(),
            column: TEMPLATE_COLUMNS[i].to_string(),
        })?;
    }
    Ok(Layout {
        template: cols,
        periods,
    })
}

/// Read every template row; rows below the last template row carry no query.
pub fn read_templates(pass: &SheetPass<'_, '_>, layout: &Layout) -> Result<Vec<QueryTemplate>, ReconcileError> {
    let sheet = &*pass.sheet;
    let [metrics, dimensions, sort, filters, max_results, display, index] = layout.template;
    let last = (HEADER_ROW + 1..=sheet.max_row())
        .filter(|&r| layout.template.iter().any(|&c| sheet.text(r, c).is_some()))
        .max()
        .unwrap_or(HEADER_ROW);

    for &(col, _) in &layout.periods {
        if let Some(deepest) = (last + 1..=sheet.max_row()).rev().find(|&r| !sheet.is_blank(r, col)) {
            return Err(ReconcileError::TemplateLengthMismatch {
                sheet: sheet.name().to_string(),
                detail: format!(
                    "period column {} has data in row {deepest} but templates end at row {last}",
                    dashsync_io::col_to_a1(col)
                ),
            });
        }
    }

    let positive = |row: u32, col: u32, column: &str| -> Result<Option<u64>, ReconcileError> {
        let Some(value) = sheet.get(row, col).filter(|v| v.as_text().is_some()) else {
            return Ok(None);
        };
        match value.as_i64() {
            Some(n) if n > 0 => Ok(Some(n as u64)),
            _ => {
                let (sheet, cell) = pass.at(row, col);
                Err(ReconcileError::InvalidTemplateValue {
                    sheet,
                    cell,
                    column: column.to_string(),
                    value: value.to_string(),
                })
            }
        }
    };

    let mut templates = Vec::new();
    for row in HEADER_ROW + 1..=last {
        let template = QueryTemplate {
            row,
            metrics: sheet.text(row, metrics),
            dimensions: sheet.text(row, dimensions),
            sort: sheet.text(row, sort),
            filters: sheet.text(row, filters),
            max_results: positive(row, max_results, "max_results")?.map(|n| n.min(u64::from(u32::MAX)) as u32),
            display_dimension: sheet.text(row, display),
            index: positive(row, index, "index")?.map(|n| n as usize),
        };
        if let Some(list) = &template.metrics {
            if template.max_results.is_none() && split_list(list).count() > 1 {
                let (sheet, cell) = pass.at(row, metrics);
                return Err(ReconcileError::UnsupportedMetrics {
                    sheet,
                    cell,
                    metrics: list.clone(),
                });
            }
        }
        templates.push(template);
    }
    Ok(templates)
}

/// Cache groups: every index-only row reads the result of the nearest
/// `max_results` row above it. Spacer rows and single-value rows in between
/// leave the group open; only the next `max_results` row starts a new one.
///
/// Returns, per template, the row of the template that opened its group, or
/// `None` for rows that are not index-only.
fn group_heads(templates: &[QueryTemplate]) -> Vec<Option<u32>> {
    let mut open: Option<u32> = None;
    templates
        .iter()
        .map(|t| {
            if t.opens_group() {
                open = Some(t.row);
            }
            if t.is_index_only() { open } else { None }
        })
        .collect()
}

pub fn reconcile(pass: &mut SheetPass<'_, '_>, website: &Website) -> Result<(), ReconcileError> {
    let layout = bind_layout(pass)?;
    let templates = read_templates(pass, &layout)?;
    let heads = group_heads(&templates);
    let mut cache = ResultCache::new();

    for &(col, window) in &layout.periods {
        if !window.has_elapsed(pass.today) {
            let open = templates
                .iter()
                .filter(|t| t.writes() && pass.sheet.is_blank(t.row, col))
                .count();
            pass.summary.cells_deferred += open;
            debug!(sheet = %pass.sheet.name(), %window, deferred = open, "period still open");
            continue;
        }
        cache.clear();

        for (i, t) in templates.iter().enumerate() {
            let Some(metrics) = t.metrics.as_deref() else {
                if let Some(index) = t.index {
                    fill_from_cache(pass, &cache, heads[i], t.row, col, index);
                }
                continue;
            };

            if t.opens_group() {
                let members_blank = templates[i + 1..]
                    .iter()
                    .zip(&heads[i + 1..])
                    .filter(|(_, head)| **head == Some(t.row))
                    .any(|(m, _)| pass.sheet.is_blank(m.row, col));
                if !members_blank {
                    cache.clear();
                    continue;
                }
                let query = t.query(website, window, metrics);
                let report = pass.query(&query)?;
                let first_metric = split_list(metrics).next().unwrap_or(metrics);
                let rows = rows_from_report(&report, query.dimension_count(), first_metric);
                cache.set(
                    CacheScope {
                        col,
                        group_row: t.row,
                    },
                    rows,
                );
                continue;
            }

            if !pass.sheet.is_blank(t.row, col) {
                continue;
            }
            let query = t.query(website, window, metrics);
            let report = pass.query(&query)?;
            let value = match &t.display_dimension {
                Some(display) => {
                    let dims = query.dimension_count();
                    // a repeated label resolves to its last row
                    report
                        .rows
                        .iter()
                        .rfind(|row| row.first().is_some_and(|d| d == display))
                        .and_then(|row| row.get(dims))
                        .map(String::as_str)
                }
                None => report.total(metrics),
            };
            match value.and_then(CellValue::from_numeric_str) {
                Some(v) => {
                    pass.put(t.row, col, FillMode::Once, v);
                }
                None => debug!(sheet = %pass.sheet.name(), row = t.row, %window, "no value returned"),
            }
        }
    }
    Ok(())
}

fn fill_from_cache(
    pass: &mut SheetPass<'_, '_>,
    cache: &ResultCache,
    head: Option<u32>,
    row: u32,
    col: u32,
    index: usize,
) {
    if !pass.sheet.is_blank(row, col) {
        return;
    }
    let cached = head.and_then(|group_row| cache.row(CacheScope { col, group_row }, index));
    match cached {
        Some(cached) => {
            pass.put(row, col, FillMode::Once, CellValue::Text(cached.render()));
        }
        None => warn!(
            sheet = %pass.sheet.name(),
            cell = %dashsync_io::cell_ref(row, col),
            index,
            "cached result has no row for this index"
        ),
    }
}
