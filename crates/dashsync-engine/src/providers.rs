//! Provider seams consumed by the reconcilers.
//!
//! Each external service is a trait so the reconcilers can be driven by the
//! HTTP clients in `dashsync-providers` or by recording fakes in tests.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ProviderError, ReconcileError};
use crate::policy::Window;

/// One Core Reporting request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticsQuery {
    pub profile_id: String,
    pub window: Window,
    /// Comma-separated metric names (`ga:pageviews,ga:entrances`).
    pub metrics: String,
    pub dimensions: Option<String>,
    pub sort: Option<String>,
    pub filters: Option<String>,
    pub max_results: Option<u32>,
}

impl AnalyticsQuery {
    pub fn new(profile_id: impl Into<String>, window: Window, metrics: impl Into<String>) -> Self {
        Self {
            profile_id: profile_id.into(),
            window,
            metrics: metrics.into(),
            dimensions: None,
            sort: None,
            filters: None,
            max_results: None,
        }
    }

    pub fn dimensions(mut self, dimensions: impl Into<String>) -> Self {
        self.dimensions = Some(dimensions.into());
        self
    }

    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn filters(mut self, filters: impl Into<String>) -> Self {
        self.filters = Some(filters.into());
        self
    }

    pub fn max_results(mut self, max_results: u32) -> Self {
        self.max_results = Some(max_results);
        self
    }

    pub fn metric_names(&self) -> impl Iterator<Item = &str> {
        split_list(&self.metrics)
    }

    pub fn dimension_count(&self) -> usize {
        self.dimensions.as_deref().map_or(0, |d| split_list(d).count())
    }
}

pub(crate) fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// Rows are `[dimension.., metric..]` as returned; totals are keyed by metric name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsReport {
    #[serde(default)]
    pub rows: Vec<Vec<String>>,
    #[serde(default)]
    pub totals: BTreeMap<String, String>,
}

impl AnalyticsReport {
    /// Total for `metric`. Metric names are matched case-insensitively
    /// (`ga:pageViews` and `ga:pageviews` are the same metric).
    pub fn total(&self, metric: &str) -> Option<&str> {
        self.totals
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(metric))
            .map(|(_, v)| v.as_str())
    }
}

pub trait AnalyticsProvider {
    fn query(&mut self, query: &AnalyticsQuery) -> Result<AnalyticsReport, ProviderError>;
}

pub trait LinkShortener {
    fn total_clicks(&mut self, short_url: &str) -> Result<i64, ProviderError>;
    fn target_url(&mut self, short_url: &str) -> Result<String, ProviderError>;
    /// Short link for `long_url`, creating it when the account has none yet.
    fn create_or_get(&mut self, long_url: &str) -> Result<String, ProviderError>;
}

/// Engagement for one tracked URL of a campaign.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClickRecord {
    pub url: String,
    #[serde(default)]
    pub total_clicks: i64,
    #[serde(default)]
    pub click_percentage: f64,
    #[serde(default)]
    pub unique_clicks: i64,
    #[serde(default)]
    pub unique_click_percentage: f64,
}

impl ClickRecord {
    pub const FIELDS: [&'static str; 4] = [
        "total_clicks",
        "click_percentage",
        "unique_clicks",
        "unique_click_percentage",
    ];

    pub fn field(&self, name: &str) -> Option<dashsync_common::CellValue> {
        use dashsync_common::CellValue;
        Some(match name {
            "total_clicks" => CellValue::Int(self.total_clicks),
            "click_percentage" => CellValue::Number(self.click_percentage),
            "unique_clicks" => CellValue::Int(self.unique_clicks),
            "unique_click_percentage" => CellValue::Number(self.unique_click_percentage),
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClickDetails {
    pub campaign_id: String,
    #[serde(default)]
    pub urls_clicked: Vec<ClickRecord>,
}

pub trait CampaignEmail {
    fn get_campaign(&mut self, campaign_id: &str) -> Result<Value, ProviderError>;
    fn get_campaign_report(&mut self, campaign_id: &str) -> Result<Value, ProviderError>;
    fn get_campaign_click_details(&mut self, campaign_id: &str)
    -> Result<ClickDetails, ProviderError>;
}

/// Provider handles injected into one account's sync.
///
/// A handle is only required by the sheets whose rows need it.
#[derive(Default)]
pub struct Providers<'p> {
    pub analytics: Option<&'p mut dyn AnalyticsProvider>,
    pub links: Option<&'p mut dyn LinkShortener>,
    pub email: Option<&'p mut dyn CampaignEmail>,
}

impl<'p> Providers<'p> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_analytics(mut self, provider: &'p mut dyn AnalyticsProvider) -> Self {
        self.analytics = Some(provider);
        self
    }

    pub fn with_links(mut self, provider: &'p mut dyn LinkShortener) -> Self {
        self.links = Some(provider);
        self
    }

    pub fn with_email(mut self, provider: &'p mut dyn CampaignEmail) -> Self {
        self.email = Some(provider);
        self
    }

    pub(crate) fn analytics(&mut self, sheet: &str) -> Result<&mut dyn AnalyticsProvider, ReconcileError> {
        match self.analytics.as_deref_mut() {
            Some(p) => Ok(p),
            None => Err(missing(sheet, "analytics")),
        }
    }

    pub(crate) fn links(&mut self, sheet: &str) -> Result<&mut dyn LinkShortener, ReconcileError> {
        match self.links.as_deref_mut() {
            Some(p) => Ok(p),
            None => Err(missing(sheet, "bitly")),
        }
    }

    pub(crate) fn email(&mut self, sheet: &str) -> Result<&mut dyn CampaignEmail, ReconcileError> {
        match self.email.as_deref_mut() {
            Some(p) => Ok(p),
            None => Err(missing(sheet, "mailchimp")),
        }
    }
}

fn missing(sheet: &str, provider: &'static str) -> ReconcileError {
    ReconcileError::MissingProvider {
        sheet: sheet.to_string(),
        provider,
    }
}
