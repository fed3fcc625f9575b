//! Google Analytics Core Reporting API v3.

use std::collections::BTreeMap;

use dashsync_config::AnalyticsCredentials;
use dashsync_engine::{AnalyticsProvider, AnalyticsQuery, AnalyticsReport, ProviderError};
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::debug;

use crate::http;

const PROVIDER: &str = "analytics";
pub const API_ROOT: &str = "https://www.googleapis.com/analytics/v3/data/ga";

/// Row cap applied when a query does not set `max_results`.
pub const DEFAULT_MAX_RESULTS: u32 = 50;

pub struct GoogleAnalytics {
    client: Client,
    access_token: String,
    api_root: String,
}

impl GoogleAnalytics {
    pub fn new(credentials: &AnalyticsCredentials) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http::client(PROVIDER)?,
            access_token: credentials.access_token.clone(),
            api_root: API_ROOT.to_string(),
        })
    }

    /// Point the client at another endpoint (a proxy or a local stub).
    pub fn with_api_root(mut self, api_root: impl Into<String>) -> Self {
        self.api_root = api_root.into();
        self
    }
}

/// Query-string parameters of one request.
pub fn request_params(query: &AnalyticsQuery) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("ids", format!("ga:{}", query.profile_id)),
        ("start-date", query.window.start.format("%Y-%m-%d").to_string()),
        ("end-date", query.window.end.format("%Y-%m-%d").to_string()),
        ("metrics", query.metrics.clone()),
    ];
    if let Some(dimensions) = &query.dimensions {
        params.push(("dimensions", dimensions.clone()));
    }
    if let Some(sort) = &query.sort {
        params.push(("sort", sort.clone()));
    }
    if let Some(filters) = &query.filters {
        params.push(("filters", filters.clone()));
    }
    params.push((
        "max-results",
        query.max_results.unwrap_or(DEFAULT_MAX_RESULTS).to_string(),
    ));
    params
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GaResponse {
    #[serde(default)]
    rows: Vec<Vec<String>>,
    #[serde(default)]
    totals_for_all_results: BTreeMap<String, String>,
}

/// Decode a `data/ga` response. A report without `rows` has none.
pub fn parse_report(body: serde_json::Value) -> Result<AnalyticsReport, ProviderError> {
    let response: GaResponse = serde_json::from_value(body).map_err(|e| http::decode(PROVIDER, e))?;
    Ok(AnalyticsReport {
        rows: response.rows,
        totals: response.totals_for_all_results,
    })
}

impl AnalyticsProvider for GoogleAnalytics {
    fn query(&mut self, query: &AnalyticsQuery) -> Result<AnalyticsReport, ProviderError> {
        let params = request_params(query);
        debug!(profile = %query.profile_id, window = %query.window, "GET data/ga");
        let response = self
            .client
            .get(&self.api_root)
            .bearer_auth(&self.access_token)
            .query(&params)
            .send()
            .map_err(|e| http::transport(PROVIDER, e))?;
        parse_report(http::json_body(PROVIDER, response)?)
    }
}
