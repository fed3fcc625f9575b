//! Mailchimp Marketing API 3.0, campaigns and reports.

use dashsync_config::MailchimpCredentials;
use dashsync_engine::{CampaignEmail, ClickDetails, ClickRecord, ProviderError};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::http;

const PROVIDER: &str = "mailchimp";

/// Campaign fields requested for a single campaign.
pub const CAMPAIGN_FIELDS: &str = "id,emails_sent,send_time,recipients.list_id,settings.title,\
settings.from_name,settings.subject_line,report_summary,variate_settings";

const CLICK_EXCLUDE_FIELDS: &str = "urls_clicked._links,urls_clicked.last_click";
const CLICK_PAGE_SIZE: usize = 100;

pub struct Mailchimp {
    client: Client,
    api_key: String,
    api_root: String,
}

/// `https://<dc>.api.mailchimp.com/3.0/` for a key ending in `-<dc>`.
pub fn api_root(credentials: &MailchimpCredentials) -> Result<String, ProviderError> {
    let datacenter = credentials.datacenter().ok_or_else(|| ProviderError::Auth {
        provider: PROVIDER,
        message: "API key must look like `<key>-<datacenter>`".into(),
    })?;
    Ok(format!("https://{datacenter}.api.mailchimp.com/3.0/"))
}

impl Mailchimp {
    pub fn new(credentials: &MailchimpCredentials) -> Result<Self, ProviderError> {
        Ok(Self {
            api_root: api_root(credentials)?,
            client: http::client(PROVIDER)?,
            api_key: credentials.api_key.clone(),
        })
    }

    pub fn with_api_root(mut self, api_root: impl Into<String>) -> Self {
        self.api_root = api_root.into();
        self
    }

    fn get(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Value, ProviderError> {
        debug!(endpoint, "GET mailchimp");
        let response = self
            .client
            .get(format!("{}{}", self.api_root, endpoint))
            .basic_auth("apikey", Some(&self.api_key))
            .query(params)
            .send()
            .map_err(|e| http::transport(PROVIDER, e))?;
        http::json_body(PROVIDER, response)
    }
}

/// Campaign ids are interpolated into the request path.
fn checked_id(campaign_id: &str) -> Result<&str, ProviderError> {
    let id = campaign_id.trim();
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(ProviderError::Rejected {
            provider: PROVIDER,
            message: format!("`{campaign_id}` is not a campaign id"),
        });
    }
    Ok(id)
}

#[derive(Debug, Deserialize)]
struct ClickPage {
    campaign_id: String,
    #[serde(default)]
    urls_clicked: Vec<ClickRecord>,
    #[serde(default)]
    total_items: usize,
}

fn parse_click_page(body: Value) -> Result<ClickPage, ProviderError> {
    serde_json::from_value(body).map_err(|e| http::decode(PROVIDER, e))
}

impl CampaignEmail for Mailchimp {
    fn get_campaign(&mut self, campaign_id: &str) -> Result<Value, ProviderError> {
        let id = checked_id(campaign_id)?;
        self.get(&format!("campaigns/{id}/"), &[("fields", CAMPAIGN_FIELDS)])
    }

    fn get_campaign_report(&mut self, campaign_id: &str) -> Result<Value, ProviderError> {
        let id = checked_id(campaign_id)?;
        self.get(&format!("reports/{id}/"), &[])
    }

    /// All clicked URLs of the campaign, one page of 100 at a time.
    fn get_campaign_click_details(&mut self, campaign_id: &str) -> Result<ClickDetails, ProviderError> {
        let id = checked_id(campaign_id)?;
        let endpoint = format!("reports/{id}/click-details/");
        let count = CLICK_PAGE_SIZE.to_string();
        let mut details = ClickDetails::default();
        loop {
            let offset = details.urls_clicked.len().to_string();
            let page = parse_click_page(self.get(
                &endpoint,
                &[
                    ("exclude_fields", CLICK_EXCLUDE_FIELDS),
                    ("count", count.as_str()),
                    ("offset", offset.as_str()),
                ],
            )?)?;
            let fetched = page.urls_clicked.len();
            details.campaign_id = page.campaign_id;
            details.urls_clicked.extend(page.urls_clicked);
            if fetched == 0 || details.urls_clicked.len() >= page.total_items {
                return Ok(details);
            }
        }
    }
}
