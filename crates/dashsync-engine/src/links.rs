//! Merge raw click records into one record per tracked destination.

use rustc_hash::FxHashMap;

use crate::format::tracked_click_url;
use crate::providers::{ClickDetails, ClickRecord};

/// Click records of one newsletter send, keyed by tracked URL.
#[derive(Debug, Clone, Default)]
pub struct MergedClicks {
    campaign_id: String,
    records: Vec<ClickRecord>,
    index: FxHashMap<String, usize>,
}

impl MergedClicks {
    /// Canonicalise each URL to `destination&mc_cid=<id>&mc_eid=[UNIQID]` and
    /// fold duplicates into the first occurrence.
    ///
    /// Percentages are shares of the same send, so they are summed as-is.
    pub fn merge(details: ClickDetails) -> Self {
        let mut merged = MergedClicks {
            campaign_id: details.campaign_id,
            ..Default::default()
        };
        for mut record in details.urls_clicked {
            let key = tracked_click_url(destination(&record.url), &merged.campaign_id);
            match merged.index.get(&key) {
                Some(&i) => {
                    let first = &mut merged.records[i];
                    first.total_clicks += record.total_clicks;
                    first.unique_clicks += record.unique_clicks;
                    first.click_percentage += record.click_percentage;
                    first.unique_click_percentage += record.unique_click_percentage;
                }
                None => {
                    record.url = key.clone();
                    merged.index.insert(key, merged.records.len());
                    merged.records.push(record);
                }
            }
        }
        merged
    }

    pub fn campaign_id(&self) -> &str {
        &self.campaign_id
    }

    pub fn get(&self, tracked_url: &str) -> Option<&ClickRecord> {
        self.index.get(tracked_url).map(|&i| &self.records[i])
    }

    /// Record for a link whose Google URL is `google_url`.
    pub fn lookup(&self, google_url: &str) -> Option<&ClickRecord> {
        self.get(&tracked_click_url(google_url, &self.campaign_id))
    }

    pub fn records(&self) -> &[ClickRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// `url` without its Mailchimp tracking parameters.
fn destination(url: &str) -> &str {
    for marker in ["&mc_cid=", "?mc_cid="] {
        if let Some(pos) = url.find(marker) {
            return &url[..pos];
        }
    }
    url
}
