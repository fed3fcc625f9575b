//! HTTP clients behind the engine's provider traits.
//!
//! [`AccountClients::connect`] builds one client per credential block of an
//! account; [`AccountClients::providers`] lends them to a sync run. Sheets
//! that need a provider the account has no credentials for fail with
//! `MissingProvider` when they reach their first cell needing it.

pub mod analytics;
pub mod bitly;
mod http;
pub mod mailchimp;

use dashsync_config::Account;
use dashsync_engine::{AnalyticsProvider, CampaignEmail, LinkShortener, ProviderError, Providers};

pub use analytics::GoogleAnalytics;
pub use bitly::Bitly;
pub use mailchimp::Mailchimp;

#[derive(Default)]
pub struct AccountClients {
    pub analytics: Option<GoogleAnalytics>,
    pub links: Option<Bitly>,
    pub email: Option<Mailchimp>,
}

impl AccountClients {
    pub fn connect(account: &Account) -> Result<Self, ProviderError> {
        let clients = Self {
            analytics: account.analytics.as_ref().map(GoogleAnalytics::new).transpose()?,
            links: account.bitly.as_ref().map(Bitly::new).transpose()?,
            email: account.mailchimp.as_ref().map(Mailchimp::new).transpose()?,
        };
        tracing::debug!(
            account = %account.name,
            analytics = clients.analytics.is_some(),
            bitly = clients.links.is_some(),
            mailchimp = clients.email.is_some(),
            "provider clients ready"
        );
        Ok(clients)
    }

    pub fn providers(&mut self) -> Providers<'_> {
        Providers {
            analytics: self.analytics.as_mut().map(|c| c as &mut dyn AnalyticsProvider),
            links: self.links.as_mut().map(|c| c as &mut dyn LinkShortener),
            email: self.email.as_mut().map(|c| c as &mut dyn CampaignEmail),
        }
    }
}
