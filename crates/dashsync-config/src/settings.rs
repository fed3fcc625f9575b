use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ConfigError;
use crate::validation::{ConfigIssue, ValidationError};

static PROFILE_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]+$").expect("profile id pattern must compile"));

/// Root of a dashsync settings file.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[schemars(
    title = "dashsync settings",
    description = "Accounts whose dashboard workbooks are reconciled against analytics, link-shortener and email-campaign providers."
)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Accounts processed in declaration order.
    pub accounts: Vec<Account>,
}

/// One organisation with its own dashboard workbook.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Account {
    pub name: String,
    /// Dashboard workbook (`.xlsx` or `.json`). Relative paths resolve against the settings file.
    pub workbook: PathBuf,
    #[serde(default)]
    pub analytics: Option<AnalyticsCredentials>,
    #[serde(default)]
    pub bitly: Option<BitlyCredentials>,
    #[serde(default)]
    pub mailchimp: Option<MailchimpCredentials>,
    /// Websites tracked by this account. The first one owns campaign and blog statistics.
    pub websites: Vec<Website>,
    #[serde(default)]
    pub newsletter: NewsletterSettings,
    #[serde(default)]
    pub blog: BlogSettings,
    /// Sheets to reconcile; all of them when omitted.
    #[serde(default = "SheetKind::all")]
    pub sheets: Vec<SheetKind>,
}

impl Account {
    /// Website whose analytics profile backs campaign, newsletter and blog sheets.
    pub fn primary_website(&self) -> Option<&Website> {
        self.websites.first()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Website {
    /// Domain-like name; also the name of the website's analytics sheet.
    pub name: String,
    /// Google Analytics view (profile) id, digits only.
    pub analytics_profile_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct AnalyticsCredentials {
    /// OAuth2 bearer token with `analytics.readonly` scope.
    pub access_token: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct BitlyCredentials {
    #[serde(default)]
    pub access_token: Option<String>,
    /// Used to obtain a token through HTTP basic auth when `access_token` is absent.
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct MailchimpCredentials {
    /// API key of the form `<key>-<datacenter>`.
    pub api_key: String,
}

impl MailchimpCredentials {
    /// Datacenter suffix of the key (`us4` in `abc123-us4`).
    pub fn datacenter(&self) -> Option<&str> {
        let mut parts = self.api_key.split('-');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(key), Some(dc), None) if !key.is_empty() && !dc.is_empty() => Some(dc),
            _ => None,
        }
    }
}

/// Campaign tagging applied to newsletter links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct NewsletterSettings {
    #[serde(default = "default_newsletter_source")]
    pub source: String,
    #[serde(default = "default_newsletter_medium")]
    pub medium: String,
}

fn default_newsletter_source() -> String {
    "newsletter".to_string()
}

fn default_newsletter_medium() -> String {
    "email".to_string()
}

impl Default for NewsletterSettings {
    fn default() -> Self {
        Self {
            source: default_newsletter_source(),
            medium: default_newsletter_medium(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct BlogSettings {
    /// Length of the observation window behind `(window)` blog columns.
    #[serde(default = "default_window_days")]
    pub window_days: u32,
}

fn default_window_days() -> u32 {
    30
}

impl Default for BlogSettings {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
        }
    }
}

/// Kinds of sheet a dashboard workbook can carry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum SheetKind {
    /// One analytics sheet per website, named after the website.
    Website,
    Campaigns,
    Newsletters,
    NewsletterLinks,
    BlogArticles,
}

impl SheetKind {
    pub const ALL: [SheetKind; 5] = [
        SheetKind::Website,
        SheetKind::Campaigns,
        SheetKind::Newsletters,
        SheetKind::NewsletterLinks,
        SheetKind::BlogArticles,
    ];

    pub fn all() -> Vec<SheetKind> {
        Self::ALL.to_vec()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SheetKind::Website => "website",
            SheetKind::Campaigns => "campaigns",
            SheetKind::Newsletters => "newsletters",
            SheetKind::NewsletterLinks => "newsletter_links",
            SheetKind::BlogArticles => "blog_articles",
        }
    }

    /// Worksheet name for kinds with a fixed sheet; website sheets are named per website.
    pub fn sheet_name(self) -> Option<&'static str> {
        match self {
            SheetKind::Website => None,
            other => Some(other.as_str()),
        }
    }
}

impl fmt::Display for SheetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SheetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SheetKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<_> = SheetKind::ALL.iter().map(|k| k.as_str()).collect();
                format!("unknown sheet kind `{s}` (expected one of {})", known.join(", "))
            })
    }
}

impl Settings {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load a settings file, picking the format from its extension (`.json`, else YAML).
    ///
    /// Relative workbook paths are resolved against the file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        let mut settings = if is_json {
            Self::from_json_str(&text)?
        } else {
            Self::from_yaml_str(&text)?
        };
        if let Some(base) = path.parent() {
            settings.resolve_paths(base);
        }
        Ok(settings)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    pub fn resolve_paths(&mut self, base: &Path) {
        for account in &mut self.accounts {
            if account.workbook.is_relative() {
                account.workbook = base.join(&account.workbook);
            }
        }
    }

    pub fn account(&self, name: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.name == name)
    }

    /// Validate the settings and return granular issues when invariants fail.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.accounts.is_empty() {
            issues.push(ConfigIssue::new("accounts", "at least one account is required"));
        }

        let mut seen_names = BTreeSet::new();
        for (idx, account) in self.accounts.iter().enumerate() {
            let at = format!("accounts[{idx}]");

            if account.name.trim().is_empty() {
                issues.push(ConfigIssue::new(format!("{at}.name"), "account name is empty"));
            } else if !seen_names.insert(account.name.as_str()) {
                issues.push(ConfigIssue::new(
                    format!("{at}.name"),
                    format!("duplicate account name `{}`", account.name),
                ));
            }

            if account.workbook.as_os_str().is_empty() {
                issues.push(ConfigIssue::new(format!("{at}.workbook"), "workbook path is empty"));
            }

            if account.websites.is_empty() {
                issues.push(ConfigIssue::new(
                    format!("{at}.websites"),
                    "at least one website is required",
                ));
            }
            for (w, website) in account.websites.iter().enumerate() {
                if website.name.trim().is_empty() {
                    issues.push(ConfigIssue::new(
                        format!("{at}.websites[{w}].name"),
                        "website name is empty",
                    ));
                }
                if !PROFILE_ID.is_match(&website.analytics_profile_id) {
                    issues.push(ConfigIssue::new(
                        format!("{at}.websites[{w}].analytics_profile_id"),
                        format!(
                            "profile id `{}` must contain digits only",
                            website.analytics_profile_id
                        ),
                    ));
                }
            }

            if let Some(analytics) = &account.analytics {
                if analytics.access_token.trim().is_empty() {
                    issues.push(ConfigIssue::new(
                        format!("{at}.analytics.access_token"),
                        "access token is empty",
                    ));
                }
            }

            if let Some(bitly) = &account.bitly {
                let has_token = bitly.access_token.as_deref().is_some_and(|t| !t.is_empty());
                let has_login = bitly.username.as_deref().is_some_and(|u| !u.is_empty())
                    && bitly.password.as_deref().is_some_and(|p| !p.is_empty());
                if !has_token && !has_login {
                    issues.push(ConfigIssue::new(
                        format!("{at}.bitly"),
                        "either access_token or username and password is required",
                    ));
                }
            }

            if let Some(mailchimp) = &account.mailchimp {
                if mailchimp.datacenter().is_none() {
                    issues.push(ConfigIssue::new(
                        format!("{at}.mailchimp.api_key"),
                        "api key must look like `<key>-<datacenter>`",
                    ));
                }
            }

            for field in [&account.newsletter.source, &account.newsletter.medium] {
                if field.is_empty() || field.contains(' ') {
                    issues.push(ConfigIssue::new(
                        format!("{at}.newsletter"),
                        format!("`{field}` must be non-empty and contain no spaces"),
                    ));
                }
            }

            if account.blog.window_days == 0 {
                issues.push(ConfigIssue::new(
                    format!("{at}.blog.window_days"),
                    "window must span at least one day",
                ));
            }

            let mut seen_sheets = BTreeSet::new();
            for (s, kind) in account.sheets.iter().enumerate() {
                if !seen_sheets.insert(*kind) {
                    issues.push(ConfigIssue::new(
                        format!("{at}.sheets[{s}]"),
                        format!("sheet `{kind}` listed more than once"),
                    ));
                }
            }
            let mut missing: Vec<(&str, Vec<&str>)> = Vec::new();
            for kind in &account.sheets {
                for &provider in required_providers(*kind) {
                    let present = match provider {
                        "analytics" => account.analytics.is_some(),
                        "bitly" => account.bitly.is_some(),
                        _ => account.mailchimp.is_some(),
                    };
                    if present {
                        continue;
                    }
                    match missing.iter_mut().find(|(p, _)| *p == provider) {
                        Some((_, kinds)) => kinds.push(kind.as_str()),
                        None => missing.push((provider, vec![kind.as_str()])),
                    }
                }
            }
            for (provider, kinds) in missing {
                issues.push(ConfigIssue::new(
                    format!("{at}.{provider}"),
                    format!("{provider} credentials are required by: {}", kinds.join(", ")),
                ));
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(issues))
        }
    }
}

/// Provider credentials a sheet kind cannot be reconciled without.
pub fn required_providers(kind: SheetKind) -> &'static [&'static str] {
    match kind {
        SheetKind::Website => &["analytics"],
        SheetKind::Campaigns => &["analytics", "bitly", "mailchimp"],
        SheetKind::Newsletters | SheetKind::NewsletterLinks => &["mailchimp"],
        SheetKind::BlogArticles => &["analytics", "bitly"],
    }
}
