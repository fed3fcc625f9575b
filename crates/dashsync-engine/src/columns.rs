//! Column semantics: what a header label means for the cells below it.

use chrono::NaiveDate;
use dashsync_io::{Sheet, cell_ref};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ReconcileError;
use crate::path::{FieldPath, PathTooDeep};
use crate::policy::{FillMode, Window};

static SPAN_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?P<name>.*?)\s*\((?P<span>at|window|[0-9]+d)\)$")
        .expect("span suffix pattern must compile")
});

/// Page statistics exposed as `ga:<metric> (<span>)` columns.
pub const PAGE_METRICS: [&str; 7] = [
    "ga:visits",
    "ga:pageViews",
    "ga:uniquePageViews",
    "ga:newUsers",
    "ga:bounceRate",
    "ga:avgTimeOnPage",
    "ga:entrances",
];

/// Period a statistic column aggregates over, relative to its row's start date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Span {
    /// `(at)`: start .. today, refreshed every run.
    AllTime,
    /// `(window)`: the row's own duration (campaigns) or the configured blog window.
    Window,
    /// `(<N>d)`: start .. start + N days.
    Days(u32),
}

impl Span {
    fn parse(token: &str) -> Option<Self> {
        let token = token.to_ascii_lowercase();
        match token.as_str() {
            "at" => Some(Span::AllTime),
            "window" => Some(Span::Window),
            days => days.strip_suffix('d')?.parse().ok().map(Span::Days),
        }
    }

    pub fn window(self, start: NaiveDate, window_days: u32, today: NaiveDate) -> Window {
        match self {
            Span::AllTime => Window::until(start, today),
            Span::Window => Window::days_from(start, window_days),
            Span::Days(n) => Window::days_from(start, n),
        }
    }

    pub fn fill_mode(self) -> FillMode {
        match self {
            Span::AllTime => FillMode::Live,
            _ => FillMode::Once,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStat {
    Metric(&'static str),
    SourceUniquePageViews,
    TopSource,
    SecondSource,
}

/// Closed set of cell rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRule {
    /// Path into the campaign document.
    CampaignField(FieldPath),
    /// `report/<path>`: path into the campaign report.
    ReportField(FieldPath),
    /// `a/b tested`
    AbTested,

    /// `total_clicks` of a short link.
    TotalClicks,
    /// `target_url` a short link expands to.
    TargetUrl,
    /// `Bitly Total Clicks (<span>)`
    BitlyClicks(Span),

    Page { stat: PageStat, span: Span },
    /// `campaign total users (<span>)` / `campaign new users (<span>)`
    CampaignUsers { new_users: bool, span: Span },

    NewsletterId,
    Link,
    Header,
    Text,
    GoogleUrl,
    HeaderChars,
    TextChars,
    MailchimpHtml,
    IsDomain,
    /// `mailchimp/<field>` of the link's merged click record.
    LinkClicks(&'static str),

    Name,
    Author,
    Date,
    Url,
    Source,
    Medium,
    Campaign,
    ShortLink,

    /// Documented column that is maintained by hand.
    Passive,
}

/// Label vocabularies, one per kind of row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleSet {
    Bitly,
    Mailchimp,
    Analytics,
    Newsletters,
    NewsletterLinks,
    BlogArticles,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelError {
    Unknown,
    TooDeep(PathTooDeep),
}

impl From<PathTooDeep> for LabelError {
    fn from(e: PathTooDeep) -> Self {
        LabelError::TooDeep(e)
    }
}

impl ColumnRule {
    pub fn parse(set: RuleSet, label: &str) -> Result<Self, LabelError> {
        let label = label.trim();
        match set {
            RuleSet::Bitly => match label {
                "total_clicks" => Ok(ColumnRule::TotalClicks),
                "target_url" => Ok(ColumnRule::TargetUrl),
                _ => Err(LabelError::Unknown),
            },
            RuleSet::Mailchimp | RuleSet::Newsletters => parse_campaign_field(label),
            RuleSet::Analytics => parse_page(label).ok_or(LabelError::Unknown),
            RuleSet::NewsletterLinks => parse_link_column(label),
            RuleSet::BlogArticles => parse_article_column(label).ok_or(LabelError::Unknown),
        }
    }

    pub fn fill_mode(&self) -> FillMode {
        match self {
            ColumnRule::Page { span, .. }
            | ColumnRule::CampaignUsers { span, .. }
            | ColumnRule::BitlyClicks(span) => span.fill_mode(),
            ColumnRule::TotalClicks
            | ColumnRule::TargetUrl
            | ColumnRule::IsDomain
            | ColumnRule::LinkClicks(_) => FillMode::Live,
            _ => FillMode::Once,
        }
    }

    /// Cells of this column are read by other rules and never written.
    pub fn is_input(&self) -> bool {
        matches!(
            self,
            ColumnRule::NewsletterId
                | ColumnRule::Header
                | ColumnRule::Text
                | ColumnRule::Name
                | ColumnRule::Author
                | ColumnRule::Date
                | ColumnRule::Url
                | ColumnRule::Source
                | ColumnRule::Medium
                | ColumnRule::Passive
        )
    }
}

fn parse_campaign_field(label: &str) -> Result<ColumnRule, LabelError> {
    if label.eq_ignore_ascii_case("a/b tested") {
        return Ok(ColumnRule::AbTested);
    }
    if let Some(rest) = label.strip_prefix("report/") {
        return Ok(ColumnRule::ReportField(FieldPath::parse(rest)?));
    }
    if label.is_empty() {
        return Err(LabelError::Unknown);
    }
    Ok(ColumnRule::CampaignField(FieldPath::parse(label)?))
}

/// Split `name (span)`; labels without a suffix get `default`.
fn split_span(label: &str, default: Option<Span>) -> Option<(&str, Span)> {
    match SPAN_SUFFIX.captures(label) {
        Some(caps) => {
            let name = caps.name("name")?.as_str();
            let span = Span::parse(caps.name("span")?.as_str())?;
            Some((name, span))
        }
        None => default.map(|span| (label, span)),
    }
}

fn parse_page(label: &str) -> Option<ColumnRule> {
    let (name, span) = split_span(label, Some(Span::AllTime))?;
    let stat = if name.eq_ignore_ascii_case("Top Source") {
        PageStat::TopSource
    } else if name.eq_ignore_ascii_case("Second Source") {
        PageStat::SecondSource
    } else if SPAN_SUFFIX.is_match(label) {
        if name.eq_ignore_ascii_case("Source Unique Page Views") {
            PageStat::SourceUniquePageViews
        } else {
            let metric = PAGE_METRICS
                .iter()
                .find(|m| m.eq_ignore_ascii_case(name))?;
            PageStat::Metric(*metric)
        }
    } else {
        return None;
    };
    Some(ColumnRule::Page { stat, span })
}

fn parse_link_column(label: &str) -> Result<ColumnRule, LabelError> {
    if let Some(field) = label.strip_prefix("mailchimp/") {
        return crate::providers::ClickRecord::FIELDS
            .iter()
            .find(|f| **f == field)
            .map(|f| ColumnRule::LinkClicks(*f))
            .ok_or(LabelError::Unknown);
    }
    Ok(match label {
        "newsletter_campaign_id" => ColumnRule::NewsletterId,
        "link" => ColumnRule::Link,
        "header" => ColumnRule::Header,
        "text" => ColumnRule::Text,
        "google_url" => ColumnRule::GoogleUrl,
        "header_num_chars" => ColumnRule::HeaderChars,
        "text_num_chars" => ColumnRule::TextChars,
        "mailchimp_html" => ColumnRule::MailchimpHtml,
        "is_domain" => ColumnRule::IsDomain,
        _ => return Err(LabelError::Unknown),
    })
}

fn parse_article_column(label: &str) -> Option<ColumnRule> {
    let simple = match label {
        "name" => Some(ColumnRule::Name),
        "author" => Some(ColumnRule::Author),
        "date" => Some(ColumnRule::Date),
        "url" => Some(ColumnRule::Url),
        "source" => Some(ColumnRule::Source),
        "medium" => Some(ColumnRule::Medium),
        "campaign" => Some(ColumnRule::Campaign),
        "Google Url" => Some(ColumnRule::GoogleUrl),
        "bitly" => Some(ColumnRule::ShortLink),
        _ => None,
    };
    if simple.is_some() {
        return simple;
    }
    if let Some((name, span)) = split_span(label, None) {
        let lower = name.to_ascii_lowercase();
        match lower.as_str() {
            "campaign total users" => return Some(ColumnRule::CampaignUsers { new_users: false, span }),
            "campaign new users" => return Some(ColumnRule::CampaignUsers { new_users: true, span }),
            "bitly total clicks" => return Some(ColumnRule::BitlyClicks(span)),
            "bitly facebook" | "bitly twitter" | "bitly linkedin" => return Some(ColumnRule::Passive),
            _ => {}
        }
    }
    parse_page(label)
}

/// A header cell resolved to its rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundColumn {
    pub col: u32,
    pub label: String,
    pub rule: ColumnRule,
}

/// Bind every non-blank header of `row` from column `first_col` on.
pub fn bind_headers(
    sheet: &Sheet,
    row: u32,
    first_col: u32,
    set: RuleSet,
) -> Result<Vec<BoundColumn>, ReconcileError> {
    let mut bound = Vec::new();
    for col in first_col..=sheet.max_col() {
        let Some(label) = sheet.text(row, col) else {
            continue;
        };
        let rule = ColumnRule::parse(set, &label).map_err(|e| match e {
            LabelError::Unknown => ReconcileError::UnknownColumn {
                sheet: sheet.name().to_string(),
                cell: cell_ref(row, col),
                label: label.clone(),
            },
            LabelError::TooDeep(_) => ReconcileError::PathTooDeep {
                sheet: sheet.name().to_string(),
                cell: cell_ref(row, col),
                path: label.clone(),
            },
        })?;
        bound.push(BoundColumn { col, label, rule });
    }
    Ok(bound)
}
