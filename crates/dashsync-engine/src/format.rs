//! Text rendering shared by the reconcilers: durations, tracking URLs, HTML snippets.

use thiserror::Error;
use url::Url;
use url::form_urlencoded::Serializer;

pub const NOT_FOUND: &str = "Not Found";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    #[error("link must end with `/` before campaign parameters are appended")]
    MissingTrailingSlash,
    #[error("campaign parameter `{0}` contains a space")]
    SpaceInParameter(String),
    #[error("{0}")]
    Parse(#[from] url::ParseError),
    #[error("url has no host")]
    NoHost,
}

/// Whole seconds as `M:SS`.
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Duration from a provider's decimal seconds string (`"93.52"`).
pub fn format_duration_str(raw: &str) -> Option<String> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .map(|secs| format_duration(secs.trunc() as i64))
}

/// Append `utm_*` campaign parameters to `url`.
pub fn google_url(url: &str, source: &str, medium: &str, campaign: &str) -> Result<String, UrlError> {
    if !url.ends_with('/') {
        return Err(UrlError::MissingTrailingSlash);
    }
    for param in [source, medium, campaign] {
        if param.contains(' ') {
            return Err(UrlError::SpaceInParameter(param.to_string()));
        }
    }
    let query = Serializer::new(String::new())
        .append_pair("utm_source", source)
        .append_pair("utm_medium", medium)
        .append_pair("utm_campaign", campaign)
        .finish();
    Ok(format!("{url}?{query}"))
}

/// The URL Mailchimp reports clicks under for one send of a newsletter.
pub fn tracked_click_url(google_url: &str, campaign_id: &str) -> String {
    let sep = if google_url.contains('?') { '&' } else { '?' };
    format!("{google_url}{sep}mc_cid={campaign_id}&mc_eid=[UNIQID]")
}

/// Path component of an absolute URL.
pub fn url_path(url: &str) -> Result<String, UrlError> {
    Ok(Url::parse(url)?.path().to_string())
}

/// Campaign name for a blog article: `name/author`, spaces as underscores.
pub fn article_campaign(name: &str, author: &str) -> String {
    format!("{name}/{author}").replace(' ', "_")
}

/// Links to the account's own site carry the newsletter's campaign name.
pub fn is_account_domain(link: &str, website_name: &str) -> bool {
    link.to_lowercase().contains(&website_name.to_lowercase())
}

/// Newsletter block pasted into the Mailchimp editor.
pub fn encode_html(link: &str, header: &str, text: &str) -> Result<String, UrlError> {
    let parsed = Url::parse(link)?;
    let host = parsed.host_str().ok_or(UrlError::NoHost)?;
    let netloc = match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    Ok(format!(
        "<h3><a href=\"{link}\" target=\"_blank\">{header}</a></h3>\
         <p>{text}</p>\
         <span style=\"font-size:12px\"><em><a href=\"{scheme}://{netloc}\" target=\"_blank\">{netloc}</a></em></span><br />&nbsp;",
        text = escape_html(text),
        scheme = parsed.scheme(),
    ))
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations() {
        assert_eq!(format_duration(90), "1:30");
        assert_eq!(format_duration(59), "0:59");
        assert_eq!(format_duration(61), "1:01");
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration_str("125.9").as_deref(), Some("2:05"));
        assert_eq!(format_duration_str("n/a"), None);
    }

    #[test]
    fn google_urls_are_form_encoded() {
        assert_eq!(
            google_url("https://intellitect.com/blog/", "newsletter", "email", "Spring-2016").unwrap(),
            "https://intellitect.com/blog/?utm_source=newsletter&utm_medium=email&utm_campaign=Spring-2016"
        );
        assert_eq!(
            google_url("https://x.com/", "blog", "social", &article_campaign("Hello World", "Ann Lee"))
                .unwrap(),
            "https://x.com/?utm_source=blog&utm_medium=social&utm_campaign=Hello_World%2FAnn_Lee"
        );
    }

    #[test]
    fn google_url_rejects_bad_input() {
        assert_eq!(
            google_url("https://x.com/page", "a", "b", "c"),
            Err(UrlError::MissingTrailingSlash)
        );
        assert_eq!(
            google_url("https://x.com/", "a b", "b", "c"),
            Err(UrlError::SpaceInParameter("a b".into()))
        );
    }

    #[test]
    fn tracked_urls_and_paths() {
        assert_eq!(
            tracked_click_url("https://x.com/?utm_source=n", "abc123"),
            "https://x.com/?utm_source=n&mc_cid=abc123&mc_eid=[UNIQID]"
        );
        assert_eq!(
            tracked_click_url("https://x.com/", "abc123"),
            "https://x.com/?mc_cid=abc123&mc_eid=[UNIQID]"
        );
        assert_eq!(url_path("https://x.com/blog/post/?q=1").unwrap(), "/blog/post/");
        assert!(url_path("not a url").is_err());
    }

    #[test]
    fn html_snippet_escapes_text_only() {
        let html = encode_html("https://intellitect.com/post/", "Read <this>", "Tom & \"Jerry\"").unwrap();
        assert_eq!(
            html,
            "<h3><a href=\"https://intellitect.com/post/\" target=\"_blank\">Read <this></a></h3>\
             <p>Tom &amp; &quot;Jerry&quot;</p>\
             <span style=\"font-size:12px\"><em><a href=\"https://intellitect.com\" target=\"_blank\">intellitect.com</a></em></span><br />&nbsp;"
        );
    }

    #[test]
    fn domain_classifier_ignores_case() {
        assert!(is_account_domain("https://IntelliTect.com/post/", "intellitect.com"));
        assert!(!is_account_domain("https://example.org/", "intellitect.com"));
    }
}
