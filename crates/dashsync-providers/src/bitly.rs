//! Bitly v3 link API.
//!
//! Every v3 response is wrapped in an envelope carrying its own
//! `status_code`; a transport-level 200 can still be a failed call.

use dashsync_config::BitlyCredentials;
use dashsync_engine::{LinkShortener, ProviderError};
use reqwest::blocking::Client;
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use crate::http;

const PROVIDER: &str = "bitly";
pub const API_ROOT: &str = "https://api-ssl.bitly.com";

/// Envelope status of `link_save` when the account already owns a link for the URL.
const LINK_ALREADY_EXISTS: i64 = 304;

pub struct Bitly {
    client: Client,
    access_token: String,
    api_root: String,
    request_count: u64,
}

impl Bitly {
    /// Uses the configured token, or logs in with username and password.
    pub fn new(credentials: &BitlyCredentials) -> Result<Self, ProviderError> {
        let client = http::client(PROVIDER)?;
        let access_token = match credentials {
            BitlyCredentials {
                access_token: Some(token),
                ..
            } => token.clone(),
            BitlyCredentials {
                username: Some(username),
                password: Some(password),
                ..
            } => login(&client, API_ROOT, username, password)?,
            _ => {
                return Err(ProviderError::Auth {
                    provider: PROVIDER,
                    message: "no access token and no username/password to obtain one".into(),
                });
            }
        };
        Ok(Self {
            client,
            access_token,
            api_root: API_ROOT.to_string(),
            request_count: 0,
        })
    }

    pub fn with_api_root(mut self, api_root: impl Into<String>) -> Self {
        self.api_root = api_root.into();
        self
    }

    /// Requests issued so far.
    pub fn request_count(&self) -> u64 {
        self.request_count
    }

    /// GET `path` and unwrap the envelope's `data`.
    fn get(&mut self, path: &str, args: &[(&str, &str)], tolerated: Option<i64>) -> Result<Value, ProviderError> {
        debug!(path, "GET bitly");
        self.request_count += 1;
        let response = self
            .client
            .get(format!("{}{}", self.api_root, path))
            .query(args)
            .query(&[("access_token", self.access_token.as_str())])
            .send()
            .map_err(|e| http::transport(PROVIDER, e))?;
        open_envelope(http::json_body(PROVIDER, response)?, tolerated)
    }
}

fn login(client: &Client, api_root: &str, username: &str, password: &str) -> Result<String, ProviderError> {
    info!(username, "logging in to bitly with HTTP basic auth");
    let response = client
        .post(format!("{api_root}/oauth/access_token"))
        .basic_auth(username, Some(password))
        .form(&[("format", "json")])
        .send()
        .map_err(|e| http::transport(PROVIDER, e))?;
    let status = response.status();
    let body = response.text().map_err(|e| http::transport(PROVIDER, e))?;
    http::check_status(PROVIDER, status, &body)?;
    token_from_login(&body)
}

/// The token endpoint answers with the bare token, or with an envelope on failure.
fn token_from_login(body: &str) -> Result<String, ProviderError> {
    let token = body.trim();
    if token.starts_with('{') {
        let envelope: Value = serde_json::from_str(token).map_err(|e| http::decode(PROVIDER, e))?;
        let message = envelope
            .get("status_txt")
            .and_then(Value::as_str)
            .unwrap_or("login refused");
        return Err(ProviderError::Auth {
            provider: PROVIDER,
            message: message.to_string(),
        });
    }
    if token.is_empty() {
        return Err(ProviderError::Auth {
            provider: PROVIDER,
            message: "empty access token".into(),
        });
    }
    Ok(token.to_string())
}

/// `data` of a v3 envelope whose `status_code` is 200 (or `tolerated`).
pub fn open_envelope(mut envelope: Value, tolerated: Option<i64>) -> Result<Value, ProviderError> {
    let code = envelope
        .get("status_code")
        .and_then(Value::as_i64)
        .ok_or_else(|| http::decode(PROVIDER, "response has no status_code"))?;
    if code != 200 && Some(code) != tolerated {
        let message = envelope
            .get("status_txt")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if message.contains("ACCESS_TOKEN") {
            return Err(ProviderError::Auth {
                provider: PROVIDER,
                message,
            });
        }
        return Err(ProviderError::Api {
            provider: PROVIDER,
            code,
            message,
        });
    }
    Ok(envelope.get_mut("data").map(Value::take).unwrap_or(Value::Null))
}

/// Bitly refuses long URLs whose query does not follow a `/`
/// (`http://example.com/?q=1`, never `http://example.com?q=1`).
pub fn validate_long_url(long_url: &str) -> Result<(), ProviderError> {
    let rejected = |message: String| ProviderError::Rejected {
        provider: PROVIDER,
        message,
    };
    Url::parse(long_url).map_err(|e| rejected(format!("`{long_url}` is not a URL: {e}")))?;
    match long_url.split_once('?') {
        Some((before, _)) if !before.ends_with('/') => Err(rejected(format!(
            "`{long_url}` needs a slash between the domain or path and the query"
        ))),
        _ => Ok(()),
    }
}

fn field<'v>(data: &'v Value, pointer: &str) -> Result<&'v Value, ProviderError> {
    data.pointer(pointer)
        .ok_or_else(|| http::decode(PROVIDER, format!("response has no `{pointer}`")))
}

fn link_clicks(data: &Value) -> Result<i64, ProviderError> {
    field(data, "/link_clicks")?
        .as_i64()
        .ok_or_else(|| http::decode(PROVIDER, "link_clicks is not an integer"))
}

fn expanded_url(data: &Value) -> Result<String, ProviderError> {
    let entry = field(data, "/expand/0")?;
    if let Some(error) = entry.get("error") {
        return Err(ProviderError::Rejected {
            provider: PROVIDER,
            message: error.as_str().unwrap_or("expand failed").to_string(),
        });
    }
    text(field(entry, "/long_url")?)
}

fn saved_link(data: &Value) -> Result<String, ProviderError> {
    text(field(data, "/link_save/link")?)
}

fn text(value: &Value) -> Result<String, ProviderError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| http::decode(PROVIDER, format!("expected a string, got {value}")))
}

impl LinkShortener for Bitly {
    fn total_clicks(&mut self, short_url: &str) -> Result<i64, ProviderError> {
        let data = self.get(
            "/v3/link/clicks",
            &[("link", short_url), ("rollup", "true"), ("units", "-1")],
            None,
        )?;
        link_clicks(&data)
    }

    fn target_url(&mut self, short_url: &str) -> Result<String, ProviderError> {
        let data = self.get("/v3/expand", &[("shortUrl", short_url)], None)?;
        expanded_url(&data)
    }

    fn create_or_get(&mut self, long_url: &str) -> Result<String, ProviderError> {
        validate_long_url(long_url)?;
        let data = self.get(
            "/v3/user/link_save",
            &[("longUrl", long_url)],
            Some(LINK_ALREADY_EXISTS),
        )?;
        saved_link(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelopes_yield_their_data() {
        let data = open_envelope(
            json!({"status_code": 200, "status_txt": "OK", "data": {"link_clicks": 42}}),
            None,
        )
        .unwrap();
        assert_eq!(link_clicks(&data).unwrap(), 42);
    }

    #[test]
    fn existing_links_are_tolerated_only_when_asked() {
        let envelope = json!({
            "status_code": 304,
            "status_txt": "LINK_ALREADY_EXISTS",
            "data": {"link_save": {"link": "http://bit.ly/abc", "new_link": 0}},
        });
        let data = open_envelope(envelope.clone(), Some(LINK_ALREADY_EXISTS)).unwrap();
        assert_eq!(saved_link(&data).unwrap(), "http://bit.ly/abc");

        let err = open_envelope(envelope, None).unwrap_err();
        assert!(matches!(err, ProviderError::Api { code: 304, .. }));
    }

    #[test]
    fn token_failures_are_auth_errors() {
        let err = open_envelope(
            json!({"status_code": 500, "status_txt": "INVALID_ACCESS_TOKEN", "data": null}),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ProviderError::Auth { provider: "bitly", .. }));
    }

    #[test]
    fn expand_errors_are_rejections() {
        let ok = json!({"expand": [{"short_url": "http://bit.ly/x", "long_url": "https://example.org/"}]});
        assert_eq!(expanded_url(&ok).unwrap(), "https://example.org/");

        let missing = json!({"expand": [{"short_url": "http://bit.ly/nope", "error": "NOT_FOUND"}]});
        let err = expanded_url(&missing).unwrap_err();
        assert!(err.is_rejected());
        assert!(err.to_string().contains("NOT_FOUND"));
    }

    #[test]
    fn long_urls_need_a_slash_before_the_query() {
        assert!(validate_long_url("https://example.org/post").is_ok());
        assert!(validate_long_url("https://example.org/?utm_source=x").is_ok());
        assert!(validate_long_url("https://example.org/post/?utm_source=x").is_ok());
        assert!(validate_long_url("https://example.org?utm_source=x").is_err());
        assert!(validate_long_url("https://example.org/post?utm_source=x").is_err());
        assert!(validate_long_url("not a url").is_err());
    }

    #[test]
    fn login_bodies_are_bare_tokens() {
        assert_eq!(token_from_login("abc123\n").unwrap(), "abc123");
        let err = token_from_login(r#"{"status_code": 401, "status_txt": "INVALID_LOGIN"}"#).unwrap_err();
        assert!(matches!(err, ProviderError::Auth { .. }));
        assert!(token_from_login("   ").is_err());
    }

    #[test]
    fn credentials_without_token_or_login_are_refused() {
        let err = Bitly::new(&BitlyCredentials::default()).err().unwrap();
        assert!(matches!(err, ProviderError::Auth { provider: "bitly", .. }));
    }
}
