//! Response handling shared by the three clients.

use std::time::Duration;

use dashsync_engine::ProviderError;
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use serde_json::Value;

const TIMEOUT: Duration = Duration::from_secs(60);

pub(crate) fn client(provider: &'static str) -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(TIMEOUT)
        .user_agent(concat!("dashsync/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| transport(provider, e))
}

pub(crate) fn transport(provider: &'static str, err: reqwest::Error) -> ProviderError {
    ProviderError::Transport {
        provider,
        message: err.to_string(),
    }
}

pub(crate) fn decode(provider: &'static str, err: impl std::fmt::Display) -> ProviderError {
    ProviderError::Decode {
        provider,
        message: err.to_string(),
    }
}

/// Read a response body as JSON, mapping HTTP failures onto [`ProviderError`].
pub(crate) fn json_body(provider: &'static str, response: Response) -> Result<Value, ProviderError> {
    let status = response.status();
    let body = response.text().map_err(|e| transport(provider, e))?;
    check_status(provider, status, &body)?;
    serde_json::from_str(&body).map_err(|e| decode(provider, e))
}

pub(crate) fn check_status(provider: &'static str, status: StatusCode, body: &str) -> Result<(), ProviderError> {
    if status.is_success() {
        return Ok(());
    }
    let message = error_message(body);
    Err(match status {
        StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND => ProviderError::Rejected { provider, message },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Auth { provider, message },
        other => ProviderError::Status {
            provider,
            code: other.as_u16(),
            body: message,
        },
    })
}

/// Human-readable part of an error body: Google's `error.message`,
/// Mailchimp's `detail`, Bitly's `status_txt`, else the raw text.
pub(crate) fn error_message(body: &str) -> String {
    let Ok(json) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_string();
    };
    json.pointer("/error/message")
        .or_else(|| json.get("detail"))
        .or_else(|| json.get("status_txt"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_are_extracted_per_provider() {
        assert_eq!(
            error_message(r#"{"error":{"code":400,"message":"Invalid value 'ga:foo'"}}"#),
            "Invalid value 'ga:foo'"
        );
        assert_eq!(
            error_message(r#"{"title":"Resource Not Found","status":404,"detail":"The requested resource could not be found."}"#),
            "The requested resource could not be found."
        );
        assert_eq!(error_message("  gateway timeout \n"), "gateway timeout");
    }

    #[test]
    fn status_codes_map_to_error_kinds() {
        assert!(check_status("analytics", StatusCode::OK, "").is_ok());
        let bad = check_status("analytics", StatusCode::BAD_REQUEST, "{}").unwrap_err();
        assert!(bad.is_rejected());
        let auth = check_status("mailchimp", StatusCode::UNAUTHORIZED, "nope").unwrap_err();
        assert!(matches!(auth, ProviderError::Auth { provider: "mailchimp", .. }));
        let down = check_status("bitly", StatusCode::SERVICE_UNAVAILABLE, "down").unwrap_err();
        assert!(matches!(down, ProviderError::Status { code: 503, .. }));
    }
}
