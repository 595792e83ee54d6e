// src/utils/http.rs

//! HTTP client utilities.

use encoding_rs::Encoding;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::{AppError, Result};
use crate::models::UpstreamConfig;

/// Create the client used for list requests.
pub fn create_list_client(config: &UpstreamConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(config.timeout())
        .default_headers(header_map(config)?)
        .build()?;
    Ok(client)
}

/// Create the client used for schedule pages.
///
/// The schedule host serves an invalid certificate, so validation is off for
/// this client only.
pub fn create_schedule_client(config: &UpstreamConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(config.timeout())
        .danger_accept_invalid_certs(true)
        .build()?;
    Ok(client)
}

/// Build a header map from the configured header table.
pub fn header_map(config: &UpstreamConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::with_capacity(config.headers.len());
    for (name, value) in &config.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| AppError::config(format!("invalid header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| AppError::config(format!("invalid value for header '{name}': {e}")))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

/// Resolve a charset label such as `windows-1251`.
pub fn encoding_for(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| AppError::config(format!("unknown charset '{label}'")))
}

fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if !status.is_success() {
        return Err(AppError::Status {
            url: response.url().to_string(),
            status: status.as_u16(),
        });
    }
    Ok(response)
}

/// Read a response body as text, failing on non-success status.
///
/// The body is decoded with the charset the response declares, falling back
/// to `default_charset`.
pub async fn read_text(response: reqwest::Response, default_charset: &str) -> Result<String> {
    let response = ensure_success(response)?;
    Ok(response.text_with_charset(default_charset).await?)
}

/// Read a response body decoded with `charset`, failing on non-success status.
///
/// The charset the response declares is ignored: the list endpoint labels
/// windows-1251 bodies as UTF-8.
pub async fn read_text_as(response: reqwest::Response, charset: &str) -> Result<String> {
    let encoding = encoding_for(charset)?;
    let response = ensure_success(response)?;
    let bytes = response.bytes().await?;
    let (text, _, had_errors) = encoding.decode(&bytes);
    if had_errors {
        log::warn!("Body is not valid {}, replaced malformed bytes", encoding.name());
    }
    Ok(text.into_owned())
}
