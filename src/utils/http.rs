// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use reqwest::header::{COOKIE, HeaderMap, HeaderValue};

use crate::error::{AppError, Result};
use crate::models::HttpConfig;

/// Create a configured asynchronous HTTP client.
pub fn create_client(config: &HttpConfig) -> Result<reqwest::Client> {
    build(config, HeaderMap::new())
}

/// Create a client that sends a fixed cookie header with every request.
pub fn create_client_with_cookie(config: &HttpConfig, cookie: Option<&str>) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    if let Some(cookie) = cookie {
        let value = HeaderValue::from_str(cookie)
            .map_err(|e| AppError::config(format!("source.cookie is not a valid header: {e}")))?;
        headers.insert(COOKIE, value);
    }
    build(config, headers)
}

fn build(config: &HttpConfig, headers: HeaderMap) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .default_headers(headers)
        .build()?;
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_cookie() {
        let config = HttpConfig::default();
        assert!(create_client_with_cookie(&config, Some("a=b\nc")).is_err());
        assert!(create_client_with_cookie(&config, Some("session=abc")).is_ok());
        assert!(create_client_with_cookie(&config, None).is_ok());
    }
}
