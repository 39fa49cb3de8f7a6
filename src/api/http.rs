//! Shared plumbing for the JSON APIs.

use super::records::Envelope;
use crate::Result;
use core::time::Duration;
use ohno::IntoAppError;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use url::Url;

/// Timeout applied to every outbound request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

const USER_AGENT: &str = concat!("modstats/", env!("CARGO_PKG_VERSION"));

/// Build an HTTP client that asks for JSON and gives up on any request after `timeout`.
pub(crate) fn json_client(timeout: Duration, mut headers: HeaderMap) -> Result<reqwest::Client> {
    let _ = headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    Ok(reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .timeout(timeout)
        .build()?)
}

/// Check the status of `response` and unwrap the `data` member of its JSON body.
pub(crate) async fn read_data<T>(response: reqwest::Response, what: &str) -> Result<T>
where
    T: DeserializeOwned,
{
    let response = response.error_for_status().into_app_err_with(|| format!("{what} was rejected"))?;
    let envelope: Envelope<T> = response
        .json()
        .await
        .into_app_err_with(|| format!("unable to parse the {what} response"))?;

    Ok(envelope.data)
}

/// Resolve an API path below `base_url`, keeping any path the base already carries.
pub(crate) fn join_url(base_url: &str, path: &str) -> Result<Url> {
    let mut base = Url::parse(base_url).into_app_err_with(|| format!("invalid base URL '{base_url}'"))?;

    // Without a trailing slash the last base segment would be replaced
    if !base.path().ends_with('/') {
        let directory = format!("{}/", base.path());
        base.set_path(&directory);
    }

    base.join(path.trim_start_matches('/'))
        .into_app_err_with(|| format!("unable to resolve '{path}' against '{base_url}'"))
}
