//! One-shot active checks against a workload endpoint.

use std::time::Duration;

use reqwest::redirect::Policy;
use reqwest::Client as HttpClient;
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::SourceError;
use crate::probe::to_check;
use crate::service::CheckKind;
use crate::workload::Probe;

/// Per-attempt budget when the probe does not declare one.
const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(2);

/// HTTP client for active checks.
///
/// Redirects are not followed: a 3xx answer is itself a healthy result.
pub fn client() -> Result<HttpClient, SourceError> {
    Ok(HttpClient::builder()
        .user_agent("consul-registration-hook")
        .connect_timeout(DEFAULT_ATTEMPT_TIMEOUT)
        .redirect(Policy::none())
        .build()?)
}

/// Executes `probe` once against `host` the way the registry would.
pub async fn run(http: &HttpClient, probe: &Probe, host: &str) -> Result<(), SourceError> {
    let check = to_check(probe, host).ok_or(SourceError::UnsupportedProbe)?;
    let timeout = if check.timeout.is_zero() {
        DEFAULT_ATTEMPT_TIMEOUT
    } else {
        check.timeout
    };

    debug!(kind = %check.kind, address = %check.address, "Running active check");
    match check.kind {
        CheckKind::HttpGet => http_check(http, &check.address, timeout).await,
        CheckKind::Tcp => tcp_check(&check.address, timeout).await,
    }
}

/// GET `url`; any 2xx or 3xx answer counts as healthy.
pub async fn http_check(http: &HttpClient, url: &str, timeout: Duration) -> Result<(), SourceError> {
    let response = http.get(url).timeout(timeout).send().await?;
    let status = response.status();
    if status.is_success() || status.is_redirection() {
        Ok(())
    } else {
        Err(SourceError::UnhealthyStatus {
            address: url.to_string(),
            status: status.as_u16(),
        })
    }
}

/// Connect to `address` and close the connection straight away.
pub async fn tcp_check(address: &str, timeout: Duration) -> Result<(), SourceError> {
    let stream = tokio::time::timeout(timeout, TcpStream::connect(address))
        .await
        .map_err(|_| SourceError::CheckTimeout {
            address: address.to_string(),
            timeout,
        })??;
    drop(stream);
    Ok(())
}
