use crate::core::error::CycleError;
use crate::core::rates::ProviderId;
use anyhow::Result;
use tracing::debug;

/// Builds the HTTP client shared by every source. No request timeout is set,
/// a hung fetch only stalls the loop of the source that issued it.
pub fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .user_agent(concat!("poseidon/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// GETs `url` and returns the body. Connection errors and non-success status
/// codes are transport failures.
pub async fn fetch_text(
    client: &reqwest::Client,
    url: &str,
    provider: ProviderId,
) -> Result<String, CycleError> {
    debug!(%provider, "Requesting {}", redact_access_key(url));

    let response = client.get(url).send().await.map_err(|e| {
        CycleError::transport(provider, format!("request failed: {}", e.without_url()))
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(CycleError::transport(provider, format!("HTTP {status}")));
    }

    response
        .text()
        .await
        .map_err(|e| CycleError::transport(provider, format!("reading body: {}", e.without_url())))
}

/// Hides credentials passed as query parameters before a URL is logged.
pub fn redact_access_key(url: &str) -> String {
    match url.find("access_key=") {
        Some(pos) => {
            let start = pos + "access_key=".len();
            let end = url[start..].find('&').map_or(url.len(), |i| start + i);
            format!("{}***{}", &url[..start], &url[end..])
        }
        None => url.to_string(),
    }
}
