use std::time::Duration;

use url::Url;

use crate::api::ApiClient;
use crate::domain::JobError;

/// Decides whether a download can be offered at all: the server has to answer
/// the liveness probe and the page has to come from a supported source.
#[derive(Clone)]
pub struct EligibilityGate {
    api: ApiClient,
    supported_domains: Vec<String>,
    probe_timeout: Duration,
}

impl EligibilityGate {
    pub fn new(api: ApiClient, supported_domains: Vec<String>, probe_timeout: Duration) -> Self {
        Self {
            api,
            supported_domains,
            probe_timeout,
        }
    }

    pub fn supported_domains(&self) -> &[String] {
        &self.supported_domains
    }

    /// Probe the server's metadata endpoint. Any failure, including the timeout
    /// firing, is reported as `false`.
    pub async fn check_server_reachable(&self, timeout: Duration) -> bool {
        match self.api.probe(timeout).await {
            Ok(()) => {
                tracing::debug!(server = %self.api.base_url(), "Server reachable");
                true
            }
            Err(e) => {
                tracing::warn!(server = %self.api.base_url(), error = %e, "Server unreachable");
                false
            }
        }
    }

    /// [`check_server_reachable`](Self::check_server_reachable) with the configured timeout
    pub async fn ensure_reachable(&self) -> Result<(), JobError> {
        if self.check_server_reachable(self.probe_timeout).await {
            Ok(())
        } else {
            Err(JobError::Unreachable)
        }
    }

    pub fn is_supported(&self, url: &str) -> bool {
        is_supported_resource(url, &self.supported_domains)
    }
}

/// True iff `url` is an http(s) URL whose host is one of `supported_domains` or a
/// subdomain of one. Hosts are compared case-insensitively.
pub fn is_supported_resource(url: &str, supported_domains: &[String]) -> bool {
    let Ok(parsed) = Url::parse(url.trim()) else {
        return false;
    };

    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }

    let Some(host) = parsed.host_str() else {
        return false;
    };
    let host = host.to_ascii_lowercase();

    supported_domains
        .iter()
        .map(|domain| domain.trim().to_ascii_lowercase())
        .filter(|domain| !domain.is_empty())
        .any(|domain| host == domain || host.ends_with(&format!(".{domain}")))
}
