use std::time::Duration;

use futures::{Stream, StreamExt, TryStreamExt};
use reqwest::{header, Client, Response};
use thiserror::Error;
use url::Url;

use crate::domain::{ArtifactLocator, DownloadRequest, JobId};

use super::events::EventSubscription;
use super::models::{ErrorBody, InfoRequest, SubmitRequest, SubmitResponse, VideoInfo};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    /// Non-success status; `detail` is the server's message or a generic one
    #[error("{detail}")]
    Rejected { status: u16, detail: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Cannot build endpoint URL from {0}")]
    InvalidEndpoint(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;

/// HTTP client for the job server
#[derive(Clone)]
pub struct ApiClient {
    base_url: Url,
    http: Client,
}

impl ApiClient {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            http: Client::new(),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Append path segments to the base URL, keeping any path prefix it has
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidEndpoint(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Turn a non-success response into [`ApiError::Rejected`], pulling `detail`
    /// out of the JSON body when there is one
    async fn rejection(response: Response) -> ApiError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        let detail = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|body| body.detail_message())
            .unwrap_or_else(|| format!("Server returned HTTP {}", status.as_u16()));

        ApiError::Rejected {
            status: status.as_u16(),
            detail,
        }
    }

    /// `GET /openapi.json` with a hard timeout
    pub async fn probe(&self, timeout: Duration) -> Result<()> {
        let url = self.endpoint(&["openapi.json"])?;

        let response = self.http.get(url).timeout(timeout).send().await?;
        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        Ok(())
    }

    /// `POST /download`, returns the job id issued by the server
    pub async fn submit(&self, request: &DownloadRequest) -> Result<JobId> {
        let url = self.endpoint(&["download"])?;
        let body = SubmitRequest {
            url: request.resource_url(),
            quality: request.quality(),
        };

        let response = self.http.post(url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        let json: SubmitResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("JSON decode error: {}", e)))?;

        if json.job_id.trim().is_empty() {
            return Err(ApiError::InvalidResponse("empty job_id".to_string()));
        }

        Ok(JobId::new(json.job_id))
    }

    /// Open the `GET /progress/{job_id}` event stream
    pub async fn subscribe(&self, job_id: &JobId) -> Result<EventSubscription> {
        let url = self.endpoint(&["progress", job_id.as_str()])?;

        let response = self
            .http
            .get(url)
            .header(header::ACCEPT, "text/event-stream")
            .header(header::CACHE_CONTROL, "no-cache")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        let body = response.bytes_stream().map_err(ApiError::RequestError).boxed();
        Ok(EventSubscription::new(job_id.clone(), body))
    }

    /// `GET /file/{job_id}`, derived without contacting the server
    pub fn artifact_locator(&self, job_id: &JobId) -> Result<ArtifactLocator> {
        Ok(ArtifactLocator {
            job_id: job_id.clone(),
            url: self.endpoint(&["file", job_id.as_str()])?,
        })
    }

    /// `POST /info`: title, uploader and duration without downloading
    pub async fn video_info(&self, resource_url: &str) -> Result<VideoInfo> {
        let url = self.endpoint(&["info"])?;

        let response = self
            .http
            .post(url)
            .json(&InfoRequest { url: resource_url })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("JSON decode error: {}", e)))
    }

    /// Fetch a finished artifact as a byte stream
    /// Returns (total_size, stream)
    pub async fn download_file_stream(
        &self,
        locator: &ArtifactLocator,
    ) -> Result<(Option<u64>, impl Stream<Item = Result<bytes::Bytes>>)> {
        let response = self.http.get(locator.url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        let total_size = response.content_length();
        let stream = response.bytes_stream().map_err(ApiError::RequestError);

        Ok((total_size, stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QualityConfig;
    use mockito::{Matcher, Server, ServerGuard};
    use serde_json::json;

    fn client_for(server: &ServerGuard) -> ApiClient {
        ApiClient::new(Url::parse(&server.url()).unwrap())
    }

    fn request(url: &str, quality: &str) -> DownloadRequest {
        DownloadRequest::new(
            url,
            quality,
            &["reddit.com".to_string()],
            &QualityConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_endpoints_keep_base_path() {
        let client = ApiClient::new(Url::parse("http://10.0.0.2:8000/redditlink/").unwrap());
        let locator = client.artifact_locator(&JobId::new("abc")).unwrap();
        assert_eq!(locator.url.as_str(), "http://10.0.0.2:8000/redditlink/file/abc");

        let client = ApiClient::new(Url::parse("http://127.0.0.1:8000").unwrap());
        let locator = client.artifact_locator(&JobId::new("a/b")).unwrap();
        assert_eq!(locator.url.as_str(), "http://127.0.0.1:8000/file/a%2Fb");
    }

    #[tokio::test]
    async fn test_submit_returns_job_id() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/download")
            .match_body(Matcher::Json(json!({
                "url": "https://www.reddit.com/r/rust/comments/1",
                "quality": "720p"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"job_id":"abc"}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let job_id = client
            .submit(&request("https://www.reddit.com/r/rust/comments/1", "720p"))
            .await
            .unwrap();

        assert_eq!(job_id, JobId::new("abc"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_submit_rejection_uses_detail() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/download")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"detail":"unsupported quality"}"#)
            .create_async()
            .await;

        let err = client_for(&server)
            .submit(&request("https://reddit.com/x", "best"))
            .await
            .unwrap_err();

        assert!(matches!(&err, ApiError::Rejected { status: 400, .. }));
        assert_eq!(err.to_string(), "unsupported quality");
    }

    #[tokio::test]
    async fn test_submit_rejection_without_json_body() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/download")
            .with_status(502)
            .with_body("Bad Gateway")
            .create_async()
            .await;

        let err = client_for(&server)
            .submit(&request("https://reddit.com/x", "best"))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Server returned HTTP 502");
    }

    #[tokio::test]
    async fn test_submit_malformed_success_body() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/download")
            .with_status(200)
            .with_body(r#"{"id":"abc"}"#)
            .create_async()
            .await;

        let err = client_for(&server)
            .submit(&request("https://reddit.com/x", "best"))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_video_info() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/info")
            .match_body(Matcher::Json(json!({ "url": "https://youtu.be/xyz" })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"title":"Ferris","thumbnail":null,"duration":75.0,"uploader":"rustlang"}"#,
            )
            .create_async()
            .await;

        let info = client_for(&server).video_info("https://youtu.be/xyz").await.unwrap();
        assert_eq!(info.title, "Ferris");
        assert_eq!(info.duration, Some(75.0));
        assert_eq!(info.uploader.as_deref(), Some("rustlang"));
    }

    #[tokio::test]
    async fn test_subscribe_rejected() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/progress/missing")
            .with_status(404)
            .with_header("content-type", "application/json")
            .with_body(r#"{"detail":"job not found"}"#)
            .create_async()
            .await;

        let err = client_for(&server)
            .subscribe(&JobId::new("missing"))
            .await
            .err()
            .unwrap();

        assert_eq!(err.to_string(), "job not found");
    }

    #[tokio::test]
    async fn test_download_file_stream() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/file/abc")
            .with_status(200)
            .with_header("content-type", "video/mp4")
            .with_body(vec![7u8; 1024])
            .create_async()
            .await;

        let client = client_for(&server);
        let locator = client.artifact_locator(&JobId::new("abc")).unwrap();
        let (total, stream) = client.download_file_stream(&locator).await.unwrap();

        let chunks: Vec<bytes::Bytes> = stream.try_collect().await.unwrap();
        let received: usize = chunks.iter().map(|c| c.len()).sum();
        assert_eq!(total, Some(1024));
        assert_eq!(received, 1024);
    }
}
