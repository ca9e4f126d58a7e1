//! Remote video download with bounded retries.

use reqwest::Client;
use tracing::info;
use url::Url;

use crate::config::FetchConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::retry::{retry_async, RetryPolicy, RetryResult};

/// Filename used when the URL path has no usable last segment.
pub const FALLBACK_FILENAME: &str = "video_from_url";

/// Downloaded video bytes.
#[derive(Debug, Clone)]
pub struct FetchedVideo {
    pub bytes: Vec<u8>,
    pub filename: String,
}

/// Validate a submitted URL; only http(s) is accepted.
pub fn parse_video_url(raw: &str) -> WorkerResult<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| WorkerError::validation(format!("Invalid file_url: {e}")))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(WorkerError::validation(format!(
            "Invalid file_url: unsupported scheme '{other}'"
        ))),
    }
}

/// Last non-empty path segment of the URL, or [`FALLBACK_FILENAME`].
pub fn filename_from_url(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(|s| s.to_string())
        .unwrap_or_else(|| FALLBACK_FILENAME.to_string())
}

/// Downloads a video with a per-attempt timeout and fixed retry delay.
#[derive(Clone)]
pub struct RetryingFetcher {
    http: Client,
    policy: RetryPolicy,
}

impl RetryingFetcher {
    pub fn new(config: &FetchConfig) -> WorkerResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| WorkerError::fetch(0, e.to_string()))?;

        Ok(Self {
            http,
            policy: RetryPolicy::new("fetch_video")
                .with_max_attempts(config.max_attempts)
                .with_delay(config.retry_delay),
        })
    }

    /// GET the URL, retrying transport errors and non-2xx statuses.
    pub async fn fetch(&self, raw_url: &str) -> WorkerResult<FetchedVideo> {
        let url = parse_video_url(raw_url)?;

        let result = retry_async(&self.policy, || {
            let request = self.http.get(url.clone());
            async move {
                let response = request.send().await?.error_for_status()?;
                response.bytes().await
            }
        })
        .await;

        match result {
            RetryResult::Success(bytes) => {
                let filename = filename_from_url(&url);
                info!(url = %url, bytes = bytes.len(), filename = %filename, "Video downloaded");
                Ok(FetchedVideo {
                    bytes: bytes.to_vec(),
                    filename,
                })
            }
            RetryResult::Failed { error, attempts } => {
                Err(WorkerError::fetch(attempts, error.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(max_attempts: u32) -> RetryingFetcher {
        RetryingFetcher::new(&FetchConfig {
            timeout: Duration::from_secs(5),
            max_attempts,
            retry_delay: Duration::from_millis(5),
        })
        .unwrap()
    }

    #[test]
    fn test_filename_from_url() {
        let url = Url::parse("https://cdn.example.com/media/sermon.mp4?sig=abc").unwrap();
        assert_eq!(filename_from_url(&url), "sermon.mp4");

        let url = Url::parse("https://cdn.example.com/").unwrap();
        assert_eq!(filename_from_url(&url), FALLBACK_FILENAME);

        let url = Url::parse("https://cdn.example.com/videos/").unwrap();
        assert_eq!(filename_from_url(&url), "videos");
    }

    #[test]
    fn test_parse_video_url_rejects_bad_input() {
        assert!(parse_video_url("not a url").unwrap_err().is_client_error());
        assert!(parse_video_url("ftp://host/file.mp4").unwrap_err().is_client_error());
        assert!(parse_video_url("https://host/file.mp4").is_ok());
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/clip.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .expect(1)
            .mount(&server)
            .await;

        let video = fetcher(3)
            .fetch(&format!("{}/clip.mp4", server.uri()))
            .await
            .unwrap();
        assert_eq!(video.bytes, vec![1, 2, 3]);
        assert_eq!(video.filename, "clip.mp4");
    }

    #[tokio::test]
    async fn test_fetch_retries_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"video".to_vec()))
            .mount(&server)
            .await;

        let video = fetcher(3).fetch(&format!("{}/v", server.uri())).await.unwrap();
        assert_eq!(video.bytes, b"video".to_vec());
    }

    #[tokio::test]
    async fn test_fetch_gives_up_after_max_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(3)
            .mount(&server)
            .await;

        let err = fetcher(3)
            .fetch(&format!("{}/missing.mp4", server.uri()))
            .await
            .unwrap_err();

        match err {
            WorkerError::Fetch { attempts, ref message } => {
                assert_eq!(attempts, 3);
                assert!(message.contains("404"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().starts_with("Failed to download video:"));
    }
}
