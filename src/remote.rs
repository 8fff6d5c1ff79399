use std::fs::File;
use std::path::Path;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::domain::ArtifactRef;
use crate::error::FetchError;

/// Blocking download seam for the sample-data source. The production impl
/// speaks HTTP; tests substitute a scripted client.
pub trait SampleDataClient: Send + Sync {
    fn download_artifact(
        &self,
        artifact: &ArtifactRef,
        url: &str,
        destination: &Path,
    ) -> Result<(), FetchError>;

    fn download_archive(&self, url: &str, destination: &Path) -> Result<(), FetchError>;
}

#[derive(Clone)]
pub struct HttpSampleDataClient {
    client: Client,
}

impl HttpSampleDataClient {
    pub fn new() -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("pff-dm/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| FetchError::Filesystem(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| FetchError::Transport(err.to_string()))?;
        Ok(Self { client })
    }

    fn handle_status(
        label: &str,
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, FetchError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "sample source request failed".to_string());
        Err(FetchError::Status {
            status,
            artifact: label.to_string(),
            message,
        })
    }

    fn send_with_retries<F>(&self, mut make_req: F) -> Result<reqwest::blocking::Response, FetchError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            let response = make_req().send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(FetchError::Transport(err.to_string()));
                }
            }
        }
    }

    fn fetch_to_file(&self, label: &str, url: &str, destination: &Path) -> Result<(), FetchError> {
        let response = self.send_with_retries(|| self.client.get(url))?;
        let mut response = Self::handle_status(label, response)?;
        let mut file =
            File::create(destination).map_err(|err| FetchError::Filesystem(err.to_string()))?;
        std::io::copy(&mut response, &mut file)
            .map_err(|err| FetchError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

impl SampleDataClient for HttpSampleDataClient {
    fn download_artifact(
        &self,
        artifact: &ArtifactRef,
        url: &str,
        destination: &Path,
    ) -> Result<(), FetchError> {
        self.fetch_to_file(&artifact.to_string(), url, destination)
    }

    fn download_archive(&self, url: &str, destination: &Path) -> Result<(), FetchError> {
        self.fetch_to_file("sample archive", url, destination)
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(404));
        assert!(!is_retryable_status(200));
    }
}
