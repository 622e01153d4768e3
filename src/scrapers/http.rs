use anyhow::{Context, Result};
use rand::Rng;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use std::time::Duration;
use tracing::{debug, warn};

use super::PageFetcher;
use crate::config::ScrapeConfig;
use crate::error::ScrapeError;

/// Upper bound for the random part of the retry delay
const JITTER_MAX_MS: u64 = 500;

/// Blocking HTTP page fetcher with retries
pub struct HttpFetcher {
    client: Client,
    max_retries: u32,
    retry_delay: Duration,
}

impl HttpFetcher {
    pub fn new(config: &ScrapeConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("nl-NL,nl;q=0.9,en;q=0.8"));

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            max_retries: config.max_retries.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    fn try_fetch(&self, url: &str) -> Result<String, ScrapeError> {
        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text()?)
    }

    /// Transport errors, 429 and 5xx may go away on a retry; other statuses won't
    fn is_transient(err: &ScrapeError) -> bool {
        match err {
            ScrapeError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => true,
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let jitter = rand::thread_rng().gen_range(0..=JITTER_MAX_MS);
        self.retry_delay * attempt + Duration::from_millis(jitter)
    }
}

impl PageFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<String> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            debug!("GET {} (attempt {}/{})", url, attempt, self.max_retries);

            match self.try_fetch(url) {
                Ok(body) => return Ok(body),
                Err(err) => {
                    if attempt >= self.max_retries || !Self::is_transient(&err) {
                        return Err(err).with_context(|| {
                            format!("request failed for {} after {} attempts", url, attempt)
                        });
                    }
                    let delay = self.backoff(attempt);
                    warn!(
                        "Request to {} failed ({}), retrying in {:?}",
                        url, err, delay
                    );
                    std::thread::sleep(delay);
                }
            }
        }
    }
}

/// Minimal HTTP/1.1 server for tests: answers one connection per canned
/// `(status, body)` pair, in order. The returned counter is bumped before
/// each response is written.
#[cfg(test)]
pub(crate) fn serve_responses(
    responses: Vec<(u16, &'static str)>,
) -> (String, std::sync::Arc<std::sync::atomic::AtomicUsize>) {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server");
    let base_url = format!("http://{}", listener.local_addr().expect("local addr"));
    let served = Arc::new(AtomicUsize::new(0));
    let counter = served.clone();

    std::thread::spawn(move || {
        for (status, body) in responses {
            let Ok((mut stream, _)) = listener.accept() else {
                return;
            };
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match stream.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }
            let reason = match status {
                200 => "OK",
                404 => "Not Found",
                429 => "Too Many Requests",
                500 => "Internal Server Error",
                503 => "Service Unavailable",
                _ => "Status",
            };
            counter.fetch_add(1, Ordering::SeqCst);
            let response = format!(
                "HTTP/1.1 {} {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                reason,
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes());
            let _ = stream.flush();
        }
    });

    (base_url, served)
}
