//! HTTP sessions for scraping
//!
//! One session is built per `fetch_many` call and torn down with it, so no
//! cookies or connection state leak between polling cycles. The cookie
//! store is enabled because the login-capable vendors authenticate on the
//! session before fetching.

use std::time::Duration;

use reqwest::{Client, Response};

use crate::domain::vendor::ScrapeError;

/// Parameters for building a scraping session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub user_agent: String,
    pub timeout: Duration,
}

impl SessionConfig {
    pub fn new(user_agent: &str, timeout_secs: u64) -> Self {
        Self {
            user_agent: user_agent.to_string(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Build a fresh client: cookie store on, gzip on, bounded timeout,
    /// redirects followed (short-link resolution relies on this).
    pub fn build(&self) -> Result<Client, ScrapeError> {
        Client::builder()
            .user_agent(&self.user_agent)
            .timeout(self.timeout)
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|source| ScrapeError::Session { source })
    }
}

/// GET a page and return its body, mapping transport and HTTP-status
/// failures to `ScrapeError`.
pub async fn get_text(client: &Client, url: &str) -> Result<String, ScrapeError> {
    let response = send_get(client, url).await?;

    response
        .text()
        .await
        .map_err(|source| ScrapeError::request(url, source))
}

/// GET a URL and return the final URL after redirects. Used by adapters to
/// resolve shortened share links.
pub async fn resolve_final_url(client: &Client, url: &str) -> Result<reqwest::Url, ScrapeError> {
    let response = send_get(client, url).await?;
    Ok(response.url().clone())
}

async fn send_get(client: &Client, url: &str) -> Result<Response, ScrapeError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| ScrapeError::request(url, source))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ScrapeError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    Ok(response)
}
