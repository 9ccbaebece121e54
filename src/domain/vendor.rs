//! Vendor adapter contract
//!
//! Each supported storefront implements this trait; the orchestrator never
//! branches on vendor identity. Adding a vendor means implementing the
//! three operations and registering the adapter.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::item::{AttrSpec, ItemRecord};

/// Static identity and schema of one storefront.
#[derive(Debug)]
pub struct VendorMeta {
    /// Stable identifier used in snapshots, config and the URL store.
    pub id: &'static str,
    /// Human-readable name used in notifications.
    pub label: &'static str,
    /// The closed, ordered attribute set this vendor's records use.
    pub schema: &'static [AttrSpec],
}

/// Soft failure while fetching or parsing one product page.
///
/// These are expected runtime conditions (vendor markup changed, network
/// hiccup, timeout); they are logged and the cycle continues with the last
/// known value. Out-of-stock is data, not an error.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("request failed for {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("page structure mismatch at {url}: missing '{field}'")]
    Parse { url: String, field: &'static str },

    #[error("login to {vendor} failed: {reason}")]
    Login { vendor: &'static str, reason: String },

    #[error("failed to build HTTP session: {source}")]
    Session {
        #[source]
        source: reqwest::Error,
    },
}

impl ScrapeError {
    pub fn request(url: &str, source: reqwest::Error) -> Self {
        Self::Request {
            url: url.to_string(),
            source,
        }
    }

    pub fn parse(url: &str, field: &'static str) -> Self {
        Self::Parse {
            url: url.to_string(),
            field,
        }
    }
}

/// One storefront's scraping capability.
#[async_trait]
pub trait VendorAdapter: Send + Sync {
    fn meta(&self) -> &VendorMeta;

    /// Normalize pasted URL/share text into this vendor's canonical product
    /// URL, following short/redirect links when needed (one round trip).
    ///
    /// `None` means "not this vendor's URL or unparseable" - a normal
    /// outcome, not a failure. Network errors during resolution degrade to
    /// `None` with a warning.
    async fn standardize(&self, input: &str) -> Option<String>;

    /// Fetch and parse a single product page.
    async fn fetch_one(&self, url: &str) -> Result<ItemRecord, ScrapeError>;

    /// Fetch all given URLs concurrently under one shared session.
    ///
    /// A single URL's failure is logged and that URL is simply absent from
    /// the returned map; it never aborts the batch. `Err` means the whole
    /// call failed (e.g. the session could not be established).
    async fn fetch_many(&self, urls: &[String])
        -> Result<HashMap<String, ItemRecord>, ScrapeError>;
}

/// Ordered adapter registry. Order determines vendor traversal order in
/// diff output and in `standardize` dispatch.
pub type VendorRegistry = Vec<std::sync::Arc<dyn VendorAdapter>>;
