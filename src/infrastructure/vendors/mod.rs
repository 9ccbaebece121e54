//! Vendor adapters
//!
//! One module per supported storefront. Selectors and extraction rules are
//! adapter-internal details with no compatibility contract; they break when
//! the vendor's markup changes, by design.

pub mod coupang;
pub mod danawa;
pub mod eleventh_st;
pub mod naver;
pub mod univstore;

use std::collections::HashMap;
use std::sync::Arc;

use scraper::{Html, Selector};
use tracing::warn;

use crate::domain::item::ItemRecord;
use crate::domain::vendor::{ScrapeError, VendorRegistry};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::http::SessionConfig;

/// Build the ordered adapter registry. Order determines diff output order
/// and `standardize` dispatch order. New vendors are added here.
pub fn build_registry(config: &AppConfig) -> VendorRegistry {
    let session = SessionConfig::new(&config.user_agent, config.request_timeout_secs);

    vec![
        Arc::new(coupang::CoupangAdapter::new(config.coupang.clone(), session.clone())),
        Arc::new(danawa::DanawaAdapter::new(session.clone())),
        Arc::new(naver::NaverAdapter::new(config.naver.clone(), session.clone())),
        Arc::new(eleventh_st::EleventhStAdapter::new(session.clone())),
        Arc::new(univstore::UnivStoreAdapter::new(config.univstore.clone(), session)),
    ]
}

/// Compile a selector known to be valid at build time. Exercised by the
/// parser unit tests, so an invalid literal cannot reach production.
pub(crate) fn sel(css: &str) -> Selector {
    Selector::parse(css).expect("static selector must parse")
}

/// Text content of the first element matching `selector`, trimmed.
pub(crate) fn select_text(doc: &Html, selector: &Selector) -> Option<String> {
    doc.select(selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
}

/// Attribute of the first element matching `selector`.
pub(crate) fn select_attr(doc: &Html, selector: &Selector, attr: &str) -> Option<String> {
    doc.select(selector)
        .next()
        .and_then(|el| el.value().attr(attr))
        .map(str::to_string)
}

/// All digits of `text` as one number; 0 when there are none.
pub(crate) fn digits(text: &str) -> i64 {
    let numeric: String = text.chars().filter(char::is_ascii_digit).collect();
    numeric.parse().unwrap_or(0)
}

/// Collect per-URL fetch results into a map, logging failures instead of
/// propagating them. A failed URL is simply absent; the orchestrator fills
/// it in with the last known record.
pub(crate) fn collect_batch(
    vendor: &'static str,
    results: Vec<(String, Result<ItemRecord, ScrapeError>)>,
) -> HashMap<String, ItemRecord> {
    let mut items = HashMap::with_capacity(results.len());

    for (url, result) in results {
        match result {
            Ok(record) => {
                items.insert(url, record);
            }
            Err(error) => {
                warn!(vendor, url = %url, %error, "fetch failed; keeping last known value");
            }
        }
    }

    items
}
