//! Snapshots and the tracked URL set
//!
//! A snapshot is the full observed state of every tracked product at one
//! polling instant. One is built fresh per cycle; the previous one lives
//! only long enough to be diffed against.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::item::ItemRecord;

/// Maximum tracked URLs per vendor, inherited from the notification
/// platform's 25-field limit on selection menus.
pub const MAX_URLS_PER_VENDOR: usize = 25;

/// Vendor id -> canonical URL -> item record.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    vendors: HashMap<&'static str, HashMap<String, ItemRecord>>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace one vendor's entire sub-mapping.
    pub fn insert_vendor(&mut self, vendor: &'static str, items: HashMap<String, ItemRecord>) {
        self.vendors.insert(vendor, items);
    }

    pub fn vendor(&self, vendor: &str) -> Option<&HashMap<String, ItemRecord>> {
        self.vendors.get(vendor)
    }

    /// Insert or replace a single record. Used by the add flow to give the
    /// next diff a baseline for a freshly tracked product.
    pub fn insert(&mut self, vendor: &'static str, url: String, record: ItemRecord) {
        self.vendors.entry(vendor).or_default().insert(url, record);
    }

    /// Drop a single record, if present.
    pub fn remove(&mut self, vendor: &str, url: &str) {
        if let Some(items) = self.vendors.get_mut(vendor) {
            items.remove(url);
        }
    }

    pub fn get(&self, vendor: &str, url: &str) -> Option<&ItemRecord> {
        self.vendors.get(vendor).and_then(|items| items.get(url))
    }

    /// Total number of records across all vendors.
    pub fn len(&self) -> usize {
        self.vendors.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-vendor ordered list of canonical URLs being monitored.
///
/// Insertion order is preserved; the differ traverses URLs in this order so
/// change events come out in the order the user added the products,
/// independent of fetch completion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackedUrls {
    urls: HashMap<String, Vec<String>>,
}

impl TrackedUrls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure a vendor has an entry, even if empty. Called once per
    /// registered vendor at startup so lookups never miss.
    pub fn ensure_vendor(&mut self, vendor: &str) {
        self.urls.entry(vendor.to_string()).or_default();
    }

    pub fn urls(&self, vendor: &str) -> &[String] {
        self.urls.get(vendor).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, vendor: &str, url: &str) -> bool {
        self.urls(vendor).iter().any(|u| u == url)
    }

    /// Number of tracked URLs for one vendor.
    pub fn count(&self, vendor: &str) -> usize {
        self.urls(vendor).len()
    }

    /// Total across all vendors.
    pub fn total(&self) -> usize {
        self.urls.values().map(Vec::len).sum()
    }

    /// Append a canonical URL. Fails when the vendor is at capacity or the
    /// URL is already tracked.
    pub fn add(&mut self, vendor: &str, url: String) -> Result<(), AddUrlError> {
        let list = self.urls.entry(vendor.to_string()).or_default();

        if list.len() >= MAX_URLS_PER_VENDOR {
            return Err(AddUrlError::CapacityReached);
        }
        if list.contains(&url) {
            return Err(AddUrlError::Duplicate);
        }

        list.push(url);
        Ok(())
    }

    /// Remove a URL; returns whether it was present.
    pub fn remove(&mut self, vendor: &str, url: &str) -> bool {
        match self.urls.get_mut(vendor) {
            Some(list) => {
                let before = list.len();
                list.retain(|u| u != url);
                list.len() != before
            }
            None => false,
        }
    }
}

/// Why a URL could not be added to the tracked set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AddUrlError {
    #[error("vendor already tracks {MAX_URLS_PER_VENDOR} URLs")]
    CapacityReached,
    #[error("URL is already tracked")]
    Duplicate,
}
