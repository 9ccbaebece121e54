//! Domain layer - vendor-independent data model and diff logic

pub mod diff;
pub mod item;
pub mod snapshot;
pub mod vendor;

pub use diff::{diff_snapshots, ChangeEvent, FieldDiff};
pub use item::{AttrKind, AttrSpec, AttrValue, ItemRecord, SchemaError};
pub use snapshot::{Snapshot, TrackedUrls, MAX_URLS_PER_VENDOR};
pub use vendor::{ScrapeError, VendorAdapter, VendorMeta};
