//! pricewatch - Multi-vendor price/stock tracking engine
//!
//! Periodically scrapes product pages across several Korean storefronts,
//! normalizes each page into a uniform typed attribute record, diffs
//! consecutive snapshots field by field and hands structured change
//! events to a notification sink.

pub mod application;
pub mod domain;
pub mod infrastructure;
