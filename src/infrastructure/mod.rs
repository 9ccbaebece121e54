//! Infrastructure layer - config, logging, HTTP, persistence, vendor adapters

pub mod config;
pub mod http;
pub mod logging;
pub mod url_store;
pub mod vendors;

pub use config::AppConfig;
pub use http::SessionConfig;
pub use url_store::UrlStore;
