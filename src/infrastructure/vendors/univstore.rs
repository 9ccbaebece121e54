//! Univstore (학생복지스토어) adapter
//!
//! Canonical product URL form: `https://univstore.com/item/{id}`. Pricing
//! and stock are only rendered for logged-in members; without login the
//! record carries `로그인 필요` placeholders. Login is a plain form POST
//! performed once per fetch session.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::future::join_all;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::debug;

use crate::domain::item::{AttrKind, AttrSpec, ItemRecord};
use crate::domain::vendor::{ScrapeError, VendorAdapter, VendorMeta};
use crate::infrastructure::config::CredentialConfig;
use crate::infrastructure::http::{get_text, SessionConfig};
use crate::infrastructure::vendors::{collect_batch, sel, select_attr, select_text};

static SCHEMA: &[AttrSpec] = &[
    AttrSpec::new("name", "상품명", AttrKind::Text),
    AttrSpec::new("price", "가격", AttrKind::Text),
    AttrSpec::new("stock", "재고", AttrKind::Text),
    AttrSpec::unlabeled("thumbnail", AttrKind::Text),
];

static META: VendorMeta = VendorMeta {
    id: "univstore",
    label: "학생복지스토어",
    schema: SCHEMA,
};

static NAME_SEL: Lazy<Selector> = Lazy::new(|| {
    sel("body > main > div.usItemAreaTop > div > div.usItemCardController > div.usItemCardInfo > div.usItemCardInfoName > a > span")
});
static PRICE_SEL: Lazy<Selector> = Lazy::new(|| {
    sel("body > main > div.usItemAreaTop > div > div.usItemCardController > div.usItemCardInfo > div.usItemCardInfoPrice2")
});
static OUT_OF_STOCK_SEL: Lazy<Selector> = Lazy::new(|| {
    sel("body > main > div.usItemAreaTop > div > div.usItemCardController > div.usItemCardInfo > div.usOutofstockMessage")
});
static THUMBNAIL_SEL: Lazy<Selector> = Lazy::new(|| sel("div.swiper-slide.swiper-lazy"));

static ITEM_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https://univstore\.com/item/[0-9]+").expect("static regex must parse"));

const LOGIN_REQUIRED: &str = "로그인 필요";

pub struct UnivStoreAdapter {
    config: CredentialConfig,
    session: SessionConfig,
}

impl UnivStoreAdapter {
    pub fn new(config: CredentialConfig, session: SessionConfig) -> Self {
        Self { config, session }
    }

    /// Establish a logged-in session. The login endpoint silently serves
    /// the member page when the session cookie is already valid.
    async fn login(&self, client: &Client) -> Result<(), ScrapeError> {
        let login_err = |reason: String| ScrapeError::Login {
            vendor: META.id,
            reason,
        };

        client
            .get("https://univstore.com/")
            .send()
            .await
            .map_err(|err| login_err(err.to_string()))?;

        let response = client
            .get("https://univstore.com/user/login")
            .send()
            .await
            .map_err(|err| login_err(err.to_string()))?;

        // Redirected back to the login page means no valid session yet.
        if response.url().as_str().contains("login") {
            debug!("no valid univstore session; logging in");

            let form = [
                ("userid", self.config.id.as_str()),
                ("password", self.config.password.as_str()),
                ("autologin", "1"),
            ];

            client
                .post("https://univstore.com/api/user/login")
                .form(&form)
                .send()
                .await
                .map_err(|err| login_err(err.to_string()))?;
        }

        Ok(())
    }

    async fn fetch_with(&self, client: &Client, url: &str) -> Result<ItemRecord, ScrapeError> {
        let body = get_text(client, url).await?;
        parse_product(&body, url, self.config.login)
    }
}

#[async_trait]
impl VendorAdapter for UnivStoreAdapter {
    fn meta(&self) -> &VendorMeta {
        &META
    }

    async fn standardize(&self, input: &str) -> Option<String> {
        ITEM_URL_RE
            .find(input)
            .map(|matched| matched.as_str().to_string())
    }

    async fn fetch_one(&self, url: &str) -> Result<ItemRecord, ScrapeError> {
        let client = self.session.build()?;
        if self.config.login {
            self.login(&client).await?;
        }
        self.fetch_with(&client, url).await
    }

    async fn fetch_many(
        &self,
        urls: &[String],
    ) -> Result<HashMap<String, ItemRecord>, ScrapeError> {
        if urls.is_empty() {
            return Ok(HashMap::new());
        }

        let client = self.session.build()?;
        if self.config.login {
            self.login(&client).await?;
        }

        let client = &client;
        let results = join_all(urls.iter().map(|url| async move {
            (url.clone(), self.fetch_with(client, url).await)
        }))
        .await;

        Ok(collect_batch(META.id, results))
    }
}

fn parse_product(body: &str, url: &str, logged_in: bool) -> Result<ItemRecord, ScrapeError> {
    let doc = Html::parse_document(body);

    let name = select_text(&doc, &NAME_SEL).ok_or_else(|| ScrapeError::parse(url, "name"))?;
    let thumbnail = select_attr(&doc, &THUMBNAIL_SEL, "data-background").unwrap_or_default();

    let (price, stock) = if logged_in {
        let price = select_text(&doc, &PRICE_SEL)
            .map(|p| format!("{p}원"))
            .ok_or_else(|| ScrapeError::parse(url, "price"))?;
        let stock = if doc.select(&OUT_OF_STOCK_SEL).next().is_some() {
            "품절".to_string()
        } else {
            "재고 있음".to_string()
        };
        (price, stock)
    } else {
        (LOGIN_REQUIRED.to_string(), LOGIN_REQUIRED.to_string())
    };

    let mut record = ItemRecord::new(SCHEMA);
    record.set("name", name).expect("univstore schema");
    record.set("price", price).expect("univstore schema");
    record.set("stock", stock).expect("univstore schema");
    record.set("thumbnail", thumbnail).expect("univstore schema");
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::item::AttrValue;

    fn adapter() -> UnivStoreAdapter {
        UnivStoreAdapter::new(CredentialConfig::default(), SessionConfig::new("test-agent", 10))
    }

    #[tokio::test]
    async fn standardize_matches_item_urls() {
        let url = adapter().standardize("https://univstore.com/item/4821").await;
        assert_eq!(url.as_deref(), Some("https://univstore.com/item/4821"));

        // Trailing junk is cut at the canonical boundary.
        let url = adapter()
            .standardize("https://univstore.com/item/4821?utm_source=share")
            .await;
        assert_eq!(url.as_deref(), Some("https://univstore.com/item/4821"));
    }

    #[tokio::test]
    async fn standardize_rejects_non_item_urls() {
        assert_eq!(adapter().standardize("https://univstore.com/brand/apple").await, None);
        assert_eq!(adapter().standardize("https://example.com/item/1").await, None);
    }

    const PRODUCT_PAGE: &str = r#"
        <html><body>
        <main>
            <div class="usItemAreaTop"><div>
                <div class="usItemCardController"><div class="usItemCardInfo">
                    <div class="usItemCardInfoName"><a><span>노트북</span></a></div>
                    <div class="usItemCardInfoPrice2">1,890,000</div>
                </div></div>
            </div></div>
            <div class="swiper-slide swiper-lazy" data-background="https://univstore.com/img/item.jpg"></div>
        </main>
        </body></html>
    "#;

    #[test]
    fn parse_without_login_uses_placeholders() {
        let record = parse_product(PRODUCT_PAGE, "u1", false).unwrap();

        assert_eq!(record.get("name").unwrap(), &AttrValue::Text("노트북".into()));
        assert_eq!(record.get("price").unwrap(), &AttrValue::Text(LOGIN_REQUIRED.into()));
        assert_eq!(record.get("stock").unwrap(), &AttrValue::Text(LOGIN_REQUIRED.into()));
        assert_eq!(record.thumbnail(), Some("https://univstore.com/img/item.jpg"));
    }

    #[test]
    fn parse_with_login_reads_price_and_stock() {
        let record = parse_product(PRODUCT_PAGE, "u1", true).unwrap();
        assert_eq!(record.get("price").unwrap(), &AttrValue::Text("1,890,000원".into()));
        assert_eq!(record.get("stock").unwrap(), &AttrValue::Text("재고 있음".into()));
    }

    #[test]
    fn parse_with_login_detects_out_of_stock() {
        let page = PRODUCT_PAGE.replace(
            r#"<div class="usItemCardInfoPrice2">1,890,000</div>"#,
            r#"<div class="usItemCardInfoPrice2">1,890,000</div><div class="usOutofstockMessage">품절</div>"#,
        );

        let record = parse_product(&page, "u1", true).unwrap();
        assert_eq!(record.get("stock").unwrap(), &AttrValue::Text("품절".into()));
    }
}
