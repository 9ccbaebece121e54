//! Naver smartstore/brand store adapter
//!
//! Canonical product URL forms:
//! `https://smartstore.naver.com/{store}/products/{id}` and
//! `https://brand.naver.com/{store}/products/{id}`. `naver.me` short links
//! are resolved with one GET; mobile hosts are folded into the desktop form.
//!
//! The benefit price and maximum points are only rendered for logged-in
//! sessions, which require a real browser; over plain HTTP those fields
//! stay empty and only name/price/availability are tracked.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::future::join_all;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::warn;

use crate::domain::item::{AttrKind, AttrSpec, ItemRecord};
use crate::domain::vendor::{ScrapeError, VendorAdapter, VendorMeta};
use crate::infrastructure::config::CredentialConfig;
use crate::infrastructure::http::{get_text, resolve_final_url, SessionConfig};
use crate::infrastructure::vendors::{collect_batch, sel, select_attr, select_text};

static SCHEMA: &[AttrSpec] = &[
    AttrSpec::new("name", "상품명", AttrKind::Text),
    AttrSpec::new("price", "가격", AttrKind::Text),
    AttrSpec::new("benefit_price", "혜택가", AttrKind::Text),
    AttrSpec::new("max_point", "최대 적립 포인트", AttrKind::Text),
    AttrSpec::new("availability", "재고", AttrKind::Text),
    AttrSpec::unlabeled("thumbnail", AttrKind::Text),
];

static META: VendorMeta = VendorMeta {
    id: "naver",
    label: "네이버",
    schema: SCHEMA,
};

static NAME_SEL: Lazy<Selector> = Lazy::new(|| {
    sel("#content > div > div._2-I30XS1lA > div._2QCa6wHHPy > fieldset > div._3k440DUKzy > div._1eddO7u4UC > h3")
});
static PRICE_SEL: Lazy<Selector> = Lazy::new(|| {
    sel("#content > div > div._2-I30XS1lA > div._2QCa6wHHPy > fieldset > div._3k440DUKzy > div.WrkQhIlUY0 > div > strong > span._1LY7DqCnwR")
});
static THUMBNAIL_SEL: Lazy<Selector> = Lazy::new(|| {
    sel("#content > div > div._2-I30XS1lA > div._3rXou9cfw2 > div.bd_23RhM > div.bd_1uFKu > img")
});

static PRODUCT_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"https://(?:m\.)?(brand|smartstore)\.naver\.com/([^\s/]+)/products/([0-9]+)")
        .expect("static regex must parse")
});

const OUT_OF_STOCK_MARKER: &str = "이 상품은 현재 구매하실 수 없는 상품입니다.";

pub struct NaverAdapter {
    session: SessionConfig,
}

impl NaverAdapter {
    pub fn new(config: CredentialConfig, session: SessionConfig) -> Self {
        if config.login {
            warn!(
                "naver login requires a browser session and is not supported; \
                 benefit price and maximum points will be unavailable"
            );
        }
        Self { session }
    }

    async fn fetch_with(&self, client: &Client, url: &str) -> Result<ItemRecord, ScrapeError> {
        let body = get_text(client, url).await?;
        parse_product(&body, url)
    }
}

#[async_trait]
impl VendorAdapter for NaverAdapter {
    fn meta(&self) -> &VendorMeta {
        &META
    }

    async fn standardize(&self, input: &str) -> Option<String> {
        let url = if input.contains("naver.me") {
            let client = self.session.build().ok()?;
            match resolve_final_url(&client, input).await {
                Ok(resolved) => resolved.to_string(),
                Err(error) => {
                    warn!(%error, "failed to resolve naver.me short link");
                    return None;
                }
            }
        } else {
            input.to_string()
        };

        let captures = PRODUCT_URL_RE.captures(&url)?;
        Some(format!(
            "https://{}.naver.com/{}/products/{}",
            &captures[1], &captures[2], &captures[3]
        ))
    }

    async fn fetch_one(&self, url: &str) -> Result<ItemRecord, ScrapeError> {
        let client = self.session.build()?;
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
        let client = &client;
        let results = join_all(urls.iter().map(|url| async move {
            (url.clone(), self.fetch_with(client, url).await)
        }))
        .await;

        Ok(collect_batch(META.id, results))
    }
}

fn parse_product(body: &str, url: &str) -> Result<ItemRecord, ScrapeError> {
    let doc = Html::parse_document(body);

    let name = select_text(&doc, &NAME_SEL).ok_or_else(|| ScrapeError::parse(url, "name"))?;

    let price = select_text(&doc, &PRICE_SEL)
        .map(|p| format!("{p}원"))
        .ok_or_else(|| ScrapeError::parse(url, "price"))?;

    let thumbnail = select_attr(&doc, &THUMBNAIL_SEL, "src").unwrap_or_default();

    let availability = if body.contains(OUT_OF_STOCK_MARKER) {
        "품절"
    } else {
        "재고 있음"
    };

    let mut record = ItemRecord::new(SCHEMA);
    record.set("name", name).expect("naver schema");
    record.set("price", price).expect("naver schema");
    record.set("availability", availability).expect("naver schema");
    record.set("thumbnail", thumbnail).expect("naver schema");
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::item::AttrValue;

    fn adapter() -> NaverAdapter {
        NaverAdapter::new(CredentialConfig::default(), SessionConfig::new("test-agent", 10))
    }

    #[tokio::test]
    async fn standardize_accepts_smartstore_urls() {
        let url = adapter()
            .standardize("https://smartstore.naver.com/storename/products/1234567?NaPm=xyz")
            .await;
        assert_eq!(
            url.as_deref(),
            Some("https://smartstore.naver.com/storename/products/1234567")
        );
    }

    #[tokio::test]
    async fn standardize_folds_mobile_brand_urls() {
        let url = adapter()
            .standardize("https://m.brand.naver.com/somebrand/products/42")
            .await;
        assert_eq!(url.as_deref(), Some("https://brand.naver.com/somebrand/products/42"));
    }

    #[tokio::test]
    async fn standardize_rejects_other_naver_pages() {
        assert_eq!(
            adapter().standardize("https://shopping.naver.com/home").await,
            None
        );
    }

    const PRODUCT_PAGE: &str = r#"
        <html><body>
        <div id="content"><div>
            <div class="_2-I30XS1lA">
                <div class="_2QCa6wHHPy"><fieldset>
                    <div class="_3k440DUKzy">
                        <div class="_1eddO7u4UC"><h3>키보드</h3></div>
                        <div class="WrkQhIlUY0"><div><strong><span class="_1LY7DqCnwR">59,000</span></strong></div></div>
                    </div>
                </fieldset></div>
                <div class="_3rXou9cfw2"><div class="bd_23RhM"><div class="bd_1uFKu">
                    <img src="https://shop-phinf.pstatic.net/item.jpg">
                </div></div></div>
            </div>
        </div></div>
        </body></html>
    "#;

    #[test]
    fn parse_extracts_name_price_thumbnail() {
        let record = parse_product(PRODUCT_PAGE, "u1").unwrap();

        assert_eq!(record.get("name").unwrap(), &AttrValue::Text("키보드".into()));
        assert_eq!(record.get("price").unwrap(), &AttrValue::Text("59,000원".into()));
        assert_eq!(
            record.get("availability").unwrap(),
            &AttrValue::Text("재고 있음".into())
        );
        assert_eq!(record.thumbnail(), Some("https://shop-phinf.pstatic.net/item.jpg"));

        // Login-only fields stay empty over plain HTTP.
        assert!(record.get("benefit_price").unwrap().is_empty());
        assert!(record.get("max_point").unwrap().is_empty());
    }

    #[test]
    fn parse_detects_out_of_stock_marker() {
        let page = PRODUCT_PAGE.replace(
            "</body>",
            "<p>이 상품은 현재 구매하실 수 없는 상품입니다.</p></body>",
        );

        let record = parse_product(&page, "u1").unwrap();
        assert_eq!(record.get("availability").unwrap(), &AttrValue::Text("품절".into()));
    }
}
