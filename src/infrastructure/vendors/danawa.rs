//! Danawa adapter
//!
//! Canonical product URL form: `https://prod.danawa.com/info/?pcode={pcode}`.
//! App share links (`danawa.page.link`) are resolved with one GET before the
//! pcode is extracted. Danawa is a price aggregator, so the record carries
//! the lowest price and the lowest card price rather than stock data.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::future::join_all;
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::warn;
use url::Url;

use crate::domain::item::{AttrKind, AttrSpec, ItemRecord};
use crate::domain::vendor::{ScrapeError, VendorAdapter, VendorMeta};
use crate::infrastructure::http::{get_text, resolve_final_url, SessionConfig};
use crate::infrastructure::vendors::{collect_batch, sel, select_attr, select_text};

static SCHEMA: &[AttrSpec] = &[
    AttrSpec::new("name", "상품명", AttrKind::Text),
    AttrSpec::new("price", "최저가", AttrKind::Text),
    AttrSpec::new("card_price", "카드 최저가", AttrKind::Text),
    AttrSpec::unlabeled("thumbnail", AttrKind::Text),
];

static META: VendorMeta = VendorMeta {
    id: "danawa",
    label: "다나와",
    schema: SCHEMA,
};

static NAME_SEL: Lazy<Selector> =
    Lazy::new(|| sel("#blog_content > div.summary_info > div.top_summary > h3 > span"));
static THUMBNAIL_SEL: Lazy<Selector> = Lazy::new(|| sel("img#baseImage"));
static NO_PRICE_SEL: Lazy<Selector> = Lazy::new(|| {
    sel("#blog_content > div.summary_info > div.detail_summary > div.summary_left > div.lowest_area > div.no_data > p > strong")
});
static PRICE_SEL: Lazy<Selector> =
    Lazy::new(|| sel("div.lowest_area > div.lowest_top > div.row.lowest_price > span.lwst_prc > a > em"));
static CARD_PRICE_SEL: Lazy<Selector> = Lazy::new(|| {
    sel("div.lowest_area > div.lowest_list > table > tbody.card_list > tr > td.price > a > span.txt_prc > em")
});
static CARD_NAME_SEL: Lazy<Selector> = Lazy::new(|| {
    sel("div.lowest_area > div.lowest_list > table > tbody.card_list > tr > td.price > a > span.txt_dsc")
});

pub struct DanawaAdapter {
    session: SessionConfig,
}

impl DanawaAdapter {
    pub fn new(session: SessionConfig) -> Self {
        Self { session }
    }

    async fn fetch_with(&self, client: &Client, url: &str) -> Result<ItemRecord, ScrapeError> {
        let body = get_text(client, url).await?;
        parse_product(&body, url)
    }
}

#[async_trait]
impl VendorAdapter for DanawaAdapter {
    fn meta(&self) -> &VendorMeta {
        &META
    }

    async fn standardize(&self, input: &str) -> Option<String> {
        let url = if input.contains("danawa.page.link") {
            // Mobile app share link; one round trip to the real URL.
            let client = self.session.build().ok()?;
            match resolve_final_url(&client, input).await {
                Ok(resolved) => resolved.to_string(),
                Err(error) => {
                    warn!(%error, "failed to resolve danawa share link");
                    return None;
                }
            }
        } else {
            input.to_string()
        };

        let parsed = Url::parse(&url).ok()?;
        let pcode_key = if url.contains("prod.danawa.com") {
            "pcode"
        } else if url.contains("m.danawa.com/product") {
            "code"
        } else {
            return None;
        };

        let pcode = parsed
            .query_pairs()
            .find(|(key, _)| key == pcode_key)
            .map(|(_, value)| value.into_owned())?;

        Some(format!("https://prod.danawa.com/info/?pcode={pcode}"))
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

    let thumbnail = select_attr(&doc, &THUMBNAIL_SEL, "src")
        .map(|src| {
            if src.starts_with("//") {
                format!("https:{src}")
            } else {
                src
            }
        })
        .unwrap_or_default();

    // "No lowest price" block replaces the price table entirely.
    let (price, card_price) = match select_text(&doc, &NO_PRICE_SEL) {
        Some(no_price) => (no_price, String::new()),
        None => {
            let price = select_text(&doc, &PRICE_SEL)
                .map(|p| format!("{p}원"))
                .ok_or_else(|| ScrapeError::parse(url, "price"))?;

            let card_price = match select_text(&doc, &CARD_PRICE_SEL) {
                Some(amount) => match select_text(&doc, &CARD_NAME_SEL) {
                    Some(card) => format!("{amount}원 ({card})"),
                    None => format!("{amount}원"),
                },
                None => String::new(),
            };

            (price, card_price)
        }
    };

    let mut record = ItemRecord::new(SCHEMA);
    record.set("name", name).expect("danawa schema");
    record.set("price", price).expect("danawa schema");
    record.set("card_price", card_price).expect("danawa schema");
    record.set("thumbnail", thumbnail).expect("danawa schema");
    Ok(record)
}
