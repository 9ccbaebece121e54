//! 11st (11번가) adapter
//!
//! Canonical product URL form: `https://www.11st.co.kr/products/{id}` with
//! query strings and app share suffixes stripped. Overseas listings carry
//! an estimated customs agency fee; domestic ones report it as absent.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::future::join_all;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};

use crate::domain::item::{AttrKind, AttrSpec, ItemRecord};
use crate::domain::vendor::{ScrapeError, VendorAdapter, VendorMeta};
use crate::infrastructure::http::{get_text, SessionConfig};
use crate::infrastructure::vendors::{collect_batch, sel, select_attr, select_text};

static SCHEMA: &[AttrSpec] = &[
    AttrSpec::new("name", "상품명", AttrKind::Text),
    AttrSpec::new("price", "가격", AttrKind::Text),
    AttrSpec::new("coupon", "쿠폰", AttrKind::Text),
    AttrSpec::new("delivery", "배송비", AttrKind::Text),
    AttrSpec::new("agency_fee", "예상 통관대행료", AttrKind::Text),
    AttrSpec::unlabeled("thumbnail", AttrKind::Text),
];

static META: VendorMeta = VendorMeta {
    id: "11st",
    label: "11번가",
    schema: SCHEMA,
};

static NAME_SEL: Lazy<Selector> = Lazy::new(|| sel("h1.title"));
static PRICE_SEL: Lazy<Selector> = Lazy::new(|| sel("dl.price > dd > strong"));
static COUPON_SEL: Lazy<Selector> = Lazy::new(|| sel("dl > div.coupon"));
static AGENCY_FEE_SEL: Lazy<Selector> = Lazy::new(|| sel("div.c_product_agency_fee > div > dl > dd"));
static DELIVERY_SEL: Lazy<Selector> = Lazy::new(|| sel("div.delivery"));
static DELIVERY_ABROAD_SEL: Lazy<Selector> = Lazy::new(|| sel("div.delivery_abroad"));
static THUMBNAIL_SEL: Lazy<Selector> = Lazy::new(|| sel("#productImg > div > img"));
static THUMBNAIL_FALLBACK_SEL: Lazy<Selector> = Lazy::new(|| {
    sel("div.l_product_side_view > div.c_product_view_img > div.img_full.img_full_height > img")
});

static SHARE_SUFFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/share\?gsreferrer=.*$").expect("static regex must parse"));

pub struct EleventhStAdapter {
    session: SessionConfig,
}

impl EleventhStAdapter {
    pub fn new(session: SessionConfig) -> Self {
        Self { session }
    }

    async fn fetch_with(&self, client: &Client, url: &str) -> Result<ItemRecord, ScrapeError> {
        let body = get_text(client, url).await?;
        parse_product(&body, url)
    }
}

#[async_trait]
impl VendorAdapter for EleventhStAdapter {
    fn meta(&self) -> &VendorMeta {
        &META
    }

    async fn standardize(&self, input: &str) -> Option<String> {
        if input.contains("share?gsreferrer=") {
            return Some(SHARE_SUFFIX_RE.replace(input, "").into_owned());
        }

        if input.contains("www.11st.co.kr/products") || input.contains("m.11st.co.kr/products") {
            let base = input.split('?').next()?;
            return Some(base.to_string());
        }

        None
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
    let price = select_text(&doc, &PRICE_SEL).ok_or_else(|| ScrapeError::parse(url, "price"))?;

    let coupon = if doc.select(&COUPON_SEL).next().is_some() {
        "있음"
    } else {
        "없음"
    };

    let agency_fee = match select_text(&doc, &AGENCY_FEE_SEL) {
        Some(text) if text.contains("없음") => "없음".to_string(),
        Some(text) => text
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_string(),
        None => "해외직구 상품 아님".to_string(),
    };

    let delivery_text = select_text(&doc, &DELIVERY_SEL)
        .or_else(|| select_text(&doc, &DELIVERY_ABROAD_SEL))
        .ok_or_else(|| ScrapeError::parse(url, "delivery"))?;
    let delivery = if delivery_text.contains("무료배송") {
        "무료배송"
    } else {
        "유료배송"
    };

    let thumbnail = select_attr(&doc, &THUMBNAIL_SEL, "src")
        .or_else(|| select_attr(&doc, &THUMBNAIL_FALLBACK_SEL, "src"))
        .unwrap_or_default();

    let mut record = ItemRecord::new(SCHEMA);
    record.set("name", name).expect("11st schema");
    record.set("price", price).expect("11st schema");
    record.set("coupon", coupon).expect("11st schema");
    record.set("delivery", delivery).expect("11st schema");
    record.set("agency_fee", agency_fee).expect("11st schema");
    record.set("thumbnail", thumbnail).expect("11st schema");
    Ok(record)
}
