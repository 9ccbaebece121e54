//! Coupang adapter
//!
//! Canonical product URL form:
//! `https://www.coupang.com/vp/products/{id}?itemId=..&vendorItemId=..`
//! Accepts mobile URLs, affiliate short links (`link.coupang.com`) and the
//! app's share text, whose embedded short link is resolved with one GET.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use futures::future::join_all;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

use crate::domain::item::{AttrKind, AttrSpec, AttrValue, ItemRecord};
use crate::domain::vendor::{ScrapeError, VendorAdapter, VendorMeta};
use crate::infrastructure::config::CoupangConfig;
use crate::infrastructure::http::{get_text, resolve_final_url, SessionConfig};
use crate::infrastructure::vendors::{collect_batch, digits, sel, select_attr, select_text};

static SCHEMA: &[AttrSpec] = &[
    AttrSpec::new("name", "상품명", AttrKind::Text),
    AttrSpec::unlabeled("option", AttrKind::Map),
    AttrSpec::with_unit("price", "가격", AttrKind::Int, "원"),
    AttrSpec::new("quantity", "재고", AttrKind::Text),
    AttrSpec::new("card_benefit", "카드 할인", AttrKind::List),
    AttrSpec::with_unit("card_benefit_rate", "최대 카드 할인율", AttrKind::Int, "%"),
    AttrSpec::new("preorder", "사전예약", AttrKind::Text),
    AttrSpec::unlabeled("thumbnail", AttrKind::Text),
];

static META: VendorMeta = VendorMeta {
    id: "coupang",
    label: "쿠팡",
    schema: SCHEMA,
};

static NAME_SEL: Lazy<Selector> = Lazy::new(|| sel("h2.prod-buy-header__title"));
static PRICE_SEL: Lazy<Selector> = Lazy::new(|| sel("span.total-price > strong"));
static OOS_SEL: Lazy<Selector> = Lazy::new(|| sel("div.oos-label"));
static OPTION_TITLE_SEL: Lazy<Selector> = Lazy::new(|| sel("span.title"));
static OPTION_VALUE_SEL: Lazy<Selector> = Lazy::new(|| sel("span.value"));
static BENEFIT_RATE_SEL: Lazy<Selector> = Lazy::new(|| sel("span.benefit-label"));
static BENEFIT_CARD_SEL: Lazy<Selector> = Lazy::new(|| sel("div.ccid-benefit-badge__inr img"));
static QUANTITY_SEL: Lazy<Selector> = Lazy::new(|| sel("div.aos-label"));
static PREORDER_SEL: Lazy<Selector> = Lazy::new(|| sel("span.prod-pre-order-badge-text"));
static THUMBNAIL_SEL: Lazy<Selector> = Lazy::new(|| sel("img.prod-image__detail"));

static PRODUCT_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"products/([0-9]+)").expect("static regex must parse"));

/// Card issuer names recognized in benefit badge image URLs.
const CARD_ISSUERS: &[(&str, &str)] = &[
    ("hana-sk", "하나"),
    ("kb", "국민"),
    ("lotte", "롯데"),
    ("shinhan", "신한"),
    ("hyundai", "현대"),
    ("woori", "우리"),
    ("samsung", "삼성"),
    ("bc", "BC"),
];

const SHARE_TEXT_PREFIX: &str = "쿠팡을 추천합니다!";

pub struct CoupangAdapter {
    config: CoupangConfig,
    session: SessionConfig,
}

impl CoupangAdapter {
    pub fn new(config: CoupangConfig, session: SessionConfig) -> Self {
        Self { config, session }
    }

    async fn login(&self, client: &Client) -> Result<(), ScrapeError> {
        client
            .get("https://login.coupang.com/login/login.pang")
            .send()
            .await
            .map_err(|err| ScrapeError::Login {
                vendor: META.id,
                reason: err.to_string(),
            })?;

        let form = [
            ("email", self.config.email.as_str()),
            ("password", self.config.password.as_str()),
            ("rememberMe", "false"),
        ];

        client
            .post("https://login.coupang.com/login/loginProcess.pang")
            .form(&form)
            .send()
            .await
            .map_err(|err| ScrapeError::Login {
                vendor: META.id,
                reason: err.to_string(),
            })?;

        debug!("logged in to coupang");
        Ok(())
    }

    async fn fetch_with(&self, client: &Client, url: &str) -> Result<ItemRecord, ScrapeError> {
        let body = get_text(client, url).await?;
        parse_product(&body, url, self.config.use_wow_price)
    }
}

#[async_trait]
impl VendorAdapter for CoupangAdapter {
    fn meta(&self) -> &VendorMeta {
        &META
    }

    async fn standardize(&self, input: &str) -> Option<String> {
        if input.contains("m.coupang.com") {
            return Some(input.replacen("m.", "www.", 1).replacen("vm", "vp", 1));
        }

        if let Some(rest) = input.strip_prefix(SHARE_TEXT_PREFIX) {
            // Share text carries the short link on its third line.
            let link = input.lines().nth(2).or_else(|| rest.lines().last())?;
            let client = self.session.build().ok()?;

            return match resolve_final_url(&client, link.trim()).await {
                Ok(final_url) => canonical_from_params(&final_url),
                Err(error) => {
                    warn!(%error, "failed to resolve coupang share link");
                    None
                }
            };
        }

        if input.contains("link.coupang.com") {
            return canonical_from_params(&Url::parse(input).ok()?);
        }

        if input.contains("www.coupang.com/vp/products/") {
            let url = Url::parse(input).ok()?;
            let product_id = PRODUCT_ID_RE.captures(url.path())?.get(1)?.as_str().to_string();
            let (item_id, vendor_item_id) = item_params(&url)?;

            return Some(format!(
                "https://www.coupang.com/vp/products/{product_id}?itemId={item_id}&vendorItemId={vendor_item_id}"
            ));
        }

        None
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

fn item_params(url: &Url) -> Option<(String, String)> {
    let mut item_id = None;
    let mut vendor_item_id = None;

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "itemId" => item_id = Some(value.into_owned()),
            "vendorItemId" => vendor_item_id = Some(value.into_owned()),
            _ => {}
        }
    }

    Some((item_id?, vendor_item_id?))
}

fn canonical_from_params(url: &Url) -> Option<String> {
    let page_value = url
        .query_pairs()
        .find(|(key, _)| key == "pageValue")
        .map(|(_, value)| value.into_owned())?;
    let (item_id, vendor_item_id) = item_params(url)?;

    Some(format!(
        "https://www.coupang.com/vp/products/{page_value}?itemId={item_id}&vendorItemId={vendor_item_id}"
    ))
}

/// Parse one product detail page. Out-of-stock is represented as price 0
/// plus `품절`, never as an error.
fn parse_product(body: &str, url: &str, use_wow_price: bool) -> Result<ItemRecord, ScrapeError> {
    let doc = Html::parse_document(body);

    let name = select_text(&doc, &NAME_SEL).ok_or_else(|| ScrapeError::parse(url, "name"))?;

    let option: BTreeMap<String, String> = doc
        .select(&OPTION_TITLE_SEL)
        .zip(doc.select(&OPTION_VALUE_SEL))
        .map(|(title, value)| {
            (
                title.text().collect::<String>().trim().to_string(),
                value.text().collect::<String>().trim().to_string(),
            )
        })
        .collect();

    let prices: Vec<i64> = doc
        .select(&PRICE_SEL)
        .map(|el| digits(&el.text().collect::<String>()))
        .collect();

    let out_of_stock = doc.select(&OOS_SEL).next().is_some() || prices.is_empty();
    let price = if out_of_stock {
        0
    } else if use_wow_price {
        // Second price element is the membership price when present.
        prices.get(1).copied().filter(|&p| p > 0).unwrap_or(prices[0])
    } else {
        prices[0]
    };

    let card_benefit_rate = doc
        .select(&BENEFIT_RATE_SEL)
        .map(|el| digits(&el.text().collect::<String>()))
        .max()
        .unwrap_or(0);

    let mut card_benefit = Vec::new();
    for img in doc.select(&BENEFIT_CARD_SEL) {
        let Some(src) = img.value().attr("src") else {
            continue;
        };
        for (marker, issuer) in CARD_ISSUERS {
            if src.contains(marker) {
                card_benefit.push(issuer.to_string());
                break;
            }
        }
    }

    let quantity = match select_text(&doc, &QUANTITY_SEL) {
        Some(text) if !text.is_empty() => text,
        _ if price == 0 => "품절".to_string(),
        _ => "재고 있음".to_string(),
    };

    let preorder = match select_text(&doc, &PREORDER_SEL) {
        Some(text) if !text.is_empty() => "사전예약 중".to_string(),
        _ => "사전예약 중 아님".to_string(),
    };

    let thumbnail = select_attr(&doc, &THUMBNAIL_SEL, "src")
        .map(|src| {
            if src.starts_with("//") {
                format!("https:{src}")
            } else {
                src
            }
        })
        .unwrap_or_default();

    let mut record = ItemRecord::new(SCHEMA);
    record.set("name", name).expect("coupang schema");
    record
        .set("option", AttrValue::Map(option))
        .expect("coupang schema");
    record.set("price", price).expect("coupang schema");
    record.set("quantity", quantity).expect("coupang schema");
    record
        .set("card_benefit", card_benefit)
        .expect("coupang schema");
    record
        .set("card_benefit_rate", card_benefit_rate)
        .expect("coupang schema");
    record.set("preorder", preorder).expect("coupang schema");
    record.set("thumbnail", thumbnail).expect("coupang schema");
    Ok(record)
}
