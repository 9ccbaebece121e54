//! Snapshot differ
//!
//! Compares two snapshots of the same shape field by field and produces
//! structured change events. Traversal follows the tracked URL set's order
//! (not mapping order) so output is deterministic and matches the order the
//! user added products in, independent of fetch completion order.

use serde::Serialize;

use crate::domain::item::{AttrValue, ItemRecord, THUMBNAIL_KEY};
use crate::domain::snapshot::{Snapshot, TrackedUrls};
use crate::domain::vendor::VendorMeta;

/// Rendered in place of an empty/missing value, to distinguish "no value"
/// from "empty string value".
pub const NO_DATA: &str = "정보 없음";

/// One per-attribute entry of a change event.
///
/// `changed: false` entries are informational context (current value of an
/// unchanged, non-empty field); `changed: true` entries carry both sides.
/// Map-kind attributes are reported per sub-key, with the sub-key name as
/// the label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDiff {
    pub key: &'static str,
    pub label: Option<String>,
    pub unit: Option<&'static str>,
    pub before: Option<AttrValue>,
    pub after: Option<AttrValue>,
    pub changed: bool,
}

impl FieldDiff {
    fn unchanged(key: &'static str, label: Option<String>, unit: Option<&'static str>, after: AttrValue) -> Self {
        Self {
            key,
            label,
            unit,
            before: None,
            after: Some(after),
            changed: false,
        }
    }

    fn changed(
        key: &'static str,
        label: Option<String>,
        unit: Option<&'static str>,
        before: Option<AttrValue>,
        after: Option<AttrValue>,
    ) -> Self {
        Self {
            key,
            label,
            unit,
            before,
            after,
            changed: true,
        }
    }

    fn render(&self, value: &Option<AttrValue>) -> String {
        match value {
            Some(v) if !v.is_empty() => match self.unit {
                Some(unit) => format!("{}{unit}", v.display()),
                None => v.display(),
            },
            _ => NO_DATA.to_string(),
        }
    }

    /// Display form of the previous value (`정보 없음` when absent/empty).
    pub fn render_before(&self) -> String {
        self.render(&self.before)
    }

    /// Display form of the current value.
    pub fn render_after(&self) -> String {
        self.render(&self.after)
    }
}

/// How one item's record differs between two snapshots.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeEvent {
    pub vendor: &'static str,
    pub vendor_label: &'static str,
    pub url: String,
    /// Image URL routed separately from field rendering.
    pub thumbnail: Option<String>,
    /// Per-attribute entries in schema order.
    pub fields: Vec<FieldDiff>,
}

impl ChangeEvent {
    /// Number of entries that actually changed.
    pub fn changed_count(&self) -> usize {
        self.fields.iter().filter(|f| f.changed).count()
    }
}

/// Diff two records of the same schema. `None` when the records are equal.
///
/// Field entries follow schema order. The thumbnail attribute never appears
/// as a field entry; unchanged empty fields are omitted.
pub fn diff_records(old: &ItemRecord, new: &ItemRecord) -> Option<Vec<FieldDiff>> {
    if old == new {
        return None;
    }

    let mut fields = Vec::new();

    for (spec, new_value) in new.iter() {
        if spec.key == THUMBNAIL_KEY {
            continue;
        }

        // Same schema on both sides, so the lookup cannot miss.
        let old_value = match old.get(spec.key) {
            Ok(v) => v,
            Err(_) => continue,
        };

        match (old_value, new_value) {
            (AttrValue::Map(old_map), AttrValue::Map(new_map)) => {
                if old_map == new_map {
                    // Unchanged map: each sub-key listed informationally.
                    for (sub_key, sub_value) in new_map {
                        fields.push(FieldDiff::unchanged(
                            spec.key,
                            Some(sub_key.clone()),
                            spec.unit,
                            AttrValue::Text(sub_value.clone()),
                        ));
                    }
                } else {
                    // Changed map: report sub-key by sub-key, covering
                    // sub-keys present on either side.
                    let mut sub_keys: Vec<&String> = new_map.keys().collect();
                    for key in old_map.keys() {
                        if !new_map.contains_key(key) {
                            sub_keys.push(key);
                        }
                    }

                    for sub_key in sub_keys {
                        let before = old_map.get(sub_key).cloned().map(AttrValue::Text);
                        let after = new_map.get(sub_key).cloned().map(AttrValue::Text);

                        if before == after {
                            if let Some(after) = after {
                                fields.push(FieldDiff::unchanged(
                                    spec.key,
                                    Some(sub_key.clone()),
                                    spec.unit,
                                    after,
                                ));
                            }
                        } else {
                            fields.push(FieldDiff::changed(
                                spec.key,
                                Some(sub_key.clone()),
                                spec.unit,
                                before,
                                after,
                            ));
                        }
                    }
                }
            }
            _ if old_value == new_value => {
                // Unchanged scalar/list: informational when non-empty,
                // omitted when empty to reduce noise.
                if !new_value.is_empty() {
                    fields.push(FieldDiff::unchanged(
                        spec.key,
                        spec.label.map(str::to_string),
                        spec.unit,
                        new_value.clone(),
                    ));
                }
            }
            _ => {
                fields.push(FieldDiff::changed(
                    spec.key,
                    spec.label.map(str::to_string),
                    spec.unit,
                    Some(old_value.clone()),
                    Some(new_value.clone()),
                ));
            }
        }
    }

    Some(fields)
}

/// Diff two snapshots, producing events in vendor-then-URL order.
///
/// Vendor order follows `vendors`; URL order follows the tracked set. A URL
/// absent from the old snapshot is newly added and silently adopted; a URL
/// absent from the new snapshot was removed mid-cycle and is skipped.
pub fn diff_snapshots<'a>(
    old: &Snapshot,
    new: &Snapshot,
    tracked: &TrackedUrls,
    vendors: impl IntoIterator<Item = &'a VendorMeta>,
) -> Vec<ChangeEvent> {
    let mut events = Vec::new();

    for meta in vendors {
        for url in tracked.urls(meta.id) {
            let Some(new_record) = new.get(meta.id, url) else {
                continue;
            };
            let Some(old_record) = old.get(meta.id, url) else {
                continue;
            };

            if let Some(fields) = diff_records(old_record, new_record) {
                events.push(ChangeEvent {
                    vendor: meta.id,
                    vendor_label: meta.label,
                    url: url.clone(),
                    thumbnail: new_record.thumbnail().map(str::to_string),
                    fields,
                });
            }
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::item::{AttrKind, AttrSpec};
    use std::collections::BTreeMap;

    static SCHEMA: &[AttrSpec] = &[
        AttrSpec::new("name", "상품명", AttrKind::Text),
        AttrSpec::unlabeled("option", AttrKind::Map),
        AttrSpec::with_unit("price", "가격", AttrKind::Int, "원"),
        AttrSpec::new("card_benefit", "카드 할인", AttrKind::List),
        AttrSpec::unlabeled("thumbnail", AttrKind::Text),
    ];

    static META: VendorMeta = VendorMeta {
        id: "coupang",
        label: "쿠팡",
        schema: SCHEMA,
    };

    fn record(name: &str, price: i64) -> ItemRecord {
        let mut r = ItemRecord::new(SCHEMA);
        r.set("name", name).unwrap();
        r.set("price", price).unwrap();
        r
    }

    fn option_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn identical_records_produce_no_diff() {
        let a = record("물건", 10000);
        assert!(diff_records(&a, &a.clone()).is_none());
    }

    #[test]
    fn diff_is_empty_iff_records_equal() {
        let a = record("물건", 10000);
        let b = record("물건", 9000);

        assert!(diff_records(&a, &b).is_some());
        assert!(diff_records(&b, &a).is_some());

        let c = record("물건", 10000);
        assert!(diff_records(&a, &c).is_none());
    }

    #[test]
    fn changed_field_carries_both_values() {
        let old = record("물건", 10000);
        let new = record("물건", 9000);

        let fields = diff_records(&old, &new).unwrap();
        let price = fields.iter().find(|f| f.key == "price").unwrap();

        assert!(price.changed);
        assert_eq!(price.before, Some(AttrValue::Int(10000)));
        assert_eq!(price.after, Some(AttrValue::Int(9000)));
        assert_eq!(price.render_before(), "10000원");
        assert_eq!(price.render_after(), "9000원");
    }

    #[test]
    fn unchanged_nonempty_fields_are_informational() {
        let old = record("물건", 10000);
        let new = record("물건", 9000);

        let fields = diff_records(&old, &new).unwrap();
        let name = fields.iter().find(|f| f.key == "name").unwrap();

        assert!(!name.changed);
        assert_eq!(name.after, Some(AttrValue::Text("물건".to_string())));
    }

    #[test]
    fn unchanged_empty_fields_are_omitted() {
        let old = record("물건", 10000);
        let new = record("물건", 9000);

        // card_benefit is empty on both sides.
        let fields = diff_records(&old, &new).unwrap();
        assert!(fields.iter().all(|f| f.key != "card_benefit"));
    }

    #[test]
    fn thumbnail_never_appears_in_fields() {
        let mut old = record("물건", 10000);
        let mut new = record("물건", 9000);
        old.set("thumbnail", "https://img/a.jpg").unwrap();
        new.set("thumbnail", "https://img/b.jpg").unwrap();

        let fields = diff_records(&old, &new).unwrap();
        assert!(fields.iter().all(|f| f.key != "thumbnail"));
    }

    #[test]
    fn map_diff_reports_changed_sub_keys_individually() {
        let mut old = record("물건", 10000);
        let mut new = record("물건", 10000);
        old.set("option", option_map(&[("색상", "빨강"), ("수량", "1개")]))
            .unwrap();
        new.set("option", option_map(&[("색상", "파랑"), ("수량", "1개")]))
            .unwrap();

        let fields = diff_records(&old, &new).unwrap();
        let color = fields
            .iter()
            .find(|f| f.label.as_deref() == Some("색상"))
            .unwrap();
        let qty = fields
            .iter()
            .find(|f| f.label.as_deref() == Some("수량"))
            .unwrap();

        assert!(color.changed);
        assert_eq!(color.render_before(), "빨강");
        assert_eq!(color.render_after(), "파랑");

        // Unchanged sub-key still listed informationally.
        assert!(!qty.changed);
        assert_eq!(qty.after, Some(AttrValue::Text("1개".to_string())));
    }

    #[test]
    fn map_sub_key_missing_on_one_side_renders_sentinel() {
        let mut old = record("물건", 10000);
        let mut new = record("물건", 10000);
        old.set("option", option_map(&[("색상", "빨강")])).unwrap();
        new.set("option", option_map(&[("사이즈", "L")])).unwrap();

        let fields = diff_records(&old, &new).unwrap();
        let size = fields
            .iter()
            .find(|f| f.label.as_deref() == Some("사이즈"))
            .unwrap();
        let color = fields
            .iter()
            .find(|f| f.label.as_deref() == Some("색상"))
            .unwrap();

        assert!(size.changed);
        assert_eq!(size.render_before(), NO_DATA);
        assert_eq!(size.render_after(), "L");

        assert!(color.changed);
        assert_eq!(color.render_before(), "빨강");
        assert_eq!(color.render_after(), NO_DATA);
    }

    #[test]
    fn empty_value_renders_sentinel_not_empty_string() {
        let old = record("", 10000);
        let new = record("물건", 10000);

        let fields = diff_records(&old, &new).unwrap();
        let name = fields.iter().find(|f| f.key == "name").unwrap();
        assert_eq!(name.render_before(), NO_DATA);
        assert_eq!(name.render_after(), "물건");
    }

    fn snapshot_with(url: &str, record: ItemRecord) -> Snapshot {
        let mut snap = Snapshot::new();
        let mut items = std::collections::HashMap::new();
        items.insert(url.to_string(), record);
        snap.insert_vendor("coupang", items);
        snap
    }

    fn tracked_with(urls: &[&str]) -> TrackedUrls {
        let mut tracked = TrackedUrls::new();
        for url in urls {
            tracked.add("coupang", url.to_string()).unwrap();
        }
        tracked
    }

    #[test]
    fn price_change_emits_one_event() {
        let old = snapshot_with("u1", record("물건", 10000));
        let new = snapshot_with("u1", record("물건", 9000));
        let tracked = tracked_with(&["u1"]);

        let events = diff_snapshots(&old, &new, &tracked, [&META]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].vendor, "coupang");
        assert_eq!(events[0].url, "u1");
        assert_eq!(events[0].changed_count(), 1);
        assert!(events[0]
            .fields
            .iter()
            .any(|f| f.key == "price" && f.changed));
    }

    #[test]
    fn new_url_is_silently_adopted() {
        let old = Snapshot::new();
        let new = snapshot_with("u1", record("물건", 10000));
        let tracked = tracked_with(&["u1"]);

        let events = diff_snapshots(&old, &new, &tracked, [&META]);
        assert!(events.is_empty());
    }

    #[test]
    fn removed_url_is_skipped_without_error() {
        let old = snapshot_with("u1", record("물건", 10000));
        let new = Snapshot::new();
        let tracked = tracked_with(&["u1"]);

        let events = diff_snapshots(&old, &new, &tracked, [&META]);
        assert!(events.is_empty());
    }

    #[test]
    fn events_follow_tracked_url_order() {
        let mut old = Snapshot::new();
        let mut new = Snapshot::new();
        let mut old_items = std::collections::HashMap::new();
        let mut new_items = std::collections::HashMap::new();

        for (url, old_price, new_price) in
            [("u1", 100, 200), ("u2", 100, 100), ("u3", 300, 400)]
        {
            old_items.insert(url.to_string(), record("물건", old_price));
            new_items.insert(url.to_string(), record("물건", new_price));
        }
        old.insert_vendor("coupang", old_items);
        new.insert_vendor("coupang", new_items);

        // u3 added before u1 in the tracked set.
        let tracked = tracked_with(&["u3", "u2", "u1"]);

        let events = diff_snapshots(&old, &new, &tracked, [&META]);
        let urls: Vec<_> = events.iter().map(|e| e.url.as_str()).collect();
        assert_eq!(urls, ["u3", "u1"]);
    }
}
