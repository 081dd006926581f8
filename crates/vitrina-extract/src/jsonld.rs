//! `<script type="application/ld+json">` blocks: listings, products and breadcrumbs.

use lazy_static::lazy_static;
use scraper::{Html, Selector};
use serde_json::Value;
use vitrina_crawler::text::{self, normalize_whitespace};
use vitrina_crawler::{absolute_url, Crumb, ProductRecord, Url};

use crate::price::json_price;

lazy_static! {
    static ref LD_JSON: Selector = Selector::parse(r#"script[type="application/ld+json"]"#).unwrap();
}

/// Every decodable JSON-LD block of the document, top level arrays flattened.
pub fn blocks(document: &Html) -> Vec<Value> {
    let mut blocks = vec![];
    for script in document.select(&LD_JSON) {
        let raw = script.text().collect::<String>();
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Array(values)) => blocks.extend(
                values
                    .into_iter()
                    .filter(|v| v.is_object() || v.is_array()),
            ),
            Ok(value) => blocks.push(value),
            Err(e) => log::debug!("Skipping undecodable JSON-LD block: {e}"),
        }
    }
    blocks
}

fn has_type(value: &Value, ld_type: &str) -> bool {
    match value.get("@type") {
        Some(Value::String(t)) => t == ld_type,
        Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some(ld_type)),
        _ => false,
    }
}

/// Products of `ItemList` blocks, or of standalone `Product` blocks when there is no list.
pub fn listing_products(blocks: &[Value]) -> Vec<ProductRecord> {
    let listed = blocks
        .iter()
        .filter(|b| has_type(b, "ItemList"))
        .filter_map(|b| b.get("itemListElement").and_then(Value::as_array))
        .flatten()
        .filter_map(|element| element.get("item").filter(|item| item.is_object()))
        .map(product)
        .collect::<Vec<_>>();
    if !listed.is_empty() {
        return listed;
    }

    blocks
        .iter()
        .filter(|b| has_type(b, "Product"))
        .map(product)
        .collect()
}

/// The first `Product` of a detail page, looking into `@graph` containers too.
pub fn first_product(blocks: &[Value]) -> Option<ProductRecord> {
    blocks
        .iter()
        .find(|b| has_type(b, "Product"))
        .or_else(|| {
            blocks
                .iter()
                .filter_map(|b| b.get("@graph").and_then(Value::as_array))
                .flatten()
                .find(|node| has_type(node, "Product"))
        })
        .map(product)
}

/// Trail of the first usable `BreadcrumbList`.
pub fn breadcrumbs(blocks: &[Value], base: &Url) -> Vec<Crumb> {
    for list in blocks.iter().filter(|b| has_type(b, "BreadcrumbList")) {
        let trail = list
            .get("itemListElement")
            .and_then(Value::as_array)
            .map(|elements| {
                elements
                    .iter()
                    .filter(|e| e.is_object())
                    .filter_map(|e| list_item_crumb(e, base))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        if !trail.is_empty() {
            return trail;
        }
    }
    vec![]
}

fn list_item_crumb(element: &Value, base: &Url) -> Option<Crumb> {
    let node = element.get("item").filter(|i| i.is_object()).unwrap_or(element);
    let name = node.get("name").and_then(Value::as_str);
    let href = str_field(node, &["@id", "url"])
        .or_else(|| element.get("item").and_then(Value::as_str));
    crumb(name, href, base)
}

/// Crumb out of a visible name and a link, `None` when no slug can be derived.
pub(crate) fn crumb(name: Option<&str>, href: Option<&str>, base: &Url) -> Option<Crumb> {
    let url = href.and_then(|href| absolute_url(base, href));
    let name = name.and_then(normalize_whitespace);
    let slug = url
        .as_deref()
        .and_then(text::last_path_segment)
        .map(String::from)
        .unwrap_or_else(|| text::slugify(name.as_deref().unwrap_or_default()));
    if slug.is_empty() {
        return None;
    }
    Some(Crumb { name, slug, url })
}

fn str_field<'v>(value: &'v Value, keys: &[&str]) -> Option<&'v str> {
    keys.iter()
        .filter_map(|k| value.get(*k).and_then(Value::as_str))
        .find(|s| !s.trim().is_empty())
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn product(node: &Value) -> ProductRecord {
    let brand = match node.get("brand") {
        Some(brand @ Value::Object(_)) => str_field(brand, &["name", "@id"]),
        Some(Value::String(brand)) => Some(brand.as_str()),
        _ => None,
    };
    let sku = ["sku", "mpn"]
        .iter()
        .filter_map(|k| node.get(*k).and_then(scalar))
        .find(|s| !s.trim().is_empty());
    let image = match node.get("image") {
        Some(Value::String(src)) => Some(src.clone()),
        Some(Value::Array(images)) => images.first().and_then(|i| match i {
            Value::String(src) => Some(src.clone()),
            other => str_field(other, &["url", "contentUrl"]).map(String::from),
        }),
        Some(image @ Value::Object(_)) => str_field(image, &["url", "contentUrl"]).map(String::from),
        _ => None,
    };

    ProductRecord {
        name: node
            .get("name")
            .and_then(Value::as_str)
            .and_then(normalize_whitespace),
        sku,
        brand: brand.and_then(normalize_whitespace),
        image,
        price: offer_price(node.get("offers")),
        url: str_field(node, &["@id", "url"]).map(String::from),
        ..Default::default()
    }
}

fn offer_price(offers: Option<&Value>) -> Option<vitrina_crawler::Decimal> {
    let offers = match offers? {
        Value::Array(all) => all.first()?,
        offers => offers,
    };
    ["lowPrice", "price"]
        .iter()
        .filter_map(|k| offers.get(*k))
        .find_map(json_price)
        .or_else(|| {
            offers
                .get("offers")
                .and_then(Value::as_array)
                .and_then(|inner| inner.first())
                .and_then(|inner| inner.get("price"))
                .and_then(json_price)
        })
}
