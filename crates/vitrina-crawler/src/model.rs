use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::text::{self, BRAND_LEN};

/// Canonical catalog entry.
///
/// Field names on the wire keep the catalog schema used by the stores and the
/// CSV export (`nombre_producto`, `marca`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub sku_id: Option<String>,
    pub product_id: Option<String>,
    #[serde(rename = "nombre_producto")]
    pub name: Option<String>,
    #[serde(rename = "marca")]
    pub brand: Option<String>,
    #[serde(rename = "unidad")]
    pub unit: Option<String>,
    #[serde(rename = "imagen")]
    pub image: Option<String>,
    #[serde(rename = "precio")]
    pub price: Option<Decimal>,
    #[serde(rename = "tipo_precio")]
    pub price_type: Option<String>,
    #[serde(rename = "categoria_id")]
    pub category_id: Option<String>,
    #[serde(rename = "nombre_categoria")]
    pub category_name: Option<String>,
    #[serde(rename = "url_producto")]
    pub url: Option<String>,
    #[serde(rename = "categorias", default)]
    pub categories: Vec<Category>,
}

/// Identity of a product: its SKU when known, its URL otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProductKey {
    Sku(String),
    Url(String),
}

impl Product {
    /// Builds a product out of a listing record, resolving its URL against the site base.
    ///
    /// Records without any URL are useless for pagination dedup and enrichment.
    pub fn from_listing(record: ProductRecord, base: &Url) -> Option<Self> {
        let url = record.url.as_deref().and_then(|href| absolute_url(base, href))?;
        Some(Self {
            url: Some(url),
            ..Self::from(record)
        })
    }

    pub fn key(&self) -> Option<ProductKey> {
        match (&self.sku_id, &self.url) {
            (Some(sku), _) => Some(ProductKey::Sku(sku.clone())),
            (None, Some(url)) => Some(ProductKey::Url(url.clone())),
            (None, None) => None,
        }
    }

    /// Back-fills what a detail page knows about this product, empty fields only.
    pub fn apply_detail(&mut self, detail: ProductRecord) {
        fill_null(&mut self.image, detail.image);
        fill_null(
            &mut self.brand,
            detail.brand.map(|b| text::truncate(&b, BRAND_LEN)),
        );
        fill_null(
            &mut self.sku_id,
            detail
                .sku
                .or(detail.product_id)
                .and_then(|id| text::coerce_short_id(&id)),
        );
        fill_null(&mut self.price, detail.price);
        fill_null(&mut self.name, detail.name);
    }

    /// Merges a newer observation of the same product into this stored one.
    pub fn absorb(&mut self, newer: Product) {
        fill_null(&mut self.sku_id, newer.sku_id);
        fill_null(&mut self.product_id, newer.product_id);
        fill_null(&mut self.brand, newer.brand);
        fill_null(&mut self.unit, newer.unit);
        fill_null(&mut self.image, newer.image);
        fill_null(&mut self.price, newer.price);
        fill_null(&mut self.price_type, newer.price_type);
        fill_null(&mut self.category_id, newer.category_id);
        fill_null(&mut self.category_name, newer.category_name);
        fill_null(&mut self.url, newer.url);
        if newer.name.is_some() {
            self.name = newer.name;
        }
        if !newer.categories.is_empty() {
            self.categories = newer.categories;
        }
    }
}

impl From<ProductRecord> for Product {
    fn from(record: ProductRecord) -> Self {
        Self {
            sku_id: record.sku,
            product_id: record.product_id,
            name: record.name,
            brand: record.brand,
            unit: record.unit,
            image: record.image,
            price: record.price,
            price_type: record.price_type,
            category_id: record.category_id,
            category_name: record.category_name,
            url: record.url,
            categories: vec![],
        }
    }
}

/// Raw item handed over by an extractor. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductRecord {
    pub name: Option<String>,
    pub sku: Option<String>,
    pub product_id: Option<String>,
    pub brand: Option<String>,
    pub unit: Option<String>,
    pub image: Option<String>,
    pub price: Option<Decimal>,
    pub price_type: Option<String>,
    pub category_id: Option<String>,
    pub category_name: Option<String>,
    pub url: Option<String>,
}

/// A node of a breadcrumb path once known to the category store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: u64,
    pub name: String,
    pub slug: String,
    pub url: Option<String>,
}

/// Breadcrumb entry as found on a detail page, root first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crumb {
    pub name: Option<String>,
    pub slug: String,
    pub url: Option<String>,
}

impl Crumb {
    pub fn new(name: &str, slug: &str, url: Option<&str>) -> Self {
        Self {
            name: Some(name.to_string()),
            slug: slug.to_string(),
            url: url.map(String::from),
        }
    }
}

/// Sets `slot` only when it is still empty.
pub fn fill_null<T>(slot: &mut Option<T>, value: Option<T>) {
    if slot.is_none() {
        *slot = value;
    }
}

/// Resolves `href` against `base`, keeping already absolute links untouched.
pub fn absolute_url(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    base.join(href).ok().map(String::from)
}
