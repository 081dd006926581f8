use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::model::{Category, Crumb, Product};
use crate::text;

/// Product persistence, upserting by SKU or URL identity.
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn save(&self, products: &[Product]) -> Result<()>;

    async fn list(&self) -> Result<Vec<Product>>;
}

/// Category persistence keyed by slug.
#[async_trait]
pub trait CategoryStore: Send + Sync {
    /// Returns the categories of a breadcrumb path, creating unknown ones.
    async fn ensure_path(&self, crumbs: &[Crumb]) -> Result<Vec<Category>>;

    async fn list(&self) -> Result<Vec<Category>>;
}

#[derive(Debug, Default)]
pub struct MemoryProductStore {
    inner: Mutex<ProductIndex>,
}

#[derive(Debug, Default)]
struct ProductIndex {
    products: Vec<Product>,
    by_sku: HashMap<String, usize>,
    by_url: HashMap<String, usize>,
}

impl ProductIndex {
    /// A product carrying a SKU never matches another SKU, its URL may be shared by siblings.
    /// It can still claim the entry stored under its URL before any SKU was known.
    fn position(&self, product: &Product) -> Option<usize> {
        let by_url = || {
            let url = product.url.as_ref()?;
            self.by_url.get(url).copied()
        };
        match &product.sku_id {
            Some(sku) => self
                .by_sku
                .get(sku)
                .copied()
                .or_else(|| by_url().filter(|&idx| self.products[idx].sku_id.is_none())),
            None => by_url(),
        }
    }

    fn upsert(&mut self, product: Product) {
        let idx = match self.position(&product) {
            Some(idx) => {
                self.products[idx].absorb(product);
                idx
            }
            None if product.key().is_none() => {
                log::debug!("Storing product without identity: {:?}", product.name);
                self.products.push(product);
                return;
            }
            None => {
                self.products.push(product);
                self.products.len() - 1
            }
        };
        let stored = &self.products[idx];
        if let Some(sku) = &stored.sku_id {
            self.by_sku.insert(sku.clone(), idx);
        }
        if let Some(url) = &stored.url {
            self.by_url.entry(url.clone()).or_insert(idx);
        }
    }
}

impl MemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProductStore for MemoryProductStore {
    async fn save(&self, products: &[Product]) -> Result<()> {
        let mut index = self
            .inner
            .lock()
            .map_err(|e| anyhow!("Product store poisoned: {e}"))?;
        for product in products {
            index.upsert(product.clone());
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Product>> {
        let index = self
            .inner
            .lock()
            .map_err(|e| anyhow!("Product store poisoned: {e}"))?;
        Ok(index.products.clone())
    }
}

/// Trimmed name and slug of a crumb, the slug falling back to the slugified name.
pub(crate) fn crumb_identity(crumb: &Crumb) -> Option<(&str, String)> {
    let name = crumb.name.as_deref().map(str::trim).unwrap_or_default();
    let slug = if crumb.slug.is_empty() {
        text::slugify(name)
    } else {
        crumb.slug.clone()
    };
    (!slug.is_empty()).then_some((name, slug))
}

#[derive(Debug, Default)]
pub struct MemoryCategoryStore {
    inner: Mutex<CategoryIndex>,
}

#[derive(Debug, Default)]
struct CategoryIndex {
    categories: Vec<Category>,
    by_slug: HashMap<String, usize>,
}

impl MemoryCategoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CategoryStore for MemoryCategoryStore {
    async fn ensure_path(&self, crumbs: &[Crumb]) -> Result<Vec<Category>> {
        let mut index = self
            .inner
            .lock()
            .map_err(|e| anyhow!("Category store poisoned: {e}"))?;

        let mut path = Vec::with_capacity(crumbs.len());
        for crumb in crumbs {
            let Some((name, slug)) = crumb_identity(crumb) else {
                continue;
            };

            let category = match index.by_slug.get(&slug).copied() {
                Some(idx) => {
                    let known = &mut index.categories[idx];
                    if known.name.is_empty() && !name.is_empty() {
                        known.name = name.to_string();
                    }
                    if known.url.is_none() {
                        known.url = crumb.url.clone();
                    }
                    known.clone()
                }
                None => {
                    let category = Category {
                        id: index.categories.len() as u64 + 1,
                        name: name.to_string(),
                        slug: slug.clone(),
                        url: crumb.url.clone(),
                    };
                    let idx = index.categories.len();
                    index.categories.push(category.clone());
                    index.by_slug.insert(slug, idx);
                    category
                }
            };
            path.push(category);
        }
        Ok(path)
    }

    async fn list(&self) -> Result<Vec<Category>> {
        let index = self
            .inner
            .lock()
            .map_err(|e| anyhow!("Category store poisoned: {e}"))?;
        Ok(index.categories.clone())
    }
}
