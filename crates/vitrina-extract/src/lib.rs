pub mod dom;
pub mod jsonld;
pub mod price;
pub mod vtex;

use scraper::Html;
use serde_json::Value;
use vitrina_crawler::{CatalogParser, Crumb, FacetNode, Product, ProductRecord, Url};

/// Extraction for VTEX store fronts: JSON-LD first, rendered markup as fallback.
#[derive(Debug, Clone)]
pub struct VtexParser {
    base_url: Url,
}

impl VtexParser {
    pub fn new(base_url: Url) -> Self {
        Self { base_url }
    }
}

impl CatalogParser for VtexParser {
    fn listing_items(&self, page: &str) -> Vec<ProductRecord> {
        let document = Html::parse_document(page);
        let products = jsonld::listing_products(&jsonld::blocks(&document));
        if !products.is_empty() {
            return products;
        }
        dom::listing_items(&document)
    }

    fn detail(&self, page: &str) -> Option<ProductRecord> {
        jsonld::first_product(&jsonld::blocks(&Html::parse_document(page)))
    }

    fn breadcrumbs(&self, page: &str) -> Vec<Crumb> {
        let document = Html::parse_document(page);
        let crumbs = jsonld::breadcrumbs(&jsonld::blocks(&document), &self.base_url);
        if !crumbs.is_empty() {
            return crumbs;
        }
        dom::breadcrumbs(&document, &self.base_url)
    }

    fn search_results(&self, payload: &Value) -> Vec<Product> {
        vtex::search_results(payload, &self.base_url)
    }

    fn facet_tree(&self, payload: &Value) -> Vec<FacetNode> {
        vtex::facet_tree(payload)
    }
}
