#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde_json::{json, Value};
use vitrina_crawler::anyhow::{anyhow, Result};
use vitrina_crawler::{
    async_trait, CatalogParser, Crumb, FacetNode, Fetcher, JsonResponse, Product, ProductRecord,
};

pub const BASE: &str = "https://shop.test";

type JsonHandler = Box<dyn Fn(&str, &HashMap<String, String>) -> JsonResponse + Send + Sync>;

/// In-memory web: pages by URL and a programmable JSON endpoint.
#[derive(Default)]
pub struct ScriptedFetcher {
    pages: HashMap<String, String>,
    failing: Vec<String>,
    json: Option<JsonHandler>,
    latency: Option<Duration>,
    requests: Mutex<Vec<String>>,
    json_requests: Mutex<Vec<HashMap<String, String>>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, body: Value) -> Self {
        self.pages.insert(url.to_string(), body.to_string());
        self
    }

    pub fn failing(mut self, url: &str) -> Self {
        self.failing.push(url.to_string());
        self
    }

    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn json<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str, &HashMap<String, String>) -> JsonResponse + Send + Sync + 'static,
    {
        self.json = Some(Box::new(handler));
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn json_requests(&self) -> Vec<HashMap<String, String>> {
        self.json_requests.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        self.requests.lock().unwrap().push(url.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.iter().any(|f| f == url) {
            return Err(anyhow!("connection reset by peer: {url}"));
        }
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("Couldn't download {url} got status: 404 Not Found"))
    }

    async fn fetch_json(
        &self,
        url: &str,
        params: &[(String, String)],
        _headers: &[(String, String)],
    ) -> Result<JsonResponse> {
        let params: HashMap<String, String> = params.iter().cloned().collect();
        self.requests.lock().unwrap().push(url.to_string());
        self.json_requests.lock().unwrap().push(params.clone());
        let handler = self.json.as_ref().ok_or_else(|| anyhow!("no JSON endpoint"))?;
        Ok(handler(url, &params))
    }
}

/// Parser reading pages written as JSON documents.
///
/// Listing: `[record, ...]`. Detail: `{"detail": record, "crumbs": [crumb, ...]}`.
/// Search: `[record, ...]`. Facets: `{"tree": [node, ...]}`.
pub struct JsonParser;

impl CatalogParser for JsonParser {
    fn listing_items(&self, page: &str) -> Vec<ProductRecord> {
        serde_json::from_str(page).unwrap_or_default()
    }

    fn detail(&self, page: &str) -> Option<ProductRecord> {
        let page: Value = serde_json::from_str(page).ok()?;
        serde_json::from_value(page.get("detail")?.clone()).ok()
    }

    fn breadcrumbs(&self, page: &str) -> Vec<Crumb> {
        serde_json::from_str::<Value>(page)
            .ok()
            .and_then(|page| page.get("crumbs").cloned())
            .and_then(|crumbs| serde_json::from_value(crumbs).ok())
            .unwrap_or_default()
    }

    fn search_results(&self, payload: &Value) -> Vec<Product> {
        serde_json::from_value::<Vec<ProductRecord>>(payload.clone())
            .unwrap_or_default()
            .into_iter()
            .map(Product::from)
            .collect()
    }

    fn facet_tree(&self, payload: &Value) -> Vec<FacetNode> {
        payload
            .get("tree")
            .cloned()
            .and_then(|tree| serde_json::from_value(tree).ok())
            .unwrap_or_default()
    }
}

pub fn item(slug: &str) -> Value {
    json!({"name": slug, "url": format!("/{slug}")})
}

pub fn listing(slugs: &[&str]) -> Value {
    Value::Array(slugs.iter().map(|s| item(s)).collect())
}

pub fn url(path: &str) -> String {
    format!("{BASE}{path}")
}

pub fn ok(body: Value) -> JsonResponse {
    JsonResponse { status: 200, body }
}

pub fn status(status: u16) -> JsonResponse {
    JsonResponse {
        status,
        body: Value::Null,
    }
}

/// Window `[_from, _to]` over a catalog of `total` SKUs named with `prefix`.
pub fn window(params: &HashMap<String, String>, total: usize, prefix: &str) -> JsonResponse {
    let from: usize = params["_from"].parse().unwrap();
    let to: usize = params["_to"].parse().unwrap();
    if from >= total {
        return status(416);
    }
    let items = (from..=to.min(total - 1))
        .map(|i| json!({"sku": format!("{prefix}{i}"), "url": format!("/{prefix}{i}/p")}))
        .collect();
    ok(Value::Array(items))
}
