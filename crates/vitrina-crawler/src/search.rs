use std::collections::HashSet;
use std::num::NonZeroUsize;

use anyhow::{bail, Result};
use url::Url;

use crate::config::CrawlerConfig;
use crate::fetch::Fetcher;
use crate::model::Product;
use crate::parser::CatalogParser;

/// One search over the REST endpoint: where to ask and which filters to apply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub endpoint: String,
    pub params: Vec<(String, String)>,
}

impl SearchQuery {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            params: vec![],
        }
    }

    pub fn param(mut self, key: &str, value: &str) -> Self {
        self.params.push((key.to_string(), value.to_string()));
        self
    }

    /// The same query restricted by one more filter.
    pub fn filtered(&self, filter: (String, String)) -> Self {
        let mut query = self.clone();
        query.params.push(filter);
        query
    }
}

/// Walks a search endpoint window after window using `_from`/`_to` offsets.
pub struct WindowedSearchCrawler<'a> {
    fetcher: &'a dyn Fetcher,
    parser: &'a dyn CatalogParser,
    base_url: Url,
    window_size: NonZeroUsize,
    bad_range_statuses: Vec<u16>,
    headers: Vec<(String, String)>,
}

impl<'a> WindowedSearchCrawler<'a> {
    pub fn new(
        config: &CrawlerConfig,
        fetcher: &'a dyn Fetcher,
        parser: &'a dyn CatalogParser,
    ) -> Result<Self> {
        let base_url = config.base()?;
        let headers = vec![
            ("Accept".to_string(), "application/json".to_string()),
            (
                "Accept-Language".to_string(),
                config.search.accept_language.clone(),
            ),
            (
                "Referer".to_string(),
                base_url.join(&config.search.referer_path)?.into(),
            ),
        ];
        Ok(Self {
            fetcher,
            parser,
            base_url,
            window_size: config.search.window_size,
            bad_range_statuses: config.search.bad_range_statuses.clone(),
            headers,
        })
    }

    /// Collects every product of the query, deduplicated by SKU.
    ///
    /// Products without SKU cannot be told apart and are always kept.
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<Product>> {
        let url: String = self.base_url.join(&query.endpoint)?.into();
        let window = self.window_size.get();

        let mut seen = HashSet::new();
        let mut collected = vec![];

        let mut start = 0;
        loop {
            let mut params = query.params.clone();
            params.push(("_from".to_string(), start.to_string()));
            params.push(("_to".to_string(), (start + window - 1).to_string()));

            let resp = self
                .fetcher
                .fetch_json(&url, &params, &self.headers)
                .await?;
            if self.bad_range_statuses.contains(&resp.status) {
                log::info!("Search window {start} rejected with status {}, done", resp.status);
                break;
            }
            if !resp.is_success() {
                bail!(
                    "Search window {start} of {url} failed with status {}",
                    resp.status
                );
            }

            let returned = resp.body.as_array().map(Vec::len).unwrap_or(0);
            if returned == 0 {
                log::info!("Search window {start} is empty, done");
                break;
            }

            let mut fresh = 0;
            for product in self.parser.search_results(&resp.body) {
                let is_new = match &product.sku_id {
                    Some(sku) => seen.insert(sku.clone()),
                    None => true,
                };
                if is_new {
                    collected.push(product);
                    fresh += 1;
                }
            }
            log::info!(
                "Search window {start}: products={returned} new={fresh} total={}",
                collected.len()
            );

            if returned < window {
                break;
            }
            start += window;
        }

        Ok(collected)
    }
}
