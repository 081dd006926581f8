use std::collections::HashSet;

use anyhow::{bail, Context, Result};
use url::Url;

use crate::config::{CrawlerConfig, OnError, SearchConfig};
use crate::fetch::Fetcher;
use crate::model::Product;
use crate::parser::{leaf_categories, CatalogParser, FacetNode};
use crate::search::{SearchQuery, WindowedSearchCrawler};

/// Search that works around backends silently capping their total result count.
///
/// A global search reaching the cap is assumed truncated and is completed by one
/// search per leaf category, merged by SKU. Items without a SKU are always kept.
pub struct CapAwareSearch<'a> {
    windowed: WindowedSearchCrawler<'a>,
    fetcher: &'a dyn Fetcher,
    parser: &'a dyn CatalogParser,
    base_url: Url,
    search: SearchConfig,
}

impl<'a> CapAwareSearch<'a> {
    pub fn new(
        config: &CrawlerConfig,
        fetcher: &'a dyn Fetcher,
        parser: &'a dyn CatalogParser,
    ) -> Result<Self> {
        Ok(Self {
            windowed: WindowedSearchCrawler::new(config, fetcher, parser)?,
            fetcher,
            parser,
            base_url: config.base()?,
            search: config.search.clone(),
        })
    }

    pub fn is_truncated(&self, found: usize) -> bool {
        found >= self.search.result_cap
    }

    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<Product>> {
        let mut collected = self.windowed.search(query).await?;
        if !self.is_truncated(collected.len()) {
            return Ok(collected);
        }

        let leaves = self.leaf_categories().await?;
        log::info!(
            "Global search hit the cap with {} products, sharding over {} leaf categories",
            collected.len(),
            leaves.len()
        );

        let mut seen = collected
            .iter()
            .filter_map(|p| p.sku_id.clone())
            .collect::<HashSet<_>>();

        for leaf in leaves {
            let shard = query.filtered(self.search.category_filter(&leaf.id));
            let found = match self.windowed.search(&shard).await {
                Ok(found) => found,
                Err(e) => match self.search.on_shard_error {
                    OnError::SkipAndLog => {
                        log::warn!("Skipping shard {} ({:?}) got: {e:#}", leaf.id, leaf.name);
                        continue;
                    }
                    OnError::Fail => {
                        return Err(e.context(format!("Shard {} failed", leaf.id)));
                    }
                },
            };

            let before = collected.len();
            for product in found {
                let is_new = match &product.sku_id {
                    Some(sku) => seen.insert(sku.clone()),
                    None => true,
                };
                if is_new {
                    collected.push(product);
                }
            }
            log::info!(
                "Shard {} ({:?}): new={} total={}",
                leaf.id,
                leaf.name,
                collected.len() - before,
                collected.len()
            );
        }

        Ok(collected)
    }

    /// Leaf categories of the search scope, from the facets endpoint.
    pub async fn leaf_categories(&self) -> Result<Vec<FacetNode>> {
        let path = format!(
            "{}{}",
            self.search.facets_endpoint.trim_end_matches('/'),
            self.search.referer_path
        );
        let url: String = self.base_url.join(&path)?.into();
        let params = vec![("map".to_string(), self.search.map.clone())];
        let headers = vec![("Accept".to_string(), "application/json".to_string())];

        let resp = self
            .fetcher
            .fetch_json(&url, &params, &headers)
            .await
            .with_context(|| format!("Couldn't fetch facets {url}"))?;
        if !resp.is_success() {
            bail!("Facets {url} failed with status {}", resp.status);
        }

        let leaves = leaf_categories(self.parser.facet_tree(&resp.body))
            .into_iter()
            .filter(|leaf| !leaf.id.is_empty())
            .collect();
        Ok(leaves)
    }
}
