use anyhow::Result;

use crate::config::CrawlerConfig;
use crate::enrich::BoundedEnricher;
use crate::fetch::Fetcher;
use crate::model::Product;
use crate::pagination::PaginationCrawler;
use crate::parser::CatalogParser;
use crate::search::{SearchQuery, WindowedSearchCrawler};
use crate::shard::CapAwareSearch;
use crate::store::{CategoryStore, ProductStore};

/// Wires the crawlers to their collaborators and persists what they find.
pub struct Catalog<'a> {
    config: &'a CrawlerConfig,
    fetcher: &'a dyn Fetcher,
    parser: &'a dyn CatalogParser,
    products: &'a dyn ProductStore,
    categories: &'a dyn CategoryStore,
}

impl<'a> Catalog<'a> {
    pub fn new(
        config: &'a CrawlerConfig,
        fetcher: &'a dyn Fetcher,
        parser: &'a dyn CatalogParser,
        products: &'a dyn ProductStore,
        categories: &'a dyn CategoryStore,
    ) -> Self {
        Self {
            config,
            fetcher,
            parser,
            products,
            categories,
        }
    }

    /// Listing pages, then detail pages when enabled, then the product store.
    pub async fn scrape_listing(&self) -> Result<Vec<Product>> {
        let mut collected = PaginationCrawler::new(self.config, self.fetcher, self.parser)?
            .crawl()
            .await?;

        if self.config.enrich && !collected.is_empty() {
            BoundedEnricher::new(
                self.fetcher,
                self.parser,
                self.categories,
                self.config.concurrency,
            )
            .enrich(&mut collected)
            .await;
        }

        self.save(&collected).await?;
        Ok(collected)
    }

    pub async fn scrape_search(&self, query: &SearchQuery) -> Result<Vec<Product>> {
        let collected = WindowedSearchCrawler::new(self.config, self.fetcher, self.parser)?
            .search(query)
            .await?;
        self.save(&collected).await?;
        Ok(collected)
    }

    pub async fn scrape_search_deep(&self, query: &SearchQuery) -> Result<Vec<Product>> {
        let collected = CapAwareSearch::new(self.config, self.fetcher, self.parser)?
            .search(query)
            .await?;
        self.save(&collected).await?;
        Ok(collected)
    }

    /// Search query built from the configured endpoint and parameters plus `extra` ones.
    pub fn search_query(&self, extra: &[(String, String)]) -> SearchQuery {
        let search = &self.config.search;
        let mut query = SearchQuery::new(&search.endpoint);
        query.params.extend(search.params.iter().cloned());
        query.params.extend(extra.iter().cloned());
        if !query.params.iter().any(|(k, _)| k == "map") {
            query.params.push(("map".to_string(), search.map.clone()));
        }
        query
    }

    async fn save(&self, products: &[Product]) -> Result<()> {
        if products.is_empty() {
            return Ok(());
        }
        self.products.save(products).await?;
        log::info!("Saved {} products", products.len());
        Ok(())
    }
}
