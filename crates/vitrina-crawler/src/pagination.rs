use std::collections::HashSet;
use std::time::Duration;

use anyhow::{Context, Result};
use url::Url;

use crate::config::{CrawlerConfig, PAGE_PLACEHOLDER};
use crate::fetch::Fetcher;
use crate::model::Product;
use crate::parser::CatalogParser;

/// Walks numbered listing pages until one of them comes back empty.
pub struct PaginationCrawler<'a> {
    fetcher: &'a dyn Fetcher,
    parser: &'a dyn CatalogParser,
    base_url: Url,
    listing_path: String,
    max_pages: Option<usize>,
    page_delay: Duration,
}

impl<'a> PaginationCrawler<'a> {
    pub fn new(
        config: &CrawlerConfig,
        fetcher: &'a dyn Fetcher,
        parser: &'a dyn CatalogParser,
    ) -> Result<Self> {
        Ok(Self {
            fetcher,
            parser,
            base_url: config.base()?,
            listing_path: config.listing_path.clone(),
            max_pages: config.max_pages,
            page_delay: config.page_delay(),
        })
    }

    pub fn page_url(&self, page: usize) -> Result<String> {
        if self.listing_path.contains(PAGE_PLACEHOLDER) {
            let path = self.listing_path.replace(PAGE_PLACEHOLDER, &page.to_string());
            return Ok(self.base_url.join(&path)?.into());
        }

        let path = match self.listing_path.split_once('?') {
            Some((path, query)) => {
                let query = query
                    .split('&')
                    .map(|pair| {
                        if pair.starts_with("page=") {
                            format!("page={page}")
                        } else {
                            pair.to_string()
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("&");
                format!("{path}?{query}")
            }
            None => self.listing_path.clone(),
        };
        Ok(self.base_url.join(&path)?.into())
    }

    /// Collects every product of the listing, deduplicated by URL.
    ///
    /// The first failing page aborts the whole crawl.
    pub async fn crawl(&self) -> Result<Vec<Product>> {
        let mut seen = HashSet::new();
        let mut collected = vec![];

        let mut page = 1;
        loop {
            if let Some(max) = self.max_pages {
                if page > max {
                    log::info!("Stopping listing after {max} pages");
                    break;
                }
            }
            if page > 1 {
                tokio::time::sleep(self.page_delay).await;
            }

            let url = self.page_url(page)?;
            let html = self
                .fetcher
                .fetch_text(&url)
                .await
                .with_context(|| format!("Couldn't crawl listing page {page}"))?;

            let records = self.parser.listing_items(&html);
            if records.is_empty() {
                log::info!("Listing page {page} is empty, {} products", collected.len());
                break;
            }

            let found = records.len();
            let mut fresh = 0;
            for product in records
                .into_iter()
                .filter_map(|record| Product::from_listing(record, &self.base_url))
            {
                let Some(url) = product.url.clone() else {
                    continue;
                };
                if seen.insert(url) {
                    collected.push(product);
                    fresh += 1;
                }
            }
            log::info!(
                "Listing page {page}: found={found} new={fresh} total={}",
                collected.len()
            );

            page += 1;
        }

        Ok(collected)
    }
}
