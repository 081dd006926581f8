mod catalog;
mod config;
mod enrich;
mod fetch;
mod model;
mod pagination;
mod parser;
mod search;
mod shard;
mod sqlite;
mod store;
pub mod text;

pub use catalog::Catalog;
pub use config::{CrawlerConfig, OnError, SearchConfig};
pub use enrich::{choose_category, BoundedEnricher, EnrichReport};
pub use fetch::{Fetcher, HttpFetcher, JsonResponse};
pub use model::{absolute_url, fill_null, Category, Crumb, Product, ProductKey, ProductRecord};
pub use pagination::PaginationCrawler;
pub use parser::{leaf_categories, CatalogParser, FacetNode};
pub use search::{SearchQuery, WindowedSearchCrawler};
pub use shard::CapAwareSearch;
pub use sqlite::SqliteStore;
pub use store::{CategoryStore, MemoryCategoryStore, MemoryProductStore, ProductStore};

pub use anyhow;
pub use async_trait::async_trait;
pub use rust_decimal::Decimal;
pub use url::Url;
