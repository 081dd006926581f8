use std::num::NonZeroUsize;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlerConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Listing path with either a `{page}` placeholder or a `page=N` query parameter
    #[serde(default = "default_listing_path")]
    pub listing_path: String,

    #[serde(default)]
    pub max_pages: Option<usize>,

    /// Delay in seconds between two listing pages
    #[serde(default = "default_page_delay")]
    pub page_delay: f32,

    #[serde(default = "default_enrich")]
    pub enrich: bool,

    /// Maximum number of detail pages downloaded concurrently
    #[serde(default = "default_concurrency")]
    pub concurrency: NonZeroUsize,

    /// Whole request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: f32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: f32,

    #[serde(default)]
    pub search: SearchConfig,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            base_url: default_base_url(),
            listing_path: default_listing_path(),
            max_pages: None,
            page_delay: default_page_delay(),
            enrich: default_enrich(),
            concurrency: default_concurrency(),
            request_timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
            search: SearchConfig::default(),
        }
    }
}

impl CrawlerConfig {
    pub fn validate(&self) -> Result<()> {
        let base = self.base()?;
        if base.cannot_be_a_base() {
            bail!("Invalid config, baseUrl {} cannot be used as a base", self.base_url);
        }
        if !self.listing_path.contains(PAGE_PLACEHOLDER) && !has_page_param(&self.listing_path) {
            bail!(
                "Invalid config, listingPath {} has neither {PAGE_PLACEHOLDER} nor a page= parameter",
                self.listing_path
            );
        }
        if !self.search.category_filter_template.contains(ID_PLACEHOLDER) {
            bail!(
                "Invalid config, categoryFilterTemplate {} lacks {ID_PLACEHOLDER}",
                self.search.category_filter_template
            );
        }
        if !self.page_delay.is_finite() || self.page_delay < 0. {
            bail!("Invalid config, pageDelay must be a non-negative number of seconds");
        }
        for (name, timeout) in [
            ("requestTimeout", self.request_timeout),
            ("connectTimeout", self.connect_timeout),
        ] {
            if !timeout.is_finite() || timeout <= 0. {
                bail!("Invalid config, {name} must be a positive number of seconds");
            }
        }
        Ok(())
    }

    pub fn base(&self) -> Result<Url> {
        Url::parse(&self.base_url).map_err(|e| anyhow!("Invalid baseUrl {} got: {e}", self.base_url))
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_secs_f32(self.page_delay.max(0.))
    }
}

pub(crate) const PAGE_PLACEHOLDER: &str = "{page}";
pub(crate) const ID_PLACEHOLDER: &str = "{id}";

fn has_page_param(path: &str) -> bool {
    path.split_once('?')
        .map(|(_, query)| query.split('&').any(|pair| pair.starts_with("page=")))
        .unwrap_or(false)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_window_size")]
    pub window_size: NonZeroUsize,

    #[serde(default = "default_referer_path")]
    pub referer_path: String,

    #[serde(default = "default_map")]
    pub map: String,

    #[serde(default = "default_accept_language")]
    pub accept_language: String,

    /// Statuses meaning the requested window is past the end of the results
    #[serde(default = "default_bad_range_statuses")]
    pub bad_range_statuses: Vec<u16>,

    /// A global search returning at least this many items is considered truncated
    #[serde(default = "default_result_cap")]
    pub result_cap: usize,

    #[serde(default = "default_facets_endpoint")]
    pub facets_endpoint: String,

    #[serde(default = "default_category_filter_param")]
    pub category_filter_param: String,

    #[serde(default = "default_category_filter_template")]
    pub category_filter_template: String,

    #[serde(default = "default_on_shard_error")]
    pub on_shard_error: OnError,

    /// Extra query parameters sent with every search window
    #[serde(default)]
    pub params: Vec<(String, String)>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            window_size: default_window_size(),
            referer_path: default_referer_path(),
            map: default_map(),
            accept_language: default_accept_language(),
            bad_range_statuses: default_bad_range_statuses(),
            result_cap: default_result_cap(),
            facets_endpoint: default_facets_endpoint(),
            category_filter_param: default_category_filter_param(),
            category_filter_template: default_category_filter_template(),
            on_shard_error: default_on_shard_error(),
            params: vec![],
        }
    }
}

impl SearchConfig {
    /// Query parameter restricting a search to one category.
    pub fn category_filter(&self, category_id: &str) -> (String, String) {
        (
            self.category_filter_param.clone(),
            self.category_filter_template
                .replace(ID_PLACEHOLDER, category_id),
        )
    }
}

fn default_user_agent() -> String {
    String::from("VitrinaBot/0.1")
}

fn default_base_url() -> String {
    String::from("https://www.eurosupermercados.com.co")
}

fn default_listing_path() -> String {
    String::from("/mercado?page={page}")
}

fn default_page_delay() -> f32 {
    0.2
}

fn default_enrich() -> bool {
    true
}

fn default_concurrency() -> NonZeroUsize {
    NonZeroUsize::new(12).unwrap_or(NonZeroUsize::MIN)
}

fn default_request_timeout() -> f32 {
    15.
}

fn default_connect_timeout() -> f32 {
    5.
}

fn default_endpoint() -> String {
    String::from("/api/catalog_system/pub/products/search/mercado")
}

fn default_window_size() -> NonZeroUsize {
    NonZeroUsize::new(50).unwrap_or(NonZeroUsize::MIN)
}

fn default_referer_path() -> String {
    String::from("/mercado")
}

fn default_map() -> String {
    String::from("c")
}

fn default_accept_language() -> String {
    String::from("es-CO,es;q=0.9")
}

fn default_bad_range_statuses() -> Vec<u16> {
    vec![400, 416]
}

fn default_result_cap() -> usize {
    2400
}

fn default_facets_endpoint() -> String {
    String::from("/api/catalog_system/pub/facets/search")
}

fn default_category_filter_param() -> String {
    String::from("fq")
}

fn default_category_filter_template() -> String {
    String::from("C:/{id}/")
}

fn default_on_shard_error() -> OnError {
    OnError::Fail
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum OnError {
    Fail,
    SkipAndLog,
}
