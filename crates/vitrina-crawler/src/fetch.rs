use std::io::prelude::*;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use flate2::read::GzDecoder;
use reqwest::header::CONTENT_TYPE;

use crate::config::CrawlerConfig;

/// Network access used by the crawlers.
///
/// `fetch_text` fails on transport errors and on any non-2xx answer, while
/// `fetch_json` only fails on transport errors so that callers can inspect
/// statuses such as rejected search windows themselves.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_text(&self, url: &str) -> Result<String>;

    async fn fetch_json(
        &self,
        url: &str,
        params: &[(String, String)],
        headers: &[(String, String)],
    ) -> Result<JsonResponse>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct JsonResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl JsonResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        config.validate()?;
        let client = reqwest::ClientBuilder::new()
            .user_agent(&config.user_agent)
            .gzip(true)
            .deflate(true)
            .timeout(Duration::from_secs_f32(config.request_timeout))
            .connect_timeout(Duration::from_secs_f32(config.connect_timeout))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        let resp = self.client.get(url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            bail!("Couldn't download {url} got status: {status}");
        }

        let page = match resp.headers().get(CONTENT_TYPE) {
            Some(c) if c == "application/x-gzip" || c == "application/gzip" => {
                let compressed = resp.bytes().await?;
                let mut gz = GzDecoder::new(&compressed[..]);
                let mut page = String::new();
                gz.read_to_string(&mut page)?;
                page
            }
            _ => resp.text().await?,
        };

        Ok(page)
    }

    async fn fetch_json(
        &self,
        url: &str,
        params: &[(String, String)],
        headers: &[(String, String)],
    ) -> Result<JsonResponse> {
        let mut req = self.client.get(url).query(params);
        for (name, value) in headers {
            req = req.header(name.as_str(), value.as_str());
        }
        let resp = req.send().await?;

        let status = resp.status();
        let bytes = resp.bytes().await?;
        let body = if bytes.iter().all(u8::is_ascii_whitespace) {
            serde_json::Value::Null
        } else if status.is_success() {
            serde_json::from_slice(&bytes)
                .with_context(|| format!("Couldn't decode JSON from {url}"))?
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };

        Ok(JsonResponse {
            status: status.as_u16(),
            body,
        })
    }
}
