use std::num::NonZeroUsize;

use anyhow::Result;
use futures::{stream, StreamExt};

use crate::fetch::Fetcher;
use crate::model::{fill_null, Crumb, Product};
use crate::parser::CatalogParser;
use crate::store::CategoryStore;
use crate::text::{self, CATEGORY_NAME_LEN};

/// Completes already collected products with their detail pages.
pub struct BoundedEnricher<'a> {
    fetcher: &'a dyn Fetcher,
    parser: &'a dyn CatalogParser,
    categories: &'a dyn CategoryStore,
    concurrency: NonZeroUsize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichReport {
    pub enriched: usize,
    pub failed: usize,
    pub skipped: usize,
}

enum Outcome {
    Enriched,
    Failed,
    Skipped,
}

impl<'a> BoundedEnricher<'a> {
    pub fn new(
        fetcher: &'a dyn Fetcher,
        parser: &'a dyn CatalogParser,
        categories: &'a dyn CategoryStore,
        concurrency: NonZeroUsize,
    ) -> Self {
        Self {
            fetcher,
            parser,
            categories,
            concurrency,
        }
    }

    /// Enriches every product in place with at most `concurrency` detail pages in flight.
    ///
    /// A failing product keeps its previous values and never stops the others.
    pub async fn enrich(&self, products: &mut [Product]) -> EnrichReport {
        let outcomes = stream::iter(products.iter_mut())
            .map(|product| async move {
                let Some(url) = product.url.clone() else {
                    return Outcome::Skipped;
                };
                match self.enriched(product, &url).await {
                    Ok(enriched) => {
                        log::debug!(
                            "Enriched {url} category={:?} id={:?}",
                            enriched.category_name,
                            enriched.category_id
                        );
                        *product = enriched;
                        Outcome::Enriched
                    }
                    Err(e) => {
                        log::error!("Couldn't enrich {url} got: {e:#}");
                        Outcome::Failed
                    }
                }
            })
            .buffer_unordered(self.concurrency.get())
            .collect::<Vec<_>>()
            .await;

        let report = outcomes
            .into_iter()
            .fold(EnrichReport::default(), |mut report, outcome| {
                match outcome {
                    Outcome::Enriched => report.enriched += 1,
                    Outcome::Failed => report.failed += 1,
                    Outcome::Skipped => report.skipped += 1,
                }
                report
            });
        log::info!(
            "Enrichment done: enriched={} failed={} skipped={}",
            report.enriched,
            report.failed,
            report.skipped
        );
        report
    }

    async fn enriched(&self, product: &Product, url: &str) -> Result<Product> {
        let page = self.fetcher.fetch_text(url).await?;
        let crumbs = self.parser.breadcrumbs(&page);
        let detail = self.parser.detail(&page);

        let mut enriched = product.clone();
        if let Some(chosen) = choose_category(&crumbs, url) {
            fill_null(
                &mut enriched.category_name,
                chosen
                    .name
                    .as_deref()
                    .map(|name| text::truncate(name, CATEGORY_NAME_LEN)),
            );
            fill_null(&mut enriched.category_id, text::coerce_short_id(&chosen.slug));
        }
        if let Some(detail) = detail {
            enriched.apply_detail(detail);
        }

        let path = category_path(&crumbs, url);
        if !path.is_empty() {
            enriched.categories = self.categories.ensure_path(&path).await?;
        }

        Ok(enriched)
    }
}

fn product_slug(product_url: &str) -> String {
    text::last_path_segment(product_url)
        .unwrap_or_default()
        .to_lowercase()
}

/// Crumbs that stand for real categories: not the site root, not the product itself.
fn candidates<'c>(crumbs: &'c [Crumb], product_url: &str) -> Vec<&'c Crumb> {
    let product_slug = product_slug(product_url);
    crumbs
        .iter()
        .filter(|crumb| {
            let slug = crumb.slug.to_lowercase();
            !(slug.is_empty() || slug == "home" || slug == product_slug)
        })
        .collect()
}

/// Picks the breadcrumb naming the product's own category.
pub fn choose_category<'c>(crumbs: &'c [Crumb], product_url: &str) -> Option<&'c Crumb> {
    if let Some(last) = candidates(crumbs, product_url).last().copied() {
        return Some(last);
    }
    match crumbs.len() {
        0 => None,
        1 => crumbs.last(),
        n => crumbs.get(n - 2),
    }
}

/// Category path stored on the product, root first.
fn category_path(crumbs: &[Crumb], product_url: &str) -> Vec<Crumb> {
    let path = candidates(crumbs, product_url);
    if path.is_empty() {
        choose_category(crumbs, product_url)
            .into_iter()
            .cloned()
            .collect()
    } else {
        path.into_iter().cloned().collect()
    }
}
