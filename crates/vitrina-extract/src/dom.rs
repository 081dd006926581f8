//! Rendered VTEX store front markup, used when a page carries no JSON-LD.

use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Selector};
use vitrina_crawler::text::normalize_whitespace;
use vitrina_crawler::{Crumb, ProductRecord, Url};

use crate::jsonld::crumb;
use crate::price::parse_price;

lazy_static! {
    static ref SUMMARY: Selector =
        Selector::parse(r#"section.vtex-product-summary-2-x-container[aria-label^="Producto"]"#)
            .unwrap();
    static ref NAME: Selector =
        Selector::parse("h3.vtex-product-summary-2-x-productNameContainer").unwrap();
    static ref NAME_FALLBACK: Selector = Selector::parse(
        r#"div.vtex-product-summary-2-x-nameContainer[aria-label^="Nombre del producto"]"#
    )
    .unwrap();
    static ref SELLING_PRICE: Selector =
        Selector::parse("span.vtex-product-price-1-x-sellingPriceValue").unwrap();
    static ref LINK: Selector =
        Selector::parse("a.vtex-product-summary-2-x-clearLink[href]").unwrap();
    static ref BREADCRUMB_LINK: Selector =
        Selector::parse(r#"div[data-testid="breadcrumb"] a.vtex-breadcrumb-1-x-link[href]"#)
            .unwrap();
}

fn text_of(element: ElementRef) -> Option<String> {
    normalize_whitespace(&element.text().collect::<String>())
}

/// Product summaries of a listing page. Summaries without name or link are ignored.
pub fn listing_items(document: &Html) -> Vec<ProductRecord> {
    document
        .select(&SUMMARY)
        .filter_map(|summary| {
            let name = summary
                .select(&NAME)
                .next()
                .or_else(|| summary.select(&NAME_FALLBACK).next())?;
            let href = summary
                .select(&LINK)
                .next()
                .and_then(|link| link.value().attr("href"))
                .filter(|href| !href.trim().is_empty())?;
            let price = summary
                .select(&SELLING_PRICE)
                .next()
                .and_then(text_of)
                .and_then(|price| parse_price(&price));

            Some(ProductRecord {
                name: text_of(name),
                price,
                url: Some(href.to_string()),
                ..Default::default()
            })
        })
        .collect()
}

pub fn breadcrumbs(document: &Html, base: &Url) -> Vec<Crumb> {
    document
        .select(&BREADCRUMB_LINK)
        .filter_map(|link| {
            let name = text_of(link);
            crumb(name.as_deref(), link.value().attr("href"), base)
        })
        .collect()
}
