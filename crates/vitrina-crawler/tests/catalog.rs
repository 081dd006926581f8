mod common;

use serde_json::json;
use vitrina_crawler::{
    Catalog, CategoryStore, CrawlerConfig, MemoryCategoryStore, MemoryProductStore, ProductStore,
    SqliteStore,
};

use common::{url, window, JsonParser, ScriptedFetcher, BASE};

fn config(enrich: bool) -> CrawlerConfig {
    CrawlerConfig {
        base_url: BASE.into(),
        listing_path: "/herramientas?page=1".into(),
        page_delay: 0.,
        enrich,
        ..Default::default()
    }
}

fn detail(sku: &str) -> serde_json::Value {
    json!({
        "detail": {"sku": sku, "brand": "Acme"},
        "crumbs": [
            {"name": "Inicio", "slug": "home"},
            {"name": "Herramientas", "slug": "herramientas", "url": url("/herramientas")}
        ]
    })
}

fn site() -> ScriptedFetcher {
    ScriptedFetcher::new()
        .page(
            &url("/herramientas?page=1"),
            json!([
                {"name": "Martillo", "url": "/martillo"},
                {"name": "Serrucho", "url": "/serrucho", "price": 25000}
            ]),
        )
        .page(&url("/herramientas?page=2"), json!([]))
        .page(&url("/martillo"), detail("M1"))
        .page(&url("/serrucho"), detail("S1"))
}

#[tokio::test]
async fn listing_is_enriched_and_stored() {
    let config = config(true);
    let fetcher = site();
    let products = MemoryProductStore::new();
    let categories = MemoryCategoryStore::new();
    let catalog = Catalog::new(&config, &fetcher, &JsonParser, &products, &categories);

    let scraped = catalog.scrape_listing().await.unwrap();

    assert_eq!(scraped.len(), 2);
    let stored = products.list().await.unwrap();
    assert_eq!(stored, scraped);
    assert_eq!(stored[0].sku_id.as_deref(), Some("M1"));
    assert_eq!(stored[1].brand.as_deref(), Some("Acme"));
    assert_eq!(stored[1].category_name.as_deref(), Some("Herramientas"));

    let known = categories.list().await.unwrap();
    assert_eq!(known.len(), 1);
    assert_eq!(stored[0].categories, known);
}

#[tokio::test]
async fn enrichment_can_be_disabled() {
    let config = config(false);
    let fetcher = site();
    let products = MemoryProductStore::new();
    let categories = MemoryCategoryStore::new();
    let catalog = Catalog::new(&config, &fetcher, &JsonParser, &products, &categories);

    let scraped = catalog.scrape_listing().await.unwrap();

    assert_eq!(scraped.len(), 2);
    assert!(scraped.iter().all(|p| p.sku_id.is_none()));
    assert_eq!(fetcher.requests().len(), 2);
}

#[tokio::test]
async fn rescraping_upserts_by_identity() {
    let config = config(true);
    let fetcher = site();
    let products = MemoryProductStore::new();
    let categories = MemoryCategoryStore::new();
    let catalog = Catalog::new(&config, &fetcher, &JsonParser, &products, &categories);

    catalog.scrape_listing().await.unwrap();
    catalog.scrape_listing().await.unwrap();

    assert_eq!(products.list().await.unwrap().len(), 2);
    assert_eq!(categories.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn rescraping_merges_with_a_previous_run() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("catalog.db");
    let fetcher = site();

    let store = SqliteStore::open(&db).await.unwrap();
    Catalog::new(&config(false), &fetcher, &JsonParser, &store, &store)
        .scrape_listing()
        .await
        .unwrap();
    store.close().await;

    let store = SqliteStore::open(&db).await.unwrap();
    Catalog::new(&config(true), &fetcher, &JsonParser, &store, &store)
        .scrape_listing()
        .await
        .unwrap();

    let stored = ProductStore::list(&store).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].name.as_deref(), Some("Martillo"));
    assert_eq!(stored[0].sku_id.as_deref(), Some("M1"));
    assert_eq!(stored[1].brand.as_deref(), Some("Acme"));
    assert_eq!(stored[1].categories.len(), 1);
    assert_eq!(CategoryStore::list(&store).await.unwrap().len(), 1);
}

#[tokio::test]
async fn search_results_are_stored() {
    let config = config(false);
    let fetcher = ScriptedFetcher::new().json(|_, params| window(params, 7, "A"));
    let products = MemoryProductStore::new();
    let categories = MemoryCategoryStore::new();
    let catalog = Catalog::new(&config, &fetcher, &JsonParser, &products, &categories);

    let query = catalog.search_query(&[("ft".into(), "arroz".into())]);
    let found = catalog.scrape_search(&query).await.unwrap();

    assert_eq!(found.len(), 7);
    assert_eq!(products.list().await.unwrap().len(), 7);
    let params = &fetcher.json_requests()[0];
    assert_eq!(params["ft"], "arroz");
    assert_eq!(params["map"], "c");
}

#[tokio::test]
async fn sku_variants_sharing_a_url_are_stored_apart() {
    let config = config(false);
    let fetcher = ScriptedFetcher::new().json(|_, params| {
        if params["_from"] != "0" {
            return common::status(416);
        }
        common::ok(json!([
            {"sku": "9001", "name": "Taladro 110V", "url": "/taladro-acme/p"},
            {"sku": "9002", "name": "Taladro 220V", "url": "/taladro-acme/p"}
        ]))
    });
    let products = MemoryProductStore::new();
    let categories = MemoryCategoryStore::new();
    let catalog = Catalog::new(&config, &fetcher, &JsonParser, &products, &categories);

    let found = catalog
        .scrape_search(&catalog.search_query(&[]))
        .await
        .unwrap();

    assert_eq!(found.len(), 2);
    let stored = products.list().await.unwrap();
    let skus: Vec<_> = stored.iter().map(|p| p.sku_id.as_deref()).collect();
    assert_eq!(skus, vec![Some("9001"), Some("9002")]);
}
