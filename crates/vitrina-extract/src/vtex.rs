//! VTEX catalog REST payloads: product search results and category facets.

use serde_json::Value;
use vitrina_crawler::text::{self, normalize_whitespace, BRAND_LEN, CATEGORY_NAME_LEN};
use vitrina_crawler::{FacetNode, Product, Url};

use crate::price::json_price;

/// Price type reported when the offer does not name one.
const DEFAULT_PRICE_TYPE: &str = "NORMAL";

fn field<'v>(value: &'v Value, keys: &[&str]) -> Option<&'v Value> {
    keys.iter()
        .filter_map(|k| value.get(*k))
        .find(|v| !is_blank(v))
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn short_id(value: Option<&Value>) -> Option<String> {
    value
        .and_then(scalar)
        .and_then(|id| text::coerce_short_id(&id))
}

/// One product per SKU of every search result.
pub fn search_results(payload: &Value, base: &Url) -> Vec<Product> {
    let Some(results) = payload.as_array() else {
        if !payload.is_null() {
            log::warn!("Unexpected search payload, expected an array");
        }
        return vec![];
    };
    let base = base.as_str().trim_end_matches('/');

    let mut products = vec![];
    for result in results {
        let template = Product {
            product_id: short_id(field(result, &["productId", "ProductId"])),
            name: field(result, &["productName", "productTitle", "ProductName"])
                .and_then(Value::as_str)
                .and_then(normalize_whitespace),
            brand: field(result, &["brand", "Brand"])
                .and_then(Value::as_str)
                .and_then(normalize_whitespace)
                .map(|brand| text::truncate(&brand, BRAND_LEN)),
            category_id: short_id(field(result, &["categoryId", "CategoryId"])),
            category_name: category_name(result),
            url: field(result, &["linkText", "link"])
                .and_then(Value::as_str)
                .map(|link| format!("{base}/{}/p", link.trim_matches('/'))),
            ..Default::default()
        };

        let items = field(result, &["items", "Items"])
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for item in items {
            let (price, price_type) = offer(item);
            products.push(Product {
                sku_id: short_id(field(item, &["itemId", "ItemId"])),
                image: first_image(item),
                price,
                price_type,
                unit: field(item, &["measurementUnit", "unitMultiplier"])
                    .and_then(scalar)
                    .filter(|unit| unit != "0")
                    .and_then(|unit| text::coerce_short_id(&unit)),
                ..template.clone()
            });
        }
    }
    products
}

/// Last segment of the deepest category path, as in `/Despensa/Arroces/`.
fn category_name(result: &Value) -> Option<String> {
    field(result, &["categories", "Categories"])
        .and_then(Value::as_array)
        .and_then(|paths| paths.last())
        .and_then(Value::as_str)
        .and_then(|path| path.trim_matches('/').rsplit('/').next())
        .and_then(normalize_whitespace)
        .map(|name| text::truncate(&name, CATEGORY_NAME_LEN))
}

fn first_image(item: &Value) -> Option<String> {
    field(item, &["images", "Images"])
        .and_then(Value::as_array)
        .and_then(|images| images.first())
        .and_then(|image| field(image, &["imageUrl", "imageUrlText"]))
        .and_then(Value::as_str)
        .map(String::from)
}

fn offer(item: &Value) -> (Option<vitrina_crawler::Decimal>, Option<String>) {
    let offer = field(item, &["sellers", "Sellers"])
        .and_then(Value::as_array)
        .and_then(|sellers| sellers.first())
        .and_then(|seller| seller.get("commertialOffer"));
    let Some(offer) = offer else {
        return (None, None);
    };

    let price = ["Price", "price", "ListPrice"]
        .iter()
        .filter_map(|k| offer.get(*k))
        .filter_map(json_price)
        .find(|price| !price.is_zero());
    let price_type = price.map(|_| {
        offer
            .get("priceCurrency")
            .and_then(Value::as_str)
            .and_then(text::coerce_short_id)
            .unwrap_or_else(|| DEFAULT_PRICE_TYPE.to_string())
    });
    (price, price_type)
}

/// Category trees of a facets payload.
pub fn facet_tree(payload: &Value) -> Vec<FacetNode> {
    let Some(trees) = field(payload, &["CategoriesTrees", "categoriesTrees"]) else {
        return vec![];
    };
    match serde_json::from_value(trees.clone()) {
        Ok(roots) => roots,
        Err(e) => {
            log::warn!("Couldn't decode category facets: {e}");
            vec![]
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use vitrina_crawler::{leaf_categories, Decimal};

    use super::*;

    fn base() -> Url {
        Url::parse("https://www.eurosupermercados.com.co/").unwrap()
    }

    fn arroz() -> Value {
        json!([{
            "productId": "4521",
            "productName": "Arroz  Diana 500 g",
            "brand": "Diana",
            "linkText": "arroz-diana-500-g",
            "categoryId": "153",
            "categories": ["/Despensa/", "/Despensa/Granos/Arroces/"],
            "items": [
                {
                    "itemId": "9001",
                    "measurementUnit": "un",
                    "images": [{"imageUrl": "https://img.test/9001.jpg"}],
                    "sellers": [{"commertialOffer": {"Price": 3200, "ListPrice": 3500}}]
                },
                {
                    "itemId": 9002,
                    "measurementUnit": "",
                    "unitMultiplier": 0,
                    "images": [],
                    "sellers": [{"commertialOffer": {"Price": 0, "ListPrice": 0}}]
                }
            ]
        }])
    }

    #[test]
    fn one_product_per_sku() {
        let products = search_results(&arroz(), &base());
        assert_eq!(products.len(), 2);

        let first = &products[0];
        assert_eq!(first.sku_id.as_deref(), Some("9001"));
        assert_eq!(first.product_id.as_deref(), Some("4521"));
        assert_eq!(first.name.as_deref(), Some("Arroz Diana 500 g"));
        assert_eq!(first.brand.as_deref(), Some("Diana"));
        assert_eq!(first.unit.as_deref(), Some("un"));
        assert_eq!(first.image.as_deref(), Some("https://img.test/9001.jpg"));
        assert_eq!(first.price, Some(Decimal::from(3200)));
        assert_eq!(first.price_type.as_deref(), Some("NORMAL"));
        assert_eq!(first.category_id.as_deref(), Some("153"));
        assert_eq!(first.category_name.as_deref(), Some("Arroces"));
        assert_eq!(
            first.url.as_deref(),
            Some("https://www.eurosupermercados.com.co/arroz-diana-500-g/p")
        );

        let second = &products[1];
        assert_eq!(second.sku_id.as_deref(), Some("9002"));
        assert_eq!(second.unit, None);
        assert_eq!(second.image, None);
        assert_eq!(second.price, None);
        assert_eq!(second.price_type, None);
        assert_eq!(second.url, first.url);
    }

    #[test]
    fn unexpected_payloads_are_empty() {
        assert!(search_results(&json!(null), &base()).is_empty());
        assert!(search_results(&json!({"error": "x"}), &base()).is_empty());
        assert!(search_results(&json!([{"productId": "1"}]), &base()).is_empty());
    }

    #[test]
    fn facet_leaves() {
        let payload = json!({
            "Departments": [],
            "CategoriesTrees": [
                {"Id": 1, "Name": "Despensa", "Link": "/despensa", "Children": [
                    {"Id": 10, "Name": "Arroces", "Link": "/despensa/arroces", "Children": []},
                    {"Id": 11, "Name": "Aceites", "Link": "/despensa/aceites", "Children": null}
                ]},
                {"Id": "2", "Name": "Aseo", "Link": "/aseo", "Children": []}
            ]
        });
        let ids: Vec<_> = leaf_categories(facet_tree(&payload))
            .into_iter()
            .map(|leaf| leaf.id)
            .collect();
        assert_eq!(ids, vec!["10", "11", "2"]);
        assert!(facet_tree(&json!({"CategoriesTrees": "oops"})).is_empty());
        assert!(facet_tree(&json!([])).is_empty());
    }
}
