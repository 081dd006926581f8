use serde::{Deserialize, Deserializer, Serialize};

use crate::model::{Crumb, Product, ProductRecord};

/// Storefront specific extraction logic plugged into the crawlers.
///
/// Implementations never fail: malformed input yields empty results.
pub trait CatalogParser: Send + Sync {
    /// Items of one listing page.
    fn listing_items(&self, page: &str) -> Vec<ProductRecord>;

    /// Structured product data found on a detail page.
    fn detail(&self, page: &str) -> Option<ProductRecord>;

    /// Breadcrumb trail of a detail page, root first.
    fn breadcrumbs(&self, page: &str) -> Vec<Crumb>;

    /// Products of one search window payload.
    fn search_results(&self, payload: &serde_json::Value) -> Vec<Product>;

    /// Category facet roots of a facets payload.
    fn facet_tree(&self, payload: &serde_json::Value) -> Vec<FacetNode>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetNode {
    #[serde(alias = "Id", deserialize_with = "id_as_string", default)]
    pub id: String,
    #[serde(alias = "Name", default)]
    pub name: Option<String>,
    #[serde(alias = "Link", default)]
    pub link: Option<String>,
    #[serde(alias = "Children", default, deserialize_with = "null_as_empty")]
    pub children: Vec<FacetNode>,
}

impl FacetNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<FacetNode>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<FacetNode>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Collects the leaves of a facet forest, depth first, parents before their children.
pub fn leaf_categories(roots: Vec<FacetNode>) -> Vec<FacetNode> {
    let mut leaves = vec![];
    let mut stack: Vec<FacetNode> = roots.into_iter().rev().collect();
    while let Some(mut node) = stack.pop() {
        if node.is_leaf() {
            leaves.push(node);
        } else {
            let children = std::mem::take(&mut node.children);
            stack.extend(children.into_iter().rev());
        }
    }
    leaves
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn node(id: &str, children: Vec<FacetNode>) -> FacetNode {
        FacetNode {
            id: id.into(),
            children,
            ..Default::default()
        }
    }

    #[test]
    fn leaves_in_depth_first_order() {
        let roots = vec![
            node(
                "1",
                vec![node("11", vec![node("111", vec![]), node("112", vec![])]), node("12", vec![])],
            ),
            node("2", vec![]),
        ];
        let ids: Vec<_> = leaf_categories(roots).into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec!["111", "112", "12", "2"]);
    }

    #[test]
    fn deep_trees_do_not_recurse() {
        let mut root = node("leaf", vec![]);
        for depth in 0..50_000 {
            root = node(&depth.to_string(), vec![root]);
        }
        let leaves = leaf_categories(vec![root]);
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].id, "leaf");
    }

    #[test]
    fn facet_nodes_accept_both_casings() {
        let nodes: Vec<FacetNode> = serde_json::from_value(json!([
            {"Id": 10, "Name": "Despensa", "Link": "/mercado/despensa", "Children": [
                {"id": "101", "name": "Arroces", "children": null}
            ]},
            {"id": 20, "name": "Aseo"}
        ]))
        .unwrap();
        assert_eq!(nodes[0].id, "10");
        assert_eq!(nodes[0].children[0].id, "101");
        assert!(nodes[0].children[0].is_leaf());
        assert!(nodes[1].is_leaf());
    }
}
