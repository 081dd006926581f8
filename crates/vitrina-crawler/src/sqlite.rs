use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::{Row, Sqlite, Transaction};

use crate::model::{Category, Crumb, Product};
use crate::store::{crumb_identity, CategoryStore, ProductStore};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS categories (
    id      INTEGER PRIMARY KEY AUTOINCREMENT,
    name    TEXT NOT NULL,
    slug    TEXT NOT NULL UNIQUE,
    url     TEXT
);

CREATE TABLE IF NOT EXISTS products (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    sku_id           TEXT UNIQUE,
    product_id       TEXT,
    nombre_producto  TEXT,
    marca            TEXT,
    unidad           TEXT,
    imagen           TEXT,
    precio           TEXT,
    tipo_precio      TEXT,
    categoria_id     TEXT,
    nombre_categoria TEXT,
    url_producto     TEXT
);
CREATE INDEX IF NOT EXISTS ix_products_url ON products(url_producto);

CREATE TABLE IF NOT EXISTS product_categories (
    product_id  INTEGER NOT NULL REFERENCES products(id) ON DELETE CASCADE,
    category_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
    level       INTEGER NOT NULL,
    PRIMARY KEY (product_id, category_id)
);
"#;

const PRODUCT_BY_SKU: &str = r#"
SELECT id, sku_id, product_id, nombre_producto, marca, unidad, imagen, precio,
       tipo_precio, categoria_id, nombre_categoria, url_producto
FROM products WHERE sku_id = ?
"#;

const PRODUCT_BY_URL: &str = r#"
SELECT id, sku_id, product_id, nombre_producto, marca, unidad, imagen, precio,
       tipo_precio, categoria_id, nombre_categoria, url_producto
FROM products WHERE url_producto = ? ORDER BY id LIMIT 1
"#;

const PRODUCT_BY_URL_WITHOUT_SKU: &str = r#"
SELECT id, sku_id, product_id, nombre_producto, marca, unidad, imagen, precio,
       tipo_precio, categoria_id, nombre_categoria, url_producto
FROM products WHERE url_producto = ? AND sku_id IS NULL ORDER BY id LIMIT 1
"#;

const ALL_PRODUCTS: &str = r#"
SELECT id, sku_id, product_id, nombre_producto, marca, unidad, imagen, precio,
       tipo_precio, categoria_id, nombre_categoria, url_producto
FROM products ORDER BY id
"#;

const INSERT_PRODUCT: &str = r#"
INSERT INTO products (sku_id, product_id, nombre_producto, marca, unidad, imagen, precio,
                      tipo_precio, categoria_id, nombre_categoria, url_producto)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const UPDATE_PRODUCT: &str = r#"
UPDATE products SET sku_id = ?, product_id = ?, nombre_producto = ?, marca = ?, unidad = ?,
                    imagen = ?, precio = ?, tipo_precio = ?, categoria_id = ?,
                    nombre_categoria = ?, url_producto = ?
WHERE id = ?
"#;

const PRODUCT_CATEGORIES: &str = r#"
SELECT pc.product_id, c.id, c.name, c.slug, c.url
FROM product_categories pc
JOIN categories c ON c.id = pc.category_id
ORDER BY pc.product_id, pc.level
"#;

/// Durable product and category store backed by a SQLite file.
///
/// Upserts follow the in-memory stores: a SKU never matches another SKU, a product
/// without SKU matches the first row stored under its URL, and stored values
/// are only filled, never overwritten, except the name and a non-empty category path.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens the database at `path`, creating the file and its tables when missing.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Couldn't create {}", parent.display()))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);
        // Writers are serialized on a single connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .with_context(|| format!("Couldn't open database {}", path.display()))?;

        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        log::debug!("Opened database {}", path.display());
        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn stored(
        tx: &mut Transaction<'_, Sqlite>,
        product: &Product,
    ) -> Result<Option<(i64, Product)>> {
        let row = match (&product.sku_id, &product.url) {
            (Some(sku), url) => {
                let by_sku = sqlx::query(PRODUCT_BY_SKU)
                    .bind(sku)
                    .fetch_optional(&mut **tx)
                    .await?;
                match (by_sku, url) {
                    (None, Some(url)) => {
                        sqlx::query(PRODUCT_BY_URL_WITHOUT_SKU)
                            .bind(url)
                            .fetch_optional(&mut **tx)
                            .await?
                    }
                    (by_sku, _) => by_sku,
                }
            }
            (None, Some(url)) => {
                sqlx::query(PRODUCT_BY_URL)
                    .bind(url)
                    .fetch_optional(&mut **tx)
                    .await?
            }
            (None, None) => None,
        };
        match row {
            Some(row) => Ok(Some((row.try_get("id")?, product_from_row(&row)?))),
            None => Ok(None),
        }
    }
}

fn product_from_row(row: &SqliteRow) -> Result<Product> {
    let price = row
        .try_get::<Option<String>, _>("precio")?
        .map(|p| Decimal::from_str(&p))
        .transpose()
        .context("Invalid stored price")?;
    Ok(Product {
        sku_id: row.try_get("sku_id")?,
        product_id: row.try_get("product_id")?,
        name: row.try_get("nombre_producto")?,
        brand: row.try_get("marca")?,
        unit: row.try_get("unidad")?,
        image: row.try_get("imagen")?,
        price,
        price_type: row.try_get("tipo_precio")?,
        category_id: row.try_get("categoria_id")?,
        category_name: row.try_get("nombre_categoria")?,
        url: row.try_get("url_producto")?,
        categories: vec![],
    })
}

fn category_from_row(row: &SqliteRow) -> Result<Category> {
    Ok(Category {
        id: row.try_get::<i64, _>("id")? as u64,
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        url: row.try_get("url")?,
    })
}

/// Binds the product columns in `INSERT_PRODUCT`/`UPDATE_PRODUCT` order.
fn bind_product<'q>(
    query: sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    product: &Product,
) -> sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    query
        .bind(product.sku_id.clone())
        .bind(product.product_id.clone())
        .bind(product.name.clone())
        .bind(product.brand.clone())
        .bind(product.unit.clone())
        .bind(product.image.clone())
        .bind(product.price.map(|p| p.to_string()))
        .bind(product.price_type.clone())
        .bind(product.category_id.clone())
        .bind(product.category_name.clone())
        .bind(product.url.clone())
}

#[async_trait]
impl ProductStore for SqliteStore {
    async fn save(&self, products: &[Product]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for product in products {
            let id = match Self::stored(&mut tx, product).await? {
                Some((id, mut stored)) => {
                    stored.absorb(product.clone());
                    bind_product(sqlx::query(UPDATE_PRODUCT), &stored)
                        .bind(id)
                        .execute(&mut *tx)
                        .await?;
                    id
                }
                None => bind_product(sqlx::query(INSERT_PRODUCT), product)
                    .execute(&mut *tx)
                    .await?
                    .last_insert_rowid(),
            };

            if product.categories.is_empty() {
                continue;
            }
            sqlx::query("DELETE FROM product_categories WHERE product_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            for (level, category) in product.categories.iter().enumerate() {
                // Categories unknown to this database are not linked.
                sqlx::query(
                    "INSERT OR IGNORE INTO product_categories (product_id, category_id, level)
                     SELECT ?, id, ? FROM categories WHERE id = ?",
                )
                .bind(id)
                .bind(level as i64)
                .bind(category.id as i64)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Product>> {
        let rows = sqlx::query(ALL_PRODUCTS).fetch_all(&self.pool).await?;
        let links = sqlx::query(PRODUCT_CATEGORIES)
            .fetch_all(&self.pool)
            .await?;

        let mut paths: HashMap<i64, Vec<Category>> = HashMap::new();
        for link in &links {
            paths
                .entry(link.try_get("product_id")?)
                .or_default()
                .push(category_from_row(link)?);
        }

        rows.iter()
            .map(|row| -> Result<Product> {
                let mut product = product_from_row(row)?;
                let id: i64 = row.try_get("id")?;
                product.categories = paths.remove(&id).unwrap_or_default();
                Ok(product)
            })
            .collect()
    }
}

#[async_trait]
impl CategoryStore for SqliteStore {
    async fn ensure_path(&self, crumbs: &[Crumb]) -> Result<Vec<Category>> {
        let mut tx = self.pool.begin().await?;

        let mut path = Vec::with_capacity(crumbs.len());
        for crumb in crumbs {
            let Some((name, slug)) = crumb_identity(crumb) else {
                continue;
            };

            let known = sqlx::query("SELECT id, name, slug, url FROM categories WHERE slug = ?")
                .bind(&slug)
                .fetch_optional(&mut *tx)
                .await?;
            let category = match known {
                Some(row) => {
                    let mut category = category_from_row(&row)?;
                    let mut changed = false;
                    if category.name.is_empty() && !name.is_empty() {
                        category.name = name.to_string();
                        changed = true;
                    }
                    if category.url.is_none() && crumb.url.is_some() {
                        category.url = crumb.url.clone();
                        changed = true;
                    }
                    if changed {
                        sqlx::query("UPDATE categories SET name = ?, url = ? WHERE id = ?")
                            .bind(&category.name)
                            .bind(&category.url)
                            .bind(category.id as i64)
                            .execute(&mut *tx)
                            .await?;
                    }
                    category
                }
                None => {
                    let id = sqlx::query("INSERT INTO categories (name, slug, url) VALUES (?, ?, ?)")
                        .bind(name)
                        .bind(&slug)
                        .bind(&crumb.url)
                        .execute(&mut *tx)
                        .await?
                        .last_insert_rowid();
                    Category {
                        id: id as u64,
                        name: name.to_string(),
                        slug,
                        url: crumb.url.clone(),
                    }
                }
            };
            path.push(category);
        }

        tx.commit().await?;
        Ok(path)
    }

    async fn list(&self) -> Result<Vec<Category>> {
        sqlx::query("SELECT id, name, slug, url FROM categories ORDER BY id")
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(category_from_row)
            .collect()
    }
}
