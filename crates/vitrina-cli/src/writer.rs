use std::path::Path;
use std::{fs, io};

use serde::Serialize;
use vitrina_crawler::{Decimal, Product};

/// Flat catalog row, categories joined into a slug path.
#[derive(Debug, Serialize)]
pub struct ProductRow<'a> {
    pub sku_id: Option<&'a str>,
    pub product_id: Option<&'a str>,
    pub nombre_producto: Option<&'a str>,
    pub marca: Option<&'a str>,
    pub unidad: Option<&'a str>,
    pub imagen: Option<&'a str>,
    pub precio: Option<Decimal>,
    pub tipo_precio: Option<&'a str>,
    pub categoria_id: Option<&'a str>,
    pub nombre_categoria: Option<&'a str>,
    pub url_producto: Option<&'a str>,
    pub categorias: String,
}

impl<'a> From<&'a Product> for ProductRow<'a> {
    fn from(p: &'a Product) -> Self {
        Self {
            sku_id: p.sku_id.as_deref(),
            product_id: p.product_id.as_deref(),
            nombre_producto: p.name.as_deref(),
            marca: p.brand.as_deref(),
            unidad: p.unit.as_deref(),
            imagen: p.image.as_deref(),
            precio: p.price,
            tipo_precio: p.price_type.as_deref(),
            categoria_id: p.category_id.as_deref(),
            nombre_categoria: p.category_name.as_deref(),
            url_producto: p.url.as_deref(),
            categorias: p
                .categories
                .iter()
                .map(|c| c.slug.as_str())
                .collect::<Vec<_>>()
                .join("/"),
        }
    }
}

pub enum CsvWriter {
    File(csv::Writer<fs::File>),
    Stdout(csv::Writer<io::Stdout>),
}

impl CsvWriter {
    /// Writes to `path` when given, to stdout otherwise.
    pub fn create(path: Option<&Path>) -> anyhow::Result<Self> {
        let wtr = match path {
            Some(path) => Self::File(csv::Writer::from_path(path)?),
            None => Self::Stdout(csv::Writer::from_writer(io::stdout())),
        };
        Ok(wtr)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::File(wtr) => wtr.flush(),
            Self::Stdout(wtr) => wtr.flush(),
        }
    }

    pub fn serialize<S: Serialize>(&mut self, record: S) -> csv::Result<()> {
        match self {
            Self::File(wtr) => wtr.serialize(record),
            Self::Stdout(wtr) => wtr.serialize(record),
        }
    }

    pub fn write_products(&mut self, products: &[Product]) -> anyhow::Result<()> {
        for product in products {
            self.serialize(ProductRow::from(product))?;
        }
        self.flush()?;
        log::info!("Wrote {} products", products.len());
        Ok(())
    }
}
