//! # Product Repository
//!
//! Products carry a free-form parameter string; the station only cares
//! about `sn:1`, which asks for a serial number per shipped unit.

use sqlx::SqlitePool;
use tracing::{debug, warn};

use packstation_core::{Money, ProductId, ProductParams};

use super::to_u32;
use crate::error::StoreResult;

/// A catalog product as the station sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRecord {
    pub id: ProductId,
    pub reference: String,
    pub name: String,
    /// Manufacturer EAN; `None` for products labelled with a `32321` code.
    pub ean13: Option<String>,
    pub price: Money,
    /// Raw `key:value,...` string as stored.
    pub params: String,
    pub is_active: bool,
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: i64,
    reference: String,
    name: String,
    ean13: Option<String>,
    price_cents: i64,
    params: String,
    is_active: bool,
}

impl TryFrom<ProductRow> for ProductRecord {
    type Error = crate::error::StoreError;

    fn try_from(row: ProductRow) -> StoreResult<Self> {
        Ok(ProductRecord {
            id: ProductId(to_u32(row.id, "products.id")?),
            reference: row.reference,
            name: row.name,
            ean13: row.ean13.filter(|e| !e.is_empty()),
            price: Money::from_cents(row.price_cents),
            params: row.params,
            is_active: row.is_active,
        })
    }
}

const SELECT_PRODUCT: &str = r#"
    SELECT id, reference, name, ean13, price_cents, params, is_active
    FROM products
"#;

#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    pub async fn get(&self, id: ProductId) -> StoreResult<Option<ProductRecord>> {
        let row = sqlx::query_as::<_, ProductRow>(&format!("{SELECT_PRODUCT} WHERE id = ?1"))
            .bind(i64::from(id.0))
            .fetch_optional(&self.pool)
            .await?;

        row.map(ProductRecord::try_from).transpose()
    }

    /// Active product carrying `ean` as its manufacturer code.
    pub async fn get_by_ean(&self, ean: &str) -> StoreResult<Option<ProductRecord>> {
        debug!(ean = %ean, "Looking up product by EAN");

        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "{SELECT_PRODUCT} WHERE ean13 = ?1 AND is_active = 1"
        ))
        .bind(ean)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ProductRecord::try_from).transpose()
    }

    /// Parsed parameters of a product; `None` if the product is unknown.
    ///
    /// A malformed parameter string is logged and read as no parameters, so
    /// a typo in the shop back office cannot block packing.
    pub async fn params(&self, id: ProductId) -> StoreResult<Option<ProductParams>> {
        let raw: Option<String> = sqlx::query_scalar("SELECT params FROM products WHERE id = ?1")
            .bind(i64::from(id.0))
            .fetch_optional(&self.pool)
            .await?;

        Ok(raw.map(|raw| match ProductParams::parse(&raw) {
            Ok(params) => params,
            Err(e) => {
                warn!(product_id = %id, error = %e, "Ignoring product parameters");
                ProductParams::default()
            }
        }))
    }

    pub async fn insert(&self, product: &ProductRecord) -> StoreResult<()> {
        debug!(product_id = %product.id, reference = %product.reference, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (id, reference, name, ean13, price_cents, params, is_active)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(i64::from(product.id.0))
        .bind(&product.reference)
        .bind(&product.name)
        .bind(product.ean13.as_deref())
        .bind(product.price.cents())
        .bind(&product.params)
        .bind(product.is_active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn count(&self) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
