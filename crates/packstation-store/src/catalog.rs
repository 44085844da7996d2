//! # SQLite Catalog
//!
//! [`Catalog`] on top of the repositories.
//!
//! ```text
//! resolve_product_by_ean(code)
//!     │
//!     ├── products.ean13 = code (active)      → manufacturer EAN
//!     │
//!     └── code is a valid 32321 code          → products.id from the code
//!         and that product is active
//! ```

use async_trait::async_trait;
use chrono::Local;
use tracing::{debug, warn};

use packstation_core::ean::decode_product;
use packstation_core::{BackendError, Catalog, Order, OrderId, ProductId, Shipment};

use crate::error::{catalog_error, StoreResult};
use crate::pool::Database;

#[async_trait]
impl Catalog for Database {
    async fn fetch_order(&self, id: OrderId) -> Result<Option<Order>, BackendError> {
        self.orders().get(id).await.map_err(catalog_error)
    }

    async fn resolve_product_by_ean(&self, ean: &str) -> Result<Option<ProductId>, BackendError> {
        let products = self.products();

        if let Some(product) = products.get_by_ean(ean).await.map_err(catalog_error)? {
            return Ok(Some(product.id));
        }

        let Some(id) = decode_product(ean) else {
            return Ok(None);
        };
        let product = products.get(id).await.map_err(catalog_error)?;
        debug!(ean = %ean, product_id = %id, found = product.is_some(), "Shop product code");
        Ok(product.filter(|p| p.is_active).map(|p| p.id))
    }

    async fn product_requires_serial(&self, id: ProductId) -> Result<bool, BackendError> {
        let params = self.products().params(id).await.map_err(catalog_error)?;
        Ok(params.is_some_and(|p| p.requires_serial()))
    }
}

impl Database {
    /// Copies carrier and tracking number of a finalized shipment onto
    /// every order it contained. Forced shipments without them are skipped.
    ///
    /// Returns the number of orders updated.
    pub async fn mark_shipped(&self, shipment: &Shipment) -> StoreResult<usize> {
        let (Some(carrier), Some(tracking)) = (shipment.carrier, shipment.tracking.as_deref()) else {
            warn!(
                order_id = %shipment.order_id,
                "Shipment has no carrier or tracking number, orders left unmarked"
            );
            return Ok(0);
        };

        let shipped_at = Local::now().naive_local();
        let orders = self.orders();
        let mut updated = 0;
        for id in shipment.order_ids() {
            if orders.mark_shipped(id, carrier, tracking, shipped_at).await? {
                updated += 1;
            }
        }
        Ok(updated)
    }
}
