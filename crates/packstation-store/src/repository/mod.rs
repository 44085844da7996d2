//! # Repositories
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Catalog impl / seed binary                                             │
//! │       │                                                                 │
//! │       │  db.orders().get(OrderId(8042))                                 │
//! │       ▼                                                                 │
//! │  OrderRepository            ProductRepository                           │
//! │  ├── get                    ├── get                                     │
//! │  ├── insert (transaction)   ├── get_by_ean                              │
//! │  ├── mark_shipped           ├── params                                  │
//! │  ├── shipping_status        ├── insert                                  │
//! │  └── count                  └── count                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (orders, order_lines, products)                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rows are read into private `FromRow` structs and converted to core types
//! here; ids that do not fit a `u32` surface as [`StoreError::InvalidData`].
//!
//! [`StoreError::InvalidData`]: crate::error::StoreError::InvalidData

pub mod order;
pub mod product;

use crate::error::{StoreError, StoreResult};

/// SQLite integers are `i64`; the domain ids are `u32`.
pub(crate) fn to_u32(value: i64, column: &str) -> StoreResult<u32> {
    u32::try_from(value).map_err(|_| StoreError::InvalidData(format!("{column} out of range: {value}")))
}
