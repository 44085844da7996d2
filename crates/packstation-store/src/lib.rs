//! # packstation-store: Catalog Database and Audit Records
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Pack Station Data Flow                              │
//! │                                                                         │
//! │  scan-console                                                           │
//! │       │  ShipmentSession::new(config, catalog, audit, feedback)         │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                 packstation-store (THIS CRATE)                  │    │
//! │  │                                                                 │    │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐    │    │
//! │  │   │   Database    │    │  Repositories │    │ FsAuditStore │    │    │
//! │  │   │   (pool.rs)   │    │ order.rs      │    │ (audit.rs)   │    │    │
//! │  │   │ impl Catalog  │◄───│ product.rs    │    │ impl Audit-  │    │    │
//! │  │   │ (catalog.rs)  │    │               │    │   Store      │    │    │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘    │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │       │                                              │                  │
//! │       ▼                                              ▼                  │
//! │  catalog.db (SQLite, WAL)                  audit/202410/8042            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded schema migrations
//! - [`repository`] - Orders and products
//! - [`catalog`] - `Catalog` implementation and shipped-status write-back
//! - [`audit`] - Filesystem `AuditStore`
//! - [`error`] - Store error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use packstation_store::{Database, DbConfig, FsAuditStore};
//!
//! let db = Database::new(DbConfig::new("catalog.db")).await?;
//! let audit = FsAuditStore::new("/var/lib/packstation/audit");
//! let order = db.orders().get(OrderId(8042)).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod audit;
pub mod catalog;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

#[cfg(test)]
pub(crate) mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use audit::FsAuditStore;
pub use error::{StoreError, StoreResult};
pub use pool::{Database, DbConfig};

pub use repository::order::{OrderRepository, ShippingStatus};
pub use repository::product::{ProductRecord, ProductRepository};
