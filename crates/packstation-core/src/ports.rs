//! # Collaborator Traits
//!
//! The session reaches the outside world only through these traits.
//!
//! ```text
//! ┌───────────────────┐      ┌──────────────────────────────────────────┐
//! │  ShipmentSession  │─────►│ Catalog     orders, EAN lookup, params   │  SQLite
//! │                   │─────►│ AuditStore  exists / save / cross-ref    │  files
//! │                   │─────►│ Feedback    lines + audio cues           │  terminal
//! └───────────────────┘      └──────────────────────────────────────────┘
//! ```
//!
//! `Catalog` and `AuditStore` are async and fallible; a failure surfaces as
//! [`BackendError`] and the session reports it without changing state.
//! `Feedback` is synchronous and best-effort: it must never fail a scan.

use async_trait::async_trait;

use crate::audit::AuditKey;
use crate::error::BackendError;
use crate::types::{Order, OrderId, ProductId, SerialEntry};

/// Read access to orders and products.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// The order with its lines, or `None` when the id is unknown.
    async fn fetch_order(&self, id: OrderId) -> Result<Option<Order>, BackendError>;

    /// Maps a scanned code to a product.
    async fn resolve_product_by_ean(&self, ean: &str) -> Result<Option<ProductId>, BackendError>;

    /// Whether each scanned unit needs a serial number.
    async fn product_requires_serial(&self, id: ProductId) -> Result<bool, BackendError>;
}

/// Persistent audit records, one per shipped order.
///
/// The existence of a record is the "already shipped" marker.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn exists(&self, order: &Order) -> Result<bool, BackendError>;

    /// Record the order went out under: its own key, or the primary record
    /// named by its cross-reference. `None` when the order has no record.
    async fn shipped_under(&self, order: &Order) -> Result<Option<AuditKey>, BackendError>;

    /// Writes the transcript as the order's record. Must refuse to replace
    /// an existing record.
    async fn save(&self, order: &Order, lines: &[String]) -> Result<AuditKey, BackendError>;

    /// Marks `appended` as shipped under `primary`'s record.
    async fn save_cross_reference(
        &self,
        appended: &Order,
        primary: &AuditKey,
    ) -> Result<AuditKey, BackendError>;

    /// Serial numbers captured for the shipment, stored next to the record.
    async fn save_serials(&self, order: &Order, serials: &[SerialEntry]) -> Result<(), BackendError>;
}

/// Audio or visual signal accompanying a reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cue {
    Error,
    Success,
    /// Operator attention needed (serial prompt, force mode).
    Notify,
}

impl Cue {
    pub const fn name(&self) -> &'static str {
        match self {
            Cue::Error => "error",
            Cue::Success => "success",
            Cue::Notify => "notify",
        }
    }
}

/// Operator-facing output.
pub trait Feedback: Send {
    fn line(&mut self, text: &str);

    fn cue(&mut self, cue: Cue);
}
