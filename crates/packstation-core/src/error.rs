//! # Error Types
//!
//! Domain-specific error types for packstation-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  packstation-core errors (this file)                                   │
//! │  ├── ScanError     - Malformed scan line (multiplier grammar)          │
//! │  ├── ParamsError   - Product parameter string not key:value            │
//! │  ├── ShipError     - Rejected instruction or failed shipment step      │
//! │  └── BackendError  - Catalog / audit collaborator failure              │
//! │                                                                         │
//! │  packstation-store errors (separate crate)                             │
//! │  └── StoreError    - sqlx / filesystem failures, mapped to Backend     │
//! │                                                                         │
//! │  Flow: StoreError → BackendError → ShipError → console "[ERROR] ..."   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every `ShipError` is reported to the operator and the session keeps
//! running. Only [`ShipError::AuditPersistFailed`] leaves work unfinished:
//! the shipment stays loaded so FINALIZE can be retried.

use thiserror::Error;

use crate::audit::AuditKey;
use crate::command::CommandKind;
use crate::reconcile::Reconciliation;
use crate::session::SessionState;
use crate::types::{OrderId, ProductId};

// =============================================================================
// Scan Error
// =============================================================================

/// A scan line that cannot be split into multiplier and remainder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    /// Nothing but whitespace was entered.
    #[error("empty scan")]
    Empty,

    /// `+0*...` or `-0*...`.
    #[error("multiplier must not be zero")]
    ZeroMultiplier,

    /// Multiplier digits above [`crate::MAX_MULTIPLIER`].
    #[error("multiplier {0} exceeds maximum ({max})", max = crate::MAX_MULTIPLIER)]
    MultiplierTooLarge(String),

    /// `+3*` with nothing after the star.
    #[error("multiplier without a barcode")]
    MissingRemainder,
}

/// A product parameter string with a pair that is not `key:value`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed product parameter '{0}' (expected key:value)")]
pub struct ParamsError(pub String);

// =============================================================================
// Backend Error
// =============================================================================

/// Failure reported by a collaborator (catalog or audit store).
///
/// Carries a rendered message rather than the source error so the core does
/// not depend on the storage crates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{service} unavailable: {message}")]
pub struct BackendError {
    pub service: &'static str,
    pub message: String,
}

impl BackendError {
    pub fn catalog(message: impl std::fmt::Display) -> Self {
        Self {
            service: "catalog",
            message: message.to_string(),
        }
    }

    pub fn audit(message: impl std::fmt::Display) -> Self {
        Self {
            service: "audit store",
            message: message.to_string(),
        }
    }
}

// =============================================================================
// Ship Error
// =============================================================================

/// Why an instruction was refused by the shipment session.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShipError {
    /// The transition table has no entry for (state, command).
    ///
    /// ## User Workflow
    /// ```text
    /// WAIT_ORDER + CMD-CHECK      ──► "no order loaded"
    /// CONTROL_ORDER + free text   ──► "unknown instruction"
    /// ```
    #[error("{}", guard_message(.state, .command))]
    GuardRejection {
        state: SessionState,
        command: CommandKind,
    },

    /// WAIT_SERIAL accepts nothing but a serial number.
    #[error("expected serial number for product {product_id}")]
    SerialExpected { product_id: ProductId },

    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    /// Numeric scan in CONTROL_ORDER that matches no catalog product.
    #[error("no product matches barcode {0}")]
    ProductNotFound(String),

    #[error("product {0} is not part of order {1}")]
    ProductNotInOrder(ProductId, OrderId),

    /// An audit record already exists for the order. `key` is the record
    /// of the shipment it went out with, which for an appended order is the
    /// primary order's record.
    #[error("order {order_id} already shipped (audit record {key})")]
    DuplicateShipment { order_id: OrderId, key: AuditKey },

    /// APPEND of the primary order or of an order appended earlier.
    #[error("order {0} is already part of this shipment")]
    AlreadyInShipment(OrderId),

    #[error(
        "product {product_id}: {scanned} scanned + {requested} exceeds ordered quantity {ordered}"
    )]
    QuantityOverrun {
        product_id: ProductId,
        scanned: i64,
        requested: i64,
        ordered: i64,
    },

    #[error("product {product_id}: cannot remove {removed}, only {scanned} scanned")]
    QuantityUnderrun {
        product_id: ProductId,
        scanned: i64,
        removed: i64,
    },

    /// Serial-tracked products are scanned one unit at a time.
    #[error("product {0} requires a serial number per unit, scan without multiplier")]
    SerialRequiresSingleUnit(ProductId),

    /// CHECK or FINALIZE found differences; the report lists them.
    #[error("check failed: {} issue(s)", .0.failures())]
    ReconciliationFailed(Reconciliation),

    /// Writing the audit record failed; nothing was reset.
    #[error("audit record for order {order_id} could not be written: {source}")]
    AuditPersistFailed {
        order_id: OrderId,
        source: BackendError,
    },

    /// The scan line itself was malformed; raised before the session.
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl ShipError {
    /// True when the shipment could not be closed even though the operator
    /// asked for it. The console rings louder for these.
    pub fn is_persist_failure(&self) -> bool {
        matches!(self, ShipError::AuditPersistFailed { .. })
    }
}

fn guard_message(state: &SessionState, command: &CommandKind) -> String {
    match state {
        SessionState::WaitOrder => format!("no order loaded ({command} ignored)"),
        _ => format!("unknown instruction {command} in {state}"),
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

pub type ShipResult<T> = Result<T, ShipError>;

// =============================================================================
// Unit Tests
// =============================================================================
