//! # packstation-core: Shipment Control Logic
//!
//! Everything that decides what a scan *means* and whether a shipment may
//! leave the station lives here. The crate performs no I/O; catalog lookups,
//! audit persistence and operator feedback go through the traits in
//! [`ports`].
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Pack Station Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 scan-console (REPL, terminal)                   │   │
//! │  │      read line ──► classify ──► resolve ──► session.apply       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │            ★ packstation-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐  ┌──────────┐  ┌───────────┐  ┌─────────────┐  │   │
//! │  │   │   scan   │  │ command  │  │  session  │  │  reconcile  │  │   │
//! │  │   │ classify │  │ resolve  │  │ FSM+table │  │ ledger diff │  │   │
//! │  │   └──────────┘  └──────────┘  └───────────┘  └─────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO DATABASE • NO FILES • NO TERMINAL                         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ ports::{Catalog, AuditStore}           │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              packstation-store (SQLite + audit files)           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`scan`] - Multiplier grammar and barcode classification
//! - [`command`] - Turns a classified scan into an [`command::Instruction`]
//! - [`session`] - The shipment state machine and its transition table
//! - [`reconcile`] - Ordered vs scanned comparison and the check report
//! - [`ledger`] - Per-product scanned quantities
//! - [`transcript`] - Carbon copy of everything shown to the operator
//! - [`audit`] - Audit record keys and cross-reference content
//! - [`ean`] - EAN-13 check digits and house barcode formats
//! - [`types`] - Orders, products, carriers, serial entries
//! - [`money`] - Integer money for order totals
//! - [`ports`] - Collaborator traits implemented outside this crate
//! - [`error`] - Domain error types
//!
//! ## Example
//!
//! ```rust
//! use packstation_core::scan::{classify, ScanToken, Verb};
//!
//! let scan = classify("+2*3232100000421").unwrap();
//! assert_eq!(scan.multiplier, 2);
//! assert_eq!(scan.token, ScanToken::Product("3232100000421".into()));
//!
//! let scan = classify("CMD-CHECK").unwrap();
//! assert_eq!(scan.token, ScanToken::Verb(Verb::Check));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod audit;
pub mod command;
pub mod ean;
pub mod error;
pub mod ledger;
pub mod money;
pub mod ports;
pub mod reconcile;
pub mod scan;
pub mod session;
pub mod transcript;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use command::{resolve, Command, CommandKind, Instruction};
pub use error::{BackendError, ScanError, ShipError};
pub use money::Money;
pub use ports::{AuditStore, Catalog, Cue, Feedback};
pub use reconcile::Reconciliation;
pub use scan::{classify, ClassifiedScan, ScanToken, Verb};
pub use session::{Outcome, SessionConfig, SessionState, Shipment, ShipmentSession};
pub use types::{Carrier, Order, OrderId, OrderLine, ProductId, ProductParams, SerialEntry};

// =============================================================================
// Constants
// =============================================================================

/// Largest magnitude accepted in a `+N*` / `-N*` multiplier prefix.
///
/// Matches the biggest quantity a single order line can realistically carry;
/// anything above is almost certainly a mistyped barcode.
pub const MAX_MULTIPLIER: i64 = 999;

/// Barcode prefix of house order labels (`324` + 9-digit id + check digit).
pub const ORDER_BARCODE_PREFIX: &str = "324";

/// Barcode prefix of house product labels (`32321` + 7-digit id + check digit).
pub const PRODUCT_BARCODE_PREFIX: &str = "32321";

/// Barcode prefix of manufacturer EANs registered for the shop's country.
pub const MANUFACTURER_EAN_PREFIX: &str = "33";

/// Product parameter that marks serial-number capture.
pub const SERIAL_PARAM: &str = "sn";
