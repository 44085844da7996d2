//! # Command Resolver
//!
//! Turns a [`ClassifiedScan`] into the [`Instruction`] the session acts on.
//!
//! ```text
//! ScanToken::Verb(Append)   ──► Command::AppendOrderRequest
//! ScanToken::Verb(v)        ──► Command::Verb(v)
//! ScanToken::Carrier(c)     ──► Command::SetCarrier(c)
//! ScanToken::Order(id)      ──► Command::LoadOrder(id)
//! ScanToken::Product(ean)   ──► Catalog lookup ──► ScanProduct(id) | Raw(ean)
//! ScanToken::Text(t)        ──► Catalog lookup if EAN-shaped, else Raw(t)
//! ```
//!
//! Numeric codes that match no product stay available as `Raw` text: a
//! manually typed tracking number must not be swallowed by the lookup.

use std::fmt;

use tracing::debug;

use crate::ean::looks_like_ean;
use crate::error::ShipError;
use crate::ports::Catalog;
use crate::scan::{ClassifiedScan, ScanToken, Verb};
use crate::types::{Carrier, OrderId, ProductId};

/// A resolved operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Raw(String),
    Verb(Verb),
    SetCarrier(Carrier),
    LoadOrder(OrderId),
    ScanProduct(ProductId),
    AppendOrderRequest,
}

/// Command discriminant, used in guard rejections and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Raw,
    Verb,
    SetCarrier,
    LoadOrder,
    ScanProduct,
    AppendOrderRequest,
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Raw(_) => CommandKind::Raw,
            Command::Verb(_) => CommandKind::Verb,
            Command::SetCarrier(_) => CommandKind::SetCarrier,
            Command::LoadOrder(_) => CommandKind::LoadOrder,
            Command::ScanProduct(_) => CommandKind::ScanProduct,
            Command::AppendOrderRequest => CommandKind::AppendOrderRequest,
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CommandKind::Raw => "RAW",
            CommandKind::Verb => "VERB",
            CommandKind::SetCarrier => "SET_CARRIER",
            CommandKind::LoadOrder => "LOAD_ORDER",
            CommandKind::ScanProduct => "SCAN_PRODUCT",
            CommandKind::AppendOrderRequest => "APPEND_ORDER_REQUEST",
        })
    }
}

/// A command together with the quantity multiplier of its scan line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub multiplier: i64,
    pub command: Command,
}

impl Instruction {
    pub fn new(command: Command) -> Self {
        Self {
            multiplier: 1,
            command,
        }
    }

    pub fn with_multiplier(multiplier: i64, command: Command) -> Self {
        Self {
            multiplier,
            command,
        }
    }
}

/// Resolves a classified scan, consulting the catalog for product codes.
///
/// ## Errors
/// Only catalog failures; an unknown code is not an error here.
pub async fn resolve(scan: ClassifiedScan, catalog: &dyn Catalog) -> Result<Instruction, ShipError> {
    let ClassifiedScan { multiplier, token } = scan;

    let command = match token {
        ScanToken::Verb(Verb::Append) => Command::AppendOrderRequest,
        ScanToken::Verb(verb) => Command::Verb(verb),
        ScanToken::Carrier(carrier) => Command::SetCarrier(carrier),
        ScanToken::Order(id) => Command::LoadOrder(id),
        ScanToken::Product(code) => lookup_product(code, catalog).await?,
        ScanToken::Text(text) if looks_like_ean(&text) => lookup_product(text, catalog).await?,
        ScanToken::Text(text) => Command::Raw(text),
    };

    Ok(Instruction {
        multiplier,
        command,
    })
}

async fn lookup_product(code: String, catalog: &dyn Catalog) -> Result<Command, ShipError> {
    match catalog.resolve_product_by_ean(&code).await? {
        Some(id) => {
            debug!(ean = %code, product_id = %id, "barcode resolved");
            Ok(Command::ScanProduct(id))
        }
        None => {
            debug!(ean = %code, "barcode matches no product, forwarding as raw text");
            Ok(Command::Raw(code))
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
