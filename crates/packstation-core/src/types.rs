//! # Domain Types
//!
//! Orders as the catalog hands them to the station, carriers, product
//! parameters and captured serial numbers.
//!
//! ## Entity Relationships
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Order (primary) ◄──── merged ──── Order (appended, same parcel)      │
//! │      │ 1                                                                │
//! │      │ *                                                                │
//! │   OrderLine ──── product_id ────► ScanLedger entry (scanned qty)       │
//! │      │                                                                  │
//! │      └── ProductParams "sn:1" ──► SerialEntry per scanned unit         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ParamsError;
use crate::money::Money;
use crate::SERIAL_PARAM;

// =============================================================================
// Identifiers
// =============================================================================

/// Shop order number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub u32);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OrderId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(OrderId)
    }
}

/// Shop product number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub u32);

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Order
// =============================================================================

/// One product line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub reference: String,
    pub name: String,
    /// Ordered quantity, always positive.
    pub quantity: i64,
    pub unit_price: Money,
}

impl OrderLine {
    pub fn total(&self) -> Money {
        self.unit_price * self.quantity
    }
}

/// A customer order with its lines.
///
/// When orders are appended to a shipment the primary order absorbs their
/// lines through [`Order::merge`]; a product never appears on two lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub reference: String,
    pub customer: String,
    pub ordered_at: NaiveDateTime,
    pub lines: Vec<OrderLine>,
}

impl Order {
    pub fn line(&self, product_id: ProductId) -> Option<&OrderLine> {
        self.lines.iter().find(|l| l.product_id == product_id)
    }

    pub fn contains(&self, product_id: ProductId) -> bool {
        self.line(product_id).is_some()
    }

    pub fn total(&self) -> Money {
        self.lines.iter().map(OrderLine::total).sum()
    }

    pub fn ordered_on(&self) -> NaiveDate {
        self.ordered_at.date()
    }

    /// Folds `other`'s lines into this order.
    ///
    /// Quantities of products already present are summed; new products are
    /// appended as lines. Returns the products that were not present before,
    /// in line order.
    pub fn merge(&mut self, other: &Order) -> Vec<ProductId> {
        let mut introduced = Vec::new();
        for line in &other.lines {
            match self.lines.iter_mut().find(|l| l.product_id == line.product_id) {
                Some(existing) => existing.quantity += line.quantity,
                None => {
                    self.lines.push(line.clone());
                    introduced.push(line.product_id);
                }
            }
        }
        introduced
    }
}

// =============================================================================
// Carrier
// =============================================================================

/// Shipping services the station hands parcels to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Carrier {
    Poste,
    Gls,
    Dhl,
    Ups,
    Mondial,
    Pickup,
}

impl Carrier {
    pub const ALL: [Carrier; 6] = [
        Carrier::Poste,
        Carrier::Gls,
        Carrier::Dhl,
        Carrier::Ups,
        Carrier::Mondial,
        Carrier::Pickup,
    ];

    /// Code stored with the shipment and written in the audit record.
    pub const fn code(&self) -> &'static str {
        match self {
            Carrier::Poste => "POSTE",
            Carrier::Gls => "GLS",
            Carrier::Dhl => "DHL",
            Carrier::Ups => "UPS",
            Carrier::Mondial => "MONDIAL",
            Carrier::Pickup => "PICKUP",
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            Carrier::Poste => "La Poste / Colissimo",
            Carrier::Gls => "GLS",
            Carrier::Dhl => "DHL Express",
            Carrier::Ups => "UPS",
            Carrier::Mondial => "Mondial Relay",
            Carrier::Pickup => "Store pickup",
        }
    }

    pub fn from_code(code: &str) -> Option<Carrier> {
        Carrier::ALL
            .into_iter()
            .find(|c| c.code().eq_ignore_ascii_case(code.trim()))
    }
}

impl fmt::Display for Carrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// =============================================================================
// Product Parameters
// =============================================================================

/// `key:value,key:value` metadata attached to a catalog product.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductParams(BTreeMap<String, String>);

impl ProductParams {
    /// Parses a parameter string. Blank input yields no parameters.
    ///
    /// ```rust
    /// use packstation_core::types::ProductParams;
    ///
    /// let params = ProductParams::parse("sn:1, label:small").unwrap();
    /// assert!(params.requires_serial());
    /// assert_eq!(params.get("label"), Some("small"));
    /// assert!(ProductParams::parse("sn").is_err());
    /// ```
    pub fn parse(raw: &str) -> Result<Self, ParamsError> {
        let mut map = BTreeMap::new();
        for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once(':')
                .ok_or_else(|| ParamsError(pair.to_string()))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(ParamsError(pair.to_string()));
            }
            map.insert(key.to_ascii_lowercase(), value.trim().to_string());
        }
        Ok(Self(map))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// `sn:1` (or `sn:yes` / `sn:true`) marks serial capture.
    pub fn requires_serial(&self) -> bool {
        matches!(
            self.get(SERIAL_PARAM).map(str::to_ascii_lowercase).as_deref(),
            Some("1" | "yes" | "true")
        )
    }
}

// =============================================================================
// Serial Entry
// =============================================================================

/// One captured serial number, exported next to the audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialEntry {
    pub order_id: OrderId,
    pub order_date: NaiveDate,
    pub product_id: ProductId,
    pub product_reference: String,
    pub serial: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
}

impl SerialEntry {
    /// Splits `SN123;scratched box` into serial and remark.
    pub fn split_remark(raw: &str) -> (String, Option<String>) {
        match raw.split_once(';') {
            Some((serial, remark)) if !remark.trim().is_empty() => {
                (serial.trim().to_string(), Some(remark.trim().to_string()))
            }
            Some((serial, _)) => (serial.trim().to_string(), None),
            None => (raw.trim().to_string(), None),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{line, order};

    #[test]
    fn test_merge_sums_shared_products() {
        let mut primary = order(8042, &[(42, 3), (7, 1)]);
        let appended = order(8043, &[(42, 2), (99, 1)]);

        let introduced = primary.merge(&appended);

        assert_eq!(introduced, vec![ProductId(99)]);
        assert_eq!(primary.line(ProductId(42)).map(|l| l.quantity), Some(5));
        assert_eq!(primary.lines.len(), 3);
    }

    #[test]
    fn test_order_total() {
        let mut o = order(1, &[]);
        o.lines.push(OrderLine {
            unit_price: Money::from_cents(1250),
            ..line(42, 2)
        });
        o.lines.push(OrderLine {
            unit_price: Money::from_cents(399),
            ..line(7, 1)
        });
        assert_eq!(o.total().cents(), 2899);
    }

    #[test]
    fn test_carrier_codes() {
        assert_eq!(Carrier::from_code("poste"), Some(Carrier::Poste));
        assert_eq!(Carrier::from_code("FEDEX"), None);
        assert_eq!(Carrier::Mondial.to_string(), "MONDIAL");
    }

    #[test]
    fn test_params() {
        assert!(!ProductParams::parse("").unwrap().requires_serial());
        assert!(!ProductParams::parse("sn:0").unwrap().requires_serial());
        assert!(ProductParams::parse("SN:1").unwrap().requires_serial());
        assert_eq!(
            ProductParams::parse("label:small,:x"),
            Err(ParamsError(":x".into()))
        );
    }

    #[test]
    fn test_split_remark() {
        assert_eq!(
            SerialEntry::split_remark("SN123;scratched box"),
            ("SN123".to_string(), Some("scratched box".to_string()))
        );
        assert_eq!(SerialEntry::split_remark(" SN9 "), ("SN9".to_string(), None));
        assert_eq!(SerialEntry::split_remark("SN9;"), ("SN9".to_string(), None));
    }
}
