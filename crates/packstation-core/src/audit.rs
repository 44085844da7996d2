//! # Audit Records
//!
//! Each shipped order leaves one record, addressed by the month the order
//! was placed and its id:
//!
//! ```text
//! audit-root/
//! └── 202410/
//!     ├── 8042              ← transcript of the shipment (primary order)
//!     ├── 8042.sn_export    ← captured serial numbers, JSON
//!     └── 8043              ← cross-reference: "shipped with 202410/8042"
//! ```
//!
//! The key format is fixed here so every store lays records out the same
//! way; how bytes reach the disk is the store's business.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{Order, OrderId};

/// `{yyyymm}/{order_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuditKey {
    period: String,
    order_id: OrderId,
}

impl AuditKey {
    /// Key of an order's record, from its order date.
    ///
    /// ```rust
    /// use chrono::NaiveDate;
    /// use packstation_core::audit::AuditKey;
    /// use packstation_core::types::{Order, OrderId};
    ///
    /// let order = Order {
    ///     id: OrderId(8042),
    ///     reference: "XKBKNABJK".into(),
    ///     customer: "J. Doe".into(),
    ///     ordered_at: NaiveDate::from_ymd_opt(2024, 10, 5)
    ///         .unwrap()
    ///         .and_hms_opt(14, 3, 0)
    ///         .unwrap(),
    ///     lines: vec![],
    /// };
    /// assert_eq!(AuditKey::for_order(&order).to_string(), "202410/8042");
    /// ```
    pub fn for_order(order: &Order) -> Self {
        Self {
            period: order.ordered_at.format("%Y%m").to_string(),
            order_id: order.id,
        }
    }

    /// Reads back the `{yyyymm}/{order_id}` form produced by `Display`.
    pub fn parse(text: &str) -> Option<Self> {
        let (period, id) = text.trim().split_once('/')?;
        if period.len() != 6 || !period.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(Self {
            period: period.to_string(),
            order_id: OrderId(id.parse().ok()?),
        })
    }

    /// `yyyymm` directory name.
    pub fn period(&self) -> &str {
        &self.period
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    /// File name of the record inside its period directory.
    pub fn record_name(&self) -> String {
        self.order_id.to_string()
    }

    /// File name of the serial export inside its period directory.
    pub fn serial_export_name(&self) -> String {
        format!("{}.sn_export", self.order_id)
    }
}

impl fmt::Display for AuditKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.period, self.order_id)
    }
}

const SEE_RECORD: &str = "See audit record ";

/// Content of the record left at an appended order's own key.
pub fn cross_reference_lines(appended: &Order, primary: &AuditKey) -> Vec<String> {
    vec![
        format!(
            "Order {} ({}) was shipped together with order {}.",
            appended.id,
            appended.reference,
            primary.order_id()
        ),
        format!("{SEE_RECORD}{primary}"),
    ]
}

/// The primary record a cross-reference points at. `None` for a shipment's
/// own transcript.
pub fn cross_reference_target(lines: &[String]) -> Option<AuditKey> {
    lines
        .iter()
        .find_map(|line| line.strip_prefix(SEE_RECORD))
        .and_then(AuditKey::parse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::order;

    #[test]
    fn test_key_uses_order_month() {
        let o = order(8042, &[]);
        let key = AuditKey::for_order(&o);
        assert_eq!(key.period(), "202410");
        assert_eq!(key.record_name(), "8042");
        assert_eq!(key.serial_export_name(), "8042.sn_export");
    }

    #[test]
    fn test_cross_reference_points_at_primary() {
        let primary = AuditKey::for_order(&order(8042, &[]));
        let lines = cross_reference_lines(&order(8043, &[]), &primary);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Order 8043 "));
        assert_eq!(lines[1], "See audit record 202410/8042");
        assert_eq!(cross_reference_target(&lines), Some(primary));
    }

    #[test]
    fn test_transcript_has_no_target() {
        let lines = vec!["Order 8042".to_string(), "CHECK PASSED".to_string()];
        assert_eq!(cross_reference_target(&lines), None);
    }

    #[test]
    fn test_parse_key() {
        let key = AuditKey::parse("202410/8042").unwrap();
        assert_eq!(key.period(), "202410");
        assert_eq!(key.order_id(), OrderId(8042));

        assert_eq!(AuditKey::parse("2024/8042"), None);
        assert_eq!(AuditKey::parse("202410/abc"), None);
        assert_eq!(AuditKey::parse("202410"), None);
    }
}
