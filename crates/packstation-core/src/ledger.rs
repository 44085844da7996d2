//! Scanned quantities per product of the loaded shipment.

use std::collections::BTreeMap;

use crate::types::{Order, ProductId};

/// Running count of scanned units, one entry per order line.
///
/// Entries exist for every product of the primary order (and of appended
/// orders) from the moment the order is loaded, starting at zero. The
/// session guarantees `0 <= scanned <= ordered` for each entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanLedger {
    entries: BTreeMap<ProductId, i64>,
}

impl ScanLedger {
    pub fn for_order(order: &Order) -> Self {
        let mut ledger = Self::default();
        ledger.track(order.lines.iter().map(|l| l.product_id));
        ledger
    }

    /// Adds zero entries for products not tracked yet.
    pub fn track(&mut self, products: impl IntoIterator<Item = ProductId>) {
        for product in products {
            self.entries.entry(product).or_insert(0);
        }
    }

    pub fn scanned(&self, product: ProductId) -> i64 {
        self.entries.get(&product).copied().unwrap_or(0)
    }

    /// Applies a signed delta and returns the new count.
    pub fn add(&mut self, product: ProductId, delta: i64) -> i64 {
        let count = self.entries.entry(product).or_insert(0);
        *count += delta;
        *count
    }

    pub fn total(&self) -> i64 {
        self.entries.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ProductId, i64)> + '_ {
        self.entries.iter().map(|(id, qty)| (*id, *qty))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::order;

    #[test]
    fn test_ledger_starts_at_zero_for_each_line() {
        let ledger = ScanLedger::for_order(&order(1, &[(42, 3), (7, 1)]));
        assert_eq!(ledger.iter().collect::<Vec<_>>(), vec![(ProductId(7), 0), (ProductId(42), 0)]);
        assert_eq!(ledger.total(), 0);
    }

    #[test]
    fn test_add_and_track() {
        let mut ledger = ScanLedger::for_order(&order(1, &[(42, 3)]));
        assert_eq!(ledger.add(ProductId(42), 2), 2);
        assert_eq!(ledger.add(ProductId(42), -1), 1);

        ledger.track([ProductId(42), ProductId(99)]);
        assert_eq!(ledger.scanned(ProductId(42)), 1);
        assert_eq!(ledger.scanned(ProductId(99)), 0);
    }
}
