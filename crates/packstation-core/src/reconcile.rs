//! # Reconciliation Engine
//!
//! Compares what was ordered with what was scanned and decides whether the
//! parcel may be closed.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │ Carrier  : POSTE                                          │
//! │ Tracking : TRACK123                                       │
//! │ [ OK ]   3/3   42  MUG-BLUE    Blue mug                   │  OK lines first
//! │ [FAIL]   1/2    7  TEE-L       T-shirt L                  │  then differences
//! │ CHECK FAILED: 1 issue(s)                                  │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! A shipment passes only when a carrier and a tracking number are set and
//! every line matches exactly. Over-scans are already refused at scan time,
//! so a difference here is always a shortfall.

use crate::ledger::ScanLedger;
use crate::types::{Carrier, Order, ProductId};

/// Ordered vs scanned for one order line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineCheck {
    pub product_id: ProductId,
    pub reference: String,
    pub name: String,
    pub ordered: i64,
    pub scanned: i64,
}

impl LineCheck {
    pub fn is_ok(&self) -> bool {
        self.ordered == self.scanned
    }

    fn render(&self) -> String {
        format!(
            "{} {:>3}/{:<3} {:>6}  {:<12} {}",
            if self.is_ok() { "[ OK ]" } else { "[FAIL]" },
            self.scanned,
            self.ordered,
            self.product_id,
            self.reference,
            self.name
        )
    }
}

/// Result of comparing a shipment against its order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub carrier: Option<Carrier>,
    pub tracking: Option<String>,
    /// In order-line order.
    pub lines: Vec<LineCheck>,
}

impl Reconciliation {
    pub fn has_carrier(&self) -> bool {
        self.carrier.is_some()
    }

    pub fn has_tracking(&self) -> bool {
        self.tracking.as_deref().is_some_and(|t| !t.trim().is_empty())
    }

    pub fn passed(&self) -> bool {
        self.failures() == 0
    }

    /// Missing carrier, missing tracking and mismatched lines.
    pub fn failures(&self) -> usize {
        usize::from(!self.has_carrier())
            + usize::from(!self.has_tracking())
            + self.lines.iter().filter(|l| !l.is_ok()).count()
    }

    /// Human-readable report: header, matching lines, differing lines, verdict.
    pub fn report(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.lines.len() + 3);

        out.push(match self.carrier {
            Some(carrier) => format!("Carrier  : {}", carrier.code()),
            None => "Carrier  : [FAIL] no carrier scanned".to_string(),
        });
        out.push(match self.tracking.as_deref() {
            Some(t) if self.has_tracking() => format!("Tracking : {t}"),
            _ => "Tracking : [FAIL] no shipping number".to_string(),
        });

        let (ok, failing): (Vec<&LineCheck>, Vec<&LineCheck>) =
            self.lines.iter().partition(|l| l.is_ok());
        out.extend(ok.into_iter().map(LineCheck::render));
        out.extend(failing.into_iter().map(LineCheck::render));

        out.push(if self.passed() {
            "CHECK PASSED".to_string()
        } else {
            format!("CHECK FAILED: {} issue(s)", self.failures())
        });
        out
    }
}

/// Compares `order` (with appended orders already merged) against `ledger`.
pub fn check(
    order: &Order,
    ledger: &ScanLedger,
    carrier: Option<Carrier>,
    tracking: Option<&str>,
) -> Reconciliation {
    let lines = order
        .lines
        .iter()
        .map(|line| LineCheck {
            product_id: line.product_id,
            reference: line.reference.clone(),
            name: line.name.clone(),
            ordered: line.quantity,
            scanned: ledger.scanned(line.product_id),
        })
        .collect();

    Reconciliation {
        carrier,
        tracking: tracking.map(str::to_owned),
        lines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::order;

    fn scanned(order: &Order, counts: &[(u32, i64)]) -> ScanLedger {
        let mut ledger = ScanLedger::for_order(order);
        for (id, qty) in counts {
            ledger.add(ProductId(*id), *qty);
        }
        ledger
    }

    #[test]
    fn test_complete_shipment_passes() {
        let o = order(8042, &[(42, 3)]);
        let ledger = scanned(&o, &[(42, 3)]);

        let rec = check(&o, &ledger, Some(Carrier::Poste), Some("TRACK123"));
        assert!(rec.passed());
        assert_eq!(rec.report().last().map(String::as_str), Some("CHECK PASSED"));
    }

    #[test]
    fn test_missing_carrier_and_tracking_fail() {
        let o = order(8042, &[(42, 1)]);
        let ledger = scanned(&o, &[(42, 1)]);

        let rec = check(&o, &ledger, None, Some("  "));
        assert!(!rec.passed());
        assert_eq!(rec.failures(), 2);
        assert!(rec.report()[0].contains("[FAIL]"));
        assert!(rec.report()[1].contains("[FAIL]"));
    }

    #[test]
    fn test_report_lists_ok_lines_before_failures() {
        let o = order(8042, &[(7, 2), (42, 3), (99, 1)]);
        let ledger = scanned(&o, &[(7, 1), (42, 3), (99, 1)]);

        let rec = check(&o, &ledger, Some(Carrier::Gls), Some("T1"));
        let report = rec.report();

        // header (2) + 3 lines + verdict
        assert_eq!(report.len(), 6);
        assert!(report[2].starts_with("[ OK ]") && report[2].contains("42"));
        assert!(report[3].starts_with("[ OK ]") && report[3].contains("99"));
        assert!(report[4].starts_with("[FAIL]") && report[4].contains("  1/2"));
        assert_eq!(report[5], "CHECK FAILED: 1 issue(s)");
    }
}
