//! # Scan Classifier
//!
//! Splits one raw scanner line into a quantity multiplier and a remainder,
//! then decides what kind of barcode the remainder is.
//!
//! ## Grammar
//! ```text
//! line      := [ multiplier ] remainder
//! multiplier:= ("+" | "-") digits "*"          e.g. "+3*", "-1*"
//! remainder := anything else, trimmed
//!
//! "+2*3232100000421"  ──► multiplier  2, Product("3232100000421")
//! "-1*3232100000421"  ──► multiplier -1, Product(...)
//! "CMD-CHECK"         ──► multiplier  1, Verb(Check)
//! "TRACK123"          ──► multiplier  1, Text("TRACK123")
//! ```
//!
//! Classification is pure; nothing here knows about the catalog. Whether a
//! numeric remainder really is a product is settled by the resolver.

use crate::ean;
use crate::error::ScanError;
use crate::types::{Carrier, OrderId};
use crate::{MANUFACTURER_EAN_PREFIX, MAX_MULTIPLIER, ORDER_BARCODE_PREFIX, PRODUCT_BARCODE_PREFIX};

// =============================================================================
// Verbs
// =============================================================================

/// Control barcodes printed on the station's code sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Reset,
    Check,
    Finalize,
    Append,
    Cancel,
    SwitchForce,
    /// Print the scan ledger.
    View,
}

impl Verb {
    pub const fn name(&self) -> &'static str {
        match self {
            Verb::Reset => "RESET",
            Verb::Check => "CHECK",
            Verb::Finalize => "FINALIZE",
            Verb::Append => "APPEND",
            Verb::Cancel => "CANCEL",
            Verb::SwitchForce => "SWITCH_FORCE",
            Verb::View => "VIEW",
        }
    }
}

impl std::fmt::Display for Verb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Barcode literal → verb. Matched as a prefix of the upper-cased remainder.
pub const VERB_CODES: &[(&str, Verb)] = &[
    ("CMD-RESET", Verb::Reset),
    ("CMD-CHECK", Verb::Check),
    ("CMD-FINALIZE", Verb::Finalize),
    ("CMD-APPEND", Verb::Append),
    ("CMD-CANCEL", Verb::Cancel),
    ("CMD-FORCE", Verb::SwitchForce),
    ("CMD-VIEW", Verb::View),
];

/// Barcode literal → carrier.
pub const CARRIER_CODES: &[(&str, Carrier)] = &[
    ("SHIP-POSTE", Carrier::Poste),
    ("SHIP-GLS", Carrier::Gls),
    ("SHIP-DHL", Carrier::Dhl),
    ("SHIP-UPS", Carrier::Ups),
    ("SHIP-MONDIAL", Carrier::Mondial),
    ("SHIP-PICKUP", Carrier::Pickup),
];

// =============================================================================
// Classified Scan
// =============================================================================

/// What the remainder of a scan line looks like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanToken {
    Verb(Verb),
    Carrier(Carrier),
    /// Numeric code with a product prefix, not yet looked up.
    Product(String),
    /// Valid house order barcode.
    Order(OrderId),
    /// Anything else: tracking numbers, serials, free text.
    Text(String),
}

/// Coarse classification, used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Verb,
    Carrier,
    Product,
    Order,
    Undefined,
}

impl ScanToken {
    pub fn kind(&self) -> TokenKind {
        match self {
            ScanToken::Verb(_) => TokenKind::Verb,
            ScanToken::Carrier(_) => TokenKind::Carrier,
            ScanToken::Product(_) => TokenKind::Product,
            ScanToken::Order(_) => TokenKind::Order,
            ScanToken::Text(_) => TokenKind::Undefined,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedScan {
    /// Signed quantity, never zero. 1 when the line had no prefix.
    pub multiplier: i64,
    pub token: ScanToken,
}

// =============================================================================
// Classification
// =============================================================================

/// Classifies one scanner line.
///
/// ## Errors
/// - [`ScanError::Empty`] for blank lines
/// - [`ScanError::ZeroMultiplier`] for `+0*...`
/// - [`ScanError::MultiplierTooLarge`] above [`MAX_MULTIPLIER`]
/// - [`ScanError::MissingRemainder`] for `+3*` alone
pub fn classify(line: &str) -> Result<ClassifiedScan, ScanError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ScanError::Empty);
    }

    let (multiplier, remainder) = split_multiplier(line)?;
    if remainder.is_empty() {
        return Err(ScanError::MissingRemainder);
    }

    Ok(ClassifiedScan {
        multiplier,
        token: classify_remainder(remainder),
    })
}

/// Strips a leading `(+|-)digits*`. A sign without digits and star is not a
/// multiplier and stays part of the remainder.
fn split_multiplier(line: &str) -> Result<(i64, &str), ScanError> {
    let sign = match line.as_bytes().first() {
        Some(b'+') => 1,
        Some(b'-') => -1,
        _ => return Ok((1, line)),
    };

    let rest = &line[1..];
    let digit_count = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digit_count == 0 || rest.as_bytes().get(digit_count) != Some(&b'*') {
        return Ok((1, line));
    }

    let digits = &rest[..digit_count];
    let magnitude: i64 = digits
        .parse()
        .map_err(|_| ScanError::MultiplierTooLarge(digits.to_string()))?;
    if magnitude == 0 {
        return Err(ScanError::ZeroMultiplier);
    }
    if magnitude > MAX_MULTIPLIER {
        return Err(ScanError::MultiplierTooLarge(digits.to_string()));
    }

    Ok((sign * magnitude, rest[digit_count + 1..].trim()))
}

fn classify_remainder(remainder: &str) -> ScanToken {
    let upper = remainder.to_ascii_uppercase();

    if let Some((_, verb)) = VERB_CODES.iter().find(|(code, _)| upper.starts_with(code)) {
        return ScanToken::Verb(*verb);
    }
    if let Some((_, carrier)) = CARRIER_CODES.iter().find(|(code, _)| upper.starts_with(code)) {
        return ScanToken::Carrier(*carrier);
    }

    if remainder.bytes().all(|b| b.is_ascii_digit()) {
        if remainder.starts_with(ORDER_BARCODE_PREFIX) {
            if let Some(id) = ean::decode_order(remainder) {
                return ScanToken::Order(id);
            }
        } else if remainder.starts_with(PRODUCT_BARCODE_PREFIX)
            || remainder.starts_with(MANUFACTURER_EAN_PREFIX)
        {
            return ScanToken::Product(remainder.to_string());
        }
    }

    ScanToken::Text(remainder.to_string())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_line_has_multiplier_one() {
        let scan = classify("  TRACK123 ").unwrap();
        assert_eq!(scan.multiplier, 1);
        assert_eq!(scan.token, ScanToken::Text("TRACK123".into()));
        assert_eq!(scan.token.kind(), TokenKind::Undefined);
    }

    #[test]
    fn test_multiplier_prefix() {
        let scan = classify("+3*3232100000421").unwrap();
        assert_eq!(scan.multiplier, 3);
        assert_eq!(scan.token, ScanToken::Product("3232100000421".into()));

        let scan = classify("-1*3312345678901").unwrap();
        assert_eq!(scan.multiplier, -1);
        assert_eq!(scan.token.kind(), TokenKind::Product);
    }

    #[test]
    fn test_sign_without_star_is_text() {
        let scan = classify("-12").unwrap();
        assert_eq!(scan.multiplier, 1);
        assert_eq!(scan.token, ScanToken::Text("-12".into()));

        let scan = classify("+*abc").unwrap();
        assert_eq!(scan.token, ScanToken::Text("+*abc".into()));
    }

    #[test]
    fn test_multiplier_errors() {
        assert_eq!(classify("   "), Err(ScanError::Empty));
        assert_eq!(classify("+0*3232100000421"), Err(ScanError::ZeroMultiplier));
        assert_eq!(
            classify("+1000*3232100000421"),
            Err(ScanError::MultiplierTooLarge("1000".into()))
        );
        assert_eq!(classify("+2*  "), Err(ScanError::MissingRemainder));
    }

    #[test]
    fn test_verbs_and_carriers_match_by_prefix() {
        assert_eq!(classify("cmd-check").unwrap().token, ScanToken::Verb(Verb::Check));
        assert_eq!(
            classify("CMD-FORCE").unwrap().token,
            ScanToken::Verb(Verb::SwitchForce)
        );
        assert_eq!(
            classify("SHIP-POSTE").unwrap().token,
            ScanToken::Carrier(Carrier::Poste)
        );
        assert_eq!(
            classify("SHIP-MONDIAL-RELAY").unwrap().token,
            ScanToken::Carrier(Carrier::Mondial)
        );
    }

    #[test]
    fn test_order_barcode() {
        let code = ean::order_barcode(OrderId(8042));
        assert_eq!(
            classify(&code).unwrap().token,
            ScanToken::Order(OrderId(8042))
        );
        // Bad check digit: free text, not an order.
        assert_eq!(
            classify("3240000080420").unwrap().token.kind(),
            TokenKind::Undefined
        );
    }

    #[test]
    fn test_unknown_numeric_prefix_is_text() {
        assert_eq!(
            classify("4006381333931").unwrap().token,
            ScanToken::Text("4006381333931".into())
        );
    }
}
