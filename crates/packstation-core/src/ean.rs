//! # EAN-13 Helpers
//!
//! Check digits and the two barcode formats the shop prints itself.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  House barcode layout (13 digits)                                       │
//! │                                                                         │
//! │  Order label:    324 │ 000008042 │ c      prefix + 9-digit order id     │
//! │  Product label:  32321 │ 0000576 │ c      prefix + 7-digit product id   │
//! │                                                                         │
//! │  c = EAN-13 check digit over the first 12 positions                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::types::{OrderId, ProductId};
use crate::{ORDER_BARCODE_PREFIX, PRODUCT_BARCODE_PREFIX};

/// Check digit for a 12-digit EAN base.
///
/// Returns `None` when `base` is not exactly 12 ASCII digits.
///
/// ```rust
/// use packstation_core::ean::ean13_checksum;
///
/// assert_eq!(ean13_checksum("323210000576"), Some(1));
/// assert_eq!(ean13_checksum("12345"), None);
/// ```
pub fn ean13_checksum(base: &str) -> Option<u8> {
    if base.len() != 12 || !base.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let (even, odd) = base
        .bytes()
        .map(|b| u32::from(b - b'0'))
        .enumerate()
        .fold((0, 0), |(even, odd), (i, d)| {
            if i % 2 == 0 {
                (even + d, odd)
            } else {
                (even, odd + d)
            }
        });

    Some(((10 - (even + 3 * odd) % 10) % 10) as u8)
}

/// Appends the check digit to a 12-digit base.
pub fn calculate_ean13(base: &str) -> Option<String> {
    ean13_checksum(base).map(|check| format!("{base}{check}"))
}

/// True for a 13-digit code whose last digit matches its checksum.
pub fn is_valid_ean13(code: &str) -> bool {
    code.len() == 13
        && code.is_char_boundary(12)
        && ean13_checksum(&code[..12]).is_some_and(|check| code.ends_with(char::from(b'0' + check)))
}

/// Numeric text that could be a retail barcode (EAN-8 up to EAN-13).
pub fn looks_like_ean(text: &str) -> bool {
    (8..=13).contains(&text.len()) && text.bytes().all(|b| b.is_ascii_digit())
}

/// Barcode printed on an order's packing slip.
///
/// ```rust
/// use packstation_core::ean::order_barcode;
/// use packstation_core::types::OrderId;
///
/// assert_eq!(order_barcode(OrderId(8042)), "3240000080429");
/// ```
pub fn order_barcode(id: OrderId) -> String {
    let base = format!("{ORDER_BARCODE_PREFIX}{:09}", id.0);
    calculate_ean13(&base).unwrap_or(base)
}

/// Barcode the shop prints for products that have no manufacturer EAN.
pub fn product_barcode(id: ProductId) -> String {
    let base = format!("{PRODUCT_BARCODE_PREFIX}{:07}", id.0);
    calculate_ean13(&base).unwrap_or(base)
}

/// Order id encoded in a valid `324` code.
pub fn decode_order(code: &str) -> Option<OrderId> {
    if !code.starts_with(ORDER_BARCODE_PREFIX) || !is_valid_ean13(code) {
        return None;
    }
    code[3..12].parse().ok().map(OrderId)
}

/// Product id encoded in a valid `32321` code.
pub fn decode_product(code: &str) -> Option<ProductId> {
    if !code.starts_with(PRODUCT_BARCODE_PREFIX) || !is_valid_ean13(code) {
        return None;
    }
    code[5..12].parse().ok().map(ProductId)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_known_values() {
        assert_eq!(ean13_checksum("323210000576"), Some(1));
        // Manufacturer EAN: 4006381333931
        assert_eq!(ean13_checksum("400638133393"), Some(1));
        assert_eq!(ean13_checksum("32321000057a"), None);
    }

    #[test]
    fn test_house_barcodes() {
        assert_eq!(product_barcode(ProductId(576)), "3232100005761");
        assert_eq!(decode_product("3232100005761"), Some(ProductId(576)));
        assert_eq!(decode_product("3232100005762"), None);

        let code = order_barcode(OrderId(8042));
        assert_eq!(code.len(), 13);
        assert_eq!(decode_order(&code), Some(OrderId(8042)));
    }

    #[test]
    fn test_order_with_bad_check_digit_is_rejected() {
        assert_eq!(decode_order("3240000080420"), None);
        assert_eq!(decode_order("324000008042"), None);
    }

    #[test]
    fn test_looks_like_ean() {
        assert!(looks_like_ean("40063813"));
        assert!(looks_like_ean("4006381333931"));
        assert!(!looks_like_ean("1234567"));
        assert!(!looks_like_ean("TRACK123"));
    }
}
