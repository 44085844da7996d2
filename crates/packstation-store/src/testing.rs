//! Fixtures shared by the store's unit tests.

use chrono::NaiveDate;

use packstation_core::{Money, Order, OrderId, OrderLine, ProductId};

use crate::repository::product::ProductRecord;

pub fn product(id: u32, ean: Option<&str>, params: &str) -> ProductRecord {
    ProductRecord {
        id: ProductId(id),
        reference: format!("REF-{id}"),
        name: format!("Product {id}"),
        ean13: ean.map(str::to_string),
        price: Money::from_cents(1250),
        params: params.to_string(),
        is_active: true,
    }
}

/// Placed on 2024-10-05 14:03, audit key `202410/{id}`.
pub fn order(id: u32, lines: &[(u32, i64)]) -> Order {
    Order {
        id: OrderId(id),
        reference: format!("ORD{id}"),
        customer: "Jane Doe".to_string(),
        ordered_at: NaiveDate::from_ymd_opt(2024, 10, 5)
            .and_then(|d| d.and_hms_opt(14, 3, 0))
            .unwrap(),
        lines: lines
            .iter()
            .map(|(p, q)| OrderLine {
                product_id: ProductId(*p),
                reference: format!("REF-{p}"),
                name: format!("Product {p}"),
                quantity: *q,
                unit_price: Money::from_cents(1250),
            })
            .collect(),
    }
}
