//! # Demo Catalog Seeder
//!
//! Fills a catalog database with a handful of products and orders so the
//! console can be tried without a shop mirror.
//!
//! ## Usage
//! ```bash
//! cargo run -p packstation-store --bin seed
//! cargo run -p packstation-store --bin seed -- --db ./data/catalog.db
//! ```
//!
//! Prints the barcode of every seeded order and product; type them at the
//! console prompt instead of scanning.

use chrono::{Duration, Local};
use clap::Parser;

use packstation_core::ean::{order_barcode, product_barcode};
use packstation_core::{Money, Order, OrderId, OrderLine, ProductId};
use packstation_store::{Database, DbConfig, ProductRecord};

#[derive(Debug, Parser)]
#[command(name = "seed", about = "Populate a pack station catalog with demo data")]
struct Args {
    /// Database file path
    #[arg(short, long, default_value = "./packstation_dev.db")]
    db: String,
}

/// (id, reference, name, manufacturer EAN, price in cents, params)
const PRODUCTS: &[(u32, &str, &str, Option<&str>, i64, &str)] = &[
    (576, "MUG-BLUE", "Blue enamel mug", None, 1490, ""),
    (42, "TEE-L", "Organic T-shirt L", None, 2500, "size:L"),
    (77, "PEN-BLK", "Fountain pen black", Some("4006381333931"), 899, ""),
    (1201, "CAM-HD", "Action camera HD", None, 18900, "sn:1"),
    (1202, "DRONE-M", "Mini drone", None, 32900, "sn:1,label:fragile"),
];

/// (order id, reference, customer, days ago, lines)
const ORDERS: &[(u32, &str, &str, i64, &[(u32, i64)])] = &[
    (8042, "XKBKNABJK", "Jane Doe", 2, &[(576, 3), (77, 1)]),
    (8043, "QWPOERTZU", "Jane Doe", 1, &[(42, 1), (576, 1)]),
    (8044, "LMNBVCXYA", "Ali Ben Salah", 1, &[(1201, 2), (42, 2)]),
    (8045, "ZTRHGFDSA", "Chris Martin", 0, &[(1202, 1)]),
];

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    println!("Pack Station Seed Data");
    println!("======================");
    println!("Database: {}", args.db);
    println!();

    let db = Database::new(DbConfig::new(&args.db)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {existing} products");
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Products:");
    for &(id, reference, name, ean, price, params) in PRODUCTS {
        let product = ProductRecord {
            id: ProductId(id),
            reference: reference.to_string(),
            name: name.to_string(),
            ean13: ean.map(str::to_string),
            price: Money::from_cents(price),
            params: params.to_string(),
            is_active: true,
        };
        db.products().insert(&product).await?;

        let code = ean.map_or_else(|| product_barcode(product.id), str::to_string);
        let serial = if params.contains("sn:1") { "  [serial]" } else { "" };
        println!("  {code}  {reference:<8} {name}{serial}");
    }

    println!();
    println!("Orders:");
    let now = Local::now().naive_local();
    for &(id, reference, customer, days_ago, lines) in ORDERS {
        let order = Order {
            id: OrderId(id),
            reference: reference.to_string(),
            customer: customer.to_string(),
            ordered_at: now - Duration::days(days_ago),
            lines: lines.iter().map(|&(product, quantity)| line(product, quantity)).collect(),
        };
        db.orders().insert(&order).await?;
        println!("  {}  {reference}  {customer}", order_barcode(order.id));
    }

    db.close().await;

    println!();
    println!("✓ Seeded {} products and {} orders", PRODUCTS.len(), ORDERS.len());
    Ok(())
}

fn line(product: u32, quantity: i64) -> OrderLine {
    let (id, reference, name, price) = PRODUCTS
        .iter()
        .find(|p| p.0 == product)
        .map(|p| (p.0, p.1, p.2, p.4))
        .unwrap_or((product, "UNKNOWN", "Unknown product", 0));

    OrderLine {
        product_id: ProductId(id),
        reference: reference.to_string(),
        name: name.to_string(),
        quantity,
        unit_price: Money::from_cents(price),
    }
}
