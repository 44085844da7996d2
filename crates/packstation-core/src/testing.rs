//! In-memory collaborators and fixtures for unit tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::audit::{cross_reference_lines, cross_reference_target, AuditKey};
use crate::error::BackendError;
use crate::money::Money;
use crate::ports::{AuditStore, Catalog, Cue, Feedback};
use crate::types::{Order, OrderId, OrderLine, ProductId, SerialEntry};

// =============================================================================
// Fixtures
// =============================================================================

pub fn line(product: u32, quantity: i64) -> OrderLine {
    OrderLine {
        product_id: ProductId(product),
        reference: format!("REF-{product}"),
        name: format!("Product {product}"),
        quantity,
        unit_price: Money::from_cents(1000),
    }
}

/// Order placed on 2024-10-05, so its audit key is `202410/{id}`.
pub fn order(id: u32, lines: &[(u32, i64)]) -> Order {
    Order {
        id: OrderId(id),
        reference: format!("ORD{id}"),
        customer: "Jane Doe".to_string(),
        ordered_at: NaiveDate::from_ymd_opt(2024, 10, 5)
            .and_then(|d| d.and_hms_opt(14, 3, 0))
            .unwrap(),
        lines: lines.iter().map(|(p, q)| line(*p, *q)).collect(),
    }
}

// =============================================================================
// Catalog
// =============================================================================

#[derive(Default)]
pub struct FakeCatalog {
    orders: HashMap<OrderId, Order>,
    eans: HashMap<String, ProductId>,
    serial: HashSet<ProductId>,
    failing: bool,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_order(mut self, order: Order) -> Self {
        self.orders.insert(order.id, order);
        self
    }

    pub fn with_product(mut self, id: u32, ean: &str, serial: bool) -> Self {
        self.eans.insert(ean.to_string(), ProductId(id));
        if serial {
            self.serial.insert(ProductId(id));
        }
        self
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    fn check(&self) -> Result<(), BackendError> {
        if self.failing {
            Err(BackendError::catalog("database is locked"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Catalog for FakeCatalog {
    async fn fetch_order(&self, id: OrderId) -> Result<Option<Order>, BackendError> {
        self.check()?;
        Ok(self.orders.get(&id).cloned())
    }

    async fn resolve_product_by_ean(&self, ean: &str) -> Result<Option<ProductId>, BackendError> {
        self.check()?;
        Ok(self.eans.get(ean).copied())
    }

    async fn product_requires_serial(&self, id: ProductId) -> Result<bool, BackendError> {
        self.check()?;
        Ok(self.serial.contains(&id))
    }
}

// =============================================================================
// Audit Store
// =============================================================================

#[derive(Default)]
struct AuditState {
    records: BTreeMap<String, Vec<String>>,
    serials: BTreeMap<String, Vec<SerialEntry>>,
    fail_record: bool,
    fail_cross_reference: bool,
    fail_serials: bool,
}

/// Shared handle; clones see the same records.
#[derive(Clone, Default)]
pub struct FakeAudit {
    state: Arc<Mutex<AuditState>>,
}

impl FakeAudit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretends `order` was shipped earlier.
    pub fn with_record(self, order: &Order) -> Self {
        let key = AuditKey::for_order(order).to_string();
        self.state.lock().unwrap().records.insert(key, vec!["shipped".into()]);
        self
    }

    /// Every write fails.
    pub fn set_failing(&self, failing: bool) {
        let mut state = self.state.lock().unwrap();
        state.fail_record = failing;
        state.fail_cross_reference = failing;
        state.fail_serials = failing;
    }

    /// Only the primary record write fails.
    pub fn set_record_failing(&self, failing: bool) {
        self.state.lock().unwrap().fail_record = failing;
    }

    /// Only cross-reference writes fail.
    pub fn set_cross_reference_failing(&self, failing: bool) {
        self.state.lock().unwrap().fail_cross_reference = failing;
    }

    pub fn record(&self, key: &str) -> Option<Vec<String>> {
        self.state.lock().unwrap().records.get(key).cloned()
    }

    pub fn serials(&self, key: &str) -> Option<Vec<SerialEntry>> {
        self.state.lock().unwrap().serials.get(key).cloned()
    }

    pub fn record_count(&self) -> usize {
        self.state.lock().unwrap().records.len()
    }
}

#[async_trait]
impl AuditStore for FakeAudit {
    async fn exists(&self, order: &Order) -> Result<bool, BackendError> {
        let key = AuditKey::for_order(order).to_string();
        Ok(self.state.lock().unwrap().records.contains_key(&key))
    }

    async fn shipped_under(&self, order: &Order) -> Result<Option<AuditKey>, BackendError> {
        let key = AuditKey::for_order(order);
        let state = self.state.lock().unwrap();
        Ok(state
            .records
            .get(&key.to_string())
            .map(|lines| cross_reference_target(lines).unwrap_or(key)))
    }

    async fn save(&self, order: &Order, lines: &[String]) -> Result<AuditKey, BackendError> {
        let key = AuditKey::for_order(order);
        let mut state = self.state.lock().unwrap();
        if state.fail_record {
            return Err(BackendError::audit("disk full"));
        }
        if state.records.contains_key(&key.to_string()) {
            return Err(BackendError::audit(format!("{key} already exists")));
        }
        state.records.insert(key.to_string(), lines.to_vec());
        Ok(key)
    }

    async fn save_cross_reference(
        &self,
        appended: &Order,
        primary: &AuditKey,
    ) -> Result<AuditKey, BackendError> {
        let key = AuditKey::for_order(appended);
        let mut state = self.state.lock().unwrap();
        if state.fail_cross_reference {
            return Err(BackendError::audit("disk full"));
        }
        state
            .records
            .insert(key.to_string(), cross_reference_lines(appended, primary));
        Ok(key)
    }

    async fn save_serials(&self, order: &Order, serials: &[SerialEntry]) -> Result<(), BackendError> {
        let key = AuditKey::for_order(order);
        let mut state = self.state.lock().unwrap();
        if state.fail_serials {
            return Err(BackendError::audit("disk full"));
        }
        state.serials.insert(key.to_string(), serials.to_vec());
        Ok(())
    }
}

// =============================================================================
// Feedback
// =============================================================================

#[derive(Default)]
struct Captured {
    lines: Vec<String>,
    cues: Vec<Cue>,
}

#[derive(Clone, Default)]
pub struct RecordingFeedback {
    captured: Arc<Mutex<Captured>>,
}

impl RecordingFeedback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.captured.lock().unwrap().lines.clone()
    }

    pub fn cues(&self) -> Vec<Cue> {
        self.captured.lock().unwrap().cues.clone()
    }

    pub fn printed(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }
}

impl Feedback for RecordingFeedback {
    fn line(&mut self, text: &str) {
        self.captured.lock().unwrap().lines.push(text.to_string());
    }

    fn cue(&mut self, cue: Cue) {
        self.captured.lock().unwrap().cues.push(cue);
    }
}
