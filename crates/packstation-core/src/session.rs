//! # Shipment Session
//!
//! The state machine behind the scanner console. One session lives for the
//! whole process; orders are loaded into it, scanned, reconciled and
//! finalized, then the session returns to its initial state.
//!
//! ## States
//! ```text
//!   WAIT_ORDER ──LOAD_ORDER──► CONTROL_ORDER ──FINALIZE (recorded)──► WAIT_ORDER
//!                                 │    ▲
//!            SET_CARRIER ─────────┤    ├───── RAW tracking ──── WAIT_SHIPPING
//!            APPEND_ORDER_REQUEST ┤    ├── LOAD_ORDER / CANCEL ─ APPEND_ORDER
//!            SCAN_PRODUCT (sn:1) ─┘    └───── RAW serial ────── WAIT_SERIAL
//!
//!   RESET from any state ──► WAIT_ORDER, everything discarded
//! ```
//!
//! Every legal (state, command) pair is listed in [`route`]; anything else
//! is rejected without touching the session.
//!
//! ## Feedback
//! Every line shown to the operator goes through the session's
//! [`Transcript`], which becomes the audit record at finalize.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::audit::AuditKey;
use crate::command::{Command, CommandKind, Instruction};
use crate::ean::looks_like_ean;
use crate::error::{BackendError, ShipError, ShipResult};
use crate::ledger::ScanLedger;
use crate::ports::{AuditStore, Catalog, Cue, Feedback};
use crate::reconcile::{self, Reconciliation};
use crate::scan::Verb;
use crate::transcript::Transcript;
use crate::types::{Carrier, Order, OrderId, ProductId, SerialEntry};

const RULE: &str = "==================================================";
const THIN_RULE: &str = "--------------------------------------------------";

// =============================================================================
// Configuration
// =============================================================================

/// Station identity, printed in every transcript header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub station: String,
    pub shop: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            station: "station-1".to_string(),
            shop: "Pack Station".to_string(),
        }
    }
}

// =============================================================================
// State & Transition Table
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    WaitOrder,
    ControlOrder,
    WaitShipping,
    AppendOrder,
    WaitSerial,
}

impl SessionState {
    pub const fn name(&self) -> &'static str {
        match self {
            SessionState::WaitOrder => "WAIT_ORDER",
            SessionState::ControlOrder => "CONTROL_ORDER",
            SessionState::WaitShipping => "WAIT_SHIPPING",
            SessionState::AppendOrder => "APPEND_ORDER",
            SessionState::WaitSerial => "WAIT_SERIAL",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What the session does for an accepted command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Reset,
    ToggleForce,
    ShowLedger,
    LoadOrder(OrderId),
    ScanProduct(ProductId),
    CaptureSerial(String),
    BeginAppend,
    AppendOrder(OrderId),
    CancelAppend,
    SetCarrier(Carrier),
    RecordTracking(String),
    Check,
    Finalize,
}

/// The transition table. `None` means the command is not valid in `state`.
pub fn route(state: SessionState, command: &Command) -> Option<Action> {
    use SessionState::*;

    let action = match (state, command) {
        (_, Command::Verb(Verb::Reset)) => Action::Reset,
        (_, Command::Verb(Verb::SwitchForce)) => Action::ToggleForce,

        (WaitOrder, Command::LoadOrder(id)) => Action::LoadOrder(*id),

        (ControlOrder, Command::ScanProduct(id)) => Action::ScanProduct(*id),
        (ControlOrder, Command::SetCarrier(carrier)) => Action::SetCarrier(*carrier),
        (ControlOrder, Command::AppendOrderRequest) => Action::BeginAppend,
        (ControlOrder, Command::Verb(Verb::Check)) => Action::Check,
        (ControlOrder, Command::Verb(Verb::Finalize)) => Action::Finalize,

        (WaitShipping, Command::Raw(text)) => Action::RecordTracking(text.clone()),

        (AppendOrder, Command::LoadOrder(id)) => Action::AppendOrder(*id),
        (AppendOrder, Command::Verb(Verb::Cancel)) => Action::CancelAppend,

        (WaitSerial, Command::Raw(text)) => Action::CaptureSerial(text.clone()),

        (ControlOrder | WaitShipping | AppendOrder, Command::Verb(Verb::View)) => {
            Action::ShowLedger
        }

        _ => return None,
    };
    Some(action)
}

// =============================================================================
// Outcomes
// =============================================================================

/// A shipment that was closed and recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shipment {
    pub shipment_id: Uuid,
    pub order_id: OrderId,
    pub appended: Vec<OrderId>,
    pub carrier: Option<Carrier>,
    pub tracking: Option<String>,
    pub record: AuditKey,
    pub serials: usize,
    pub forced: bool,
}

impl Shipment {
    /// Primary order first, then appended orders.
    pub fn order_ids(&self) -> impl Iterator<Item = OrderId> + '_ {
        std::iter::once(self.order_id).chain(self.appended.iter().copied())
    }
}

/// What an accepted instruction did.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    OrderLoaded { order_id: OrderId, lines: usize },
    ProductScanned { product_id: ProductId, scanned: i64, ordered: i64 },
    SerialRequested { product_id: ProductId },
    SerialCaptured { product_id: ProductId, serial: String },
    AppendStarted,
    OrderAppended { order_id: OrderId, new_products: usize },
    AppendCancelled,
    CarrierSet(Carrier),
    TrackingRecorded(String),
    CheckPassed(Reconciliation),
    Finalized(Shipment),
    ForceToggled(bool),
    Reset,
    LedgerShown,
}

impl Outcome {
    fn cue(&self) -> Option<Cue> {
        match self {
            Outcome::OrderLoaded { .. }
            | Outcome::OrderAppended { .. }
            | Outcome::CheckPassed(_)
            | Outcome::Finalized(_) => Some(Cue::Success),
            Outcome::SerialRequested { .. } | Outcome::ForceToggled(true) => Some(Cue::Notify),
            _ => None,
        }
    }
}

// =============================================================================
// Session
// =============================================================================

/// The scanner workflow for one packing station.
pub struct ShipmentSession {
    config: SessionConfig,
    catalog: Arc<dyn Catalog>,
    audit: Arc<dyn AuditStore>,
    feedback: Box<dyn Feedback>,

    state: SessionState,
    shipment_id: Option<Uuid>,
    order: Option<Order>,
    appended: Vec<Order>,
    ledger: ScanLedger,
    carrier: Option<Carrier>,
    tracking: Option<String>,
    force: bool,
    serials: Vec<SerialEntry>,
    pending_serial: Option<ProductId>,
    /// Primary record already written by an earlier FINALIZE of this shipment.
    recorded: Option<AuditKey>,
    transcript: Transcript,
}

impl ShipmentSession {
    pub fn new(
        config: SessionConfig,
        catalog: Arc<dyn Catalog>,
        audit: Arc<dyn AuditStore>,
        feedback: Box<dyn Feedback>,
    ) -> Self {
        Self {
            config,
            catalog,
            audit,
            feedback,
            state: SessionState::WaitOrder,
            shipment_id: None,
            order: None,
            appended: Vec::new(),
            ledger: ScanLedger::default(),
            carrier: None,
            tracking: None,
            force: false,
            serials: Vec::new(),
            pending_serial: None,
            recorded: None,
            transcript: Transcript::default(),
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn catalog(&self) -> &dyn Catalog {
        self.catalog.as_ref()
    }

    /// The primary order, with appended orders merged in.
    pub fn order(&self) -> Option<&Order> {
        self.order.as_ref()
    }

    pub fn appended(&self) -> &[Order] {
        &self.appended
    }

    pub fn ledger(&self) -> &ScanLedger {
        &self.ledger
    }

    pub fn carrier(&self) -> Option<Carrier> {
        self.carrier
    }

    pub fn tracking(&self) -> Option<&str> {
        self.tracking.as_deref()
    }

    pub fn force(&self) -> bool {
        self.force
    }

    pub fn serials(&self) -> &[SerialEntry] {
        &self.serials
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn shipment_id(&self) -> Option<Uuid> {
        self.shipment_id
    }

    /// Shows a line to the operator and records it while an order is loaded.
    pub fn say(&mut self, text: impl AsRef<str>) {
        self.transcript.echo(self.feedback.as_mut(), text.as_ref());
    }

    // -------------------------------------------------------------------------
    // Dispatch
    // -------------------------------------------------------------------------

    /// Applies one instruction.
    ///
    /// Rejected instructions leave the session unchanged; the error has
    /// already been shown to the operator when this returns.
    pub async fn apply(&mut self, instruction: Instruction) -> ShipResult<Outcome> {
        let Instruction {
            multiplier,
            command,
        } = instruction;
        let kind = command.kind();

        let result = match route(self.state, &command) {
            Some(action) => {
                debug!(state = %self.state, ?action, multiplier, "dispatching");
                self.perform(action, multiplier, kind).await
            }
            None => Err(self.rejection(&command)),
        };

        match &result {
            Ok(outcome) => {
                if let Some(cue) = outcome.cue() {
                    self.feedback.cue(cue);
                }
            }
            Err(err) => self.report(err),
        }
        result
    }

    async fn perform(
        &mut self,
        action: Action,
        multiplier: i64,
        kind: CommandKind,
    ) -> ShipResult<Outcome> {
        match action {
            Action::Reset => {
                self.reset();
                self.say("Session reset. Scan an order.");
                Ok(Outcome::Reset)
            }
            Action::ToggleForce => Ok(self.toggle_force()),
            Action::ShowLedger => self.show_ledger(kind),
            Action::LoadOrder(id) => self.load_order(id).await,
            Action::ScanProduct(id) => self.scan_product(id, multiplier, kind).await,
            Action::CaptureSerial(text) => self.capture_serial(&text, kind),
            Action::BeginAppend => {
                self.state = SessionState::AppendOrder;
                self.say("Scan the order to append (CMD-CANCEL to abort).");
                Ok(Outcome::AppendStarted)
            }
            Action::AppendOrder(id) => self.append_order(id, kind).await,
            Action::CancelAppend => {
                self.state = SessionState::ControlOrder;
                self.say("Append cancelled.");
                Ok(Outcome::AppendCancelled)
            }
            Action::SetCarrier(carrier) => {
                self.carrier = Some(carrier);
                self.state = SessionState::WaitShipping;
                self.say(format!("Carrier {}: scan the shipping number.", carrier.label()));
                Ok(Outcome::CarrierSet(carrier))
            }
            Action::RecordTracking(text) => {
                let tracking = text.trim().to_string();
                if !tracking.is_empty() {
                    self.say(format!("Shipping number {tracking}"));
                    self.tracking = Some(tracking.clone());
                }
                self.state = SessionState::ControlOrder;
                Ok(Outcome::TrackingRecorded(tracking))
            }
            Action::Check => self.check(kind),
            Action::Finalize => self.finalize(kind).await,
        }
    }

    fn rejection(&self, command: &Command) -> ShipError {
        match (self.state, command, self.pending_serial) {
            (SessionState::WaitSerial, _, Some(product_id)) => ShipError::SerialExpected { product_id },
            (SessionState::ControlOrder, Command::Raw(text), _) if looks_like_ean(text) => {
                ShipError::ProductNotFound(text.clone())
            }
            _ => self.guard(command.kind()),
        }
    }

    fn guard(&self, command: CommandKind) -> ShipError {
        ShipError::GuardRejection {
            state: self.state,
            command,
        }
    }

    /// Shows `err` to the operator with an error cue. `apply` does this for
    /// its own errors; callers use it for scans that failed before reaching
    /// the session.
    pub fn report(&mut self, err: &ShipError) {
        if err.is_persist_failure() {
            error!(shipment_id = ?self.shipment_id, error = %err, "shipment NOT recorded");
            self.say(format!("!!! {err}"));
            self.say("!!! SHIPMENT NOT COMPLETE. Fix the audit store and FINALIZE again.");
        } else {
            warn!(state = %self.state, error = %err, "instruction rejected");
            self.say(format!("[ERROR] {err}"));
        }
        self.feedback.cue(Cue::Error);
    }

    fn primary(&self, kind: CommandKind) -> ShipResult<&Order> {
        self.order.as_ref().ok_or_else(|| self.guard(kind))
    }

    // -------------------------------------------------------------------------
    // Orders
    // -------------------------------------------------------------------------

    /// Fetches an order and refuses it when it has already been shipped.
    async fn fetch_unshipped(&self, id: OrderId) -> ShipResult<Order> {
        let order = self
            .catalog
            .fetch_order(id)
            .await?
            .ok_or(ShipError::OrderNotFound(id))?;

        if self.audit.exists(&order).await? {
            let key = self
                .audit
                .shipped_under(&order)
                .await?
                .unwrap_or_else(|| AuditKey::for_order(&order));
            return Err(ShipError::DuplicateShipment { order_id: id, key });
        }
        Ok(order)
    }

    async fn load_order(&mut self, id: OrderId) -> ShipResult<Outcome> {
        let order = self.fetch_unshipped(id).await?;
        let shipment_id = Uuid::new_v4();
        info!(order_id = %id, %shipment_id, lines = order.lines.len(), "order loaded");

        self.clear_shipment();
        self.shipment_id = Some(shipment_id);
        self.ledger = ScanLedger::for_order(&order);
        self.transcript.start();

        for line in self.order_header(&order, shipment_id) {
            self.say(line);
        }
        self.say("Scan products, then carrier and shipping number.");

        let lines = order.lines.len();
        self.order = Some(order);
        self.state = SessionState::ControlOrder;
        Ok(Outcome::OrderLoaded {
            order_id: id,
            lines,
        })
    }

    fn order_header(&self, order: &Order, shipment_id: Uuid) -> Vec<String> {
        let units: i64 = order.lines.iter().map(|l| l.quantity).sum();
        let mut out = vec![
            RULE.to_string(),
            format!(
                "Order {}  ref {}  ({} / {})",
                order.id, order.reference, self.config.shop, self.config.station
            ),
            format!("Customer : {}", order.customer),
            format!("Date     : {}", order.ordered_at.format("%Y-%m-%d %H:%M")),
            format!(
                "Lines    : {}  Units: {}  Total: {}",
                order.lines.len(),
                units,
                order.total()
            ),
            format!("Shipment : {shipment_id}"),
            THIN_RULE.to_string(),
        ];
        out.extend(order.lines.iter().map(|l| {
            format!(
                "{:>4} x {:>6}  {:<12} {}",
                l.quantity, l.product_id, l.reference, l.name
            )
        }));
        out
    }

    async fn append_order(&mut self, id: OrderId, kind: CommandKind) -> ShipResult<Outcome> {
        let primary_id = self.primary(kind)?.id;
        if id == primary_id || self.appended.iter().any(|o| o.id == id) {
            return Err(ShipError::AlreadyInShipment(id));
        }

        let other = self.fetch_unshipped(id).await?;
        let introduced = match self.order.as_mut() {
            Some(primary) => primary.merge(&other),
            None => return Err(self.guard(kind)),
        };
        self.ledger.track(introduced.iter().copied());
        info!(order_id = %primary_id, appended = %id, new_products = introduced.len(), "order appended");

        self.say(format!(
            "Appended order {} ref {} ({}): {} line(s), {} new product(s)",
            other.id,
            other.reference,
            other.customer,
            other.lines.len(),
            introduced.len()
        ));
        for l in &other.lines {
            self.say(format!(
                "{:>4} x {:>6}  {:<12} {}",
                l.quantity, l.product_id, l.reference, l.name
            ));
        }

        self.appended.push(other);
        self.state = SessionState::ControlOrder;
        Ok(Outcome::OrderAppended {
            order_id: id,
            new_products: introduced.len(),
        })
    }

    // -------------------------------------------------------------------------
    // Scanning
    // -------------------------------------------------------------------------

    async fn scan_product(
        &mut self,
        id: ProductId,
        multiplier: i64,
        kind: CommandKind,
    ) -> ShipResult<Outcome> {
        let order = self.primary(kind)?;
        let line = order
            .line(id)
            .ok_or(ShipError::ProductNotInOrder(id, order.id))?;
        let ordered = line.quantity;
        let reference = line.reference.clone();
        let scanned = self.ledger.scanned(id);

        let serial = self.catalog.product_requires_serial(id).await?;
        if serial && multiplier.abs() > 1 {
            return Err(ShipError::SerialRequiresSingleUnit(id));
        }

        let next = scanned + multiplier;
        if next > ordered {
            return Err(ShipError::QuantityOverrun {
                product_id: id,
                scanned,
                requested: multiplier,
                ordered,
            });
        }
        if next < 0 {
            return Err(ShipError::QuantityUnderrun {
                product_id: id,
                scanned,
                removed: -multiplier,
            });
        }

        self.ledger.add(id, multiplier);
        debug!(product_id = %id, multiplier, scanned = next, ordered, "product scanned");
        self.say(format!("{multiplier:+} x {id} {reference}  {next}/{ordered}"));

        if serial && multiplier > 0 {
            self.pending_serial = Some(id);
            self.state = SessionState::WaitSerial;
            self.say(format!("Scan the serial number of {reference}."));
            return Ok(Outcome::SerialRequested { product_id: id });
        }
        if serial {
            if let Some(pos) = self.serials.iter().rposition(|s| s.product_id == id) {
                let removed = self.serials.remove(pos);
                self.say(format!("Serial {} removed.", removed.serial));
            }
        }

        Ok(Outcome::ProductScanned {
            product_id: id,
            scanned: next,
            ordered,
        })
    }

    fn capture_serial(&mut self, raw: &str, kind: CommandKind) -> ShipResult<Outcome> {
        let product_id = self.pending_serial.ok_or_else(|| self.guard(kind))?;
        let (serial, remark) = SerialEntry::split_remark(raw);
        if serial.is_empty() {
            return Err(ShipError::SerialExpected { product_id });
        }

        let order = self.primary(kind)?;
        let entry = SerialEntry {
            order_id: order.id,
            order_date: order.ordered_on(),
            product_id,
            product_reference: order
                .line(product_id)
                .map(|l| l.reference.clone())
                .unwrap_or_default(),
            serial: serial.clone(),
            remark,
        };

        self.say(match &entry.remark {
            Some(remark) => format!("Serial {} recorded for {} ({remark})", serial, entry.product_reference),
            None => format!("Serial {} recorded for {}", serial, entry.product_reference),
        });
        self.serials.push(entry);
        self.pending_serial = None;
        self.state = SessionState::ControlOrder;
        Ok(Outcome::SerialCaptured { product_id, serial })
    }

    fn show_ledger(&mut self, kind: CommandKind) -> ShipResult<Outcome> {
        let order = self.primary(kind)?;
        let mut lines: Vec<String> = order
            .lines
            .iter()
            .map(|l| {
                format!(
                    "{:>3}/{:<3} {:>6}  {:<12} {}",
                    self.ledger.scanned(l.product_id),
                    l.quantity,
                    l.product_id,
                    l.reference,
                    l.name
                )
            })
            .collect();
        lines.push(format!(
            "Carrier: {}  Tracking: {}  Serials: {}  Force: {}",
            self.carrier.map_or("-", |c| c.code()),
            self.tracking.as_deref().unwrap_or("-"),
            self.serials.len(),
            if self.force { "ON" } else { "off" }
        ));

        for line in lines {
            self.say(line);
        }
        Ok(Outcome::LedgerShown)
    }

    // -------------------------------------------------------------------------
    // Check & Finalize
    // -------------------------------------------------------------------------

    fn reconcile(&self, kind: CommandKind) -> ShipResult<Reconciliation> {
        let order = self.primary(kind)?;
        Ok(reconcile::check(
            order,
            &self.ledger,
            self.carrier,
            self.tracking.as_deref(),
        ))
    }

    fn check(&mut self, kind: CommandKind) -> ShipResult<Outcome> {
        let rec = self.reconcile(kind)?;
        for line in rec.report() {
            self.say(line);
        }
        if rec.passed() {
            Ok(Outcome::CheckPassed(rec))
        } else {
            Err(ShipError::ReconciliationFailed(rec))
        }
    }

    async fn finalize(&mut self, kind: CommandKind) -> ShipResult<Outcome> {
        let forced = std::mem::take(&mut self.force);

        if forced {
            warn!(shipment_id = ?self.shipment_id, "finalize forced, check skipped");
            self.say("FORCED: closing the shipment without check.");
        } else {
            let rec = self.reconcile(kind)?;
            for line in rec.report() {
                self.say(line);
            }
            if !rec.passed() {
                return Err(ShipError::ReconciliationFailed(rec));
            }
        }

        let shipment = self.persist(kind, forced).await?;
        info!(
            shipment_id = %shipment.shipment_id,
            order_id = %shipment.order_id,
            record = %shipment.record,
            forced,
            "shipment finalized"
        );

        self.reset();
        self.say(format!(
            "Shipment recorded as {}. Scan the next order.",
            shipment.record
        ));
        Ok(Outcome::Finalized(shipment))
    }

    /// Writes the serial export, the primary record, then one
    /// cross-reference per appended order.
    ///
    /// An appended order only gets its marker once the primary record it
    /// points at exists. If a cross-reference fails after the primary record
    /// was written, the retry skips the primary record and rewrites the
    /// cross-references.
    async fn persist(&mut self, kind: CommandKind, forced: bool) -> ShipResult<Shipment> {
        let order_id = self.primary(kind)?.id;
        let shipment_id = self.shipment_id.unwrap_or_else(Uuid::new_v4);

        self.say(THIN_RULE);
        self.say(format!(
            "Closed {} | carrier {} | tracking {} | serials {}",
            shipment_id,
            self.carrier.map_or("-", |c| c.code()),
            self.tracking.as_deref().unwrap_or("-"),
            self.serials.len()
        ));
        for appended in &self.appended.iter().map(|o| o.id).collect::<Vec<_>>() {
            self.say(format!("Includes order {appended}"));
        }
        self.say(RULE);

        let failed = |source: BackendError| ShipError::AuditPersistFailed { order_id, source };
        let order = self.primary(kind)?;

        if !self.serials.is_empty() {
            self.audit
                .save_serials(order, &self.serials)
                .await
                .map_err(failed)?;
        }
        let record = match self.recorded.clone() {
            Some(record) => {
                warn!(%record, "primary record already written, completing cross-references");
                record
            }
            None => self
                .audit
                .save(order, self.transcript.lines())
                .await
                .map_err(failed)?,
        };
        self.recorded = Some(record.clone());

        for appended in &self.appended {
            self.audit
                .save_cross_reference(appended, &record)
                .await
                .map_err(failed)?;
        }

        Ok(Shipment {
            shipment_id,
            order_id,
            appended: self.appended.iter().map(|o| o.id).collect(),
            carrier: self.carrier,
            tracking: self.tracking.clone(),
            record,
            serials: self.serials.len(),
            forced,
        })
    }

    // -------------------------------------------------------------------------
    // Reset
    // -------------------------------------------------------------------------

    fn toggle_force(&mut self) -> Outcome {
        self.force = !self.force;
        if self.force {
            warn!(state = %self.state, "force mode enabled");
            self.say("FORCE ON: the next FINALIZE skips the check.");
        } else {
            self.say("FORCE OFF.");
        }
        Outcome::ForceToggled(self.force)
    }

    fn clear_shipment(&mut self) {
        self.shipment_id = None;
        self.order = None;
        self.appended.clear();
        self.ledger.clear();
        self.carrier = None;
        self.tracking = None;
        self.serials.clear();
        self.pending_serial = None;
        self.recorded = None;
    }

    /// Back to WAIT_ORDER with nothing loaded.
    fn reset(&mut self) {
        if let Some(id) = self.shipment_id {
            info!(shipment_id = %id, "session reset");
        }
        self.clear_shipment();
        self.force = false;
        self.transcript.stop();
        self.state = SessionState::WaitOrder;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{order, FakeAudit, FakeCatalog, RecordingFeedback};

    const PRIMARY: u32 = 8042;
    const SECOND: u32 = 8043;
    const MUG: u32 = 42;
    const TEE: u32 = 7;
    const ROUTER: u32 = 99;

    struct Harness {
        session: ShipmentSession,
        audit: FakeAudit,
        feedback: RecordingFeedback,
    }

    impl Harness {
        fn new(catalog: FakeCatalog) -> Self {
            Self::with_audit(catalog, FakeAudit::new())
        }

        fn with_audit(catalog: FakeCatalog, audit: FakeAudit) -> Self {
            let feedback = RecordingFeedback::new();
            let session = ShipmentSession::new(
                SessionConfig::default(),
                Arc::new(catalog),
                Arc::new(audit.clone()),
                Box::new(feedback.clone()),
            );
            Self {
                session,
                audit,
                feedback,
            }
        }

        async fn run(&mut self, multiplier: i64, command: Command) -> ShipResult<Outcome> {
            self.session
                .apply(Instruction::with_multiplier(multiplier, command))
                .await
        }

        async fn load(&mut self, id: u32) -> ShipResult<Outcome> {
            self.run(1, Command::LoadOrder(OrderId(id))).await
        }

        async fn product(&mut self, id: u32, multiplier: i64) -> ShipResult<Outcome> {
            self.run(multiplier, Command::ScanProduct(ProductId(id))).await
        }

        async fn verb(&mut self, verb: Verb) -> ShipResult<Outcome> {
            self.run(1, Command::Verb(verb)).await
        }

        async fn raw(&mut self, text: &str) -> ShipResult<Outcome> {
            self.run(1, Command::Raw(text.to_string())).await
        }

        async fn carrier(&mut self, carrier: Carrier) -> ShipResult<Outcome> {
            self.run(1, Command::SetCarrier(carrier)).await
        }

        async fn ship_to(&mut self, tracking: &str) {
            self.carrier(Carrier::Poste).await.unwrap();
            self.raw(tracking).await.unwrap();
        }

        fn scanned(&self, id: u32) -> i64 {
            self.session.ledger().scanned(ProductId(id))
        }
    }

    fn mug_order() -> FakeCatalog {
        FakeCatalog::new()
            .with_order(order(PRIMARY, &[(MUG, 3)]))
            .with_product(MUG, "3232100000421", false)
    }

    fn router_order() -> FakeCatalog {
        FakeCatalog::new()
            .with_order(order(PRIMARY, &[(ROUTER, 2), (MUG, 1)]))
            .with_product(ROUTER, "3232100000995", true)
    }

    // -------------------------------------------------------------------------
    // Transition table
    // -------------------------------------------------------------------------

    #[test]
    fn test_route_table() {
        use SessionState::*;

        let load = Command::LoadOrder(OrderId(1));
        assert_eq!(route(WaitOrder, &load), Some(Action::LoadOrder(OrderId(1))));
        assert_eq!(route(AppendOrder, &load), Some(Action::AppendOrder(OrderId(1))));
        assert_eq!(route(ControlOrder, &load), None);

        let raw = Command::Raw("X1".into());
        assert_eq!(route(WaitShipping, &raw), Some(Action::RecordTracking("X1".into())));
        assert_eq!(route(WaitSerial, &raw), Some(Action::CaptureSerial("X1".into())));
        assert_eq!(route(ControlOrder, &raw), None);
        assert_eq!(route(WaitOrder, &raw), None);

        assert_eq!(route(ControlOrder, &Command::AppendOrderRequest), Some(Action::BeginAppend));
        assert_eq!(route(AppendOrder, &Command::Verb(Verb::Cancel)), Some(Action::CancelAppend));
        assert_eq!(route(ControlOrder, &Command::Verb(Verb::Cancel)), None);
        assert_eq!(route(WaitSerial, &Command::ScanProduct(ProductId(1))), None);
        assert_eq!(route(WaitOrder, &Command::Verb(Verb::View)), None);
    }

    #[test]
    fn test_reset_and_force_accepted_everywhere() {
        use SessionState::*;

        for state in [WaitOrder, ControlOrder, WaitShipping, AppendOrder, WaitSerial] {
            assert_eq!(route(state, &Command::Verb(Verb::Reset)), Some(Action::Reset));
            assert_eq!(
                route(state, &Command::Verb(Verb::SwitchForce)),
                Some(Action::ToggleForce)
            );
        }
    }

    // -------------------------------------------------------------------------
    // Workflow
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_complete_shipment() {
        let mut h = Harness::new(mug_order());

        h.load(PRIMARY).await.unwrap();
        assert_eq!(h.session.state(), SessionState::ControlOrder);
        assert_eq!(h.scanned(MUG), 0);

        h.product(MUG, 1).await.unwrap();
        h.product(MUG, 2).await.unwrap();
        assert_eq!(h.scanned(MUG), 3);

        h.carrier(Carrier::Poste).await.unwrap();
        assert_eq!(h.session.state(), SessionState::WaitShipping);

        h.raw("TRACK123").await.unwrap();
        assert_eq!(h.session.state(), SessionState::ControlOrder);
        assert_eq!(h.session.tracking(), Some("TRACK123"));

        let outcome = h.verb(Verb::Check).await.unwrap();
        assert!(matches!(outcome, Outcome::CheckPassed(ref rec) if rec.passed()));

        let Outcome::Finalized(shipment) = h.verb(Verb::Finalize).await.unwrap() else {
            panic!("finalize should succeed");
        };
        assert_eq!(shipment.record.to_string(), "202410/8042");
        assert_eq!(shipment.carrier, Some(Carrier::Poste));
        assert!(!shipment.forced);

        assert_eq!(h.session.state(), SessionState::WaitOrder);
        assert!(h.session.order().is_none());
        assert!(h.session.ledger().is_empty());

        let record = h.audit.record("202410/8042").unwrap();
        assert!(record.iter().any(|l| l.contains("Order 8042")));
        assert!(record.iter().any(|l| l == "Tracking : TRACK123"));
        assert!(record.iter().any(|l| l == "CHECK PASSED"));
        assert!(h.feedback.cues().contains(&Cue::Success));
    }

    #[tokio::test]
    async fn test_overrun_rejected_without_mutation() {
        let mut h = Harness::new(mug_order());
        h.load(PRIMARY).await.unwrap();

        let err = h.product(MUG, 4).await.unwrap_err();
        assert_eq!(
            err,
            ShipError::QuantityOverrun {
                product_id: ProductId(MUG),
                scanned: 0,
                requested: 4,
                ordered: 3,
            }
        );
        assert_eq!(h.scanned(MUG), 0);
        assert_eq!(h.session.state(), SessionState::ControlOrder);
        assert_eq!(h.feedback.cues().last(), Some(&Cue::Error));
    }

    #[tokio::test]
    async fn test_underrun_rejected() {
        let mut h = Harness::new(mug_order());
        h.load(PRIMARY).await.unwrap();
        h.product(MUG, 1).await.unwrap();

        let err = h.product(MUG, -2).await.unwrap_err();
        assert!(matches!(err, ShipError::QuantityUnderrun { removed: 2, .. }));
        assert_eq!(h.scanned(MUG), 1);

        h.product(MUG, -1).await.unwrap();
        assert_eq!(h.scanned(MUG), 0);
    }

    #[tokio::test]
    async fn test_reset_from_wait_shipping() {
        let mut h = Harness::new(mug_order());
        h.load(PRIMARY).await.unwrap();
        h.product(MUG, 2).await.unwrap();
        h.carrier(Carrier::Gls).await.unwrap();
        assert_eq!(h.session.state(), SessionState::WaitShipping);

        assert_eq!(h.verb(Verb::Reset).await.unwrap(), Outcome::Reset);
        assert_eq!(h.session.state(), SessionState::WaitOrder);
        assert!(h.session.ledger().is_empty());
        assert_eq!(h.session.carrier(), None);
        assert_eq!(h.session.tracking(), None);
        assert!(!h.session.transcript().is_active());
        assert_eq!(h.audit.record_count(), 0);
    }

    #[tokio::test]
    async fn test_shipped_order_cannot_be_loaded_again() {
        let mut h = Harness::new(mug_order());
        h.load(PRIMARY).await.unwrap();
        h.product(MUG, 3).await.unwrap();
        h.ship_to("TRACK123").await;
        h.verb(Verb::Finalize).await.unwrap();

        let err = h.load(PRIMARY).await.unwrap_err();
        assert!(matches!(err, ShipError::DuplicateShipment { order_id: OrderId(PRIMARY), .. }));
        assert_eq!(h.session.state(), SessionState::WaitOrder);
    }

    #[tokio::test]
    async fn test_existing_record_blocks_load() {
        let audit = FakeAudit::new().with_record(&order(PRIMARY, &[]));
        let mut h = Harness::with_audit(mug_order(), audit);

        let err = h.load(PRIMARY).await.unwrap_err();
        assert_eq!(err.to_string(), "order 8042 already shipped (audit record 202410/8042)");
        assert!(h.session.order().is_none());
    }

    #[tokio::test]
    async fn test_unknown_order_and_catalog_failure() {
        let mut h = Harness::new(mug_order());
        assert_eq!(h.load(1).await.unwrap_err(), ShipError::OrderNotFound(OrderId(1)));

        let mut h = Harness::new(FakeCatalog::new().failing());
        assert!(matches!(h.load(PRIMARY).await.unwrap_err(), ShipError::Backend(_)));
        assert_eq!(h.session.state(), SessionState::WaitOrder);
    }

    #[tokio::test]
    async fn test_guard_rejections() {
        let mut h = Harness::new(mug_order());

        let err = h.verb(Verb::Check).await.unwrap_err();
        assert!(matches!(err, ShipError::GuardRejection { state: SessionState::WaitOrder, .. }));
        assert!(h.feedback.printed("no order loaded"));

        h.load(PRIMARY).await.unwrap();
        let err = h.raw("hello").await.unwrap_err();
        assert!(matches!(err, ShipError::GuardRejection { command: CommandKind::Raw, .. }));

        let err = h.raw("3312345678901").await.unwrap_err();
        assert_eq!(err, ShipError::ProductNotFound("3312345678901".into()));

        let err = h.product(TEE, 1).await.unwrap_err();
        assert_eq!(err, ShipError::ProductNotInOrder(ProductId(TEE), OrderId(PRIMARY)));
        assert_eq!(h.session.state(), SessionState::ControlOrder);

        // Errors while an order is loaded land in the transcript too.
        assert!(h
            .session
            .transcript()
            .lines()
            .iter()
            .any(|l| l.starts_with("[ERROR] product 7 is not part")));
    }

    #[tokio::test]
    async fn test_check_failure_is_reported() {
        let mut h = Harness::new(mug_order());
        h.load(PRIMARY).await.unwrap();
        h.product(MUG, 2).await.unwrap();

        let err = h.verb(Verb::Check).await.unwrap_err();
        let ShipError::ReconciliationFailed(rec) = err else {
            panic!("expected reconciliation failure");
        };
        // carrier, tracking, one short line
        assert_eq!(rec.failures(), 3);
        assert_eq!(h.session.state(), SessionState::ControlOrder);
        assert!(h.feedback.printed("CHECK FAILED: 3 issue(s)"));

        let err = h.verb(Verb::Finalize).await.unwrap_err();
        assert!(matches!(err, ShipError::ReconciliationFailed(_)));
        assert_eq!(h.audit.record_count(), 0);
    }

    // -------------------------------------------------------------------------
    // Force
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_forced_finalize_skips_check_and_clears_flag() {
        let mut h = Harness::new(mug_order());
        h.load(PRIMARY).await.unwrap();
        h.product(MUG, 1).await.unwrap();

        assert_eq!(h.verb(Verb::SwitchForce).await.unwrap(), Outcome::ForceToggled(true));
        assert_eq!(h.session.state(), SessionState::ControlOrder);

        let Outcome::Finalized(shipment) = h.verb(Verb::Finalize).await.unwrap() else {
            panic!("forced finalize should succeed");
        };
        assert!(shipment.forced);
        assert!(!h.session.force());
        assert!(h.audit.record("202410/8042").is_some());
    }

    #[tokio::test]
    async fn test_failed_finalize_clears_force_flag() {
        let mut h = Harness::new(mug_order());
        h.load(PRIMARY).await.unwrap();
        h.verb(Verb::SwitchForce).await.unwrap();
        h.audit.set_failing(true);

        let err = h.verb(Verb::Finalize).await.unwrap_err();
        assert!(err.is_persist_failure());
        assert!(!h.session.force());
        assert_eq!(h.session.state(), SessionState::ControlOrder);
        assert!(h.session.order().is_some());
        assert!(h.feedback.printed("SHIPMENT NOT COMPLETE"));

        // Unforced retry now has to pass the check.
        h.audit.set_failing(false);
        assert!(matches!(
            h.verb(Verb::Finalize).await.unwrap_err(),
            ShipError::ReconciliationFailed(_)
        ));
        h.product(MUG, 3).await.unwrap();
        h.ship_to("TRACK9").await;
        assert!(matches!(h.verb(Verb::Finalize).await.unwrap(), Outcome::Finalized(_)));
    }

    // -------------------------------------------------------------------------
    // Serial capture
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_serial_product_needs_single_units() {
        let mut h = Harness::new(router_order());
        h.load(PRIMARY).await.unwrap();

        let err = h.product(ROUTER, 2).await.unwrap_err();
        assert_eq!(err, ShipError::SerialRequiresSingleUnit(ProductId(ROUTER)));
        assert_eq!(h.scanned(ROUTER), 0);
    }

    #[tokio::test]
    async fn test_serial_capture_cycle() {
        let mut h = Harness::new(router_order());
        h.load(PRIMARY).await.unwrap();

        let outcome = h.product(ROUTER, 1).await.unwrap();
        assert_eq!(outcome, Outcome::SerialRequested { product_id: ProductId(ROUTER) });
        assert_eq!(h.session.state(), SessionState::WaitSerial);
        assert_eq!(h.feedback.cues().last(), Some(&Cue::Notify));

        let err = h.verb(Verb::Check).await.unwrap_err();
        assert_eq!(err, ShipError::SerialExpected { product_id: ProductId(ROUTER) });
        assert_eq!(h.session.state(), SessionState::WaitSerial);

        h.raw("SN-0001;box dented").await.unwrap();
        assert_eq!(h.session.state(), SessionState::ControlOrder);

        h.product(ROUTER, 1).await.unwrap();
        h.raw("SN-0002").await.unwrap();

        let serials = h.session.serials();
        assert_eq!(serials.len(), 2);
        assert_eq!(serials[0].remark.as_deref(), Some("box dented"));
        assert_eq!(serials[1].product_reference, "REF-99");
        assert_eq!(serials[1].order_id, OrderId(PRIMARY));

        h.product(MUG, 1).await.unwrap();
        h.ship_to("TRACK5").await;
        h.verb(Verb::Finalize).await.unwrap();

        let exported = h.audit.serials("202410/8042").unwrap();
        assert_eq!(
            exported.iter().map(|s| s.serial.as_str()).collect::<Vec<_>>(),
            vec!["SN-0001", "SN-0002"]
        );
    }

    #[tokio::test]
    async fn test_removing_serial_unit_drops_last_serial() {
        let mut h = Harness::new(router_order());
        h.load(PRIMARY).await.unwrap();
        h.product(ROUTER, 1).await.unwrap();
        h.raw("SN-A").await.unwrap();
        h.product(ROUTER, 1).await.unwrap();
        h.raw("SN-B").await.unwrap();

        let outcome = h.product(ROUTER, -1).await.unwrap();
        assert!(matches!(outcome, Outcome::ProductScanned { scanned: 1, .. }));
        assert_eq!(h.session.state(), SessionState::ControlOrder);
        assert_eq!(h.session.serials().len(), 1);
        assert_eq!(h.session.serials()[0].serial, "SN-A");
    }

    // -------------------------------------------------------------------------
    // Append
    // -------------------------------------------------------------------------

    fn two_orders() -> FakeCatalog {
        FakeCatalog::new()
            .with_order(order(PRIMARY, &[(MUG, 3)]))
            .with_order(order(SECOND, &[(MUG, 2), (TEE, 1)]))
    }

    #[tokio::test]
    async fn test_append_merges_lines() {
        let mut h = Harness::new(two_orders());
        h.load(PRIMARY).await.unwrap();
        h.product(MUG, 1).await.unwrap();

        assert_eq!(
            h.run(1, Command::AppendOrderRequest).await.unwrap(),
            Outcome::AppendStarted
        );
        assert_eq!(h.session.state(), SessionState::AppendOrder);

        let outcome = h.load(SECOND).await.unwrap();
        assert_eq!(
            outcome,
            Outcome::OrderAppended {
                order_id: OrderId(SECOND),
                new_products: 1
            }
        );
        assert_eq!(h.session.state(), SessionState::ControlOrder);

        let order = h.session.order().unwrap();
        assert_eq!(order.lines.len(), 2);
        assert_eq!(order.line(ProductId(MUG)).map(|l| l.quantity), Some(5));
        assert_eq!(h.scanned(MUG), 1);
        assert_eq!(h.scanned(TEE), 0);
        assert_eq!(h.session.appended().len(), 1);
    }

    #[tokio::test]
    async fn test_append_guards() {
        let mut h = Harness::new(two_orders());
        h.load(PRIMARY).await.unwrap();

        h.run(1, Command::AppendOrderRequest).await.unwrap();
        let err = h.load(PRIMARY).await.unwrap_err();
        assert_eq!(err, ShipError::AlreadyInShipment(OrderId(PRIMARY)));
        assert_eq!(h.session.state(), SessionState::AppendOrder);

        assert_eq!(h.verb(Verb::Cancel).await.unwrap(), Outcome::AppendCancelled);
        assert_eq!(h.session.state(), SessionState::ControlOrder);
        assert_eq!(h.session.order().unwrap().lines.len(), 1);

        h.run(1, Command::AppendOrderRequest).await.unwrap();
        h.load(SECOND).await.unwrap();
        h.run(1, Command::AppendOrderRequest).await.unwrap();
        let err = h.load(SECOND).await.unwrap_err();
        assert_eq!(err, ShipError::AlreadyInShipment(OrderId(SECOND)));
    }

    #[tokio::test]
    async fn test_finalize_writes_cross_reference() {
        let mut h = Harness::new(two_orders());
        h.load(PRIMARY).await.unwrap();
        h.run(1, Command::AppendOrderRequest).await.unwrap();
        h.load(SECOND).await.unwrap();
        h.product(MUG, 5).await.unwrap();
        h.product(TEE, 1).await.unwrap();
        h.ship_to("TRACK77").await;

        let Outcome::Finalized(shipment) = h.verb(Verb::Finalize).await.unwrap() else {
            panic!("finalize should succeed");
        };
        assert_eq!(
            shipment.order_ids().collect::<Vec<_>>(),
            vec![OrderId(PRIMARY), OrderId(SECOND)]
        );

        let cross = h.audit.record("202410/8043").unwrap();
        assert!(cross.iter().any(|l| l == "See audit record 202410/8042"));

        // The appended order is now shipped as well, under the primary record.
        let err = h.load(SECOND).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "order 8043 already shipped (audit record 202410/8042)"
        );
    }

    async fn ready_with_append(h: &mut Harness) {
        h.load(PRIMARY).await.unwrap();
        h.run(1, Command::AppendOrderRequest).await.unwrap();
        h.load(SECOND).await.unwrap();
        h.product(MUG, 5).await.unwrap();
        h.product(TEE, 1).await.unwrap();
        h.ship_to("TRACK77").await;
    }

    #[tokio::test]
    async fn test_failed_primary_record_leaves_appended_order_unshipped() {
        let mut h = Harness::new(two_orders());
        ready_with_append(&mut h).await;
        h.audit.set_record_failing(true);

        let err = h.verb(Verb::Finalize).await.unwrap_err();
        assert!(err.is_persist_failure());
        assert_eq!(h.audit.record("202410/8042"), None);
        assert_eq!(h.audit.record("202410/8043"), None);

        h.audit.set_record_failing(false);
        h.verb(Verb::Reset).await.unwrap();

        let outcome = h.load(SECOND).await.unwrap();
        assert!(matches!(outcome, Outcome::OrderLoaded { order_id: OrderId(SECOND), .. }));
    }

    #[tokio::test]
    async fn test_retry_after_cross_reference_failure_completes_shipment() {
        let mut h = Harness::new(two_orders());
        ready_with_append(&mut h).await;
        h.audit.set_cross_reference_failing(true);

        let err = h.verb(Verb::Finalize).await.unwrap_err();
        assert!(err.is_persist_failure());
        assert!(h.audit.record("202410/8042").is_some());
        assert_eq!(h.audit.record("202410/8043"), None);
        assert_eq!(h.session.state(), SessionState::ControlOrder);

        h.audit.set_cross_reference_failing(false);
        let Outcome::Finalized(shipment) = h.verb(Verb::Finalize).await.unwrap() else {
            panic!("retried finalize should succeed");
        };
        assert_eq!(shipment.record.to_string(), "202410/8042");

        let cross = h.audit.record("202410/8043").unwrap();
        assert!(cross.iter().any(|l| l == "See audit record 202410/8042"));
    }

    #[tokio::test]
    async fn test_append_refuses_shipped_order() {
        let audit = FakeAudit::new().with_record(&order(SECOND, &[]));
        let mut h = Harness::with_audit(two_orders(), audit);
        h.load(PRIMARY).await.unwrap();
        h.product(MUG, 1).await.unwrap();
        h.run(1, Command::AppendOrderRequest).await.unwrap();

        let err = h.load(SECOND).await.unwrap_err();
        assert!(matches!(err, ShipError::DuplicateShipment { order_id: OrderId(SECOND), .. }));
        assert_eq!(h.session.state(), SessionState::AppendOrder);

        let order = h.session.order().unwrap();
        assert_eq!(order.lines.len(), 1);
        assert_eq!(order.line(ProductId(MUG)).map(|l| l.quantity), Some(3));
        assert_eq!(h.session.ledger().iter().count(), 1);
        assert_eq!(h.scanned(MUG), 1);
        assert_eq!(h.scanned(TEE), 0);
        assert!(h.session.appended().is_empty());
    }

    #[tokio::test]
    async fn test_view_prints_ledger() {
        let mut h = Harness::new(mug_order());
        h.load(PRIMARY).await.unwrap();
        h.product(MUG, 2).await.unwrap();

        assert_eq!(h.verb(Verb::View).await.unwrap(), Outcome::LedgerShown);
        assert!(h.feedback.printed("  2/3 "));
        assert!(h.feedback.printed("Force: off"));
    }
}
