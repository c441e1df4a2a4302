//! Booking engine.
//!
//! Composes the credit ledger, capacity manager, waitlist, order
//! settlement, and refund calculator over one transactional store.
//! Also supports an async stream of operations.

use chrono::{DateTime, Utc};
use tokio_stream::{Stream, StreamExt};
use tracing::info;

use crate::model::{
    Class, ClassId, DiscountCode, Op, Order, OrderId, PackageId, PaymentTransaction,
    PromoRedemption, Purchase, PurchaseId, RefundId, RefundRequest, Reservation, ReservationId,
    UserId, WaitlistEntry, WaitlistId,
};
use crate::store::LedgerStore;
use crate::Money;

mod booking;
mod capacity;
mod credits;
mod refund;
mod settlement;
mod waitlist;

mod error;
pub use error::{
    AdminError, BookingError, CheckoutError, EngineError, RefundError, SettlementError,
    WaitlistError,
};

pub use credits::{earliest_expiry, oldest_first, SpendOrder};
pub use settlement::Settlement;

/// Engine policy knobs, passed at construction rather than read from
/// ambient state so tests can exercise every mode deterministically.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Minimum hours before class start for a cancellation to be accepted.
    pub cancel_cutoff_hours: i64,
    /// Purchase age in hours within which a refund is auto-eligible.
    pub refund_window_hours: i64,
    /// Settle every checkout synchronously, without a gateway callback.
    pub settle_free_orders: bool,
    /// Order in which spendable purchases are drawn from.
    pub spend_order: SpendOrder,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cancel_cutoff_hours: 4,
            refund_window_hours: 72,
            settle_free_orders: false,
            spend_order: credits::earliest_expiry,
        }
    }
}

/// Post-commit notification hooks, fire and forget. Invoked only after a
/// transaction commits; nothing here can flow back into the transaction.
pub trait Notifier: Send + Sync {
    fn reservation_confirmed(&self, _reservation: &Reservation) {}
    fn reservation_cancelled(&self, _reservation: &Reservation) {}
    fn purchases_granted(&self, _user: UserId, _purchases: &[PurchaseId]) {}
}

/// Tracing-backed notifier, standing in for the mail/SMS collaborator.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn reservation_confirmed(&self, r: &Reservation) {
        info!(user = r.user, class = r.class, reservation = r.id, "reservation confirmed");
    }

    fn reservation_cancelled(&self, r: &Reservation) {
        info!(user = r.user, class = r.class, reservation = r.id, "reservation cancelled");
    }

    fn purchases_granted(&self, user: UserId, purchases: &[PurchaseId]) {
        info!(user, granted = purchases.len(), "purchases granted");
    }
}

/// The booking engine.
///
/// All operations take `&self`; concurrent callers are serialized by the
/// store's transaction layer, so the engine can be shared across workers
/// behind an `Arc`.
pub struct Engine {
    store: LedgerStore,
    config: EngineConfig,
    notifier: Box<dyn Notifier>,
}

/// Public API
impl Engine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            store: LedgerStore::new(),
            config,
            notifier: Box::new(LogNotifier),
        }
    }

    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run the engine over the given operation stream.
    pub async fn run(&self, mut stream: impl Stream<Item = Op> + Unpin) {
        while let Some(op) = stream.next().await {
            // a rejected operation must not stop the engine
            let _ = self.apply(op);
        }
    }

    /// Apply a single operation on top of the current state.
    pub fn apply(&self, op: Op) -> Result<(), EngineError> {
        match op {
            Op::AddClass {
                discipline,
                instructor,
                starts_at,
                duration_min,
                capacity,
            } => {
                let class = self.add_class(discipline, instructor, starts_at, duration_min, capacity);
                info!(class, capacity, "class scheduled");
            }
            Op::AddPackage {
                name,
                class_count,
                validity_days,
                price,
            } => {
                let package = self.add_package(name, class_count, validity_days, price);
                info!(package, "package registered");
            }
            Op::AddCode {
                code,
                percent,
                max_uses,
            } => {
                let result = self.add_code(&code, percent, max_uses);
                match &result {
                    Ok(()) => info!(code, percent, "discount code registered"),
                    Err(e) => info!(code, reason = %e, "add-code rejected"),
                }
                result?;
            }
            Op::Grant {
                user,
                package,
                code,
                at,
            } => {
                let result = self.grant_purchase(user, package, code.as_deref(), at);
                Self::log_result("grant", user, &result);
                result?;
            }
            Op::Reserve {
                user,
                class,
                purchase,
                at,
            } => {
                let result = self.reserve(user, class, purchase, at);
                Self::log_result("reserve", user, &result);
                result?;
            }
            Op::Cancel {
                user,
                reservation,
                at,
            } => {
                let result = self.cancel(user, reservation, at);
                Self::log_result("cancel", user, &result);
                result?;
            }
            Op::Join { user, class, at } => {
                let result = self.join_waitlist(user, class, at);
                Self::log_result("join", user, &result);
                result?;
            }
            Op::Leave { user, entry } => {
                let result = self.leave_waitlist(user, entry);
                Self::log_result("leave", user, &result);
                result?;
            }
            Op::Checkout {
                user,
                package,
                quantity,
                code,
                at,
            } => {
                let result = self.checkout(user, &[(package, quantity)], code.as_deref(), at);
                Self::log_result("checkout", user, &result);
                result?;
            }
            Op::Approved {
                order,
                provider,
                reference,
                at,
            } => {
                let result = self.settle(order, &provider, &reference, at);
                Self::log_result("approved", order, &result);
                result?;
            }
            Op::Denied {
                order,
                provider,
                reference,
                at,
            } => {
                let result = self.record_denied(order, &provider, &reference, at);
                Self::log_result("denied", order, &result);
                result?;
            }
            Op::CheckIn { reservation } => {
                let result = self.check_in(reservation);
                Self::log_result("check-in", reservation, &result);
                result?;
            }
            Op::NoShow { reservation } => {
                let result = self.mark_no_show(reservation);
                Self::log_result("no-show", reservation, &result);
                result?;
            }
            Op::Refund { user, purchase, at } => {
                let result = self.request_refund(user, purchase, at);
                Self::log_result("refund", user, &result);
                result?;
            }
            Op::Expire { at } => {
                let expired = self.expire_purchases(at);
                info!(expired, "purchase expiry sweep");
            }
        }
        Ok(())
    }
}

/// Catalog and admin surface
impl Engine {
    pub fn add_class(
        &self,
        discipline: impl Into<String>,
        instructor: impl Into<String>,
        starts_at: DateTime<Utc>,
        duration_min: u32,
        capacity: u32,
    ) -> ClassId {
        let (discipline, instructor) = (discipline.into(), instructor.into());
        self.store.write(|tables| {
            let id = tables.ids.class();
            tables.classes.insert(
                id,
                Class {
                    id,
                    discipline,
                    instructor,
                    starts_at,
                    duration_min,
                    max_capacity: capacity,
                    current_count: 0,
                    cancelled: false,
                },
            );
            id
        })
    }

    pub fn cancel_class(&self, class: ClassId) -> Result<(), BookingError> {
        self.store.transaction(|tables| {
            let row = tables
                .classes
                .get_mut(&class)
                .ok_or(BookingError::ClassNotFound(class))?;
            row.cancelled = true;
            Ok(())
        })
    }

    pub fn add_package(
        &self,
        name: impl Into<String>,
        class_count: u32,
        validity_days: i64,
        price: Money,
    ) -> PackageId {
        let name = name.into();
        self.store.write(|tables| {
            let id = tables.ids.package();
            tables.packages.insert(
                id,
                crate::model::Package {
                    id,
                    name,
                    class_count,
                    validity_days,
                    price,
                },
            );
            id
        })
    }

    pub fn add_code(
        &self,
        code: &str,
        percent: u8,
        max_uses: Option<u32>,
    ) -> Result<(), AdminError> {
        self.store.transaction(|tables| {
            if tables.codes.contains_key(code) {
                return Err(AdminError::DuplicateCode(code.to_string()));
            }
            tables.codes.insert(
                code.to_string(),
                DiscountCode {
                    code: code.to_string(),
                    percent,
                    uses: 0,
                    max_uses,
                },
            );
            Ok(())
        })
    }

    /// Create a purchase directly, bypassing checkout. Upholds the same
    /// credit invariants as settlement.
    pub fn grant_purchase(
        &self,
        user: UserId,
        package: PackageId,
        code: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Purchase, AdminError> {
        let purchase = self
            .store
            .transaction(|tables| settlement::grant(tables, user, package, code, now))?;
        self.notifier.purchases_granted(user, &[purchase.id]);
        Ok(purchase)
    }

    pub fn check_in(&self, reservation: ReservationId) -> Result<(), BookingError> {
        self.store
            .transaction(|tables| booking::check_in(tables, reservation))
    }

    pub fn mark_no_show(&self, reservation: ReservationId) -> Result<(), BookingError> {
        self.store
            .transaction(|tables| booking::mark_no_show(tables, reservation))
    }

    /// Mark overdue purchases expired. Returns how many were marked.
    pub fn expire_purchases(&self, now: DateTime<Utc>) -> u32 {
        self.store.write(|tables| credits::expire_due(tables, now))
    }

    pub fn cancel_order(&self, order: OrderId) -> Result<(), SettlementError> {
        self.store
            .transaction(|tables| settlement::cancel_order(tables, order))
    }

    pub fn resolve_refund(
        &self,
        request: RefundId,
        approve: bool,
    ) -> Result<RefundRequest, RefundError> {
        self.store
            .transaction(|tables| refund::resolve_refund(tables, request, approve))
    }
}

/// Booking surface
impl Engine {
    /// Reserve a seat, drawing one credit. Seat claim, credit draw, and
    /// reservation write commit together or not at all.
    pub fn reserve(
        &self,
        user: UserId,
        class: ClassId,
        purchase: Option<PurchaseId>,
        now: DateTime<Utc>,
    ) -> Result<Reservation, BookingError> {
        let reservation = self.store.transaction(|tables| {
            booking::create_reservation(tables, &self.config, user, class, purchase, now)
        })?;
        self.notifier.reservation_confirmed(&reservation);
        Ok(reservation)
    }

    /// Cancel a reservation, returning the credit and releasing the seat.
    pub fn cancel(
        &self,
        user: UserId,
        reservation: ReservationId,
        now: DateTime<Utc>,
    ) -> Result<Reservation, BookingError> {
        let cancelled = self.store.transaction(|tables| {
            booking::cancel_reservation(tables, &self.config, user, reservation, now)
        })?;
        self.notifier.reservation_cancelled(&cancelled);
        Ok(cancelled)
    }

    pub fn join_waitlist(
        &self,
        user: UserId,
        class: ClassId,
        now: DateTime<Utc>,
    ) -> Result<WaitlistEntry, WaitlistError> {
        self.store
            .transaction(|tables| waitlist::join(tables, user, class, now))
    }

    pub fn leave_waitlist(&self, user: UserId, entry: WaitlistId) -> Result<(), WaitlistError> {
        self.store
            .transaction(|tables| waitlist::leave(tables, user, entry))
    }
}

/// Commerce surface
impl Engine {
    /// Create an order from catalog prices. Free and zero-total orders
    /// settle synchronously, without a gateway round trip.
    pub fn checkout(
        &self,
        user: UserId,
        lines: &[(PackageId, u32)],
        code: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Order, EngineError> {
        let order = self
            .store
            .transaction(|tables| settlement::checkout(tables, user, lines, code, now))?;
        if self.config.settle_free_orders || order.total.is_zero() {
            let settlement = self.settle(order.id, "internal", "free-order", now)?;
            return Ok(self.order(settlement.order).unwrap_or(order));
        }
        Ok(order)
    }

    /// Reconcile an approved gateway callback. Safe under at-least-once
    /// delivery: a replay returns `already_paid` and writes only its
    /// audit row.
    pub fn settle(
        &self,
        order: OrderId,
        provider: &str,
        reference: &str,
        now: DateTime<Utc>,
    ) -> Result<Settlement, SettlementError> {
        let settlement = self.store.transaction(|tables| {
            settlement::settle(tables, order, provider, reference, now)
        })?;
        if !settlement.already_paid && !settlement.purchases.is_empty() {
            self.notifier
                .purchases_granted(settlement.user, &settlement.purchases);
        }
        Ok(settlement)
    }

    /// Record a denied gateway callback. The order stays pending.
    pub fn record_denied(
        &self,
        order: OrderId,
        provider: &str,
        reference: &str,
        now: DateTime<Utc>,
    ) -> Result<(), SettlementError> {
        self.store
            .transaction(|tables| settlement::record_denied(tables, order, provider, reference, now))
    }

    pub fn request_refund(
        &self,
        user: UserId,
        purchase: PurchaseId,
        now: DateTime<Utc>,
    ) -> Result<RefundRequest, RefundError> {
        self.store
            .transaction(|tables| refund::request_refund(tables, &self.config, user, purchase, now))
    }
}

/// Read surface. Accessors return cloned snapshots taken under the store
/// lock.
impl Engine {
    pub fn class(&self, id: ClassId) -> Option<Class> {
        self.store.read(|tables| tables.classes.get(&id).cloned())
    }

    pub fn purchase(&self, id: PurchaseId) -> Option<Purchase> {
        self.store.read(|tables| tables.purchases.get(&id).cloned())
    }

    /// All purchases, ordered by id.
    pub fn purchases(&self) -> Vec<Purchase> {
        let mut purchases: Vec<_> =
            self.store.read(|tables| tables.purchases.values().cloned().collect());
        purchases.sort_by_key(|p| p.id);
        purchases
    }

    pub fn reservation(&self, id: ReservationId) -> Option<Reservation> {
        self.store
            .read(|tables| tables.reservations.get(&id).cloned())
    }

    pub fn order(&self, id: OrderId) -> Option<Order> {
        self.store.read(|tables| tables.orders.get(&id).cloned())
    }

    /// Waitlist for one class in queue order.
    pub fn waitlist(&self, class: ClassId) -> Vec<WaitlistEntry> {
        self.store.read(|tables| waitlist::for_class(tables, class))
    }

    /// Audit rows for one order, in arrival order.
    pub fn payments(&self, order: OrderId) -> Vec<PaymentTransaction> {
        self.store.read(|tables| {
            tables
                .payment_log
                .iter()
                .filter(|t| t.order == order)
                .cloned()
                .collect()
        })
    }

    pub fn redemptions(&self) -> Vec<PromoRedemption> {
        self.store.read(|tables| tables.redemptions.clone())
    }

    pub fn discount_code(&self, code: &str) -> Option<DiscountCode> {
        self.store.read(|tables| tables.codes.get(code).cloned())
    }

    pub fn refund_request(&self, id: RefundId) -> Option<RefundRequest> {
        self.store.read(|tables| tables.refunds.get(&id).cloned())
    }
}

/// Private API
impl Engine {
    /// Small helper to log `apply` results
    fn log_result<T, E: std::fmt::Display>(op: &str, subject: u32, result: &Result<T, E>) {
        match result {
            Ok(_) => info!(id = subject, "{op} applied"),
            Err(e) => info!(id = subject, reason = %e, "{op} rejected"),
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
