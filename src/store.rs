//! Transactional persistence boundary.
//!
//! All core operations run as atomic transactions against [`LedgerStore`].
//! Concurrent callers are serialized here: the table lock is held for the
//! whole read-check-write of a transaction, and a failed transaction
//! restores the pre-transaction snapshot, so no partial state is ever
//! observable.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::model::{
    Class, ClassId, DiscountCode, Order, OrderId, Package, PackageId, PaymentTransaction,
    PromoRedemption, Purchase, PurchaseId, RefundId, RefundRequest, Reservation, ReservationId,
    WaitlistEntry, WaitlistId,
};

/// Sequential id assignment, one sequence per entity kind.
#[derive(Debug, Default, Clone)]
pub struct IdGen {
    class: u32,
    package: u32,
    purchase: u32,
    reservation: u32,
    waitlist: u32,
    order: u32,
    refund: u32,
}

impl IdGen {
    pub fn class(&mut self) -> ClassId {
        self.class += 1;
        self.class
    }

    pub fn package(&mut self) -> PackageId {
        self.package += 1;
        self.package
    }

    pub fn purchase(&mut self) -> PurchaseId {
        self.purchase += 1;
        self.purchase
    }

    pub fn reservation(&mut self) -> ReservationId {
        self.reservation += 1;
        self.reservation
    }

    pub fn waitlist(&mut self) -> WaitlistId {
        self.waitlist += 1;
        self.waitlist
    }

    pub fn order(&mut self) -> OrderId {
        self.order += 1;
        self.order
    }

    pub fn refund(&mut self) -> RefundId {
        self.refund += 1;
        self.refund
    }
}

/// All persisted tables. One instance lives behind the store's lock.
#[derive(Debug, Default, Clone)]
pub struct Tables {
    pub classes: HashMap<ClassId, Class>,
    pub packages: HashMap<PackageId, Package>,
    pub codes: HashMap<String, DiscountCode>,
    pub purchases: HashMap<PurchaseId, Purchase>,
    pub reservations: HashMap<ReservationId, Reservation>,
    pub waitlist: HashMap<WaitlistId, WaitlistEntry>,
    pub orders: HashMap<OrderId, Order>,
    /// Append-only gateway audit log.
    pub payment_log: Vec<PaymentTransaction>,
    /// Append-only redemption log.
    pub redemptions: Vec<PromoRedemption>,
    pub refunds: HashMap<RefundId, RefundRequest>,
    pub ids: IdGen,
}

/// The transactional store.
#[derive(Debug, Default)]
pub struct LedgerStore {
    inner: Mutex<Tables>,
}

impl LedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` as one atomic transaction. The lock is held for the whole
    /// closure, so the read-check-write inside is serializable; if `f`
    /// fails, the tables are restored to their pre-transaction snapshot.
    pub fn transaction<T, E>(
        &self,
        f: impl FnOnce(&mut Tables) -> Result<T, E>,
    ) -> Result<T, E> {
        let mut tables = self.lock();
        let snapshot = tables.clone();
        match f(&mut tables) {
            Ok(value) => Ok(value),
            Err(e) => {
                *tables = snapshot;
                Err(e)
            }
        }
    }

    /// Mutate the tables through an operation with no failure path.
    pub fn write<T>(&self, f: impl FnOnce(&mut Tables) -> T) -> T {
        f(&mut self.lock())
    }

    /// Read a consistent view of the tables.
    pub fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> T {
        f(&self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // Transactions leave the tables consistent on every exit path, so
        // a poisoned lock holds no torn writes.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
