//! Core domain types for the booking engine.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::Money;

/// User identifier, supplied by the auth layer.
pub type UserId = u32;

/// Scheduled class identifier.
pub type ClassId = u32;

/// Catalog package identifier.
pub type PackageId = u32;

/// Credit-grant identifier.
pub type PurchaseId = u32;

/// Reservation identifier.
pub type ReservationId = u32;

/// Waitlist entry identifier.
pub type WaitlistId = u32;

/// Order identifier.
pub type OrderId = u32;

/// Refund request identifier.
pub type RefundId = u32;

/// An operation representing the possible inputs of the engine.
#[derive(Debug, Clone)]
pub enum Op {
    /// Schedule a class.
    AddClass {
        discipline: String,
        instructor: String,
        starts_at: DateTime<Utc>,
        duration_min: u32,
        capacity: u32,
    },
    /// Register a credit bundle in the catalog.
    AddPackage {
        name: String,
        class_count: u32,
        validity_days: i64,
        price: Money,
    },
    /// Register a discount code.
    AddCode {
        code: String,
        percent: u8,
        max_uses: Option<u32>,
    },
    /// Create a purchase directly, bypassing checkout (admin surface).
    Grant {
        user: UserId,
        package: PackageId,
        code: Option<String>,
        at: DateTime<Utc>,
    },
    /// Reserve a seat in a class, drawing one credit.
    Reserve {
        user: UserId,
        class: ClassId,
        purchase: Option<PurchaseId>,
        at: DateTime<Utc>,
    },
    /// Cancel a reservation, returning the credit and the seat.
    Cancel {
        user: UserId,
        reservation: ReservationId,
        at: DateTime<Utc>,
    },
    /// Join a class waitlist.
    Join {
        user: UserId,
        class: ClassId,
        at: DateTime<Utc>,
    },
    /// Leave a class waitlist.
    Leave { user: UserId, entry: WaitlistId },
    /// Create an order for a package quantity.
    Checkout {
        user: UserId,
        package: PackageId,
        quantity: u32,
        code: Option<String>,
        at: DateTime<Utc>,
    },
    /// Gateway callback: payment approved.
    Approved {
        order: OrderId,
        provider: String,
        reference: String,
        at: DateTime<Utc>,
    },
    /// Gateway callback: payment denied.
    Denied {
        order: OrderId,
        provider: String,
        reference: String,
        at: DateTime<Utc>,
    },
    /// Mark a reservation attended.
    CheckIn { reservation: ReservationId },
    /// Mark a reservation a no-show.
    NoShow { reservation: ReservationId },
    /// Request a refund for a purchase.
    Refund {
        user: UserId,
        purchase: PurchaseId,
        at: DateTime<Utc>,
    },
    /// Mark overdue purchases expired.
    Expire { at: DateTime<Utc> },
}

/// A scheduled class session.
#[derive(Debug, Clone)]
pub struct Class {
    pub id: ClassId,
    pub discipline: String,
    pub instructor: String,
    pub starts_at: DateTime<Utc>,
    pub duration_min: u32,
    pub max_capacity: u32,
    /// Confirmed plus attended reservations. Maintained only by the
    /// capacity manager; never exceeds `max_capacity`.
    pub current_count: u32,
    pub cancelled: bool,
}

/// A purchasable credit bundle (catalog input).
#[derive(Debug, Clone)]
pub struct Package {
    pub id: PackageId,
    pub name: String,
    pub class_count: u32,
    pub validity_days: i64,
    pub price: Money,
}

/// A discount code with a running usage counter.
#[derive(Debug, Clone)]
pub struct DiscountCode {
    pub code: String,
    pub percent: u8,
    pub uses: u32,
    pub max_uses: Option<u32>,
}

impl DiscountCode {
    pub fn exhausted(&self) -> bool {
        self.max_uses.is_some_and(|max| self.uses >= max)
    }
}

/// Lifecycle of a purchase's credits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseStatus {
    Active,
    Depleted,
    Expired,
}

impl fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PurchaseStatus::Active => "active",
            PurchaseStatus::Depleted => "depleted",
            PurchaseStatus::Expired => "expired",
        })
    }
}

/// A credit grant belonging to a user, created at settlement or by an
/// admin grant.
#[derive(Debug, Clone)]
pub struct Purchase {
    pub id: PurchaseId,
    pub user: UserId,
    pub package: PackageId,
    pub classes_remaining: u32,
    pub granted_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: PurchaseStatus,
    pub original_price: Money,
    pub final_price: Money,
    pub discount_code: Option<String>,
}

impl Purchase {
    /// Whether this purchase can supply a credit at `now`.
    pub fn spendable(&self, now: DateTime<Utc>) -> bool {
        self.status == PurchaseStatus::Active
            && self.classes_remaining > 0
            && self.expires_at > now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationStatus {
    Confirmed,
    Cancelled,
    Attended,
    NoShow,
}

impl ReservationStatus {
    /// Statuses that occupy a seat.
    pub fn holds_seat(self) -> bool {
        matches!(
            self,
            ReservationStatus::Confirmed | ReservationStatus::Attended
        )
    }
}

/// A binding between one user, one class, and the purchase that supplied
/// the credit.
#[derive(Debug, Clone)]
pub struct Reservation {
    pub id: ReservationId,
    pub user: UserId,
    pub class: ClassId,
    pub purchase: PurchaseId,
    pub status: ReservationStatus,
    pub checked_in: bool,
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// One user waiting on one class. Positions within a class are dense,
/// ascending from 1, ordered by join time.
#[derive(Debug, Clone)]
pub struct WaitlistEntry {
    pub id: WaitlistId,
    pub user: UserId,
    pub class: ClassId,
    pub position: u32,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    Paid,
    Cancelled,
}

/// One package line of an order, priced at checkout time.
#[derive(Debug, Clone)]
pub struct OrderItem {
    pub package: PackageId,
    pub quantity: u32,
    pub unit_price: Money,
}

/// A checkout cart awaiting (or past) settlement.
#[derive(Debug, Clone)]
pub struct Order {
    pub id: OrderId,
    pub user: UserId,
    pub items: Vec<OrderItem>,
    pub discount_code: Option<String>,
    pub discount_percent: u8,
    pub total: Money,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionOutcome {
    Approved,
    Denied,
}

/// Immutable audit record of one gateway interaction. An order may
/// accumulate many of these; it reaches paid at most once.
#[derive(Debug, Clone)]
pub struct PaymentTransaction {
    pub order: OrderId,
    pub provider: String,
    pub outcome: TransactionOutcome,
    /// Opaque gateway reference, stored verbatim.
    pub reference: String,
    pub recorded_at: DateTime<Utc>,
}

/// Append-only record of a discount code redemption, unique per
/// (user, code).
#[derive(Debug, Clone)]
pub struct PromoRedemption {
    pub user: UserId,
    pub code: String,
    pub redeemed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundStatus {
    Pending,
    Processing,
    Refunded,
    Rejected,
}

impl RefundStatus {
    /// Open requests block a second request for the same purchase.
    pub fn is_open(self) -> bool {
        matches!(self, RefundStatus::Pending | RefundStatus::Processing)
    }
}

/// A refund request against one purchase.
#[derive(Debug, Clone)]
pub struct RefundRequest {
    pub id: RefundId,
    pub purchase: PurchaseId,
    pub user: UserId,
    pub amount: Money,
    pub eligible: bool,
    pub status: RefundStatus,
    pub requested_at: DateTime<Utc>,
}
