//! Error types for booking operations.

use thiserror::Error;

use crate::model::{
    ClassId, OrderId, OrderStatus, PackageId, PurchaseId, RefundId, ReservationId, UserId,
    WaitlistId,
};

/// Top-level error returned by [`Engine::apply`](super::Engine::apply).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("booking failed: {0}")]
    Booking(#[from] BookingError),

    #[error("waitlist operation failed: {0}")]
    Waitlist(#[from] WaitlistError),

    #[error("checkout failed: {0}")]
    Checkout(#[from] CheckoutError),

    #[error("settlement failed: {0}")]
    Settlement(#[from] SettlementError),

    #[error("refund request failed: {0}")]
    Refund(#[from] RefundError),

    #[error("admin operation failed: {0}")]
    Admin(#[from] AdminError),
}

/// Error during reservation create/cancel and attendance marking.
#[derive(Debug, Error)]
pub enum BookingError {
    #[error("class {0} not found")]
    ClassNotFound(ClassId),

    #[error("class {0} is cancelled")]
    ClassCancelled(ClassId),

    #[error("class {0} is full")]
    ClassFull(ClassId),

    #[error("user {0} already has a reservation for class {1}")]
    DuplicateReservation(UserId, ClassId),

    #[error("user {0} has no spendable credits")]
    NoCredit(UserId),

    #[error("purchase {0} cannot supply a credit")]
    PurchaseUnavailable(PurchaseId),

    #[error("reservation {0} not found")]
    ReservationNotFound(ReservationId),

    #[error("reservation {0} does not belong to user {1}")]
    Forbidden(ReservationId, UserId),

    #[error("reservation {0} is already cancelled")]
    AlreadyCancelled(ReservationId),

    #[error("class starts within the {0}h cancellation cutoff")]
    TooLateToCancel(i64),

    #[error("reservation {0} is not confirmed")]
    NotConfirmed(ReservationId),
}

/// Error during waitlist join/leave.
#[derive(Debug, Error)]
pub enum WaitlistError {
    #[error("class {0} not found")]
    ClassNotFound(ClassId),

    #[error("class {0} is cancelled")]
    ClassCancelled(ClassId),

    #[error("user {0} is already waiting for class {1}")]
    AlreadyWaiting(UserId, ClassId),

    #[error("waitlist entry {0} not found")]
    EntryNotFound(WaitlistId),

    #[error("waitlist entry {0} does not belong to user {1}")]
    Forbidden(WaitlistId, UserId),
}

/// Error while building an order at checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("order has no items")]
    EmptyOrder,

    #[error("package {0} not found")]
    PackageNotFound(PackageId),

    #[error("unknown discount code '{0}'")]
    UnknownCode(String),

    #[error("discount code '{0}' has no uses left")]
    CodeExhausted(String),
}

/// Error while reconciling an order with the payment gateway.
#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    #[error("order {0} is not pending (status {1:?})")]
    InvalidState(OrderId, OrderStatus),

    #[error("package {0} referenced by order is missing")]
    PackageNotFound(PackageId),
}

/// Error during refund request handling.
#[derive(Debug, Error)]
pub enum RefundError {
    #[error("purchase {0} not found")]
    PurchaseNotFound(PurchaseId),

    #[error("purchase {0} does not belong to user {1}")]
    Forbidden(PurchaseId, UserId),

    #[error("purchase {0} already has an open refund request")]
    OpenRequest(PurchaseId),

    #[error("package {0} referenced by purchase is missing")]
    PackageNotFound(PackageId),

    #[error("refund request {0} not found")]
    RequestNotFound(RefundId),

    #[error("refund request {0} is not open")]
    NotOpen(RefundId),
}

/// Error on the admin/catalog surface.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("package {0} not found")]
    PackageNotFound(PackageId),

    #[error("unknown discount code '{0}'")]
    UnknownCode(String),

    #[error("discount code '{0}' already exists")]
    DuplicateCode(String),
}
