//! Reservation orchestration: credits and capacity move together.

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::model::{
    ClassId, PurchaseId, Reservation, ReservationId, ReservationStatus, UserId,
};
use crate::store::Tables;

use super::error::BookingError;
use super::{capacity, credits, EngineConfig};

/// Create a confirmed reservation: claim the seat, draw the credit, and
/// write the reservation row, all in the caller's transaction.
pub(crate) fn create_reservation(
    tables: &mut Tables,
    config: &EngineConfig,
    user: UserId,
    class: ClassId,
    explicit: Option<PurchaseId>,
    now: DateTime<Utc>,
) -> Result<Reservation, BookingError> {
    capacity::try_reserve_seat(tables, class)?;

    if tables
        .reservations
        .values()
        .any(|r| r.user == user && r.class == class && r.status != ReservationStatus::Cancelled)
    {
        return Err(BookingError::DuplicateReservation(user, class));
    }

    let purchase = credits::draw(tables, user, explicit, config.spend_order, now)?;

    let reservation = Reservation {
        id: tables.ids.reservation(),
        user,
        class,
        purchase,
        status: ReservationStatus::Confirmed,
        checked_in: false,
        cancelled_at: None,
    };
    tables
        .reservations
        .insert(reservation.id, reservation.clone());
    Ok(reservation)
}

/// Cancel a confirmed reservation: mark it cancelled, return the credit,
/// release the seat. Rejected inside the cutoff window before class
/// start.
pub(crate) fn cancel_reservation(
    tables: &mut Tables,
    config: &EngineConfig,
    user: UserId,
    id: ReservationId,
    now: DateTime<Utc>,
) -> Result<Reservation, BookingError> {
    let reservation = tables
        .reservations
        .get(&id)
        .ok_or(BookingError::ReservationNotFound(id))?;
    if reservation.user != user {
        return Err(BookingError::Forbidden(id, user));
    }
    match reservation.status {
        ReservationStatus::Confirmed => {}
        ReservationStatus::Cancelled => return Err(BookingError::AlreadyCancelled(id)),
        _ => return Err(BookingError::NotConfirmed(id)),
    }

    let class = reservation.class;
    let purchase = reservation.purchase;
    if let Some(row) = tables.classes.get(&class) {
        if row.starts_at - now < Duration::hours(config.cancel_cutoff_hours) {
            return Err(BookingError::TooLateToCancel(config.cancel_cutoff_hours));
        }
    }

    let reservation = tables
        .reservations
        .get_mut(&id)
        .ok_or(BookingError::ReservationNotFound(id))?;
    reservation.status = ReservationStatus::Cancelled;
    reservation.cancelled_at = Some(now);
    let cancelled = reservation.clone();

    credits::give_back(tables, purchase, now);
    capacity::release_seat(tables, class);

    let waiting = tables.waitlist.values().filter(|e| e.class == class).count();
    if waiting > 0 {
        info!(class, waiting, "seat freed with users waiting; promotion is manual");
    }

    Ok(cancelled)
}

/// Confirmed -> attended. The seat stays counted.
pub(crate) fn check_in(tables: &mut Tables, id: ReservationId) -> Result<(), BookingError> {
    let reservation = tables
        .reservations
        .get_mut(&id)
        .ok_or(BookingError::ReservationNotFound(id))?;
    if reservation.status != ReservationStatus::Confirmed {
        return Err(BookingError::NotConfirmed(id));
    }
    reservation.status = ReservationStatus::Attended;
    reservation.checked_in = true;
    Ok(())
}

/// Confirmed -> no-show. A no-show stops counting toward the class; the
/// consumed credit is not returned.
pub(crate) fn mark_no_show(tables: &mut Tables, id: ReservationId) -> Result<(), BookingError> {
    let reservation = tables
        .reservations
        .get_mut(&id)
        .ok_or(BookingError::ReservationNotFound(id))?;
    if reservation.status != ReservationStatus::Confirmed {
        return Err(BookingError::NotConfirmed(id));
    }
    reservation.status = ReservationStatus::NoShow;
    let class = reservation.class;
    capacity::release_seat(tables, class);
    Ok(())
}
