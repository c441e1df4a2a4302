//! Seat capacity enforcement.

use crate::model::ClassId;
use crate::store::Tables;

use super::error::BookingError;

/// Check and claim one seat. Must run inside the same store transaction
/// as the reservation write, so the check-and-increment is one atomic
/// unit under concurrent requests for the last seat.
pub(crate) fn try_reserve_seat(tables: &mut Tables, class: ClassId) -> Result<(), BookingError> {
    let row = tables
        .classes
        .get_mut(&class)
        .ok_or(BookingError::ClassNotFound(class))?;

    if row.cancelled {
        return Err(BookingError::ClassCancelled(class));
    }
    if row.current_count >= row.max_capacity {
        return Err(BookingError::ClassFull(class));
    }

    row.current_count += 1;
    Ok(())
}

/// Give a seat back. The orchestrator calls this at most once per
/// confirmed reservation; the counter never goes negative.
pub(crate) fn release_seat(tables: &mut Tables, class: ClassId) {
    if let Some(row) = tables.classes.get_mut(&class) {
        row.current_count = row.current_count.saturating_sub(1);
    }
}
