//! Per-purchase credit accounting and the spend-order policy.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::model::{Purchase, PurchaseId, PurchaseStatus, UserId};
use crate::store::Tables;

use super::error::BookingError;

/// Ordering between two spendable purchases; the smaller one is drawn
/// from first.
pub type SpendOrder = fn(&Purchase, &Purchase) -> Ordering;

/// Spend the purchase closest to expiry first. This is the default: it
/// minimizes credits lost to expiry.
pub fn earliest_expiry(a: &Purchase, b: &Purchase) -> Ordering {
    a.expires_at.cmp(&b.expires_at).then(a.id.cmp(&b.id))
}

/// Spend the oldest grant first.
pub fn oldest_first(a: &Purchase, b: &Purchase) -> Ordering {
    a.granted_at.cmp(&b.granted_at).then(a.id.cmp(&b.id))
}

/// Select a purchase and draw one credit from it.
///
/// An explicit purchase must belong to the user and be spendable;
/// otherwise the spendable purchases are ordered by `order` and the
/// first is drawn. Depletion to zero flips the status.
pub(crate) fn draw(
    tables: &mut Tables,
    user: UserId,
    explicit: Option<PurchaseId>,
    order: SpendOrder,
    now: DateTime<Utc>,
) -> Result<PurchaseId, BookingError> {
    let purchase = match explicit {
        Some(id) => {
            let p = tables
                .purchases
                .get_mut(&id)
                .ok_or(BookingError::PurchaseUnavailable(id))?;
            if p.user != user || !p.spendable(now) {
                return Err(BookingError::PurchaseUnavailable(id));
            }
            p
        }
        None => tables
            .purchases
            .values_mut()
            .filter(|p| p.user == user && p.spendable(now))
            .min_by(|a, b| order(a, b))
            .ok_or(BookingError::NoCredit(user))?,
    };

    purchase.classes_remaining -= 1;
    if purchase.classes_remaining == 0 {
        purchase.status = PurchaseStatus::Depleted;
    }
    Ok(purchase.id)
}

/// Return one credit. A depleted purchase that is still unexpired comes
/// back to active; an expired purchase keeps the incremented counter but
/// stays expired.
pub(crate) fn give_back(tables: &mut Tables, id: PurchaseId, now: DateTime<Utc>) {
    if let Some(p) = tables.purchases.get_mut(&id) {
        p.classes_remaining += 1;
        if p.status == PurchaseStatus::Depleted && p.expires_at > now {
            p.status = PurchaseStatus::Active;
        }
    }
}

/// Mark overdue purchases expired. Returns how many were marked.
pub(crate) fn expire_due(tables: &mut Tables, now: DateTime<Utc>) -> u32 {
    let mut marked = 0;
    for p in tables.purchases.values_mut() {
        if p.status != PurchaseStatus::Expired && p.expires_at <= now {
            p.status = PurchaseStatus::Expired;
            marked += 1;
        }
    }
    marked
}
