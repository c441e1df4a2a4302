//! Refund eligibility and proportional amounts.

use chrono::{DateTime, Duration, Utc};

use crate::model::{PurchaseId, RefundId, RefundRequest, RefundStatus, UserId};
use crate::store::Tables;
use crate::Money;

use super::error::RefundError;
use super::EngineConfig;

/// Open a refund request. The amount is the final price prorated by the
/// unused share of the purchase's credits; requests outside the refund
/// window are still created, with a zeroed amount, for manual review.
pub(crate) fn request_refund(
    tables: &mut Tables,
    config: &EngineConfig,
    user: UserId,
    purchase: PurchaseId,
    now: DateTime<Utc>,
) -> Result<RefundRequest, RefundError> {
    let row = tables
        .purchases
        .get(&purchase)
        .ok_or(RefundError::PurchaseNotFound(purchase))?;
    if row.user != user {
        return Err(RefundError::Forbidden(purchase, user));
    }
    if tables
        .refunds
        .values()
        .any(|r| r.purchase == purchase && r.status.is_open())
    {
        return Err(RefundError::OpenRequest(purchase));
    }

    let package = tables
        .packages
        .get(&row.package)
        .ok_or(RefundError::PackageNotFound(row.package))?;

    let eligible = now - row.granted_at <= Duration::hours(config.refund_window_hours);
    let amount = if eligible {
        row.final_price
            .prorate(row.classes_remaining.min(package.class_count), package.class_count)
    } else {
        Money::default()
    };

    let request = RefundRequest {
        id: tables.ids.refund(),
        purchase,
        user,
        amount,
        eligible,
        status: RefundStatus::Pending,
        requested_at: now,
    };
    tables.refunds.insert(request.id, request.clone());
    Ok(request)
}

/// Close an open request (admin surface). Closing is what allows a later
/// request for the same purchase.
pub(crate) fn resolve_refund(
    tables: &mut Tables,
    id: RefundId,
    approve: bool,
) -> Result<RefundRequest, RefundError> {
    let request = tables
        .refunds
        .get_mut(&id)
        .ok_or(RefundError::RequestNotFound(id))?;
    if !request.status.is_open() {
        return Err(RefundError::NotOpen(id));
    }
    request.status = if approve {
        RefundStatus::Refunded
    } else {
        RefundStatus::Rejected
    };
    Ok(request.clone())
}
