//! Order lifecycle: checkout, gateway reconciliation, credit grants.
//!
//! An order reaches paid at most once. Every gateway callback leaves an
//! append-only audit row; only the pending-to-paid transition and the
//! purchases it mints are guarded by the idempotency check.

use chrono::{DateTime, Duration, Utc};

use crate::model::{
    Order, OrderId, OrderItem, OrderStatus, Package, PackageId, PaymentTransaction,
    PromoRedemption, Purchase, PurchaseId, PurchaseStatus, TransactionOutcome, UserId,
};
use crate::store::Tables;
use crate::Money;

use super::error::{AdminError, CheckoutError, SettlementError};

/// Result of reconciling an approved gateway callback.
#[derive(Debug, Clone)]
pub struct Settlement {
    pub order: OrderId,
    pub user: UserId,
    /// True when the order had already reached paid and nothing but the
    /// audit row was written.
    pub already_paid: bool,
    pub purchases: Vec<PurchaseId>,
}

/// Build a pending order from catalog prices.
pub(crate) fn checkout(
    tables: &mut Tables,
    user: UserId,
    lines: &[(PackageId, u32)],
    code: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Order, CheckoutError> {
    let mut items = Vec::new();
    for &(package, quantity) in lines {
        if quantity == 0 {
            continue;
        }
        let row = tables
            .packages
            .get(&package)
            .ok_or(CheckoutError::PackageNotFound(package))?;
        items.push(OrderItem {
            package,
            quantity,
            unit_price: row.price,
        });
    }
    if items.is_empty() {
        return Err(CheckoutError::EmptyOrder);
    }

    let (discount_code, discount_percent) = match code {
        Some(code) => {
            let row = tables
                .codes
                .get(code)
                .ok_or_else(|| CheckoutError::UnknownCode(code.to_string()))?;
            if row.exhausted() {
                return Err(CheckoutError::CodeExhausted(code.to_string()));
            }
            (Some(code.to_string()), row.percent)
        }
        None => (None, 0),
    };

    let mut total = Money::default();
    for item in &items {
        total += item.unit_price * item.quantity;
    }
    total = total.percent_off(discount_percent);

    let order = Order {
        id: tables.ids.order(),
        user,
        items,
        discount_code,
        discount_percent,
        total,
        status: OrderStatus::Pending,
        created_at: now,
        paid_at: None,
    };
    tables.orders.insert(order.id, order.clone());
    Ok(order)
}

/// Reconcile an approved callback: the pending-to-paid transition plus
/// the purchases it grants, exactly once per order. Replays return
/// `already_paid` and add only their audit row.
pub(crate) fn settle(
    tables: &mut Tables,
    id: OrderId,
    provider: &str,
    reference: &str,
    now: DateTime<Utc>,
) -> Result<Settlement, SettlementError> {
    let order = tables
        .orders
        .get(&id)
        .ok_or(SettlementError::OrderNotFound(id))?;
    let buyer = order.user;
    let status = order.status;
    let items = order.items.clone();
    let code = order.discount_code.clone();
    let percent = order.discount_percent;

    // one audit row per callback, replay or not
    tables.payment_log.push(PaymentTransaction {
        order: id,
        provider: provider.to_string(),
        outcome: TransactionOutcome::Approved,
        reference: reference.to_string(),
        recorded_at: now,
    });

    match status {
        OrderStatus::Paid => {
            return Ok(Settlement {
                order: id,
                user: buyer,
                already_paid: true,
                purchases: Vec::new(),
            });
        }
        OrderStatus::Pending => {}
        other => return Err(SettlementError::InvalidState(id, other)),
    }

    let mut purchases = Vec::new();
    for item in &items {
        let package = tables
            .packages
            .get(&item.package)
            .cloned()
            .ok_or(SettlementError::PackageNotFound(item.package))?;
        for _ in 0..item.quantity {
            let minted = mint_purchase(tables, buyer, &package, percent, code.as_deref(), now);
            purchases.push(minted.id);
        }
    }

    if let Some(code) = &code {
        redeem_once(tables, buyer, code, now);
    }

    if let Some(order) = tables.orders.get_mut(&id) {
        order.status = OrderStatus::Paid;
        order.paid_at = Some(now);
    }

    Ok(Settlement {
        order: id,
        user: buyer,
        already_paid: false,
        purchases,
    })
}

/// Record a denied callback. The order keeps its status so the user can
/// retry payment.
pub(crate) fn record_denied(
    tables: &mut Tables,
    id: OrderId,
    provider: &str,
    reference: &str,
    now: DateTime<Utc>,
) -> Result<(), SettlementError> {
    if !tables.orders.contains_key(&id) {
        return Err(SettlementError::OrderNotFound(id));
    }
    tables.payment_log.push(PaymentTransaction {
        order: id,
        provider: provider.to_string(),
        outcome: TransactionOutcome::Denied,
        reference: reference.to_string(),
        recorded_at: now,
    });
    Ok(())
}

/// Abandon an unpaid order.
pub(crate) fn cancel_order(tables: &mut Tables, id: OrderId) -> Result<(), SettlementError> {
    let order = tables
        .orders
        .get_mut(&id)
        .ok_or(SettlementError::OrderNotFound(id))?;
    if order.status != OrderStatus::Pending {
        return Err(SettlementError::InvalidState(id, order.status));
    }
    order.status = OrderStatus::Cancelled;
    Ok(())
}

/// Admin direct grant: mint a purchase without an order. Same catalog
/// derivation as settlement, same credit invariants.
pub(crate) fn grant(
    tables: &mut Tables,
    user: UserId,
    package: PackageId,
    code: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Purchase, AdminError> {
    let package = tables
        .packages
        .get(&package)
        .cloned()
        .ok_or(AdminError::PackageNotFound(package))?;
    let percent = match code {
        Some(code) => {
            tables
                .codes
                .get(code)
                .ok_or_else(|| AdminError::UnknownCode(code.to_string()))?
                .percent
        }
        None => 0,
    };

    Ok(mint_purchase(tables, user, &package, percent, code, now))
}

fn mint_purchase(
    tables: &mut Tables,
    user: UserId,
    package: &Package,
    percent: u8,
    code: Option<&str>,
    now: DateTime<Utc>,
) -> Purchase {
    let purchase = Purchase {
        id: tables.ids.purchase(),
        user,
        package: package.id,
        classes_remaining: package.class_count,
        granted_at: now,
        expires_at: now + Duration::days(package.validity_days),
        status: PurchaseStatus::Active,
        original_price: package.price,
        final_price: package.price.percent_off(percent),
        discount_code: code.map(str::to_string),
    };
    tables.purchases.insert(purchase.id, purchase.clone());
    purchase
}

/// First redemption of a code by a user bumps the usage counter; later
/// settlements by the same user are not re-counted.
fn redeem_once(tables: &mut Tables, user: UserId, code: &str, now: DateTime<Utc>) {
    if tables
        .redemptions
        .iter()
        .any(|r| r.user == user && r.code == code)
    {
        return;
    }
    tables.redemptions.push(PromoRedemption {
        user,
        code: code.to_string(),
        redeemed_at: now,
    });
    if let Some(row) = tables.codes.get_mut(code) {
        row.uses += 1;
    }
}
