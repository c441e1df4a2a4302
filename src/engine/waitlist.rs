//! Per-class waitlist with dense positional ordering.
//!
//! Waiting neither consumes nor reserves credits; promotion to a
//! reservation when a seat frees up is a manual step.

use chrono::{DateTime, Utc};

use crate::model::{ClassId, UserId, WaitlistEntry, WaitlistId};
use crate::store::Tables;

use super::error::WaitlistError;

pub(crate) fn join(
    tables: &mut Tables,
    user: UserId,
    class: ClassId,
    now: DateTime<Utc>,
) -> Result<WaitlistEntry, WaitlistError> {
    let row = tables
        .classes
        .get(&class)
        .ok_or(WaitlistError::ClassNotFound(class))?;
    if row.cancelled {
        return Err(WaitlistError::ClassCancelled(class));
    }
    if tables
        .waitlist
        .values()
        .any(|e| e.user == user && e.class == class)
    {
        return Err(WaitlistError::AlreadyWaiting(user, class));
    }

    let position = tables
        .waitlist
        .values()
        .filter(|e| e.class == class)
        .map(|e| e.position)
        .max()
        .unwrap_or(0)
        + 1;

    let entry = WaitlistEntry {
        id: tables.ids.waitlist(),
        user,
        class,
        position,
        joined_at: now,
    };
    tables.waitlist.insert(entry.id, entry.clone());
    Ok(entry)
}

/// Delete the entry and close the positional gap it leaves: every entry
/// of the same class with a greater position shifts down by one.
pub(crate) fn leave(
    tables: &mut Tables,
    user: UserId,
    id: WaitlistId,
) -> Result<(), WaitlistError> {
    let entry = tables
        .waitlist
        .get(&id)
        .ok_or(WaitlistError::EntryNotFound(id))?;
    if entry.user != user {
        return Err(WaitlistError::Forbidden(id, user));
    }

    let (class, position) = (entry.class, entry.position);
    tables.waitlist.remove(&id);
    for e in tables.waitlist.values_mut() {
        if e.class == class && e.position > position {
            e.position -= 1;
        }
    }
    Ok(())
}

/// Entries for one class in queue order.
pub(crate) fn for_class(tables: &Tables, class: ClassId) -> Vec<WaitlistEntry> {
    let mut entries: Vec<_> = tables
        .waitlist
        .values()
        .filter(|e| e.class == class)
        .cloned()
        .collect();
    entries.sort_by_key(|e| e.position);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Class;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap()
    }

    fn tables_with_class() -> Tables {
        let mut tables = Tables::default();
        let id = tables.ids.class();
        tables.classes.insert(
            id,
            Class {
                id,
                discipline: "spin".to_string(),
                instructor: "jo".to_string(),
                starts_at: t0(),
                duration_min: 45,
                max_capacity: 1,
                current_count: 1,
                cancelled: false,
            },
        );
        tables
    }

    fn positions(tables: &Tables, class: ClassId) -> Vec<(UserId, u32)> {
        for_class(tables, class)
            .into_iter()
            .map(|e| (e.user, e.position))
            .collect()
    }

    #[test]
    fn join_assigns_next_position() {
        let mut tables = tables_with_class();
        assert_eq!(join(&mut tables, 1, 1, t0()).unwrap().position, 1);
        assert_eq!(join(&mut tables, 2, 1, t0()).unwrap().position, 2);
        assert_eq!(join(&mut tables, 3, 1, t0()).unwrap().position, 3);
    }

    #[test]
    fn join_rejects_duplicates_and_missing_class() {
        let mut tables = tables_with_class();
        join(&mut tables, 1, 1, t0()).unwrap();
        assert!(matches!(
            join(&mut tables, 1, 1, t0()),
            Err(WaitlistError::AlreadyWaiting(1, 1))
        ));
        assert!(matches!(
            join(&mut tables, 1, 9, t0()),
            Err(WaitlistError::ClassNotFound(9))
        ));
    }

    #[test]
    fn leave_renumbers_without_gaps() {
        let mut tables = tables_with_class();
        join(&mut tables, 1, 1, t0()).unwrap();
        let middle = join(&mut tables, 2, 1, t0()).unwrap();
        join(&mut tables, 3, 1, t0()).unwrap();

        leave(&mut tables, 2, middle.id).unwrap();
        assert_eq!(positions(&tables, 1), vec![(1, 1), (3, 2)]);
    }

    #[test]
    fn leave_checks_ownership() {
        let mut tables = tables_with_class();
        let entry = join(&mut tables, 1, 1, t0()).unwrap();
        assert!(matches!(
            leave(&mut tables, 2, entry.id),
            Err(WaitlistError::Forbidden(_, 2))
        ));
        assert!(matches!(
            leave(&mut tables, 1, 99),
            Err(WaitlistError::EntryNotFound(99))
        ));
    }

    #[test]
    fn positions_stay_dense_under_churn() {
        let mut tables = tables_with_class();
        let a = join(&mut tables, 1, 1, t0()).unwrap();
        let _b = join(&mut tables, 2, 1, t0()).unwrap();
        let c = join(&mut tables, 3, 1, t0()).unwrap();
        leave(&mut tables, 1, a.id).unwrap();
        let _d = join(&mut tables, 4, 1, t0()).unwrap();
        leave(&mut tables, 3, c.id).unwrap();

        assert_eq!(positions(&tables, 1), vec![(2, 1), (4, 2)]);
    }
}
