use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use booking_eng::{Engine, Money, Op};
use chrono::{DateTime, Duration, TimeZone, Utc};

const NUM_CLASSES: u32 = 8;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap()
}

/// Engine pre-seeded with one package and a handful of roomy classes
/// starting far outside the cancellation cutoff.
fn seeded_engine() -> Engine {
    let engine = Engine::new();
    engine.add_package("bundle", 10, 365, Money::from_float(100.0));
    for _ in 0..NUM_CLASSES {
        engine.add_class(
            "strength",
            "sam",
            t0() + Duration::hours(1_000),
            60,
            u32::MAX / 2,
        );
    }
    engine
}

/// Generates valid operation sequences for benchmarking.
///
/// Pattern per user (repeating):
/// 1. Grant a 10-credit bundle
/// 2. Reserve a class
/// 3. Cancel that reservation
///
/// Cancelling each cycle's reservation keeps the duplicate-reservation
/// guard satisfied when the user books the same class again.
pub struct OpGenerator {
    num_users: u32,
    ops_per_user: u32,
    current_user: u32,
    current_step: u32,
    next_reservation: u32,
}

impl OpGenerator {
    pub fn new(num_users: u32, ops_per_user: u32) -> Self {
        Self {
            num_users,
            ops_per_user,
            current_user: 1,
            current_step: 0,
            next_reservation: 0,
        }
    }

    /// Total number of operations this generator will produce
    pub fn total_ops(&self) -> u64 {
        u64::from(self.num_users) * u64::from(self.ops_per_user)
    }
}

impl Iterator for OpGenerator {
    type Item = Op;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_user > self.num_users {
            return None;
        }

        let op = match self.current_step % 3 {
            0 => Op::Grant {
                user: self.current_user,
                package: 1,
                code: None,
                at: t0(),
            },
            1 => {
                // reservation ids are assigned in apply order
                self.next_reservation += 1;
                Op::Reserve {
                    user: self.current_user,
                    class: self.current_user % NUM_CLASSES + 1,
                    purchase: None,
                    at: t0(),
                }
            }
            _ => Op::Cancel {
                user: self.current_user,
                reservation: self.next_reservation,
                at: t0(),
            },
        };

        self.current_step += 1;
        if self.current_step >= self.ops_per_user {
            self.current_step = 0;
            self.current_user += 1;
        }

        Some(op)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let total = self.total_ops() as usize;
        let done = (u64::from(self.current_user.saturating_sub(1)) * u64::from(self.ops_per_user)
            + u64::from(self.current_step)) as usize;
        let remaining = total.saturating_sub(done);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for OpGenerator {}

/// Checkout-then-approve pairs, one order per pair.
pub struct CheckoutGenerator {
    num_users: u32,
    orders_per_user: u32,
    current_user: u32,
    current_step: u32,
    next_order: u32,
}

impl CheckoutGenerator {
    pub fn new(num_users: u32, orders_per_user: u32) -> Self {
        Self {
            num_users,
            orders_per_user,
            current_user: 1,
            current_step: 0,
            next_order: 0,
        }
    }
}

impl Iterator for CheckoutGenerator {
    type Item = Op;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_user > self.num_users {
            return None;
        }

        let op = if self.current_step % 2 == 0 {
            self.next_order += 1;
            Op::Checkout {
                user: self.current_user,
                package: 1,
                quantity: 2,
                code: None,
                at: t0(),
            }
        } else {
            Op::Approved {
                order: self.next_order,
                provider: "bench".to_string(),
                reference: String::new(),
                at: t0(),
            }
        };

        self.current_step += 1;
        if self.current_step >= self.orders_per_user * 2 {
            self.current_step = 0;
            self.current_user += 1;
        }

        Some(op)
    }
}

fn bench_booking_cycles(c: &mut Criterion) {
    let mut group = c.benchmark_group("booking_cycles");

    for (users, ops_per) in [(100u32, 30u32), (1_000, 30), (10, 3_000)] {
        let label = format!("{}u_{}ops", users, ops_per);
        group.bench_with_input(
            BenchmarkId::from_parameter(&label),
            &(users, ops_per),
            |b, &(users, ops_per)| {
                b.iter(|| {
                    let engine = seeded_engine();
                    for op in OpGenerator::new(users, ops_per) {
                        let _ = black_box(engine.apply(op));
                    }
                    engine
                });
            },
        );
    }

    group.finish();
}

fn bench_settlements(c: &mut Criterion) {
    let mut group = c.benchmark_group("settlements");

    for (users, orders_per) in [(100u32, 10u32), (1_000, 10)] {
        let label = format!("{}u_{}orders", users, orders_per);
        group.bench_with_input(
            BenchmarkId::from_parameter(&label),
            &(users, orders_per),
            |b, &(users, orders_per)| {
                b.iter(|| {
                    let engine = seeded_engine();
                    for op in CheckoutGenerator::new(users, orders_per) {
                        let _ = black_box(engine.apply(op));
                    }
                    engine
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_booking_cycles, bench_settlements);
criterion_main!(benches);
