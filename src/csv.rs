use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::model::{Op, Purchase};
use crate::Money;

/// Errors that can occur when parsing csv rows
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized operation '{op}'")]
    UnrecognizedOp { line: usize, op: String },

    #[error("line {line}: {op} missing {field}")]
    MissingField {
        line: usize,
        op: String,
        field: &'static str,
    },

    #[error("line {line}: bad timestamp '{value}': {source}")]
    BadTimestamp {
        line: usize,
        value: String,
        source: chrono::ParseError,
    },
}

#[derive(Debug, Deserialize)]
struct InputRow {
    op: String,
    user: Option<u32>,
    /// Class, reservation, waitlist entry, order, or purchase id,
    /// depending on the operation.
    target: Option<u32>,
    purchase: Option<u32>,
    package: Option<u32>,
    qty: Option<u32>,
    code: Option<String>,
    percent: Option<u8>,
    name: Option<String>,
    classes: Option<u32>,
    validity: Option<i64>,
    price: Option<f64>,
    capacity: Option<u32>,
    discipline: Option<String>,
    instructor: Option<String>,
    duration: Option<u32>,
    provider: Option<String>,
    reference: Option<String>,
    at: Option<String>,
}

#[derive(Debug, Serialize)]
struct OutputRow {
    purchase: u32,
    user: u32,
    package: u32,
    remaining: u32,
    status: String,
}

/// Read operations from a csv file
pub fn read_ops(path: impl AsRef<Path>) -> impl Iterator<Item = Result<Op, CsvError>> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .expect("failed to open csv file");

    reader
        .into_deserialize::<InputRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            row_to_op(line, row)
        })
}

fn row_to_op(line: usize, row: InputRow) -> Result<Op, CsvError> {
    let op = row.op.clone();
    let missing = |field: &'static str| CsvError::MissingField {
        line,
        op: op.clone(),
        field,
    };
    let require_u32 =
        |value: Option<u32>, field: &'static str| value.ok_or_else(|| missing(field));
    let at = match &row.at {
        Some(value) => Some(
            DateTime::parse_from_rfc3339(value)
                .map(|parsed| parsed.with_timezone(&Utc))
                .map_err(|source| CsvError::BadTimestamp {
                    line,
                    value: value.clone(),
                    source,
                })?,
        ),
        None => None,
    };
    // operations without a timestamp column run at wall-clock time
    let at_or_now = at.unwrap_or_else(Utc::now);

    match row.op.as_str() {
        "add-class" => Ok(Op::AddClass {
            discipline: row.discipline.unwrap_or_default(),
            instructor: row.instructor.unwrap_or_default(),
            starts_at: at.ok_or_else(|| missing("at"))?,
            duration_min: row.duration.unwrap_or(60),
            capacity: require_u32(row.capacity, "capacity")?,
        }),
        "add-package" => Ok(Op::AddPackage {
            name: row.name.ok_or_else(|| missing("name"))?,
            class_count: require_u32(row.classes, "classes")?,
            validity_days: row.validity.ok_or_else(|| missing("validity"))?,
            price: Money::from_float(row.price.ok_or_else(|| missing("price"))?),
        }),
        "add-code" => Ok(Op::AddCode {
            code: row.code.ok_or_else(|| missing("code"))?,
            percent: row.percent.ok_or_else(|| missing("percent"))?,
            max_uses: None,
        }),
        "grant" => Ok(Op::Grant {
            user: require_u32(row.user, "user")?,
            package: require_u32(row.package, "package")?,
            code: row.code,
            at: at_or_now,
        }),
        "reserve" => Ok(Op::Reserve {
            user: require_u32(row.user, "user")?,
            class: require_u32(row.target, "target")?,
            purchase: row.purchase,
            at: at_or_now,
        }),
        "cancel" => Ok(Op::Cancel {
            user: require_u32(row.user, "user")?,
            reservation: require_u32(row.target, "target")?,
            at: at_or_now,
        }),
        "join" => Ok(Op::Join {
            user: require_u32(row.user, "user")?,
            class: require_u32(row.target, "target")?,
            at: at_or_now,
        }),
        "leave" => Ok(Op::Leave {
            user: require_u32(row.user, "user")?,
            entry: require_u32(row.target, "target")?,
        }),
        "checkout" => Ok(Op::Checkout {
            user: require_u32(row.user, "user")?,
            package: require_u32(row.package, "package")?,
            quantity: row.qty.unwrap_or(1),
            code: row.code,
            at: at_or_now,
        }),
        "approved" => Ok(Op::Approved {
            order: require_u32(row.target, "target")?,
            provider: row.provider.unwrap_or_else(|| "gateway".to_string()),
            reference: row.reference.unwrap_or_default(),
            at: at_or_now,
        }),
        "denied" => Ok(Op::Denied {
            order: require_u32(row.target, "target")?,
            provider: row.provider.unwrap_or_else(|| "gateway".to_string()),
            reference: row.reference.unwrap_or_default(),
            at: at_or_now,
        }),
        "check-in" => Ok(Op::CheckIn {
            reservation: require_u32(row.target, "target")?,
        }),
        "no-show" => Ok(Op::NoShow {
            reservation: require_u32(row.target, "target")?,
        }),
        "refund" => Ok(Op::Refund {
            user: require_u32(row.user, "user")?,
            purchase: require_u32(row.target, "target")?,
            at: at_or_now,
        }),
        "expire" => Ok(Op::Expire { at: at_or_now }),
        other => Err(CsvError::UnrecognizedOp {
            line,
            op: other.to_string(),
        }),
    }
}

/// write the purchase ledger to stdout in csv format
pub fn write_purchases(purchases: impl IntoIterator<Item = Purchase>) {
    let stdout = io::stdout();
    let mut writer = csv::Writer::from_writer(stdout.lock());

    for purchase in purchases {
        let row = OutputRow {
            purchase: purchase.id,
            user: purchase.user,
            package: purchase.package,
            remaining: purchase.classes_remaining,
            status: purchase.status.to_string(),
        };
        writer.serialize(&row).expect("failed to write csv row");
    }

    writer.flush().expect("failed to flush csv writer");
}
