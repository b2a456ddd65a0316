use crate::error::{ReconcileError, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;

pub fn month_label(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

/// `YYYY-MM` for a single month, `YYYY-MM:YYYY-MM` for a range.
pub fn period_label(first: NaiveDate, last: NaiveDate) -> String {
    let (start, end) = if first <= last {
        (first, last)
    } else {
        (last, first)
    };
    let start = month_label(start);
    let end = month_label(end);
    if start == end {
        start
    } else {
        format!("{}:{}", start, end)
    }
}

/// `part / whole` in percent rounded to two places; zero unless `whole` is positive.
pub fn percent_of(part: Decimal, whole: Decimal, context: &str) -> Result<Decimal> {
    if whole <= Decimal::ZERO {
        return Ok(Decimal::ZERO);
    }
    part.checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|scaled| scaled.checked_div(whole))
        .map(|ratio| ratio.round_dp(2))
        .ok_or_else(|| overflow(context))
}

pub fn overflow(context: &str) -> ReconcileError {
    ReconcileError::ArithmeticOverflow(context.to_string())
}

pub fn checked_add(a: Decimal, b: Decimal, context: &str) -> Result<Decimal> {
    a.checked_add(b).ok_or_else(|| overflow(context))
}

pub fn checked_sub(a: Decimal, b: Decimal, context: &str) -> Result<Decimal> {
    a.checked_sub(b).ok_or_else(|| overflow(context))
}

/// `*total += value`, failing instead of panicking when the sum leaves `Decimal`'s range.
pub fn accumulate(total: &mut Decimal, value: Decimal, context: &str) -> Result<()> {
    *total = checked_add(*total, value, context)?;
    Ok(())
}

/// Case-folded key with whitespace and underscores removed, used to compare free-text flags.
pub fn flag_key(value: &str) -> String {
    crate::schema::normalize_label(value)
}
