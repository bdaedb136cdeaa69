use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{EngineError, corrupt};

/// Money and hour figures are rounded to 2 decimal places at the point of
/// computation, half-up.
pub fn round2(d: Decimal) -> Decimal {
    d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Parse a decimal TEXT column.
pub fn dec_col(column: &str, raw: &str) -> Result<Decimal, EngineError> {
    Decimal::from_str(raw).map_err(|_| corrupt(column, raw))
}

pub fn opt_dec_col(column: &str, raw: Option<&str>) -> Result<Option<Decimal>, EngineError> {
    raw.map(|r| dec_col(column, r)).transpose()
}

/// Parse a status/enum TEXT column into its strum-backed type.
pub fn enum_col<T: FromStr>(column: &str, raw: &str) -> Result<T, EngineError> {
    T::from_str(raw).map_err(|_| corrupt(column, raw))
}

/// Clamp pagination inputs the same way everywhere: 1-based page,
/// at most 100 rows per page.
pub fn clamp_page(page: Option<u64>, per_page: Option<u64>) -> (u64, u64, u64) {
    let per_page = per_page.unwrap_or(10).clamp(1, 100);
    let page = page.unwrap_or(1).max(1);
    let offset = (page - 1) * per_page;
    (page, per_page, offset)
}
