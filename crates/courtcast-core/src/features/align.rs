// Temporal alignment: move every source-table date forward so that stats
// known as of day D line up with outcomes recorded on day D + shift.

use chrono::Duration;

use crate::tables::{FrameError, RowKey, Table};

/// Return a copy of `table` with every key's date moved by `days` calendar
/// days. Metric columns are untouched.
///
/// Calendar arithmetic, not game days: a team idle on D + 1 simply has no
/// matching label and drops out at the later joins.
pub fn shift_days<K: RowKey>(table: &Table<K>, days: i64) -> Result<Table<K>, FrameError> {
    let offset = Duration::days(days);
    table.clone().map_keys(|key| key.with_date(key.date() + offset))
}

/// Shift every table by the same amount.
pub fn shift_all<K: RowKey>(tables: &[Table<K>], days: i64) -> Result<Vec<Table<K>>, FrameError> {
    tables.iter().map(|t| shift_days(t, days)).collect()
}
