// Multi-table merges. Join policy per pairing:
//   per-player tables  -> full outer join, absent stats filled with 0
//   per-team tables    -> inner join, a key must appear in every table

use std::collections::BTreeSet;

use tracing::debug;

use crate::tables::{FrameError, PlayerKey, RowKey, Table, TeamKey};

/// Concatenate the column lists, rejecting any name that appears in more
/// than one table.
pub fn combined_columns<K: RowKey>(tables: &[Table<K>]) -> Result<Vec<String>, FrameError> {
    let mut columns: Vec<String> = Vec::new();
    let mut owner: Vec<&str> = Vec::new();
    for table in tables {
        for column in table.columns() {
            if let Some(pos) = columns.iter().position(|c| c == column) {
                return Err(FrameError::ColumnCollision {
                    column: column.clone(),
                    left: owner[pos].to_string(),
                    right: table.name().to_string(),
                });
            }
            columns.push(column.clone());
            owner.push(table.name());
        }
    }
    Ok(columns)
}

/// Full outer join on the whole key. Every key present in any input appears
/// exactly once; columns follow input order; a table without the key
/// contributes zeros.
pub fn outer_merge<K: RowKey>(name: &str, tables: &[Table<K>]) -> Result<Table<K>, FrameError> {
    let columns = combined_columns(tables)?;
    let keys: BTreeSet<&K> = tables.iter().flat_map(|t| t.keys()).collect();

    let mut merged = Table::new(name, columns)?;
    for key in keys {
        let mut values = Vec::with_capacity(merged.columns().len());
        for table in tables {
            match table.get(key) {
                Some(v) => values.extend_from_slice(v),
                None => values.extend(std::iter::repeat(0.0).take(table.columns().len())),
            }
        }
        merged.insert(key.clone(), values)?;
    }
    debug!("{name}: outer merge of {} tables -> {} rows", tables.len(), merged.len());
    Ok(merged)
}

/// Inner join on the whole key. Only keys present in every input survive.
pub fn inner_merge<K: RowKey>(name: &str, tables: &[Table<K>]) -> Result<Table<K>, FrameError> {
    let columns = combined_columns(tables)?;
    let mut merged = Table::new(name, columns)?;
    let Some((first, rest)) = tables.split_first() else {
        return Ok(merged);
    };

    for key in first.keys() {
        if !rest.iter().all(|t| t.contains_key(key)) {
            continue;
        }
        let mut values = Vec::with_capacity(merged.columns().len());
        for table in tables {
            if let Some(v) = table.get(key) {
                values.extend_from_slice(v);
            }
        }
        merged.insert(key.clone(), values)?;
    }
    debug!(
        "{name}: inner merge of {} tables, {} -> {} rows",
        tables.len(),
        first.len(),
        merged.len()
    );
    Ok(merged)
}

/// Per-player source tables merged on (Team, Player, Date).
pub fn outer_merge_players(tables: &[Table<PlayerKey>]) -> Result<Table<PlayerKey>, FrameError> {
    outer_merge("players", tables)
}

/// Opponent tables merged on (Opp_Team, Date). The team in each key is the
/// team whose opponents produced the stats, so it is looked up by the
/// player's opponent downstream.
pub fn inner_merge_opponents(tables: &[Table<TeamKey>]) -> Result<Table<TeamKey>, FrameError> {
    inner_merge("opponents", tables)
}
