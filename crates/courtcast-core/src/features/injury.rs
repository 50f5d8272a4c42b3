// Injury block: the summed profile of each team's unavailable players,
// attached to every player row of that team and day.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::tables::{
    Boxscore, FrameError, InjuryRecord, PlayerKey, Table, TeamKey, SENTINEL_TEXT,
};

/// Suffix that marks the injury-block columns.
pub const UNKNOWN_SUFFIX: &str = "_unknown";

/// Inner-join `players` with `injuries` on (Team, Player, Date), then sum
/// every column per (Date, Team). Output columns carry the `_unknown`
/// suffix. Teams with no injured player on a day get no row.
///
/// Repeated injury records for one key count once.
pub fn aggregate(
    players: &Table<PlayerKey>,
    injuries: &[InjuryRecord],
) -> Result<Table<TeamKey>, FrameError> {
    let injured: BTreeSet<PlayerKey> = injuries.iter().map(InjuryRecord::key).collect();
    let width = players.columns().len();

    let mut sums: BTreeMap<TeamKey, Vec<f64>> = BTreeMap::new();
    for key in &injured {
        let Some(values) = players.get(key) else {
            continue;
        };
        let acc = sums
            .entry(key.team_key())
            .or_insert_with(|| vec![0.0; width]);
        for (a, v) in acc.iter_mut().zip(values) {
            *a += v;
        }
    }

    let columns = players
        .columns()
        .iter()
        .map(|c| format!("{c}{UNKNOWN_SUFFIX}"))
        .collect();
    let mut out = Table::new("injuries", columns)?;
    for (key, values) in sums {
        out.insert(key, values)?;
    }
    debug!(
        "injury block: {} records -> {} team-days",
        injured.len(),
        out.len()
    );
    Ok(out)
}

/// Left-join the injury block onto every player row by (Date, Team). Rows
/// are never dropped; team-days without injuries get zeros.
pub fn attach(
    players: &Table<PlayerKey>,
    block: &Table<TeamKey>,
) -> Result<Table<PlayerKey>, FrameError> {
    let mut columns = players.columns().to_vec();
    for column in block.columns() {
        if columns.contains(column) {
            return Err(FrameError::ColumnCollision {
                column: column.clone(),
                left: players.name().to_string(),
                right: block.name().to_string(),
            });
        }
        columns.push(column.clone());
    }

    let zeros = vec![0.0; block.columns().len()];
    let mut out = Table::new(players.name(), columns)?;
    for (key, values) in players.rows() {
        let extra = block.get(&key.team_key()).unwrap_or(zeros.as_slice());
        let mut row = Vec::with_capacity(values.len() + extra.len());
        row.extend_from_slice(values);
        row.extend_from_slice(extra);
        out.insert(key.clone(), row)?;
    }
    Ok(out)
}

/// Aggregate and attach in one step.
pub fn apply(
    players: &Table<PlayerKey>,
    injuries: &[InjuryRecord],
) -> Result<Table<PlayerKey>, FrameError> {
    let block = aggregate(players, injuries)?;
    attach(players, &block)
}

/// Roster-minus-participants injuries: for every (Date, Team) with a real
/// boxscore, each rostered player of that team without a boxscore row that
/// day is recorded as out.
pub fn derive_from_boxscores(
    roster: &BTreeSet<(String, String)>,
    boxscores: &[Boxscore],
) -> Vec<InjuryRecord> {
    let mut played: BTreeMap<TeamKey, BTreeSet<&str>> = BTreeMap::new();
    for b in boxscores {
        if b.is_sentinel() {
            continue;
        }
        played
            .entry(TeamKey::new(b.date, b.team.clone()))
            .or_default()
            .insert(b.player.as_str());
    }

    let mut by_team: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (team, player) in roster {
        if team == SENTINEL_TEXT || player == SENTINEL_TEXT {
            continue;
        }
        by_team.entry(team.as_str()).or_default().push(player.as_str());
    }

    let mut out = Vec::new();
    for (key, participants) in &played {
        let Some(members) = by_team.get(key.team.as_str()) else {
            continue;
        };
        for player in members {
            if !participants.contains(player) {
                out.push(InjuryRecord {
                    date: key.date,
                    team: key.team.clone(),
                    player: player.to_string(),
                });
            }
        }
    }
    out
}
