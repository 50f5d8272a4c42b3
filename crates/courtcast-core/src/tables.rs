// Typed rows and the keyed table container shared by the store, the ingest
// clients and the feature pipeline.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FrameError {
    #[error("duplicate key {key} in table `{table}`")]
    DuplicateKey { table: String, key: String },

    #[error("column `{column}` appears in both `{left}` and `{right}`")]
    ColumnCollision {
        column: String,
        left: String,
        right: String,
    },

    #[error("table `{table}` has no column `{column}`")]
    MissingColumn { table: String, column: String },

    #[error("row in `{table}` has {got} values, expected {expected}")]
    WidthMismatch {
        table: String,
        got: usize,
        expected: usize,
    },

    #[error("frame `{frame}` has no rows")]
    EmptyFrame { frame: String },
}

// ---------------------------------------------------------------------------
// Natural keys
// ---------------------------------------------------------------------------

/// A key with a calendar date and a team. Implemented by the per-player and
/// per-team keys so the aligner and the injury aggregator work on either.
pub trait RowKey: Ord + Clone + fmt::Display {
    fn date(&self) -> NaiveDate;
    fn with_date(&self, date: NaiveDate) -> Self;
    fn team(&self) -> &str;
}

/// (Date, Team, Player): the key of every per-player table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerKey {
    pub date: NaiveDate,
    pub team: String,
    pub player: String,
}

impl PlayerKey {
    pub fn new(date: NaiveDate, team: impl Into<String>, player: impl Into<String>) -> Self {
        Self {
            date,
            team: team.into(),
            player: player.into(),
        }
    }

    /// The (Date, Team) part of the key.
    pub fn team_key(&self) -> TeamKey {
        TeamKey::new(self.date, self.team.clone())
    }
}

impl RowKey for PlayerKey {
    fn date(&self) -> NaiveDate {
        self.date
    }

    fn with_date(&self, date: NaiveDate) -> Self {
        Self {
            date,
            ..self.clone()
        }
    }

    fn team(&self) -> &str {
        &self.team
    }
}

impl fmt::Display for PlayerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.date, self.team, self.player)
    }
}

/// (Date, Team): the key of every per-team (opponent) table and of the
/// injury aggregate.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TeamKey {
    pub date: NaiveDate,
    pub team: String,
}

impl TeamKey {
    pub fn new(date: NaiveDate, team: impl Into<String>) -> Self {
        Self {
            date,
            team: team.into(),
        }
    }
}

impl RowKey for TeamKey {
    fn date(&self) -> NaiveDate {
        self.date
    }

    fn with_date(&self, date: NaiveDate) -> Self {
        Self {
            date,
            team: self.team.clone(),
        }
    }

    fn team(&self) -> &str {
        &self.team
    }
}

impl fmt::Display for TeamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.date, self.team)
    }
}

// ---------------------------------------------------------------------------
// Table container
// ---------------------------------------------------------------------------

/// A named table of numeric metric columns keyed by a unique natural key.
///
/// Column order is significant: it is the order columns appear in merged
/// frames, in CSV snapshots and, eventually, in the model's feature matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Table<K> {
    name: String,
    columns: Vec<String>,
    rows: BTreeMap<K, Vec<f64>>,
}

impl<K: RowKey> Table<K> {
    /// Create an empty table. Fails if `columns` contains a name twice.
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Result<Self, FrameError> {
        let name = name.into();
        for (i, column) in columns.iter().enumerate() {
            if columns[..i].contains(column) {
                return Err(FrameError::ColumnCollision {
                    column: column.clone(),
                    left: name.clone(),
                    right: name.clone(),
                });
            }
        }
        Ok(Self {
            name,
            columns,
            rows: BTreeMap::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a column, if present.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Index of a column, or `MissingColumn`.
    pub fn require_column(&self, column: &str) -> Result<usize, FrameError> {
        self.column_index(column)
            .ok_or_else(|| FrameError::MissingColumn {
                table: self.name.clone(),
                column: column.to_string(),
            })
    }

    /// Insert one row. The key must be new and `values` must be as wide as
    /// the column list.
    pub fn insert(&mut self, key: K, values: Vec<f64>) -> Result<(), FrameError> {
        if values.len() != self.columns.len() {
            return Err(FrameError::WidthMismatch {
                table: self.name.clone(),
                got: values.len(),
                expected: self.columns.len(),
            });
        }
        if self.rows.contains_key(&key) {
            return Err(FrameError::DuplicateKey {
                table: self.name.clone(),
                key: key.to_string(),
            });
        }
        self.rows.insert(key, values);
        Ok(())
    }

    pub fn get(&self, key: &K) -> Option<&[f64]> {
        self.rows.get(key).map(Vec::as_slice)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.rows.contains_key(key)
    }

    /// Single cell lookup by key and column name.
    pub fn value(&self, key: &K, column: &str) -> Option<f64> {
        let idx = self.column_index(column)?;
        self.rows.get(key).map(|values| values[idx])
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.rows.keys()
    }

    /// Rows in key order.
    pub fn rows(&self) -> impl Iterator<Item = (&K, &[f64])> {
        self.rows.iter().map(|(k, v)| (k, v.as_slice()))
    }

    pub fn into_parts(self) -> (String, Vec<String>, BTreeMap<K, Vec<f64>>) {
        (self.name, self.columns, self.rows)
    }

    /// Keep only the rows for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&K, &[f64]) -> bool) {
        self.rows.retain(|k, v| keep(k, v));
    }

    /// Rebuild the table with every key passed through `f`. Fails if two
    /// keys collide after the mapping.
    pub fn map_keys(self, mut f: impl FnMut(&K) -> K) -> Result<Self, FrameError> {
        let mut out = Table::new(self.name, self.columns)?;
        for (key, values) in self.rows {
            out.insert(f(&key), values)?;
        }
        Ok(out)
    }

    /// Distinct dates present in the table, ascending.
    pub fn dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self.rows.keys().map(|k| k.date()).collect();
        dates.sort_unstable();
        dates.dedup();
        dates
    }
}

// ---------------------------------------------------------------------------
// Source table schemas
// ---------------------------------------------------------------------------

/// Whether a source table is keyed per player or per team.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Player,
    Opponent,
}

/// One scraped source table: its store name, key shape and metric columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSpec {
    pub table: &'static str,
    pub kind: SourceKind,
    pub columns: &'static [&'static str],
}

impl SourceSpec {
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.to_string()).collect()
    }
}

pub const PLAYER_TRADITIONAL: SourceSpec = SourceSpec {
    table: "player_traditional",
    kind: SourceKind::Player,
    columns: &[
        "AGE", "GP", "W", "L", "W_PCT", "MIN", "FGM", "FGA", "FG_PCT", "3PM", "3PA", "3P_PCT",
        "FTM", "FTA", "FT_PCT", "OREB", "DREB", "REB", "AST", "TOV", "STL", "BLK", "BLKA", "PF",
        "PFD", "PPG", "PLUS_MINUS", "NBA_FANTASY_PPG", "DD2", "TD3",
    ],
};

pub const PLAYER_MISC: SourceSpec = SourceSpec {
    table: "player_misc",
    kind: SourceKind::Player,
    columns: &["PTS_OFF_TOV", "PTS_2ND_CHANCE", "PTS_FB", "PTS_PAINT"],
};

pub const PLAYER_SHOT_LOCATIONS: SourceSpec = SourceSpec {
    table: "player_shot_locations",
    kind: SourceKind::Player,
    columns: &[
        "RA_FGM", "RA_FGA", "Paint_FGM", "Paint_FGA", "Mid_FGM", "Mid_FGA", "LC3_FGM", "LC3_FGA",
        "RC3_FGM", "RC3_FGA", "AB3_FGM", "AB3_FGA", "C3_FGM", "C3_FGA",
    ],
};

pub const PLAYER_PLAYTYPE: SourceSpec = SourceSpec {
    table: "player_playtype",
    kind: SourceKind::Player,
    columns: &[
        "2FGM_cns", "2FGA_cns", "3PM_cns", "3PA_cns", "2FGM_pullup", "2FGA_pullup", "3PM_pullup",
        "3PA_pullup", "2FGM_less10", "2FGA_less10",
    ],
};

pub const OPP_TRADITIONAL: SourceSpec = SourceSpec {
    table: "opp_traditional",
    kind: SourceKind::Opponent,
    columns: &[
        "OPP_FGM", "OPP_FGA", "OPP_FG_PCT", "OPP_3PM", "OPP_3PA", "OPP_3P_PCT", "OPP_FTM",
        "OPP_FTA", "OPP_FT_PCT", "OPP_OREB", "OPP_DREB", "OPP_REB", "OPP_AST", "OPP_TOV",
        "OPP_STL", "OPP_BLK", "OPP_BLKA", "OPP_PF", "OPP_PFD", "OPP_PTS", "OPP_PLUS_MINUS",
    ],
};

pub const OPP_MISC: SourceSpec = SourceSpec {
    table: "opp_misc",
    kind: SourceKind::Opponent,
    columns: &["OPP_PTS_OFF_TOV", "OPP_PTS_2ND_CHANCE", "OPP_PTS_FB", "OPP_PTS_PAINT"],
};

pub const OPP_SHOT_LOCATIONS: SourceSpec = SourceSpec {
    table: "opp_shot_locations",
    kind: SourceKind::Opponent,
    columns: &[
        "Opp_RA_FGM", "Opp_RA_FGA", "Opp_Paint_FGM", "Opp_Paint_FGA", "Opp_Mid_FGM",
        "Opp_Mid_FGA", "Opp_LC3_FGM", "Opp_LC3_FGA", "Opp_RC3_FGM", "Opp_RC3_FGA", "Opp_AB3_FGM",
        "Opp_AB3_FGA", "Opp_C3_FGM", "Opp_C3_FGA",
    ],
};

pub const OPP_PLAYTYPE: SourceSpec = SourceSpec {
    table: "opp_playtype",
    kind: SourceKind::Opponent,
    columns: &[
        "Opp_2FGM_cns", "Opp_2FGA_cns", "Opp_3PM_cns", "Opp_3PA_cns", "Opp_2FGM_pullup",
        "Opp_2FGA_pullup", "Opp_3PM_pullup", "Opp_3PA_pullup", "Opp_2FGM_less10",
        "Opp_2FGA_less10",
    ],
};

/// Per-player sources in merge order.
pub const PLAYER_SOURCES: [SourceSpec; 4] = [
    PLAYER_PLAYTYPE,
    PLAYER_MISC,
    PLAYER_SHOT_LOCATIONS,
    PLAYER_TRADITIONAL,
];

/// Per-team opponent sources in merge order.
pub const OPPONENT_SOURCES: [SourceSpec; 4] = [
    OPP_PLAYTYPE,
    OPP_MISC,
    OPP_SHOT_LOCATIONS,
    OPP_TRADITIONAL,
];

/// Look up a source spec by table name.
pub fn source_by_table(table: &str) -> Option<SourceSpec> {
    PLAYER_SOURCES
        .iter()
        .chain(OPPONENT_SOURCES.iter())
        .find(|s| s.table == table)
        .copied()
}

// ---------------------------------------------------------------------------
// Row records
// ---------------------------------------------------------------------------

/// One scraped stat row before it is written to a source table. `player` is
/// `None` for opponent tables.
#[derive(Debug, Clone, PartialEq)]
pub struct StatRow {
    pub date: NaiveDate,
    pub team: String,
    pub player: Option<String>,
    pub values: Vec<(String, f64)>,
}

/// Ground-truth player line from a completed game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Boxscore {
    pub game_id: i64,
    pub date: NaiveDate,
    pub home_team: String,
    pub team: String,
    pub player: String,
    pub opp_team: String,
    pub points: f64,
    pub minutes: f64,
}

/// Text value used in every text column of the placeholder boxscore row
/// written for a date with no games.
pub const SENTINEL_TEXT: &str = "n/a";

impl Boxscore {
    /// The placeholder row that marks `date` as processed.
    pub fn sentinel(date: NaiveDate) -> Self {
        Self {
            game_id: 0,
            date,
            home_team: SENTINEL_TEXT.to_string(),
            team: SENTINEL_TEXT.to_string(),
            player: SENTINEL_TEXT.to_string(),
            opp_team: SENTINEL_TEXT.to_string(),
            points: 0.0,
            minutes: 0.0,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.game_id == 0 || self.team == SENTINEL_TEXT
    }

    pub fn key(&self) -> PlayerKey {
        PlayerKey::new(self.date, self.team.clone(), self.player.clone())
    }
}

/// One scheduled game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matchup {
    pub date: NaiveDate,
    pub home_team: String,
    pub away_team: String,
}

/// Which injury signal a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InjurySource {
    /// Rostered players missing from that day's boxscore.
    Derived,
    /// Players listed as out on the published injury report.
    Reported,
}

impl InjurySource {
    /// Store table holding this source.
    pub fn table(&self) -> &'static str {
        match self {
            InjurySource::Derived => "player_injuries",
            InjurySource::Reported => "injury_report",
        }
    }
}

/// Presence-only injury signal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InjuryRecord {
    pub date: NaiveDate,
    pub team: String,
    pub player: String,
}

impl InjuryRecord {
    pub fn key(&self) -> PlayerKey {
        PlayerKey::new(self.date, self.team.clone(), self.player.clone())
    }
}

/// Latest posted sportsbook line for a player prop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub player: String,
    pub prop: String,
    pub line: f64,
}
