// SQLite persistence layer for scraped stat tables, boxscores, matchups,
// sportsbook lines and injury lists.

use std::collections::{BTreeSet, HashSet};
use std::sync::{Mutex, MutexGuard};

use anyhow::{bail, Context, Result};
use chrono::{Duration, NaiveDate};
use rusqlite::{params, params_from_iter, Connection};
use tracing::{debug, warn};

use crate::names::normalize_player_name;
use crate::tables::{
    Boxscore, FrameError, InjuryRecord, InjurySource, Line, Matchup, PlayerKey, SourceKind,
    SourceSpec, StatRow, Table, TeamKey, OPPONENT_SOURCES, PLAYER_SOURCES, PLAYER_TRADITIONAL,
};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Tables that `dates_to_scrape` may be asked about.
const DATED_TABLES: [&str; 9] = [
    "player_traditional",
    "player_misc",
    "player_shot_locations",
    "player_playtype",
    "opp_traditional",
    "opp_misc",
    "opp_shot_locations",
    "opp_playtype",
    "player_boxscore",
];

/// SQLite-backed store for every table the pipeline reads.
///
/// Stat tables and boxscores are append-only history keyed on their natural
/// key; matchups, lines and injury lists are replaced wholesale on each
/// scrape.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to set database pragmas")?;

        for spec in PLAYER_SOURCES.iter().chain(OPPONENT_SOURCES.iter()) {
            conn.execute_batch(&source_table_ddl(spec))
                .with_context(|| format!("failed to create table {}", spec.table))?;
        }

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS player_boxscore (
                id        INTEGER PRIMARY KEY AUTOINCREMENT,
                GameID    INTEGER NOT NULL,
                Date      TEXT NOT NULL,
                Home_Team TEXT NOT NULL,
                Team      TEXT NOT NULL,
                Player    TEXT NOT NULL,
                Opp_Team  TEXT NOT NULL,
                Points    REAL NOT NULL,
                Minutes   REAL NOT NULL,
                UNIQUE(GameID, Date, Team, Player)
            );
            ",
        )
        .context("failed to create player_boxscore")?;

        create_matchups(&conn)?;
        create_lines(&conn)?;
        create_injuries(&conn, InjurySource::Reported)?;
        create_injuries(&conn, InjurySource::Derived)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Back-fill bookkeeping
    // ------------------------------------------------------------------

    /// Distinct dates already present in `table`.
    pub fn scraped_dates(&self, table: &str) -> Result<BTreeSet<NaiveDate>> {
        if !DATED_TABLES.contains(&table) {
            bail!("`{table}` is not a dated table");
        }
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!("SELECT DISTINCT Date FROM {table}"))
            .with_context(|| format!("failed to prepare date query for {table}"))?;
        let raw = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .with_context(|| format!("failed to query dates of {table}"))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .with_context(|| format!("failed to read dates of {table}"))?;
        raw.iter().map(|s| parse_date(s)).collect()
    }

    /// Dates in `[start, target]` that `table` does not have yet, newest
    /// first. Empty when `start` is after `target`.
    pub fn dates_to_scrape(
        &self,
        table: &str,
        target: NaiveDate,
        start: NaiveDate,
    ) -> Result<Vec<NaiveDate>> {
        let done = self.scraped_dates(table)?;
        Ok(missing_dates(target, (target - start).num_days(), &done))
    }

    // ------------------------------------------------------------------
    // Stat tables
    // ------------------------------------------------------------------

    /// Append scraped rows to a stat table. Rows whose natural key is already
    /// stored are ignored. Metrics missing from a row are stored as 0.
    /// Returns the number of rows inserted.
    pub fn insert_stat_rows(&self, spec: &SourceSpec, rows: &[StatRow]) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin insert transaction")?;

        let key_cols: &[&str] = match spec.kind {
            SourceKind::Player => &["Date", "Team", "Player"],
            SourceKind::Opponent => &["Date", "Team"],
        };
        let all_cols: Vec<String> = key_cols
            .iter()
            .map(|c| c.to_string())
            .chain(spec.columns.iter().map(|c| quote_ident(c)))
            .collect();
        let placeholders: Vec<String> = (1..=all_cols.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT OR IGNORE INTO {} ({}) VALUES ({})",
            spec.table,
            all_cols.join(", "),
            placeholders.join(", ")
        );

        let mut inserted = 0;
        {
            let mut stmt = tx
                .prepare(&sql)
                .with_context(|| format!("failed to prepare insert into {}", spec.table))?;

            for row in rows {
                let mut values: Vec<rusqlite::types::Value> = vec![
                    row.date.format(DATE_FORMAT).to_string().into(),
                    row.team.clone().into(),
                ];
                if spec.kind == SourceKind::Player {
                    let Some(player) = &row.player else {
                        bail!("row for {} on {} in {} has no player", row.team, row.date, spec.table);
                    };
                    values.push(normalize_player_name(player).into());
                }
                for column in spec.columns {
                    let value = row
                        .values
                        .iter()
                        .find(|(name, _)| name == column)
                        .map(|(_, v)| *v)
                        .unwrap_or_else(|| {
                            debug!("{}: no `{}` for {} on {}, storing 0", spec.table, column, row.team, row.date);
                            0.0
                        });
                    values.push(value.into());
                }
                inserted += stmt
                    .execute(params_from_iter(values))
                    .with_context(|| format!("failed to insert row into {}", spec.table))?;
            }
        }

        tx.commit().context("failed to commit stat rows")?;
        Ok(inserted)
    }

    /// Load a per-player stat table. Names are normalized on the way out so
    /// every consumer joins on the same spelling.
    pub fn load_player_table(&self, spec: &SourceSpec) -> Result<Table<PlayerKey>> {
        if spec.kind != SourceKind::Player {
            bail!("{} is not a per-player table", spec.table);
        }
        let conn = self.conn();
        let sql = format!(
            "SELECT Date, Team, Player, {} FROM {} ORDER BY id",
            quoted_list(spec.columns),
            spec.table
        );
        let mut stmt = conn
            .prepare(&sql)
            .with_context(|| format!("failed to prepare load of {}", spec.table))?;
        let width = spec.columns.len();
        let rows = stmt
            .query_map([], |row| {
                let date: String = row.get(0)?;
                let team: String = row.get(1)?;
                let player: String = row.get(2)?;
                let values = read_metrics(row, 3, width)?;
                Ok((date, team, player, values))
            })
            .with_context(|| format!("failed to query {}", spec.table))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .with_context(|| format!("failed to map rows of {}", spec.table))?;

        let mut table = Table::new(spec.table, spec.column_names())?;
        for (date, team, player, values) in rows {
            let key = PlayerKey::new(parse_date(&date)?, team, normalize_player_name(&player));
            insert_or_warn(&mut table, key, values)?;
        }
        Ok(table)
    }

    /// Load a per-team (opponent) stat table.
    pub fn load_opponent_table(&self, spec: &SourceSpec) -> Result<Table<TeamKey>> {
        if spec.kind != SourceKind::Opponent {
            bail!("{} is not a per-team table", spec.table);
        }
        let conn = self.conn();
        let sql = format!(
            "SELECT Date, Team, {} FROM {} ORDER BY id",
            quoted_list(spec.columns),
            spec.table
        );
        let mut stmt = conn
            .prepare(&sql)
            .with_context(|| format!("failed to prepare load of {}", spec.table))?;
        let width = spec.columns.len();
        let rows = stmt
            .query_map([], |row| {
                let date: String = row.get(0)?;
                let team: String = row.get(1)?;
                let values = read_metrics(row, 2, width)?;
                Ok((date, team, values))
            })
            .with_context(|| format!("failed to query {}", spec.table))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .with_context(|| format!("failed to map rows of {}", spec.table))?;

        let mut table = Table::new(spec.table, spec.column_names())?;
        for (date, team, values) in rows {
            let key = TeamKey::new(parse_date(&date)?, team);
            insert_or_warn(&mut table, key, values)?;
        }
        Ok(table)
    }

    /// Distinct (team, player) pairs seen in `player_traditional`.
    pub fn roster(&self) -> Result<BTreeSet<(String, String)>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT DISTINCT Team, Player FROM {}",
                PLAYER_TRADITIONAL.table
            ))
            .context("failed to prepare roster query")?;
        let pairs = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .context("failed to query roster")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map roster rows")?;
        Ok(pairs
            .into_iter()
            .map(|(team, player)| (team, normalize_player_name(&player)))
            .collect())
    }

    /// Every player name the stats source knows about, for name checks.
    pub fn known_players(&self) -> Result<HashSet<String>> {
        Ok(self.roster()?.into_iter().map(|(_, player)| player).collect())
    }

    // ------------------------------------------------------------------
    // Boxscores
    // ------------------------------------------------------------------

    /// Append boxscore rows. Duplicates are ignored. Returns rows inserted.
    pub fn insert_boxscores(&self, rows: &[Boxscore]) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin boxscore transaction")?;
        let mut inserted = 0;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR IGNORE INTO player_boxscore
                        (GameID, Date, Home_Team, Team, Player, Opp_Team, Points, Minutes)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                )
                .context("failed to prepare boxscore insert")?;
            for b in rows {
                inserted += stmt
                    .execute(params![
                        b.game_id,
                        b.date.format(DATE_FORMAT).to_string(),
                        b.home_team,
                        b.team,
                        normalize_player_name(&b.player),
                        b.opp_team,
                        b.points,
                        b.minutes,
                    ])
                    .context("failed to insert boxscore row")?;
            }
        }
        tx.commit().context("failed to commit boxscores")?;
        Ok(inserted)
    }

    /// Record that `date` had no games so the back-fill does not revisit it.
    pub fn mark_date_without_games(&self, date: NaiveDate) -> Result<()> {
        self.insert_boxscores(&[Boxscore::sentinel(date)])?;
        Ok(())
    }

    /// Whether any row of game `game_id` is already stored.
    pub fn has_boxscore(&self, game_id: i64) -> Result<bool> {
        let conn = self.conn();
        let exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM player_boxscore WHERE GameID = ?1)",
                params![game_id],
                |row| row.get(0),
            )
            .context("failed to check player_boxscore existence")?;
        Ok(exists)
    }

    /// All real boxscore rows; placeholder rows for game-less dates are
    /// filtered out.
    pub fn load_boxscores(&self) -> Result<Vec<Boxscore>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT GameID, Date, Home_Team, Team, Player, Opp_Team, Points, Minutes
                 FROM player_boxscore WHERE GameID != 0 ORDER BY Date, GameID, id",
            )
            .context("failed to prepare boxscore query")?;
        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, f64>(6)?,
                    row.get::<_, f64>(7)?,
                ))
            })
            .context("failed to query boxscores")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map boxscore rows")?;

        raw.into_iter()
            .map(|(game_id, date, home_team, team, player, opp_team, points, minutes)| {
                Ok(Boxscore {
                    game_id,
                    date: parse_date(&date)?,
                    home_team,
                    team,
                    player: normalize_player_name(&player),
                    opp_team,
                    points,
                    minutes,
                })
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Replace-on-scrape tables
    // ------------------------------------------------------------------

    /// Replace `nba_matchups` with `matchups`.
    pub fn replace_matchups(&self, matchups: &[Matchup]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin matchup transaction")?;
        tx.execute_batch("DROP TABLE IF EXISTS nba_matchups;")
            .context("failed to drop nba_matchups")?;
        create_matchups(&tx)?;
        for m in matchups {
            tx.execute(
                "INSERT OR IGNORE INTO nba_matchups (Date, Away_Team, Home_Team) VALUES (?1, ?2, ?3)",
                params![m.date.format(DATE_FORMAT).to_string(), m.away_team, m.home_team],
            )
            .context("failed to insert matchup")?;
        }
        tx.commit().context("failed to commit matchups")?;
        Ok(())
    }

    pub fn load_matchups(&self) -> Result<Vec<Matchup>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT Date, Away_Team, Home_Team FROM nba_matchups ORDER BY id")
            .context("failed to prepare matchup query")?;
        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .context("failed to query matchups")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map matchup rows")?;
        raw.into_iter()
            .map(|(date, away_team, home_team)| {
                Ok(Matchup {
                    date: parse_date(&date)?,
                    away_team,
                    home_team,
                })
            })
            .collect()
    }

    /// Replace `dk_props` with `lines`.
    pub fn replace_lines(&self, lines: &[Line]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin lines transaction")?;
        tx.execute_batch("DROP TABLE IF EXISTS dk_props;")
            .context("failed to drop dk_props")?;
        create_lines(&tx)?;
        for l in lines {
            tx.execute(
                "INSERT OR IGNORE INTO dk_props (Player, Prop, Line) VALUES (?1, ?2, ?3)",
                params![normalize_player_name(&l.player), l.prop, l.line],
            )
            .context("failed to insert line")?;
        }
        tx.commit().context("failed to commit lines")?;
        Ok(())
    }

    pub fn load_lines(&self) -> Result<Vec<Line>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT Player, Prop, Line FROM dk_props ORDER BY id")
            .context("failed to prepare lines query")?;
        let lines = stmt
            .query_map([], |row| {
                Ok(Line {
                    player: row.get(0)?,
                    prop: row.get(1)?,
                    line: row.get(2)?,
                })
            })
            .context("failed to query lines")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map line rows")?;
        Ok(lines)
    }

    /// Replace the table backing `source` with `records`.
    pub fn replace_injuries(&self, source: InjurySource, records: &[InjuryRecord]) -> Result<()> {
        let table = source.table();
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin injury transaction")?;
        tx.execute_batch(&format!("DROP TABLE IF EXISTS {table};"))
            .with_context(|| format!("failed to drop {table}"))?;
        create_injuries(&tx, source)?;
        for r in records {
            tx.execute(
                &format!("INSERT OR IGNORE INTO {table} (Date, Team, Player) VALUES (?1, ?2, ?3)"),
                params![
                    r.date.format(DATE_FORMAT).to_string(),
                    r.team,
                    normalize_player_name(&r.player)
                ],
            )
            .with_context(|| format!("failed to insert into {table}"))?;
        }
        tx.commit().with_context(|| format!("failed to commit {table}"))?;
        Ok(())
    }

    pub fn load_injuries(&self, source: InjurySource) -> Result<Vec<InjuryRecord>> {
        let table = source.table();
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!("SELECT Date, Team, Player FROM {table} ORDER BY id"))
            .with_context(|| format!("failed to prepare {table} query"))?;
        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .with_context(|| format!("failed to query {table}"))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .with_context(|| format!("failed to map {table} rows"))?;
        raw.into_iter()
            .map(|(date, team, player)| {
                Ok(InjuryRecord {
                    date: parse_date(&date)?,
                    team,
                    player: normalize_player_name(&player),
                })
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `target - i` for `i` in `0..=days`, minus `done`, newest first.
pub fn missing_dates(target: NaiveDate, days: i64, done: &BTreeSet<NaiveDate>) -> Vec<NaiveDate> {
    if days < 0 {
        return Vec::new();
    }
    (0..=days)
        .map(|i| target - Duration::days(i))
        .filter(|d| !done.contains(d))
        .collect()
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .with_context(|| format!("invalid date `{raw}` in store"))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quoted_list(columns: &[&str]) -> String {
    columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ")
}

fn read_metrics(row: &rusqlite::Row<'_>, offset: usize, width: usize) -> rusqlite::Result<Vec<f64>> {
    (0..width)
        .map(|i| Ok(row.get::<_, Option<f64>>(offset + i)?.unwrap_or(0.0)))
        .collect()
}

/// Insert into a loaded table; a duplicate after name normalization keeps
/// the first row.
fn insert_or_warn<K: crate::tables::RowKey>(
    table: &mut Table<K>,
    key: K,
    values: Vec<f64>,
) -> Result<()> {
    match table.insert(key, values) {
        Ok(()) => Ok(()),
        Err(FrameError::DuplicateKey { table: name, key }) => {
            warn!("skipping duplicate row {key} in {name}");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn source_table_ddl(spec: &SourceSpec) -> String {
    let (key_cols, unique) = match spec.kind {
        SourceKind::Player => (
            "Date TEXT NOT NULL,\n    Team TEXT NOT NULL,\n    Player TEXT NOT NULL,",
            "UNIQUE(Date, Team, Player)",
        ),
        SourceKind::Opponent => (
            "Date TEXT NOT NULL,\n    Team TEXT NOT NULL,",
            "UNIQUE(Date, Team)",
        ),
    };
    let metrics: Vec<String> = spec
        .columns
        .iter()
        .map(|c| format!("    {} REAL,", quote_ident(c)))
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    id INTEGER PRIMARY KEY AUTOINCREMENT,\n    {}\n{}\n    {}\n);",
        spec.table,
        key_cols,
        metrics.join("\n"),
        unique
    )
}

fn create_matchups(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS nba_matchups (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            Date      TEXT NOT NULL,
            Away_Team TEXT NOT NULL,
            Home_Team TEXT NOT NULL,
            UNIQUE(Date, Away_Team, Home_Team)
        );",
    )
    .context("failed to create nba_matchups")
}

fn create_lines(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS dk_props (
            id     INTEGER PRIMARY KEY AUTOINCREMENT,
            Player TEXT NOT NULL,
            Prop   TEXT NOT NULL,
            Line   REAL NOT NULL
        );",
    )
    .context("failed to create dk_props")
}

fn create_injuries(conn: &Connection, source: InjurySource) -> Result<()> {
    let table = source.table();
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id     INTEGER PRIMARY KEY AUTOINCREMENT,
            Date   TEXT NOT NULL,
            Team   TEXT NOT NULL,
            Player TEXT NOT NULL,
            UNIQUE(Date, Team, Player)
        );"
    ))
    .with_context(|| format!("failed to create {table}"))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
