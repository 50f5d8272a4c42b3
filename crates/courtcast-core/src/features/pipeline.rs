// End-to-end assembly: read every input from the store once, release it,
// then align, merge, attach injuries and join labels in memory.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::info;

use super::context::MatchupIndex;
use super::frame::Frame;
use super::{align, injury, labels, merge};
use crate::db::Database;
use crate::tables::{
    Boxscore, FrameError, InjuryRecord, InjurySource, Line, Matchup, PlayerKey, Table, TeamKey,
    OPPONENT_SOURCES, PLAYER_SOURCES,
};

/// Everything a pipeline run reads from the store.
#[derive(Debug, Clone)]
pub struct PipelineInputs {
    pub players: Vec<Table<PlayerKey>>,
    pub opponents: Vec<Table<TeamKey>>,
    pub boxscores: Vec<Boxscore>,
    pub injuries: Vec<InjuryRecord>,
    pub matchups: Vec<Matchup>,
    pub lines: Vec<Line>,
}

impl PipelineInputs {
    /// Bulk-read every table. The result holds no store handle, so callers
    /// close `db` before running any transform.
    pub fn load(db: &Database, injury_source: InjurySource) -> Result<Self> {
        let players = PLAYER_SOURCES
            .iter()
            .map(|spec| {
                db.load_player_table(spec)
                    .with_context(|| format!("failed to load {}", spec.table))
            })
            .collect::<Result<Vec<_>>>()?;
        let opponents = OPPONENT_SOURCES
            .iter()
            .map(|spec| {
                db.load_opponent_table(spec)
                    .with_context(|| format!("failed to load {}", spec.table))
            })
            .collect::<Result<Vec<_>>>()?;

        let inputs = Self {
            players,
            opponents,
            boxscores: db.load_boxscores().context("failed to load boxscores")?,
            injuries: db
                .load_injuries(injury_source)
                .with_context(|| format!("failed to load {}", injury_source.table()))?,
            matchups: db.load_matchups().context("failed to load matchups")?,
            lines: db.load_lines().context("failed to load lines")?,
        };
        info!(
            "loaded {} player tables, {} opponent tables, {} boxscore rows, {} injury records ({}), {} matchups, {} lines",
            inputs.players.len(),
            inputs.opponents.len(),
            inputs.boxscores.len(),
            inputs.injuries.len(),
            injury_source.table(),
            inputs.matchups.len(),
            inputs.lines.len()
        );
        Ok(inputs)
    }

    /// Shift, outer-merge and attach the injury block to the player tables.
    pub fn player_frame(&self, shift_days: i64) -> Result<Table<PlayerKey>, FrameError> {
        let shifted = align::shift_all(&self.players, shift_days)?;
        let merged = merge::outer_merge_players(&shifted)?;
        injury::apply(&merged, &self.injuries)
    }

    /// Shift and inner-merge the opponent tables.
    pub fn opponent_frame(&self, shift_days: i64) -> Result<Table<TeamKey>, FrameError> {
        let shifted = align::shift_all(&self.opponents, shift_days)?;
        merge::inner_merge_opponents(&shifted)
    }

    /// Assembled training frame with the Points target.
    pub fn training_frame(&self, shift_days: i64) -> Result<Frame, FrameError> {
        let players = self.player_frame(shift_days)?;
        let opponents = self.opponent_frame(shift_days)?;
        labels::training_frame(&players, &opponents, &self.boxscores)
    }

    /// Assembled inference frame for `date` with the posted lines.
    pub fn inference_frame(&self, shift_days: i64, date: NaiveDate) -> Result<Frame, FrameError> {
        let players = self.player_frame(shift_days)?;
        let opponents = self.opponent_frame(shift_days)?;
        let matchups = MatchupIndex::new(&self.matchups);
        labels::inference_frame(
            &players,
            &opponents,
            &matchups,
            &self.boxscores,
            &self.lines,
            date,
        )
    }
}
