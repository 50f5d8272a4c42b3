// Final joins: ground-truth points for training, sportsbook lines for
// inference. Both drop rows that cannot be scored rather than failing.

use std::collections::HashMap;

use chrono::NaiveDate;
use tracing::{debug, info};

use super::context::{
    back_to_back, home_court_flag, last_game_lookup, rest_days_from_history, rest_days_in_frame,
    MatchupIndex,
};
use super::frame::{Frame, FrameRow};
use crate::tables::{Boxscore, FrameError, Line, PlayerKey, Table, TeamKey};

pub const POINTS: &str = "Points";
pub const MINUTES: &str = "Minutes";
pub const REST_DAYS: &str = "Days_Since_Last_Game";
pub const BACK_TO_BACK: &str = "Is_Back_To_Back";
pub const HOME_COURT: &str = "Home_Court_Advantage";
pub const LINE: &str = "Line";

/// Player columns, then opponent columns, then `extra`; any repeated name is
/// a collision.
fn frame_columns(
    players: &Table<PlayerKey>,
    opponents: &Table<TeamKey>,
    extra: &[&str],
) -> Result<Vec<String>, FrameError> {
    let mut columns = players.columns().to_vec();
    let blocks = [
        (opponents.name(), opponents.columns().to_vec()),
        ("context", extra.iter().map(|c| c.to_string()).collect()),
    ];
    for (name, block) in blocks {
        for column in block {
            if columns.contains(&column) {
                return Err(FrameError::ColumnCollision {
                    column,
                    left: players.name().to_string(),
                    right: name.to_string(),
                });
            }
            columns.push(column);
        }
    }
    Ok(columns)
}

/// Build the training frame.
///
/// 1. inner join with boxscores on (Team, Player, Date): players who did
///    not play are dropped, attaching Points, Minutes and the opponent
/// 2. inner join with the opponent frame on (Opp_Team, Date)
/// 3. rest days over the surviving rows; a player's first row is dropped
pub fn training_frame(
    players: &Table<PlayerKey>,
    opponents: &Table<TeamKey>,
    boxscores: &[Boxscore],
) -> Result<Frame, FrameError> {
    let columns = frame_columns(
        players,
        opponents,
        &[POINTS, MINUTES, REST_DAYS, BACK_TO_BACK, HOME_COURT],
    )?;

    let mut by_key: HashMap<PlayerKey, &Boxscore> = HashMap::new();
    for b in boxscores.iter().filter(|b| !b.is_sentinel()) {
        by_key.entry(b.key()).or_insert(b);
    }

    let mut matched = 0;
    let mut joined = Vec::new();
    for (key, values) in players.rows() {
        let Some(game) = by_key.get(key) else {
            continue;
        };
        matched += 1;
        let Some(opp_values) = opponents.get(&TeamKey::new(key.date, game.opp_team.clone())) else {
            continue;
        };
        joined.push((key, *game, values, opp_values));
    }

    let gaps = rest_days_in_frame(joined.iter().map(|(key, ..)| *key));

    let mut frame = Frame::new("train", columns)?;
    for (key, game, values, opp_values) in joined {
        let Some(gap) = gaps.get(key).copied().flatten() else {
            continue;
        };
        let home = if game.home_team == key.team { 1.0 } else { 0.0 };
        let mut row = Vec::with_capacity(frame.columns().len());
        row.extend_from_slice(values);
        row.extend_from_slice(opp_values);
        row.extend([game.points, game.minutes, gap as f64, back_to_back(Some(gap)), home]);
        frame.push(FrameRow {
            key: key.clone(),
            opp_team: game.opp_team.clone(),
            values: row,
        })?;
    }

    info!(
        "training frame: {} player rows, {} with a boxscore, {} after opponent join and rest filter",
        players.len(),
        matched,
        frame.len()
    );
    Ok(frame)
}

/// Build the inference frame for `date`.
///
/// Rows are restricted to `date`, the opponent is resolved from the day's
/// matchups (teams without a game drop out), the opponent frame is inner
/// joined, rest days come from boxscore history (unknown stays `NaN` with
/// back-to-back 0) and finally the latest line is inner joined on Player.
pub fn inference_frame(
    players: &Table<PlayerKey>,
    opponents: &Table<TeamKey>,
    matchups: &MatchupIndex,
    boxscores: &[Boxscore],
    lines: &[Line],
    date: NaiveDate,
) -> Result<Frame, FrameError> {
    let columns = frame_columns(
        players,
        opponents,
        &[REST_DAYS, BACK_TO_BACK, HOME_COURT, LINE],
    )?;

    let mut line_by_player: HashMap<&str, f64> = HashMap::new();
    for l in lines {
        line_by_player.entry(l.player.as_str()).or_insert(l.line);
    }
    let history = last_game_lookup(boxscores, date);

    let mut on_date = 0;
    let mut scheduled = 0;
    let mut frame = Frame::new("predict", columns)?;
    for (key, values) in players.rows().filter(|(k, _)| k.date == date) {
        on_date += 1;
        let Some(opponent) = matchups.resolve(date, &key.team) else {
            continue;
        };
        scheduled += 1;
        let Some(opp_values) = opponents.get(&TeamKey::new(date, opponent.team.clone())) else {
            continue;
        };
        let Some(line) = line_by_player.get(key.player.as_str()) else {
            debug!("no line for {}, skipping", key.player);
            continue;
        };

        let gap = rest_days_from_history(&history, key);
        let mut row = Vec::with_capacity(frame.columns().len());
        row.extend_from_slice(values);
        row.extend_from_slice(opp_values);
        row.extend([
            gap.map_or(f64::NAN, |g| g as f64),
            back_to_back(gap),
            home_court_flag(&opponent),
            *line,
        ]);
        frame.push(FrameRow {
            key: key.clone(),
            opp_team: opponent.team,
            values: row,
        })?;
    }

    info!(
        "inference frame for {date}: {on_date} player rows, {scheduled} with a game, {} with opponent data and a line",
        frame.len()
    );
    Ok(frame)
}
