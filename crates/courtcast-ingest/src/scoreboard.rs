// Daily scoreboard and per-game boxscores.
//
// The scoreboard's game header gives the game id, the home team id and a
// game code `YYYYMMDD/AWYHOM` naming both sides. The boxscore lists every
// player of both teams; only players who logged minutes are kept.

use chrono::NaiveDate;
use serde_json::Value;
use tracing::debug;

use courtcast_core::names::{franchise_by_id, normalize_player_name};
use courtcast_core::tables::{Boxscore, Matchup};

use crate::client::{Feed, Site};
use crate::error::IngestError;
use crate::result_set::first_result_set;

/// One scheduled or completed game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Game {
    pub game_id: String,
    pub date: NaiveDate,
    pub home_team: String,
    pub away_team: String,
}

impl Game {
    pub fn matchup(&self) -> Matchup {
        Matchup {
            date: self.date,
            home_team: self.home_team.clone(),
            away_team: self.away_team.clone(),
        }
    }

    /// Numeric id as stored, e.g. `"0022400123"` -> 22400123.
    pub fn numeric_id(&self) -> Option<i64> {
        self.game_id.parse().ok()
    }

    fn opponent_of(&self, team: &str) -> &str {
        if team == self.home_team {
            &self.away_team
        } else {
            &self.home_team
        }
    }
}

// ---------------------------------------------------------------------------
// Scoreboard
// ---------------------------------------------------------------------------

/// Games on `date`. Games whose home team is not a franchise (exhibitions,
/// all-star games) are skipped.
pub fn parse_scoreboard(payload: &Value, date: NaiveDate) -> Result<Vec<Game>, IngestError> {
    let set = first_result_set(payload)?;
    let mut games = Vec::new();
    for record in set.records() {
        let game_id = record
            .str("GAME_ID")
            .ok_or_else(|| IngestError::shape("scoreboard", "game without GAME_ID"))?;
        let Some(home) = record
            .i64("HOME_TEAM_ID")
            .and_then(|id| franchise_by_id(id as u64))
        else {
            debug!("skipping game {game_id}: home team is not a franchise");
            continue;
        };
        let code = record.str("GAMECODE").unwrap_or_default();
        let teams = code.split('/').nth(1).unwrap_or_default();
        let away = if teams.len() == 6 {
            let (first, second) = teams.split_at(3);
            if first == home.tricode {
                second
            } else {
                first
            }
        } else {
            match record
                .i64("VISITOR_TEAM_ID")
                .and_then(|id| franchise_by_id(id as u64))
            {
                Some(f) => f.tricode,
                None => {
                    debug!("skipping game {game_id}: unreadable game code {code:?}");
                    continue;
                }
            }
        };
        games.push(Game {
            game_id: game_id.to_string(),
            date,
            home_team: home.tricode.to_string(),
            away_team: away.to_string(),
        });
    }
    Ok(games)
}

pub async fn fetch_games(
    feed: &dyn Feed,
    base_url: &str,
    date: NaiveDate,
) -> Result<Vec<Game>, IngestError> {
    let url = format!("{}/scoreboardv2", base_url.trim_end_matches('/'));
    let query = [
        ("GameDate", date.format("%Y-%m-%d").to_string()),
        ("LeagueID", "00".to_string()),
        ("DayOffset", "0".to_string()),
    ];
    let payload = feed.fetch_json(Site::Stats, &url, &query).await?;
    parse_scoreboard(&payload, date)
}

// ---------------------------------------------------------------------------
// Boxscore
// ---------------------------------------------------------------------------

/// `"mm:ss"` or plain minutes to fractional minutes; unreadable is 0.
pub fn parse_minutes(raw: &str) -> f64 {
    let raw = raw.trim();
    match raw.split_once(':') {
        Some((m, s)) => match (m.parse::<f64>(), s.parse::<f64>()) {
            (Ok(m), Ok(s)) => m + s / 60.0,
            _ => 0.0,
        },
        None => raw.parse().unwrap_or(0.0),
    }
}

/// Player rows with non-zero minutes for both teams of `game`.
pub fn parse_boxscore(payload: &Value, game: &Game) -> Result<Vec<Boxscore>, IngestError> {
    let game_id = game
        .numeric_id()
        .ok_or_else(|| IngestError::shape("boxscore", format!("bad game id {}", game.game_id)))?;
    let root = payload
        .get("boxScoreTraditional")
        .ok_or_else(|| IngestError::shape("boxscore", "no boxScoreTraditional"))?;

    let mut rows = Vec::new();
    for side in ["homeTeam", "awayTeam"] {
        let team = root
            .get(side)
            .ok_or_else(|| IngestError::shape("boxscore", format!("no {side}")))?;
        let tricode = team
            .get("teamTricode")
            .and_then(Value::as_str)
            .ok_or_else(|| IngestError::shape("boxscore", format!("{side} without teamTricode")))?;
        let players = team.get("players").and_then(Value::as_array);
        for player in players.into_iter().flatten() {
            let stats = player.get("statistics");
            let minutes = stats
                .and_then(|s| s.get("minutes"))
                .and_then(Value::as_str)
                .map(parse_minutes)
                .unwrap_or(0.0);
            if minutes == 0.0 {
                continue;
            }
            let first = player.get("firstName").and_then(Value::as_str).unwrap_or_default();
            let family = player.get("familyName").and_then(Value::as_str).unwrap_or_default();
            let points = stats
                .and_then(|s| s.get("points"))
                .and_then(Value::as_f64)
                .unwrap_or(0.0);
            rows.push(Boxscore {
                game_id,
                date: game.date,
                home_team: game.home_team.clone(),
                team: tricode.to_string(),
                player: normalize_player_name(&format!("{first} {family}")),
                opp_team: game.opponent_of(tricode).to_string(),
                points,
                minutes,
            });
        }
    }
    Ok(rows)
}

pub async fn fetch_boxscore(
    feed: &dyn Feed,
    base_url: &str,
    game: &Game,
) -> Result<Vec<Boxscore>, IngestError> {
    let url = format!("{}/boxscoretraditionalv3", base_url.trim_end_matches('/'));
    let query = [
        ("GameID", game.game_id.clone()),
        ("StartPeriod", "0".to_string()),
        ("EndPeriod", "0".to_string()),
        ("StartRange", "0".to_string()),
        ("EndRange", "0".to_string()),
        ("RangeType", "0".to_string()),
    ];
    let payload = feed.fetch_json(Site::Stats, &url, &query).await?;
    parse_boxscore(&payload, game)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 11, 13).unwrap()
    }

    fn scoreboard() -> Value {
        json!({
            "resultSets": [{
                "name": "GameHeader",
                "headers": ["GAME_DATE_EST", "GAME_SEQUENCE", "GAME_ID", "GAME_STATUS_ID",
                            "GAME_STATUS_TEXT", "GAMECODE", "HOME_TEAM_ID", "VISITOR_TEAM_ID"],
                "rowSet": [
                    ["2024-11-13T00:00:00", 1, "0022400201", 3, "Final", "20241113/NYKBOS",
                     1610612738, 1610612752],
                    ["2024-11-13T00:00:00", 2, "0032400001", 3, "Final", "20241113/GNSLBJ",
                     1610616833, 1610616834]
                ]
            }]
        })
    }

    #[test]
    fn scoreboard_yields_games_and_skips_exhibitions() {
        let games = parse_scoreboard(&scoreboard(), date()).unwrap();
        assert_eq!(
            games,
            vec![Game {
                game_id: "0022400201".into(),
                date: date(),
                home_team: "BOS".into(),
                away_team: "NYK".into(),
            }]
        );
        assert_eq!(games[0].numeric_id(), Some(22400201));
        assert_eq!(games[0].matchup().away_team, "NYK");
    }

    #[test]
    fn minutes_parse() {
        assert_eq!(parse_minutes("34:30"), 34.5);
        assert_eq!(parse_minutes("12"), 12.0);
        assert_eq!(parse_minutes(""), 0.0);
        assert_eq!(parse_minutes("DNP"), 0.0);
    }

    #[test]
    fn boxscore_keeps_players_with_minutes() {
        let game = parse_scoreboard(&scoreboard(), date()).unwrap().remove(0);
        let payload = json!({
            "boxScoreTraditional": {
                "homeTeam": {
                    "teamTricode": "BOS",
                    "players": [
                        {"firstName": "Jayson", "familyName": "Tatum",
                         "statistics": {"minutes": "38:15", "points": 31}},
                        {"firstName": "Neemias", "familyName": "Queta",
                         "statistics": {"minutes": "", "points": 0}}
                    ]
                },
                "awayTeam": {
                    "teamTricode": "NYK",
                    "players": [
                        {"firstName": "Jalen", "familyName": "Brunson",
                         "statistics": {"minutes": "36:00", "points": 27}},
                        {"firstName": "Jaren", "familyName": "Jackson Jr.",
                         "statistics": {"minutes": "10:30", "points": 4}}
                    ]
                }
            }
        });

        let rows = parse_boxscore(&payload, &game).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].player, "Jayson Tatum");
        assert_eq!(rows[0].opp_team, "NYK");
        assert_eq!(rows[0].home_team, "BOS");
        assert_eq!(rows[0].points, 31.0);
        assert_eq!(rows[0].minutes, 38.25);
        assert_eq!(rows[1].opp_team, "BOS");
        assert_eq!(rows[2].player, "Jaren Jackson");
        assert!(rows.iter().all(|r| r.game_id == 22400201));
    }

    #[test]
    fn boxscore_without_root_is_a_shape_error() {
        let game = parse_scoreboard(&scoreboard(), date()).unwrap().remove(0);
        assert!(matches!(
            parse_boxscore(&json!({}), &game),
            Err(IngestError::Shape { .. })
        ));
    }
}
