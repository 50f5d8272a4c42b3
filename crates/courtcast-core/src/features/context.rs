// Game context: rest days, back-to-back flag and opponent / home-court
// resolution.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;

use crate::tables::{Boxscore, Matchup, PlayerKey};

// ---------------------------------------------------------------------------
// Rest days
// ---------------------------------------------------------------------------

/// Days since each player's previous record within the same set of keys.
///
/// Records are grouped by player name (a traded player keeps their history),
/// sorted by date, and compared with the immediately preceding record. A
/// player's first record maps to `None`.
pub fn rest_days_in_frame<'a>(
    keys: impl IntoIterator<Item = &'a PlayerKey>,
) -> HashMap<PlayerKey, Option<i64>> {
    let mut by_player: BTreeMap<&str, Vec<&PlayerKey>> = BTreeMap::new();
    for key in keys {
        by_player.entry(key.player.as_str()).or_default().push(key);
    }

    let mut out = HashMap::new();
    for (_, mut records) in by_player {
        records.sort_by_key(|k| k.date);
        let mut previous: Option<NaiveDate> = None;
        for key in records {
            let gap = previous.map(|p| (key.date - p).num_days());
            out.insert(key.clone(), gap);
            previous = Some(key.date);
        }
    }
    out
}

/// Latest game date per (Team, Player) strictly before `before`.
pub fn last_game_lookup(
    boxscores: &[Boxscore],
    before: NaiveDate,
) -> HashMap<(String, String), NaiveDate> {
    let mut out: HashMap<(String, String), NaiveDate> = HashMap::new();
    for b in boxscores {
        if b.is_sentinel() || b.date >= before {
            continue;
        }
        let entry = out
            .entry((b.team.clone(), b.player.clone()))
            .or_insert(b.date);
        if b.date > *entry {
            *entry = b.date;
        }
    }
    out
}

/// Inference-time rest days: gap between `key.date` and the player's last
/// recorded game for that team. `None` when no prior game is known.
pub fn rest_days_from_history(
    lookup: &HashMap<(String, String), NaiveDate>,
    key: &PlayerKey,
) -> Option<i64> {
    lookup
        .get(&(key.team.clone(), key.player.clone()))
        .map(|last| (key.date - *last).num_days())
}

/// 1 exactly when the gap is one day; 0 for any other gap or none.
pub fn back_to_back(gap: Option<i64>) -> f64 {
    if gap == Some(1) {
        1.0
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// Opponent / home court
// ---------------------------------------------------------------------------

/// A team's opponent on a given day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opponent {
    pub team: String,
    pub home: bool,
}

/// 1 for a home game, 0 for an away game.
pub fn home_court_flag(opponent: &Opponent) -> f64 {
    if opponent.home {
        1.0
    } else {
        0.0
    }
}

/// Matchups indexed by (date, team) for both sides of each game.
#[derive(Debug, Clone, Default)]
pub struct MatchupIndex {
    by_team: HashMap<(NaiveDate, String), Opponent>,
}

impl MatchupIndex {
    /// Index `matchups`. A team listed twice on one date keeps its first
    /// game.
    pub fn new(matchups: &[Matchup]) -> Self {
        let mut by_team = HashMap::new();
        for m in matchups {
            by_team
                .entry((m.date, m.home_team.clone()))
                .or_insert_with(|| Opponent {
                    team: m.away_team.clone(),
                    home: true,
                });
            by_team
                .entry((m.date, m.away_team.clone()))
                .or_insert_with(|| Opponent {
                    team: m.home_team.clone(),
                    home: false,
                });
        }
        Self { by_team }
    }

    /// Opponent and home flag for `team` on `date`; `None` when the team has
    /// no game that day.
    pub fn resolve(&self, date: NaiveDate, team: &str) -> Option<Opponent> {
        self.by_team.get(&(date, team.to_string())).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.by_team.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 11, day).unwrap()
    }

    #[test]
    fn rest_gap_counts_calendar_days() {
        let first = PlayerKey::new(d(1), "BOS", "X");
        let second = PlayerKey::new(d(3), "BOS", "X");
        let gaps = rest_days_in_frame([&second, &first]);

        assert_eq!(gaps[&first], None);
        assert_eq!(gaps[&second], Some(2));
        assert_eq!(back_to_back(gaps[&second]), 0.0);
    }

    #[test]
    fn removing_earlier_record_leaves_gap_undefined() {
        let second = PlayerKey::new(d(3), "BOS", "X");
        let gaps = rest_days_in_frame([&second]);
        assert_eq!(gaps[&second], None);
    }

    #[test]
    fn rest_gap_follows_player_across_teams() {
        let before = PlayerKey::new(d(1), "BKN", "X");
        let after = PlayerKey::new(d(2), "DAL", "X");
        let gaps = rest_days_in_frame([&before, &after]);
        assert_eq!(gaps[&after], Some(1));
    }

    #[test]
    fn back_to_back_only_for_gap_of_one() {
        assert_eq!(back_to_back(Some(1)), 1.0);
        assert_eq!(back_to_back(Some(0)), 0.0);
        assert_eq!(back_to_back(Some(2)), 0.0);
        assert_eq!(back_to_back(None), 0.0);
    }

    #[test]
    fn history_lookup_uses_latest_prior_game() {
        let game = |day: u32, team: &str| Boxscore {
            game_id: 22400000 + day as i64,
            date: d(day),
            home_team: team.into(),
            team: team.into(),
            player: "X".into(),
            opp_team: "NYK".into(),
            points: 10.0,
            minutes: 20.0,
        };
        let lookup = last_game_lookup(&[game(1, "BOS"), game(4, "BOS"), game(6, "BOS")], d(6));

        let key = PlayerKey::new(d(6), "BOS", "X");
        assert_eq!(rest_days_from_history(&lookup, &key), Some(2));
        let unknown = PlayerKey::new(d(6), "BOS", "Y");
        assert_eq!(rest_days_from_history(&lookup, &unknown), None);
    }

    #[test]
    fn home_away_and_third_team() {
        let index = MatchupIndex::new(&[Matchup {
            date: d(2),
            home_team: "BOS".into(),
            away_team: "NYK".into(),
        }]);

        let bos = index.resolve(d(2), "BOS").unwrap();
        assert_eq!(bos.team, "NYK");
        assert_eq!(home_court_flag(&bos), 1.0);

        let nyk = index.resolve(d(2), "NYK").unwrap();
        assert_eq!(nyk.team, "BOS");
        assert_eq!(home_court_flag(&nyk), 0.0);

        assert_eq!(index.resolve(d(2), "LAL"), None);
        assert_eq!(index.resolve(d(3), "BOS"), None);
    }
}
