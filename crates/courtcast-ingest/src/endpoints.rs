// One stats-API endpoint per source table.
//
// Each scrape covers a trailing window ending on the scrape date and the
// resulting rows are keyed by that end date. Raw headers are renamed to the
// stored column names; anything that does not map onto a stored column is
// dropped. The play-type tables need three calls (catch-and-shoot, pull-up,
// under 10 ft) whose rows are inner-joined on the natural key.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{Datelike, NaiveDate};
use tracing::{debug, warn};

use courtcast_core::names::{normalize_player_name, tricode_for};
use courtcast_core::tables::{
    SourceKind, SourceSpec, StatRow, OPP_MISC, OPP_PLAYTYPE, OPP_SHOT_LOCATIONS, OPP_TRADITIONAL,
    PLAYER_MISC, PLAYER_PLAYTYPE, PLAYER_SHOT_LOCATIONS, PLAYER_TRADITIONAL,
};

use crate::client::{Feed, Site};
use crate::error::IngestError;
use crate::result_set::{first_result_set, ResultSet};

/// How a row names its team.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamField {
    /// Already a tricode, e.g. `TEAM_ABBREVIATION`.
    Abbreviation(&'static str),
    /// Full franchise name, e.g. `TEAM_NAME`, mapped to a tricode.
    FullName(&'static str),
}

/// One call against an endpoint: extra query parameters and the header
/// renames that apply to its response.
#[derive(Debug, Clone, Copy)]
pub struct Variant {
    pub params: &'static [(&'static str, &'static str)],
    pub renames: &'static [(&'static str, &'static str)],
}

#[derive(Debug, Clone, Copy)]
pub struct StatEndpoint {
    pub spec: SourceSpec,
    pub path: &'static str,
    pub team: TeamField,
    pub player: Option<&'static str>,
    pub variants: &'static [Variant],
}

// ---------------------------------------------------------------------------
// Endpoint table
// ---------------------------------------------------------------------------

const NO_RENAMES: &[(&str, &str)] = &[];

const CATCH_AND_SHOOT: &[(&str, &str)] = &[("GeneralRange", "Catch and Shoot")];
const PULLUPS: &[(&str, &str)] = &[("GeneralRange", "Pullups")];
const LESS_THAN_10: &[(&str, &str)] = &[("GeneralRange", "Less Than 10 ft")];

const ZONES: &[(&str, &str)] = &[
    ("Restricted Area", "RA"),
    ("In The Paint (Non-RA)", "Paint"),
    ("Mid-Range", "Mid"),
    ("Left Corner 3", "LC3"),
    ("Right Corner 3", "RC3"),
    ("Above the Break 3", "AB3"),
    ("Corner 3", "C3"),
];

pub const PLAYER_TRADITIONAL_ENDPOINT: StatEndpoint = StatEndpoint {
    spec: PLAYER_TRADITIONAL,
    path: "leaguedashplayerstats",
    team: TeamField::Abbreviation("TEAM_ABBREVIATION"),
    player: Some("PLAYER_NAME"),
    variants: &[Variant {
        params: &[("MeasureType", "Base")],
        renames: &[
            ("FG3M", "3PM"),
            ("FG3A", "3PA"),
            ("FG3_PCT", "3P_PCT"),
            ("PTS", "PPG"),
            ("NBA_FANTASY_PTS", "NBA_FANTASY_PPG"),
        ],
    }],
};

pub const PLAYER_MISC_ENDPOINT: StatEndpoint = StatEndpoint {
    spec: PLAYER_MISC,
    path: "leaguedashplayerstats",
    team: TeamField::Abbreviation("TEAM_ABBREVIATION"),
    player: Some("PLAYER_NAME"),
    variants: &[Variant {
        params: &[("MeasureType", "Misc")],
        renames: NO_RENAMES,
    }],
};

pub const PLAYER_SHOT_LOCATIONS_ENDPOINT: StatEndpoint = StatEndpoint {
    spec: PLAYER_SHOT_LOCATIONS,
    path: "leaguedashplayershotlocations",
    team: TeamField::Abbreviation("TEAM_ABBREVIATION"),
    player: Some("PLAYER_NAME"),
    variants: &[Variant {
        params: &[("DistanceRange", "By Zone"), ("MeasureType", "Base")],
        renames: NO_RENAMES,
    }],
};

pub const PLAYER_PLAYTYPE_ENDPOINT: StatEndpoint = StatEndpoint {
    spec: PLAYER_PLAYTYPE,
    path: "leaguedashplayerptshot",
    team: TeamField::Abbreviation("PLAYER_LAST_TEAM_ABBREVIATION"),
    player: Some("PLAYER_NAME"),
    variants: &[
        Variant {
            params: CATCH_AND_SHOOT,
            renames: &[
                ("FG2M", "2FGM_cns"),
                ("FG2A", "2FGA_cns"),
                ("FG3M", "3PM_cns"),
                ("FG3A", "3PA_cns"),
            ],
        },
        Variant {
            params: PULLUPS,
            renames: &[
                ("FG2M", "2FGM_pullup"),
                ("FG2A", "2FGA_pullup"),
                ("FG3M", "3PM_pullup"),
                ("FG3A", "3PA_pullup"),
            ],
        },
        Variant {
            params: LESS_THAN_10,
            renames: &[("FG2M", "2FGM_less10"), ("FG2A", "2FGA_less10")],
        },
    ],
};

pub const OPP_TRADITIONAL_ENDPOINT: StatEndpoint = StatEndpoint {
    spec: OPP_TRADITIONAL,
    path: "leaguedashteamstats",
    team: TeamField::FullName("TEAM_NAME"),
    player: None,
    variants: &[Variant {
        params: &[("MeasureType", "Opponent")],
        renames: &[
            ("OPP_FG3M", "OPP_3PM"),
            ("OPP_FG3A", "OPP_3PA"),
            ("OPP_FG3_PCT", "OPP_3P_PCT"),
        ],
    }],
};

pub const OPP_MISC_ENDPOINT: StatEndpoint = StatEndpoint {
    spec: OPP_MISC,
    path: "leaguedashteamstats",
    team: TeamField::FullName("TEAM_NAME"),
    player: None,
    variants: &[Variant {
        params: &[("MeasureType", "Misc")],
        renames: NO_RENAMES,
    }],
};

pub const OPP_SHOT_LOCATIONS_ENDPOINT: StatEndpoint = StatEndpoint {
    spec: OPP_SHOT_LOCATIONS,
    path: "leaguedashteamshotlocations",
    team: TeamField::FullName("TEAM_NAME"),
    player: None,
    variants: &[Variant {
        params: &[("DistanceRange", "By Zone"), ("MeasureType", "Opponent")],
        renames: NO_RENAMES,
    }],
};

pub const OPP_PLAYTYPE_ENDPOINT: StatEndpoint = StatEndpoint {
    spec: OPP_PLAYTYPE,
    path: "leaguedashoppptshot",
    team: TeamField::Abbreviation("TEAM_ABBREVIATION"),
    player: None,
    variants: &[
        Variant {
            params: CATCH_AND_SHOOT,
            renames: &[
                ("FG2M", "Opp_2FGM_cns"),
                ("FG2A", "Opp_2FGA_cns"),
                ("FG3M", "Opp_3PM_cns"),
                ("FG3A", "Opp_3PA_cns"),
            ],
        },
        Variant {
            params: PULLUPS,
            renames: &[
                ("FG2M", "Opp_2FGM_pullup"),
                ("FG2A", "Opp_2FGA_pullup"),
                ("FG3M", "Opp_3PM_pullup"),
                ("FG3A", "Opp_3PA_pullup"),
            ],
        },
        Variant {
            params: LESS_THAN_10,
            renames: &[("FG2M", "Opp_2FGM_less10"), ("FG2A", "Opp_2FGA_less10")],
        },
    ],
};

/// Every stat endpoint, in scrape order.
pub const ALL_ENDPOINTS: [StatEndpoint; 8] = [
    PLAYER_TRADITIONAL_ENDPOINT,
    PLAYER_MISC_ENDPOINT,
    PLAYER_SHOT_LOCATIONS_ENDPOINT,
    PLAYER_PLAYTYPE_ENDPOINT,
    OPP_TRADITIONAL_ENDPOINT,
    OPP_MISC_ENDPOINT,
    OPP_SHOT_LOCATIONS_ENDPOINT,
    OPP_PLAYTYPE_ENDPOINT,
];

// ---------------------------------------------------------------------------
// Query construction
// ---------------------------------------------------------------------------

/// Filters the league-dash endpoints expect even when unused.
const COMMON_PARAMS: &[(&str, &str)] = &[
    ("LeagueID", "00"),
    ("SeasonType", "Regular Season"),
    ("PerMode", "PerGame"),
    ("PaceAdjust", "N"),
    ("PlusMinus", "N"),
    ("Rank", "N"),
    ("LastNGames", "0"),
    ("Month", "0"),
    ("OpponentTeamID", "0"),
    ("PORound", "0"),
    ("Period", "0"),
    ("TeamID", "0"),
    ("TwoWay", "0"),
    ("Conference", ""),
    ("Division", ""),
    ("GameScope", ""),
    ("GameSegment", ""),
    ("Location", ""),
    ("Outcome", ""),
    ("PlayerExperience", ""),
    ("PlayerPosition", ""),
    ("SeasonSegment", ""),
    ("ShotClockRange", ""),
    ("StarterBench", ""),
    ("VsConference", ""),
    ("VsDivision", ""),
];

/// Season label for a date: seasons roll over in October.
pub fn season_for(date: NaiveDate) -> String {
    let start = if date.month() >= 10 {
        date.year()
    } else {
        date.year() - 1
    };
    format!("{}-{:02}", start, (start + 1) % 100)
}

/// Query for one variant over `[end - window_days, end]`.
pub fn query(variant: &Variant, end: NaiveDate, window_days: i64) -> Vec<(&'static str, String)> {
    let start = end - chrono::Duration::days(window_days);
    let mut params: Vec<(&'static str, String)> = COMMON_PARAMS
        .iter()
        .map(|(k, v)| (*k, v.to_string()))
        .collect();
    for (k, v) in variant.params {
        match params.iter_mut().find(|(name, _)| name == k) {
            Some(slot) => slot.1 = v.to_string(),
            None => params.push((*k, v.to_string())),
        }
    }
    params.push(("Season", season_for(end)));
    params.push(("DateFrom", start.format("%m/%d/%Y").to_string()));
    params.push(("DateTo", end.format("%m/%d/%Y").to_string()));
    params
}

// ---------------------------------------------------------------------------
// Response conversion
// ---------------------------------------------------------------------------

/// Stored name for a raw header: exact renames first, then the shot-zone
/// prefix, otherwise unchanged.
pub fn stored_column(raw: &str, endpoint: &StatEndpoint, variant: &Variant) -> String {
    if let Some((_, to)) = variant.renames.iter().find(|(from, _)| *from == raw) {
        return to.to_string();
    }
    for (zone, short) in ZONES {
        if let Some(stat) = raw.strip_prefix(*zone).and_then(|r| r.strip_prefix('_')) {
            return match stat.strip_prefix("OPP_") {
                Some(opp_stat) => format!("Opp_{short}_{opp_stat}"),
                None if endpoint.spec.kind == SourceKind::Opponent => {
                    format!("Opp_{short}_{stat}")
                }
                None => format!("{short}_{stat}"),
            };
        }
    }
    raw.to_string()
}

/// Convert one response into rows keyed by `date`. Rows whose team cannot
/// be resolved are skipped with a warning.
pub fn rows_from_set(
    endpoint: &StatEndpoint,
    variant: &Variant,
    set: &ResultSet,
    date: NaiveDate,
) -> Vec<StatRow> {
    let mut rows = Vec::with_capacity(set.rows.len());
    for record in set.records() {
        let team = match endpoint.team {
            TeamField::Abbreviation(col) => record.str(col).map(str::to_string),
            TeamField::FullName(col) => record
                .str(col)
                .and_then(|name| tricode_for(name).map(str::to_string)),
        };
        let Some(team) = team else {
            warn!("{}: row without a known team, skipping", endpoint.spec.table);
            continue;
        };
        let player = match endpoint.player {
            Some(col) => match record.str(col) {
                Some(name) => Some(normalize_player_name(name)),
                None => {
                    warn!("{}: {team} row without a player, skipping", endpoint.spec.table);
                    continue;
                }
            },
            None => None,
        };

        let values = record
            .numeric()
            .map(|(raw, v)| (stored_column(raw, endpoint, variant), v))
            .filter(|(name, _)| endpoint.spec.columns.contains(&name.as_str()))
            .collect();
        rows.push(StatRow {
            date,
            team,
            player,
            values,
        });
    }
    rows
}

fn row_key(row: &StatRow) -> (String, Option<String>) {
    (row.team.clone(), row.player.clone())
}

/// Inner-join variant results on (Team, Player), concatenating values.
pub fn inner_join_variants(parts: Vec<Vec<StatRow>>) -> Vec<StatRow> {
    let mut parts = parts.into_iter();
    let Some(first) = parts.next() else {
        return Vec::new();
    };
    let mut joined: BTreeMap<(String, Option<String>), StatRow> =
        first.into_iter().map(|r| (row_key(&r), r)).collect();
    for part in parts {
        let mut by_key: BTreeMap<(String, Option<String>), StatRow> =
            part.into_iter().map(|r| (row_key(&r), r)).collect();
        joined.retain(|key, row| match by_key.remove(key) {
            Some(other) => {
                row.values.extend(other.values);
                true
            }
            None => false,
        });
    }
    joined.into_values().collect()
}

/// Fetch and convert one endpoint for the window ending on `date`.
pub async fn fetch_endpoint(
    feed: &dyn Feed,
    base_url: &str,
    endpoint: &StatEndpoint,
    date: NaiveDate,
    window_days: i64,
    delay: Duration,
) -> Result<Vec<StatRow>, IngestError> {
    let url = format!("{}/{}", base_url.trim_end_matches('/'), endpoint.path);
    let mut parts = Vec::with_capacity(endpoint.variants.len());
    for (i, variant) in endpoint.variants.iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let params = query(variant, date, window_days);
        let payload = feed.fetch_json(Site::Stats, &url, &params).await?;
        let set = first_result_set(&payload)?;
        let rows = rows_from_set(endpoint, variant, &set, date);
        debug!("{} {date} variant {i}: {} rows", endpoint.spec.table, rows.len());
        parts.push(rows);
    }
    Ok(inner_join_variants(parts))
}
