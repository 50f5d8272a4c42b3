// Sportsbook player-points props.
//
// The sportsbook payload holds one market type (e.g. "Points O/U") and a
// list of selections, one per over/under side. Each selection names the
// player as its first participant and carries the line in `points`.

use std::collections::HashSet;

use serde_json::Value;

use courtcast_core::names::normalize_player_name;
use courtcast_core::tables::Line;

use crate::client::{Feed, Site};
use crate::error::IngestError;

/// Sportsbook spellings that differ from the stats site.
const ALIASES: &[(&str, &str)] = &[
    ("Cameron Thomas", "Cam Thomas"),
    ("Nicolas Claxton", "Nic Claxton"),
    ("Robert Williams", "Robert Williams III"),
    ("Alexandre Sarr", "Alex Sarr"),
    ("Carlton Carrington", "Bub Carrington"),
    ("Jaylin Williams (OKC)", "Jaylin Williams"),
    ("Jimmy Butler", "Jimmy Butler III"),
];

fn canonical_name(raw: &str) -> String {
    let raw = raw.trim();
    let aliased = ALIASES
        .iter()
        .find(|(from, _)| *from == raw)
        .map(|(_, to)| *to)
        .unwrap_or(raw);
    normalize_player_name(aliased)
}

/// One line per player, first selection wins.
pub fn parse_props(payload: &Value) -> Result<Vec<Line>, IngestError> {
    let prop = payload
        .pointer("/markets/0/marketType/name")
        .and_then(Value::as_str)
        .ok_or_else(|| IngestError::shape("props", "no markets[0].marketType.name"))?
        .replace("O/U", "")
        .trim()
        .to_string();
    let selections = payload
        .get("selections")
        .and_then(Value::as_array)
        .ok_or_else(|| IngestError::shape("props", "no selections"))?;

    let mut seen = HashSet::new();
    let mut lines = Vec::new();
    for selection in selections {
        let Some(name) = selection
            .pointer("/participants/0/name")
            .and_then(Value::as_str)
        else {
            continue;
        };
        let Some(line) = selection.get("points").and_then(Value::as_f64) else {
            continue;
        };
        let player = canonical_name(name);
        if seen.insert(player.clone()) {
            lines.push(Line {
                player,
                prop: prop.clone(),
                line,
            });
        }
    }
    if lines.is_empty() {
        return Err(IngestError::Empty {
            what: "props".to_string(),
        });
    }
    Ok(lines)
}

pub async fn fetch_props(feed: &dyn Feed, url: &str) -> Result<Vec<Line>, IngestError> {
    let payload = feed.fetch_json(Site::Sportsbook, url, &[]).await?;
    parse_props(&payload)
}
