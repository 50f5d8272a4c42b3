// Stats-API `resultSets` payloads.
//
// Two shapes occur: a list of sets with flat `headers`, and (shot-location
// endpoints) a single set object whose headers come in two levels, a zone
// band spanning several stat columns. Two-level headers are flattened as
// `<zone>_<stat>`, e.g. `Restricted Area_FGA`.

use serde_json::Value;

use crate::error::IngestError;

/// One result set with flattened column names.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn records(&self) -> impl Iterator<Item = Record<'_>> {
        self.rows.iter().map(move |values| Record { set: self, values })
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One row, addressable by column name.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    set: &'a ResultSet,
    values: &'a [Value],
}

impl<'a> Record<'a> {
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        self.set.column(column).and_then(|i| self.values.get(i))
    }

    pub fn str(&self, column: &str) -> Option<&'a str> {
        self.get(column)?.as_str()
    }

    pub fn f64(&self, column: &str) -> Option<f64> {
        self.get(column)?.as_f64()
    }

    pub fn i64(&self, column: &str) -> Option<i64> {
        self.get(column)?.as_i64()
    }

    /// (header, value) pairs for every numeric cell.
    pub fn numeric(&self) -> impl Iterator<Item = (&'a str, f64)> + 'a {
        let set = self.set;
        self.values
            .iter()
            .zip(&set.headers)
            .filter_map(|(v, h)| v.as_f64().map(|n| (h.as_str(), n)))
    }
}

/// The first result set of a payload, in either shape.
pub fn first_result_set(payload: &Value) -> Result<ResultSet, IngestError> {
    let sets = payload
        .get("resultSets")
        .or_else(|| payload.get("resultSet"))
        .ok_or_else(|| IngestError::shape("stats", "no resultSets"))?;
    let set = match sets {
        Value::Array(list) => list
            .first()
            .ok_or_else(|| IngestError::shape("stats", "resultSets is empty"))?,
        obj @ Value::Object(_) => obj,
        _ => return Err(IngestError::shape("stats", "resultSets has unexpected type")),
    };
    parse_set(set)
}

fn parse_set(set: &Value) -> Result<ResultSet, IngestError> {
    let headers = match set.get("headers") {
        Some(Value::Array(levels)) if levels.iter().all(Value::is_string) => levels
            .iter()
            .filter_map(|h| h.as_str().map(str::to_string))
            .collect(),
        Some(Value::Array(levels)) => flatten_headers(levels)?,
        _ => return Err(IngestError::shape("stats", "result set has no headers")),
    };
    let rows = set
        .get("rowSet")
        .and_then(Value::as_array)
        .ok_or_else(|| IngestError::shape("stats", "result set has no rowSet"))?
        .iter()
        .map(|row| row.as_array().cloned().unwrap_or_default())
        .collect();
    Ok(ResultSet { headers, rows })
}

/// Flatten `[{ columnNames: zones, columnSpan, columnsToSkip }, { columnNames }]`.
fn flatten_headers(levels: &[Value]) -> Result<Vec<String>, IngestError> {
    let names = |level: &Value| -> Result<Vec<String>, IngestError> {
        Ok(level
            .get("columnNames")
            .and_then(Value::as_array)
            .ok_or_else(|| IngestError::shape("stats", "header level without columnNames"))?
            .iter()
            .map(|n| n.as_str().unwrap_or_default().to_string())
            .collect())
    };
    let [band, columns] = levels else {
        return Err(IngestError::shape(
            "stats",
            format!("expected 2 header levels, got {}", levels.len()),
        ));
    };

    let zones = names(band)?;
    let skip = band.get("columnsToSkip").and_then(Value::as_u64).unwrap_or(0) as usize;
    let span = band.get("columnSpan").and_then(Value::as_u64).unwrap_or(1).max(1) as usize;

    Ok(names(columns)?
        .into_iter()
        .enumerate()
        .map(|(i, stat)| {
            if i < skip {
                return stat;
            }
            match zones.get((i - skip) / span) {
                Some(zone) if !zone.is_empty() => format!("{zone}_{stat}"),
                _ => stat,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flat_headers() {
        let payload = json!({
            "resultSets": [{
                "name": "LeagueDashPlayerStats",
                "headers": ["PLAYER_NAME", "TEAM_ABBREVIATION", "PTS"],
                "rowSet": [["Jayson Tatum", "BOS", 27.1], ["Jalen Brunson", "NYK", null]]
            }]
        });
        let set = first_result_set(&payload).unwrap();
        let records: Vec<Record> = set.records().collect();
        assert_eq!(records[0].str("PLAYER_NAME"), Some("Jayson Tatum"));
        assert_eq!(records[0].f64("PTS"), Some(27.1));
        assert_eq!(records[1].f64("PTS"), None);
        assert_eq!(records[0].numeric().collect::<Vec<_>>(), vec![("PTS", 27.1)]);
    }

    #[test]
    fn two_level_headers_are_flattened() {
        let payload = json!({
            "resultSets": {
                "name": "ShotLocations",
                "headers": [
                    {
                        "name": "SHOT_CATEGORY",
                        "columnSpan": 3,
                        "columnsToSkip": 2,
                        "columnNames": ["Restricted Area", "Mid-Range"]
                    },
                    {
                        "name": "columns",
                        "columnNames": ["TEAM_ID", "TEAM_NAME", "OPP_FGM", "OPP_FGA", "OPP_FG_PCT",
                                        "OPP_FGM", "OPP_FGA", "OPP_FG_PCT"]
                    }
                ],
                "rowSet": [[1610612738, "Boston Celtics", 10.0, 15.0, 0.66, 4.0, 9.0, 0.44]]
            }
        });
        let set = first_result_set(&payload).unwrap();
        assert_eq!(
            set.headers,
            vec![
                "TEAM_ID",
                "TEAM_NAME",
                "Restricted Area_OPP_FGM",
                "Restricted Area_OPP_FGA",
                "Restricted Area_OPP_FG_PCT",
                "Mid-Range_OPP_FGM",
                "Mid-Range_OPP_FGA",
                "Mid-Range_OPP_FG_PCT",
            ]
        );
        let record = set.records().next().unwrap();
        assert_eq!(record.f64("Mid-Range_OPP_FGA"), Some(9.0));
    }

    #[test]
    fn missing_result_sets_is_a_shape_error() {
        match first_result_set(&json!({"message": "blocked"})).unwrap_err() {
            IngestError::Shape { what, .. } => assert_eq!(what, "stats"),
            other => panic!("expected Shape, got: {other}"),
        }
    }
}
