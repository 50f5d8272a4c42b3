// CSV outputs: frame snapshots for inspection and the projections report.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::features::labels::LINE;
use crate::features::Frame;
use crate::tables::FrameError;

/// Season points-per-game column of the player traditional table.
pub const PPG: &str = "PPG";

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to write file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },
}

// ---------------------------------------------------------------------------
// Projections
// ---------------------------------------------------------------------------

/// One row of `projections.csv`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Projection {
    #[serde(rename = "Player")]
    pub player: String,
    #[serde(rename = "Opp_Team")]
    pub opp_team: String,
    #[serde(rename = "Predicted_Points")]
    pub predicted_points: f64,
    #[serde(rename = "Line")]
    pub line: f64,
    #[serde(rename = "PPG")]
    pub ppg: f64,
    #[serde(rename = "Difference_Line")]
    pub difference_line: f64,
    #[serde(rename = "Difference_PPG")]
    pub difference_ppg: f64,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Pair each inference row with its prediction. The prediction and both
/// differences are rounded to 2 decimals, taken from the rounded prediction;
/// `Line` and `PPG` pass through as stored. Rows are ordered by
/// `Difference_PPG`, highest first, ties by player name.
pub fn projections(frame: &Frame, predicted: &[f64]) -> Result<Vec<Projection>, FrameError> {
    let line_idx = frame.require_column(LINE)?;
    let ppg_idx = frame.require_column(PPG)?;

    let mut rows: Vec<Projection> = frame
        .rows()
        .iter()
        .zip(predicted)
        .map(|(row, &p)| {
            let predicted_points = round2(p);
            let line = row.values[line_idx];
            let ppg = row.values[ppg_idx];
            Projection {
                player: row.key.player.clone(),
                opp_team: row.opp_team.clone(),
                predicted_points,
                line,
                ppg,
                difference_line: round2(predicted_points - line),
                difference_ppg: round2(predicted_points - ppg),
            }
        })
        .collect();
    rows.sort_by(|a, b| {
        b.difference_ppg
            .total_cmp(&a.difference_ppg)
            .then_with(|| a.player.cmp(&b.player))
    });
    Ok(rows)
}

fn write_projections_to<W: Write>(rows: &[Projection], out: W) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(out);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_projections(rows: &[Projection], path: &Path) -> Result<(), ReportError> {
    let file = create(path)?;
    write_projections_to(rows, file).map_err(|source| ReportError::Csv {
        path: path.display().to_string(),
        source,
    })?;
    info!("wrote {} projections to {}", rows.len(), path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Frame snapshots
// ---------------------------------------------------------------------------

/// Key columns, then the frame's metric columns. Missing values are written
/// as empty fields.
fn write_frame_to<W: Write>(frame: &Frame, out: W) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(out);
    let mut header = vec!["Date", "Team", "Player", "Opp_Team"];
    header.extend(frame.columns().iter().map(String::as_str));
    writer.write_record(&header)?;

    for row in frame.rows() {
        let mut record = vec![
            row.key.date.to_string(),
            row.key.team.clone(),
            row.key.player.clone(),
            row.opp_team.clone(),
        ];
        record.extend(row.values.iter().map(|v| {
            if v.is_nan() {
                String::new()
            } else {
                v.to_string()
            }
        }));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_frame(frame: &Frame, path: &Path) -> Result<(), ReportError> {
    let file = create(path)?;
    write_frame_to(frame, file).map_err(|source| ReportError::Csv {
        path: path.display().to_string(),
        source,
    })?;
    info!(
        "wrote {} snapshot ({} rows) to {}",
        frame.name(),
        frame.len(),
        path.display()
    );
    Ok(())
}

fn create(path: &Path) -> Result<File, ReportError> {
    let io_err = |source| ReportError::Io {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    File::create(path).map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FrameRow;
    use crate::tables::PlayerKey;
    use chrono::NaiveDate;

    fn frame() -> Frame {
        let mut f = Frame::new("predict", vec![PPG.into(), "Days_Since_Last_Game".into(), LINE.into()])
            .unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 12, 5).unwrap();
        for (player, opp, ppg, rest, line) in [
            ("Jayson Tatum", "NYK", 27.0, 2.0, 26.5),
            ("Jalen Brunson", "BOS", 25.5, f64::NAN, 24.5),
        ] {
            f.push(FrameRow {
                key: PlayerKey::new(date, if opp == "NYK" { "BOS" } else { "NYK" }, player),
                opp_team: opp.into(),
                values: vec![ppg, rest, line],
            })
            .unwrap();
        }
        f
    }

    #[test]
    fn projections_round_and_sort_by_ppg_difference() {
        let rows = projections(&frame(), &[28.004, 29.126]).unwrap();
        assert_eq!(rows[0].player, "Jalen Brunson");
        assert_eq!(rows[0].predicted_points, 29.13);
        assert_eq!(rows[0].difference_ppg, 3.63);
        assert_eq!(rows[0].difference_line, 4.63);
        assert_eq!(rows[1].player, "Jayson Tatum");
        assert_eq!(rows[1].difference_ppg, 1.0);
    }

    #[test]
    fn projections_keep_ppg_unrounded() {
        let mut f = Frame::new("predict", vec![PPG.into(), LINE.into()]).unwrap();
        f.push(FrameRow {
            key: PlayerKey::new(
                NaiveDate::from_ymd_opt(2024, 12, 5).unwrap(),
                "BOS",
                "Jaylen Brown",
            ),
            opp_team: "NYK".into(),
            values: vec![23.456789, 22.5],
        })
        .unwrap();
        let rows = projections(&f, &[25.0]).unwrap();
        assert_eq!(rows[0].ppg, 23.456789);
        assert_eq!(rows[0].difference_ppg, 1.54);
    }

    #[test]
    fn projections_csv_header() {
        let rows = projections(&frame(), &[28.0, 29.0]).unwrap();
        let mut buf = Vec::new();
        write_projections_to(&rows, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text.lines().next().unwrap(),
            "Player,Opp_Team,Predicted_Points,Line,PPG,Difference_Line,Difference_PPG"
        );
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn projections_need_line_and_ppg() {
        let f = Frame::new("predict", vec!["MIN".into()]).unwrap();
        assert!(matches!(
            projections(&f, &[]),
            Err(FrameError::MissingColumn { .. })
        ));
    }

    #[test]
    fn snapshot_writes_keys_then_metrics_with_blank_nan() {
        let mut buf = Vec::new();
        write_frame_to(&frame(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Date,Team,Player,Opp_Team,PPG,Days_Since_Last_Game,Line");
        assert_eq!(lines[1], "2024-12-05,BOS,Jayson Tatum,NYK,27,2,26.5");
        assert_eq!(lines[2], "2024-12-05,NYK,Jalen Brunson,BOS,25.5,,24.5");
    }
}
