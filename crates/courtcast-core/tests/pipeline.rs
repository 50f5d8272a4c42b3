// End-to-end assembly through an in-memory store: scraped stat rows,
// boxscores, injuries, matchups and lines in; training and inference frames,
// a fitted model and the projections report out.

use chrono::NaiveDate;

use courtcast_core::db::Database;
use courtcast_core::features::catalog::default_features;
use courtcast_core::features::injury::derive_from_boxscores;
use courtcast_core::features::labels::{BACK_TO_BACK, HOME_COURT, LINE, POINTS, REST_DAYS};
use courtcast_core::features::{FeatureMatrix, Frame, FrameRow, PipelineInputs};
use courtcast_core::model::backtest::rolling_backtest;
use courtcast_core::model::{BoostParams, Model};
use courtcast_core::report::projections;
use courtcast_core::tables::{
    Boxscore, InjuryRecord, InjurySource, Line, Matchup, SourceSpec, StatRow, OPPONENT_SOURCES,
    PLAYER_SOURCES,
};

const ROSTER: [(&str, &str); 3] = [
    ("BOS", "Jayson Tatum"),
    ("BOS", "Jaylen Brown"),
    ("NYK", "Jalen Brunson"),
];

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 11, day).unwrap()
}

/// Every metric of a player row scraped on `day` is `day * 100 + roster index`.
fn player_value(day: u32, idx: usize) -> f64 {
    (day * 100) as f64 + idx as f64
}

/// Every metric of an opponent row scraped on `day` is `day * 100 + 50 (+1 for NYK)`.
fn opp_value(day: u32, team: &str) -> f64 {
    (day * 100 + 50) as f64 + if team == "NYK" { 1.0 } else { 0.0 }
}

fn stat_rows(spec: &SourceSpec, days: &[u32]) -> Vec<StatRow> {
    let mut rows = Vec::new();
    for &day in days {
        match spec.kind {
            courtcast_core::tables::SourceKind::Player => {
                for (idx, (team, player)) in ROSTER.iter().enumerate() {
                    rows.push(StatRow {
                        date: d(day),
                        team: team.to_string(),
                        player: Some(player.to_string()),
                        values: spec
                            .columns
                            .iter()
                            .map(|c| (c.to_string(), player_value(day, idx)))
                            .collect(),
                    });
                }
            }
            courtcast_core::tables::SourceKind::Opponent => {
                for team in ["BOS", "NYK"] {
                    rows.push(StatRow {
                        date: d(day),
                        team: team.to_string(),
                        player: None,
                        values: spec
                            .columns
                            .iter()
                            .map(|c| (c.to_string(), opp_value(day, team)))
                            .collect(),
                    });
                }
            }
        }
    }
    rows
}

fn game(day: u32, home: &str, team: &str, player: &str, points: f64) -> Boxscore {
    Boxscore {
        game_id: 22400100 + day as i64,
        date: d(day),
        home_team: home.into(),
        team: team.into(),
        player: player.into(),
        opp_team: if team == "BOS" { "NYK" } else { "BOS" }.into(),
        points,
        minutes: 34.0,
    }
}

/// Stats scraped 11-01..11-04; games on 11-02 (BOS home), 11-03 (NYK home,
/// Brown sits) and 11-05 (BOS home).
fn seeded_store() -> Database {
    let db = Database::open(":memory:").unwrap();
    for spec in PLAYER_SOURCES.iter().chain(OPPONENT_SOURCES.iter()) {
        let inserted = db.insert_stat_rows(spec, &stat_rows(spec, &[1, 2, 3, 4])).unwrap();
        assert!(inserted > 0, "{} took no rows", spec.table);
    }

    let games = vec![
        game(2, "BOS", "BOS", "Jayson Tatum", 25.0),
        game(2, "BOS", "BOS", "Jaylen Brown", 21.0),
        game(2, "BOS", "NYK", "Jalen Brunson", 30.0),
        game(3, "NYK", "BOS", "Jayson Tatum", 31.0),
        game(3, "NYK", "NYK", "Jalen Brunson", 27.0),
        game(5, "BOS", "BOS", "Jayson Tatum", 29.0),
        game(5, "BOS", "BOS", "Jaylen Brown", 24.0),
        game(5, "BOS", "NYK", "Jalen Brunson", 22.0),
    ];
    db.insert_boxscores(&games).unwrap();
    db.mark_date_without_games(d(4)).unwrap();

    let derived = derive_from_boxscores(&db.roster().unwrap(), &db.load_boxscores().unwrap());
    db.replace_injuries(InjurySource::Derived, &derived).unwrap();

    db.replace_matchups(&[Matchup {
        date: d(5),
        home_team: "BOS".into(),
        away_team: "NYK".into(),
    }])
    .unwrap();
    db.replace_lines(&[
        Line {
            player: "Jayson Tatum".into(),
            prop: "Points".into(),
            line: 27.5,
        },
        Line {
            player: "Jalen Brunson".into(),
            prop: "Points".into(),
            line: 26.5,
        },
    ])
    .unwrap();
    db.replace_injuries(
        InjurySource::Reported,
        &[InjuryRecord {
            date: d(5),
            team: "BOS".into(),
            player: "Jaylen Brown".into(),
        }],
    )
    .unwrap();
    db
}

fn row<'a>(frame: &'a Frame, day: u32, player: &str) -> &'a FrameRow {
    frame
        .rows()
        .iter()
        .find(|r| r.key.date == d(day) && r.key.player == player)
        .unwrap_or_else(|| panic!("no {player} row on {day}"))
}

fn training_inputs() -> PipelineInputs {
    let db = seeded_store();
    let inputs = PipelineInputs::load(&db, InjurySource::Derived).unwrap();
    drop(db);
    inputs
}

#[test]
fn derived_injuries_mark_missing_rostered_player() {
    let db = seeded_store();
    let injuries = db.load_injuries(InjurySource::Derived).unwrap();
    assert_eq!(
        injuries,
        vec![InjuryRecord {
            date: d(3),
            team: "BOS".into(),
            player: "Jaylen Brown".into(),
        }]
    );
}

#[test]
fn training_frame_aligns_joins_and_enriches() {
    let frame = training_inputs().training_frame(1).unwrap();

    // Each player's 11-02 game is their first record and is dropped; Brown
    // sat 11-03.
    assert_eq!(frame.len(), 5);
    assert!(frame.rows().iter().all(|r| r.key.date != d(2)));

    // Stats scraped 11-02 describe the 11-03 game.
    let tatum = row(&frame, 3, "Jayson Tatum");
    assert_eq!(frame.value(tatum, "MIN"), Some(player_value(2, 0)));
    assert_eq!(frame.value(tatum, "OPP_FGA"), Some(opp_value(2, "NYK")));
    assert_eq!(tatum.opp_team, "NYK");
    assert_eq!(frame.value(tatum, POINTS), Some(31.0));
    assert_eq!(frame.value(tatum, REST_DAYS), Some(1.0));
    assert_eq!(frame.value(tatum, BACK_TO_BACK), Some(1.0));
    assert_eq!(frame.value(tatum, HOME_COURT), Some(0.0));
    // Brown was out: his 11-02 profile is the BOS injury block.
    assert_eq!(frame.value(tatum, "PTS_PAINT_unknown"), Some(player_value(2, 1)));

    let brunson = row(&frame, 3, "Jalen Brunson");
    assert_eq!(frame.value(brunson, HOME_COURT), Some(1.0));
    assert_eq!(frame.value(brunson, "PTS_PAINT_unknown"), Some(0.0));

    let brown = row(&frame, 5, "Jaylen Brown");
    assert_eq!(frame.value(brown, REST_DAYS), Some(3.0));
    assert_eq!(frame.value(brown, BACK_TO_BACK), Some(0.0));
    assert_eq!(frame.value(brown, "MIN"), Some(player_value(4, 1)));
}

#[test]
fn larger_shift_moves_every_source_together() {
    let frame = training_inputs().training_frame(2).unwrap();
    // Only stats scraped 11-01 and 11-03 line up with games (11-03, 11-05).
    let tatum = row(&frame, 5, "Jayson Tatum");
    assert_eq!(frame.value(tatum, "MIN"), Some(player_value(3, 0)));
    assert_eq!(frame.value(tatum, "OPP_FGA"), Some(opp_value(3, "NYK")));
}

#[test]
fn default_features_train_and_backtest() {
    let frame = training_inputs().training_frame(1).unwrap();
    let features = default_features();
    let matrix = FeatureMatrix::from_frame(&frame, &features, Some(POINTS)).unwrap();
    assert_eq!(matrix.columns.len(), 58);

    let params = BoostParams {
        n_estimators: 10,
        ..BoostParams::default()
    };
    let model = Model::fit(&matrix, &params).unwrap();
    assert_eq!(model.predict(&matrix).unwrap().len(), 5);

    let bt = rolling_backtest(&frame, &features, &params, 10).unwrap();
    assert_eq!(bt.days.len(), 1);
    assert_eq!(bt.days[0].date, d(5));
    assert_eq!(bt.days[0].training_rows, 2);
}

#[test]
fn inference_frame_and_projections() {
    let train = training_inputs().training_frame(1).unwrap();
    let features = default_features();
    let params = BoostParams {
        n_estimators: 10,
        ..BoostParams::default()
    };
    let model = Model::fit(
        &FeatureMatrix::from_frame(&train, &features, Some(POINTS)).unwrap(),
        &params,
    )
    .unwrap();

    let db = seeded_store();
    let inputs = PipelineInputs::load(&db, InjurySource::Reported).unwrap();
    drop(db);
    let frame = inputs.inference_frame(1, d(5)).unwrap();

    // Brown is listed out and has no line.
    assert_eq!(frame.len(), 2);
    let tatum = row(&frame, 5, "Jayson Tatum");
    assert_eq!(tatum.opp_team, "NYK");
    assert_eq!(frame.value(tatum, HOME_COURT), Some(1.0));
    assert_eq!(frame.value(tatum, REST_DAYS), Some(2.0));
    assert_eq!(frame.value(tatum, LINE), Some(27.5));
    assert_eq!(frame.value(tatum, "PTS_PAINT_unknown"), Some(player_value(4, 1)));
    let brunson = row(&frame, 5, "Jalen Brunson");
    assert_eq!(brunson.opp_team, "BOS");
    assert_eq!(frame.value(brunson, HOME_COURT), Some(0.0));

    let matrix = FeatureMatrix::from_frame(&frame, &features, None).unwrap();
    let predicted = model.predict(&matrix).unwrap();
    let report = projections(&frame, &predicted).unwrap();
    assert_eq!(report.len(), 2);
    assert!(report[0].difference_ppg >= report[1].difference_ppg);
}

#[test]
fn inference_without_matchups_is_empty_and_refused_by_matrix() {
    let frame = training_inputs().inference_frame(1, d(4)).unwrap();
    assert!(frame.is_empty());
    assert!(FeatureMatrix::from_frame(&frame, &default_features(), None).is_err());
}
