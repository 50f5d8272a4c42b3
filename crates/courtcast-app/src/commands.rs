// Subcommand bodies. Each opens the store itself: `scrape` and
// `derive-injuries` write through it, while `train` and `predict` hold it
// only for the bulk read and run every transform on the loaded inputs.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::{info, warn};

use courtcast_core::config::Config;
use courtcast_core::db::Database;
use courtcast_core::features::catalog::feature_list;
use courtcast_core::features::labels::POINTS;
use courtcast_core::features::{FeatureMatrix, PipelineInputs};
use courtcast_core::model::backtest::{rolling_backtest, Backtest};
use courtcast_core::model::Model;
use courtcast_core::report::{self, Projection};
use courtcast_core::tables::InjurySource;
use courtcast_ingest::{rebuild_derived_injuries, scrape_all, Feed, HttpFeed, ScrapeSummary};

pub const TRAIN_FRAME_FILE: &str = "train_frame.csv";
pub const PREDICT_FRAME_FILE: &str = "predict_frame.csv";
pub const PROJECTIONS_FILE: &str = "projections.csv";

/// Features logged after a fit.
const IMPORTANCE_SHOWN: usize = 15;

pub fn open_store(config: &Config) -> Result<Database> {
    let db_file = config.db_file();
    let db = Database::open(&db_file.to_string_lossy()).context("failed to open database")?;
    info!("database opened at {}", db_file.display());
    Ok(db)
}

/// Bulk-read the pipeline inputs; the store is closed before this returns.
pub fn load_inputs(config: &Config, source: InjurySource) -> Result<PipelineInputs> {
    let db = open_store(config)?;
    PipelineInputs::load(&db, source)
}

pub async fn scrape(config: &Config, today: NaiveDate) -> Result<ScrapeSummary> {
    let feed = HttpFeed::new(Duration::from_secs(config.scrape.timeout_secs))
        .context("failed to build HTTP client")?;
    scrape_with(config, &feed, today).await
}

pub async fn scrape_with(
    config: &Config,
    feed: &dyn Feed,
    today: NaiveDate,
) -> Result<ScrapeSummary> {
    let db = open_store(config)?;
    scrape_all(feed, &db, &config.scrape, today).await
}

pub fn derive_injuries(config: &Config) -> Result<usize> {
    let db = open_store(config)?;
    rebuild_derived_injuries(&db)
}

/// What `train` produced.
#[derive(Debug)]
pub struct TrainOutcome {
    pub rows: usize,
    pub backtest: Backtest,
    pub model: Model,
}

pub fn train(config: &Config) -> Result<TrainOutcome> {
    let inputs = load_inputs(config, config.injuries.training_source)?;
    train_on(config, &inputs)
}

pub fn train_on(config: &Config, inputs: &PipelineInputs) -> Result<TrainOutcome> {
    let frame = inputs
        .training_frame(config.pipeline.shift_days)
        .context("failed to assemble training frame")?;
    info!("training frame: {} rows, {} columns", frame.len(), frame.columns().len());
    report::write_frame(&frame, &config.output_path(TRAIN_FRAME_FILE))?;

    let features = feature_list(config.model.features.as_deref());
    let params = config.model.params();

    let backtest = rolling_backtest(&frame, &features, &params, config.model.backtest_days)
        .context("back-test failed")?;
    match backtest.average_mae() {
        Some(mae) => info!("back-test over {} days: mean MAE {mae:.3}", backtest.days.len()),
        None => warn!("back-test scored no days"),
    }

    let matrix = FeatureMatrix::from_frame(&frame, &features, Some(POINTS))
        .context("failed to build training matrix")?;
    let model = Model::fit(&matrix, &params).context("model fit failed")?;
    for (feature, gain) in model.feature_importance().iter().take(IMPORTANCE_SHOWN) {
        info!("importance {feature}: {gain:.2}");
    }

    let artifact = config.artifact_path();
    model.save(&artifact)?;
    info!("model saved to {}", artifact.display());

    Ok(TrainOutcome {
        rows: matrix.len(),
        backtest,
        model,
    })
}

pub fn predict(config: &Config, date: NaiveDate) -> Result<Vec<Projection>> {
    let inputs = load_inputs(config, config.injuries.inference_source)?;
    predict_on(config, &inputs, date)
}

pub fn predict_on(
    config: &Config,
    inputs: &PipelineInputs,
    date: NaiveDate,
) -> Result<Vec<Projection>> {
    let frame = inputs
        .inference_frame(config.pipeline.shift_days, date)
        .context("failed to assemble inference frame")?;
    info!("inference frame for {date}: {} rows", frame.len());
    report::write_frame(&frame, &config.output_path(PREDICT_FRAME_FILE))?;

    let artifact = config.artifact_path();
    let model = Model::load(&artifact)
        .with_context(|| format!("no usable model at {}; run `train` first", artifact.display()))?;
    let matrix = FeatureMatrix::from_frame(&frame, model.features(), None)
        .with_context(|| format!("nothing to project for {date}"))?;
    let predicted = model.predict(&matrix)?;

    let rows = report::projections(&frame, &predicted)?;
    let path = config.output_path(PROJECTIONS_FILE);
    report::write_projections(&rows, &path)?;
    info!("{} projections written to {}", rows.len(), path.display());
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::{Path, PathBuf};

    use async_trait::async_trait;
    use serde_json::Value;

    use courtcast_core::config::load_config;
    use courtcast_core::tables::{
        Boxscore, Line, Matchup, SourceKind, SourceSpec, StatRow, OPPONENT_SOURCES, PLAYER_SOURCES,
    };
    use courtcast_ingest::{IngestError, Site};

    const ROSTER: [(&str, &str); 4] = [
        ("BOS", "Jayson Tatum"),
        ("BOS", "Jaylen Brown"),
        ("NYK", "Jalen Brunson"),
        ("NYK", "Josh Hart"),
    ];

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 11, day).unwrap()
    }

    fn workspace_defaults() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../defaults")
    }

    /// Temp base dir seeded with the shipped defaults and a small model.
    fn temp_config(name: &str) -> Config {
        let tmp = std::env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("defaults")).unwrap();
        for file in ["pipeline.toml", "scrape.toml"] {
            fs::copy(workspace_defaults().join(file), tmp.join("defaults").join(file)).unwrap();
        }
        let mut config = load_config(&tmp).unwrap();
        config.model.n_estimators = 20;
        config.model.backtest_days = 2;
        config
    }

    fn stat_rows(spec: &SourceSpec, days: &[u32]) -> Vec<StatRow> {
        let mut rows = Vec::new();
        for &day in days {
            match spec.kind {
                SourceKind::Player => {
                    for (idx, (team, player)) in ROSTER.iter().enumerate() {
                        let value = (idx * 5 + day as usize) as f64;
                        rows.push(StatRow {
                            date: d(day),
                            team: team.to_string(),
                            player: Some(player.to_string()),
                            values: spec.columns.iter().map(|c| (c.to_string(), value)).collect(),
                        });
                    }
                }
                SourceKind::Opponent => {
                    for (idx, team) in ["BOS", "NYK"].iter().enumerate() {
                        let value = (100 + idx * 3 + day as usize) as f64;
                        rows.push(StatRow {
                            date: d(day),
                            team: team.to_string(),
                            player: None,
                            values: spec.columns.iter().map(|c| (c.to_string(), value)).collect(),
                        });
                    }
                }
            }
        }
        rows
    }

    /// Stats for 11-01..11-06, games every day from 11-02 to 11-06 with
    /// home court alternating, a 11-07 matchup and lines for it.
    fn seed(db: &Database) {
        for spec in PLAYER_SOURCES.iter().chain(OPPONENT_SOURCES.iter()) {
            db.insert_stat_rows(spec, &stat_rows(spec, &[1, 2, 3, 4, 5, 6])).unwrap();
        }
        let mut games = Vec::new();
        for day in 2..=6u32 {
            let home = if day % 2 == 0 { "BOS" } else { "NYK" };
            for (idx, (team, player)) in ROSTER.iter().enumerate() {
                games.push(Boxscore {
                    game_id: 22400000 + day as i64,
                    date: d(day),
                    home_team: home.to_string(),
                    team: team.to_string(),
                    player: player.to_string(),
                    opp_team: if *team == "BOS" { "NYK" } else { "BOS" }.to_string(),
                    points: (10 + idx * 6 + day as usize) as f64,
                    minutes: 30.0,
                });
            }
        }
        db.insert_boxscores(&games).unwrap();
        db.replace_matchups(&[Matchup {
            date: d(7),
            home_team: "NYK".into(),
            away_team: "BOS".into(),
        }])
        .unwrap();
        db.replace_lines(&[
            Line {
                player: "Jayson Tatum".into(),
                prop: "Points".into(),
                line: 20.5,
            },
            Line {
                player: "Josh Hart".into(),
                prop: "Points".into(),
                line: 30.5,
            },
        ])
        .unwrap();
        db.replace_injuries(InjurySource::Derived, &[]).unwrap();
        db.replace_injuries(InjurySource::Reported, &[]).unwrap();
    }

    /// Seed the store file the commands open, then close it.
    fn seed_store_file(config: &Config) {
        let db = open_store(config).unwrap();
        seed(&db);
    }

    #[test]
    fn train_then_predict_writes_outputs() {
        let config = temp_config("courtcast_commands_train_predict");
        seed_store_file(&config);

        let outcome = train(&config).unwrap();
        // 4 players x 5 game days, each player's first game has no rest gap
        assert_eq!(outcome.rows, 16);
        assert_eq!(outcome.backtest.days.len(), 2);
        assert_eq!(outcome.model.n_trees(), 20);
        assert!(config.artifact_path().exists());
        assert!(config.output_path(TRAIN_FRAME_FILE).exists());

        let rows = predict(&config, d(7)).unwrap();
        let players: Vec<&str> = rows.iter().map(|r| r.player.as_str()).collect();
        assert_eq!(players.len(), 2);
        assert!(players.contains(&"Jayson Tatum"));
        assert!(players.contains(&"Josh Hart"));
        assert!(rows.windows(2).all(|w| w[0].difference_ppg >= w[1].difference_ppg));

        let written = fs::read_to_string(config.output_path(PROJECTIONS_FILE)).unwrap();
        assert!(written.starts_with("Player,Opp_Team,Predicted_Points,Line,PPG"));
        assert_eq!(written.lines().count(), 3);

        let _ = fs::remove_dir_all(&config.base_dir);
    }

    #[test]
    fn transforms_run_on_inputs_after_the_store_is_closed() {
        let config = temp_config("courtcast_commands_detached_inputs");
        let inputs = {
            let db = Database::open(":memory:").unwrap();
            seed(&db);
            PipelineInputs::load(&db, InjurySource::Derived).unwrap()
        };

        let outcome = train_on(&config, &inputs).unwrap();
        assert_eq!(outcome.rows, 16);
        let rows = predict_on(&config, &inputs, d(7)).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(!config.db_file().exists());

        let _ = fs::remove_dir_all(&config.base_dir);
    }

    #[test]
    fn predict_without_model_fails() {
        let config = temp_config("courtcast_commands_no_model");
        seed_store_file(&config);

        let err = predict(&config, d(7)).unwrap_err();
        assert!(format!("{err:#}").contains("run `train` first"));

        let _ = fs::remove_dir_all(&config.base_dir);
    }

    #[test]
    fn predict_on_a_date_without_games_fails() {
        let config = temp_config("courtcast_commands_no_games");
        seed_store_file(&config);
        train(&config).unwrap();

        assert!(predict(&config, d(9)).is_err());

        let _ = fs::remove_dir_all(&config.base_dir);
    }

    #[test]
    fn derive_injuries_marks_absent_players() {
        let config = temp_config("courtcast_commands_derive_injuries");
        seed_store_file(&config);
        open_store(&config)
            .unwrap()
            .insert_boxscores(&[Boxscore {
                game_id: 22400099,
                date: d(8),
                home_team: "BOS".into(),
                team: "BOS".into(),
                player: "Jayson Tatum".into(),
                opp_team: "NYK".into(),
                points: 20.0,
                minutes: 30.0,
            }])
            .unwrap();

        assert_eq!(derive_injuries(&config).unwrap(), 1);
        let derived = open_store(&config)
            .unwrap()
            .load_injuries(InjurySource::Derived)
            .unwrap();
        assert_eq!(derived[0].player, "Jaylen Brown");
        assert_eq!(derived[0].date, d(8));

        let _ = fs::remove_dir_all(&config.base_dir);
    }

    /// Every upstream answers 503.
    struct OfflineFeed;

    #[async_trait]
    impl Feed for OfflineFeed {
        async fn fetch_json(
            &self,
            _site: Site,
            url: &str,
            _query: &[(&str, String)],
        ) -> Result<Value, IngestError> {
            Err(IngestError::Status {
                url: url.to_string(),
                status: 503,
            })
        }

        async fn fetch_text(&self, _site: Site, url: &str) -> Result<String, IngestError> {
            Err(IngestError::Status {
                url: url.to_string(),
                status: 503,
            })
        }
    }

    #[tokio::test]
    async fn scrape_with_offline_sources_keeps_the_store() {
        let mut config = temp_config("courtcast_commands_scrape_offline");
        config.scrape.season_start = d(6);
        config.scrape.request_delay_ms = 0;
        config.scrape.boxscore_lookback_days = 1;
        seed_store_file(&config);

        let summary = scrape_with(&config, &OfflineFeed, d(8)).await.unwrap();
        assert_eq!(summary.stat_rows, 0);
        assert_eq!(summary.lines, 0);
        for source in ["matchups", "props", "injury report"] {
            assert!(
                summary.failures.iter().any(|f| f.starts_with(source)),
                "no failure recorded for {source}: {:?}",
                summary.failures
            );
        }

        let db = open_store(&config).unwrap();
        assert_eq!(db.load_lines().unwrap().len(), 2);
        assert_eq!(db.load_matchups().unwrap().len(), 1);

        let _ = fs::remove_dir_all(&config.base_dir);
    }
}
