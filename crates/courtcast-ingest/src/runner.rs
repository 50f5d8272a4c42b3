// One full ingest pass.
//
// Stat tables and boxscores are back-filled through the day before `today`;
// matchups, props and the injury report describe `today` and replace their
// tables outright. Sources run one after another with a fixed pause between
// requests. A failing source is logged and skipped so one broken upstream
// does not block the rest.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::{info, warn};

use courtcast_core::config::ScrapeConfig;
use courtcast_core::db::{missing_dates, Database};
use courtcast_core::features::injury::derive_from_boxscores;
use courtcast_core::tables::InjurySource;

use crate::client::Feed;
use crate::endpoints::{fetch_endpoint, ALL_ENDPOINTS};
use crate::injury_report::fetch_injuries;
use crate::props::fetch_props;
use crate::scoreboard::{fetch_boxscore, fetch_games};

/// Counts from one ingest pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrapeSummary {
    pub stat_rows: usize,
    pub boxscore_rows: usize,
    pub dates_without_games: usize,
    pub matchups: usize,
    pub lines: usize,
    pub reported_injuries: usize,
    pub derived_injuries: usize,
    /// `source: error` for every source that failed.
    pub failures: Vec<String>,
}

impl fmt::Display for ScrapeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} stat rows, {} boxscore rows, {} matchups, {} lines, {} reported / {} derived injuries, {} failures",
            self.stat_rows,
            self.boxscore_rows,
            self.matchups,
            self.lines,
            self.reported_injuries,
            self.derived_injuries,
            self.failures.len()
        )
    }
}

impl ScrapeSummary {
    fn fail(&mut self, source: &str, err: impl fmt::Display) {
        warn!("{source} failed: {err}");
        self.failures.push(format!("{source}: {err}"));
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// Run every source for `today`.
pub async fn scrape_all(
    feed: &dyn Feed,
    db: &Database,
    cfg: &ScrapeConfig,
    today: NaiveDate,
) -> Result<ScrapeSummary> {
    let delay = Duration::from_millis(cfg.request_delay_ms);
    let target = today - chrono::Duration::days(1);
    let mut summary = ScrapeSummary::default();

    scrape_stat_tables(feed, db, cfg, target, delay, &mut summary).await?;
    scrape_boxscores(feed, db, cfg, target, delay, &mut summary).await?;

    match fetch_games(feed, &cfg.stats_base_url, today).await {
        Ok(games) => {
            let matchups: Vec<_> = games.iter().map(|g| g.matchup()).collect();
            db.replace_matchups(&matchups)?;
            summary.matchups = matchups.len();
        }
        Err(e) => summary.fail("matchups", e),
    }
    pause(delay).await;

    let known = db.known_players()?;
    match fetch_props(feed, &cfg.props_url).await {
        Ok(lines) => {
            warn_unknown(&known, lines.iter().map(|l| l.player.as_str()), "props");
            db.replace_lines(&lines)?;
            summary.lines = lines.len();
        }
        Err(e) => summary.fail("props", e),
    }
    pause(delay).await;

    match fetch_injuries(feed, &cfg.injuries_url, today).await {
        Ok(records) => {
            db.replace_injuries(InjurySource::Reported, &records)?;
            summary.reported_injuries = records.len();
        }
        Err(e) => summary.fail("injury report", e),
    }

    summary.derived_injuries = rebuild_derived_injuries(db)?;
    info!("scrape finished: {summary}");
    Ok(summary)
}

/// Recompute `player_injuries` from the roster and stored boxscores.
pub fn rebuild_derived_injuries(db: &Database) -> Result<usize> {
    let roster = db.roster().context("failed to read roster")?;
    let boxscores = db.load_boxscores().context("failed to read boxscores")?;
    let records = derive_from_boxscores(&roster, &boxscores);
    db.replace_injuries(InjurySource::Derived, &records)?;
    info!("derived {} injury records", records.len());
    Ok(records.len())
}

async fn scrape_stat_tables(
    feed: &dyn Feed,
    db: &Database,
    cfg: &ScrapeConfig,
    target: NaiveDate,
    delay: Duration,
    summary: &mut ScrapeSummary,
) -> Result<()> {
    for endpoint in &ALL_ENDPOINTS {
        let table = endpoint.spec.table;
        let dates = db.dates_to_scrape(table, target, cfg.season_start)?;
        if dates.is_empty() {
            info!("{table}: up to date");
            continue;
        }
        info!("{table}: {} dates to scrape", dates.len());
        for date in dates {
            match fetch_endpoint(
                feed,
                &cfg.stats_base_url,
                endpoint,
                date,
                cfg.window_days,
                delay,
            )
            .await
            {
                Ok(rows) => {
                    let inserted = db.insert_stat_rows(&endpoint.spec, &rows)?;
                    info!("{table} {date}: {inserted} rows");
                    summary.stat_rows += inserted;
                }
                Err(e) => summary.fail(&format!("{table} {date}"), e),
            }
            pause(delay).await;
        }
    }
    Ok(())
}

async fn scrape_boxscores(
    feed: &dyn Feed,
    db: &Database,
    cfg: &ScrapeConfig,
    target: NaiveDate,
    delay: Duration,
    summary: &mut ScrapeSummary,
) -> Result<()> {
    let done = db.scraped_dates("player_boxscore")?;
    let dates = missing_dates(target, cfg.boxscore_lookback_days, &done);
    info!("player_boxscore: {} dates to scrape", dates.len());
    let known = db.known_players()?;

    for date in dates {
        let games = match fetch_games(feed, &cfg.stats_base_url, date).await {
            Ok(games) => games,
            Err(e) => {
                summary.fail(&format!("scoreboard {date}"), e);
                pause(delay).await;
                continue;
            }
        };
        pause(delay).await;
        if games.is_empty() {
            db.mark_date_without_games(date)?;
            summary.dates_without_games += 1;
            continue;
        }
        for game in &games {
            if let Some(id) = game.numeric_id() {
                if db.has_boxscore(id)? {
                    continue;
                }
            }
            match fetch_boxscore(feed, &cfg.stats_base_url, game).await {
                Ok(rows) => {
                    warn_unknown(&known, rows.iter().map(|r| r.player.as_str()), "boxscore");
                    summary.boxscore_rows += db.insert_boxscores(&rows)?;
                }
                Err(e) => summary.fail(&format!("boxscore {}", game.game_id), e),
            }
            pause(delay).await;
        }
        info!("player_boxscore {date}: {} games", games.len());
    }
    Ok(())
}

/// Names absent from `player_traditional` never join; flag them.
fn warn_unknown<'a>(known: &HashSet<String>, names: impl Iterator<Item = &'a str>, source: &str) {
    if known.is_empty() {
        return;
    }
    for name in names {
        if !known.contains(name) {
            warn!("{source}: {name} not found in player_traditional");
        }
    }
}
