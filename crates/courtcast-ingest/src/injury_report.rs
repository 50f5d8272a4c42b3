// League-wide injury page.
//
// One table per team; the team's full name sits in a header span above its
// table. Only players whose status contains "Out" are recorded, all dated
// the day of the scrape.

use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use courtcast_core::names::{normalize_player_name, tricode_for};
use courtcast_core::tables::InjuryRecord;

use crate::client::{Feed, Site};
use crate::error::IngestError;

fn selector(css: &str) -> Result<Selector, IngestError> {
    Selector::parse(css).map_err(|e| IngestError::shape("injuries", format!("selector {css}: {e:?}")))
}

fn cell_text(row: ElementRef<'_>, sel: &Selector) -> String {
    row.select(sel)
        .next()
        .map(|el| el.text().collect::<String>())
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Players out on `today`. An empty result is an error so a broken page
/// never clears the stored report.
pub fn parse_injury_page(html: &str, today: NaiveDate) -> Result<Vec<InjuryRecord>, IngestError> {
    let document = Html::parse_document(html);
    let table_sel = selector("div.ResponsiveTable.Table__league-injuries")?;
    let team_sel = selector("span.injuries__teamName")?;
    let row_sel = selector("tbody tr")?;
    let name_sel = selector("td.col-name")?;
    let status_sel = selector("td.col-stat")?;

    let mut records = Vec::new();
    for table in document.select(&table_sel) {
        let team_name = table
            .select(&team_sel)
            .next()
            .map(|el| el.text().collect::<String>())
            .unwrap_or_default();
        let Some(team) = tricode_for(&team_name) else {
            warn!("injury table for unknown team {:?}", team_name.trim());
            continue;
        };
        for row in table.select(&row_sel) {
            let status = cell_text(row, &status_sel);
            if !status.contains("Out") {
                continue;
            }
            let player = normalize_player_name(&cell_text(row, &name_sel));
            if player.is_empty() {
                continue;
            }
            records.push(InjuryRecord {
                date: today,
                team: team.to_string(),
                player,
            });
        }
    }
    if records.is_empty() {
        return Err(IngestError::Empty {
            what: "injuries".to_string(),
        });
    }
    records.sort();
    records.dedup();
    debug!("{} players out on {today}", records.len());
    Ok(records)
}

pub async fn fetch_injuries(
    feed: &dyn Feed,
    url: &str,
    today: NaiveDate,
) -> Result<Vec<InjuryRecord>, IngestError> {
    let html = feed.fetch_text(Site::Injuries, url).await?;
    parse_injury_page(&html, today)
}
