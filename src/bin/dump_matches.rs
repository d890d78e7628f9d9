use anyhow::{Context, Result};

use sc_explorer::api::ApiClient;
use sc_explorer::config::ApiConfig;
use sc_explorer::matches::{filter_matches, match_label};

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let mut args = std::env::args().skip(1);
    let competition = args
        .next()
        .map(|v| v.parse::<u32>().with_context(|| format!("invalid competition id {v}")))
        .transpose()?;
    let season = args
        .next()
        .map(|v| v.parse::<u32>().with_context(|| format!("invalid season id {v}")))
        .transpose()?;

    let api = ApiClient::new(ApiConfig::from_env()?)?;
    let editions = api
        .fetch_competition_editions()
        .context("fetch competition editions")?;
    let matches = api.fetch_all_matches().context("fetch matches")?;
    println!(
        "{} competition editions, {} matches",
        editions.len(),
        matches.len()
    );

    let Some(competition) = competition else {
        for row in &editions {
            println!(
                "{:>6} {:<40} {:>6} {}",
                row.competition_id, row.competition_name, row.season_id, row.season_name
            );
        }
        return Ok(());
    };

    let seasons: Vec<u32> = match season {
        Some(season) => vec![season],
        None => editions
            .iter()
            .filter(|row| row.competition_id == competition)
            .map(|row| row.season_id)
            .collect(),
    };
    if seasons.is_empty() {
        eprintln!("No seasons found for competition {competition}.");
        return Ok(());
    }

    for season in seasons {
        let rows = filter_matches(&matches, competition, season);
        println!("competition {competition} season {season}: {} matches", rows.len());
        for row in rows {
            println!("  {:>8} {}", row.id, match_label(row));
        }
    }

    Ok(())
}
