//! cellar-ratings - operator CLI
//!
//! Maintenance commands over the ratings store. Tier providers are supplied
//! by the embedding application, so resolving new ratings is not done here.

use std::path::PathBuf;

use anyhow::{Context, Result};
use cellar_ratings::config::RatingsConfig;
use cellar_ratings::db::{ratings, settings, wines};
use cellar_ratings::scoring::RatingSource;
use cellar_ratings::{PipelineBuilder, RatingsService};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for cellar-ratings
#[derive(Parser, Debug)]
#[command(name = "cellar-ratings")]
#[command(about = "Wine ratings store maintenance")]
#[command(version)]
struct Args {
    /// Config file (default: $CELLAR_CONFIG, then ~/.config/cellar/ratings.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the database and schema
    InitDb,
    /// Print stored ratings and aggregates for a wine
    Show {
        wine_id: i64,
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Recompute aggregates from stored ratings
    Recompute { wine_id: i64 },
    /// Set the purchase-score preference (0 = critics/competitions, 100 = community)
    SetPreference {
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        weight: u8,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = RatingsConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let db_path = config.database_path();
    info!("Database: {}", db_path.display());
    let pool = cellar_common::db::init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    match args.command {
        Command::InitDb => {
            println!("Database ready: {}", db_path.display());
        }
        Command::Show { wine_id, json } => {
            let wine = wines::load_wine(&pool, wine_id).await?;
            let stored = wines::load_aggregates(&pool, wine_id).await?;
            let rows = ratings::load_ratings(&pool, wine_id).await?;

            if json {
                let ratings: Vec<_> = rows
                    .iter()
                    .map(|r| {
                        json!({
                            "source": r.source,
                            "lens": r.source_lens,
                            "raw_score": r.raw_score,
                            "normalized": [r.normalized_min, r.normalized_mid, r.normalized_max],
                            "competition_year": r.competition_year,
                            "vintage": r.vintage,
                            "vintage_match": r.vintage_match,
                            "user_override": r.is_user_override,
                            "fetched_at": r.fetched_at,
                        })
                    })
                    .collect();
                let doc = json!({
                    "wine": wine,
                    "aggregates": stored.indices,
                    "ratings_updated_at": stored.ratings_updated_at,
                    "ratings": ratings,
                });
                println!("{}", serde_json::to_string_pretty(&doc)?);
            } else {
                println!(
                    "{} {} ({})",
                    wine.name,
                    wine.vintage.map(|v| v.to_string()).unwrap_or_else(|| "NV".to_string()),
                    wine.colour
                );
                let a = &stored.indices;
                println!(
                    "  purchase {} ({} stars, {} confidence)",
                    fmt_score(a.purchase_score),
                    fmt_score(a.purchase_stars),
                    a.confidence_level.as_str()
                );
                println!(
                    "  competition {}  critics {}  community {}",
                    fmt_score(a.competition_index),
                    fmt_score(a.critics_index),
                    fmt_score(a.community_index)
                );
                for r in &rows {
                    println!(
                        "  {:<28} {:<12} {:>8} -> {:>5.1}{}{}",
                        RatingSource::resolve(&r.source).display_name(),
                        r.source_lens,
                        r.raw_score,
                        r.normalized_mid,
                        r.competition_year.map(|y| format!(" [{}]", y)).unwrap_or_default(),
                        if r.is_user_override { " (override)" } else { "" }
                    );
                }
            }
        }
        Command::Recompute { wine_id } => {
            let service: RatingsService = PipelineBuilder::new(config.clone()).build(pool.clone());
            let indices = service.recompute_aggregates(wine_id).await?;
            println!(
                "wine {}: purchase {} ({} stars, {} confidence)",
                wine_id,
                fmt_score(indices.purchase_score),
                fmt_score(indices.purchase_stars),
                indices.confidence_level.as_str()
            );
        }
        Command::SetPreference { weight } => {
            settings::set_rating_preference(&pool, weight).await?;
            println!("rating_preference = {}", weight);
        }
    }

    pool.close().await;
    Ok(())
}

fn fmt_score(value: Option<f64>) -> String {
    value.map(|v| format!("{:.1}", v)).unwrap_or_else(|| "-".to_string())
}
