use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info, warn};

use lottery_scraper::app::ports::DrawStore;
use lottery_scraper::common::constants::get_supported_games;
use lottery_scraper::common::types::Game;
use lottery_scraper::config::{Config, RunRequest};
use lottery_scraper::infra::create_fetcher;
use lottery_scraper::observability::{init_logging, metrics};
use lottery_scraper::pipeline::{Pipeline, RunSummary};
use lottery_scraper::store::CsvDrawStore;

#[derive(Parser)]
#[command(name = "lottery_scraper")]
#[command(about = "Powerball and Mega Millions draw history scraper")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape new draws and merge them into the game's CSV file
    Update {
        /// Game to scrape: powerball or megamillions
        #[arg(long)]
        game: Option<String>,
        /// First draw date to collect (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,
        /// Last draw date to collect (YYYY-MM-DD)
        #[arg(long)]
        end: Option<String>,
        /// Directory holding the CSV files
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Configuration file (defaults to ./config.toml when present)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the newest stored draws for a game
    Show {
        #[arg(long)]
        game: Option<String>,
        /// Number of rows to print
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        data_dir: Option<PathBuf>,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<PathBuf>, data_dir: Option<PathBuf>) -> anyhow::Result<Config> {
    let mut config = Config::load(path.as_deref()).context("loading configuration")?;
    if let Some(dir) = data_dir {
        config.store.data_dir = dir;
    }
    Ok(config)
}

fn print_summary(summary: &RunSummary) {
    println!("\n📊 {} update {}", summary.game, summary.run_id);
    println!("   Range: {} to {}", summary.window_start, summary.window_end);
    println!("   Pages visited: {}", summary.pages_visited);
    println!("   Stopped: {}", summary.stop);
    println!("   Scraped: {}", summary.scraped);
    println!("   New: {}  Updated: {}", summary.new_rows, summary.updated_rows);
    if summary.written {
        println!("   Saved {} rows to {}", summary.total_rows, summary.store);
    } else {
        println!("   No new records found; {} left unchanged", summary.store);
    }
}

async fn run_update(
    game: Option<String>,
    start: Option<String>,
    end: Option<String>,
    config: Config,
    json: bool,
) -> anyhow::Result<()> {
    let today = chrono::Local::now().date_naive();
    let request = RunRequest::resolve(game.as_deref(), start.as_deref(), end.as_deref(), today);
    let game_config = request.game.config();
    let store = CsvDrawStore::for_game(&config.store.data_dir, &game_config);

    let mut fetcher = create_fetcher(&config.fetcher)
        .await
        .context("starting page fetcher")?;
    let summary = Pipeline::run_update(
        &game_config,
        request.window,
        &store,
        fetcher.as_mut(),
        config.scrape.clone(),
    )
    .await
    .with_context(|| format!("updating {}", store.location()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    metrics::push_to_gateway(game_config.csv_file.trim_end_matches(".csv")).await;
    Ok(())
}

fn run_show(game: Option<String>, limit: usize, config: Config) -> anyhow::Result<()> {
    let game = match game.as_deref().map(|g| (g, Game::from_name(g))) {
        Some((_, Some(game))) => game,
        Some((raw, None)) => {
            warn!("Invalid game '{}', expected one of {:?}", raw, get_supported_games());
            Game::Powerball
        }
        None => Game::Powerball,
    };
    let game_config = game.config();
    let store = CsvDrawStore::for_game(&config.store.data_dir, &game_config);
    let rows = store.load().with_context(|| format!("reading {}", store.location()))?;

    println!("{} ({} rows in {})", game, rows.len(), store.location());
    println!("{:<12} {:<20} {:<10} {}", "Draw Date", "White Balls", game_config.special_column, "Jackpot");
    for row in rows.iter().take(limit) {
        println!(
            "{:<12} {:<20} {:<10} {}",
            row.draw_date, row.white_balls, row.special_ball, row.jackpot
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let _log_guard = init_logging();
    if let Err(e) = metrics::init() {
        warn!("Metrics disabled: {}", e);
    }

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Update {
            game,
            start,
            end,
            data_dir,
            config,
            json,
        } => {
            let config = load_config(config, data_dir)?;
            info!("Data directory: {}", config.store.data_dir.display());
            run_update(game, start, end, config, json).await
        }
        Commands::Show {
            game,
            limit,
            data_dir,
            config,
        } => {
            let config = load_config(config, data_dir)?;
            run_show(game, limit, config)
        }
    };

    if let Err(ref e) = result {
        error!("Run failed: {:#}", e);
    }
    result
}
