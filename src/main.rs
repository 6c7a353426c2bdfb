use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{ArgGroup, Parser, Subcommand};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use go_stats::api::routes::stats::{compute_stats, StatsParams};
use go_stats::api::state::AppState;
use go_stats::config::AppConfig;
use go_stats::fetch::OgsClient;
use go_stats::parse_duration;
use go_stats::resolve::Resolver;

#[derive(Parser)]
#[command(name = "go-stats")]
#[command(about = "Player statistics backend for the Online Go Server")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "./go-stats.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Bind address
        #[arg(long)]
        host: Option<String>,

        /// Port number
        #[arg(long)]
        port: Option<u16>,

        /// Wall-clock budget per history fetch (e.g., "25s", "1m")
        #[arg(long)]
        fetch_budget: Option<String>,
    },

    /// Compute statistics for one player and print the JSON response
    #[command(group(ArgGroup::new("player").required(true).args(["username", "player_id"])))]
    Stats {
        #[arg(long)]
        username: Option<String>,

        #[arg(long)]
        player_id: Option<i64>,

        /// Upper bound on games collected
        #[arg(long)]
        max_games: Option<usize>,

        /// Games per upstream page
        #[arg(long)]
        page_size: Option<u32>,

        /// Upstream sort key
        #[arg(long)]
        ordering: Option<String>,

        /// Offer ranked candidates when the username has no exact match
        #[arg(long)]
        fuzzy: bool,

        /// Omit the statistics block
        #[arg(long)]
        no_statistics: bool,
    },

    /// Print ranked player candidates for a name
    Search {
        query: String,

        /// Number of candidates to show
        #[arg(long)]
        limit: Option<usize>,
    },
}

fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so command output on stdout stays parseable.
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    let level = cli.log_level.clone().unwrap_or_else(|| config.log_level.clone());
    init_tracing(&level, cli.json_logs);

    tracing::info!("Starting go-stats v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Serve {
            host,
            port,
            fetch_budget,
        } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(budget) = fetch_budget {
                let budget = parse_duration(&budget)
                    .ok_or_else(|| anyhow!("Invalid --fetch-budget {:?}", budget))?;
                config.upstream.fetch_budget_seconds = budget.as_secs_f64().ceil() as u64;
            }
            config.validate()?;

            let client = OgsClient::new(config.fetcher_config()?)?;
            let addr = format!("{}:{}", config.server.host, config.server.port);
            tracing::info!(
                "Upstream {} (budget {}s per history)",
                config.upstream.base_url,
                config.upstream.fetch_budget_seconds
            );

            let app = go_stats::api::build_router(AppState::new(Arc::new(client), config));
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            tracing::info!("Listening on http://{}", addr);
            axum::serve(listener, app).await?;
        }
        Commands::Stats {
            username,
            player_id,
            max_games,
            page_size,
            ordering,
            fuzzy,
            no_statistics,
        } => {
            let client = OgsClient::new(config.fetcher_config()?)?;
            let params = StatsParams {
                username,
                player_id: player_id.map(|id| id.to_string()),
                page_size: page_size.map(|n| n.to_string()),
                max_games: max_games.map(|n| n.to_string()),
                ordering,
                fuzzy: Some(fuzzy.to_string()),
                include_statistics: Some((!no_statistics).to_string()),
            };
            let query = params.into_query(&config)?;
            let response = compute_stats(&client, &config, query).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Search { query, limit } => {
            let client = OgsClient::new(config.fetcher_config()?)?;
            let limit = limit.unwrap_or(config.limits.max_candidates);
            let candidates = Resolver::new(&client, limit).search(&query).await?;

            if candidates.is_empty() {
                println!("No players match {:?}", query);
            }
            for c in &candidates {
                let rating = c
                    .player
                    .rating
                    .map(|r| format!("{:.0}", r))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:>5.1}  {:<24} id={:<10} rating={}",
                    c.score, c.player.username, c.player.id, rating
                );
            }
        }
    }

    Ok(())
}
