use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use sake_log::models::{LogForm, UserId};
use sake_log::{App, AppError, Config};

#[derive(Parser)]
#[command(name = "sake-log")]
#[command(about = "Personal sake tasting log backed by Sakenowa open data")]
#[command(version)]
struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database path, overriding the config
    #[arg(long, global = true)]
    db: Option<String>,

    /// Username the command acts for
    #[arg(short, long, global = true, env = "SAKE_LOG_USER")]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mirror prefectures, breweries, brands and flavor charts from Sakenowa
    Sync,
    /// All prefectures with sake counts and the map payload
    Prefectures,
    /// One prefecture and the sakes brewed there
    Prefecture { id: i64 },
    /// List sakes, optionally matching a sake or brewery name
    Search { query: Option<String> },
    /// One sake with its flavor chart and your log
    Sake { id: i64 },
    /// Create or update your log for a sake
    Log {
        sake_id: i64,
        #[command(flatten)]
        fields: LogArgs,
    },
    /// Show one of your logs by its id
    ShowLog { log_id: i64 },
    /// Update one of your logs by its id
    EditLog {
        log_id: i64,
        #[command(flatten)]
        fields: LogArgs,
    },
    /// Sakes you have drunk, with your map payload
    Drunk,
    /// Sakes you have liked
    Liked,
}

#[derive(Args)]
struct LogArgs {
    /// Mark as drunk (true/false)
    #[arg(long)]
    drunk: Option<bool>,
    /// Mark as liked (true/false)
    #[arg(long)]
    liked: Option<bool>,
    /// Rating from 1 to 5; an empty value clears it
    #[arg(long)]
    rating: Option<String>,
    /// Date drunk as YYYY-MM-DD; an empty value clears it
    #[arg(long)]
    drunk_at: Option<String>,
    #[arg(long)]
    memo: Option<String>,
}

impl From<LogArgs> for LogForm {
    fn from(args: LogArgs) -> Self {
        LogForm {
            is_drunk: args.drunk,
            is_liked: args.liked,
            rating: args.rating,
            drunk_at: args.drunk_at,
            memo: args.memo,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report(err),
    }
}

const DEFAULT_LOG_FILTER: &str = "sake_log=info";

/// `RUST_LOG` directives if they parse, otherwise the crate's own info logging.
fn env_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("loading configuration")?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    let app = App::new(&config)
        .await
        .with_context(|| format!("opening database {}", config.db_path))?;
    let username = cli.user.or_else(|| config.default_user.clone());

    match cli.command {
        Commands::Sync => {
            let report = app.sync().await.context("Sakenowa sync failed")?;
            print_json(&report)?;
        }
        Commands::Prefectures => {
            let viewer = viewer(&app, username.as_deref()).await?;
            print_json(&app.prefecture_overview(viewer).await?)?;
        }
        Commands::Prefecture { id } => {
            print_json(&app.prefecture_detail(id).await?)?;
        }
        Commands::Search { query } => {
            print_json(&app.search_sakes(query.as_deref().unwrap_or("")).await?)?;
        }
        Commands::Sake { id } => {
            let viewer = viewer(&app, username.as_deref()).await?;
            print_json(&app.sake_detail(id, viewer).await?)?;
        }
        Commands::Log { sake_id, fields } => {
            let user = required_user(&app, username.as_deref()).await?;
            print_json(&app.save_sake_log(user, sake_id, &fields.into()).await?)?;
        }
        Commands::ShowLog { log_id } => {
            let user = required_user(&app, username.as_deref()).await?;
            print_json(&app.log_detail(user, log_id).await?)?;
        }
        Commands::EditLog { log_id, fields } => {
            let user = required_user(&app, username.as_deref()).await?;
            print_json(&app.update_log(user, log_id, &fields.into()).await?)?;
        }
        Commands::Drunk => {
            let user = required_user(&app, username.as_deref()).await?;
            print_json(&app.drunk_logs(user).await?)?;
        }
        Commands::Liked => {
            let user = required_user(&app, username.as_deref()).await?;
            print_json(&app.liked_logs(user).await?)?;
        }
    }

    Ok(())
}

async fn viewer(app: &App, username: Option<&str>) -> anyhow::Result<Option<UserId>> {
    match username {
        Some(name) => Ok(Some(app.user(name).await?.id)),
        None => Ok(None),
    }
}

async fn required_user(app: &App, username: Option<&str>) -> anyhow::Result<UserId> {
    let name = username
        .context("this command needs --user, SAKE_LOG_USER or default_user in the config")?;
    Ok(app.user(name).await?.id)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn report(err: anyhow::Error) -> ExitCode {
    match err.downcast_ref::<AppError>() {
        Some(AppError::Validation(errors)) => {
            let body = serde_json::json!({ "errors": errors });
            eprintln!("{}", body);
            ExitCode::from(2)
        }
        Some(AppError::NotFound(what)) => {
            eprintln!("Error: {} not found", what);
            ExitCode::from(3)
        }
        _ => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
