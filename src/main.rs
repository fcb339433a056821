use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vectal::api::{self, AppState, SecurityConfig};
use vectal::db::Database;
use vectal::llm::{LlmConfig, OpenAiAssistant};

#[derive(Parser)]
#[command(name = "vectal")]
#[command(about = "Tasks, notes, projects and an AI assistant behind a JSON API")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve(ServeArgs),
    /// Apply database migrations and exit
    Migrate {
        /// SQLite database file (defaults to the platform data directory)
        #[arg(long, env = "VECTAL_DATABASE")]
        database: Option<PathBuf>,
    },
}

#[derive(Parser)]
struct ServeArgs {
    /// Address to bind
    #[arg(long, env = "VECTAL_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port for HTTP API
    #[arg(short, long, env = "VECTAL_PORT", default_value = "3000")]
    port: u16,

    /// SQLite database file (defaults to the platform data directory)
    #[arg(long, env = "VECTAL_DATABASE")]
    database: Option<PathBuf>,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "vectal=debug,tower_http=debug".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn open_database(path: Option<PathBuf>) -> anyhow::Result<Database> {
    let db = match path {
        Some(path) => Database::open(path),
        None => Database::open_default(),
    }
    .context("Failed to open database")?;
    db.migrate().context("Failed to run migrations")?;
    Ok(db)
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let db = open_database(args.database)?;

    let llm_config = LlmConfig::from_env();
    let llm_timeout = llm_config.timeout;
    let assistant = OpenAiAssistant::new(llm_config).context("Failed to build completion client")?;

    let state = AppState::new(db, Arc::new(assistant))
        .with_security(SecurityConfig::from_env())
        .with_llm_timeout(llm_timeout);
    let app = api::create_router(state);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", args.host, args.port))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Vectal server listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve(args)) => serve(args).await?,
        Some(Commands::Migrate { database }) => {
            open_database(database)?;
            tracing::info!("Migrations applied");
        }
        None => serve(ServeArgs::parse_from(["vectal"])).await?,
    }

    Ok(())
}
