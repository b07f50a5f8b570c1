use std::net::SocketAddr;

use chrono::Utc;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use scribe::auth::blacklist;
use scribe::config::{Cli, Command, Config};
use scribe::state::{AppState, DbPool};
use scribe::{db, identity, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Initialize database
    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;

    match cli.command.clone().unwrap_or(Command::Serve) {
        Command::Serve => serve(pool, config).await,
        Command::CreateSuperuser { username, password } => {
            let conn = pool.get()?;
            let account =
                identity::create_superuser(&conn, &username, &password, config.auth.bcrypt_cost)
                    .map_err(|e| anyhow::anyhow!("could not create superuser: {e}"))?;
            println!("Created superuser {} ({})", account.username, account.id);
            Ok(())
        }
        Command::Deactivate { username } => {
            let conn = pool.get()?;
            identity::deactivate_account(&conn, &username)
                .map_err(|e| anyhow::anyhow!("could not deactivate {username}: {e}"))?;
            println!("Deactivated {username}");
            Ok(())
        }
        Command::PurgeBlacklist => {
            let conn = pool.get()?;
            let purged = blacklist::purge_expired(&conn, Utc::now())
                .map_err(|e| anyhow::anyhow!("could not purge blacklist: {e}"))?;
            println!("Purged {purged} expired blacklist entries");
            Ok(())
        }
    }
}

async fn serve(pool: DbPool, config: Config) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let state = AppState::new(pool, config)?;
    let app = routes::app(state);

    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
