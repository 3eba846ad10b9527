use std::net::SocketAddr;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use yatube::auth::{reset, session};
use yatube::config::{Cli, Command, Config};
use yatube::db;
use yatube::routes;
use yatube::state::{AppState, DbPool};

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

    // Ensure media directory exists
    std::fs::create_dir_all(config.media_path())?;

    // Initialize database
    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;
    prune_expired(&pool)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::CreateGroup {
            slug,
            title,
            description,
        } => create_group(&pool, &slug, &title, &description),
        Command::Serve => serve(pool, config).await,
    }
}

fn create_group(pool: &DbPool, slug: &str, title: &str, description: &str) -> anyhow::Result<()> {
    let conn = pool.get()?;
    if db::groups::find_by_slug(&conn, slug)?.is_some() {
        anyhow::bail!("Group with slug '{}' already exists", slug);
    }
    let id = db::groups::create(&conn, title, slug, description)?;
    tracing::info!("Created group {} ({}) with id {}", title, slug, id);
    Ok(())
}

/// Drop sessions and reset links that can no longer be used.
fn prune_expired(pool: &DbPool) -> anyhow::Result<()> {
    let conn = pool.get()?;
    let sessions = session::delete_expired(&conn)?;
    let resets = reset::delete_expired(&conn)?;
    if sessions + resets > 0 {
        tracing::info!(
            "Pruned {} expired session(s) and {} reset link(s)",
            sessions,
            resets
        );
    }
    Ok(())
}

async fn serve(pool: DbPool, config: Config) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    let state = AppState::new(pool, config);
    let app = routes::build_router(state);

    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
