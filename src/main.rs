use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use invoicing::{config, db, web};

/// Small-business invoicing server
#[derive(Parser, Debug)]
#[command(name = "invoicing", version, about)]
struct Cli {
    /// Address to listen on, overriding BIND_ADDR
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    // Load configuration
    let config = config::init()?;
    let bind_addr = cli.bind.unwrap_or_else(|| config.bind_addr.clone());

    // Initialize database connection
    let database = db::init(&config).await?;
    tracing::info!(database_url = %config.database_url, "database ready");

    let services = Arc::new(web::AppServices::new(database));
    let app = web::build_app(services);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
