use clap::Parser;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use worldofbits_engine::GameConfig;

#[derive(Debug, Parser)]
#[command(name = "worldofbits-server", about = "Serve the World of Bits map game")]
struct Cli {
    /// Address to listen on.
    #[arg(long, default_value_t = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 39334))]
    addr: SocketAddr,
    /// SQLite file holding the saved game. Defaults to ~/.worldofbits/worldofbits.db.
    #[arg(long)]
    db: Option<PathBuf>,
    /// YAML file overriding game constants.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => worldofbits_server::load_game_config(path)?,
        None => GameConfig::default(),
    };
    let db_path = cli.db.unwrap_or_else(|| {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".worldofbits")
            .join("worldofbits.db")
    });

    tracing::info!(addr = %cli.addr, db = %db_path.display(), "starting world of bits");
    worldofbits_server::serve(cli.addr, config, db_path).await
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
