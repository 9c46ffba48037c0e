use clap::Parser;
use log::info;
use server::network::{Server, ServerConfig, DEFAULT_MAX_CLIENTS};
use shared::bot::Bots;
use shared::{Game, GameConfig, GameMap, DEFAULT_PORT};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Password clients must present to join
    #[arg(long, default_value = "")]
    password: String,

    /// Number of bot players to add
    #[arg(short, long, default_value = "0")]
    bots: usize,

    /// Maximum number of connected clients
    #[arg(short, long, default_value_t = DEFAULT_MAX_CLIENTS)]
    max_clients: usize,

    /// Seconds of silence before a client is dropped
    #[arg(short = 't', long, default_value = "30")]
    client_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();

    let game = Game::new(GameMap::default_arena(), GameConfig::default());

    let mut bots = Bots::new(&game);
    for i in 0..args.bots {
        bots.add_bot(&format!("Bot{}", i + 1)).await;
    }
    if !bots.is_empty() {
        info!("Starting {} bots", bots.len());
        bots.start();
    }

    let config = ServerConfig {
        password: args.password,
        max_clients: args.max_clients,
        client_timeout: Duration::from_secs(args.client_timeout),
    };
    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(&address, game, config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
